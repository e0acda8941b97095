/// Parameters of an estimation and of the estimator itself.
/// Both can be stored as json.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde_json;

use errors::*;
use forest::DEFAULT_TREE_EXTENSION;

/// Parameters of a single estimation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EstimationParams {
    /// Distance between two sampled patches (in both directions)
    pub stride: u32,
    /// Leaves with a larger trace do not vote
    pub max_variance: f32,
    /// Leaves with a smaller probability do not vote
    pub prob_threshold: f32,
    /// The radius for clustering votes is the head diameter divided by this ratio
    pub larger_radius_ratio: f32,
    /// The radius for mean shifting is the head diameter divided by this ratio
    pub smaller_radius_ratio: f32,
    /// Log details of the estimation at info level
    pub verbose: bool,
    /// Number of votes (for a stride of 1 and a single tree) a cluster
    /// needs to be reported as head
    pub head_threshold: i32,
    /// Maximal number of heads
    pub max_faces: usize,
}

impl Default for EstimationParams {
    fn default() -> EstimationParams {
        EstimationParams {
            stride: 5,
            max_variance: 1000.0,
            prob_threshold: 1.0,
            larger_radius_ratio: 1.0,
            smaller_radius_ratio: 6.0,
            verbose: false,
            head_threshold: 400,
            max_faces: 2,
        }
    }
}

impl EstimationParams {
    /// Checks the parameters an estimation cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.stride == 0 {
            bail!(ErrorKind::InvalidParameter("stride has to be positive".to_string()));
        }
        // negated to catch NaN
        if !(self.larger_radius_ratio > 0.0) {
            bail!(ErrorKind::InvalidParameter(format!("larger radius ratio {} has to be positive",
                                                      self.larger_radius_ratio)));
        }
        if !(self.smaller_radius_ratio > 0.0) {
            bail!(ErrorKind::InvalidParameter(format!("smaller radius ratio {} has to be positive",
                                                      self.smaller_radius_ratio)));
        }
        Ok(())
    }

    /// Number of votes a cluster needs to be a head, scaled to the number
    /// of trees and the stride: `round(head_threshold * trees / stride²)`,
    /// with halves rounded to even.
    pub fn min_head_votes(&self, trees: usize) -> usize {
        let stride = self.stride as f64;
        let th = round_half_even(self.head_threshold as f64 * trees as f64 / (stride * stride));
        if th > 0.0 { th as usize } else { 0 }
    }
}

fn round_half_even(x: f64) -> f64 {
    let r = x.round();
    if (x - x.trunc()).abs() == 0.5 && r % 2.0 != 0.0 {
        r - x.signum()
    } else {
        r
    }
}

/// Everything needed to build an estimator.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Path prefix of the tree files; the files are named `<prefix>000.<extension>`, ...
    pub tree_prefix: PathBuf,
    pub tree_count: usize,
    pub tree_extension: String,
    /// Let the trees of a patch only vote if their average probability is high enough
    pub average_votes: bool,
    /// Depth values (mm) at or beyond this distance are ignored when
    /// converting depth frames into point images
    pub max_z: f32,
    pub params: EstimationParams,
}

impl Default for EstimatorConfig {
    fn default() -> EstimatorConfig {
        EstimatorConfig {
            tree_prefix: PathBuf::from("trees/tree"),
            tree_count: 10,
            tree_extension: DEFAULT_TREE_EXTENSION.to_string(),
            average_votes: true,
            max_z: 1300.0,
            params: EstimationParams::default(),
        }
    }
}

impl EstimatorConfig {
    /// Reads a configuration from a json file.
    /// A relative tree prefix is interpreted relative to the directory of the file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<EstimatorConfig> {
        let path = path.as_ref();
        let file = File::open(path).chain_err(|| format!("could not open {}", path.display()))?;
        let mut config: EstimatorConfig = serde_json::from_reader(BufReader::new(file))?;
        if config.tree_prefix.is_relative() {
            if let Some(dir) = path.parent() {
                config.tree_prefix = dir.join(&config.tree_prefix);
            }
        }
        Ok(config)
    }

    /// Saves this configuration as json file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env::temp_dir;
    use std::fs::remove_file;
    use std::process;

    #[test]
    fn test_defaults() {
        let params = EstimationParams::default();
        assert_eq!(params.stride, 5);
        assert_eq!(params.max_variance, 1000.0);
        assert_eq!(params.prob_threshold, 1.0);
        assert_eq!(params.larger_radius_ratio, 1.0);
        assert_eq!(params.smaller_radius_ratio, 6.0);
        assert!(!params.verbose);
        assert_eq!(params.head_threshold, 400);
        assert_eq!(params.max_faces, 2);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_validate() {
        let mut params = EstimationParams::default();
        params.stride = 0;
        assert!(params.validate().is_err());
        let mut params = EstimationParams::default();
        params.larger_radius_ratio = 0.0;
        assert!(params.validate().is_err());
        let mut params = EstimationParams::default();
        params.smaller_radius_ratio = -1.0;
        assert!(params.validate().is_err());
        let mut params = EstimationParams::default();
        params.smaller_radius_ratio = ::std::f32::NAN;
        match params.validate() {
            Err(Error(ErrorKind::InvalidParameter(_), _)) => (),
            _ => panic!("invalid parameter expected"),
        }
    }

    #[test]
    fn test_min_head_votes() {
        let mut params = EstimationParams::default();
        // 400 * 10 / 25
        assert_eq!(params.min_head_votes(10), 160);
        params.stride = 3;
        // 444.4
        assert_eq!(params.min_head_votes(10), 444);
        // 62.5 and 37.5, halves go to the even neighbour
        params.stride = 8;
        assert_eq!(params.min_head_votes(10), 62);
        params.head_threshold = 240;
        assert_eq!(params.min_head_votes(10), 38);
        params.head_threshold = -5;
        assert_eq!(params.min_head_votes(10), 0);
    }

    #[test]
    fn test_partial_json() {
        let json = r#"{"tree_count": 3, "params": {"stride": 7, "verbose": true}}"#;
        let config: EstimatorConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.tree_count, 3);
        assert_eq!(config.params.stride, 7);
        assert!(config.params.verbose);
        assert_eq!(config.params.head_threshold, 400);
        assert_eq!(config.tree_extension, "tree");
        assert!(config.average_votes);
    }

    #[test]
    fn test_save_and_load() {
        let path = temp_dir().join(format!("headforest_config_{}.json", process::id()));
        let mut config = EstimatorConfig::default();
        config.tree_prefix = temp_dir().join("forest/tree");
        config.tree_extension = "bin".to_string();
        config.params.max_faces = 1;
        config.save(&path).unwrap();
        assert_eq!(EstimatorConfig::from_file(&path).unwrap(), config);
        remove_file(&path).unwrap();

        assert!(EstimatorConfig::from_file(&path).is_err());
    }

    #[test]
    fn test_relative_prefix() {
        let path = temp_dir().join(format!("headforest_config_rel_{}.json", process::id()));
        EstimatorConfig::default().save(&path).unwrap();
        let config = EstimatorConfig::from_file(&path).unwrap();
        assert_eq!(config.tree_prefix, temp_dir().join("trees/tree"));
        remove_file(&path).unwrap();
    }
}
