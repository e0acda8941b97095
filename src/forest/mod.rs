/// Defines a regression forest for head pose estimation.
/// For literature see
/// * Fanelli, Weise, Gall, Van Gool: Real Time Head Pose Estimation from
///   Consumer Depth Cameras (DAGM 2011)

pub mod tree;
pub mod voting;
pub mod prediction;

use std::path::{Path, PathBuf};

use errors::*;
use integral::FeatureImages;
use types::Rect;
use self::tree::{DecisionTree, LeafRecord};

/// Extension of tree files if nothing else is said.
pub const DEFAULT_TREE_EXTENSION: &'static str = "tree";

/// An ordered collection of decision trees sharing the same patch size.
/// A forest is never empty and never changes after loading.
#[derive(Debug, Clone)]
pub struct Forest {
    trees: Vec<DecisionTree>,
}

impl Forest {
    /// Creates a forest of the given trees.
    /// Fails if there are no trees or if their patch sizes differ.
    pub fn from_trees(trees: Vec<DecisionTree>) -> Result<Forest> {
        let expected = match trees.first() {
            Some(tree) => (tree.patch_width(), tree.patch_height()),
            None => {
                bail!(ErrorKind::EmptyForest);
            }
        };
        for tree in trees.iter() {
            let found = (tree.patch_width(), tree.patch_height());
            if found != expected {
                bail!(ErrorKind::GeometryMismatch(expected, found));
            }
        }
        Ok(Forest { trees: trees })
    }

    /// Loads `count` trees named `<prefix>000.tree`, `<prefix>001.tree`, ...
    pub fn load<P: AsRef<Path>>(prefix: P, count: usize) -> Result<Forest> {
        Forest::load_with_extension(prefix, count, DEFAULT_TREE_EXTENSION)
    }

    /// Loads `count` trees named `<prefix>000.<extension>`, `<prefix>001.<extension>`, ...
    /// Every tree has to be readable, otherwise the whole forest is rejected.
    pub fn load_with_extension<P: AsRef<Path>>(prefix: P,
                                               count: usize,
                                               extension: &str)
                                               -> Result<Forest> {
        let mut trees = Vec::with_capacity(count);
        for i in 0..count {
            let path = Forest::tree_path(prefix.as_ref(), i, extension);
            let tree = DecisionTree::load(&path)
                .chain_err(|| format!("could not read tree {}", path.display()))?;
            info!("loaded {}", path.display());
            trees.push(tree);
        }
        Forest::from_trees(trees)
    }

    /// Saves every tree using the naming scheme of `load_with_extension`.
    pub fn save_with_extension<P: AsRef<Path>>(&self, prefix: P, extension: &str) -> Result<()> {
        for (i, tree) in self.trees.iter().enumerate() {
            let path = Forest::tree_path(prefix.as_ref(), i, extension);
            tree.save(&path).chain_err(|| format!("could not write tree {}", path.display()))?;
        }
        Ok(())
    }

    /// Filename of the tree with index `idx`
    pub fn tree_path(prefix: &Path, idx: usize, extension: &str) -> PathBuf {
        let mut name = prefix.as_os_str().to_os_string();
        name.push(format!("{:03}.{}", idx, extension));
        PathBuf::from(name)
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Number of trees
    pub fn len(&self) -> usize {
        self.trees.len()
    }

    /// Width of a patch the trees are evaluated on
    pub fn patch_width(&self) -> u32 {
        self.trees[0].patch_width()
    }

    /// Height of a patch the trees are evaluated on
    pub fn patch_height(&self) -> u32 {
        self.trees[0].patch_height()
    }

    /// Returns the leaf of every tree (in tree order) for the patch at `roi`.
    pub fn predict_all<'a>(&'a self, features: &FeatureImages, roi: Rect) -> Vec<&'a LeafRecord> {
        let mut leaves = Vec::with_capacity(self.trees.len());
        self.predict_into(features, roi, &mut leaves);
        leaves
    }

    /// Like `predict_all` but reuses the given vector.
    pub fn predict_into<'a>(&'a self,
                            features: &FeatureImages,
                            roi: Rect,
                            leaves: &mut Vec<&'a LeafRecord>) {
        leaves.clear();
        leaves.extend(self.trees.iter().map(|tree| tree.predict(features, roi)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::tree::tests::{half_split_tree, leaf};
    use image::Rgb;
    use std::env::temp_dir;
    use std::fs::remove_file;
    use std::process;
    use types::PointImage;

    fn three_trees() -> Vec<DecisionTree> {
        vec![half_split_tree(),
             DecisionTree::single_leaf(10, 10, leaf(0.5, 1.0, [1.0, 0.0, 0.0])),
             DecisionTree::single_leaf(10, 10, leaf(0.25, 2.0, [2.0, 0.0, 0.0]))]
    }

    #[test]
    fn test_from_trees() {
        let forest = Forest::from_trees(three_trees()).unwrap();
        assert_eq!(forest.len(), 3);
        assert_eq!(forest.patch_width(), 10);
        assert_eq!(forest.patch_height(), 10);

        let mut trees = three_trees();
        trees.push(DecisionTree::single_leaf(10, 12, leaf(0.5, 1.0, [0.0; 3])));
        match Forest::from_trees(trees) {
            Err(Error(ErrorKind::GeometryMismatch(expected, found), _)) => {
                assert_eq!(expected, (10, 10));
                assert_eq!(found, (10, 12));
            }
            _ => panic!("geometry mismatch expected"),
        }

        match Forest::from_trees(vec![]) {
            Err(Error(ErrorKind::EmptyForest, _)) => (),
            _ => panic!("empty forest expected"),
        }
    }

    #[test]
    fn test_predict_all_keeps_tree_order() {
        let forest = Forest::from_trees(three_trees()).unwrap();
        let img = PointImage::from_fn(20, 20, |x, y| Rgb([x as f32, y as f32, 1.0]));
        let features = FeatureImages::from_point_image(&img);
        let leaves = forest.predict_all(&features, Rect::new(3, 4, 10, 10));
        let probs: Vec<_> = leaves.iter().map(|l| l.p).collect();
        assert_eq!(probs, vec![0.2, 0.5, 0.25]);
    }

    #[test]
    fn test_tree_path() {
        let path = Forest::tree_path(Path::new("trees/tree"), 7, "tree");
        assert_eq!(path, PathBuf::from("trees/tree007.tree"));
        let path = Forest::tree_path(Path::new("new_"), 12, "bin");
        assert_eq!(path, PathBuf::from("new_012.bin"));
    }

    #[test]
    fn test_load() {
        let prefix = temp_dir().join(format!("headforest_forest_{}_", process::id()));
        let forest = Forest::from_trees(three_trees()).unwrap();
        forest.save_with_extension(&prefix, "bin").unwrap();

        let loaded = Forest::load_with_extension(&prefix, 3, "bin").unwrap();
        assert_eq!(loaded.trees(), forest.trees());
        // fewer trees are fine
        assert_eq!(Forest::load_with_extension(&prefix, 2, "bin").unwrap().len(), 2);
        // a missing tree spoils the forest
        assert!(Forest::load_with_extension(&prefix, 4, "bin").is_err());
        // wrong extension
        assert!(Forest::load(&prefix, 1).is_err());
        // no trees at all
        assert!(Forest::load_with_extension(&prefix, 0, "bin").is_err());

        for i in 0..3 {
            remove_file(Forest::tree_path(&prefix, i, "bin")).unwrap();
        }
    }
}
