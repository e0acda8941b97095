/// This program evaluates the head pose estimation on directories of the BIWI database

extern crate headforest;

extern crate clap;

#[macro_use]
extern crate log;
extern crate env_logger;
#[macro_use]
extern crate error_chain;

extern crate serde_json;
extern crate serde;
#[macro_use]
extern crate serde_derive;

use headforest::{EstimatorConfig, HeadPoseEstimator};
use headforest::db_reader::biwi::{BiwiReader, BiwiReadError};
use headforest::db_reader::reader::{FrameReader, PoseError};

use clap::{Arg, App};

use std::fs::File;
use std::io::{Write, Result as IOResult};

error_chain!{
    links {
        Forest(headforest::errors::Error, headforest::errors::ErrorKind);
    }
    foreign_links {
        Biwi(BiwiReadError);
        IO(std::io::Error);
        Serde(serde_json::Error);
    }
}

pub fn main() {
    use std::process::exit;
    if let Err(e) = main_() {
        eprintln!("Error: {}", e);
        exit(-1);
    }
}

fn main_() -> Result<()> {
    env_logger::init();
    let args = App::new("biwi_evaluate")
        .arg(Arg::with_name("config")
            .short("c")
            .long("config")
            .required(true)
            .takes_value(true)
            .help("Configuration file (json)"))
        .arg(Arg::with_name("dirs")
            .short("d")
            .long("data")
            .required(true)
            .takes_value(true)
            .multiple(true)
            .help("Directories with frames of the database, e.g. hpdb/01 hpdb/02"))
        .arg(Arg::with_name("out")
            .short("o")
            .long("output")
            .takes_value(true)
            .help("File to save the evaluation result (json)"))
        .arg(Arg::with_name("parallel")
            .short("p")
            .long("parallel")
            .help("Use multiple cores"))
        .get_matches();

    let config_path = args.value_of("config").ok_or("Invalid parameter for the configuration")?;
    let dirs: Vec<&str> = args.values_of("dirs").ok_or("Invalid parameter for data path")?.collect();
    let parallel = args.is_present("parallel");

    let config = EstimatorConfig::from_file(config_path)?;
    let estimator = HeadPoseEstimator::from_config(&config)?;

    let mut res = EvaluationResult::new(config_path);
    info!("Start evaluation");
    for dir in dirs.iter() {
        res.evaluate(&BiwiReader::new(*dir), &estimator, &config, parallel)?;
    }
    info!("Finish evaluation successfully");

    let summary = res.summary();
    println!("Frames: {}, without head: {}", summary.frames, summary.missed);
    println!("Mean head error: {} mm", summary.mean_position_error);
    println!("Mean angle error: {} degrees", summary.mean_angle_error);

    if let Some(out) = args.value_of("out") {
        let json = serde_json::to_string(&res)?;
        match save_text_file(out, json.as_bytes()) {
            Ok(()) => info!("Evaluation saved to {}", out),
            Err(r) => {
                error!("Error: {}", r);
                info!("Error occurs while saving, print result to stdout instead");
                println!("{}", json);
            }
        }
    }
    Ok(())
}

pub fn save_text_file<P: AsRef<std::path::Path>>(filename: P, data: &[u8]) -> IOResult<()> {
    let mut file = File::create(filename)?;
    file.write_all(data)?;
    Ok(())
}

#[derive(Debug, Serialize, Deserialize)]
struct EvalEntry {
    frame: usize,
    guess: Option<[f32; 6]>,
    truth: Option<[f32; 6]>,
    error: Option<PoseError>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Summary {
    frames: usize,
    missed: usize,
    mean_position_error: f32,
    mean_angle_error: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct EvaluationResult {
    // Configuration used for the estimation
    config_path: String,
    // Directory and evaluation results of every frame
    res: Vec<(String, Vec<EvalEntry>)>,
}

impl EvaluationResult {
    fn new<I: Into<String>>(config_path: I) -> EvaluationResult {
        EvaluationResult {
            config_path: config_path.into(),
            res: vec![],
        }
    }

    fn evaluate(&mut self,
                reader: &BiwiReader,
                estimator: &HeadPoseEstimator,
                config: &EstimatorConfig,
                parallel: bool)
                -> Result<()> {
        let len = reader.frame_count()?;
        let dir = reader.dir().display().to_string();
        info!("Evaluate {} ({} frames)", dir, len);
        let mut entries = vec![];
        for (i, frame) in reader.frames()?.enumerate() {
            print!("\rEvaluate image {} of {}", i + 1, len);
            std::io::stdout().flush()?;
            let frame = frame?;
            let img = frame.to_point_image(config.max_z);
            let estimation = if parallel {
                estimator.estimate_parallel(&img, &config.params)?
            } else {
                estimator.estimate(&img, &config.params)?
            };
            let guess = estimation.heads.first().map(|h| h.pose);
            let truth = frame.truth.map(|t| t.pose());
            let error = match (truth, guess) {
                (Some(ref t), Some(ref g)) => Some(PoseError::between(t, g)),
                _ => None,
            };
            entries.push(EvalEntry {
                frame: i,
                guess: guess,
                truth: truth,
                error: error,
            });
        }
        println!("");
        self.res.push((dir, entries));
        Ok(())
    }

    fn summary(&self) -> Summary {
        let entries: Vec<&EvalEntry> = self.res.iter().flat_map(|r| r.1.iter()).collect();
        let errors: Vec<PoseError> = entries.iter().filter_map(|e| e.error).collect();
        let n = if errors.is_empty() { 1.0 } else { errors.len() as f32 };
        Summary {
            frames: entries.len(),
            missed: entries.iter().filter(|e| e.guess.is_none()).count(),
            mean_position_error: errors.iter().map(|e| e.position).sum::<f32>() / n,
            mean_angle_error: errors.iter().map(|e| e.angle).sum::<f32>() / n,
        }
    }
}
