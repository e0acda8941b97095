/// Estimates the head pose within a compressed depth image of the BIWI database.
/// The calibration file `depth.cal` has to be in the same directory as the image.
/// If a ground truth file exists, the error of the estimation is reported too.

extern crate headforest;
extern crate clap;
#[macro_use]
extern crate error_chain;

extern crate serde_json;
#[macro_use]
extern crate log;
extern crate env_logger;

use headforest::{EstimatorConfig, HeadPoseEstimator};
use headforest::db_reader::biwi::{load_frame, BiwiReadError};
use headforest::db_reader::reader::PoseError;

use clap::{Arg, App};

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
        for cause in e.iter().skip(1) {
            eprintln!("  caused by: {}", cause);
        }
        exit(-1);
    }
}

fn main_() -> Result<()> {
    env_logger::init();

    let args = App::new("Head pose estimation")
        .arg(Arg::with_name("config")
            .short("c")
            .long("config")
            .required(true)
            .takes_value(true)
            .help("Configuration file (json)"))
        .arg(Arg::with_name("depth")
            .short("d")
            .long("depth")
            .required_unless("write_config")
            .takes_value(true)
            .help("Compressed depth image (*_depth.bin)"))
        .arg(Arg::with_name("write_config")
            .long("write-config")
            .help("Write the default configuration to the config file and exit"))
        .arg(Arg::with_name("parallel")
            .short("p")
            .long("parallel")
            .help("Use multiple cores"))
        .get_matches();

    let config_path = args.value_of("config").ok_or("Invalid parameter for the configuration")?;
    if args.is_present("write_config") {
        EstimatorConfig::default().save(config_path)?;
        info!("Default configuration written to {}", config_path);
        return Ok(());
    }
    let depth_path = args.value_of("depth").ok_or("Invalid parameter for the depth image")?;

    let config = EstimatorConfig::from_file(config_path)?;
    info!("Trees: {} {}", config.tree_count, config.tree_prefix.display());
    info!("Stride: {}", config.params.stride);
    info!("Max Variance: {}", config.params.max_variance);
    info!("Max Distance: {}", config.max_z);
    info!("Head Threshold: {}", config.params.head_threshold);

    let estimator = HeadPoseEstimator::from_config(&config)?;
    let frame = load_frame(depth_path)?;
    let img = frame.to_point_image(config.max_z);

    let estimation = if args.is_present("parallel") {
        estimator.estimate_parallel(&img, &config.params)?
    } else {
        estimator.estimate(&img, &config.params)?
    };

    println!("Heads found: {}", estimation.heads.len());
    // assume there is only one head in the image
    if let Some(head) = estimation.heads.first() {
        println!("Estimated: {:?}", head.pose);
        if let Some(truth) = frame.truth {
            let err = PoseError::between(&truth.pose(), &head.pose);
            println!("Ground T.: {:?}", truth.pose());
            println!("Head error: {} mm", err.position);
            println!("Angle error: {} degrees", err.angle);
        }
        let center = frame.intrinsic.space_to_img_coord(head.position());
        println!("Head center in the image: {:?}", center);
    }
    Ok(())
}
