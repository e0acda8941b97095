extern crate rand;
#[macro_use]
extern crate serde_derive;
extern crate serde;
extern crate serde_json;
extern crate rayon;

#[macro_use]
extern crate lazy_static;
extern crate byteorder;
extern crate regex;
extern crate image;

#[macro_use]
extern crate log;
#[macro_use]
extern crate error_chain;

pub mod errors;
pub mod db_reader;

pub mod types;
pub mod integral;
pub mod patch;
pub mod forest;
pub mod meanshift;
pub mod config;

pub use config::{EstimationParams, EstimatorConfig};
pub use forest::Forest;
pub use forest::prediction::{Estimation, HeadPose, HeadPoseEstimator};
