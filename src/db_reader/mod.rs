/// This module defines functions to load recorded depth frames and their
/// ground truth. The current implementation only handles the format of the
/// BIWI database (see https://data.vision.ee.ethz.ch/cvl/gfanelli/head_pose/head_forest.html)

pub mod reader;
pub mod biwi;
