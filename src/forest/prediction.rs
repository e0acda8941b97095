/// Estimation of head poses within a point image using a regression forest.

use std::path::Path;

use rand::{SeedableRng, XorShiftRng};
use rayon::prelude::*;

use config::{EstimationParams, EstimatorConfig};
use errors::*;
use meanshift::{radius_clustering, rank_clusters, refine_cluster, squared_radius, MAX_CLUSTERS,
                RNG_SEED};
use patch::PatchSampler;
use types::{PointImage, Pose};
use super::Forest;
use super::voting::{Vote, VoteGenerator};

// Logs at info level for verbose estimations, at debug level otherwise
macro_rules! report {
    ($verbose: expr, $($arg: tt)*) => (
        if $verbose { info!($($arg)*) } else { debug!($($arg)*) }
    )
}

/// An estimated head.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadPose {
    /// `[x, y, z, pitch, yaw, roll]`
    pub pose: Pose,
    /// indices of the supporting votes
    pub votes: Vec<usize>,
}

impl HeadPose {
    pub fn position(&self) -> [f32; 3] {
        [self.pose[0], self.pose[1], self.pose[2]]
    }

    pub fn rotation(&self) -> [f32; 3] {
        [self.pose[3], self.pose[4], self.pose[5]]
    }
}

/// Result of an estimation. The votes borrow the leaves of the forest.
#[derive(Debug, Clone)]
pub struct Estimation<'a> {
    /// heads found, the one with the most votes first
    pub heads: Vec<HeadPose>,
    /// every vote casted
    pub votes: Vec<Vote<'a>>,
}

/// Estimates head poses using a forest.
/// The estimator does not change while estimating,
/// so it can be shared between threads.
#[derive(Debug, Clone)]
pub struct HeadPoseEstimator {
    forest: Forest,
    average_votes: bool,
}

impl HeadPoseEstimator {
    /// Creates an estimator voting with averaged forest results.
    pub fn new(forest: Forest) -> HeadPoseEstimator {
        HeadPoseEstimator {
            forest: forest,
            average_votes: true,
        }
    }

    /// Sets whether the trees of a patch only vote if their average
    /// probability is high enough (`true`) or every tree on its own (`false`).
    pub fn average_votes(mut self, average: bool) -> Self {
        self.average_votes = average;
        self
    }

    /// Loads `tree_count` trees named `<prefix>000.tree`, ...
    pub fn load<P: AsRef<Path>>(prefix: P, tree_count: usize) -> Result<HeadPoseEstimator> {
        Ok(HeadPoseEstimator::new(Forest::load(prefix, tree_count)?))
    }

    /// Loads the forest described by the configuration.
    pub fn from_config(config: &EstimatorConfig) -> Result<HeadPoseEstimator> {
        let forest = Forest::load_with_extension(&config.tree_prefix,
                                                 config.tree_count,
                                                 &config.tree_extension)?;
        Ok(HeadPoseEstimator::new(forest).average_votes(config.average_votes))
    }

    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    pub fn uses_average_votes(&self) -> bool {
        self.average_votes
    }

    fn vote_generator(&self, params: &EstimationParams) -> VoteGenerator {
        VoteGenerator::new(params.max_variance, params.prob_threshold, self.average_votes)
    }

    fn sampler<'b>(&self, img: &'b PointImage, params: &EstimationParams) -> PatchSampler<'b> {
        PatchSampler::new(img,
                          self.forest.patch_width(),
                          self.forest.patch_height(),
                          params.stride)
    }

    /// Votes of the patches within one row
    fn row_votes<'a>(&'a self,
                     sampler: &PatchSampler,
                     generator: &VoteGenerator,
                     y: u32)
                     -> Vec<Vote<'a>> {
        let mut votes = vec![];
        let mut leaves = Vec::with_capacity(self.forest.len());
        for patch in sampler.row(y) {
            self.forest.predict_into(sampler.features(), patch.roi, &mut leaves);
            generator.cast(&leaves, patch.center, &mut votes);
        }
        votes
    }

    /// Sends every admitted patch of `img` through the forest and returns the votes.
    pub fn collect_votes<'a>(&'a self,
                             img: &PointImage,
                             params: &EstimationParams)
                             -> Result<Vec<Vote<'a>>> {
        params.validate()?;
        let sampler = self.sampler(img, params);
        let generator = self.vote_generator(params);
        let mut votes = vec![];
        for y in sampler.rows() {
            votes.extend(self.row_votes(&sampler, &generator, y));
        }
        Ok(votes)
    }

    /// Like `collect_votes`, but the rows are processed on multiple cores.
    /// The votes are in the same order.
    pub fn collect_votes_parallel<'a>(&'a self,
                                      img: &PointImage,
                                      params: &EstimationParams)
                                      -> Result<Vec<Vote<'a>>> {
        params.validate()?;
        let sampler = self.sampler(img, params);
        let generator = self.vote_generator(params);
        let rows: Vec<Vec<Vote<'a>>> = sampler.rows()
            .par_iter()
            .map(|&y| self.row_votes(&sampler, &generator, y))
            .collect();
        Ok(rows.into_iter().flat_map(|r| r.into_iter()).collect())
    }

    /// Estimates the head poses within the point image using a single core.
    pub fn estimate<'a>(&'a self,
                        img: &PointImage,
                        params: &EstimationParams)
                        -> Result<Estimation<'a>> {
        let votes = self.collect_votes(img, params)?;
        Ok(self.cluster_votes(votes, params))
    }

    /// Estimates the head poses within the point image using multiple cores.
    /// The result equals the one of `estimate`.
    pub fn estimate_parallel<'a>(&'a self,
                                 img: &PointImage,
                                 params: &EstimationParams)
                                 -> Result<Estimation<'a>> {
        let votes = self.collect_votes_parallel(img, params)?;
        Ok(self.cluster_votes(votes, params))
    }

    /// Groups the votes to heads.
    fn cluster_votes<'a>(&'a self, votes: Vec<Vote<'a>>, params: &EstimationParams) -> Estimation<'a> {
        let verbose = params.verbose;
        report!(verbose, "votes: {}", votes.len());

        let clusters = radius_clustering(&votes,
                                         squared_radius(params.larger_radius_ratio),
                                         MAX_CLUSTERS);
        report!(verbose,
                "{} clusters {:?}",
                clusters.len(),
                clusters.iter().map(|c| c.len()).collect::<Vec<_>>());

        let mut rng = XorShiftRng::from_seed(RNG_SEED);
        let ms_radius = squared_radius(params.smaller_radius_ratio);
        let refined: Vec<_> = clusters.iter()
            .map(|c| refine_cluster(&votes, c, ms_radius, &mut rng))
            .collect();

        let min_votes = params.min_head_votes(self.forest.len());
        let heads = rank_clusters(&votes, refined, min_votes, params.max_faces);
        report!(verbose,
                "{} heads (at least {} votes) {:?}",
                heads.len(),
                min_votes,
                heads.iter().map(|c| c.len()).collect::<Vec<_>>());

        Estimation {
            heads: heads.into_iter()
                .map(|c| {
                    HeadPose {
                        pose: c.mean,
                        votes: c.members,
                    }
                })
                .collect(),
            votes: votes,
        }
    }
}
