/// Grouping of votes into head candidates.
///
/// The votes are first grouped by a coarse radius clustering. Afterwards
/// every group is refined by mean shifting, started from its mean and from
/// some randomly chosen votes of the group.

use rand::Rng;
use forest::voting::Vote;
use types::{squared_distance3, Pose, POSE_SIZE};

/// Average diameter of a head in millimeters
pub const AVG_FACE_DIAMETER: f32 = 236.4;

/// Maximal number of clusters created by the radius clustering
pub const MAX_CLUSTERS: usize = 20;

/// Number of starting points for mean shifting a cluster
pub const MEANSHIFT_SEEDS: usize = 8;

/// Maximal number of mean shift iterations per starting point
pub const MEANSHIFT_ITERATIONS: usize = 10;

/// Mean shifting stops if the mean moved less (squared distance)
pub const MEANSHIFT_CONVERGENCE: f32 = 1.0;

/// The means of the radius clustering are updated every this many votes
pub const MEAN_UPDATE_INTERVAL: usize = 10;

/// Seed of the generator choosing the mean shift starting points.
/// Every estimation starts with the same seed.
pub const RNG_SEED: [u32; 4] = [100, 0x193a_6754, 0xa8a7_d469, 0x9783_0e05];

/// A group of votes
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub mean: Pose,
    /// indices of the member votes
    pub members: Vec<usize>,
}

impl Cluster {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Squared radius of a cluster: the squared head diameter divided by the squared `ratio`
pub fn squared_radius(ratio: f32) -> f32 {
    AVG_FACE_DIAMETER * AVG_FACE_DIAMETER / (ratio * ratio)
}

/// Unweighted mean pose of the selected votes.
/// Returns zeros for an empty selection.
pub fn mean_pose(votes: &[Vote], members: &[usize]) -> Pose {
    // accumulated in f64, clusters may hold tens of thousands of votes
    let mut sum = [0f64; POSE_SIZE];
    for &idx in members.iter() {
        for (m, v) in sum.iter_mut().zip(votes[idx].pose.iter()) {
            *m += *v as f64;
        }
    }
    let div = if members.is_empty() { 1.0 } else { members.len() as f64 };
    let mut mean = [0f32; POSE_SIZE];
    for (m, s) in mean.iter_mut().zip(sum.iter()) {
        *m = (*s / div) as f32;
    }
    mean
}

/// Groups the votes by their position.
///
/// A vote joins the first cluster (in order of creation) whose mean is closer
/// than the radius. If there is none, a new cluster starting at the vote is
/// created unless there are already `max_clusters` clusters; in that case the
/// vote is dropped. The means are only updated every tenth vote.
pub fn radius_clustering(votes: &[Vote], radius_sq: f32, max_clusters: usize) -> Vec<Cluster> {
    let mut clusters: Vec<Cluster> = vec![];
    for (l, vote) in votes.iter().enumerate() {
        let found = clusters.iter()
            .position(|c| squared_distance3(&vote.pose, &c.mean) < radius_sq);
        match found {
            Some(c) => clusters[c].members.push(l),
            None => {
                if clusters.len() < max_clusters {
                    clusters.push(Cluster {
                        mean: vote.pose,
                        members: vec![l],
                    });
                }
            }
        }

        if l % MEAN_UPDATE_INTERVAL == 0 {
            for c in clusters.iter_mut().filter(|c| !c.is_empty()) {
                c.mean = mean_pose(votes, &c.members);
            }
        }
    }
    clusters
}

/// Mean shifting within `cluster` starting at `start`.
/// Returns the final mean and the members within the radius of it.
fn shift(votes: &[Vote], cluster: &Cluster, start: Pose, radius_sq: f32) -> Cluster {
    let mut mean = start;
    let mut members = vec![];
    for _ in 0..MEANSHIFT_ITERATIONS {
        members = cluster.members
            .iter()
            .cloned()
            .filter(|&idx| squared_distance3(&votes[idx].pose, &mean) < radius_sq)
            .collect();
        // Nothing close, stay
        if members.is_empty() {
            break;
        }
        let new_mean = mean_pose(votes, &members);
        let moved = squared_distance3(&new_mean, &mean);
        mean = new_mean;
        if moved < MEANSHIFT_CONVERGENCE {
            break;
        }
    }
    Cluster {
        mean: mean,
        members: members,
    }
}

/// Refines a cluster by mean shifting.
///
/// The first starting point is the cluster's mean, the others are votes drawn
/// uniformly from the cluster with `rng`. The result with the most members wins,
/// on ties the earlier starting point.
pub fn refine_cluster<R: Rng>(votes: &[Vote],
                              cluster: &Cluster,
                              radius_sq: f32,
                              rng: &mut R)
                              -> Cluster {
    if cluster.is_empty() {
        return cluster.clone();
    }
    let draws: Vec<usize> = (0..MEANSHIFT_SEEDS)
        .map(|_| rng.gen_range(0, cluster.len()))
        .collect();

    let mut best: Option<Cluster> = None;
    for (seed, &draw) in draws.iter().enumerate() {
        let start = if seed == 0 {
            cluster.mean
        } else {
            votes[cluster.members[draw]].pose
        };
        let candidate = shift(votes, cluster, start, radius_sq);
        let better = match best {
            Some(ref b) => candidate.len() > b.len(),
            None => true,
        };
        if better {
            best = Some(candidate);
        }
    }
    best.unwrap_or_else(|| cluster.clone())
}

/// Sorts the clusters by their size (largest first) and returns at most
/// `max_heads` of them. Stops at the first cluster with less than `min_votes`
/// members. The means of the returned clusters are recomputed from their members.
pub fn rank_clusters(votes: &[Vote],
                     mut clusters: Vec<Cluster>,
                     min_votes: usize,
                     max_heads: usize)
                     -> Vec<Cluster> {
    // stable, equal sizes keep their order
    clusters.sort_by(|a, b| b.len().cmp(&a.len()));
    clusters.into_iter()
        .take(max_heads)
        .take_while(|c| c.len() >= min_votes)
        .map(|mut c| {
            if !c.is_empty() {
                c.mean = mean_pose(votes, &c.members);
            }
            c
        })
        .collect()
}
