/// Conversion of leaf predictions into votes for head poses.

use types::Pose;
use super::tree::LeafRecord;

/// The average probability over all trees a patch needs
/// when voting with averaged forest results.
pub const MIN_AVERAGE_PROBABILITY: f32 = 0.9;

/// A vote for a head pose. The position is absolute,
/// the leaf which casted the vote is borrowed from the forest.
#[derive(Debug, Clone, Copy)]
pub struct Vote<'a> {
    /// `[x, y, z, pitch, yaw, roll]`
    pub pose: Pose,
    leaf: &'a LeafRecord,
}

impl<'a> Vote<'a> {
    /// Vote of `leaf` for a patch whose center lies at `center`
    pub fn new(leaf: &'a LeafRecord, center: [f32; 3]) -> Vote<'a> {
        let m = &leaf.mean;
        Vote {
            pose: [m[0] + center[0], m[1] + center[1], m[2] + center[2], m[3], m[4], m[5]],
            leaf: leaf,
        }
    }

    /// Vote with an already absolute pose
    #[cfg(test)]
    pub fn with_pose(pose: Pose, leaf: &'a LeafRecord) -> Vote<'a> {
        Vote {
            pose: pose,
            leaf: leaf,
        }
    }

    pub fn leaf(&self) -> &'a LeafRecord {
        self.leaf
    }

    /// Trace of the leaf's covariance
    pub fn trace(&self) -> f32 {
        self.leaf.trace
    }

    /// Probability of the leaf
    pub fn confidence(&self) -> f32 {
        self.leaf.p
    }

    pub fn position(&self) -> [f32; 3] {
        [self.pose[0], self.pose[1], self.pose[2]]
    }
}

/// Decides which leaves of a patch may vote.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoteGenerator {
    /// leaves with a larger trace are ignored
    pub max_variance: f32,
    /// leaves with a smaller probability are ignored
    pub prob_threshold: f32,
    /// Only let the trees vote if their average probability is high enough
    pub average: bool,
}

impl VoteGenerator {
    pub fn new(max_variance: f32, prob_threshold: f32, average: bool) -> VoteGenerator {
        VoteGenerator {
            max_variance: max_variance,
            prob_threshold: prob_threshold,
            average: average,
        }
    }

    /// Appends the votes of `leaves` (one per tree) for the patch centered at `center`.
    pub fn cast<'a>(&self, leaves: &[&'a LeafRecord], center: [f32; 3], votes: &mut Vec<Vote<'a>>) {
        if leaves.is_empty() {
            return;
        }
        if !self.average {
            for &leaf in leaves.iter() {
                if leaf.trace > self.max_variance || leaf.p < self.prob_threshold {
                    continue;
                }
                votes.push(Vote::new(leaf, center));
            }
            return;
        }

        let n = leaves.len() as f32;
        let mean_p = leaves.iter().map(|l| l.p).sum::<f32>() / n;
        let mean_trace = leaves.iter().map(|l| l.trace).sum::<f32>() / n;
        trace!("patch at {:?}: mean probability {}, mean trace {}",
               center,
               mean_p,
               mean_trace);
        if mean_p < MIN_AVERAGE_PROBABILITY {
            return;
        }
        for &leaf in leaves.iter() {
            if leaf.trace < self.max_variance && leaf.p >= self.prob_threshold {
                votes.push(Vote::new(leaf, center));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::tree::tests::leaf;

    #[test]
    fn test_vote_position() {
        let l = leaf(1.0, 3.0, [10.0, -20.0, 30.0]);
        let vote = Vote::new(&l, [1.0, 2.0, 800.0]);
        assert_eq!(vote.pose, [11.0, -18.0, 830.0, 1.0, 2.0, 3.0]);
        assert_eq!(vote.position(), [11.0, -18.0, 830.0]);
        assert_eq!(vote.trace(), 3.0);
        assert_eq!(vote.confidence(), 1.0);
        assert!(::std::ptr::eq(vote.leaf(), &l));
    }

    #[test]
    fn test_per_tree_gates() {
        let leaves = vec![leaf(1.0, 100.0, [0.0; 3]),
                          leaf(1.0, 400.0, [1.0, 0.0, 0.0]), // trace at the limit
                          leaf(1.0, 401.0, [2.0, 0.0, 0.0]),
                          leaf(0.99, 10.0, [3.0, 0.0, 0.0])];
        let refs: Vec<_> = leaves.iter().collect();
        let gen = VoteGenerator::new(400.0, 1.0, false);
        let mut votes = vec![];
        gen.cast(&refs, [0.0; 3], &mut votes);
        let xs: Vec<_> = votes.iter().map(|v| v.pose[0]).collect();
        assert_eq!(xs, vec![0.0, 1.0]);
    }

    #[test]
    fn test_average_gates() {
        let gen = VoteGenerator::new(400.0, 1.0, true);

        // mean probability 0.925 => the single leaves are checked
        let leaves = vec![leaf(1.0, 100.0, [0.0; 3]),
                          leaf(1.0, 400.0, [1.0, 0.0, 0.0]), // trace has to be strictly smaller
                          leaf(0.7, 10.0, [2.0, 0.0, 0.0]),
                          leaf(1.0, 10.0, [3.0, 0.0, 0.0])];
        let refs: Vec<_> = leaves.iter().collect();
        let mut votes = vec![];
        gen.cast(&refs, [0.0; 3], &mut votes);
        let xs: Vec<_> = votes.iter().map(|v| v.pose[0]).collect();
        assert_eq!(xs, vec![0.0, 3.0]);

        // mean probability 0.85 => nothing
        let leaves = vec![leaf(1.0, 1.0, [0.0; 3]), leaf(0.7, 1.0, [0.0; 3])];
        let refs: Vec<_> = leaves.iter().collect();
        let mut votes = vec![];
        gen.cast(&refs, [0.0; 3], &mut votes);
        assert!(votes.is_empty());

        // the same leaves vote in the other mode
        let mut votes = vec![];
        VoteGenerator::new(400.0, 1.0, false).cast(&refs, [0.0; 3], &mut votes);
        assert_eq!(votes.len(), 1);
    }

    #[test]
    fn test_votes_are_appended() {
        let l = leaf(1.0, 1.0, [0.0; 3]);
        let gen = VoteGenerator::new(10.0, 0.5, true);
        let mut votes = vec![];
        gen.cast(&[&l, &l], [1.0, 1.0, 1.0], &mut votes);
        gen.cast(&[&l], [2.0, 2.0, 2.0], &mut votes);
        gen.cast(&[], [3.0, 3.0, 3.0], &mut votes);
        assert_eq!(votes.len(), 3);
        assert_eq!(votes[2].position(), [2.0, 2.0, 2.0]);
    }
}
