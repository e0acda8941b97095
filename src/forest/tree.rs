/// A single decision tree of the regression forest.
///
/// Every inner node holds a binary test comparing the mean depth of two
/// rectangles within a patch. Every leaf holds the prediction for patches
/// reaching it: the probability of belonging to a head, the trace of the
/// covariance of the training votes, and their mean head pose.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::str::{FromStr, SplitWhitespace};

use errors::*;
use integral::{FeatureImages, FEATURE_CHANNELS};
use types::{Pose, Rect, POSE_SIZE};

/// In a node of the forest the mean values of two rectangles
/// within the patch are compared. If their difference is larger than
/// the threshold the right child is taken, otherwise the left one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinaryTest {
    /// feature channel the means are computed on
    pub channel: usize,
    pub threshold: i32,
    /// first rectangle, relative to the patch origin
    pub r1: Rect,
    /// second rectangle, relative to the patch origin
    pub r2: Rect,
}

impl BinaryTest {
    /// Evaluates this test for the patch located at `roi`.
    /// Returns true if the right child should be taken.
    #[inline]
    pub fn evaluate(&self, features: &FeatureImages, roi: Rect) -> bool {
        let mean1 = features.mean_in_rect(self.channel, self.r1.offset_by(roi));
        let mean2 = features.mean_in_rect(self.channel, self.r2.offset_by(roi));
        mean1 - mean2 > self.threshold as f64
    }
}

/// The prediction stored in a leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafRecord {
    /// Probability that a patch reaching this leaf belongs to a head
    pub p: f32,
    /// Trace of the covariance of the head positions voted by the
    /// training patches of this leaf. The lower, the more reliable.
    pub trace: f32,
    /// Mean head pose. The position is an offset relative to
    /// the 3d point at the patch center, the angles are absolute.
    pub mean: Pose,
}

/// A node within the arena of a tree.
/// Children always have a larger index than their parent.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Split {
        depth: u32,
        test: BinaryTest,
        /// taken if the test fails
        left: usize,
        /// taken if the test succeeds
        right: usize,
    },
    Leaf { depth: u32, leaf: LeafRecord },
}

impl Node {
    pub fn depth(&self) -> u32 {
        match *self {
            Node::Split { depth, .. } |
            Node::Leaf { depth, .. } => depth,
        }
    }
}

/// A decision tree. The nodes are stored in an arena,
/// the root is the first one.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionTree {
    patch_width: u32,
    patch_height: u32,
    nodes: Vec<Node>,
}

impl DecisionTree {
    /// Creates a tree from its nodes (root first).
    /// Fails if a child index does not point behind its parent, if a node
    /// other than the root has not exactly one parent, if a test rectangle
    /// exceeds the patch or if a test uses an unknown channel.
    pub fn from_nodes(patch_width: u32, patch_height: u32, nodes: Vec<Node>) -> Result<DecisionTree> {
        if nodes.is_empty() {
            bail!(ErrorKind::MalformedTree("tree without nodes".to_string()));
        }
        let mut parents = vec![0u32; nodes.len()];
        for (idx, node) in nodes.iter().enumerate() {
            if let Node::Split { ref test, left, right, .. } = *node {
                if left <= idx || right <= idx || left >= nodes.len() || right >= nodes.len() {
                    bail!(ErrorKind::MalformedTree(format!("invalid children of node {}", idx)));
                }
                check_test(test, patch_width, patch_height)?;
                parents[left] += 1;
                parents[right] += 1;
            }
        }
        // children point forward, so the root cannot have a parent
        if let Some(idx) = parents.iter().skip(1).position(|&n| n != 1) {
            bail!(ErrorKind::MalformedTree(format!("node {} has {} parents", idx + 1, parents[idx + 1])));
        }
        Ok(DecisionTree {
            patch_width: patch_width,
            patch_height: patch_height,
            nodes: nodes,
        })
    }

    /// A tree consisting of just one leaf.
    pub fn single_leaf(patch_width: u32, patch_height: u32, leaf: LeafRecord) -> DecisionTree {
        DecisionTree {
            patch_width: patch_width,
            patch_height: patch_height,
            nodes: vec![Node::Leaf { depth: 0, leaf: leaf }],
        }
    }

    /// Width of the patches this tree was trained with
    pub fn patch_width(&self) -> u32 {
        self.patch_width
    }

    /// Height of the patches this tree was trained with
    pub fn patch_height(&self) -> u32 {
        self.patch_height
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Returns an iterator over all leaves
    pub fn leaves<'a>(&'a self) -> Box<Iterator<Item = &'a LeafRecord> + 'a> {
        Box::new(self.nodes.iter().filter_map(|n| match *n {
            Node::Leaf { ref leaf, .. } => Some(leaf),
            Node::Split { .. } => None,
        }))
    }

    /// Sends the patch at `roi` (of size patch_width x patch_height) down the tree
    /// and returns the leaf it reaches.
    ///
    /// Panics if the patch exceeds the feature images.
    pub fn predict(&self, features: &FeatureImages, roi: Rect) -> &LeafRecord {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                Node::Leaf { ref leaf, .. } => return leaf,
                Node::Split { ref test, left, right, .. } => {
                    idx = if test.evaluate(features, roi) { right } else { left };
                }
            }
        }
    }

    /// Loads a tree from a text file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<DecisionTree> {
        let file = File::open(path)?;
        DecisionTree::read(BufReader::new(file))
    }

    /// Saves this tree into a text file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.write(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Parses a tree.
    ///
    /// The format is a whitespace separated list of values: the patch width and height
    /// followed by the nodes in pre-order. Every node starts with
    /// `depth is_split is_leaf` (flags are 0 or 1). A split node continues with
    /// `threshold channel r1.x r1.y r1.w r1.h r2.x r2.y r2.w r2.h` and is followed by its
    /// left and then its right subtree. A leaf continues with `p trace` and the six
    /// values of the mean pose.
    pub fn read<R: Read>(mut reader: R) -> Result<DecisionTree> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        let mut tokens = Tokens(text.split_whitespace());
        let patch_width = tokens.next("patch width")?;
        let patch_height = tokens.next("patch height")?;

        // Slot a parsed node has to be linked into
        enum Slot {
            Root,
            Left(usize),
            Right(usize),
        }

        let mut nodes: Vec<Node> = vec![];
        let mut pending = vec![Slot::Root];
        while let Some(slot) = pending.pop() {
            let idx = nodes.len();
            let depth = tokens.next("node depth")?;
            let is_split = tokens.flag("split flag")?;
            let is_leaf = tokens.flag("leaf flag")?;
            let node = match (is_split, is_leaf) {
                (true, false) => {
                    let threshold = tokens.next("threshold")?;
                    let channel = tokens.next("channel")?;
                    let r1 = tokens.rect()?;
                    let r2 = tokens.rect()?;
                    let test = BinaryTest {
                        channel: channel,
                        threshold: threshold,
                        r1: r1,
                        r2: r2,
                    };
                    check_test(&test, patch_width, patch_height)?;
                    // left is popped first
                    pending.push(Slot::Right(idx));
                    pending.push(Slot::Left(idx));
                    Node::Split {
                        depth: depth,
                        test: test,
                        left: 0,
                        right: 0,
                    }
                }
                (false, true) => {
                    let p = tokens.next("leaf probability")?;
                    let trace = tokens.next("leaf trace")?;
                    let mut mean = [0f32; POSE_SIZE];
                    for v in mean.iter_mut() {
                        *v = tokens.next("leaf mean")?;
                    }
                    Node::Leaf {
                        depth: depth,
                        leaf: LeafRecord {
                            p: p,
                            trace: trace,
                            mean: mean,
                        },
                    }
                }
                (true, true) => {
                    bail!(ErrorKind::MalformedTree(format!("node {} is split and leaf", idx)));
                }
                (false, false) => {
                    bail!(ErrorKind::MalformedTree(format!("node {} is neither split nor leaf", idx)));
                }
            };
            nodes.push(node);
            match slot {
                Slot::Root => (),
                Slot::Left(parent) => {
                    if let Node::Split { ref mut left, .. } = nodes[parent] {
                        *left = idx;
                    }
                }
                Slot::Right(parent) => {
                    if let Node::Split { ref mut right, .. } = nodes[parent] {
                        *right = idx;
                    }
                }
            }
        }
        Ok(DecisionTree {
            patch_width: patch_width,
            patch_height: patch_height,
            nodes: nodes,
        })
    }

    /// Writes this tree in the format understood by `read`.
    pub fn write<W: Write>(&self, mut writer: W) -> Result<()> {
        writeln!(writer, "{} {}", self.patch_width, self.patch_height)?;
        let mut stack = vec![0usize];
        while let Some(idx) = stack.pop() {
            match self.nodes[idx] {
                Node::Split { depth, ref test, left, right } => {
                    writeln!(writer,
                             "{} 1 0 {} {} {} {} {} {} {} {} {} {}",
                             depth,
                             test.threshold,
                             test.channel,
                             test.r1.x(),
                             test.r1.y(),
                             test.r1.width(),
                             test.r1.height(),
                             test.r2.x(),
                             test.r2.y(),
                             test.r2.width(),
                             test.r2.height())?;
                    stack.push(right);
                    stack.push(left);
                }
                Node::Leaf { depth, ref leaf } => {
                    write!(writer, "{} 0 1 {} {}", depth, leaf.p, leaf.trace)?;
                    for v in leaf.mean.iter() {
                        write!(writer, " {}", v)?;
                    }
                    writeln!(writer)?;
                }
            }
        }
        Ok(())
    }
}

/// Test rectangles have to lie within the patch, otherwise the lookups
/// in the integral images would leave the image.
fn check_test(test: &BinaryTest, patch_width: u32, patch_height: u32) -> Result<()> {
    if test.channel >= FEATURE_CHANNELS {
        bail!(ErrorKind::MalformedTree(format!("unknown feature channel {}", test.channel)));
    }
    for rect in [test.r1, test.r2].iter() {
        if !rect.lies_within(patch_width, patch_height) {
            bail!(ErrorKind::MalformedTree(format!("{:?} exceeds patch {}x{}",
                                                   rect,
                                                   patch_width,
                                                   patch_height)));
        }
    }
    Ok(())
}

struct Tokens<'a>(SplitWhitespace<'a>);

impl<'a> Tokens<'a> {
    fn next<T: FromStr>(&mut self, what: &str) -> Result<T> {
        let token = match self.0.next() {
            Some(x) => x,
            None => {
                bail!(ErrorKind::MalformedTree(format!("unexpected end, expected {}", what)));
            }
        };
        token.parse()
            .map_err(|_| Error::from(ErrorKind::MalformedTree(format!("cannot parse '{}' as {}", token, what))))
    }

    fn flag(&mut self, what: &str) -> Result<bool> {
        match self.next::<u8>(what)? {
            0 => Ok(false),
            1 => Ok(true),
            x => {
                bail!(ErrorKind::MalformedTree(format!("invalid {} {}", what, x)));
            }
        }
    }

    fn rect(&mut self) -> Result<Rect> {
        let x: u32 = self.next("rectangle x")?;
        let y: u32 = self.next("rectangle y")?;
        let w: u32 = self.next("rectangle width")?;
        let h: u32 = self.next("rectangle height")?;
        if x.checked_add(w).is_none() || y.checked_add(h).is_none() {
            bail!(ErrorKind::MalformedTree(format!("rectangle {} {} {} {} overflows", x, y, w, h)));
        }
        Ok(Rect::new(x, y, w, h))
    }
}
