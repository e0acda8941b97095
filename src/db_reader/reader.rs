use types::*;
use std::iter::Iterator;
use std::result::Result;
use image::Rgb;

/// Trait for reading recorded depth frames.
pub trait FrameReader {
    type Err;
    /// Iterator over the frames
    type Iter: Iterator<Item = Result<DepthFrame, Self::Err>>;

    /// Returns the number of frames available
    fn frame_count(&self) -> Result<usize, Self::Err>;

    /// Returns an iterator over all frames, in recording order.
    fn frames(&self) -> Result<Self::Iter, Self::Err>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadTransformation {
    /// The central head position in 3d
    pub pos3d: [f32; 3],
    /// The central head position in 2d (coordinates of the picture)
    pub pos2d: [f32; 2],
    /// The head rotation parameters (degree)
    pub rot: [f32; 3],
}

impl HeadTransformation {
    /// Creates the transformation of the head pose `[x, y, z, pitch, yaw, roll]`.
    pub fn from_pose(pose: &Pose, intrinsic: &IntrinsicMatrix) -> HeadTransformation {
        let p3 = [pose[0], pose[1], pose[2]];
        HeadTransformation {
            pos3d: p3,
            pos2d: intrinsic.space_to_img_coord(p3),
            rot: [pose[3], pose[4], pose[5]],
        }
    }

    /// Returns `[x, y, z, pitch, yaw, roll]`
    pub fn pose(&self) -> Pose {
        [self.pos3d[0], self.pos3d[1], self.pos3d[2], self.rot[0], self.rot[1], self.rot[2]]
    }

    /// Returns the x position in 3d
    pub fn x(&self) -> f32 {
        self.pos3d[0]
    }
    /// Returns the y position in 3d
    pub fn y(&self) -> f32 {
        self.pos3d[1]
    }
    /// Returns the z position in 3d
    pub fn z(&self) -> f32 {
        self.pos3d[2]
    }
    /// Returns the x position in 2d
    pub fn flat_x(&self) -> f32 {
        self.pos2d[0]
    }
    /// Returns the y position in 2d
    pub fn flat_y(&self) -> f32 {
        self.pos2d[1]
    }
    /// Returns the pitch rotation
    pub fn pitch(&self) -> f32 {
        self.rot[0]
    }
    /// Returns the yaw rotation
    pub fn yaw(&self) -> f32 {
        self.rot[1]
    }
    /// Returns the roll rotation
    pub fn roll(&self) -> f32 {
        self.rot[2]
    }
}

/// A recorded depth frame
pub struct DepthFrame {
    /// The depth image (millimeter)
    pub depth: DepthImage,
    /// Intrinsic matrix of the camera used
    pub intrinsic: IntrinsicMatrix,
    /// The ground truth of the head, if known
    pub truth: Option<HeadTransformation>,
}

impl DepthFrame {
    /// Converts the depth image into a point image.
    /// Depth values not within (0, `max_z`) are dropped.
    pub fn to_point_image(&self, max_z: f32) -> PointImage {
        depth_to_point_image(&self.depth, &self.intrinsic, max_z)
    }
}

/// Maps every pixel with a depth value within (0, `max_z`) to its 3d point.
/// All other pixels become (0, 0, 0).
pub fn depth_to_point_image(depth: &DepthImage,
                            intrinsic: &IntrinsicMatrix,
                            max_z: f32)
                            -> PointImage {
    PointImage::from_fn(depth.width(), depth.height(), |x, y| {
        let d = depth.get_pixel(x, y).data[0] as f32;
        if d > 0.0 && d < max_z {
            Rgb(intrinsic.img_to_space_coord([x as f32, y as f32], d))
        } else {
            Rgb([0.0, 0.0, 0.0])
        }
    })
}

/// Distance between an estimated and a true head pose
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseError {
    /// euclidean distance of the positions
    pub position: f32,
    /// euclidean distance of the angles (pitch, yaw, roll)
    pub angle: f32,
}

impl PoseError {
    pub fn between(truth: &Pose, estimate: &Pose) -> PoseError {
        let sq = |a: &[f32], b: &[f32]| -> f32 {
            a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
        };
        PoseError {
            position: sq(&truth[0..3], &estimate[0..3]).sqrt(),
            angle: sq(&truth[3..6], &estimate[3..6]).sqrt(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_back_projection() {
        let intrinsic = IntrinsicMatrix::new([[500.0, 0.0, 2.0], [0.0, 400.0, 1.0], [0.0, 0.0, 1.0]]);
        let depth = DepthImage::from_fn(4, 3, |x, y| match (x, y) {
            (3, 2) => Luma([1000u16]),
            (0, 0) => Luma([1500u16]),
            (1, 1) => Luma([1300u16]),
            _ => Luma([0u16]),
        });
        let img = depth_to_point_image(&depth, &intrinsic, 1300.0);
        assert_eq!(img.get_pixel(3, 2).data, [1000.0 * 1.0 / 500.0, 1000.0 * 1.0 / 400.0, 1000.0]);
        // too far away
        assert_eq!(img.get_pixel(0, 0).data, [0.0, 0.0, 0.0]);
        assert_eq!(img.get_pixel(1, 1).data, [0.0, 0.0, 0.0]);
        // no data
        assert_eq!(img.get_pixel(2, 2).data, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_frame_to_point_image() {
        let frame = DepthFrame {
            depth: DepthImage::from_fn(640, 480, |_, _| Luma([800u16])),
            intrinsic: IntrinsicMatrix::default_kinect_intrinsic(),
            truth: None,
        };
        let img = frame.to_point_image(2000.0);
        assert_eq!(img.get_pixel(320, 240).data, [0.0, 0.0, 800.0]);
        assert_eq!(img.get_pixel(40, 100).data[0], 800.0 * (40.0 - 320.0) / 560.0);
    }

    #[test]
    fn test_head_transformation() {
        let intrinsic = IntrinsicMatrix::default_kinect_intrinsic();
        let pose = [0.0, 10.0, 1000.0, 5.0, -6.0, 7.0];
        let trans = HeadTransformation::from_pose(&pose, &intrinsic);
        assert_eq!(trans.pose(), pose);
        assert_eq!(trans.flat_x(), 320.0);
        assert_eq!(trans.flat_y(), 240.0 + 5.6);
        assert_eq!((trans.pitch(), trans.yaw(), trans.roll()), (5.0, -6.0, 7.0));
    }

    #[test]
    fn test_pose_error() {
        let err = PoseError::between(&[0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                                     &[3.0, 4.0, 0.0, 1.0, 2.0, 2.0]);
        assert_eq!(err.position, 5.0);
        assert_eq!(err.angle, 3.0);
    }
}
