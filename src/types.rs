use image::{ImageBuffer, Luma, Rgb};

/// Raw depth image as delivered by the sensor (millimeters, 0 = no data).
pub type DepthImage = ImageBuffer<Luma<u16>, Vec<u16>>;

/// Image of 3d points. Channel 0 and 1 hold the world x and y coordinate of
/// every pixel, channel 2 its depth. A depth of zero or less marks a pixel
/// without data.
pub type PointImage = ImageBuffer<Rgb<f32>, Vec<f32>>;

/// Number of values describing a head pose.
pub const POSE_SIZE: usize = 6;

/// A head pose: `[x, y, z, pitch, yaw, roll]`.
pub type Pose = [f32; POSE_SIZE];

/// Squared euclidean distance of the positional part (x, y, z) of two poses.
/// The angles are ignored.
#[inline]
pub fn squared_distance3(a: &Pose, b: &Pose) -> f32 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    dx * dx + dy * dy + dz * dz
}

/// Represents a rectangle
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    topleft: [u32; 2],
    bottomright: [u32; 2],
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Rect {
        Rect {
            topleft: [x, y],
            bottomright: [x + width, y + height],
        }
    }

    pub fn width(&self) -> u32 {
        self.bottomright[0] - self.topleft[0]
    }
    pub fn height(&self) -> u32 {
        self.bottomright[1] - self.topleft[1]
    }
    pub fn x(&self) -> u32 {
        self.topleft[0]
    }
    pub fn y(&self) -> u32 {
        self.topleft[1]
    }
    /// x coordinate one past the last column
    pub fn right(&self) -> u32 {
        self.bottomright[0]
    }
    /// y coordinate one past the last row
    pub fn bottom(&self) -> u32 {
        self.bottomright[1]
    }
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Returns this rectangle moved by the origin of `other`.
    /// Used to place a rectangle given relative to a patch into the image.
    pub fn offset_by(&self, other: Rect) -> Rect {
        Rect::new(self.x() + other.x(),
                  self.y() + other.y(),
                  self.width(),
                  self.height())
    }

    /// Returns true if the rectangle does not exceed an area of
    /// `width` x `height` starting at (0,0).
    pub fn lies_within(&self, width: u32, height: u32) -> bool {
        self.right() <= width && self.bottom() <= height
    }
}

/// Represent a pinhole intrinsic matrix (no skew).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntrinsicMatrix(pub [[f32; 3]; 3]);

impl IntrinsicMatrix {
    pub fn new(mat: [[f32; 3]; 3]) -> IntrinsicMatrix {
        IntrinsicMatrix(mat)
    }

    /// Returns the default intrinsic matrix for a kinect
    pub fn default_kinect_intrinsic() -> IntrinsicMatrix {
        IntrinsicMatrix::new([[560.0, 0.0, 320.0], [0.0, 560.0, 240.0], [0.0, 0.0, 1.0]])
    }

    pub fn fx(&self) -> f32 {
        self.0[0][0]
    }
    pub fn fy(&self) -> f32 {
        self.0[1][1]
    }
    pub fn cx(&self) -> f32 {
        self.0[0][2]
    }
    pub fn cy(&self) -> f32 {
        self.0[1][2]
    }

    /// Maps the space coordinate to the corresponding image coordinate using this intrinsic matrix.
    pub fn space_to_img_coord(&self, space_coord: [f32; 3]) -> [f32; 2] {
        let z = space_coord[2];
        [self.fx() * space_coord[0] / z + self.cx(),
         self.fy() * space_coord[1] / z + self.cy()]
    }

    /// Maps the image coordinate to the corresponding space coordinate using this intrinsic matrix
    /// and the given z - value.
    pub fn img_to_space_coord(&self, img_coord: [f32; 2], z: f32) -> [f32; 3] {
        [z * (img_coord[0] - self.cx()) / self.fx(),
         z * (img_coord[1] - self.cy()) / self.fy(),
         z]
    }
}
