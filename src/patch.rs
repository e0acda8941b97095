/// Extraction of the patches a forest is evaluated on.
///
/// A window of the forest's patch size slides over the part of the image
/// that contains depth data. Only patches with depth data at their center
/// and with enough valid pixels are passed on to the trees.

use integral::FeatureImages;
use types::{PointImage, Rect};

macro_rules! max {
    ($x: expr, $y: expr) => (if $x > $y {$x} else {$y})
}

macro_rules! min {
    ($x: expr, $y: expr) => (if $x < $y {$x} else {$y})
}

/// Returns the bounding box of all pixels with a positive depth,
/// enlarged by half the patch size and clamped to the image.
/// An image without depth data results in an empty rectangle.
pub fn bounding_box(img: &PointImage, patch_width: u32, patch_height: u32) -> Rect {
    let (cols, rows) = (img.width() as i64, img.height() as i64);
    let (mut min_x, mut min_y) = (cols, rows);
    let (mut max_x, mut max_y) = (0i64, 0i64);
    let mut found = false;
    for (x, y, px) in img.enumerate_pixels() {
        if px.data[2] > 0.0 {
            let (x, y) = (x as i64, y as i64);
            min_x = min!(min_x, x);
            min_y = min!(min_y, y);
            max_x = max!(max_x, x);
            max_y = max!(max_y, y);
            found = true;
        }
    }
    if !found {
        return Rect::new(0, 0, 0, 0);
    }
    let (pw, ph) = (patch_width as i64, patch_height as i64);
    let x = min!(cols - 1, max!(0, min_x - pw / 2));
    let y = min!(rows - 1, max!(0, min_y - ph / 2));
    let w = max!(0, min!(max_x - min_x + pw, cols - x));
    let h = max!(0, min!(max_y - min_y + ph, rows - y));
    Rect::new(x as u32, y as u32, w as u32, h as u32)
}

/// Window positions starting at `start`, stepping by `stride`, for which
/// a window of length `len` ends before `end`.
fn window_positions(start: u32, end: u32, len: u32, stride: u32) -> Vec<u32> {
    let mut res = vec![];
    let mut pos = start as u64;
    while pos + (len as u64) < end as u64 {
        res.push(pos as u32);
        pos += stride as u64;
    }
    res
}

/// An admitted patch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Patch {
    /// position and size of the patch within the image
    pub roi: Rect,
    /// 3d point at the center of the patch
    pub center: [f32; 3],
}

/// Enumerates the admitted patches of one point image.
pub struct PatchSampler<'a> {
    img: &'a PointImage,
    features: FeatureImages,
    bbox: Rect,
    patch_width: u32,
    patch_height: u32,
    stride: u32,
}

impl<'a> PatchSampler<'a> {
    /// Builds the integral images and the bounding box of `img`.
    ///
    /// Panics if the stride is zero.
    pub fn new(img: &'a PointImage,
               patch_width: u32,
               patch_height: u32,
               stride: u32)
               -> PatchSampler<'a> {
        assert!(stride > 0, "stride has to be positive");
        PatchSampler {
            img: img,
            features: FeatureImages::from_point_image(img),
            bbox: bounding_box(img, patch_width, patch_height),
            patch_width: patch_width,
            patch_height: patch_height,
            stride: stride,
        }
    }

    pub fn features(&self) -> &FeatureImages {
        &self.features
    }

    pub fn bounding_box(&self) -> Rect {
        self.bbox
    }

    /// Minimal number of valid pixels a patch needs to be admitted
    /// (it has to be exceeded).
    pub fn min_valid_pixels(&self) -> u32 {
        self.patch_width * self.patch_height / 10
    }

    /// The y coordinates of all patch rows
    pub fn rows(&self) -> Vec<u32> {
        window_positions(self.bbox.y(), self.bbox.bottom(), self.patch_height, self.stride)
    }

    /// The x coordinates of all patches within a row
    pub fn columns(&self) -> Vec<u32> {
        window_positions(self.bbox.x(), self.bbox.right(), self.patch_width, self.stride)
    }

    /// Returns the patch at `roi` if it passes both gates: the center
    /// has to have depth data and more than a tenth of the pixels have to be valid.
    ///
    /// Panics if `roi` exceeds the image.
    pub fn admit(&self, roi: Rect) -> Option<Patch> {
        let cx = roi.x() + self.patch_width / 2;
        let cy = roi.y() + self.patch_height / 2;
        let px = self.img.get_pixel(cx, cy);
        // also rejects NaN
        if !(px.data[2] > 0.0) {
            return None;
        }
        if self.features.valid_pixels(roi) <= self.min_valid_pixels() as f64 {
            return None;
        }
        Some(Patch {
            roi: roi,
            center: [px.data[0], px.data[1], px.data[2]],
        })
    }

    /// Admitted patches of the row starting at `y`, from left to right.
    pub fn row(&self, y: u32) -> Vec<Patch> {
        self.columns()
            .into_iter()
            .filter_map(|x| self.admit(Rect::new(x, y, self.patch_width, self.patch_height)))
            .collect()
    }

    /// All admitted patches, row by row.
    pub fn patches(&self) -> Vec<Patch> {
        let mut res = vec![];
        for y in self.rows() {
            res.extend(self.row(y));
        }
        res
    }
}
