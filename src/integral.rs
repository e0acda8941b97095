/// Summed-area tables (integral images) of a point image.
///
/// The binary tests of the trees compare the mean depth of two rectangles.
/// With integral images every such mean is computed with a constant number
/// of lookups, regardless of the size of the rectangle.

use types::{PointImage, Rect};

/// Depth values are multiplied by this factor before they are integrated.
pub const DEPTH_SCALE: f32 = 1000.0;

/// A pixel is valid if its scaled depth is larger than this value.
pub const VALID_DEPTH_THRESHOLD: f32 = 10.0;

/// Number of feature channels a tree test may address.
/// Only the depth channel is used.
pub const FEATURE_CHANNELS: usize = 1;

/// A summed-area table of an image of size `width` x `height`.
/// The table itself has one more row and column, so that
/// `at(x, y)` is the sum of all values left of `x` and above `y`.
pub struct IntegralImage {
    width: u32,
    height: u32,
    data: Vec<f64>,
}

impl IntegralImage {
    /// Integrates the values `f(x, y)` of an image with the given size.
    pub fn from_fn<F>(width: u32, height: u32, f: F) -> IntegralImage
        where F: Fn(u32, u32) -> f64
    {
        let stride = width as usize + 1;
        let mut data = vec![0f64; stride * (height as usize + 1)];
        for y in 0..height {
            let mut row_sum = 0f64;
            for x in 0..width {
                row_sum += f(x, y);
                let idx = (y as usize + 1) * stride + x as usize + 1;
                data[idx] = data[idx - stride] + row_sum;
            }
        }
        IntegralImage {
            width: width,
            height: height,
            data: data,
        }
    }

    /// Width of the integrated image
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height of the integrated image
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns the sum of all values left of `x` and above `y`.
    /// Panics if `x > width` or `y > height`.
    pub fn at(&self, x: u32, y: u32) -> f64 {
        assert!(x <= self.width && y <= self.height);
        self.lookup(x, y)
    }

    /// Returns the sum of all values within `rect`.
    /// Panics if the rectangle exceeds the image.
    pub fn sum(&self, rect: Rect) -> f64 {
        assert!(rect.lies_within(self.width, self.height));
        self.rect_sum(rect)
    }

    // Caller guarantees that `rect` lies within the image.
    #[inline]
    fn rect_sum(&self, rect: Rect) -> f64 {
        self.lookup(rect.right(), rect.bottom()) + self.lookup(rect.x(), rect.y()) -
        self.lookup(rect.right(), rect.y()) - self.lookup(rect.x(), rect.bottom())
    }

    #[inline]
    fn lookup(&self, x: u32, y: u32) -> f64 {
        let idx = y as usize * (self.width as usize + 1) + x as usize;
        #[cfg(feature="reduce_bound_checks")]
        {
            unsafe { *self.data.get_unchecked(idx) }
        }
        #[cfg(not(feature="reduce_bound_checks"))]
        {
            self.data[idx]
        }
    }
}

/// The integral images a forest needs to evaluate its tests:
/// one table per feature channel and one table of the validity mask.
pub struct FeatureImages {
    channels: Vec<IntegralImage>,
    valid: IntegralImage,
}

impl FeatureImages {
    /// Builds the integral images of the (scaled) depth channel and of the
    /// validity mask of the given point image.
    pub fn from_point_image(img: &PointImage) -> FeatureImages {
        let (w, h) = (img.width(), img.height());
        let scaled = |x: u32, y: u32| img.get_pixel(x, y).data[2] * DEPTH_SCALE;
        let depth = IntegralImage::from_fn(w, h, |x, y| scaled(x, y) as f64);
        let valid = IntegralImage::from_fn(w, h, |x, y| if scaled(x, y) > VALID_DEPTH_THRESHOLD {
            1.0
        } else {
            0.0
        });
        FeatureImages {
            channels: vec![depth],
            valid: valid,
        }
    }

    pub fn width(&self) -> u32 {
        self.valid.width()
    }

    pub fn height(&self) -> u32 {
        self.valid.height()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Returns true if `rect` lies within the image.
    pub fn contains(&self, rect: Rect) -> bool {
        rect.lies_within(self.width(), self.height())
    }

    /// Number of pixels with depth data within `rect`.
    pub fn valid_pixels(&self, rect: Rect) -> f64 {
        self.valid.sum(rect)
    }

    /// Mean value of the feature channel within `rect`. The sum is divided
    /// by the number of valid pixels (at least one), not by the area,
    /// so missing depth data does not pull the mean towards zero.
    ///
    /// Panics if the rectangle exceeds the image or the channel does not exist.
    pub fn mean_in_rect(&self, channel: usize, rect: Rect) -> f64 {
        assert!(self.contains(rect));
        let sum = self.channels[channel].rect_sum(rect);
        let count = self.valid.rect_sum(rect);
        sum / count.max(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    macro_rules! assert_feq {
        ($a: expr, $b: expr, $tol: expr) => (
            assert!(($a - $b).abs() < $tol, "{} != {}", $a, $b);
        )
    }

    fn depth_image(w: u32, h: u32, depth: &Fn(u32, u32) -> f32) -> PointImage {
        PointImage::from_fn(w, h, |x, y| Rgb([x as f32, y as f32, depth(x, y)]))
    }

    #[test]
    fn test_integral_sum() {
        let int = IntegralImage::from_fn(7, 5, |x, y| (x + 10 * y) as f64);
        for &(x, y, w, h) in [(0, 0, 7, 5), (1, 2, 3, 2), (6, 4, 1, 1), (2, 2, 0, 3)].iter() {
            let rect = Rect::new(x, y, w, h);
            let mut brute = 0f64;
            for yy in y..y + h {
                for xx in x..x + w {
                    brute += (xx + 10 * yy) as f64;
                }
            }
            assert_feq!(int.sum(rect), brute, 1e-9);
        }
        assert_feq!(int.at(0, 3), 0.0, 1e-9);
        assert_feq!(int.at(7, 5), int.sum(Rect::new(0, 0, 7, 5)), 1e-9);
    }

    #[test]
    #[should_panic]
    fn test_integral_rejects_rect_outside() {
        let int = IntegralImage::from_fn(4, 4, |_, _| 1.0);
        int.sum(Rect::new(2, 2, 3, 1));
    }

    #[test]
    fn test_mean_normalized_by_valid_pixels() {
        // left half without data, right half 0.8
        let img = depth_image(8, 4, &|x, _| if x < 4 { 0.0 } else { 0.8 });
        let features = FeatureImages::from_point_image(&img);
        assert_eq!(features.channel_count(), FEATURE_CHANNELS);
        assert_feq!(features.valid_pixels(Rect::new(0, 0, 8, 4)), 16.0, 1e-9);
        // the mean ignores the pixels without data
        assert_feq!(features.mean_in_rect(0, Rect::new(0, 0, 8, 4)), 800.0, 1e-3);
        assert_feq!(features.mean_in_rect(0, Rect::new(4, 1, 2, 2)), 800.0, 1e-3);
        // no valid pixel => division by one
        assert_feq!(features.mean_in_rect(0, Rect::new(0, 0, 4, 4)), 0.0, 1e-9);
    }

    #[test]
    fn test_small_depth_is_not_valid() {
        // 0.005 * 1000 = 5 <= 10 => not valid, but still integrated
        let img = depth_image(2, 1, &|x, _| if x == 0 { 0.005 } else { 0.5 });
        let features = FeatureImages::from_point_image(&img);
        assert_feq!(features.valid_pixels(Rect::new(0, 0, 2, 1)), 1.0, 1e-9);
        assert_feq!(features.mean_in_rect(0, Rect::new(0, 0, 2, 1)), 505.0, 1e-3);
    }
}
