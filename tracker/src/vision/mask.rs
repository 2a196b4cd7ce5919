use image::{GrayImage, Luma, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::{dilate, erode};
use servo_track_common::color::ColorRange;

/// Equivalent of an 11x11 Gaussian kernel with automatic sigma.
const BLUR_SIGMA: f32 = 2.0;
/// Two passes of a 3x3 square structuring element.
const MORPH_RADIUS: u8 = 2;

pub const FOREGROUND: u8 = 255;

/// Converts a color frame to a binary mask of the pixels inside an HSV range.
///
/// Pipeline: Gaussian blur, RGB -> HSV, in-range threshold, erosion, dilation.
/// The opening removes specks smaller than the structuring element while the
/// main blob keeps its outline.
pub struct ColorMaskFilter {
    range: ColorRange,
}

impl ColorMaskFilter {
    pub fn new(range: ColorRange) -> Self {
        Self { range }
    }

    /// Always returns a mask with the frame's dimensions (possibly all zero).
    pub fn apply(&self, frame: &RgbImage) -> GrayImage {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return GrayImage::new(width, height);
        }

        let blurred = gaussian_blur_f32(frame, BLUR_SIGMA);
        let thresholded = self.threshold(&blurred);
        let eroded = erode(&thresholded, Norm::LInf, MORPH_RADIUS);
        dilate(&eroded, Norm::LInf, MORPH_RADIUS)
    }

    fn threshold(&self, frame: &RgbImage) -> GrayImage {
        let (width, height) = frame.dimensions();
        let mut mask = GrayImage::new(width, height);
        for (x, y, pixel) in frame.enumerate_pixels() {
            if self.range.contains(rgb_to_hsv(pixel.0)) {
                mask.put_pixel(x, y, Luma([FOREGROUND]));
            }
        }
        mask
    }
}

/// RGB to HSV in OpenCV's 8-bit convention: H in 0..=179 (degrees / 2),
/// S and V in 0..=255.
pub fn rgb_to_hsv(rgb: [u8; 3]) -> [u8; 3] {
    let [r, g, b] = rgb.map(f32::from);
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = v - min;

    let s = if v > 0.0 { 255.0 * delta / v } else { 0.0 };

    let mut h = if delta == 0.0 {
        0.0
    } else if v == r {
        60.0 * (g - b) / delta
    } else if v == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    if h < 0.0 {
        h += 360.0;
    }

    let h = ((h / 2.0).round() as u16 % 180) as u8;
    [h, s.round() as u8, v as u8]
}
