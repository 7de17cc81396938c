/// Lighting calibration
///
/// Derives a colour/lighting baseline from a representative frame. Detectors
/// run every pixel through `CalibrationProfile::correct` before classifying
/// it, so a warm or dim scene still maps the ball and targets into their
/// configured colour windows.
use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::frame::CanonicalFrame;

/// Mid-grey luma the brightness offset pulls the scene towards
const TARGET_MEAN_LUMA: f32 = 128.0;
/// Offsets are capped so a near-black frame cannot wash everything out
const MAX_BRIGHTNESS_OFFSET: f32 = 64.0;
/// Gray-world gains are capped for the same reason
const MAX_CHANNEL_GAIN: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationProfile {
    pub mean_luma: f32,
    pub luma_std: f32,
    /// Otsu threshold of the luma histogram
    pub otsu_threshold: u8,
    pub channel_means: [f32; 3],
    /// Gray-world white balance gains (R, G, B)
    pub channel_gains: [f32; 3],
    /// Added to every channel after the gains
    pub brightness_offset: f32,
}

impl Default for CalibrationProfile {
    fn default() -> Self {
        Self {
            mean_luma: TARGET_MEAN_LUMA,
            luma_std: 0.0,
            otsu_threshold: 128,
            channel_means: [TARGET_MEAN_LUMA; 3],
            channel_gains: [1.0; 3],
            brightness_offset: 0.0,
        }
    }
}

impl CalibrationProfile {
    /// Compute a profile from a frame. Deterministic in the frame contents.
    pub fn from_frame(frame: &CanonicalFrame) -> Self {
        let histogram = luma_histogram(frame.luma());
        let (width, height) = frame.luma().dimensions();
        let total = (width as usize * height as usize).max(1) as f64;

        let mean_luma = histogram
            .iter()
            .enumerate()
            .map(|(v, &count)| v as f64 * count as f64)
            .sum::<f64>()
            / total;
        let variance = histogram
            .iter()
            .enumerate()
            .map(|(v, &count)| (v as f64 - mean_luma).powi(2) * count as f64)
            .sum::<f64>()
            / total;

        let mut sums = [0u64; 3];
        for pixel in frame.rgb().pixels() {
            for (sum, &channel) in sums.iter_mut().zip(pixel.0.iter()) {
                *sum += channel as u64;
            }
        }
        let channel_means = sums.map(|s| (s as f64 / total) as f32);
        let gray = channel_means.iter().sum::<f32>() / 3.0;
        let channel_gains = channel_means.map(|m| {
            if m > 0.0 {
                (gray / m).clamp(1.0 / MAX_CHANNEL_GAIN, MAX_CHANNEL_GAIN)
            } else {
                1.0
            }
        });

        Self {
            mean_luma: mean_luma as f32,
            luma_std: variance.sqrt() as f32,
            otsu_threshold: otsu_threshold(&histogram),
            channel_means,
            channel_gains,
            brightness_offset: (TARGET_MEAN_LUMA - mean_luma as f32)
                .clamp(-MAX_BRIGHTNESS_OFFSET, MAX_BRIGHTNESS_OFFSET),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.channel_gains == [1.0; 3] && self.brightness_offset == 0.0
    }

    /// Apply gains and offset to one RGB pixel
    #[inline]
    pub fn correct(&self, rgb: [u8; 3]) -> [f32; 3] {
        let mut out = [0.0f32; 3];
        for i in 0..3 {
            out[i] = (rgb[i] as f32 * self.channel_gains[i] + self.brightness_offset)
                .clamp(0.0, 255.0);
        }
        out
    }

    /// Corrected pixel as HSV (hue degrees, saturation and value in [0, 1])
    #[inline]
    pub fn corrected_hsv(&self, rgb: [u8; 3]) -> (f32, f32, f32) {
        rgb_to_hsv(self.correct(rgb))
    }

    /// Luma threshold separating bright foreground from background,
    /// expressed in raw (uncorrected) luma units
    pub fn bright_threshold(&self) -> u8 {
        self.otsu_threshold.max(160)
    }
}

pub(crate) fn rgb_to_hsv(rgb: [f32; 3]) -> (f32, f32, f32) {
    let [r, g, b] = rgb.map(|c| c / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue = if delta <= f32::EPSILON {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let saturation = if max > 0.0 { delta / max } else { 0.0 };

    (hue, saturation, max)
}

pub(crate) fn luma_histogram(luma: &GrayImage) -> [u32; 256] {
    let mut histogram = [0u32; 256];
    for pixel in luma.pixels() {
        histogram[pixel[0] as usize] += 1;
    }
    histogram
}

/// Optimal bimodal threshold using Otsu's method
fn otsu_threshold(histogram: &[u32; 256]) -> u8 {
    let total_pixels: u32 = histogram.iter().sum();

    let mut sum = 0u64;
    for (i, &count) in histogram.iter().enumerate() {
        sum += (i as u64) * (count as u64);
    }

    let mut sum_background = 0u64;
    let mut weight_background = 0u32;
    let mut max_variance = 0.0;
    let mut threshold = 0u8;

    for (i, &count) in histogram.iter().enumerate() {
        weight_background += count;
        if weight_background == 0 {
            continue;
        }

        let weight_foreground = total_pixels - weight_background;
        if weight_foreground == 0 {
            break;
        }

        sum_background += (i as u64) * (count as u64);

        let mean_background = sum_background as f64 / weight_background as f64;
        let mean_foreground = (sum - sum_background) as f64 / weight_foreground as f64;

        let variance = (weight_background as f64)
            * (weight_foreground as f64)
            * (mean_background - mean_foreground).powi(2);

        if variance > max_variance {
            max_variance = variance;
            threshold = i as u8;
        }
    }

    threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameInput;
    use image::{Rgb, RgbImage};

    fn canonical(img: &RgbImage) -> CanonicalFrame {
        CanonicalFrame::from_input(&FrameInput::from(img), 0).unwrap()
    }

    #[test]
    fn test_default_is_identity() {
        let profile = CalibrationProfile::default();
        assert!(profile.is_identity());
        assert_eq!(profile.correct([10, 200, 30]), [10.0, 200.0, 30.0]);
    }

    #[test]
    fn test_dark_frame_gets_positive_offset() {
        let img = RgbImage::from_pixel(20, 20, Rgb([40, 40, 40]));
        let profile = CalibrationProfile::from_frame(&canonical(&img));
        assert!(profile.brightness_offset > 0.0);
        assert!(profile.brightness_offset <= MAX_BRIGHTNESS_OFFSET);
        assert_eq!(profile.channel_gains, [1.0; 3]);
    }

    #[test]
    fn test_warm_frame_is_white_balanced() {
        let img = RgbImage::from_pixel(20, 20, Rgb([180, 120, 60]));
        let profile = CalibrationProfile::from_frame(&canonical(&img));
        assert!(profile.channel_gains[0] < 1.0);
        assert!(profile.channel_gains[2] > 1.0);
    }

    #[test]
    fn test_calibration_is_deterministic() {
        let mut img = RgbImage::from_pixel(30, 30, Rgb([90, 60, 30]));
        img.put_pixel(4, 4, Rgb([255, 255, 255]));
        let frame = canonical(&img);
        assert_eq!(
            CalibrationProfile::from_frame(&frame),
            CalibrationProfile::from_frame(&frame)
        );
    }

    #[test]
    fn test_otsu_threshold_bimodal() {
        let mut histogram = [0u32; 256];
        histogram[50] = 5000;
        histogram[200] = 5000;
        let threshold = otsu_threshold(&histogram);
        assert!(threshold >= 50 && threshold < 200);
    }

    #[test]
    fn test_rgb_to_hsv() {
        let (h, s, v) = rgb_to_hsv([255.0, 120.0, 0.0]);
        assert!((h - 28.2).abs() < 0.5);
        assert!((s - 1.0).abs() < 1e-6);
        assert!((v - 1.0).abs() < 1e-6);

        let (h, _, _) = rgb_to_hsv([0.0, 0.0, 255.0]);
        assert!((h - 240.0).abs() < 1e-3);
    }
}
