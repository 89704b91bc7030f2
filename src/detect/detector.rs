use anyhow::{anyhow, Result};

use super::prepare::{diff, prepare, sigma_for_kernel, DimensionMismatch, DEFAULT_BLUR_KERNEL};
use super::regions::{dilate, extract_regions, filter_and_bound, threshold};
use super::result::DetectionResult;
use crate::frame::{Frame, PreparedFrame};

pub const DEFAULT_SENSITIVITY: u8 = 25;
pub const DEFAULT_MIN_AREA: f64 = 500.0;
pub const DEFAULT_DILATE_ITERATIONS: u8 = 2;

/// Tuning for the differencing detector.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectorSettings {
    /// Minimum per-pixel difference that counts as change (exclusive).
    pub sensitivity: u8,
    /// Contours enclosing less than this many square pixels are noise.
    pub min_area: f64,
    /// 3x3 dilation passes applied to the thresholded mask.
    pub dilate_iterations: u8,
    /// Gaussian kernel size; must be odd.
    pub blur_kernel: u32,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            sensitivity: DEFAULT_SENSITIVITY,
            min_area: DEFAULT_MIN_AREA,
            dilate_iterations: DEFAULT_DILATE_ITERATIONS,
            blur_kernel: DEFAULT_BLUR_KERNEL,
        }
    }
}

impl DetectorSettings {
    pub fn validate(&self) -> Result<()> {
        if self.blur_kernel == 0 || self.blur_kernel % 2 == 0 {
            return Err(anyhow!(
                "blur kernel must be a positive odd number, got {}",
                self.blur_kernel
            ));
        }
        if !self.min_area.is_finite() || self.min_area < 0.0 {
            return Err(anyhow!("min_area must be a non-negative number"));
        }
        Ok(())
    }
}

/// Frame differencing motion detector.
///
/// Stateless: the caller owns the reference frame and decides when to
/// replace it.
#[derive(Clone, Debug)]
pub struct MotionDetector {
    settings: DetectorSettings,
    sigma: f32,
}

impl MotionDetector {
    pub fn new(settings: DetectorSettings) -> Result<Self> {
        settings.validate()?;
        let sigma = sigma_for_kernel(settings.blur_kernel);
        Ok(Self { settings, sigma })
    }

    pub fn settings(&self) -> &DetectorSettings {
        &self.settings
    }

    /// Smoothed grayscale form of a frame, suitable as a reference.
    pub fn prepare(&self, frame: &Frame) -> PreparedFrame {
        prepare(frame, self.sigma)
    }

    /// Compare `current` against `reference` and report changed regions.
    pub fn detect(
        &self,
        reference: &PreparedFrame,
        current: &PreparedFrame,
    ) -> Result<DetectionResult, DimensionMismatch> {
        let diff_map = diff(reference, current)?;
        let mask = threshold(&diff_map, self.settings.sensitivity);
        let mask = dilate(&mask, self.settings.dilate_iterations);
        let regions = filter_and_bound(extract_regions(&mask), self.settings.min_area);
        Ok(DetectionResult { regions, mask })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;
    use image::{Rgb, RgbImage};

    const WIDTH: u32 = 160;
    const HEIGHT: u32 = 120;

    fn black() -> Frame {
        Frame::new(RgbImage::new(WIDTH, HEIGHT), 1)
    }

    fn with_white_block(x0: u32, y0: u32, size: u32) -> Frame {
        let mut image = RgbImage::new(WIDTH, HEIGHT);
        for y in y0..y0 + size {
            for x in x0..x0 + size {
                image.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        Frame::new(image, 2)
    }

    fn detector() -> MotionDetector {
        MotionDetector::new(DetectorSettings::default()).unwrap()
    }

    #[test]
    fn identical_frames_report_no_motion() {
        let detector = detector();
        let reference = detector.prepare(&black());
        let current = detector.prepare(&black());
        let result = detector.detect(&reference, &current).unwrap();
        assert!(!result.motion_detected());
        assert_eq!(result.motion_count(), 0);
        assert_eq!(result.mask.count_nonzero(), 0);
    }

    #[test]
    fn large_block_yields_one_enclosing_region() {
        let detector = detector();
        let reference = detector.prepare(&black());
        let current = detector.prepare(&with_white_block(60, 40, 30));
        let result = detector.detect(&reference, &current).unwrap();

        assert!(result.motion_detected());
        assert_eq!(result.motion_count(), 1);
        let region = &result.regions[0];
        assert!(region.bounds.contains(&BoundingBox::new(60, 40, 30, 30)));
        assert!(region.area >= 500.0);
    }

    #[test]
    fn block_on_the_left_edge_is_detected() {
        let detector = detector();
        let reference = detector.prepare(&black());
        for (x0, y0) in [(0, 0), (0, 50)] {
            let current = detector.prepare(&with_white_block(x0, y0, 30));
            let result = detector.detect(&reference, &current).unwrap();
            assert_eq!(result.motion_count(), 1, "block at ({}, {})", x0, y0);
            assert!(result.regions[0]
                .bounds
                .contains(&BoundingBox::new(x0, y0, 30, 30)));
        }
    }

    #[test]
    fn small_block_is_ignored() {
        let detector = detector();
        let reference = detector.prepare(&black());
        let current = detector.prepare(&with_white_block(70, 50, 6));
        let result = detector.detect(&reference, &current).unwrap();

        assert!(!result.motion_detected());
        // The change is still visible in the mask, it is just too small.
        assert!(result.mask.count_nonzero() > 0);
    }

    #[test]
    fn two_separated_blocks_yield_two_regions() {
        let detector = detector();
        let reference = detector.prepare(&black());
        let mut image = with_white_block(10, 10, 30).into_image();
        for y in 70..100 {
            for x in 110..140 {
                image.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        let current = detector.prepare(&Frame::new(image, 3));
        let result = detector.detect(&reference, &current).unwrap();
        assert_eq!(result.motion_count(), 2);
    }

    #[test]
    fn mismatched_frames_are_rejected() {
        let detector = detector();
        let reference = detector.prepare(&black());
        let current = detector.prepare(&Frame::new(RgbImage::new(80, 60), 2));
        assert!(detector.detect(&reference, &current).is_err());
    }

    #[test]
    fn even_blur_kernel_is_rejected() {
        let settings = DetectorSettings {
            blur_kernel: 20,
            ..DetectorSettings::default()
        };
        assert!(MotionDetector::new(settings).is_err());
    }
}
