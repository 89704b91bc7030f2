//! Motion detection: frame differencing, thresholding and region extraction.
//!
//! The pipeline per frame is
//! `prepare -> diff -> threshold -> dilate -> extract_regions -> filter_and_bound`,
//! wrapped by `MotionDetector`.

mod detector;
mod prepare;
mod regions;
mod result;

pub use detector::{DetectorSettings, MotionDetector};
pub use prepare::{
    diff, prepare, sigma_for_kernel, to_luma, DimensionMismatch, DEFAULT_BLUR_KERNEL,
};
pub use regions::{contour_area, dilate, extract_regions, filter_and_bound, threshold, Contour};
pub use result::{BoundingBox, DetectedRegion, DetectionResult};
