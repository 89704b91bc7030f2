//! Frame types flowing through the capture-process-display loop.
//!
//! - `Frame`: one colour capture, owned by the loop iteration that read it.
//! - `PreparedFrame`: blurred grayscale form used for differencing. The
//!   session's reference frame is a `PreparedFrame`.
//! - `DiffMap` / `BinaryMask`: single-channel intermediate images produced by
//!   the detector.

use chrono::{DateTime, Local};
use image::{GrayImage, RgbImage};

// ----------------------------------------------------------------------------
// Frame: one colour capture
// ----------------------------------------------------------------------------

/// A single RGB capture from a frame source.
///
/// There is intentionally no `Clone`: a frame belongs to exactly one loop
/// iteration and is dropped once it has been processed.
pub struct Frame {
    image: RgbImage,

    /// Sequence number assigned by the source (1-based).
    pub sequence: u64,

    /// Wall-clock capture time, used for overlays and alert bodies.
    pub captured_at: DateTime<Local>,
}

impl Frame {
    pub fn new(image: RgbImage, sequence: u64) -> Self {
        Self {
            image,
            sequence,
            captured_at: Local::now(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("sequence", &self.sequence)
            .field("width", &self.width())
            .field("height", &self.height())
            .field("captured_at", &self.captured_at)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Single-channel images
// ----------------------------------------------------------------------------

/// Grayscale, blurred representation of a frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedFrame(GrayImage);

/// Per-pixel absolute difference between two prepared frames.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiffMap(GrayImage);

/// Thresholded (and usually dilated) difference: every pixel is 0 or 255.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BinaryMask(GrayImage);

macro_rules! gray_newtype {
    ($name:ident) => {
        impl $name {
            pub fn from_image(image: GrayImage) -> Self {
                Self(image)
            }

            pub fn dimensions(&self) -> (u32, u32) {
                self.0.dimensions()
            }

            pub fn as_image(&self) -> &GrayImage {
                &self.0
            }

            pub fn into_image(self) -> GrayImage {
                self.0
            }

            /// Number of non-zero pixels.
            pub fn count_nonzero(&self) -> usize {
                self.0.as_raw().iter().filter(|&&v| v != 0).count()
            }
        }
    };
}

gray_newtype!(PreparedFrame);
gray_newtype!(DiffMap);
gray_newtype!(BinaryMask);

impl BinaryMask {
    /// All-zero mask of the given size.
    pub fn empty(width: u32, height: u32) -> Self {
        Self(GrayImage::new(width, height))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
