use image::{GrayImage, Luma, RgbImage};
use imageproc::filter::gaussian_blur_f32;

use crate::frame::{DiffMap, Frame, PreparedFrame};

/// Blur kernel size used to suppress sensor noise before differencing.
pub const DEFAULT_BLUR_KERNEL: u32 = 21;

/// Reference and current frame do not share dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error(
    "frame size {}x{} does not match reference {}x{}",
    .actual.0,
    .actual.1,
    .expected.0,
    .expected.1
)]
pub struct DimensionMismatch {
    pub expected: (u32, u32),
    pub actual: (u32, u32),
}

/// Gaussian sigma for a square kernel of size `kernel`.
///
/// Same derivation OpenCV uses when a kernel size is given without a sigma,
/// so a 21x21 kernel maps to sigma 3.5.
pub fn sigma_for_kernel(kernel: u32) -> f32 {
    0.3 * ((kernel as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Grayscale conversion followed by a Gaussian blur.
pub fn prepare(frame: &Frame, sigma: f32) -> PreparedFrame {
    let gray = to_luma(frame.image());
    PreparedFrame::from_image(gaussian_blur_f32(&gray, sigma))
}

/// Rec.601 luma (0.299 R + 0.587 G + 0.114 B) in 14-bit fixed point, rounded.
/// Sensitivity values are calibrated against these weights, not the Rec.709
/// ones `image::imageops::grayscale` uses.
pub fn to_luma(image: &RgbImage) -> GrayImage {
    const R: u32 = 4899;
    const G: u32 = 9617;
    const B: u32 = 1868;
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0;
        let luma = (R * r as u32 + G * g as u32 + B * b as u32 + (1 << 13)) >> 14;
        Luma([luma as u8])
    })
}

/// Per-pixel absolute difference of two prepared frames.
pub fn diff(
    reference: &PreparedFrame,
    current: &PreparedFrame,
) -> Result<DiffMap, DimensionMismatch> {
    if reference.dimensions() != current.dimensions() {
        return Err(DimensionMismatch {
            expected: reference.dimensions(),
            actual: current.dimensions(),
        });
    }

    let (width, height) = current.dimensions();
    let a = reference.as_image();
    let b = current.as_image();
    let out = GrayImage::from_fn(width, height, |x, y| {
        Luma([a.get_pixel(x, y)[0].abs_diff(b.get_pixel(x, y)[0])])
    });
    Ok(DiffMap::from_image(out))
}
