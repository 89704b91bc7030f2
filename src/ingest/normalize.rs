use anyhow::{anyhow, Context, Result};
use image::RgbImage;

/// Pixel layouts a capture device may hand back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PixelFormat {
    Rgb24,
    Yuyv,
    Nv12,
    Mjpeg,
}

impl PixelFormat {
    pub(crate) fn from_fourcc(fourcc: &[u8; 4]) -> Result<Self> {
        match fourcc {
            b"RGB3" => Ok(Self::Rgb24),
            b"YUYV" => Ok(Self::Yuyv),
            b"NV12" => Ok(Self::Nv12),
            b"MJPG" => Ok(Self::Mjpeg),
            other => Err(anyhow!(
                "unsupported pixel format {}",
                String::from_utf8_lossy(other)
            )),
        }
    }
}

pub(crate) fn normalize_to_rgb(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<RgbImage> {
    let rgb = match format {
        PixelFormat::Rgb24 => {
            let expected = expected_len(width, height, 3)?;
            check_len("RGB", pixels, expected)?;
            pixels[..expected].to_vec()
        }
        PixelFormat::Yuyv => yuyv_to_rgb(pixels, width, height)?,
        PixelFormat::Nv12 => nv12_to_rgb(pixels, width, height)?,
        PixelFormat::Mjpeg => {
            return Ok(
                image::load_from_memory_with_format(pixels, image::ImageFormat::Jpeg)
                    .context("decode MJPG frame")?
                    .to_rgb8(),
            )
        }
    };
    RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| anyhow!("frame buffer too small for {}x{}", width, height))
}

fn expected_len(width: u32, height: u32, bytes_per_pixel: usize) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(bytes_per_pixel))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}

fn check_len(label: &str, pixels: &[u8], expected: usize) -> Result<()> {
    if pixels.len() < expected {
        return Err(anyhow!(
            "{} frame length mismatch: expected {}, got {}",
            label,
            expected,
            pixels.len()
        ));
    }
    Ok(())
}

fn yuyv_to_rgb(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let expected = expected_len(width, height, 2)?;
    check_len("YUYV", pixels, expected)?;

    let mut rgb = Vec::with_capacity(expected_len(width, height, 3)?);
    for chunk in pixels[..expected].chunks_exact(4) {
        let u = chunk[1] as f32 - 128.0;
        let v = chunk[3] as f32 - 128.0;
        for y in [chunk[0], chunk[2]] {
            rgb.extend_from_slice(&yuv_to_rgb(y as f32, u, v));
        }
    }
    Ok(rgb)
}

fn nv12_to_rgb(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let w = width as usize;
    let h = height as usize;
    let y_plane = expected_len(width, height, 1)?;
    let expected = y_plane
        .checked_add(y_plane / 2)
        .ok_or_else(|| anyhow!("NV12 frame dimensions overflow"))?;
    check_len("NV12", pixels, expected)?;

    let mut rgb = vec![0u8; y_plane * 3];
    for j in 0..h {
        for i in 0..w {
            let y = pixels[j * w + i] as f32;
            let uv_index = y_plane + (j / 2) * w + (i / 2) * 2;
            let u = pixels[uv_index] as f32 - 128.0;
            let v = pixels[uv_index + 1] as f32 - 128.0;
            let offset = (j * w + i) * 3;
            rgb[offset..offset + 3].copy_from_slice(&yuv_to_rgb(y, u, v));
        }
    }
    Ok(rgb)
}

fn yuv_to_rgb(y: f32, u: f32, v: f32) -> [u8; 3] {
    [
        clamp_to_u8(y + 1.402_f32 * v),
        clamp_to_u8(y - 0.344_136_f32 * u - 0.714_136_f32 * v),
        clamp_to_u8(y + 1.772_f32 * u),
    ]
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
