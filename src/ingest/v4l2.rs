//! V4L2 frame source.
//!
//! This module provides `V4l2Source` for capturing frames from local V4L2
//! devices (e.g. a USB webcam at /dev/video0).
//!
//! The V4L2 source is responsible for:
//! - Opening the device node and negotiating size, pixel format and frame rate
//! - Capturing frames through a memory-mapped buffer stream
//! - Normalising RGB3 / YUYV / NV12 / MJPG buffers to RGB
//! - Releasing the stream and device handle on `release` or drop

use anyhow::{Context, Result};
use ouroboros::self_referencing;
use std::time::{Duration, Instant};

use super::normalize::{normalize_to_rgb, PixelFormat};
use super::SourceStats;
use crate::frame::Frame;

/// Configuration for a V4L2 source.
#[derive(Clone, Debug)]
pub struct V4l2Config {
    /// Device path (e.g., "/dev/video0")
    pub device: String,
    /// Target frame rate (frames per second).
    pub target_fps: u32,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
}

impl Default for V4l2Config {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            target_fps: 30,
            width: 640,
            height: 480,
        }
    }
}

/// V4L2 frame source backed by libv4l.
pub struct V4l2Source {
    config: V4l2Config,
    state: Option<V4l2State>,
    frame_count: u64,
    last_frame_at: Option<Instant>,
    last_error: Option<String>,
    active_width: u32,
    active_height: u32,
    pixel_format: PixelFormat,
}

#[self_referencing]
struct V4l2State {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Source {
    pub fn new(config: V4l2Config) -> Result<Self> {
        Ok(Self {
            active_width: config.width,
            active_height: config.height,
            config,
            state: None,
            frame_count: 0,
            last_frame_at: None,
            last_error: None,
            pixel_format: PixelFormat::Rgb24,
        })
    }

    /// Open the device and start streaming.
    pub fn connect(&mut self) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&self.config.device)
            .with_context(|| format!("open v4l2 device {}", self.config.device))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "V4l2Source: failed to set format on {}: {}",
                    self.config.device,
                    err
                );
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };
        // Drivers are free to substitute their own format.
        self.pixel_format = PixelFormat::from_fourcc(&format.fourcc.repr)
            .with_context(|| format!("v4l2 device {}", self.config.device))?;

        if self.config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!(
                    "V4l2Source: failed to set fps on {}: {}",
                    self.config.device,
                    err
                );
            }
        }

        self.active_width = format.width;
        self.active_height = format.height;
        self.last_error = None;

        let state = V4l2StateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()
        .map_err(|err| {
            self.last_error = Some(err.to_string());
            err
        })?;
        self.state = Some(state);

        log::info!(
            "V4l2Source: connected to {} ({}x{}, {:?})",
            self.config.device,
            self.active_width,
            self.active_height,
            self.pixel_format
        );
        Ok(())
    }

    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        use v4l::io::traits::CaptureStream;

        let Some(state) = self.state.as_mut() else {
            return Ok(None);
        };
        let (width, height, format) = (self.active_width, self.active_height, self.pixel_format);
        let image = state
            .with_mut(|fields| -> Result<_> {
                let (buf, _meta) = fields.stream.next().context("capture v4l2 frame")?;
                normalize_to_rgb(buf, width, height, format)
            })
            .map_err(|err| {
                self.last_error = Some(err.to_string());
                err
            })?;

        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());
        Ok(Some(Frame::new(image, self.frame_count)))
    }

    /// Stop streaming and close the device node.
    pub fn release(&mut self) {
        if self.state.take().is_some() {
            log::info!("V4l2Source: released {}", self.config.device);
        }
    }

    /// Check if the source is healthy.
    pub fn is_healthy(&self) -> bool {
        if self.last_error.is_some() {
            return false;
        }
        let Some(last_frame_at) = self.last_frame_at else {
            return true;
        };
        last_frame_at.elapsed() <= self.health_grace()
    }

    pub fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.config.device.clone(),
        }
    }

    fn health_grace(&self) -> Duration {
        let base_ms = if self.config.target_fps == 0 {
            2_000
        } else {
            (1000 / self.config.target_fps).saturating_mul(6)
        };
        Duration::from_millis(base_ms.max(2_000) as u64)
    }
}
