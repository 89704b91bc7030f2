//! Frame ingestion sources.
//!
//! This module provides the sources the loop can read frames from:
//! - Synthetic scenes (`stub://static`, `stub://intruder`) for tests and demos
//! - A directory of still images replayed in name order
//! - USB/V4L2 devices (feature: ingest-v4l2), addressed as `/dev/videoN` or a
//!   bare camera index `N`
//!
//! Every source follows the same lifecycle: `open` (fails with a startup
//! error when the device cannot be opened), repeated `next_frame` until it
//! returns `None` (end of stream), then `release`. `CaptureSource` releases
//! itself on drop so every exit path gives the device back.

pub mod file;
#[cfg(feature = "ingest-v4l2")]
mod normalize;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use anyhow::{anyhow, Result};

use crate::frame::Frame;

pub use file::{FileConfig, FileSource};
pub use synthetic::{Scene, SyntheticSource};
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::{V4l2Config, V4l2Source};

/// Anything the control loop can pull frames from.
pub trait FrameSource {
    /// Next frame, or `None` once the stream has ended.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Give the underlying device back. Must be safe to call more than once.
    fn release(&mut self);

    /// Capture counters for health logging.
    fn stats(&self) -> SourceStats;

    /// False once the source has hit a read error or gone stale.
    fn is_healthy(&self) -> bool {
        true
    }
}

/// Statistics for a frame source.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub source: String,
}

/// Configuration shared by all capture backends.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureConfig {
    /// `stub://<scene>`, a camera index, a `/dev/video*` path, or an image directory.
    pub source: String,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
    /// Target frame rate (frames per second).
    pub target_fps: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            source: "0".to_string(),
            width: 640,
            height: 480,
            target_fps: 30,
        }
    }
}

/// Which backend a source string selects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Synthetic(String),
    Device(String),
    Directory(String),
}

impl SourceKind {
    pub fn parse(source: &str) -> Result<Self> {
        let source = source.trim();
        if source.is_empty() {
            return Err(anyhow!("capture source must not be empty"));
        }
        if let Some(scene) = source.strip_prefix("stub://") {
            return Ok(Self::Synthetic(scene.to_string()));
        }
        if let Ok(index) = source.parse::<u32>() {
            return Ok(Self::Device(format!("/dev/video{}", index)));
        }
        if source.starts_with("/dev/video") {
            return Ok(Self::Device(source.to_string()));
        }
        if source.contains("://") {
            return Err(anyhow!(
                "unsupported capture source {} (network streams are not supported)",
                source
            ));
        }
        Ok(Self::Directory(source.to_string()))
    }
}

/// Capture source selected from configuration.
pub struct CaptureSource {
    backend: CaptureBackend,
    released: bool,
}

enum CaptureBackend {
    Synthetic(SyntheticSource),
    Directory(FileSource),
    #[cfg(feature = "ingest-v4l2")]
    Device(V4l2Source),
}

impl CaptureSource {
    pub fn new(config: CaptureConfig) -> Result<Self> {
        let backend = match SourceKind::parse(&config.source)? {
            SourceKind::Synthetic(scene) => CaptureBackend::Synthetic(SyntheticSource::new(
                scene.parse()?,
                config.width,
                config.height,
            )),
            SourceKind::Directory(path) => CaptureBackend::Directory(FileSource::new(FileConfig {
                path,
            })?),
            #[cfg(feature = "ingest-v4l2")]
            SourceKind::Device(device) => CaptureBackend::Device(V4l2Source::new(V4l2Config {
                device,
                target_fps: config.target_fps,
                width: config.width,
                height: config.height,
            })?),
            #[cfg(not(feature = "ingest-v4l2"))]
            SourceKind::Device(device) => {
                return Err(anyhow!(
                    "camera {} needs a build with `--features ingest-v4l2`; \
                     use --source stub://intruder or an image directory to run without one",
                    device
                ))
            }
        };
        Ok(Self {
            backend,
            released: false,
        })
    }

    /// Build and connect in one step.
    pub fn open(config: CaptureConfig) -> Result<Self> {
        let mut source = Self::new(config)?;
        source.connect()?;
        Ok(source)
    }

    /// Connect to the underlying device.
    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            CaptureBackend::Synthetic(source) => source.connect(),
            CaptureBackend::Directory(source) => source.connect(),
            #[cfg(feature = "ingest-v4l2")]
            CaptureBackend::Device(source) => source.connect(),
        }
    }
}

impl FrameSource for CaptureSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.released {
            return Ok(None);
        }
        match &mut self.backend {
            CaptureBackend::Synthetic(source) => source.next_frame(),
            CaptureBackend::Directory(source) => source.next_frame(),
            #[cfg(feature = "ingest-v4l2")]
            CaptureBackend::Device(source) => source.next_frame(),
        }
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match &mut self.backend {
            CaptureBackend::Synthetic(source) => source.release(),
            CaptureBackend::Directory(source) => source.release(),
            #[cfg(feature = "ingest-v4l2")]
            CaptureBackend::Device(source) => source.release(),
        }
        log::info!("capture source released");
    }

    fn stats(&self) -> SourceStats {
        match &self.backend {
            CaptureBackend::Synthetic(source) => source.stats(),
            CaptureBackend::Directory(source) => source.stats(),
            #[cfg(feature = "ingest-v4l2")]
            CaptureBackend::Device(source) => source.stats(),
        }
    }

    fn is_healthy(&self) -> bool {
        if self.released {
            return false;
        }
        match &self.backend {
            CaptureBackend::Synthetic(_) => true,
            CaptureBackend::Directory(source) => source.is_healthy(),
            #[cfg(feature = "ingest-v4l2")]
            CaptureBackend::Device(source) => source.is_healthy(),
        }
    }
}

impl Drop for CaptureSource {
    fn drop(&mut self) {
        self.release();
    }
}
