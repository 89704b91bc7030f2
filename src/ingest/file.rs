//! Local image-sequence frame source.
//!
//! This module provides `FileSource` for replaying a directory of still images
//! (JPEG or PNG) as if they came from a camera. Files are read in name order;
//! the end of the directory is the end of the stream.
//!
//! The file source MUST NOT:
//! - Fetch remote URLs
//! - Write anything back into the directory

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use super::SourceStats;
use crate::frame::Frame;

const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Configuration for a local image-sequence source.
#[derive(Clone, Debug, Default)]
pub struct FileConfig {
    /// Local directory path (e.g., "/var/lib/sentry/replay").
    pub path: String,
}

/// Local image-sequence frame source.
pub struct FileSource {
    config: FileConfig,
    pending: VecDeque<PathBuf>,
    frame_count: u64,
    last_error: Option<String>,
}

impl FileSource {
    pub fn new(config: FileConfig) -> Result<Self> {
        if config.path.trim().is_empty() || config.path.contains("://") {
            return Err(anyhow!(
                "file ingestion only supports local paths (no URL schemes)"
            ));
        }
        Ok(Self {
            config,
            pending: VecDeque::new(),
            frame_count: 0,
            last_error: None,
        })
    }

    /// List the directory. Fails when it is missing or holds no images.
    pub fn connect(&mut self) -> Result<()> {
        let dir = Path::new(&self.config.path);
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("open image directory {}", dir.display()))?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry
                .with_context(|| format!("list image directory {}", dir.display()))?
                .path();
            if path.is_file() && has_supported_extension(&path) {
                files.push(path);
            }
        }
        if files.is_empty() {
            return Err(anyhow!("no images found in {}", dir.display()));
        }
        files.sort();

        log::info!(
            "FileSource: connected to {} ({} images)",
            dir.display(),
            files.len()
        );
        self.pending = files.into();
        self.last_error = None;
        Ok(())
    }

    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.pending.pop_front() else {
            return Ok(None);
        };
        let image = image::open(&path)
            .with_context(|| format!("decode {}", path.display()))
            .map_err(|err| {
                self.last_error = Some(err.to_string());
                err
            })?
            .to_rgb8();

        self.frame_count += 1;
        Ok(Some(Frame::new(image, self.frame_count)))
    }

    pub fn release(&mut self) {
        self.pending.clear();
    }

    /// Check if the source is healthy.
    pub fn is_healthy(&self) -> bool {
        self.last_error.is_none()
    }

    pub fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.config.path.clone(),
        }
    }
}

fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
        .unwrap_or(false)
}
