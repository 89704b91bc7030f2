//! Manual snapshots of the annotated feed.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use image::RgbImage;

pub fn snapshot_file_name(at: &DateTime<Local>) -> String {
    format!("snapshot_{}.jpg", at.format("%Y%m%d_%H%M%S"))
}

/// Write `image` as JPEG into `dir`, named after `at`.
///
/// Two snapshots within the same second overwrite each other.
pub fn save_snapshot(dir: &Path, image: &RgbImage, at: &DateTime<Local>) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create snapshot directory {}", dir.display()))?;
    let path = dir.join(snapshot_file_name(at));
    image
        .save_with_format(&path, image::ImageFormat::Jpeg)
        .with_context(|| format!("write snapshot {}", path.display()))?;
    Ok(path)
}
