//! Frame annotation: bounding boxes, timestamp and motion status overlays.

use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::detect::{BoundingBox, DetectionResult};
use crate::frame::Frame;

pub const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const TIMESTAMP_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
pub const STATUS_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

const TEXT_SCALE: f32 = 22.0;
const TIMESTAMP_ORIGIN: (i32, i32) = (10, 12);
const STATUS_ORIGIN: (i32, i32) = (10, 52);

/// Fonts tried when none is configured.
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

pub fn timestamp_text(at: &DateTime<Local>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn status_text(count: usize) -> String {
    format!("MOTION DETECTED ({} objects)", count)
}

/// Draws detection overlays onto copies of frames.
pub struct Annotator {
    font: Option<FontVec>,
    scale: PxScale,
}

impl Annotator {
    /// Boxes only.
    pub fn without_text() -> Self {
        Self {
            font: None,
            scale: PxScale::from(TEXT_SCALE),
        }
    }

    pub fn with_font_bytes(bytes: Vec<u8>) -> Result<Self> {
        let font = FontVec::try_from_vec(bytes).map_err(|e| anyhow!("invalid font: {}", e))?;
        Ok(Self {
            font: Some(font),
            scale: PxScale::from(TEXT_SCALE),
        })
    }

    /// Load the configured font, falling back to common system fonts.
    ///
    /// Without any usable font the annotator still draws boxes.
    pub fn load(font_path: Option<&Path>) -> Self {
        if let Some(path) = font_path {
            match read_font(path) {
                Ok(annotator) => return annotator,
                Err(err) => log::warn!("overlay font {}: {:#}", path.display(), err),
            }
        }
        for candidate in FONT_CANDIDATES.iter().map(PathBuf::from) {
            if !candidate.is_file() {
                continue;
            }
            if let Ok(annotator) = read_font(&candidate) {
                log::debug!("overlay font: {}", candidate.display());
                return annotator;
            }
        }
        log::warn!("no overlay font found (set MOTION_FONT); text overlays disabled");
        Self::without_text()
    }

    pub fn has_text(&self) -> bool {
        self.font.is_some()
    }

    /// Annotated copy of `frame`; the frame itself is left untouched.
    pub fn annotate(&self, frame: &Frame, detection: &DetectionResult) -> RgbImage {
        let mut canvas = frame.image().clone();

        for region in &detection.regions {
            draw_box(&mut canvas, &region.bounds);
        }

        if let Some(font) = &self.font {
            let (x, y) = TIMESTAMP_ORIGIN;
            draw_text_mut(
                &mut canvas,
                TIMESTAMP_COLOR,
                x,
                y,
                self.scale,
                font,
                &timestamp_text(&frame.captured_at),
            );
            if detection.motion_detected() {
                let (x, y) = STATUS_ORIGIN;
                draw_text_mut(
                    &mut canvas,
                    STATUS_COLOR,
                    x,
                    y,
                    self.scale,
                    font,
                    &status_text(detection.motion_count()),
                );
            }
        }
        canvas
    }
}

fn read_font(path: &Path) -> Result<Annotator> {
    let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
    Annotator::with_font_bytes(bytes)
}

/// 2px rectangle: the box outline plus one pixel inside it.
fn draw_box(canvas: &mut RgbImage, bounds: &BoundingBox) {
    let (x, y) = (bounds.x as i32, bounds.y as i32);
    draw_hollow_rect_mut(
        canvas,
        Rect::at(x, y).of_size(bounds.width, bounds.height),
        BOX_COLOR,
    );
    if bounds.width > 2 && bounds.height > 2 {
        draw_hollow_rect_mut(
            canvas,
            Rect::at(x + 1, y + 1).of_size(bounds.width - 2, bounds.height - 2),
            BOX_COLOR,
        );
    }
}
