//! Synthetic frame source (`stub://`).
//!
//! Renders a static gradient backdrop with a little sensor noise. The
//! `intruder` scene periodically walks a bright block across the view so the
//! whole pipeline (detection, alerting, reference freezing) can be exercised
//! without a camera.

use std::str::FromStr;

use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};
use rand::Rng;

use super::SourceStats;
use crate::frame::Frame;

/// Frames per intruder cycle: quiet for the first half, moving for the second.
const INTRUDER_PERIOD: u64 = 60;
const INTRUDER_SIZE: u32 = 40;
/// Peak-to-peak sensor noise, well below the default sensitivity after blurring.
const NOISE_AMPLITUDE: i16 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scene {
    /// Nothing ever moves.
    Static,
    /// A block crosses the frame every `INTRUDER_PERIOD` frames.
    Intruder,
}

impl FromStr for Scene {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "static" => Ok(Scene::Static),
            "" | "intruder" => Ok(Scene::Intruder),
            other => Err(anyhow!(
                "unknown synthetic scene '{}' (expected static or intruder)",
                other
            )),
        }
    }
}

pub struct SyntheticSource {
    scene: Scene,
    width: u32,
    height: u32,
    frame_count: u64,
}

impl SyntheticSource {
    pub fn new(scene: Scene, width: u32, height: u32) -> Self {
        Self {
            scene,
            width,
            height,
            frame_count: 0,
        }
    }

    /// Synthetic sources are always "connected".
    pub fn connect(&mut self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(anyhow!(
                "synthetic source needs a non-zero size, got {}x{}",
                self.width,
                self.height
            ));
        }
        log::info!(
            "SyntheticSource: connected ({:?}, {}x{})",
            self.scene,
            self.width,
            self.height
        );
        Ok(())
    }

    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        self.frame_count += 1;
        let image = self.render();
        Ok(Some(Frame::new(image, self.frame_count)))
    }

    pub fn release(&mut self) {}

    pub fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: format!("stub://{:?}", self.scene).to_lowercase(),
        }
    }

    /// Position of the intruder block for the current frame, if visible.
    fn intruder_origin(&self) -> Option<(u32, u32)> {
        if self.scene != Scene::Intruder {
            return None;
        }
        let phase = self.frame_count % INTRUDER_PERIOD;
        let half = INTRUDER_PERIOD / 2;
        if phase < half {
            return None;
        }
        let travel = self.width.saturating_sub(INTRUDER_SIZE) as u64;
        let x = travel * (phase - half) / half.max(1);
        let y = self.height.saturating_sub(INTRUDER_SIZE) / 2;
        Some((x as u32, y))
    }

    fn render(&self) -> RgbImage {
        let mut rng = rand::thread_rng();
        let (w, h) = (self.width.max(1), self.height.max(1));
        let mut image = RgbImage::from_fn(self.width, self.height, |x, y| {
            let base = 40 + (x * 120 / w) as i16 + (y * 60 / h) as i16;
            let noisy = base + rng.gen_range(-NOISE_AMPLITUDE..=NOISE_AMPLITUDE);
            let v = noisy.clamp(0, 255) as u8;
            Rgb([v, v, v.saturating_add(10)])
        });

        if let Some((x0, y0)) = self.intruder_origin() {
            let x1 = (x0 + INTRUDER_SIZE).min(self.width);
            let y1 = (y0 + INTRUDER_SIZE).min(self.height);
            for y in y0..y1 {
                for x in x0..x1 {
                    image.put_pixel(x, y, Rgb([250, 240, 230]));
                }
            }
        }
        image
    }
}
