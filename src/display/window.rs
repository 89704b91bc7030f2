use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use image::RgbImage;
use minifb::{Key, KeyRepeat, Window, WindowOptions};

use super::{FrameDisplay, KeyCommand, FEED_WINDOW, MASK_WINDOW};
use crate::frame::BinaryMask;

/// Two native windows: the annotated feed and the motion mask.
///
/// Windows are created lazily on the first frame and recreated when the frame
/// size changes.
pub struct WindowDisplay {
    feed: Option<Window>,
    mask: Option<Window>,
    size: (usize, usize),
    buffer: Vec<u32>,
    shutdown: Arc<AtomicBool>,
}

impl WindowDisplay {
    pub fn new(shutdown: Arc<AtomicBool>) -> Self {
        Self {
            feed: None,
            mask: None,
            size: (0, 0),
            buffer: Vec::new(),
            shutdown,
        }
    }

    fn ensure_windows(&mut self, width: usize, height: usize) -> Result<()> {
        if self.feed.is_some() && self.size == (width, height) {
            return Ok(());
        }
        let open = |title: &str| {
            Window::new(title, width, height, WindowOptions::default())
                .map_err(|e| anyhow!("open window '{}': {}", title, e))
        };
        self.feed = Some(open(FEED_WINDOW)?);
        self.mask = Some(open(MASK_WINDOW)?);
        self.size = (width, height);
        log::info!("display windows opened ({}x{})", width, height);
        Ok(())
    }

    fn windows(&self) -> impl Iterator<Item = &Window> {
        self.feed.iter().chain(self.mask.iter())
    }
}

impl FrameDisplay for WindowDisplay {
    fn show(&mut self, feed: &RgbImage, mask: &BinaryMask) -> Result<()> {
        let (width, height) = (feed.width() as usize, feed.height() as usize);
        self.ensure_windows(width, height)?;

        self.buffer.clear();
        self.buffer.extend(
            feed.pixels()
                .map(|p| (p[0] as u32) << 16 | (p[1] as u32) << 8 | p[2] as u32),
        );
        if let Some(window) = self.feed.as_mut() {
            window
                .update_with_buffer(&self.buffer, width, height)
                .map_err(|e| anyhow!("update '{}': {}", FEED_WINDOW, e))?;
        }

        let (mask_w, mask_h) = mask.dimensions();
        self.buffer.clear();
        self.buffer.extend(mask.as_image().pixels().map(|p| {
            let v = p[0] as u32;
            v << 16 | v << 8 | v
        }));
        if let Some(window) = self.mask.as_mut() {
            window
                .update_with_buffer(&self.buffer, mask_w as usize, mask_h as usize)
                .map_err(|e| anyhow!("update '{}': {}", MASK_WINDOW, e))?;
        }
        Ok(())
    }

    fn poll_key(&mut self) -> Option<KeyCommand> {
        if self.shutdown.load(Ordering::SeqCst) {
            return Some(KeyCommand::Quit);
        }
        if self.feed.is_none() {
            return None;
        }
        let mut command = None;
        for window in self.windows() {
            if !window.is_open()
                || window.is_key_pressed(Key::Q, KeyRepeat::No)
                || window.is_key_pressed(Key::Escape, KeyRepeat::No)
            {
                return Some(KeyCommand::Quit);
            }
            if window.is_key_pressed(Key::S, KeyRepeat::No) {
                command = Some(KeyCommand::Snapshot);
            }
        }
        command
    }

    fn close(&mut self) {
        if self.feed.take().is_some() | self.mask.take().is_some() {
            log::info!("display windows closed");
        }
    }
}
