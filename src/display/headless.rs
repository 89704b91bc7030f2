use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use image::RgbImage;

use super::{FrameDisplay, KeyCommand};
use crate::frame::BinaryMask;

/// Display that shows nothing. A raised shutdown flag reads as `Quit`.
pub struct HeadlessDisplay {
    shutdown: Arc<AtomicBool>,
    frames_shown: u64,
    closed: bool,
}

impl HeadlessDisplay {
    pub fn new(shutdown: Arc<AtomicBool>) -> Self {
        Self {
            shutdown,
            frames_shown: 0,
            closed: false,
        }
    }

    pub fn frames_shown(&self) -> u64 {
        self.frames_shown
    }
}

impl FrameDisplay for HeadlessDisplay {
    fn show(&mut self, _feed: &RgbImage, _mask: &BinaryMask) -> Result<()> {
        self.frames_shown += 1;
        Ok(())
    }

    fn poll_key(&mut self) -> Option<KeyCommand> {
        if self.shutdown.load(Ordering::SeqCst) {
            Some(KeyCommand::Quit)
        } else {
            None
        }
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            log::debug!("headless display closed after {} frames", self.frames_shown);
        }
    }
}
