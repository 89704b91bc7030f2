//! Live presentation of the annotated feed and the motion mask.
//!
//! Two backends:
//! - `WindowDisplay` (default feature: display-window): two on-screen windows
//!   with `q`/Escape to quit and `s` to save a snapshot.
//! - `HeadlessDisplay`: no windows; quitting is driven by a shutdown flag
//!   (wired to Ctrl-C by the daemon). Used with `--headless`, without a
//!   display server, or in builds without display-window.

mod headless;
#[cfg(feature = "display-window")]
mod window;

use anyhow::Result;
use image::RgbImage;

use crate::frame::BinaryMask;

pub use headless::HeadlessDisplay;
#[cfg(feature = "display-window")]
pub use window::WindowDisplay;

/// Title of the annotated colour feed.
pub const FEED_WINDOW: &str = "Security Feed";
/// Title of the binary mask view.
pub const MASK_WINDOW: &str = "Motion Detection";

/// User commands read between frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyCommand {
    Quit,
    Snapshot,
}

/// Whether on-screen windows can be opened in this session.
///
/// On Linux and the BSDs that needs an X11 or Wayland server; elsewhere the
/// platform always has one.
pub fn window_system_available() -> bool {
    if cfg!(any(target_os = "windows", target_os = "macos")) {
        return true;
    }
    ["DISPLAY", "WAYLAND_DISPLAY"]
        .iter()
        .any(|key| std::env::var_os(key).is_some_and(|value| !value.is_empty()))
}

/// Where each processed frame is presented.
pub trait FrameDisplay {
    /// Present one iteration's output. Must not block waiting for input.
    fn show(&mut self, feed: &RgbImage, mask: &BinaryMask) -> Result<()>;

    /// Pending command, if any. Zero-wait poll.
    fn poll_key(&mut self) -> Option<KeyCommand>;

    /// Tear down any outputs. Must be safe to call more than once.
    fn close(&mut self);
}
