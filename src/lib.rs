//! Motion Sentry
//!
//! Watches a camera feed for motion by frame differencing, draws what it
//! finds, and emails an alert when something moves.
//!
//! # Pipeline
//!
//! Every iteration of the loop:
//!
//! 1. **Capture**: pull the next frame from a `FrameSource`.
//! 2. **Difference**: grayscale + Gaussian blur, absolute difference against
//!    the reference frame.
//! 3. **Detect**: threshold, dilate, take outer contours, drop small ones,
//!    bound the rest.
//! 4. **Annotate / display**: boxes, timestamp and status text on a copy of
//!    the frame; show it next to the motion mask.
//! 5. **Notify**: email the owner when the cooldown allows it.
//! 6. **Update reference**: only frames without motion replace it.
//!
//! # Module Structure
//!
//! - `frame`: frame and single-channel image types
//! - `ingest`: frame sources (synthetic, image directory, V4L2)
//! - `detect`: differencing, thresholding and region extraction
//! - `annotate`: overlays
//! - `display`: headless and windowed presentation
//! - `notify`: alert composition, SMTP delivery, cooldown/backoff gate
//! - `session`: loop state and the loop itself
//! - `config`: file + environment configuration

pub mod annotate;
pub mod config;
pub mod detect;
pub mod display;
pub mod frame;
pub mod ingest;
pub mod notify;
pub mod session;
pub mod snapshot;

pub use annotate::Annotator;
pub use config::{NotifySettings, Secret, SentryConfig};
pub use detect::{
    BoundingBox, DetectedRegion, DetectionResult, DetectorSettings, DimensionMismatch,
    MotionDetector,
};
pub use display::{FrameDisplay, HeadlessDisplay, KeyCommand};
pub use frame::{BinaryMask, DiffMap, Frame, PreparedFrame};
pub use ingest::{CaptureConfig, CaptureSource, FrameSource, SourceStats};
pub use notify::{
    Alert, DisabledNotifier, GateSettings, NotificationGate, Notifier, NotifyError, SmtpNotifier,
    SmtpSettings,
};
pub use session::{run, AlertOutcome, Processed, RunSummary, Session};
