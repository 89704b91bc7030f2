//! Motion alerts.
//!
//! - `Notifier`: delivery seam (`SmtpNotifier` in production, recorders in tests)
//! - `NotificationGate`: cooldown between successful sends, backoff after failures
//! - `Alert`: subject and body composed from a detection

mod gate;
mod smtp;

use chrono::{DateTime, Local};

pub use gate::{GateSettings, NotificationGate};
pub use smtp::{SmtpNotifier, SmtpSettings};

/// Fixed subject line of every alert.
pub const ALERT_SUBJECT: &str = "🚨 Motion Detected!";

/// Why a notification was not delivered.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification credentials missing: {0}")]
    MissingCredentials(&'static str),
    #[error("SMTP authentication failed: {0}")]
    Auth(String),
    #[error("mail transport error: {0}")]
    Transport(String),
    #[error("unexpected notification error: {0}")]
    Unexpected(String),
}

/// Delivers alerts.
pub trait Notifier {
    fn notify(&mut self, subject: &str, body: &str) -> Result<(), NotifyError>;

    /// False when alerts are switched off; callers then skip gating entirely.
    fn enabled(&self) -> bool {
        true
    }
}

impl<N: Notifier + ?Sized> Notifier for Box<N> {
    fn notify(&mut self, subject: &str, body: &str) -> Result<(), NotifyError> {
        (**self).notify(subject, body)
    }

    fn enabled(&self) -> bool {
        (**self).enabled()
    }
}

/// Notifier used when alerts are switched off.
#[derive(Debug, Default)]
pub struct DisabledNotifier;

impl Notifier for DisabledNotifier {
    fn notify(&mut self, subject: &str, _body: &str) -> Result<(), NotifyError> {
        log::debug!("alerts disabled, dropping '{}'", subject);
        Ok(())
    }

    fn enabled(&self) -> bool {
        false
    }
}

/// Composed alert message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Alert {
    pub subject: String,
    pub body: String,
}

impl Alert {
    pub fn motion(at: &DateTime<Local>, object_count: usize) -> Self {
        Self {
            subject: ALERT_SUBJECT.to_string(),
            body: format!(
                "Motion was detected by the camera at {}.\n\nNumber of objects detected: {}",
                at.format("%Y-%m-%d %H:%M:%S"),
                object_count
            ),
        }
    }
}
