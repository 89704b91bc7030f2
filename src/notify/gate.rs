use std::time::{Duration, Instant};

pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(5);
pub const DEFAULT_RETRY_BACKOFF_MAX: Duration = Duration::from_secs(300);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GateSettings {
    /// Minimum time between two successful sends.
    pub cooldown: Duration,
    /// Wait after the first failed send; doubles per consecutive failure.
    /// Zero retries on the very next motion frame.
    pub retry_backoff: Duration,
    /// Upper bound for the failure backoff.
    pub retry_backoff_max: Duration,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            cooldown: DEFAULT_COOLDOWN,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            retry_backoff_max: DEFAULT_RETRY_BACKOFF_MAX,
        }
    }
}

/// Decides when the next alert may be attempted.
///
/// Time is passed in by the caller so the loop and tests share one clock.
#[derive(Clone, Debug)]
pub struct NotificationGate {
    settings: GateSettings,
    last_success: Option<Instant>,
    retry_at: Option<Instant>,
    consecutive_failures: u32,
}

impl NotificationGate {
    pub fn new(settings: GateSettings) -> Self {
        Self {
            settings,
            last_success: None,
            retry_at: None,
            consecutive_failures: 0,
        }
    }

    /// True when an attempt at `now` is allowed.
    pub fn ready(&self, now: Instant) -> bool {
        if let Some(retry_at) = self.retry_at {
            if now < retry_at {
                return false;
            }
        }
        match self.last_success {
            None => true,
            Some(sent) => now.saturating_duration_since(sent) > self.settings.cooldown,
        }
    }

    pub fn record_success(&mut self, now: Instant) {
        self.last_success = Some(now);
        self.retry_at = None;
        self.consecutive_failures = 0;
    }

    /// Schedule the next attempt and return the wait before it.
    pub fn record_failure(&mut self, now: Instant) -> Duration {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        let exponent = (self.consecutive_failures - 1).min(16);
        let delay = self
            .settings
            .retry_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.settings.retry_backoff_max);
        self.retry_at = if delay.is_zero() {
            None
        } else {
            Some(now + delay)
        };
        delay
    }

    pub fn last_success(&self) -> Option<Instant> {
        self.last_success
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}
