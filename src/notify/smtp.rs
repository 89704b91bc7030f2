use std::time::Duration;

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use super::{Notifier, NotifyError};
use crate::config::Secret;

pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 587;
pub const DEFAULT_SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Relay and credentials for email alerts.
#[derive(Clone, Debug)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub sender: Option<String>,
    pub password: Option<Secret>,
    pub receiver: Option<String>,
    pub timeout: Duration,
}

impl Default for SmtpSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_SMTP_HOST.to_string(),
            port: DEFAULT_SMTP_PORT,
            sender: None,
            password: None,
            receiver: None,
            timeout: DEFAULT_SMTP_TIMEOUT,
        }
    }
}

/// Sends alerts through an SMTP relay with STARTTLS.
///
/// Each call opens its own connection and closes it before returning; nothing
/// is pooled across loop iterations.
pub struct SmtpNotifier {
    settings: SmtpSettings,
}

impl SmtpNotifier {
    pub fn new(settings: SmtpSettings) -> Self {
        Self { settings }
    }

    fn compose(&self, subject: &str, body: &str) -> Result<(Message, String, &Secret), NotifyError> {
        let sender = non_empty(self.settings.sender.as_deref())
            .ok_or(NotifyError::MissingCredentials("SENDER_EMAIL is not set"))?;
        let password = self
            .settings
            .password
            .as_ref()
            .filter(|secret| !secret.expose().is_empty())
            .ok_or(NotifyError::MissingCredentials("SENDER_PASSWORD is not set"))?;
        let receiver = non_empty(self.settings.receiver.as_deref())
            .ok_or(NotifyError::MissingCredentials("RECEIVER_EMAIL is not set"))?;

        let from: Mailbox = sender.parse().map_err(|e| {
            NotifyError::Unexpected(format!("invalid sender address {}: {}", sender, e))
        })?;
        let to: Mailbox = receiver.parse().map_err(|e| {
            NotifyError::Unexpected(format!("invalid receiver address {}: {}", receiver, e))
        })?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| NotifyError::Unexpected(format!("build message: {}", e)))?;
        Ok((message, sender.to_string(), password))
    }
}

impl Notifier for SmtpNotifier {
    fn notify(&mut self, subject: &str, body: &str) -> Result<(), NotifyError> {
        let (message, sender, password) = self.compose(subject, body)?;

        log::info!(
            "connecting to SMTP server {}:{}",
            self.settings.host,
            self.settings.port
        );
        let mailer = SmtpTransport::starttls_relay(&self.settings.host)
            .map_err(classify)?
            .port(self.settings.port)
            .credentials(Credentials::new(sender, password.expose().to_string()))
            .timeout(Some(self.settings.timeout))
            .build();

        mailer.send(&message).map_err(classify)?;
        log::info!("notification email sent");
        Ok(())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Map transport errors onto the alerting error kinds.
fn classify(err: lettre::transport::smtp::Error) -> NotifyError {
    // 530 / 534 / 535: authentication required or rejected.
    let auth_rejected = err
        .status()
        .map(|code| code.to_string().starts_with("53"))
        .unwrap_or(false);
    if auth_rejected {
        NotifyError::Auth(err.to_string())
    } else if err.is_client() {
        NotifyError::Unexpected(err.to_string())
    } else {
        NotifyError::Transport(err.to_string())
    }
}
