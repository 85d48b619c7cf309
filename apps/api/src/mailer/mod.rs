//! Mailer: the single point of entry for outbound email.
//!
//! Posts JSON to a transactional email relay (`MAIL_API_URL`). When no relay is
//! configured the message is logged and dropped, so local setups need nothing.
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

pub mod templates;

const MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Relay error (status {status}): {message}")]
    Relay { status: u16, message: String },

    #[error("Gave up after {retries} retries")]
    Exhausted { retries: u32 },
}

/// A rendered email ready to send.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[derive(Debug, Serialize)]
struct RelayRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

#[derive(Clone)]
pub struct Mailer {
    client: Client,
    api_url: Option<String>,
    api_key: Option<String>,
    from: String,
}

impl Mailer {
    pub fn new(
        api_url: Option<String>,
        api_key: Option<String>,
        from: String,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()?,
            api_url,
            api_key,
            from,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.api_url.is_some()
    }

    /// Sends an email through the relay.
    /// Retries on 429 (rate limit) and 5xx errors with exponential backoff.
    pub async fn send(&self, email: &Email) -> Result<(), MailError> {
        let Some(api_url) = self.api_url.as_deref() else {
            info!(
                "Mail relay disabled; dropping email to {} ({})",
                email.to, email.subject
            );
            return Ok(());
        };

        let body = RelayRequest {
            from: &self.from,
            to: &email.to,
            subject: &email.subject,
            text: &email.text,
        };

        let mut last_error: Option<MailError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "Mail attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let mut request = self.client.post(api_url).json(&body);
            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key);
            }

            let response = match request.send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(MailError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let message = response.text().await.unwrap_or_default();
                last_error = Some(MailError::Relay {
                    status: status.as_u16(),
                    message,
                });
                continue;
            }

            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(MailError::Relay {
                    status: status.as_u16(),
                    message,
                });
            }

            info!("Sent email to {} ({})", email.to, email.subject);
            return Ok(());
        }

        Err(last_error.unwrap_or(MailError::Exhausted {
            retries: MAX_RETRIES,
        }))
    }

    /// Sends in the background. Failures are logged; callers never wait on the relay.
    pub fn dispatch(&self, email: Email) {
        let mailer = self.clone();
        tokio::spawn(async move {
            if let Err(e) = mailer.send(&email).await {
                warn!("Failed to send email to {}: {e}", email.to);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_mailer_drops_silently() {
        let mailer = Mailer::new(None, None, "no-reply@hiring.local".to_string()).unwrap();
        assert!(!mailer.is_enabled());
        let email = Email {
            to: "ana@example.com".to_string(),
            subject: "Hello".to_string(),
            text: "Body".to_string(),
        };
        assert!(mailer.send(&email).await.is_ok());
    }
}
