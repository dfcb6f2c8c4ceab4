//! SMS delivery for phone verification codes.

use std::sync::Arc;

use async_trait::async_trait;
use gifted_common::{AppError, AppResult, config::SmsConfig};
use serde::Deserialize;

/// Something that can deliver a text message to a phone number.
#[async_trait]
pub trait SmsSender: Send + Sync {
    /// Send `body` to `to` (E.164).
    async fn send(&self, to: &str, body: &str) -> AppResult<()>;
}

/// Type alias for the SMS service.
pub type SmsService = Arc<dyn SmsSender>;

/// Build the SMS service from configuration.
///
/// Without Twilio credentials the service only logs messages.
#[must_use]
pub fn from_config(config: Option<&SmsConfig>) -> SmsService {
    match config {
        Some(c) => Arc::new(TwilioSmsSender::new(c.clone())),
        None => {
            tracing::warn!("SMS gateway not configured; verification codes will only be logged");
            Arc::new(LogSmsSender)
        }
    }
}

/// Twilio REST API sender.
#[derive(Clone)]
pub struct TwilioSmsSender {
    http_client: reqwest::Client,
    config: SmsConfig,
}

impl TwilioSmsSender {
    /// Create a new Twilio sender.
    #[must_use]
    pub fn new(config: SmsConfig) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            config,
        }
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.base_url.trim_end_matches('/'),
            self.config.account_sid
        )
    }
}

#[async_trait]
impl SmsSender for TwilioSmsSender {
    async fn send(&self, to: &str, body: &str) -> AppResult<()> {
        let form_params = [
            ("To", to),
            ("From", self.config.from_number.as_str()),
            ("Body", body),
        ];

        let response = self
            .http_client
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&form_params)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Twilio request failed: {e}")))?;

        if response.status().is_success() {
            #[derive(Deserialize)]
            struct TwilioResponse {
                sid: Option<String>,
            }
            let result: TwilioResponse = response
                .json()
                .await
                .unwrap_or(TwilioResponse { sid: None });
            tracing::info!(sid = ?result.sid, "Verification SMS sent");
            Ok(())
        } else {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            Err(AppError::Upstream(format!(
                "Twilio returned {status}: {error_text}"
            )))
        }
    }
}

/// Sender that writes messages to the log instead of delivering them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSmsSender;

#[async_trait]
impl SmsSender for LogSmsSender {
    async fn send(&self, to: &str, body: &str) -> AppResult<()> {
        tracing::info!(to = %to, body = %body, "SMS (not sent, no gateway configured)");
        Ok(())
    }
}
