use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::{constants::NOTIFY_TIMEOUT, errors::AppError, repositories::notify::Notifier};

#[derive(Debug, Serialize)]
struct WebhookMessage<'a> {
    recipient: &'a str,
    subject: &'a str,
    body: &'a str,
}

/// Posts each notification as JSON to a configured URL. Delivery is bounded
/// by a timeout so a stalled endpoint can't hold up the sync loop.
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
    timeout: Duration,
}

impl WebhookNotifier {
    pub fn new(client: Client, url: &str) -> Self {
        WebhookNotifier {
            client,
            url: url.to_string(),
            timeout: NOTIFY_TIMEOUT,
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, recipient: &str, subject: &str, body: &str) -> Result<(), AppError> {
        let response = self
            .client
            .post(&self.url)
            .json(&WebhookMessage { recipient, subject, body })
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| AppError::InternalError(format!("Webhook request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::InternalError(format!("Webhook returned status {}", status)));
        }

        debug!(target: "bing::notify", subject, "Notification delivered");
        Ok(())
    }
}
