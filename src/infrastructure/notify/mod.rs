pub mod log;
pub mod webhook;

use async_trait::async_trait;

use crate::{errors::AppError, repositories::notify::Notifier};

pub use self::{log::LogNotifier, webhook::WebhookNotifier};

/// The notifier picked from configuration at startup.
#[derive(Clone)]
pub enum AppNotifier {
    Log(LogNotifier),
    Webhook(WebhookNotifier),
}

impl AppNotifier {
    pub fn from_config(client: reqwest::Client, webhook_url: Option<&str>) -> Self {
        match webhook_url {
            Some(url) if !url.trim().is_empty() => AppNotifier::Webhook(WebhookNotifier::new(client, url)),
            _ => AppNotifier::Log(LogNotifier),
        }
    }
}

#[async_trait]
impl Notifier for AppNotifier {
    async fn notify(&self, recipient: &str, subject: &str, body: &str) -> Result<(), AppError> {
        match self {
            AppNotifier::Log(n) => n.notify(recipient, subject, body).await,
            AppNotifier::Webhook(n) => n.notify(recipient, subject, body).await,
        }
    }
}
