use async_trait::async_trait;
use tracing::info;

use crate::{errors::AppError, repositories::notify::Notifier};

/// Notifier used when no delivery channel is configured.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, recipient: &str, subject: &str, body: &str) -> Result<(), AppError> {
        info!(target: "bing::notify", recipient, subject, body, "Notification");
        Ok(())
    }
}
