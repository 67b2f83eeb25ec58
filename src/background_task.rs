use std::future::Future;

use chrono::Utc;
use humantime::format_duration;
use tokio::time::{sleep, Duration};

use crate::{
    constants::START_TIME,
    repositories::{download::ImageDownloader, feed::ImageFeed, image::ImageStore, notify::Notifier},
    use_cases::sync::SyncHandler,
};

/// Runs sync cycles until `shutdown` resolves. The signal is only observed
/// while waiting between cycles, so an in-flight cycle always finishes.
pub async fn start_sync_task<S, F, D, N>(
    handler: &SyncHandler<S, F, D, N>,
    interval: Duration,
    shutdown: impl Future<Output = ()>,
) where
    S: ImageStore,
    F: ImageFeed,
    D: ImageDownloader,
    N: Notifier,
{
    tokio::pin!(shutdown);
    let mut cycles: u64 = 0;

    loop {
        cycles += 1;
        if let Err(e) = handler.run_cycle().await {
            tracing::error!(target: "bing::sync", cycle = cycles, "Sync cycle failed: {}", e);
        }

        tracing::info!(
            target: "bing::sync",
            "Waiting {} for next round",
            format_duration(interval)
        );

        tokio::select! {
            _ = sleep(interval) => {}
            _ = &mut shutdown => break,
        }
    }

    let uptime = Utc::now().signed_duration_since(*START_TIME);
    tracing::info!(
        target: "bing::sync",
        cycles,
        "Sync loop stopped after {}",
        format_duration(Duration::from_secs(uptime.num_seconds().max(0) as u64))
    );
}
