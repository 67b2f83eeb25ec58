mod domain;
mod interfaces;
mod infrastructure;
pub mod errors;
pub mod settings;
pub mod constants;
pub mod graceful_shutdown;
pub mod background_task;
pub mod telemetry;

pub use domain::{entities, retry, use_cases};
pub use interfaces::repositories;
pub use infrastructure::{db, http, notify, utils};

use tokio::fs;
use tracing::info;

use db::sqlite::SqliteImageStore;
use entities::zone::Zone;
use errors::AppError;
use http::{bing::BingFeedClient, build_client, downloader::HttpDownloader};
use notify::AppNotifier;
use repositories::image::ImageStore;
use settings::AppConfig;
use use_cases::sync::SyncHandler;

pub type AppSyncHandler = SyncHandler<SqliteImageStore, BingFeedClient, HttpDownloader, AppNotifier>;

pub struct AppState {
    pub sync_handler: AppSyncHandler,
}

impl AppState {
    pub fn new(config: &AppConfig) -> Result<Self, AppError> {
        let client = build_client()?;

        let store = SqliteImageStore::new(config.database_path());
        let feed = BingFeedClient::new(client.clone(), &config.feed_base_url);
        let downloader = HttpDownloader::new(client.clone(), &config.feed_base_url, &config.download_dir);
        let notifier = AppNotifier::from_config(client, config.notify_webhook_url.as_deref());

        let sync_handler = SyncHandler::new(
            store,
            feed,
            downloader,
            notifier,
            config.zone,
            &config.notify_recipient,
        );

        Ok(AppState { sync_handler })
    }

    /// Creates the database and per-zone download directories, optionally
    /// purges existing records, then makes sure the schema exists.
    pub async fn prepare(&self, config: &AppConfig, purge: bool) -> Result<(), AppError> {
        fs::create_dir_all(&config.database_dir).await?;

        let store = &self.sync_handler.store;
        if purge {
            let deleted = store.purge_all().await?;
            info!(deleted, "Database cleaned before start");
        }

        for zone in Zone::ALL {
            let dir = config.zone_dir(zone);
            fs::create_dir_all(&dir).await?;
            info!(zone = %zone, dir = %dir.display(), "Download directory ready");
        }

        store.ensure_schema().await
    }
}
