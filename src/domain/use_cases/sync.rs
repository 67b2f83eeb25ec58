use std::path::PathBuf;

use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    constants::{MAX_BATCH_SIZE, SUBJECT_ERROR, SUBJECT_SUCCESS},
    entities::{
        image::{ImageDescriptor, NewImageRecord},
        zone::Zone,
    },
    errors::AppError,
    repositories::{
        download::ImageDownloader,
        feed::ImageFeed,
        image::{ImageRepository, ImageStore},
        notify::Notifier,
    },
};

/// What happened to one descriptor during a cycle.
#[derive(Debug, PartialEq)]
pub enum ItemOutcome {
    Known,
    Downloaded(PathBuf),
    Failed,
    Invalid,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct CycleReport {
    pub fetched: usize,
    pub known: usize,
    pub downloaded: usize,
    pub failed: usize,
    pub invalid: usize,
}

impl CycleReport {
    fn record(&mut self, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Known => self.known += 1,
            ItemOutcome::Downloaded(_) => self.downloaded += 1,
            ItemOutcome::Failed => self.failed += 1,
            ItemOutcome::Invalid => self.invalid += 1,
        }
    }
}

/// Poll, dedupe, download, persist and notify, one cycle at a time.
pub struct SyncHandler<S, F, D, N>
where
    S: ImageStore,
    F: ImageFeed,
    D: ImageDownloader,
    N: Notifier,
{
    pub store: S,
    pub feed: F,
    pub downloader: D,
    pub notifier: N,
    pub zone: Zone,
    pub recipient: String,
}

impl<S, F, D, N> SyncHandler<S, F, D, N>
where
    S: ImageStore,
    F: ImageFeed,
    D: ImageDownloader,
    N: Notifier,
{
    pub fn new(store: S, feed: F, downloader: D, notifier: N, zone: Zone, recipient: &str) -> Self {
        SyncHandler {
            store,
            feed,
            downloader,
            notifier,
            zone,
            recipient: recipient.to_string(),
        }
    }

    /// Runs one full pass over the latest batch.
    ///
    /// A feed or store failure abandons the rest of the cycle; a failed
    /// download only skips its own image.
    #[tracing::instrument(name = "sync_cycle", skip_all, fields(cycle_id = %Uuid::new_v4(), zone = %self.zone))]
    pub async fn run_cycle(&self) -> Result<CycleReport, AppError> {
        let mut repo = self.store.open().await?;

        let result = self.process_batch(&mut repo).await;

        if let Err(e) = repo.close().await {
            warn!(target: "bing::store", "Failed to close database connection: {}", e);
        }

        if let Ok(report) = &result {
            info!(
                target: "bing::sync",
                fetched = report.fetched,
                known = report.known,
                downloaded = report.downloaded,
                failed = report.failed,
                invalid = report.invalid,
                "Cycle finished"
            );
        }
        result
    }

    async fn process_batch(&self, repo: &mut S::Repo) -> Result<CycleReport, AppError> {
        let batch = self.feed.fetch(0, MAX_BATCH_SIZE, self.zone).await?;

        let mut report = CycleReport {
            fetched: batch.len(),
            ..CycleReport::default()
        };

        for descriptor in &batch.images {
            let outcome = self.process_item(repo, descriptor).await?;
            report.record(&outcome);
        }

        Ok(report)
    }

    /// Handles a single descriptor. Only store errors are returned; download
    /// problems are logged, notified and reported as `Failed`.
    pub async fn process_item(
        &self,
        repo: &mut S::Repo,
        descriptor: &ImageDescriptor,
    ) -> Result<ItemOutcome, AppError> {
        let date = descriptor.startdate.as_str();
        let hsh = descriptor.hsh.as_str();

        if let Err(e) = descriptor.validate() {
            warn!(target: "bing::sync", hsh, date, "Skipping invalid descriptor: {}", e);
            return Ok(ItemOutcome::Invalid);
        }

        if repo.exists(hsh).await? {
            info!(target: "bing::sync", date, hsh, url = %descriptor.url, "Image already known");
            return Ok(ItemOutcome::Known);
        }

        info!(target: "bing::sync", date, hsh, url = %descriptor.url, "Found new image");
        let payload = descriptor.to_payload().unwrap_or_else(|_| hsh.to_string());

        let path = match self.downloader.download(self.zone, date, descriptor).await {
            Ok(path) => path,
            Err(e) => {
                error!(target: "bing::sync", date, hsh, "Failed to download {}: {}", payload, e);
                self.send(SUBJECT_ERROR, &payload).await;
                return Ok(ItemOutcome::Failed);
            }
        };

        let record = NewImageRecord::from_descriptor(self.zone, descriptor)?;
        match repo.insert(&record).await {
            Ok(id) => {
                info!(target: "bing::sync", id, date, hsh, url = %descriptor.url, "Saved image info to db");
            }
            Err(AppError::Conflict(msg)) => {
                warn!(target: "bing::sync", date, hsh, "Image recorded concurrently: {}", msg);
                return Ok(ItemOutcome::Known);
            }
            Err(e) => return Err(e),
        }

        self.send(SUBJECT_SUCCESS, &payload).await;
        Ok(ItemOutcome::Downloaded(path))
    }

    async fn send(&self, subject: &str, body: &str) {
        if let Err(e) = self.notifier.notify(&self.recipient, subject, body).await {
            warn!(target: "bing::notify", subject, "Failed to send notification: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        entities::image::ImageBatch,
        errors::{DownloadError, FetchError},
        infrastructure::db::sqlite::SqliteImageStore,
        repositories::{download::MockImageDownloader, feed::MockImageFeed, notify::MockNotifier},
    };
    use mockall::predicate::*;
    use tempfile::TempDir;

    type TestHandler = SyncHandler<SqliteImageStore, MockImageFeed, MockImageDownloader, MockNotifier>;

    fn foo() -> ImageDescriptor {
        ImageDescriptor::new("abc123", "/th?id=OHR.Foo&rf=Foo.jpg", "20240115", "X")
    }

    fn bar() -> ImageDescriptor {
        ImageDescriptor::new("def456", "/th?id=OHR.Bar&rf=Bar.jpg", "20240114", "Y")
    }

    fn feed_returning(images: Vec<ImageDescriptor>) -> MockImageFeed {
        let mut feed = MockImageFeed::new();
        feed.expect_fetch()
            .with(eq(0), eq(8), eq(Zone::Cn))
            .returning(move |_, _, _| Ok(ImageBatch { images: images.clone() }));
        feed
    }

    async fn handler(feed: MockImageFeed, downloader: MockImageDownloader, notifier: MockNotifier) -> (TempDir, TestHandler) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteImageStore::new(dir.path().join("bing.db"));
        store.ensure_schema().await.unwrap();
        (dir, SyncHandler::new(store, feed, downloader, notifier, Zone::Cn, "ops@example.com"))
    }

    async fn seed(store: &SqliteImageStore, image: &ImageDescriptor) {
        let mut repo = store.open().await.unwrap();
        repo.insert(&NewImageRecord::from_descriptor(Zone::Cn, image).unwrap()).await.unwrap();
        repo.close().await.unwrap();
    }

    #[tokio::test]
    async fn new_image_is_downloaded_recorded_and_notified() {
        let mut downloader = MockImageDownloader::new();
        downloader
            .expect_download()
            .withf(|zone, date, image| *zone == Zone::Cn && date == "20240115" && image.hsh == "abc123")
            .times(1)
            .returning(|_, _, _| Ok(PathBuf::from("CN/202401/20240115_OHR.Foo.jpg")));

        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(|to, subject, body| {
                to == "ops@example.com" && subject == SUBJECT_SUCCESS && body.contains("abc123")
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let (_dir, handler) = handler(feed_returning(vec![foo()]), downloader, notifier).await;
        let report = handler.run_cycle().await.unwrap();

        assert_eq!(report.fetched, 1);
        assert_eq!(report.downloaded, 1);

        let mut repo = handler.store.open().await.unwrap();
        let stored = repo.find_by_hash("abc123").await.unwrap().unwrap();
        assert_eq!(stored.date, "20240115");
        assert_eq!(stored.zone, "CN");
    }

    #[tokio::test]
    async fn known_image_is_not_downloaded() {
        let mut downloader = MockImageDownloader::new();
        downloader.expect_download().times(0);
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().times(0);

        let (_dir, handler) = handler(feed_returning(vec![foo()]), downloader, notifier).await;
        seed(&handler.store, &foo()).await;

        let report = handler.run_cycle().await.unwrap();

        assert_eq!(report.known, 1);
        assert_eq!(report.downloaded, 0);
        let mut repo = handler.store.open().await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn failed_download_is_isolated_and_notified() {
        let mut downloader = MockImageDownloader::new();
        downloader
            .expect_download()
            .withf(|_, _, image| image.hsh == "abc123")
            .returning(|_, _, _| Err(DownloadError::Status { status: 404, body: String::new() }));
        downloader
            .expect_download()
            .withf(|_, _, image| image.hsh == "def456")
            .returning(|_, _, _| Ok(PathBuf::from("CN/202401/20240114_OHR.Bar.jpg")));

        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(|_, subject, body| subject == SUBJECT_ERROR && body.contains("abc123"))
            .times(1)
            .returning(|_, _, _| Ok(()));
        notifier
            .expect_notify()
            .withf(|_, subject, body| subject == SUBJECT_SUCCESS && body.contains("def456"))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let (_dir, handler) = handler(feed_returning(vec![foo(), bar()]), downloader, notifier).await;
        let report = handler.run_cycle().await.unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.downloaded, 1);

        let mut repo = handler.store.open().await.unwrap();
        assert!(!repo.exists("abc123").await.unwrap());
        assert!(repo.exists("def456").await.unwrap());
    }

    #[tokio::test]
    async fn notifier_failure_does_not_abort_cycle() {
        let mut downloader = MockImageDownloader::new();
        downloader.expect_download().returning(|_, _, _| Ok(PathBuf::from("x")));
        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .returning(|_, _, _| Err(AppError::InternalError("smtp down".into())));

        let (_dir, handler) = handler(feed_returning(vec![foo(), bar()]), downloader, notifier).await;
        let report = handler.run_cycle().await.unwrap();

        assert_eq!(report.downloaded, 2);
    }

    #[tokio::test]
    async fn invalid_descriptor_is_skipped() {
        let mut downloader = MockImageDownloader::new();
        downloader.expect_download().times(0);
        let notifier = MockNotifier::new();
        let broken = ImageDescriptor::new("", "/th?id=OHR.Foo&rf=Foo.jpg", "20240115", "X");

        let (_dir, handler) = handler(feed_returning(vec![broken]), downloader, notifier).await;
        let report = handler.run_cycle().await.unwrap();

        assert_eq!(report.invalid, 1);
    }

    #[tokio::test]
    async fn feed_failure_abandons_cycle() {
        let mut feed = MockImageFeed::new();
        feed.expect_fetch().times(1).returning(|_, _, _| {
            Err(FetchError::RetriesExhausted { attempts: 3, last: Box::new(FetchError::Timeout) })
        });
        let mut downloader = MockImageDownloader::new();
        downloader.expect_download().times(0);

        let (_dir, handler) = handler(feed, downloader, MockNotifier::new()).await;
        let err = handler.run_cycle().await.unwrap_err();

        assert!(matches!(err, AppError::FeedError(FetchError::RetriesExhausted { .. })));
    }

    #[tokio::test]
    async fn second_run_adds_no_rows() {
        let mut downloader = MockImageDownloader::new();
        downloader.expect_download().times(2).returning(|_, _, _| Ok(PathBuf::from("x")));
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().times(2).returning(|_, _, _| Ok(()));

        let (_dir, handler) = handler(feed_returning(vec![foo(), bar()]), downloader, notifier).await;

        let first = handler.run_cycle().await.unwrap();
        let second = handler.run_cycle().await.unwrap();

        assert_eq!(first.downloaded, 2);
        assert_eq!(second.downloaded, 0);
        assert_eq!(second.known, 2);
        let mut repo = handler.store.open().await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn row_recorded_by_another_instance_during_download_counts_as_known() {
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().times(0);

        let (dir, mut handler) = handler(feed_returning(vec![foo()]), MockImageDownloader::new(), notifier).await;

        // The other instance commits the row while this one is still downloading.
        let db_path = dir.path().join("bing.db");
        let mut downloader = MockImageDownloader::new();
        downloader.expect_download().times(1).returning(move |zone, _, image| {
            let other = SqliteImageStore::new(db_path.clone());
            let record = NewImageRecord::from_descriptor(zone, image).unwrap();
            tokio::task::block_in_place(|| {
                tokio::runtime::Handle::current().block_on(async {
                    let mut repo = other.open().await.unwrap();
                    repo.insert(&record).await.unwrap();
                    repo.close().await.unwrap();
                })
            });
            Ok(PathBuf::from("CN/202401/20240115_OHR.Foo.jpg"))
        });
        handler.downloader = downloader;

        let report = handler.run_cycle().await.unwrap();

        assert_eq!(report.known, 1);
        assert_eq!(report.downloaded, 0);
        let mut repo = handler.store.open().await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 1);
    }
}
