use std::{path::{Path, PathBuf}, time::Duration};

use async_trait::async_trait;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode},
    ConnectOptions, Executor,
};
use tracing::info;

use crate::{
    errors::AppError,
    repositories::{image::{ImageRepository, ImageStore}, sqlx_repo::SqlxImageRepo},
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS bing_images (
    id INTEGER PRIMARY KEY,
    date VARCHAR(16) NOT NULL DEFAULT '',
    url VARCHAR(255) NOT NULL DEFAULT '',
    copyright TEXT NOT NULL DEFAULT '',
    hsh VARCHAR(64) NOT NULL DEFAULT '' UNIQUE,
    zone VARCHAR(8) NOT NULL DEFAULT 'CN',
    detail TEXT NOT NULL DEFAULT '',
    _create_time DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    _update_time DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_bing_images_date ON bing_images (date);
"#;

/// SQLite file holding the image table. Connections are short lived: one per
/// sync cycle, closed before the loop sleeps.
#[derive(Debug, Clone)]
pub struct SqliteImageStore {
    path: PathBuf,
    options: SqliteConnectOptions,
}

impl SqliteImageStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .disable_statement_logging();

        SqliteImageStore { path, options }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deletes every stored record. A missing database file is left alone.
    pub async fn purge_all(&self) -> Result<u64, AppError> {
        if !self.path.exists() {
            info!(target: "bing::store", path = %self.path.display(), "No database to purge");
            return Ok(0);
        }

        self.ensure_schema().await?;
        let mut repo = self.open().await?;
        let deleted = repo.purge_all().await?;
        repo.close().await?;

        info!(target: "bing::store", deleted, "Purged image records");
        Ok(deleted)
    }
}

#[async_trait]
impl ImageStore for SqliteImageStore {
    type Repo = SqlxImageRepo;

    async fn ensure_schema(&self) -> Result<(), AppError> {
        let mut conn = self.options.connect().await?;
        conn.execute(SCHEMA).await?;
        sqlx::Connection::close(conn).await?;

        info!(target: "bing::store", path = %self.path.display(), "Database schema ready");
        Ok(())
    }

    async fn open(&self) -> Result<SqlxImageRepo, AppError> {
        let conn = self.options.connect().await?;
        Ok(SqlxImageRepo::new(conn))
    }
}
