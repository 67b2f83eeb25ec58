use async_trait::async_trait;
use sqlx::Connection;

use crate::{
    entities::image::{ImageRecord, NewImageRecord},
    errors::AppError,
    repositories::sqlx_repo::SqlxImageRepo,
};

/// Access to the image table through one open connection.
#[async_trait]
pub trait ImageRepository: Send {
    async fn exists(&mut self, hsh: &str) -> Result<bool, AppError>;
    async fn insert(&mut self, record: &NewImageRecord) -> Result<i64, AppError>;
    async fn find_by_hash(&mut self, hsh: &str) -> Result<Option<ImageRecord>, AppError>;
    async fn count(&mut self) -> Result<u64, AppError>;
    async fn purge_all(&mut self) -> Result<u64, AppError>;
    async fn close(self) -> Result<(), AppError>
    where
        Self: Sized;
}

/// Hands out a fresh repository per sync cycle.
#[async_trait]
pub trait ImageStore: Send + Sync {
    type Repo: ImageRepository;

    async fn ensure_schema(&self) -> Result<(), AppError>;
    async fn open(&self) -> Result<Self::Repo, AppError>;
}

impl SqlxImageRepo {
    pub fn new(conn: sqlx::SqliteConnection) -> Self {
        SqlxImageRepo { conn }
    }
}

#[async_trait]
impl ImageRepository for SqlxImageRepo {
    async fn exists(&mut self, hsh: &str) -> Result<bool, AppError> {
        let exists: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM bing_images WHERE hsh = ?1 LIMIT 1)",
        )
        .bind(hsh)
        .fetch_one(&mut self.conn)
        .await?;

        Ok(exists != 0)
    }

    async fn insert(&mut self, record: &NewImageRecord) -> Result<i64, AppError> {
        let mut tx = self.conn.begin().await?;

        let result = sqlx::query(
            r#"INSERT INTO bing_images (
                date,
                url,
                copyright,
                hsh,
                zone,
                detail,
                _create_time,
                _update_time
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
            "#,
        )
        .bind(&record.date)
        .bind(&record.url)
        .bind(&record.copyright)
        .bind(&record.hsh)
        .bind(record.zone.as_str())
        .bind(&record.detail)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(format!("Image with hash {} already exists", record.hsh))
            }
            _ => AppError::from(e),
        })?;

        tx.commit().await?;

        Ok(result.last_insert_rowid())
    }

    async fn find_by_hash(&mut self, hsh: &str) -> Result<Option<ImageRecord>, AppError> {
        sqlx::query_as::<_, ImageRecord>(
            r#"SELECT id, date, url, copyright, hsh, zone, detail, _create_time, _update_time
            FROM bing_images WHERE hsh = ?1"#,
        )
        .bind(hsh)
        .fetch_optional(&mut self.conn)
        .await
        .map_err(AppError::from)
    }

    async fn count(&mut self) -> Result<u64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bing_images")
            .fetch_one(&mut self.conn)
            .await?;

        Ok(count as u64)
    }

    async fn purge_all(&mut self) -> Result<u64, AppError> {
        let mut tx = self.conn.begin().await?;

        let result = sqlx::query("DELETE FROM bing_images")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected())
    }

    async fn close(self) -> Result<(), AppError> {
        self.conn.close().await.map_err(AppError::from)
    }
}
