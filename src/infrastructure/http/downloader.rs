use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tokio::fs;
use tracing::{error, info};

use crate::{
    constants::DOWNLOAD_TIMEOUT,
    entities::{image::ImageDescriptor, zone::Zone},
    errors::DownloadError,
    repositories::download::ImageDownloader,
    utils::image_path::image_path,
};

pub struct HttpDownloader {
    client: Client,
    base_url: String,
    download_dir: PathBuf,
}

impl HttpDownloader {
    pub fn new(client: Client, base_url: &str, download_dir: impl Into<PathBuf>) -> Self {
        HttpDownloader {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            download_dir: download_dir.into(),
        }
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, url))
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(DownloadError::Status {
                status: status.as_u16(),
                body: body.chars().take(256).collect(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

/// Creates the month directory. Its parent, the zone directory, is created at
/// startup and must already exist.
async fn ensure_month_dir(dir: &Path) -> Result<(), DownloadError> {
    if fs::try_exists(dir).await? {
        return Ok(());
    }

    info!(target: "bing::download", dir = %dir.display(), "Creating directory");
    match fs::create_dir(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Writes `bytes` next to `path` and renames the file into place, so `path`
/// either holds the full image or does not exist.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), DownloadError> {
    let mut partial = path.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    fs::write(&partial, bytes).await?;
    if let Err(e) = fs::rename(&partial, path).await {
        let _ = fs::remove_file(&partial).await;
        return Err(e.into());
    }

    Ok(())
}

#[async_trait]
impl ImageDownloader for HttpDownloader {
    async fn download(
        &self,
        zone: Zone,
        date: &str,
        descriptor: &ImageDescriptor,
    ) -> Result<PathBuf, DownloadError> {
        let target = image_path(&self.download_dir, zone, date, &descriptor.url).inspect_err(|e| {
            error!(target: "bing::download", url = %descriptor.url, "{}", e);
        })?;
        info!(target: "bing::download", path = %target.file.display(), "Downloading image");

        ensure_month_dir(&target.dir).await?;

        let bytes = self.fetch_bytes(&descriptor.url).await.inspect_err(|e| {
            error!(target: "bing::download", url = %descriptor.url, "Failed to download: {}", e);
        })?;

        write_atomic(&target.file, &bytes).await.inspect_err(|e| {
            error!(target: "bing::download", path = %target.file.display(), "{}", e);
        })?;

        info!(
            target: "bing::download",
            path = %target.file.display(),
            size = bytes.len(),
            "Image saved"
        );
        Ok(target.file)
    }
}
