use std::path::PathBuf;

use async_trait::async_trait;

use crate::{
    entities::{image::ImageDescriptor, zone::Zone},
    errors::DownloadError,
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageDownloader: Send + Sync {
    /// Stores the image behind `descriptor` and returns the path it was written to.
    async fn download(
        &self,
        zone: Zone,
        date: &str,
        descriptor: &ImageDescriptor,
    ) -> Result<PathBuf, DownloadError>;
}
