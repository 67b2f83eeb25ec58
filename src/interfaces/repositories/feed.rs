use async_trait::async_trait;

use crate::{
    entities::{image::ImageBatch, zone::Zone},
    errors::FetchError,
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageFeed: Send + Sync {
    /// Fetches up to `count` descriptors starting `offset` days back from today.
    async fn fetch(&self, offset: u32, count: u8, zone: Zone) -> Result<ImageBatch, FetchError>;
}
