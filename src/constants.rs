use std::time::Duration;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;

pub static START_TIME: Lazy<DateTime<Utc>> = Lazy::new(Utc::now);

pub const BING_BASE_URL: &str = "https://www.bing.com";
pub const ARCHIVE_PATH: &str = "/HPImageArchive.aspx";

/// The archive endpoint refuses to return more than eight images per request.
pub const MAX_BATCH_SIZE: u8 = 8;

pub const MAX_FETCH_ATTEMPTS: u32 = 3;
pub const FEED_TIMEOUT: Duration = Duration::from_secs(5);
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(10);
pub const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

pub const UHD_WIDTH: u32 = 3840;
pub const UHD_HEIGHT: u32 = 2160;

pub const DATE_FORMAT: &str = "%Y%m%d";

pub const SUBJECT_SUCCESS: &str = "Bing Wallpaper Download SUCCESS";
pub const SUBJECT_ERROR: &str = "Bing Wallpaper Download ERROR";
