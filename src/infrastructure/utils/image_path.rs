use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::{constants::DATE_FORMAT, entities::zone::Zone, errors::DownloadError};

static FILE_NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^/th\?id=(.*)&rf=([^&]*)").expect("file name pattern is valid")
});

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "webp", "gif", "bmp"];

/// Where an image for a given zone and date lands on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePath {
    pub dir: PathBuf,
    pub file: PathBuf,
}

/// Extracts the image identifier from a feed resource path such as
/// `/th?id=OHR.WallaceFF_EN-CN6550155171_UHD.jpg&rf=LaDigue_UHD.jpg&pid=hp`.
pub fn image_identifier(url: &str) -> Result<String, DownloadError> {
    let captures = FILE_NAME_PATTERN
        .captures(url)
        .ok_or_else(|| DownloadError::MalformedUrl(url.to_string()))?;

    let id = &captures[1];
    if id.is_empty() || id.contains(['/', '\\']) || id == "." || id == ".." {
        return Err(DownloadError::MalformedUrl(url.to_string()));
    }

    if has_image_extension(id) {
        return Ok(id.to_string());
    }

    match Path::new(&captures[2]).extension().and_then(|e| e.to_str()) {
        Some(ext) if is_image_extension(ext) => Ok(format!("{id}.{ext}")),
        _ => Ok(id.to_string()),
    }
}

/// Checks the date is a calendar day in `YYYYMMDD` form.
pub fn validate_date(date: &str) -> Result<NaiveDate, DownloadError> {
    if date.len() != 8 || !date.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DownloadError::MalformedDate(date.to_string()));
    }
    NaiveDate::parse_from_str(date, DATE_FORMAT)
        .map_err(|_| DownloadError::MalformedDate(date.to_string()))
}

/// `{download_dir}/{zone}/{yyyymm}/{date}_{identifier}`
pub fn image_path(
    download_dir: &Path,
    zone: Zone,
    date: &str,
    url: &str,
) -> Result<ImagePath, DownloadError> {
    validate_date(date)?;
    let identifier = image_identifier(url)?;

    let month = &date[..date.len() - 2];
    let dir = download_dir.join(zone.as_str()).join(month);
    let file = dir.join(format!("{date}_{identifier}"));

    Ok(ImagePath { dir, file })
}

fn has_image_extension(id: &str) -> bool {
    Path::new(id)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(is_image_extension)
}

fn is_image_extension(ext: &str) -> bool {
    IMAGE_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(ext))
}
