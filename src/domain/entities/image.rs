use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

use crate::{entities::zone::Zone, errors::AppError};

/// One image as reported by the archive feed.
///
/// Only the fields the sync loop needs are typed. The entry itself is kept
/// verbatim, keys in feed order, and is what gets serialized for the stored
/// detail and notifications. Entries with missing or non-string fields still
/// decode; they carry empty typed fields and fail validation on their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(from = "Value", into = "Value")]
pub struct ImageDescriptor {
    #[validate(length(min = 1, message = "Image date is required"))]
    pub startdate: String,

    #[validate(length(min = 1, message = "Image url is required"))]
    pub url: String,

    pub copyright: String,

    #[validate(length(min = 1, message = "Image hash is required"))]
    pub hsh: String,

    raw: Map<String, Value>,
}

impl ImageDescriptor {
    pub fn new(hsh: &str, url: &str, startdate: &str, copyright: &str) -> Self {
        let raw = [("startdate", startdate), ("url", url), ("copyright", copyright), ("hsh", hsh)]
            .into_iter()
            .map(|(key, value)| (key.to_string(), Value::from(value)))
            .collect();

        ImageDescriptor {
            startdate: startdate.to_string(),
            url: url.to_string(),
            copyright: copyright.to_string(),
            hsh: hsh.to_string(),
            raw,
        }
    }

    /// The entry as the feed sent it.
    pub fn raw(&self) -> &Map<String, Value> {
        &self.raw
    }

    /// Full descriptor as JSON, non-ASCII text left as is.
    pub fn to_payload(&self) -> Result<String, AppError> {
        Ok(serde_json::to_string(&self.raw)?)
    }
}

impl From<Value> for ImageDescriptor {
    fn from(entry: Value) -> Self {
        let raw = match entry {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        let text = |key: &str| {
            raw.get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let startdate = text("startdate");
        let url = text("url");
        let copyright = text("copyright");
        let hsh = text("hsh");

        ImageDescriptor { startdate, url, copyright, hsh, raw }
    }
}

impl From<ImageDescriptor> for Value {
    fn from(descriptor: ImageDescriptor) -> Self {
        Value::Object(descriptor.raw)
    }
}

/// Decoded response of a metadata request. UI fields such as `tooltips` and
/// `quiz` are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageBatch {
    #[serde(default)]
    pub images: Vec<ImageDescriptor>,
}

impl ImageBatch {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewImageRecord {
    pub date: String,
    pub url: String,
    pub copyright: String,
    pub hsh: String,
    pub zone: Zone,
    pub detail: String,
}

impl NewImageRecord {
    pub fn from_descriptor(zone: Zone, descriptor: &ImageDescriptor) -> Result<Self, AppError> {
        Ok(NewImageRecord {
            date: descriptor.startdate.clone(),
            url: descriptor.url.clone(),
            copyright: descriptor.copyright.clone(),
            hsh: descriptor.hsh.clone(),
            zone,
            detail: descriptor.to_payload()?,
        })
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ImageRecord {
    pub id: i64,
    pub date: String,
    pub url: String,
    pub copyright: String,
    pub hsh: String,
    pub zone: String,
    pub detail: String,
    #[sqlx(rename = "_create_time")]
    pub created_at: NaiveDateTime,
    #[sqlx(rename = "_update_time")]
    pub updated_at: NaiveDateTime,
}

impl ImageRecord {
    pub fn descriptor(&self) -> Result<ImageDescriptor, AppError> {
        Ok(serde_json::from_str(&self.detail)?)
    }
}
