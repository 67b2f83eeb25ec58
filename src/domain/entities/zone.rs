use std::fmt;

use serde::{Deserialize, Serialize};

/// Feed variant an image was fetched under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Zone {
    #[default]
    #[serde(rename = "CN", alias = "cn")]
    Cn,
    #[serde(rename = "EN", alias = "en")]
    En,
}

impl Zone {
    pub const ALL: [Zone; 2] = [Zone::Cn, Zone::En];

    pub fn as_str(&self) -> &'static str {
        match self {
            Zone::Cn => "CN",
            Zone::En => "EN",
        }
    }

    /// Value of the `ensearch` query parameter selecting this variant.
    pub fn ensearch(&self) -> u8 {
        match self {
            Zone::Cn => 0,
            Zone::En => 1,
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
