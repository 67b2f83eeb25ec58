use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use dotenv::dotenv;
use std::{env, fmt, path::PathBuf, str::FromStr, time::Duration};
use url::Url;

use crate::{constants::BING_BASE_URL, entities::zone::Zone};

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum AppEnvironment {
    Development,
    Production,
    Testing,
}

impl FromStr for AppEnvironment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" => Ok(AppEnvironment::Development),
            "production" => Ok(AppEnvironment::Production),
            "testing" => Ok(AppEnvironment::Testing),
            _ => Err(ConfigError::Message(format!("Invalid environment: {}", s))),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Deserialize, Clone)]
#[serde(rename_all = "snake_case")]
pub struct AppConfig {
    #[serde(default = "default_env")]
    pub env: AppEnvironment,

    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    #[serde(default = "default_database_dir")]
    pub database_dir: PathBuf,

    #[serde(default = "default_database_file")]
    pub database_file: String,

    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,

    #[serde(default)]
    pub zone: Zone,

    #[serde(default = "default_feed_base_url")]
    pub feed_base_url: String,

    #[serde(default)]
    pub notify_recipient: String,

    #[serde(default)]
    pub notify_webhook_url: Option<String>,

    #[serde(default)]
    pub purge_on_start: bool,

    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_env() -> AppEnvironment {
    AppEnvironment::Development
}
fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}
fn default_database_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_database_file() -> String {
    "bing.db".to_string()
}
fn default_scan_interval() -> u64 {
    60 * 60
}
fn default_feed_base_url() -> String {
    BING_BASE_URL.to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            env: default_env(),
            download_dir: default_download_dir(),
            database_dir: default_database_dir(),
            database_file: default_database_file(),
            scan_interval_secs: default_scan_interval(),
            zone: Zone::default(),
            feed_base_url: default_feed_base_url(),
            notify_recipient: String::new(),
            notify_webhook_url: None,
            purge_on_start: false,
            log_format: LogFormat::default(),
        }
    }
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        dotenv().ok();

        let raw_env = env::var("APP_ENV").unwrap_or_else(|_| "development".into());
        Self::load(&raw_env, None)
    }

    /// Layers defaults, the per-environment file and `APP_*` variables. `vars`
    /// replaces the process environment when given.
    fn load(raw_env: &str, vars: Option<config::Map<String, String>>) -> Result<Self, ConfigError> {
        let env_name = AppEnvironment::from_str(raw_env)
            .map_err(|_| ConfigError::Message(format!("Invalid APP_ENV value: {}", raw_env)))?;

        let environment = Environment::with_prefix("APP")
            .prefix_separator("_")
            .try_parsing(true)
            .ignore_empty(true)
            .source(vars);

        // APP_ENV is matched case-insensitively above; the override keeps the
        // raw value from reaching the lowercase enum.
        let builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env_name)).required(false))
            .add_source(environment)
            .set_override("env", env_name.to_string())?;

        let mut config: Self = builder.build()?.try_deserialize()?;
        config.feed_base_url = config.feed_base_url.trim_end_matches('/').to_string();

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.scan_interval_secs == 0 {
            errors.push("SCAN_INTERVAL_SECS must be greater than zero".to_string());
        }
        if self.database_file.trim().is_empty() {
            errors.push("DATABASE_FILE cannot be empty".to_string());
        }
        if self.download_dir.as_os_str().is_empty() {
            errors.push("DOWNLOAD_DIR cannot be empty".to_string());
        }
        if let Err(e) = Url::parse(&self.feed_base_url) {
            errors.push(format!("FEED_BASE_URL is not a valid URL: {e}"));
        }
        if let Some(webhook) = &self.notify_webhook_url {
            if Url::parse(webhook).is_err() {
                errors.push("NOTIFY_WEBHOOK_URL is not a valid URL".to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Message(errors.join(", ")))
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.database_dir.join(&self.database_file)
    }

    pub fn zone_dir(&self, zone: Zone) -> PathBuf {
        self.download_dir.join(zone.as_str())
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }
}

impl fmt::Display for AppEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AppEnvironment::Development => "development",
            AppEnvironment::Production => "production",
            AppEnvironment::Testing => "testing",
        };
        write!(f, "{s}")
    }
}

trait Redact {
    fn redact(&self) -> &str;
}

impl Redact for Option<String> {
    fn redact(&self) -> &str {
        match self {
            Some(s) if !s.is_empty() => "[REDACTED]",
            _ => "[NOT SET]",
        }
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("download_dir", &self.download_dir)
            .field("database_dir", &self.database_dir)
            .field("database_file", &self.database_file)
            .field("scan_interval_secs", &self.scan_interval_secs)
            .field("zone", &self.zone)
            .field("feed_base_url", &self.feed_base_url)
            .field("notify_recipient", &self.notify_recipient)
            .field("notify_webhook_url", &self.notify_webhook_url.redact())
            .field("purge_on_start", &self.purge_on_start)
            .field("log_format", &self.log_format)
            .finish()
    }
}


/// Command line switches. Everything else comes from configuration.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunFlags {
    pub clean_db: bool,
    pub once: bool,
    pub unknown: Vec<String>,
}

impl RunFlags {
    pub fn from_args(args: impl IntoIterator<Item = String>) -> Self {
        let mut flags = RunFlags::default();
        for arg in args {
            match arg.as_str() {
                "--cleandb" => flags.clean_db = true,
                "--once" => flags.once = true,
                _ => flags.unknown.push(arg),
            }
        }
        flags
    }
}
