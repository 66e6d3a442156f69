//! Configuration loading for bridgebot.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Get the bridgebot home directory (~/.bridgebot).
pub fn get_home_dir() -> Result<PathBuf> {
    let home = directories::UserDirs::new()
        .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;

    Ok(home.home_dir().join(".bridgebot"))
}

/// Get the default settings file path.
pub fn get_settings_path() -> Result<PathBuf> {
    Ok(get_home_dir()?.join("settings.json"))
}

/// Load settings from an explicit path, or ~/.bridgebot/settings.json.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => get_settings_path()?,
    };

    if !path.exists() {
        return Err(Error::Config(format!(
            "Settings file not found at {}",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(&path)?;
    let settings: Settings = serde_json::from_str(&content)?;

    validate_settings(&settings)?;

    tracing::debug!("Loaded settings from {}", path.display());
    Ok(settings)
}

fn validate_settings(settings: &Settings) -> Result<()> {
    if settings.username.trim().is_empty() {
        return Err(Error::Config("username is required".to_string()));
    }
    if settings.prefix.is_empty() {
        return Err(Error::Config("prefix must not be empty".to_string()));
    }
    if settings.poll_interval_ms == 0 {
        return Err(Error::Config("poll_interval_ms must be positive".to_string()));
    }
    if settings.log.file.is_empty() || settings.log.file.contains(['/', '\\']) {
        return Err(Error::Config(format!(
            "log.file must be a plain file name, got '{}'",
            settings.log.file
        )));
    }
    if let Err(e) = tracing_subscriber::EnvFilter::try_new(&settings.log.filter) {
        return Err(Error::Config(format!("invalid log.filter: {}", e)));
    }
    if let Some(archive) = &settings.archive {
        if archive.remote_url.is_empty() || archive.web_url_base.is_empty() {
            return Err(Error::Config(
                "archive.remote_url and archive.web_url_base are required".to_string(),
            ));
        }
    }
    Ok(())
}

/// Git wiki archive configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ArchiveConfig {
    pub remote_url: String,
    pub web_url_base: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Local working copy; defaults to the project data dir.
    pub checkout_dir: Option<PathBuf>,
    pub author_email: Option<String>,
}

fn default_branch() -> String {
    "master".to_string()
}

/// Logging configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct LogConfig {
    /// `EnvFilter` directives; `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_filter")]
    pub filter: String,

    /// Daily rotated file name.
    #[serde(default = "default_log_file")]
    pub file: String,

    /// Log directory; defaults to `logs/` in the project data dir.
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Write the file log as JSON lines.
    #[serde(default)]
    pub json: bool,
}

fn default_log_filter() -> String {
    "info,bridgebot=debug".to_string()
}

fn default_log_file() -> String {
    "bridgebot.log".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            file: default_log_file(),
            dir: None,
            json: false,
        }
    }
}

/// Identity file configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct IdentityConfig {
    pub path: PathBuf,
}

/// bridgebot settings.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Settings {
    #[serde(default = "default_prefix")]
    pub prefix: String,

    pub username: String,

    pub token: Option<String>,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default)]
    pub archive: Option<ArchiveConfig>,

    #[serde(default)]
    pub identity: Option<IdentityConfig>,

    /// Usernames (as resolved by the identity store) allowed to reload modules.
    #[serde(default)]
    pub admins: Vec<String>,

    #[serde(default)]
    pub log: LogConfig,
}

fn default_prefix() -> String {
    ".".to_string()
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    4242
}

fn default_poll_interval_ms() -> u64 {
    100
}

impl Settings {
    /// Base URL of the message bridge API.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            username: "bridgebot".to_string(),
            token: None,
            host: default_host(),
            port: default_port(),
            poll_interval_ms: default_poll_interval_ms(),
            archive: None,
            identity: None,
            admins: Vec::new(),
            log: LogConfig::default(),
        }
    }
}
