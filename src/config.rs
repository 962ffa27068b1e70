//! Run configuration: an optional TOML file overridden by command-line flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;

use crate::catalog_source::DEFAULT_CATALOG_URL;
use crate::credential_keyring::DEFAULT_KEYRING_USER;
use crate::metadata_client::DEFAULT_API_BASE_URL;
use crate::poster_store::DEFAULT_ASSET_DIR;

const CONFIG_FILE_NAME: &str = "reelshelf.toml";

/// Settings persisted in `reelshelf.toml`. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct Config {
    /// Movie database API key.
    #[serde(default)]
    pub api_key: Option<String>,
    /// SQLite database file holding enriched records.
    #[serde(default)]
    pub store_path: Option<PathBuf>,
    /// Directory receiving `{call_number}.jpg` posters.
    #[serde(default = "default_asset_dir")]
    pub asset_dir: PathBuf,
    #[serde(default = "default_catalog_url")]
    pub catalog_url: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Requests admitted per window before the client pauses.
    #[serde(default = "default_rate_limit_requests")]
    pub rate_limit_requests: u32,
    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,
    #[serde(default)]
    pub verbose: bool,
    /// Keyring account consulted when no API key is configured.
    #[serde(default)]
    pub keyring_user: Option<String>,
}

fn default_asset_dir() -> PathBuf {
    PathBuf::from(DEFAULT_ASSET_DIR)
}

fn default_catalog_url() -> String {
    DEFAULT_CATALOG_URL.to_string()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_rate_limit_requests() -> u32 {
    40
}

fn default_rate_limit_window_secs() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            store_path: None,
            asset_dir: default_asset_dir(),
            catalog_url: default_catalog_url(),
            api_base_url: default_api_base_url(),
            rate_limit_requests: default_rate_limit_requests(),
            rate_limit_window_secs: default_rate_limit_window_secs(),
            verbose: false,
            keyring_user: None,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "reelshelf")]
#[command(
    about = "Enrich a scraped library video catalog with movie metadata and posters",
    long_about = None
)]
pub struct Cli {
    /// Movie database API key (falls back to the config file, then the OS keyring)
    pub api_key: Option<String>,

    /// SQLite database file for enriched records
    pub store_path: Option<PathBuf>,

    /// Directory where posters are written
    #[arg(long = "static-path")]
    pub asset_dir: Option<PathBuf>,

    /// Config file (defaults to reelshelf.toml in the user config directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Inventory page to scrape
    #[arg(long)]
    pub catalog_url: Option<String>,

    /// Movie database API root
    #[arg(long)]
    pub api_base_url: Option<String>,

    /// Log skipped-because-complete entries and every request
    #[arg(short, long)]
    pub verbose: bool,

    /// Store the resolved API key in the OS keyring for later runs
    #[arg(long)]
    pub save_api_key: bool,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub api_key: String,
    pub store_path: PathBuf,
    pub asset_dir: PathBuf,
    pub catalog_url: String,
    pub api_base_url: String,
    pub rate_limit_requests: u32,
    pub rate_limit_window: Duration,
    pub keyring_user: String,
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

pub fn load_config_file(path: &Path) -> Result<Config, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| format!("failed to read config {}: {err}", path.display()))?;
    toml::from_str(&text).map_err(|err| format!("failed to parse config {}: {err}", path.display()))
}

/// Loads the explicit config file, or the default one when present.
pub fn load_for_cli(cli: &Cli) -> Result<Config, String> {
    match &cli.config {
        Some(path) => load_config_file(path),
        None => match default_config_path() {
            Some(path) if path.is_file() => load_config_file(&path),
            _ => Ok(Config::default()),
        },
    }
}

impl Config {
    /// Command-line values win over file values.
    pub fn apply_cli(mut self, cli: &Cli) -> Self {
        if let Some(api_key) = &cli.api_key {
            self.api_key = Some(api_key.clone());
        }
        if let Some(store_path) = &cli.store_path {
            self.store_path = Some(store_path.clone());
        }
        if let Some(asset_dir) = &cli.asset_dir {
            self.asset_dir = asset_dir.clone();
        }
        if let Some(catalog_url) = &cli.catalog_url {
            self.catalog_url = catalog_url.clone();
        }
        if let Some(api_base_url) = &cli.api_base_url {
            self.api_base_url = api_base_url.clone();
        }
        self.verbose |= cli.verbose;
        self
    }

    /// Validates and fills the credential, consulting `keyring_lookup` only
    /// when no key was configured.
    pub fn resolve<K>(self, keyring_lookup: K) -> Result<RunSettings, String>
    where
        K: FnOnce(&str) -> Result<Option<String>, String>,
    {
        let keyring_user = self
            .keyring_user
            .clone()
            .unwrap_or_else(|| DEFAULT_KEYRING_USER.to_string());
        let api_key = match self.api_key.filter(|key| !key.trim().is_empty()) {
            Some(api_key) => api_key,
            None => keyring_lookup(&keyring_user)?
                .filter(|key| !key.trim().is_empty())
                .ok_or_else(|| "Must provide a movie database API key".to_string())?,
        };
        let store_path = self
            .store_path
            .ok_or_else(|| "Must provide a database path for enriched records".to_string())?;
        if self.rate_limit_requests == 0 {
            return Err("rate_limit_requests must be at least 1".to_string());
        }
        if self.rate_limit_window_secs == 0 {
            return Err("rate_limit_window_secs must be at least 1".to_string());
        }

        Ok(RunSettings {
            api_key: api_key.trim().to_string(),
            store_path,
            asset_dir: self.asset_dir,
            catalog_url: self.catalog_url,
            api_base_url: self.api_base_url,
            rate_limit_requests: self.rate_limit_requests,
            rate_limit_window: Duration::from_secs(self.rate_limit_window_secs),
            keyring_user,
        })
    }
}
