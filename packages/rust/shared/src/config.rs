//! Application configuration for drugwatch.
//!
//! User config lives at `~/.drugwatch/drugwatch.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{DrugwatchError, Result};
use crate::types::{DataSource, LOOKBACK_DAYS};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "drugwatch.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".drugwatch";

const GIF_URL: &str = "https://rdg.ezdrowie.gov.pl/";
const URPL_URL: &str = "https://urpl.gov.pl/pl/decyzje";

// ---------------------------------------------------------------------------
// Config structs (matching drugwatch.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Database location.
    #[serde(default)]
    pub storage: StorageSection,

    /// Fetch and filter settings.
    #[serde(default)]
    pub scrape: ScrapeSection,

    /// Daily trigger settings.
    #[serde(default)]
    pub schedule: ScheduleSection,

    /// Upstream pages.
    #[serde(default)]
    pub sources: SourcesConfig,
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSection {
    /// Path to the libSQL database file; `~` expands to the home directory.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

impl StorageSection {
    /// Database path with a leading `~` expanded.
    pub fn resolved_path(&self) -> Result<PathBuf> {
        expand_home(&self.database_path)
    }
}

fn default_database_path() -> String {
    "~/.drugwatch/drugwatch.db".into()
}

/// `[scrape]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeSection {
    /// HTTP timeout for a source page fetch.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Trailing window of decision dates to ingest.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,

    /// User-Agent header sent upstream.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ScrapeSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            lookback_days: default_lookback_days(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_lookback_days() -> i64 {
    LOOKBACK_DAYS
}
fn default_user_agent() -> String {
    concat!("drugwatch/", env!("CARGO_PKG_VERSION")).into()
}

/// `[schedule]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSection {
    /// Six-field cron expression (sec min hour dom mon dow), local time.
    #[serde(default = "default_cron")]
    pub cron: String,

    /// Run the daily guard once when the scheduler starts.
    #[serde(default = "default_true")]
    pub run_on_startup: bool,
}

impl Default for ScheduleSection {
    fn default() -> Self {
        Self {
            cron: default_cron(),
            run_on_startup: true,
        }
    }
}

fn default_cron() -> String {
    "0 0 6 * * *".into()
}
fn default_true() -> bool {
    true
}

/// `[sources]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_gif")]
    pub gif: SourceSection,

    #[serde(default = "default_urpl")]
    pub urpl: SourceSection,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            gif: default_gif(),
            urpl: default_urpl(),
        }
    }
}

impl SourcesConfig {
    pub fn get(&self, source: DataSource) -> &SourceSection {
        match source {
            DataSource::Gif => &self.gif,
            DataSource::Urpl => &self.urpl,
        }
    }
}

/// `[sources.<name>]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSection {
    /// Page holding the decisions table.
    pub url: Url,

    /// Whether the daily run visits this source.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_gif() -> SourceSection {
    SourceSection {
        url: Url::parse(GIF_URL).expect("valid built-in URL"),
        enabled: true,
    }
}
fn default_urpl() -> SourceSection {
    SourceSection {
        url: Url::parse(URPL_URL).expect("valid built-in URL"),
        enabled: true,
    }
}

// ---------------------------------------------------------------------------
// Runtime config (merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime scrape configuration.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub timeout: Duration,
    pub lookback_days: i64,
    pub user_agent: String,
}

impl From<&AppConfig> for ScrapeConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.scrape.timeout_secs),
            lookback_days: config.scrape.lookback_days,
            user_agent: config.scrape.user_agent.clone(),
        }
    }
}

/// Runtime schedule configuration.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub cron: String,
    pub run_on_startup: bool,
}

impl From<&AppConfig> for ScheduleConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            cron: config.schedule.cron.clone(),
            run_on_startup: config.schedule.run_on_startup,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.drugwatch/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| DrugwatchError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.drugwatch/drugwatch.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DrugwatchError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        DrugwatchError::config(format!("failed to parse {}: {e}", path.display()))
    })?;

    if config.scrape.lookback_days < 0 {
        return Err(DrugwatchError::config("scrape.lookback_days must not be negative"));
    }
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let path = config_file_path()?;
    init_config_at(&path)?;
    Ok(path)
}

/// Write a default config file at `path`, creating parent directories.
pub fn init_config_at(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| DrugwatchError::io(dir, e))?;
    }

    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| DrugwatchError::config(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| DrugwatchError::io(path, e))?;
    tracing::info!(?path, "created default config file");
    Ok(())
}

fn expand_home(raw: &str) -> Result<PathBuf> {
    match raw.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| DrugwatchError::config("could not determine home directory"))?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(raw)),
    }
}
