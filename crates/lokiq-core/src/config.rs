//! Configuration types for lokiq.
//!
//! [`Config::load`] layers `$XDG_CONFIG_HOME/lokiq/config.toml` (if present)
//! and `LOKIQ__SECTION__KEY` environment variables over hardcoded defaults.
//! The file is only ever read. [`Config::defaults`] returns the defaults
//! without touching the filesystem or environment (useful in tests).

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Embedded defaults
// ---------------------------------------------------------------------------

const DEFAULT_CONFIG: &str = r#"
[datasource]
url        = "http://localhost:3100"
max_lines  = 1000
timeout_ms = 30000

[live]
interval_ms = 1000
window_ms   = 1000
"#;

// ---------------------------------------------------------------------------
// Public config types
// ---------------------------------------------------------------------------

/// Top-level configuration, loaded from `~/.config/lokiq/config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub datasource: DatasourceConfig,
    #[serde(default)]
    pub live: LiveConfig,
}

/// `[datasource]` section of `config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct DatasourceConfig {
    /// Base URL of the log backend, without a trailing path.
    #[serde(default = "default_url")]
    pub url: String,
    /// Row cap applied to every query; overrides any limit in the query.
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_url() -> String { "http://localhost:3100".to_string() }
fn default_max_lines() -> usize { 1000 }
fn default_timeout_ms() -> u64 { 30_000 }

impl Default for DatasourceConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            max_lines: default_max_lines(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl DatasourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// `[live]` section of `config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct LiveConfig {
    /// Poll period.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Width of the trailing window each poll queries.
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
}

fn default_interval_ms() -> u64 { 1000 }
fn default_window_ms() -> u64 { 1000 }

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            window_ms: default_window_ms(),
        }
    }
}

impl LiveConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::defaults()
    }
}

impl Config {
    /// Load the user config file and environment overrides on top of the
    /// built-in defaults. A missing file is not an error.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(config_path())
    }

    /// Like [`Config::load`] but reads the given file instead of the XDG path.
    pub fn load_from(path: PathBuf) -> anyhow::Result<Self> {
        let cfg: Config = config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .add_source(config::File::from(path.as_path()).required(false))
            .add_source(config::Environment::with_prefix("LOKIQ").separator("__"))
            .build()?
            .try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Return the built-in defaults without touching the filesystem.
    pub fn defaults() -> Self {
        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .build()
            .expect("built-in default config must be valid TOML")
            .try_deserialize()
            .expect("built-in default config must deserialize correctly")
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.datasource.max_lines > 0, "datasource.max_lines must be positive");
        anyhow::ensure!(self.live.interval_ms > 0, "live.interval_ms must be positive");
        anyhow::ensure!(self.live.window_ms > 0, "live.window_ms must be positive");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

fn config_path() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".to_string()))
                .join(".config")
        })
        .join("lokiq")
        .join("config.toml")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
