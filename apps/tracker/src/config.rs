//! Tracker configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `$XDG_CONFIG_HOME/killtrack/tracker.toml` (or `~/.config`)
//! - Windows: `%APPDATA%/killtrack/tracker.toml`

use std::path::{Path, PathBuf};
use std::time::Duration;

use killtrack_reporter::ApiConfig;
use killtrack_sound::Volume;
use serde::{Deserialize, Serialize};

const CONFIG_FILE: &str = "tracker.toml";

/// Tracker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the report service.
    pub api_url: String,

    /// Report key. Empty means kills are only kept locally.
    pub api_key: String,

    /// Explicit `Game.log` path. Found next to the game executable otherwise.
    pub log_path: Option<PathBuf>,

    /// Game process name, without extension.
    pub process_name: String,
    pub monitor_interval_secs: u64,

    /// How long the tailer sleeps at end of file.
    pub poll_interval_ms: u64,

    /// Copied into every kill report.
    pub anonymize: bool,

    /// Send heartbeats and status events to the commander roster.
    pub commander_heartbeat: bool,
    pub heartbeat_interval_secs: u64,

    pub request_timeout_secs: u64,
    pub kill_timeout_secs: u64,
    pub retry_interval_secs: u64,

    pub outbound_queue_capacity: usize,
    pub buffer_capacity: usize,

    /// Kills not yet delivered, as JSON.
    pub buffer_path: PathBuf,

    pub sounds_dir: PathBuf,
    /// Sounds shipped with the tracker, copied into `sounds_dir` on start.
    pub bundled_sounds_dir: Option<PathBuf>,

    /// Exit after this many hours. `0` keeps running.
    pub auto_shutdown_hours: Option<u64>,

    pub volume: Volume,
}

impl Default for Config {
    fn default() -> Self {
        let dir = data_dir();
        Self {
            api_url: "http://drawmyoshi.com:25966".into(),
            api_key: String::new(),
            log_path: None,
            process_name: "StarCitizen".into(),
            monitor_interval_secs: 5,
            poll_interval_ms: 1000,
            anonymize: false,
            commander_heartbeat: false,
            heartbeat_interval_secs: 5,
            request_timeout_secs: 5,
            kill_timeout_secs: 30,
            retry_interval_secs: 60,
            outbound_queue_capacity: 64,
            buffer_capacity: 500,
            buffer_path: dir.join("unsent_kills.json"),
            sounds_dir: dir.join("sounds"),
            bundled_sounds_dir: None,
            auto_shutdown_hours: Some(72),
            volume: Volume::default(),
        }
    }
}

impl Config {
    /// Loads configuration from disk, or creates a default if not found.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            tracing::info!(path = %path.display(), "default configuration written");
            Ok(config)
        }
    }

    /// Saves the configuration to `path`.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // The report key lives here.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    pub fn api(&self) -> ApiConfig {
        ApiConfig {
            base_url: self.api_url.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            kill_timeout: Duration::from_secs(self.kill_timeout_secs),
        }
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval_secs.max(1))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(10))
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs.max(1))
    }

    pub fn auto_shutdown(&self) -> Option<Duration> {
        self.auto_shutdown_hours
            .filter(|h| *h > 0)
            .map(|h| Duration::from_secs(h * 60 * 60))
    }
}

/// Returns the platform-specific configuration file path.
pub fn config_path() -> PathBuf {
    data_dir().join(CONFIG_FILE)
}

fn data_dir() -> PathBuf {
    config_base_dir().join("killtrack")
}

fn config_base_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
            return PathBuf::from(xdg);
        }
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home).join(".config")
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata)
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        PathBuf::from("/tmp")
    }
}
