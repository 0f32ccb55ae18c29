use std::{env, fmt, fs, io, path, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to read config file {path}: {source}")]
    ReadFailed { path: path::PathBuf, source: io::Error },
    #[error("Failed to write config file {path}: {source}")]
    WriteFailed { path: path::PathBuf, source: io::Error },
    #[error("Failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("No config directory available ($XDG_CONFIG_HOME and $HOME are unset)")]
    ConfigPathUnavailable,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Buffered live events per subscriber before a slow one starts skipping.
    pub event_capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

/// Tunables of the polling scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Interval used when a client adds a target without one
    pub default_interval_seconds: u64,
    /// Shorter intervals are raised to this floor
    pub min_interval_seconds: u64,
    /// Longer intervals are rejected
    pub max_interval_seconds: u64,
    pub probe_timeout_seconds: u64,
    /// A probe dispatched this soon after the previous one for the same URL is suppressed
    pub throttle_window_ms: u64,
    /// A freshly spawned loop skips its immediate probe if one was dispatched this recently
    pub recent_check_window_ms: u64,
    /// Granularity at which sleeping loops notice stop signals
    pub sleep_slice_ms: u64,
    pub error_backoff_seconds: u64,
    /// Results waiting to be written before new ones are dropped
    pub persist_queue_capacity: usize,
    /// Start every loop at boot
    pub autostart: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "0.0.0.0".into(), port: 5000, event_capacity: 256 }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "data/monitoring.db".into() }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            default_interval_seconds: 30,
            min_interval_seconds: 5,
            max_interval_seconds: 86_400,
            probe_timeout_seconds: 10,
            throttle_window_ms: 3_000,
            recent_check_window_ms: 5_000,
            sleep_slice_ms: 500,
            error_backoff_seconds: 5,
            persist_queue_capacity: 1_024,
            autostart: true,
        }
    }
}

impl MonitoringConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_seconds)
    }

    pub fn throttle_window(&self) -> Duration {
        Duration::from_millis(self.throttle_window_ms)
    }

    pub fn recent_check_window(&self) -> Duration {
        Duration::from_millis(self.recent_check_window_ms)
    }

    pub fn sleep_slice(&self) -> Duration {
        Duration::from_millis(self.sleep_slice_ms.max(1))
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_seconds)
    }

    /// How long a stopping loop may take before it is aborted. A loop can be
    /// at most one probe plus one sleep slice away from noticing its stop signal.
    pub fn stop_grace(&self) -> Duration {
        self.probe_timeout() + self.sleep_slice()
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/uptime/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("uptime/config.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);
        let monitoring = &self.monitoring;

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Server")?;
        write_1(f, "Bind Address", &self.server.bind)?;
        write_1(f, "Port", &self.server.port)?;
        write_1(f, "Event Capacity", &self.server.event_capacity)?;
        write_title_1(f, "Database")?;
        write_1(f, "Path", &self.database.path)?;
        write_title_1(f, "Monitoring")?;
        write_1(f, "Default Interval (s)", &monitoring.default_interval_seconds)?;
        write_1(f, "Min Interval (s)", &monitoring.min_interval_seconds)?;
        write_1(f, "Max Interval (s)", &monitoring.max_interval_seconds)?;
        write_1(f, "Probe Timeout (s)", &monitoring.probe_timeout_seconds)?;
        write_1(f, "Throttle Window (ms)", &monitoring.throttle_window_ms)?;
        write_1(f, "Recent Check Window (ms)", &monitoring.recent_check_window_ms)?;
        write_1(f, "Sleep Slice (ms)", &monitoring.sleep_slice_ms)?;
        write_1(f, "Error Backoff (s)", &monitoring.error_backoff_seconds)?;
        write_1(f, "Persist Queue", &monitoring.persist_queue_capacity)?;
        write_1(f, "Autostart", &monitoring.autostart)?;

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/uptime/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    ///
    /// ```no_run
    /// use uptime_service::config::Config;
    ///
    /// let cfg = Config::from_config(None::<&std::path::Path>).unwrap();
    /// println!("{}", cfg);
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| Error::ReadFailed { path: config_path.clone(), source })?;
            Ok(toml::from_str(raw_string.as_str())?)
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self)?;
        let write_failed = |source| Error::WriteFailed { path: path.to_path_buf(), source };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_failed)?;
        }

        fs::write(path, config_str).map_err(write_failed)
    }
}
