use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_pid_file")]
    pub pid_file: Option<String>,

    /// OPML file used to warm up a newly created database
    pub subscriptions: Option<String>,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub filter: FilterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_upstream_url")]
    pub url: String,

    /// Sent as the Host header instead of the one derived from `url`
    pub virtual_host: Option<String>,

    /// `user:pass`
    pub basic_auth: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_success_interval")]
    pub success_interval_secs: u64,

    #[serde(default = "default_error_interval")]
    pub error_interval_secs: u64,

    #[serde(default = "default_staleness_window")]
    pub staleness_window_secs: u64,

    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    #[serde(default = "default_max_connections_per_route")]
    pub max_connections_per_route: usize,

    #[serde(default = "default_keep_alive_ms")]
    pub keep_alive_ms: u64,

    #[serde(default = "default_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_timeout_secs")]
    pub read_timeout_secs: u64,

    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default = "default_upstream_host")]
    pub upstream_host: String,

    #[serde(default = "default_replacement_host")]
    pub replacement_host: String,

    /// Feed URLs in the subscription list that start with this prefix are
    /// recognised as upstream feeds
    #[serde(default = "default_subscription_prefix")]
    pub subscription_prefix: String,
}

fn default_listen_addr() -> String {
    "127.0.0.1".to_string()
}

fn default_listen_port() -> u16 {
    8000
}

fn default_db_path() -> String {
    "nitter-filter.db".to_string()
}

fn default_pid_file() -> Option<String> {
    Some("nitter-filter.pid".to_string())
}

fn default_upstream_url() -> String {
    "http://localhost".to_string()
}

fn default_success_interval() -> u64 {
    3600
}

fn default_error_interval() -> u64 {
    300
}

fn default_staleness_window() -> u64 {
    86400
}

fn default_tick_interval() -> u64 {
    10
}

fn default_max_connections() -> usize {
    1000
}

fn default_max_connections_per_route() -> usize {
    500
}

fn default_keep_alive_ms() -> u64 {
    5000
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_attempts() -> u32 {
    5
}

fn default_upstream_host() -> String {
    "nitter.juggler.jp".to_string()
}

fn default_replacement_host() -> String {
    "twitter.com".to_string()
}

fn default_subscription_prefix() -> String {
    "https://nitter.juggler.jp/x/".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            listen_port: default_listen_port(),
            db_path: default_db_path(),
            pid_file: default_pid_file(),
            subscriptions: None,
            upstream: UpstreamConfig::default(),
            schedule: ScheduleConfig::default(),
            http: HttpConfig::default(),
            filter: FilterConfig::default(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: default_upstream_url(),
            virtual_host: None,
            basic_auth: None,
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            success_interval_secs: default_success_interval(),
            error_interval_secs: default_error_interval(),
            staleness_window_secs: default_staleness_window(),
            tick_interval_secs: default_tick_interval(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            max_connections_per_route: default_max_connections_per_route(),
            keep_alive_ms: default_keep_alive_ms(),
            connect_timeout_secs: default_timeout_secs(),
            read_timeout_secs: default_timeout_secs(),
            connect_attempts: default_connect_attempts(),
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            upstream_host: default_upstream_host(),
            replacement_host: default_replacement_host(),
            subscription_prefix: default_subscription_prefix(),
        }
    }
}

impl ScheduleConfig {
    pub fn success_interval(&self) -> Duration {
        Duration::from_secs(self.success_interval_secs)
    }

    pub fn error_interval(&self) -> Duration {
        Duration::from_secs(self.error_interval_secs)
    }

    pub fn staleness_window(&self) -> Duration {
        Duration::from_secs(self.staleness_window_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }
}

impl Config {
    /// Load the config from `path`, or from the per-user config location
    /// when no path is given. A default file is written to the per-user
    /// location on first start.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                toml::from_str(&content)?
            }
            None => {
                let config_path = Self::config_path();
                if config_path.exists() {
                    let content = std::fs::read_to_string(&config_path)?;
                    toml::from_str(&content)?
                } else {
                    let config = Config::default();
                    config.save(&config_path)?;
                    config
                }
            }
        };

        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("nitter-filter")
            .join("config.toml")
    }

    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.upstream.url)
            .map_err(|e| AppError::Config(format!("invalid upstream url {:?}: {}", self.upstream.url, e)))?;

        let schedule = &self.schedule;
        if schedule.success_interval_secs == 0
            || schedule.error_interval_secs == 0
            || schedule.staleness_window_secs == 0
            || schedule.tick_interval_secs == 0
        {
            return Err(AppError::Config("schedule intervals must be non-zero".to_string()));
        }
        if schedule.error_interval_secs >= schedule.success_interval_secs {
            return Err(AppError::Config(
                "error_interval_secs must be shorter than success_interval_secs".to_string(),
            ));
        }

        if self.http.max_connections == 0 {
            return Err(AppError::Config("max_connections must be at least 1".to_string()));
        }
        if self.http.connect_attempts == 0 {
            return Err(AppError::Config("connect_attempts must be at least 1".to_string()));
        }

        Ok(())
    }
}
