//! Configuration management.
//!
//! Values come from an optional TOML file, then environment variables.

use anyhow::{Context, Result};
use cputemp_core::{AssetSpec, CacheSettings, ExhaustionPolicy};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Where the file-level settings came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOrigin {
    /// Read from the configuration file.
    File,
    /// The file was missing; built-in defaults were used.
    Defaults,
}

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Protocol used in the advertised URL
    #[serde(default = "default_protocol")]
    pub protocol: String,

    /// Host name used in the advertised URL
    #[serde(default = "default_host")]
    pub host: String,

    /// Address the server binds to
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Port the server binds to
    #[serde(default = "default_port")]
    pub port: u16,

    /// Base path of every endpoint
    #[serde(default = "default_url_base")]
    pub url_base: String,

    /// Consecutive sensor failures tolerated before escalating
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Freshness window and background poll period in milliseconds
    #[serde(default = "default_scrape_interval")]
    pub scrape_interval: u64,

    /// Sensor read timeout in milliseconds
    #[serde(default = "default_read_timeout")]
    pub read_timeout: u64,

    /// Leave the port out of the advertised URL (behind a reverse proxy)
    #[serde(default)]
    pub hide_ports: bool,

    /// Default log level, overridden by RUST_LOG
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Thermal zone file holding millidegrees
    #[serde(default = "default_sensor_path")]
    pub sensor_path: String,

    /// Exit the process once the retry budget is used up
    #[serde(default)]
    pub exit_on_max_retries: bool,

    /// Grace period for in-flight requests on shutdown in milliseconds
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace: u64,

    /// Directory static assets are loaded from
    #[serde(default = "default_asset_dir")]
    pub asset_dir: String,

    /// Static assets served under the base path
    #[serde(default = "default_assets")]
    pub assets: Vec<AssetSpec>,
}

// Default value functions
fn default_protocol() -> String {
    "http".to_string()
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_listen() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    64567
}

fn default_url_base() -> String {
    "/temp".to_string()
}

fn default_max_retries() -> u32 {
    9
}

fn default_scrape_interval() -> u64 {
    15000
}

fn default_read_timeout() -> u64 {
    1000
}

fn default_log_level() -> String {
    "debug".to_string()
}

fn default_sensor_path() -> String {
    "/sys/class/thermal/thermal_zone0/temp".to_string()
}

fn default_shutdown_grace() -> u64 {
    10000
}

fn default_asset_dir() -> String {
    ".".to_string()
}

fn default_assets() -> Vec<AssetSpec> {
    vec![
        AssetSpec::new("/chart.js", "dist/chart.js"),
        AssetSpec::new("/test", "test.html"),
        AssetSpec::new("/favicon.ico", "favicon.ico"),
        AssetSpec::new("/style.css", "style.css"),
    ]
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read configuration file")?;
        let mut config: Config =
            toml::from_str(&content).context("Failed to parse configuration")?;
        config.replace_zero_values();
        Ok(config)
    }

    /// Loads the file if it exists, then applies process environment overrides.
    pub fn resolve<P: AsRef<Path>>(path: P) -> Result<(Self, ConfigOrigin)> {
        Self::resolve_with(path, |key| std::env::var(key).ok())
    }

    /// Like [`Config::resolve`], reading overrides through `var`.
    pub fn resolve_with<P, F>(path: P, var: F) -> Result<(Self, ConfigOrigin)>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> Option<String>,
    {
        let (mut config, origin) = if path.as_ref().exists() {
            (Self::load(path)?, ConfigOrigin::File)
        } else {
            (Self::default(), ConfigOrigin::Defaults)
        };
        config.apply_env(var);
        Ok((config, origin))
    }

    /// A zero retry budget, poll interval or read timeout means "unset".
    fn replace_zero_values(&mut self) {
        if self.max_retries == 0 {
            self.max_retries = default_max_retries();
        }
        if self.scrape_interval == 0 {
            self.scrape_interval = default_scrape_interval();
        }
        if self.read_timeout == 0 {
            self.read_timeout = default_read_timeout();
        }
    }

    /// Overrides fields from environment-style variables.
    ///
    /// Numbers that fail to parse keep their current value, and so does zero
    /// for the retry budget, poll interval and read timeout.
    pub fn apply_env<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = var("protocol") {
            self.protocol = v;
        }
        if let Some(v) = var("hostname") {
            self.host = v;
        }
        if let Some(v) = var("port").and_then(|v| v.parse().ok()) {
            self.port = v;
        }
        if let Some(v) = var("base_url") {
            self.url_base = v;
        }
        if let Some(v) = parse_positive(var("max_retries")) {
            self.max_retries = v;
        }
        if let Some(v) = parse_positive(var("scrape_interval")) {
            self.scrape_interval = v;
        }
        if let Some(v) = parse_positive(var("read_timeout")) {
            self.read_timeout = v;
        }
        if let Some(v) = var("hide_ports") {
            self.hide_ports = !v.is_empty();
        }
        if let Some(v) = var("log_level") {
            self.log_level = v;
        }
        if let Some(v) = var("sensor_path") {
            self.sensor_path = v;
        }
        if let Some(v) = var("exit_on_max_retries") {
            self.exit_on_max_retries = matches!(v.as_str(), "1" | "true" | "yes");
        }
        if let Some(v) = var("asset_dir") {
            self.asset_dir = v;
        }
    }

    /// Returns the socket address to bind.
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.listen, self.port)
            .parse()
            .context("Invalid listen address")
    }

    /// Returns the URL clients reach the temperature endpoint at.
    pub fn public_url(&self) -> String {
        if self.hide_ports {
            format!("{}://{}{}", self.protocol, self.host, self.url_base)
        } else {
            format!(
                "{}://{}:{}{}",
                self.protocol, self.host, self.port, self.url_base
            )
        }
    }

    /// Returns the cache settings derived from this configuration.
    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            freshness_window: Duration::from_millis(self.scrape_interval),
            max_failures: self.max_retries,
            read_timeout: Duration::from_millis(self.read_timeout),
            exhaustion: if self.exit_on_max_retries {
                ExhaustionPolicy::Terminate
            } else {
                ExhaustionPolicy::Degrade
            },
        }
    }
}

fn parse_positive<T>(value: Option<String>) -> Option<T>
where
    T: FromStr + PartialOrd + Default,
{
    value
        .and_then(|v| v.parse().ok())
        .filter(|n| *n > T::default())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            protocol: default_protocol(),
            host: default_host(),
            listen: default_listen(),
            port: default_port(),
            url_base: default_url_base(),
            max_retries: default_max_retries(),
            scrape_interval: default_scrape_interval(),
            read_timeout: default_read_timeout(),
            hide_ports: false,
            log_level: default_log_level(),
            sensor_path: default_sensor_path(),
            exit_on_max_retries: false,
            shutdown_grace: default_shutdown_grace(),
            asset_dir: default_asset_dir(),
            assets: default_assets(),
        }
    }
}
