//! ABOUTME: Configuration management with validation and environment loading
//! ABOUTME: Layers defaults, config file, environment and command-line values

use config::{Config as ConfigBuilder, File};
use nr_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use validator::{Validate, ValidationError};

/// Config file looked up in the working directory when none is given
const DEFAULT_CONFIG_FILE: &str = "nginx_rtmp_exporter";

/// Environment variables and the settings they override
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("NGINX_RTMP_WEB_LISTEN_ADDRESS", "web.listen_address"),
    ("NGINX_RTMP_WEB_TELEMETRY_PATH", "web.telemetry_path"),
    ("NGINX_RTMP_SCRAPE_URI", "scrape.uri"),
    ("NGINX_RTMP_SCRAPE_TIMEOUT", "scrape.timeout"),
    (
        "NGINX_RTMP_SCRAPE_STREAM_NAME_PATTERN",
        "scrape.stream_name_pattern",
    ),
    ("NGINX_RTMP_LOG_LEVEL", "log.level"),
    ("NGINX_RTMP_LOG_FORMAT", "log.format"),
];

/// Main configuration struct
#[derive(Debug, Clone, Deserialize, Serialize, Validate, Default)]
#[serde(default)]
pub struct Config {
    #[validate(nested)]
    pub web: WebConfig,
    #[validate(nested)]
    pub scrape: ScrapeConfig,
    #[validate(nested)]
    pub log: LogConfig,
}

/// Inbound metrics endpoint
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct WebConfig {
    /// Address to listen on for the web interface and telemetry
    #[validate(length(min = 1))]
    pub listen_address: String,
    /// Path under which metrics are exposed
    #[validate(custom(function = "validate_path"))]
    pub telemetry_path: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:9718".to_string(),
            telemetry_path: "/metrics".to_string(),
        }
    }
}

/// Outbound scrape of the NGINX-RTMP status page
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct ScrapeConfig {
    #[validate(url)]
    pub uri: String,
    /// Human-readable duration such as `5s` or `750ms`
    #[validate(custom(function = "validate_timeout"))]
    pub timeout: String,
    /// Regular expression selecting the stable part of stream names
    #[validate(custom(function = "validate_pattern"))]
    pub stream_name_pattern: String,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            uri: "http://localhost:8080/stats".to_string(),
            timeout: "5s".to_string(),
            stream_name_pattern: ".*".to_string(),
        }
    }
}

/// Log output
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct LogConfig {
    #[validate(length(min = 1))]
    pub level: String,
    #[validate(custom(function = "validate_format"))]
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Values supplied on the command line; `None` keeps the lower layer.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config_file: Option<PathBuf>,
    pub listen_address: Option<String>,
    pub telemetry_path: Option<String>,
    pub scrape_uri: Option<String>,
    pub scrape_timeout: Option<String>,
    pub stream_name_pattern: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<String>,
}

impl Overrides {
    fn pairs(&self) -> [(&'static str, Option<&String>); 7] {
        [
            ("web.listen_address", self.listen_address.as_ref()),
            ("web.telemetry_path", self.telemetry_path.as_ref()),
            ("scrape.uri", self.scrape_uri.as_ref()),
            ("scrape.timeout", self.scrape_timeout.as_ref()),
            ("scrape.stream_name_pattern", self.stream_name_pattern.as_ref()),
            ("log.level", self.log_level.as_ref()),
            ("log.format", self.log_format.as_ref()),
        ]
    }
}

fn validate_path(path: &str) -> std::result::Result<(), ValidationError> {
    if path.starts_with('/') {
        Ok(())
    } else {
        Err(ValidationError::new("path_must_start_with_slash"))
    }
}

fn validate_timeout(timeout: &str) -> std::result::Result<(), ValidationError> {
    match humantime::parse_duration(timeout) {
        Ok(d) if d >= Duration::from_millis(1) => Ok(()),
        _ => Err(ValidationError::new("invalid_timeout")),
    }
}

fn validate_pattern(pattern: &str) -> std::result::Result<(), ValidationError> {
    regex::Regex::new(pattern)
        .map(|_| ())
        .map_err(|_| ValidationError::new("invalid_regex"))
}

fn validate_format(format: &str) -> std::result::Result<(), ValidationError> {
    match format {
        "pretty" | "json" => Ok(()),
        _ => Err(ValidationError::new("unknown_log_format")),
    }
}

impl Config {
    /// Load configuration from the default file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_with(&Overrides::default())
    }

    /// Load configuration, letting `overrides` win over every other layer
    pub fn load_with(overrides: &Overrides) -> Result<Self> {
        let defaults = Config::default();
        let mut builder = ConfigBuilder::builder()
            .set_default("web.listen_address", defaults.web.listen_address)?
            .set_default("web.telemetry_path", defaults.web.telemetry_path)?
            .set_default("scrape.uri", defaults.scrape.uri)?
            .set_default("scrape.timeout", defaults.scrape.timeout)?
            .set_default("scrape.stream_name_pattern", defaults.scrape.stream_name_pattern)?
            .set_default("log.level", defaults.log.level)?
            .set_default("log.format", defaults.log.format)?;

        // An explicit file must exist; the default one is optional
        builder = match &overrides.config_file {
            Some(path) => builder.add_source(File::from(path.as_path()).required(true)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        for (var, key) in ENV_OVERRIDES {
            if let Ok(value) = std::env::var(var) {
                builder = builder.set_override(*key, value)?;
            }
        }

        for (key, value) in overrides.pairs() {
            if let Some(value) = value {
                builder = builder.set_override(key, value.as_str())?;
            }
        }

        let config = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to build config: {}", e)))?;

        let parsed: Config = config
            .try_deserialize()
            .map_err(|e| Error::Config(format!("Failed to deserialize config: {}", e)))?;

        parsed
            .validate()
            .map_err(|e| Error::Config(format!("Config validation failed: {}", e)))?;

        Ok(parsed)
    }

    /// Scrape timeout as a [`Duration`]
    pub fn scrape_timeout(&self) -> Result<Duration> {
        humantime::parse_duration(&self.scrape.timeout).map_err(|e| {
            Error::Config(format!("Invalid scrape timeout '{}': {}", self.scrape.timeout, e))
        })
    }
}
