//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `MESHCAST_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `MESHCAST_` override YAML values
//! 3. **FAL_KEY** - Special case: overrides `fal.api_key` if set, so the standard fal.ai
//!    credential variable works out of the box
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `MESHCAST_FAL__MODEL=fal-ai/triposr` sets the `fal.model` field.
//!
//! ## Usage
//!
//! ```no_run
//! use clap::Parser;
//! use meshcast::config::{Args, Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let args = Args::parse();
//! let config = Config::load(&args)?;
//!
//! println!("Server will bind to {}:{}", config.host, config.port);
//! # Ok(())
//! # }
//! ```
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! # Override server port
//! MESHCAST_PORT=8080
//!
//! # Set the fal.ai credential (preferred method)
//! FAL_KEY="key-id:key-secret"
//!
//! # Or use the prefixed form
//! MESHCAST_FAL__API_KEY="key-id:key-secret"
//!
//! # Override nested values
//! MESHCAST_FAL__POLL_TIMEOUT=10m
//! MESHCAST_LIMITS__MAX_REQUEST_SIZE=67108864
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::errors::Error;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "MESHCAST_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines to catch config errors before deployment.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// This is the root configuration structure loaded from YAML and environment variables.
/// All fields have sensible defaults defined in the `Default` implementation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// External reconstruction service (fal.ai) configuration
    pub fal: FalConfig,
    /// CORS settings for the browser client
    pub cors: CorsConfig,
    /// Resource limits for protecting system capacity
    pub limits: LimitsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            fal: FalConfig::default(),
            cors: CorsConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

/// Configuration for the external fal.ai reconstruction service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FalConfig {
    /// API credential for fal.ai. When absent the server still starts, but every
    /// conversion request is rejected with a configuration error before any
    /// outbound call is made.
    pub api_key: Option<String>,
    /// Base URL of the fal.ai queue API
    pub queue_url: Url,
    /// Model identifier submitted to the queue (e.g., "fal-ai/triposr")
    pub model: String,
    /// Timeout applied to each individual HTTP call to fal.ai
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Delay between queue status polls
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    /// Overall deadline for a queued conversion to complete
    #[serde(with = "humantime_serde")]
    pub poll_timeout: Duration,
}

impl Default for FalConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            queue_url: Url::parse("https://queue.fal.run").expect("static URL is valid"),
            model: "fal-ai/triposr".to_string(),
            request_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(1),
            poll_timeout: Duration::from_secs(300),
        }
    }
}

/// CORS configuration for browser clients.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins. Use "*" for a wildcard or specific URLs
    pub allowed_origins: Vec<CorsOrigin>,
    /// Allow credentials (cookies) in CORS requests
    pub allow_credentials: bool,
    /// Cache preflight requests for this many seconds
    pub max_age: Option<u64>,
    /// Custom headers to expose to the browser (in addition to CORS-safelisted headers)
    pub exposed_headers: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                CorsOrigin::Url(Url::parse("http://localhost:3001").expect("static URL is valid")), // Development frontend (Vite)
            ],
            allow_credentials: false,
            max_age: Some(3600), // Cache preflight for 1 hour
            // The browser client reads the filename off the download response
            exposed_headers: vec!["content-disposition".to_string()],
        }
    }
}

/// CORS origin specification.
///
/// Can be either a wildcard (`*`) to allow all origins, or a specific URL.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CorsOrigin {
    /// Allow all origins (`*`)
    #[serde(deserialize_with = "parse_wildcard")]
    Wildcard,
    /// Specific origin URL (e.g., `https://app.example.com`)
    #[serde(deserialize_with = "parse_url")]
    Url(Url),
}

fn parse_wildcard<'de, D>(deserializer: D) -> Result<(), D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    if s == "*" {
        Ok(())
    } else {
        Err(serde::de::Error::custom("Expected '*'"))
    }
}

fn parse_url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Url::parse(&s).map_err(serde::de::Error::custom)
}

/// Resource limits for incoming requests.
///
/// Images arrive inline as data URLs in the JSON body, so the body limit
/// effectively caps the size of uploadable images.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Maximum size of a conversion request body in bytes
    pub max_request_size: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_request_size: 32 * 1024 * 1024, // 32 MiB; base64 inflates images by ~4/3
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            .merge(Env::prefixed("MESHCAST_").split("__"))
            // The standard fal.ai credential variable
            .merge(Env::raw().only(&["FAL_KEY"]).map(|_| "fal.api_key".into()))
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if self.fal.model.is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: fal.model cannot be empty. Set a queue model identifier such as 'fal-ai/triposr'."
                    .to_string(),
            });
        }

        if !matches!(self.fal.queue_url.scheme(), "http" | "https") {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: fal.queue_url must be an http(s) URL, got '{}'",
                    self.fal.queue_url
                ),
            });
        }

        if self.fal.poll_interval.is_zero() {
            return Err(Error::Internal {
                operation: "Config validation: fal.poll_interval must be positive (default: 1s)".to_string(),
            });
        }

        if self.fal.poll_timeout < self.fal.poll_interval {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: fal.poll_timeout ({}) cannot be shorter than fal.poll_interval ({})",
                    humantime::format_duration(self.fal.poll_timeout),
                    humantime::format_duration(self.fal.poll_interval)
                ),
            });
        }

        // Validate CORS configuration
        if self.cors.allowed_origins.is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: CORS allowed_origins cannot be empty. Add at least one allowed origin.".to_string(),
            });
        }

        // Validate that wildcard is not used with credentials
        let has_wildcard = self.cors.allowed_origins.iter().any(|origin| matches!(origin, CorsOrigin::Wildcard));
        if has_wildcard && self.cors.allow_credentials {
            return Err(Error::Internal {
                operation: "Config validation: CORS cannot use wildcard origin '*' with allow_credentials=true. Specify explicit origins."
                    .to_string(),
            });
        }

        if self.limits.max_request_size == 0 {
            return Err(Error::Internal {
                operation: "Config validation: limits.max_request_size cannot be 0.".to_string(),
            });
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
