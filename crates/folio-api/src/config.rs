//! Server configuration.
//!
//! Values come from the process environment (after `.env` is loaded by the
//! binary). Tests build configs from an in-memory map through
//! [`ServerConfig::from_lookup`].
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `HOST` | `0.0.0.0` | bind host |
//! | `PORT` | `5000` | bind port |
//! | `NODE_ENV` | `development` | environment name reported by health endpoints |
//! | `WS_ENABLED` | `false` | accept live channel upgrades |
//! | `WS_PING_INTERVAL_SECS` | `30` | keepalive ping period per channel |
//! | `CORS_ORIGINS` | empty | comma-separated allowed origins |
//! | `CORS_ALLOW_VERCEL_REGEX` | unset | origins matching this regex are also allowed |
//! | `CORS_DEBUG` | `false` | log every CORS decision |
//! | `LOG_FORMAT` | `text` | `text` or `json` |
//! | `LOG_FILE` | unset | daily-rotated log file instead of stdout |
//! | `LOG_ANSI` | auto | force ANSI colors on or off |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use folio_core::{defaults, Error, Result};
use regex::Regex;

/// Full server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Environment name (`development`, `production`, ...).
    pub environment: String,
    /// Whether `/` accepts live channel upgrades.
    pub ws_enabled: bool,
    /// Keepalive ping period on each open channel.
    pub ping_interval: Duration,
    pub cors: CorsConfig,
    pub log: LogConfig,
}

/// Cross-origin policy for browser clients.
#[derive(Debug, Clone, Default)]
pub struct CorsConfig {
    /// Exact origins allowed (e.g. `https://admin.example.com`).
    pub origins: Vec<String>,
    /// Additional pattern for preview deployments.
    pub allow_regex: Option<Regex>,
    /// Log each allow/block decision.
    pub debug: bool,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Tracing subscriber settings.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    pub file: Option<PathBuf>,
    /// `None` leaves ANSI detection to the subscriber.
    pub ansi: Option<bool>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            file: None,
            ansi: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: defaults::SERVER_HOST.to_string(),
            port: defaults::SERVER_PORT,
            environment: defaults::ENVIRONMENT.to_string(),
            ws_enabled: false,
            ping_interval: Duration::from_secs(defaults::PING_INTERVAL_SECS),
            cors: CorsConfig::default(),
            log: LogConfig::default(),
        }
    }
}

fn is_truthy(value: &str) -> bool {
    value == "true" || value == "1"
}

impl ServerConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = ServerConfig::default();

        if let Some(host) = lookup("HOST").filter(|h| !h.trim().is_empty()) {
            config.host = host;
        }
        if let Some(port) = lookup("PORT") {
            config.port = port
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("PORT '{}': {}", port, e)))?;
        }
        if let Some(env) = lookup("NODE_ENV").filter(|e| !e.trim().is_empty()) {
            config.environment = env;
        }

        config.ws_enabled = lookup("WS_ENABLED").is_some_and(|v| is_truthy(&v));
        if let Some(secs) = lookup("WS_PING_INTERVAL_SECS") {
            let secs: u64 = secs
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("WS_PING_INTERVAL_SECS '{}': {}", secs, e)))?;
            if secs == 0 {
                return Err(Error::Config(
                    "WS_PING_INTERVAL_SECS must be greater than zero".to_string(),
                ));
            }
            config.ping_interval = Duration::from_secs(secs);
        }

        config.cors = CorsConfig {
            origins: parse_origins(lookup("CORS_ORIGINS").as_deref().unwrap_or("")),
            allow_regex: match lookup("CORS_ALLOW_VERCEL_REGEX").filter(|r| !r.is_empty()) {
                Some(pattern) => Some(Regex::new(&pattern).map_err(|e| {
                    Error::Config(format!("CORS_ALLOW_VERCEL_REGEX '{}': {}", pattern, e))
                })?),
                None => None,
            },
            debug: lookup("CORS_DEBUG").is_some_and(|v| is_truthy(&v)),
        };

        config.log = LogConfig {
            format: match lookup("LOG_FORMAT").as_deref() {
                Some("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
            file: lookup("LOG_FILE")
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            ansi: lookup("LOG_ANSI").map(|v| is_truthy(&v)),
        };

        Ok(config)
    }

    /// Socket address to bind.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| Error::Config(format!("bind address {}:{}: {}", self.host, self.port, e)))
    }
}

/// Split a comma-separated origin list, dropping blanks.
fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

impl CorsConfig {
    /// Whether a browser origin may call the API.
    pub fn allows(&self, origin: &str) -> bool {
        if self.origins.iter().any(|o| o == origin) {
            if self.debug {
                tracing::debug!(origin, "CORS allowed origin");
            }
            return true;
        }
        if let Some(re) = &self.allow_regex {
            if re.is_match(origin) {
                if self.debug {
                    tracing::debug!(origin, pattern = re.as_str(), "CORS regex match");
                }
                return true;
            }
        }
        if self.debug {
            tracing::debug!(origin, "CORS blocked origin");
        }
        false
    }
}
