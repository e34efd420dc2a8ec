//! Client configuration.

use std::time::Duration;

use folio_core::{defaults, Error, Result};
use url::Url;

use crate::endpoint::resolve_endpoint;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Resolved live channel URL.
    pub endpoint: Url,
    pub backoff_floor: Duration,
    pub backoff_ceiling: Duration,
}

impl ClientConfig {
    /// Connect to `endpoint` with the default backoff.
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            backoff_floor: Duration::from_millis(defaults::BACKOFF_FLOOR_MS),
            backoff_ceiling: Duration::from_millis(defaults::BACKOFF_CEILING_MS),
        }
    }

    pub fn with_backoff(mut self, floor: Duration, ceiling: Duration) -> Self {
        self.backoff_floor = floor;
        self.backoff_ceiling = ceiling;
        self
    }

    /// Load from `LIVE_ORIGIN`, `LIVE_URL`, `LIVE_BACKOFF_FLOOR_MS` and
    /// `LIVE_BACKOFF_CEILING_MS`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let origin_raw =
            lookup("LIVE_ORIGIN").unwrap_or_else(|| defaults::CLIENT_ORIGIN.to_string());
        let origin = Url::parse(&origin_raw)
            .map_err(|e| Error::Config(format!("LIVE_ORIGIN '{}': {}", origin_raw, e)))?;
        let endpoint = resolve_endpoint(&origin, lookup("LIVE_URL").as_deref())?;

        let floor = parse_millis(&lookup, "LIVE_BACKOFF_FLOOR_MS", defaults::BACKOFF_FLOOR_MS)?;
        let ceiling = parse_millis(
            &lookup,
            "LIVE_BACKOFF_CEILING_MS",
            defaults::BACKOFF_CEILING_MS,
        )?;
        if ceiling < floor {
            return Err(Error::Config(format!(
                "LIVE_BACKOFF_CEILING_MS ({}) is below LIVE_BACKOFF_FLOOR_MS ({})",
                ceiling.as_millis(),
                floor.as_millis()
            )));
        }

        Ok(Self {
            endpoint,
            backoff_floor: floor,
            backoff_ceiling: ceiling,
        })
    }
}

fn parse_millis<F>(lookup: &F, key: &str, default: u64) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let ms = match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| Error::Config(format!("{} must be milliseconds, got '{}'", key, raw)))?,
        None => default,
    };
    if ms == 0 {
        return Err(Error::Config(format!("{} must be greater than zero", key)));
    }
    Ok(Duration::from_millis(ms))
}
