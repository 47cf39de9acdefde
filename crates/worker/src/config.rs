//! Environment-driven worker configuration.
//!
//! Read once at startup (after `dotenvy::dotenv()`); everything has a
//! local-engine default except the relay URL, which is optional by
//! design.

use std::time::Duration;

/// Worker settings.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Engine HTTP base URL (`HELIOS_API_URL`).
    pub api_url: String,
    /// Engine WebSocket base URL (`HELIOS_WS_URL`).
    pub ws_url: String,
    /// Upstream relay URL (`HELIOS_RELAY_URL`); no relay when unset.
    pub relay_url: Option<String>,
    /// Caller identity forwarded on the relay wire (`HELIOS_CLIENT_ID`).
    pub client_id: String,
    /// Per-job deadline (`HELIOS_JOB_TIMEOUT_SECS`).
    pub job_timeout: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid {name}: {value:?} is not a positive integer")]
    InvalidTimeout { name: &'static str, value: String },
}

const DEFAULT_API_URL: &str = "http://127.0.0.1:8188";
const DEFAULT_WS_URL: &str = "ws://127.0.0.1:8188";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

impl WorkerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let timeout_secs = match lookup("HELIOS_JOB_TIMEOUT_SECS") {
            Some(raw) => raw.parse::<u64>().map_err(|_| ConfigError::InvalidTimeout {
                name: "HELIOS_JOB_TIMEOUT_SECS",
                value: raw,
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            api_url: lookup("HELIOS_API_URL").unwrap_or_else(|| DEFAULT_API_URL.into()),
            ws_url: lookup("HELIOS_WS_URL").unwrap_or_else(|| DEFAULT_WS_URL.into()),
            relay_url: lookup("HELIOS_RELAY_URL"),
            client_id: lookup("HELIOS_CLIENT_ID").unwrap_or_else(|| "local".into()),
            job_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_env() {
        let config = WorkerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.ws_url, DEFAULT_WS_URL);
        assert_eq!(config.job_timeout, Duration::from_secs(60));
        assert!(config.relay_url.is_none());
        assert_eq!(config.client_id, "local");
    }

    #[test]
    fn reads_explicit_values() {
        let config = WorkerConfig::from_lookup(|name| match name {
            "HELIOS_API_URL" => Some("http://gpu-1:8188".into()),
            "HELIOS_WS_URL" => Some("ws://gpu-1:8188".into()),
            "HELIOS_RELAY_URL" => Some("ws://hub:9000/ws".into()),
            "HELIOS_JOB_TIMEOUT_SECS" => Some("300".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.api_url, "http://gpu-1:8188");
        assert_eq!(config.relay_url.as_deref(), Some("ws://hub:9000/ws"));
        assert_eq!(config.job_timeout, Duration::from_secs(300));
    }

    #[test]
    fn rejects_bad_timeout() {
        let err = WorkerConfig::from_lookup(|name| {
            (name == "HELIOS_JOB_TIMEOUT_SECS").then(|| "soon".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTimeout { .. }));
    }
}
