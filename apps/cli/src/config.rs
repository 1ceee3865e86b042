use std::time::Duration;

use anyhow::{bail, Context, Result};
use brokerdata_market_data::ProvidersConfig;

pub struct Config {
    pub providers: ProvidersConfig,
    pub probe_timeout: Duration,
    pub request_timeout: Duration,
}

impl Config {
    /// Load `.env`, then read providers from `BD_CONFIG_FILE` or `BD_*` variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let providers = match std::env::var("BD_CONFIG_FILE") {
            Ok(path) if !path.trim().is_empty() => ProvidersConfig::from_json_file(&path)
                .with_context(|| format!("loading provider config from {}", path))?,
            _ => ProvidersConfig::from_env().context("reading BD_* provider settings")?,
        };

        Ok(Self {
            providers,
            probe_timeout: millis_var("BD_PROBE_TIMEOUT_MS", 5_000)?,
            request_timeout: millis_var("BD_REQUEST_TIMEOUT_MS", 30_000)?,
        })
    }
}

fn millis_var(key: &str, default: u64) -> Result<Duration> {
    parse_millis(key, std::env::var(key).ok().as_deref(), default)
}

/// Unset or blank falls back to `default`; anything else must be a positive integer.
fn parse_millis(key: &str, raw: Option<&str>, default: u64) -> Result<Duration> {
    let raw = match raw.map(str::trim).filter(|v| !v.is_empty()) {
        Some(raw) => raw,
        None => return Ok(Duration::from_millis(default)),
    };
    match raw.parse::<u64>() {
        Ok(millis) if millis > 0 => Ok(Duration::from_millis(millis)),
        _ => bail!("{} must be a positive number of milliseconds, got '{}'", key, raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_timeout_uses_default() {
        let timeout = parse_millis("BD_PROBE_TIMEOUT_MS", None, 5_000).unwrap();
        assert_eq!(timeout, Duration::from_secs(5));
        let timeout = parse_millis("BD_PROBE_TIMEOUT_MS", Some("  "), 5_000).unwrap();
        assert_eq!(timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_timeout_override() {
        let timeout = parse_millis("BD_REQUEST_TIMEOUT_MS", Some(" 1500 "), 30_000).unwrap();
        assert_eq!(timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_malformed_timeout_is_rejected() {
        for raw in ["5s", "-1", "0", "1.5"] {
            let err = parse_millis("BD_REQUEST_TIMEOUT_MS", Some(raw), 30_000).unwrap_err();
            assert!(err.to_string().contains("BD_REQUEST_TIMEOUT_MS"));
        }
    }
}
