//! Provider construction parameters.
//!
//! Configuration comes from environment variables ([`ProvidersConfig::from_env`])
//! or a JSON document ([`ProvidersConfig::from_json_file`]). Binaries load a
//! `.env` file before calling `from_env`.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use log::debug;
use serde::Deserialize;
use serde_json::Value;

use crate::errors::MarketDataError;
use crate::provider::ibkr::IbkrProvider;
use crate::provider::tastytrade::TastytradeProvider;
use crate::provider::MarketDataProvider;

/// TWS paper trading port.
pub const PAPER_PORT: u16 = 7497;
/// TWS live trading port.
pub const LIVE_PORT: u16 = 7496;
/// IB Gateway port.
pub const GATEWAY_PORT: u16 = 4002;

pub const DEFAULT_IBKR_HOST: &str = "127.0.0.1";
pub const DEFAULT_CLIENT_ID: u32 = 1;

pub const TASTYTRADE_PRODUCTION_URL: &str = "https://api.tastyworks.com";
pub const TASTYTRADE_SANDBOX_URL: &str = "https://api.cert.tastyworks.com";

/// Connection parameters for the IBKR adapter.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct IbkrConfig {
    pub host: String,
    pub port: u16,
    /// Session identifier reported in logs and diagnostics.
    pub client_id: u32,
    /// Overrides the URL derived from host and port.
    pub base_url: Option<String>,
    /// Gateways serve self-signed certificates.
    pub accept_invalid_certs: bool,
}

impl Default for IbkrConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_IBKR_HOST.to_string(),
            port: LIVE_PORT,
            client_id: DEFAULT_CLIENT_ID,
            base_url: None,
            accept_invalid_certs: true,
        }
    }
}

impl IbkrConfig {
    pub fn paper() -> Self {
        Self {
            port: PAPER_PORT,
            ..Self::default()
        }
    }

    pub fn gateway() -> Self {
        Self {
            port: GATEWAY_PORT,
            ..Self::default()
        }
    }

    pub fn with_client_id(mut self, client_id: u32) -> Self {
        self.client_id = client_id;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// REST root, without trailing slash.
    pub fn base_url(&self) -> String {
        let url = match &self.base_url {
            Some(url) => url.clone(),
            None => format!("https://{}:{}/v1/api", self.host, self.port),
        };
        url.trim_end_matches('/').to_string()
    }
}

/// Credentials for the tastytrade adapter.
#[derive(Clone, PartialEq, Deserialize)]
pub struct TastytradeConfig {
    pub username: String,
    pub password: String,
    #[serde(default = "default_tastytrade_url")]
    pub base_url: String,
}

fn default_tastytrade_url() -> String {
    TASTYTRADE_PRODUCTION_URL.to_string()
}

impl TastytradeConfig {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            base_url: default_tastytrade_url(),
        }
    }

    pub fn sandbox(mut self) -> Self {
        self.base_url = TASTYTRADE_SANDBOX_URL.to_string();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl fmt::Debug for TastytradeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TastytradeConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Adapter kinds that can appear in the priority order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Ibkr,
    Tastytrade,
}

impl FromStr for ProviderKind {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ibkr" => Ok(Self::Ibkr),
            "tastytrade" | "tasty" => Ok(Self::Tastytrade),
            other => Err(MarketDataError::Config(format!(
                "unknown provider '{}' in provider order",
                other
            ))),
        }
    }
}

fn default_order() -> Vec<ProviderKind> {
    vec![ProviderKind::Ibkr, ProviderKind::Tastytrade]
}

/// Which adapters to build, with what parameters, in what priority order.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub ibkr: Option<IbkrConfig>,
    #[serde(default)]
    pub tastytrade: Option<TastytradeConfig>,
    #[serde(default = "default_order")]
    pub order: Vec<ProviderKind>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            ibkr: Some(IbkrConfig::default()),
            tastytrade: None,
            order: default_order(),
        }
    }
}

impl ProvidersConfig {
    /// Read `BD_*` variables from the process environment.
    pub fn from_env() -> Result<Self, MarketDataError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any variable source; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, MarketDataError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let ibkr = if var("BD_IBKR_DISABLED").is_some_and(|v| is_truthy(&v)) {
            None
        } else {
            let mut config = IbkrConfig::default();
            if let Some(host) = var("BD_IBKR_HOST") {
                config.host = host;
            }
            if let Some(port) = var("BD_IBKR_PORT") {
                config.port = parse_number("BD_IBKR_PORT", &port)?;
            }
            if let Some(client_id) = var("BD_IBKR_CLIENT_ID") {
                config.client_id = parse_number("BD_IBKR_CLIENT_ID", &client_id)?;
            }
            config.base_url = var("BD_IBKR_BASE_URL");
            if let Some(flag) = var("BD_IBKR_ACCEPT_INVALID_CERTS") {
                config.accept_invalid_certs = is_truthy(&flag);
            }
            Some(config)
        };

        let tastytrade = match (var("BD_TT_USERNAME"), var("BD_TT_PASSWORD")) {
            (Some(username), Some(password)) => {
                let mut config = TastytradeConfig::new(username, password);
                if var("BD_TT_SANDBOX").is_some_and(|v| is_truthy(&v)) {
                    config = config.sandbox();
                }
                if let Some(url) = var("BD_TT_BASE_URL") {
                    config = config.with_base_url(url);
                }
                Some(config)
            }
            (Some(_), None) => {
                return Err(MarketDataError::Config(
                    "BD_TT_USERNAME is set but BD_TT_PASSWORD is missing".to_string(),
                ))
            }
            (None, Some(_)) => {
                return Err(MarketDataError::Config(
                    "BD_TT_PASSWORD is set but BD_TT_USERNAME is missing".to_string(),
                ))
            }
            (None, None) => None,
        };

        let order = match var("BD_PROVIDER_ORDER") {
            Some(raw) => parse_order(&raw)?,
            None => default_order(),
        };

        Ok(Self {
            ibkr,
            tastytrade,
            order,
        })
    }

    /// Load a JSON document with optional `ibkr`, `tastytrade` and `order` keys.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, MarketDataError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            MarketDataError::Config(format!("cannot read config file {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, MarketDataError> {
        let document: Value = serde_json::from_str(text)
            .map_err(|e| MarketDataError::Config(format!("invalid config JSON: {}", e)))?;

        if let Some(section) = document.get("tastytrade") {
            for key in ["username", "password"] {
                if section.get(key).and_then(Value::as_str).is_none() {
                    return Err(MarketDataError::Config(format!(
                        "'{}' missing from tastytrade config",
                        key
                    )));
                }
            }
        }

        serde_json::from_value(document)
            .map_err(|e| MarketDataError::Config(format!("invalid config: {}", e)))
    }

    /// Instantiate the configured adapters in priority order.
    pub fn build_providers(&self) -> Result<Vec<Arc<dyn MarketDataProvider>>, MarketDataError> {
        let mut providers: Vec<Arc<dyn MarketDataProvider>> = Vec::new();
        for kind in &self.order {
            match kind {
                ProviderKind::Ibkr => match &self.ibkr {
                    Some(config) => providers.push(Arc::new(IbkrProvider::new(config)?)),
                    None => debug!("IBKR listed in provider order but not configured, skipping"),
                },
                ProviderKind::Tastytrade => match &self.tastytrade {
                    Some(config) => providers.push(Arc::new(TastytradeProvider::new(config)?)),
                    None => {
                        debug!("tastytrade listed in provider order but not configured, skipping")
                    }
                },
            }
        }
        Ok(providers)
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_number<T: FromStr>(key: &str, raw: &str) -> Result<T, MarketDataError> {
    raw.trim()
        .parse()
        .map_err(|_| MarketDataError::Config(format!("{} is not a valid number: '{}'", key, raw)))
}

fn parse_order(raw: &str) -> Result<Vec<ProviderKind>, MarketDataError> {
    let mut order = Vec::new();
    for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let kind: ProviderKind = token.parse()?;
        if !order.contains(&kind) {
            order.push(kind);
        }
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_from_empty_env() {
        let config = ProvidersConfig::from_lookup(lookup(&[])).unwrap();
        let ibkr = config.ibkr.unwrap();
        assert_eq!(ibkr.host, "127.0.0.1");
        assert_eq!(ibkr.port, LIVE_PORT);
        assert_eq!(ibkr.client_id, 1);
        assert_eq!(ibkr.base_url(), "https://127.0.0.1:7496/v1/api");
        assert!(config.tastytrade.is_none());
        assert_eq!(config.order, vec![ProviderKind::Ibkr, ProviderKind::Tastytrade]);
    }

    #[test]
    fn test_env_overrides() {
        let config = ProvidersConfig::from_lookup(lookup(&[
            ("BD_IBKR_HOST", "10.0.0.5"),
            ("BD_IBKR_PORT", "4002"),
            ("BD_IBKR_CLIENT_ID", "7"),
            ("BD_TT_USERNAME", "trader"),
            ("BD_TT_PASSWORD", "secret"),
            ("BD_TT_SANDBOX", "true"),
            ("BD_PROVIDER_ORDER", "tastytrade, ibkr"),
        ]))
        .unwrap();

        let ibkr = config.ibkr.unwrap();
        assert_eq!(ibkr.base_url(), "https://10.0.0.5:4002/v1/api");
        assert_eq!(ibkr.client_id, 7);
        let tt = config.tastytrade.unwrap();
        assert_eq!(tt.base_url, TASTYTRADE_SANDBOX_URL);
        assert_eq!(config.order, vec![ProviderKind::Tastytrade, ProviderKind::Ibkr]);
    }

    #[test]
    fn test_bad_port_is_config_error() {
        let err = ProvidersConfig::from_lookup(lookup(&[("BD_IBKR_PORT", "seventy")])).unwrap_err();
        assert!(matches!(err, MarketDataError::Config(_)));
        assert!(err.to_string().contains("BD_IBKR_PORT"));
    }

    #[test]
    fn test_username_without_password_is_config_error() {
        let err = ProvidersConfig::from_lookup(lookup(&[("BD_TT_USERNAME", "trader")])).unwrap_err();
        assert!(err.to_string().contains("BD_TT_PASSWORD"));
    }

    #[test]
    fn test_password_without_username_is_config_error() {
        let err = ProvidersConfig::from_lookup(lookup(&[("BD_TT_PASSWORD", "secret")])).unwrap_err();
        assert!(matches!(err, MarketDataError::Config(_)));
        assert!(err.to_string().contains("BD_TT_USERNAME is missing"));
    }

    #[test]
    fn test_ibkr_can_be_disabled() {
        let config =
            ProvidersConfig::from_lookup(lookup(&[("BD_IBKR_DISABLED", "yes")])).unwrap();
        assert!(config.ibkr.is_none());
    }

    #[test]
    fn test_unknown_provider_in_order() {
        let err = ProvidersConfig::from_lookup(lookup(&[("BD_PROVIDER_ORDER", "ibkr,schwab")]))
            .unwrap_err();
        assert!(err.to_string().contains("schwab"));
    }

    #[test]
    fn test_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "ibkr": {{"port": 7497, "client_id": 3}},
                "tastytrade": {{"username": "trader", "password": "secret"}},
                "order": ["tastytrade"]
            }}"#
        )
        .unwrap();

        let config = ProvidersConfig::from_json_file(file.path()).unwrap();
        let ibkr = config.ibkr.unwrap();
        assert_eq!(ibkr.port, PAPER_PORT);
        assert_eq!(ibkr.host, "127.0.0.1");
        assert_eq!(ibkr.client_id, 3);
        assert_eq!(
            config.tastytrade.unwrap().base_url,
            TASTYTRADE_PRODUCTION_URL
        );
        assert_eq!(config.order, vec![ProviderKind::Tastytrade]);
    }

    #[test]
    fn test_json_missing_password_names_key() {
        let err = ProvidersConfig::from_json_str(r#"{"tastytrade": {"username": "trader"}}"#)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: 'password' missing from tastytrade config"
        );
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = ProvidersConfig::from_json_file("/nonexistent/brokerdata.json").unwrap_err();
        assert!(matches!(err, MarketDataError::Config(_)));
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = TastytradeConfig::new("trader", "hunter2");
        let text = format!("{:?}", config);
        assert!(!text.contains("hunter2"));
        assert!(text.contains("<redacted>"));
    }

    #[test]
    fn test_build_providers_follows_order() {
        let config = ProvidersConfig {
            ibkr: Some(IbkrConfig::paper()),
            tastytrade: Some(TastytradeConfig::new("trader", "secret")),
            order: vec![ProviderKind::Tastytrade, ProviderKind::Ibkr],
        };
        let providers = config.build_providers().unwrap();
        let ids: Vec<_> = providers.iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec!["TASTYTRADE", "IBKR"]);
    }

    #[test]
    fn test_build_providers_skips_unconfigured() {
        let config = ProvidersConfig::default();
        let providers = config.build_providers().unwrap();
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].id(), "IBKR");
    }
}
