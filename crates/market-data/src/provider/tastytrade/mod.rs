//! tastytrade market data provider.
//!
//! Uses the tastytrade REST API with a session token obtained from
//! `POST /sessions`. Only quote snapshots are available; historical bars are
//! reported as `NotSupported`.
//!
//! tastytrade lists US markets only, so requests for another currency are
//! answered with "no data" rather than an error.

mod models;

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use num_traits::ToPrimitive;
use reqwest::{Client, RequestBuilder, StatusCode};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use crate::config::TastytradeConfig;
use crate::errors::MarketDataError;
use crate::models::{Quote, QuoteRequest};
use crate::provider::{
    map_request_error, normalize_book, with_timeout, Capability, MarketDataProvider,
    ProviderCapabilities,
};

use self::models::{
    decimal, Envelope, ErrorEnvelope, LoginRequest, MarketDataItem, MarketDataPage, SessionData,
};

const PROVIDER_ID: &str = "TASTYTRADE";

const CAPABILITIES: &[Capability] = &[Capability::Quotes];

const USER_AGENT: &str = concat!("brokerdata/", env!("CARGO_PKG_VERSION"));

/// Transport-level ceiling; callers' per-call timeouts are normally shorter.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// tastytrade provider holding one API session.
pub struct TastytradeProvider {
    client: Client,
    base_url: String,
    username: String,
    password: String,
    session_token: Mutex<Option<String>>,
}

impl TastytradeProvider {
    /// Create a provider; login happens on first use.
    pub fn new(config: &TastytradeConfig) -> Result<Self, MarketDataError> {
        if config.username.trim().is_empty() || config.password.is_empty() {
            return Err(MarketDataError::Config(
                "tastytrade username and password are required".to_string(),
            ));
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                MarketDataError::Config(format!("cannot build tastytrade client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            session_token: Mutex::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check_status(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, MarketDataError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&body)
            .ok()
            .and_then(|e| e.error.message.or(e.error.code))
            .unwrap_or_else(|| format!("HTTP error: {} {}", status, body.trim()));

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(MarketDataError::Connection {
                provider: PROVIDER_ID.to_string(),
                message,
            }),
            _ => Err(MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message,
            }),
        }
    }

    async fn send(request: RequestBuilder) -> Result<reqwest::Response, MarketDataError> {
        let response = request
            .send()
            .await
            .map_err(|e| map_request_error(PROVIDER_ID, e, REQUEST_TIMEOUT))?;
        Self::check_status(response).await
    }

    /// Current session token, logging in when there is none.
    async fn session_token(&self) -> Result<String, MarketDataError> {
        let mut token = self.session_token.lock().await;
        if let Some(existing) = token.as_ref() {
            return Ok(existing.clone());
        }

        let login = LoginRequest {
            login: &self.username,
            password: &self.password,
            remember_me: false,
        };
        let response = Self::send(self.client.post(self.url("/sessions")).json(&login)).await?;
        let session: Envelope<SessionData> =
            response.json().await.map_err(|e| MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: format!("Failed to parse session response: {}", e),
            })?;

        info!("Connected to tastytrade as {}", self.username);
        *token = Some(session.data.session_token.clone());
        Ok(session.data.session_token)
    }

    async fn fetch_quote(&self, request: &QuoteRequest) -> Result<Option<Quote>, MarketDataError> {
        if !request.currency.eq_ignore_ascii_case("USD") {
            debug!(
                "tastytrade has no {} listing for {}",
                request.currency, request.symbol
            );
            return Ok(None);
        }

        let token = self.session_token().await?;
        let symbol = request.symbol.trim().to_uppercase();
        let result = Self::send(
            self.client
                .get(self.url("/market-data/by-type"))
                .header("Authorization", token)
                .query(&[("equity", symbol.as_str())]),
        )
        .await;

        let response = match result {
            Ok(response) => response,
            Err(e @ MarketDataError::Connection { .. }) => {
                // Expired token; the next call logs in again.
                *self.session_token.lock().await = None;
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let page: Envelope<MarketDataPage> =
            response.json().await.map_err(|e| MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: format!("Failed to parse market data for {}: {}", symbol, e),
            })?;

        match page
            .data
            .items
            .iter()
            .find(|item| item.symbol.eq_ignore_ascii_case(&symbol))
        {
            Some(item) => item_to_quote(&symbol, item),
            None => {
                debug!("tastytrade returned no market data for {}", symbol);
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl MarketDataProvider for TastytradeProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::new(CAPABILITIES)
    }

    async fn connect(&self) -> Result<(), MarketDataError> {
        self.session_token().await.map(|_| ())
    }

    async fn disconnect(&self) -> Result<(), MarketDataError> {
        let token = match self.session_token.lock().await.take() {
            Some(token) => token,
            None => return Ok(()),
        };

        Self::send(
            self.client
                .delete(self.url("/sessions"))
                .header("Authorization", token),
        )
        .await?;
        info!("Disconnected from tastytrade");
        Ok(())
    }

    async fn get_quote(&self, request: &QuoteRequest) -> Result<Option<Quote>, MarketDataError> {
        request.validate()?;
        with_timeout(PROVIDER_ID, request.timeout, self.fetch_quote(request)).await
    }
}

/// Build a quote from a market data item; `None` when no price is published.
fn item_to_quote(symbol: &str, item: &MarketDataItem) -> Result<Option<Quote>, MarketDataError> {
    let (bid, ask) = normalize_book(PROVIDER_ID, symbol, decimal(&item.bid), decimal(&item.ask));

    let positive = |value: Option<Decimal>| value.filter(|v| *v > Decimal::ZERO);
    let last = positive(decimal(&item.last));
    let price = match last
        .or_else(|| positive(decimal(&item.mid)))
        .or_else(|| positive(decimal(&item.mark)))
    {
        Some(price) => price,
        None => {
            warn!("tastytrade published no price for {}", symbol);
            return Ok(None);
        }
    };

    let prev_close = positive(decimal(&item.prev_close));
    let change = last.zip(prev_close).map(|(last, prev)| last - prev);
    let change_percent = change
        .zip(prev_close)
        .map(|(change, prev)| (change / prev * Decimal::ONE_HUNDRED).round_dp(4));

    let volume = decimal(&item.volume)
        .filter(|v| !v.is_sign_negative())
        .and_then(|v| v.trunc().to_u64())
        .unwrap_or(0);

    let mut builder = Quote::builder(symbol, price, PROVIDER_ID)
        .bid(bid)
        .ask(ask)
        .volume(volume)
        .change(change)
        .change_percent(change_percent);
    if let Some(updated_at) = item.updated_at {
        builder = builder.timestamp(updated_at);
    }
    builder.build().map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(json: &str) -> MarketDataItem {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_provider_id_and_capabilities() {
        let provider = TastytradeProvider::new(&TastytradeConfig::new("user", "secret")).unwrap();
        assert_eq!(provider.id(), "TASTYTRADE");
        assert!(provider.capabilities().supports(Capability::Quotes));
        assert!(!provider.capabilities().supports(Capability::HistoricalData));
    }

    #[test]
    fn test_new_requires_credentials() {
        let err = TastytradeProvider::new(&TastytradeConfig::new("", "secret"))
            .err()
            .unwrap();
        assert!(matches!(err, MarketDataError::Config(_)));
    }

    #[test]
    fn test_item_to_quote_with_change() {
        let quote = item_to_quote(
            "AAPL",
            &item(r#"{"symbol": "AAPL", "bid": "99.9", "ask": "100.1", "last": "100", "prev-close": "80", "volume": "1200"}"#),
        )
        .unwrap()
        .unwrap();

        assert_eq!(quote.price(), dec!(100));
        assert_eq!(quote.change(), Some(dec!(20)));
        assert_eq!(quote.change_percent(), Some(dec!(25)));
        assert_eq!(quote.volume(), 1200);
        assert_eq!(quote.source(), "TASTYTRADE");
    }

    #[test]
    fn test_item_to_quote_falls_back_to_mark() {
        let quote = item_to_quote(
            "AAPL",
            &item(r#"{"symbol": "AAPL", "last": "0", "mark": "50.5"}"#),
        )
        .unwrap()
        .unwrap();
        assert_eq!(quote.price(), dec!(50.5));
        assert_eq!(quote.change(), None);
    }

    #[test]
    fn test_item_without_price_is_absent() {
        let result = item_to_quote("AAPL", &item(r#"{"symbol": "AAPL", "bid": "1"}"#)).unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_history_is_not_supported() {
        let provider = TastytradeProvider::new(&TastytradeConfig::new("user", "secret")).unwrap();
        let request = crate::models::HistoryRequest::parse("AAPL", "1M", "1D").unwrap();
        let err = provider.get_historical_data(&request).await.unwrap_err();
        assert!(err.is_not_supported());
        assert!(err.to_string().contains("TASTYTRADE"));
    }
}
