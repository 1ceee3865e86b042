//! tastytrade API response models.
//!
//! Every payload is wrapped in a `data` envelope; decimal values are sent as
//! strings, occasionally as bare numbers, and missing values as `null`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

/// Body of POST /sessions
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub login: &'a str,
    pub password: &'a str,
    #[serde(rename = "remember-me")]
    pub remember_me: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SessionData {
    pub session_token: String,
}

/// Payload of GET /market-data/by-type
#[derive(Debug, Deserialize)]
pub struct MarketDataPage {
    #[serde(default)]
    pub items: Vec<MarketDataItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MarketDataItem {
    pub symbol: String,
    #[serde(default)]
    pub bid: Option<Value>,
    #[serde(default)]
    pub ask: Option<Value>,
    #[serde(default)]
    pub last: Option<Value>,
    #[serde(default)]
    pub mid: Option<Value>,
    #[serde(default)]
    pub mark: Option<Value>,
    #[serde(default)]
    pub volume: Option<Value>,
    #[serde(default)]
    pub prev_close: Option<Value>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Error envelope returned with non-2xx statuses.
#[derive(Debug, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Read a decimal sent either as a string or a JSON number.
pub fn decimal(value: &Option<Value>) -> Option<Decimal> {
    match value.as_ref()? {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.to_string().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_market_data_item_deserialization() {
        let json = r#"{
            "data": {
                "items": [{
                    "symbol": "AAPL",
                    "instrument-type": "Equity",
                    "bid": "170.09",
                    "ask": "170.11",
                    "last": "170.1",
                    "mid": "170.1",
                    "mark": "170.1",
                    "volume": 51234567,
                    "prev-close": "168.9",
                    "updated-at": "2024-04-05T19:59:59.123Z"
                }]
            }
        }"#;

        let page: Envelope<MarketDataPage> = serde_json::from_str(json).unwrap();
        let item = &page.data.items[0];
        assert_eq!(item.symbol, "AAPL");
        assert_eq!(decimal(&item.bid), Some(dec!(170.09)));
        assert_eq!(decimal(&item.volume), Some(dec!(51234567)));
        assert_eq!(decimal(&item.prev_close), Some(dec!(168.9)));
        assert!(item.updated_at.is_some());
    }

    #[test]
    fn test_null_values_are_absent() {
        let json = r#"{"symbol": "ZZZZ", "bid": null, "last": "NaN"}"#;
        let item: MarketDataItem = serde_json::from_str(json).unwrap();
        assert_eq!(decimal(&item.bid), None);
        assert_eq!(decimal(&item.last), None);
        assert_eq!(decimal(&item.ask), None);
    }

    #[test]
    fn test_session_data_deserialization() {
        let json = r#"{"data": {"session-token": "abc123", "user": {"username": "trader"}}}"#;
        let session: Envelope<SessionData> = serde_json::from_str(json).unwrap();
        assert_eq!(session.data.session_token, "abc123");
    }
}
