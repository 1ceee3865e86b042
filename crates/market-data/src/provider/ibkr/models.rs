//! IBKR gateway REST response models.
//!
//! Snapshot values arrive as display strings keyed by numeric field ids
//! (e.g. `"31": "C170.10"`), so they are kept as strings here and parsed by
//! the helpers at the bottom of this module.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

/// Snapshot field ids requested for quotes.
pub const FIELD_LAST: &str = "31";
pub const FIELD_BID: &str = "84";
pub const FIELD_ASK: &str = "86";
pub const FIELD_CHANGE: &str = "82";
pub const FIELD_CHANGE_PCT: &str = "83";
pub const FIELD_VOLUME_FORMATTED: &str = "87";
pub const FIELD_VOLUME: &str = "7762";

/// Comma-joined field list for the snapshot endpoint.
pub const SNAPSHOT_FIELDS: &str = "31,84,86,82,83,87,7762";

/// Response from /iserver/auth/status
#[derive(Debug, Deserialize)]
pub struct AuthStatus {
    #[serde(default)]
    pub authenticated: bool,
    #[serde(default)]
    pub competing: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// One entry of /trsrv/stocks, keyed by symbol in the outer map.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockEntry {
    #[serde(default)]
    pub contracts: Vec<StockContract>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockContract {
    pub conid: i64,
    #[serde(default)]
    pub exchange: Option<String>,
    #[serde(default, rename = "isUS")]
    pub is_us: bool,
}

/// Response from /trsrv/stocks
pub type StocksResponse = HashMap<String, Vec<StockEntry>>;

/// One row of /iserver/marketdata/snapshot.
#[derive(Debug, Deserialize)]
pub struct SnapshotRow {
    #[serde(default)]
    pub conid: Option<i64>,
    /// Last update, epoch milliseconds
    #[serde(default, rename = "_updated")]
    pub updated: Option<i64>,
    /// Field id -> display value
    #[serde(flatten)]
    pub fields: HashMap<String, Value>,
}

impl SnapshotRow {
    pub fn field(&self, id: &str) -> Option<&str> {
        self.fields.get(id).and_then(Value::as_str)
    }

    pub fn price(&self, id: &str) -> Option<Decimal> {
        self.field(id).and_then(parse_price)
    }
}

/// Response from /iserver/marketdata/history
#[derive(Debug, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub data: Vec<HistoryBar>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryBar {
    pub o: f64,
    pub h: f64,
    pub l: f64,
    pub c: f64,
    #[serde(default)]
    pub v: f64,
    /// Bar start, epoch milliseconds
    pub t: i64,
}

/// One account from /portfolio/accounts
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioAccount {
    #[serde(alias = "accountId")]
    pub id: String,
}

/// One tag of /portfolio/{accountId}/summary
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryValue {
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub is_null: bool,
    #[serde(default)]
    pub value: Option<String>,
}

/// Response from /portfolio/{accountId}/summary
pub type SummaryResponse = HashMap<String, SummaryValue>;

/// One row of /portfolio/{accountId}/positions/{page}
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRow {
    #[serde(default)]
    pub acct_id: Option<String>,
    #[serde(default)]
    pub contract_desc: Option<String>,
    #[serde(default)]
    pub ticker: Option<String>,
    pub position: f64,
    #[serde(default)]
    pub avg_cost: Option<f64>,
    #[serde(default)]
    pub mkt_value: Option<f64>,
    #[serde(default)]
    pub unrealized_pnl: Option<f64>,
    #[serde(default)]
    pub asset_class: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
}

/// One row of /iserver/secdef/search
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRow {
    /// Sent as a number or a numeric string depending on gateway version
    #[serde(default)]
    pub conid: Option<Value>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sections: Vec<SearchSection>,
}

impl SearchRow {
    pub fn conid(&self) -> Option<i64> {
        match self.conid.as_ref()? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSection {
    pub sec_type: String,
}

/// Error body returned alongside non-2xx statuses.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub error: Option<String>,
}

/// Parse a snapshot price such as `"C170.10"`, `"+1.20"` or `"0.71%"`.
///
/// A leading `C` marks the prior close and `H` a halted instrument; both
/// still carry a usable value.
pub fn parse_price(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches(|c: char| c == 'C' || c == 'H')
        .trim_end_matches('%')
        .chars()
        .filter(|c| *c != ',')
        .collect();
    let cleaned = cleaned.strip_prefix('+').unwrap_or(&cleaned);
    cleaned.parse::<Decimal>().ok()
}

/// Parse a volume value, either raw (`"51234567"`) or abbreviated (`"51.2M"`).
pub fn parse_volume(raw: &str) -> Option<u64> {
    use num_traits::ToPrimitive;

    let raw = raw.trim().replace(',', "");
    let (number, multiplier) = match raw.chars().last()? {
        'K' | 'k' => (&raw[..raw.len() - 1], Decimal::from(1_000)),
        'M' | 'm' => (&raw[..raw.len() - 1], Decimal::from(1_000_000)),
        'B' | 'b' => (&raw[..raw.len() - 1], Decimal::from(1_000_000_000)),
        _ => (raw.as_str(), Decimal::ONE),
    };
    let value = number.parse::<Decimal>().ok()?.checked_mul(multiplier)?;
    if value.is_sign_negative() {
        return None;
    }
    value.trunc().to_u64()
}
