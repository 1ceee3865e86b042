//! Contract search result models.

use serde::Serialize;

/// A contract matching a search pattern.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ContractMatch {
    /// Symbol/ticker (e.g., "AAPL")
    pub symbol: String,

    /// Company or instrument name
    pub name: String,

    /// Listing exchange or venue description (e.g., "NASDAQ")
    pub exchange: String,

    /// Security types the contract trades as (e.g., "STK", "OPT")
    pub sec_types: Vec<String>,

    /// Broker-side contract identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_id: Option<i64>,
}
