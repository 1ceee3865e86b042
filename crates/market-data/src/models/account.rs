use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;

/// One tagged value from an account summary (e.g. `NetLiquidation`).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AccountValue {
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

/// Account summary keyed by tag.
#[derive(Clone, Debug, Default, Serialize)]
pub struct AccountSummary {
    pub account_id: String,
    pub values: BTreeMap<String, AccountValue>,
}

impl AccountSummary {
    pub fn get(&self, tag: &str) -> Option<&AccountValue> {
        self.values.get(tag)
    }
}

/// A held position.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Position {
    pub account_id: String,
    pub symbol: String,
    pub quantity: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_cost: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_value: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unrealized_pnl: Option<Decimal>,
    /// Security type as reported by the broker (e.g., "STK", "OPT").
    pub asset_class: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}
