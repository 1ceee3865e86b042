use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::errors::MarketDataError;

/// Snapshot of the current price, book and volume for one symbol.
///
/// Produced fresh by a provider for every request and never mutated afterwards.
/// Construction goes through [`QuoteBuilder`], which enforces:
/// - the symbol is non-empty
/// - price, bid and ask are non-negative
/// - `bid <= ask` when both sides are present
///
/// A side the source did not report is `None`, never zero.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Quote {
    symbol: String,
    price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    bid: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ask: Option<Decimal>,
    volume: u64,
    timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    change: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    change_percent: Option<Decimal>,
    source: String,
}

impl Quote {
    /// Start building a quote for `symbol` priced at `price`, sourced from `source`.
    pub fn builder(
        symbol: impl Into<String>,
        price: Decimal,
        source: impl Into<String>,
    ) -> QuoteBuilder {
        QuoteBuilder {
            symbol: symbol.into(),
            price,
            bid: None,
            ask: None,
            volume: 0,
            timestamp: None,
            change: None,
            change_percent: None,
            source: source.into(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Last traded price, or the midpoint when the source had no trade.
    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn bid(&self) -> Option<Decimal> {
        self.bid
    }

    pub fn ask(&self) -> Option<Decimal> {
        self.ask
    }

    pub fn volume(&self) -> u64 {
        self.volume
    }

    /// Point in time on the provider's clock.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn change(&self) -> Option<Decimal> {
        self.change
    }

    pub fn change_percent(&self) -> Option<Decimal> {
        self.change_percent
    }

    /// Provider id that produced this quote.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Bid-ask spread, only when both sides are present.
    pub fn spread(&self) -> Option<Decimal> {
        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    /// Midpoint of the book, falling back to the last price.
    pub fn mid_price(&self) -> Decimal {
        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) => (bid + ask) / Decimal::TWO,
            _ => self.price,
        }
    }
}

/// Builder for [`Quote`]; `build` validates the record.
#[derive(Clone, Debug)]
pub struct QuoteBuilder {
    symbol: String,
    price: Decimal,
    bid: Option<Decimal>,
    ask: Option<Decimal>,
    volume: u64,
    timestamp: Option<DateTime<Utc>>,
    change: Option<Decimal>,
    change_percent: Option<Decimal>,
    source: String,
}

impl QuoteBuilder {
    pub fn bid(mut self, bid: Option<Decimal>) -> Self {
        self.bid = bid;
        self
    }

    pub fn ask(mut self, ask: Option<Decimal>) -> Self {
        self.ask = ask;
        self
    }

    pub fn volume(mut self, volume: u64) -> Self {
        self.volume = volume;
        self
    }

    /// Defaults to the build time when not set.
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn change(mut self, change: Option<Decimal>) -> Self {
        self.change = change;
        self
    }

    pub fn change_percent(mut self, change_percent: Option<Decimal>) -> Self {
        self.change_percent = change_percent;
        self
    }

    pub fn build(self) -> Result<Quote, MarketDataError> {
        let symbol = self.symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(MarketDataError::validation("quote symbol must not be empty"));
        }
        if self.price.is_sign_negative() && !self.price.is_zero() {
            return Err(MarketDataError::validation(format!(
                "{}: negative price {}",
                symbol, self.price
            )));
        }
        for (side, value) in [("bid", self.bid), ("ask", self.ask)] {
            if let Some(v) = value {
                if v.is_sign_negative() && !v.is_zero() {
                    return Err(MarketDataError::validation(format!(
                        "{}: negative {} {}",
                        symbol, side, v
                    )));
                }
            }
        }
        if let (Some(bid), Some(ask)) = (self.bid, self.ask) {
            if bid > ask {
                return Err(MarketDataError::validation(format!(
                    "{}: crossed book, bid {} > ask {}",
                    symbol, bid, ask
                )));
            }
        }

        Ok(Quote {
            symbol,
            price: self.price,
            bid: self.bid,
            ask: self.ask,
            volume: self.volume,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            change: self.change,
            change_percent: self.change_percent,
            source: self.source,
        })
    }
}

/// Outcome of a multi-symbol quote request.
#[derive(Clone, Debug, Default, Serialize)]
pub struct QuoteBatch {
    /// Quotes keyed by upper-cased symbol.
    pub quotes: BTreeMap<String, Quote>,
    /// Symbols the source did not know or had no live data for.
    pub missing: Vec<String>,
    /// Symbols whose request failed, with the error text.
    pub failed: BTreeMap<String, String>,
}

impl QuoteBatch {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.failed.is_empty()
    }
}
