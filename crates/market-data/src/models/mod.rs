//! Market data models
//!
//! This module contains the plain data records that cross the provider boundary:
//! - `types` - Type aliases for common identifiers (ProviderId)
//! - `quote` - Quote snapshot and multi-symbol batch (Quote, QuoteBatch)
//! - `series` - OHLCV bars and historical series (Bar, HistoricalSeries)
//! - `vocabulary` - Period, timeframe and what-to-show tokens
//! - `request` - Quote and history request parameters
//! - `account` - Account summary and positions
//! - `search` - Contract search results (ContractMatch)

mod account;
mod quote;
mod request;
mod search;
mod series;
mod types;
mod vocabulary;

pub use account::{AccountSummary, AccountValue, Position};
pub use quote::{Quote, QuoteBatch, QuoteBuilder};
pub use request::{
    HistoryRequest, QuoteRequest, DEFAULT_CURRENCY, DEFAULT_EXCHANGE, DEFAULT_HISTORY_TIMEOUT,
    DEFAULT_QUOTE_TIMEOUT,
};
pub(crate) use request::{validate_symbol, validate_timeout};
pub use search::ContractMatch;
pub use series::{normalize_bars, Bar, HistoricalSeries};
pub use types::ProviderId;
pub use vocabulary::{Period, Timeframe, WhatToShow};
