use std::time::Duration;

use super::vocabulary::{Period, Timeframe, WhatToShow};
use crate::errors::MarketDataError;

pub const DEFAULT_EXCHANGE: &str = "SMART";
pub const DEFAULT_CURRENCY: &str = "USD";
pub const DEFAULT_QUOTE_TIMEOUT: Duration = Duration::from_secs(10);
/// Historical requests take longer on the provider side.
pub const DEFAULT_HISTORY_TIMEOUT: Duration = Duration::from_secs(30);

/// Parameters of a single quote request.
///
/// Symbol, exchange and currency are passed to the provider verbatim.
#[derive(Clone, Debug)]
pub struct QuoteRequest {
    pub symbol: String,
    pub exchange: String,
    pub currency: String,
    pub timeout: Duration,
}

impl QuoteRequest {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            exchange: DEFAULT_EXCHANGE.to_string(),
            currency: DEFAULT_CURRENCY.to_string(),
            timeout: DEFAULT_QUOTE_TIMEOUT,
        }
    }

    pub fn with_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = exchange.into();
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), MarketDataError> {
        validate_symbol(&self.symbol)?;
        validate_timeout(self.timeout)
    }
}

/// Parameters of a historical bar request.
#[derive(Clone, Debug)]
pub struct HistoryRequest {
    pub symbol: String,
    pub period: Period,
    pub timeframe: Timeframe,
    pub what_to_show: WhatToShow,
    pub exchange: String,
    pub currency: String,
    pub timeout: Duration,
}

impl HistoryRequest {
    pub fn new(symbol: impl Into<String>, period: Period, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.into(),
            period,
            timeframe,
            what_to_show: WhatToShow::default(),
            exchange: DEFAULT_EXCHANGE.to_string(),
            currency: DEFAULT_CURRENCY.to_string(),
            timeout: DEFAULT_HISTORY_TIMEOUT,
        }
    }

    /// Build a request from raw period/timeframe tokens.
    pub fn parse(
        symbol: impl Into<String>,
        period: &str,
        timeframe: &str,
    ) -> Result<Self, MarketDataError> {
        Ok(Self::new(symbol, period.parse()?, timeframe.parse()?))
    }

    pub fn with_what_to_show(mut self, what_to_show: WhatToShow) -> Self {
        self.what_to_show = what_to_show;
        self
    }

    pub fn with_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = exchange.into();
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), MarketDataError> {
        validate_symbol(&self.symbol)?;
        validate_timeout(self.timeout)
    }
}

pub(crate) fn validate_symbol(symbol: &str) -> Result<(), MarketDataError> {
    if symbol.trim().is_empty() {
        return Err(MarketDataError::validation("symbol must not be empty"));
    }
    Ok(())
}

pub(crate) fn validate_timeout(timeout: Duration) -> Result<(), MarketDataError> {
    if timeout.is_zero() {
        return Err(MarketDataError::validation("timeout must be positive"));
    }
    Ok(())
}
