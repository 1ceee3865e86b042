//! One-shot helpers that open an IBKR session, fetch, and close it again.
//!
//! The request's default timeout (10s for quotes, 30s for history) bounds
//! the login and the fetch together.
//!
//! Intended for scripts and the CLI; long-lived callers should keep a
//! provider instance and reuse its session instead.

use rust_decimal::Decimal;

use crate::config::IbkrConfig;
use crate::errors::MarketDataError;
use crate::models::{HistoricalSeries, HistoryRequest, QuoteRequest};
use crate::provider::ibkr::IbkrProvider;
use crate::provider::{with_session, MarketDataProvider};

/// Current price of `symbol` on SMART/USD, or `None` when IBKR has no data.
pub async fn get_stock_price(
    config: &IbkrConfig,
    symbol: &str,
) -> Result<Option<Decimal>, MarketDataError> {
    let provider = IbkrProvider::new(config)?;
    let request = QuoteRequest::new(symbol);
    let quote = with_session(&provider, request.timeout, provider.get_quote(&request)).await?;
    Ok(quote.map(|q| q.price()))
}

/// Historical bars for `symbol`, with period and timeframe given as tokens
/// such as `"1M"` and `"1D"`.
pub async fn get_stock_data(
    config: &IbkrConfig,
    symbol: &str,
    period: &str,
    timeframe: &str,
) -> Result<Option<HistoricalSeries>, MarketDataError> {
    let request = HistoryRequest::parse(symbol, period, timeframe)?;
    let provider = IbkrProvider::new(config)?;
    with_session(&provider, request.timeout, provider.get_historical_data(&request)).await
}
