use chrono::{DateTime, Utc};
use num_traits::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use super::vocabulary::{Period, Timeframe};
use crate::errors::MarketDataError;

/// Trading days per year used to annualize daily volatility.
const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// One OHLCV bar.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: u64,
}

/// Ordered OHLCV bars for one symbol over a period at a timeframe.
///
/// Never empty, and bar timestamps are strictly increasing.
#[derive(Clone, Debug, Serialize)]
pub struct HistoricalSeries {
    symbol: String,
    bars: Vec<Bar>,
    timeframe: Timeframe,
    period: Period,
    source: String,
}

impl HistoricalSeries {
    /// Build a series, sorting bars by timestamp.
    ///
    /// Fails on an empty symbol, no bars, or two bars sharing a timestamp.
    pub fn new(
        symbol: impl Into<String>,
        period: Period,
        timeframe: Timeframe,
        mut bars: Vec<Bar>,
        source: impl Into<String>,
    ) -> Result<Self, MarketDataError> {
        let symbol = symbol.into().trim().to_uppercase();
        if symbol.is_empty() {
            return Err(MarketDataError::validation("series symbol must not be empty"));
        }
        if bars.is_empty() {
            return Err(MarketDataError::validation(format!(
                "{}: historical series must contain at least one bar",
                symbol
            )));
        }

        bars.sort_by_key(|b| b.timestamp);
        if let Some(pair) = bars.windows(2).find(|w| w[0].timestamp == w[1].timestamp) {
            return Err(MarketDataError::validation(format!(
                "{}: duplicate bar timestamp {}",
                symbol, pair[0].timestamp
            )));
        }

        Ok(Self {
            symbol,
            bars,
            timeframe,
            period,
            source: source.into(),
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn into_bars(self) -> Vec<Bar> {
        self.bars
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn period(&self) -> Period {
        self.period
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Always false for a constructed series.
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> impl Iterator<Item = Decimal> + '_ {
        self.bars.iter().map(|b| b.close)
    }

    /// Close of the most recent bar.
    pub fn latest_price(&self) -> Decimal {
        self.bars.last().map(|b| b.close).unwrap_or_default()
    }

    /// `(lowest low, highest high)` over the series.
    pub fn price_range(&self) -> (Decimal, Decimal) {
        let low = self.bars.iter().map(|b| b.low).min().unwrap_or_default();
        let high = self.bars.iter().map(|b| b.high).max().unwrap_or_default();
        (low, high)
    }

    /// Annualized volatility of simple close-to-close returns.
    ///
    /// Sample standard deviation scaled by sqrt(252). Meaningful for daily bars.
    /// Returns `None` with fewer than two returns.
    pub fn annualized_volatility(&self) -> Option<f64> {
        let closes: Vec<f64> = self.closes().filter_map(|c| c.to_f64()).collect();
        let returns: Vec<f64> = closes
            .windows(2)
            .filter(|w| w[0] != 0.0)
            .map(|w| w[1] / w[0] - 1.0)
            .collect();

        if returns.len() < 2 {
            return None;
        }

        let n = returns.len() as f64;
        let mean = returns.iter().sum::<f64>() / n;
        let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
        Some(variance.sqrt() * TRADING_DAYS_PER_YEAR.sqrt())
    }
}

/// Sort vendor bars and collapse duplicate timestamps, keeping the last one received.
pub fn normalize_bars(bars: Vec<Bar>) -> Vec<Bar> {
    let mut indexed: Vec<(usize, Bar)> = bars.into_iter().enumerate().collect();
    indexed.sort_by_key(|(i, b)| (b.timestamp, *i));

    let mut out: Vec<Bar> = Vec::with_capacity(indexed.len());
    for (_, bar) in indexed {
        match out.last_mut() {
            Some(last) if last.timestamp == bar.timestamp => *last = bar,
            _ => out.push(bar),
        }
    }
    out
}
