//! Market data provider trait definitions.
//!
//! This module defines the core `MarketDataProvider` trait that all
//! market data providers must implement.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use log::{debug, warn};

use crate::errors::MarketDataError;
use crate::models::{
    validate_timeout, AccountSummary, ContractMatch, HistoricalSeries, HistoryRequest, Position,
    Quote, QuoteBatch, QuoteRequest,
};

use super::capabilities::{Capability, ProviderCapabilities};
use super::with_timeout;

/// Symbol used by the default liveness probe.
pub const PROBE_SYMBOL: &str = "SPY";

/// Trait for market data providers.
///
/// Implement this trait to add support for a new market data source.
/// Callers check [`capabilities`](Self::capabilities) before invoking an
/// optional operation; optional operations the provider does not declare
/// fail with [`MarketDataError::NotSupported`].
///
/// Each instance owns exactly one session to its external source. Sessions
/// are opened lazily by the data methods and released by
/// [`disconnect`](Self::disconnect); see [`with_session`](super::with_session)
/// for scoped use.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use brokerdata_market_data::provider::{Capability, MarketDataProvider, ProviderCapabilities};
///
/// struct MyProvider;
///
/// #[async_trait]
/// impl MarketDataProvider for MyProvider {
///     fn id(&self) -> &'static str {
///         "MY_PROVIDER"
///     }
///
///     fn capabilities(&self) -> ProviderCapabilities {
///         ProviderCapabilities::new(&[Capability::Quotes])
///     }
///
///     // ... implement get_quote
/// }
/// ```
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Unique identifier for this provider.
    ///
    /// Should be a constant string like "IBKR" or "TASTYTRADE".
    /// Used for logging, diagnostics and the `source` of produced records.
    fn id(&self) -> &'static str;

    /// Describes what this provider can do. Pure, no I/O.
    fn capabilities(&self) -> ProviderCapabilities;

    /// Open the session to the external source if it is not open yet.
    async fn connect(&self) -> Result<(), MarketDataError> {
        Ok(())
    }

    /// Release the session. Safe to call when not connected.
    async fn disconnect(&self) -> Result<(), MarketDataError> {
        Ok(())
    }

    /// Fetch a quote snapshot.
    ///
    /// Returns `Ok(None)` when the symbol is unknown to the source or no live
    /// data is available. Fails with `Timeout` when `request.timeout` expires.
    async fn get_quote(&self, request: &QuoteRequest) -> Result<Option<Quote>, MarketDataError>;

    /// Fetch historical bars.
    ///
    /// Returns `Ok(None)` when the source has no bars for the request.
    /// Default implementation fails with `NotSupported`.
    async fn get_historical_data(
        &self,
        request: &HistoryRequest,
    ) -> Result<Option<HistoricalSeries>, MarketDataError> {
        let _ = request;
        Err(self.unsupported(Capability::HistoricalData))
    }

    /// Liveness hook with failure detail.
    ///
    /// This is the only liveness hook a provider implements; callers go
    /// through [`ProviderLiveness`], which bounds it and catches panics.
    ///
    /// Default implementation issues a throwaway quote request for
    /// [`PROBE_SYMBOL`]; any answer, including "unknown symbol", counts as alive.
    async fn probe(&self, timeout: Duration) -> Result<(), MarketDataError> {
        let request = QuoteRequest::new(PROBE_SYMBOL).with_timeout(timeout);
        self.get_quote(&request).await.map(|_| ())
    }

    /// Fetch quotes for several symbols, one request at a time.
    ///
    /// `template` supplies exchange, currency and the per-symbol timeout.
    /// Unknown symbols land in `missing`, per-symbol failures in `failed`.
    /// A capability gap or an invalid timeout aborts the whole batch.
    async fn get_quotes(
        &self,
        symbols: &[String],
        template: &QuoteRequest,
    ) -> Result<QuoteBatch, MarketDataError> {
        validate_timeout(template.timeout)?;
        if !self.capabilities().supports(Capability::Quotes) {
            return Err(self.unsupported(Capability::Quotes));
        }

        let mut batch = QuoteBatch::default();
        for symbol in symbols {
            let request = QuoteRequest {
                symbol: symbol.clone(),
                ..template.clone()
            };
            match self.get_quote(&request).await {
                Ok(Some(quote)) => {
                    batch.quotes.insert(quote.symbol().to_string(), quote);
                }
                Ok(None) => batch.missing.push(symbol.to_uppercase()),
                Err(e) if e.is_not_supported() => return Err(e),
                Err(e) => {
                    warn!("Provider '{}' failed quote for {}: {}", self.id(), symbol, e);
                    batch.failed.insert(symbol.to_uppercase(), e.to_string());
                }
            }
        }
        Ok(batch)
    }

    /// Fetch the account summary. Default implementation fails with `NotSupported`.
    async fn get_account_summary(
        &self,
        timeout: Duration,
    ) -> Result<AccountSummary, MarketDataError> {
        let _ = timeout;
        Err(self.unsupported(Capability::AccountData))
    }

    /// Fetch open positions. Default implementation fails with `NotSupported`.
    async fn get_positions(&self, timeout: Duration) -> Result<Vec<Position>, MarketDataError> {
        let _ = timeout;
        Err(self.unsupported(Capability::AccountData))
    }

    /// Search contracts by partial symbol. Default implementation fails with `NotSupported`.
    async fn search_contracts(
        &self,
        pattern: &str,
        timeout: Duration,
    ) -> Result<Vec<ContractMatch>, MarketDataError> {
        let _ = (pattern, timeout);
        Err(self.unsupported(Capability::Search))
    }

    /// `NotSupported` error for `capability` on this provider.
    fn unsupported(&self, capability: Capability) -> MarketDataError {
        MarketDataError::not_supported(self.id(), capability.operation())
    }
}

/// Liveness checks derived from [`MarketDataProvider::probe`].
///
/// Implemented for every provider and not meant to be implemented by hand,
/// so `is_reachable` and the selector always reach the same verdict.
#[async_trait]
pub trait ProviderLiveness: MarketDataProvider {
    /// Run `probe` under `timeout`; a failure, expiry or panic yields the reason.
    async fn check_liveness(&self, timeout: Duration) -> Result<(), String>;

    /// Lightweight liveness check. Never fails; unreachability is `false`.
    async fn is_reachable(&self, timeout: Duration) -> bool;
}

#[async_trait]
impl<P: MarketDataProvider + ?Sized> ProviderLiveness for P {
    async fn check_liveness(&self, timeout: Duration) -> Result<(), String> {
        let probe = with_timeout(self.id(), timeout, self.probe(timeout));
        match AssertUnwindSafe(probe).catch_unwind().await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(panic) => Err(format!("probe panicked: {}", panic_message(panic.as_ref()))),
        }
    }

    async fn is_reachable(&self, timeout: Duration) -> bool {
        match self.check_liveness(timeout).await {
            Ok(()) => true,
            Err(reason) => {
                debug!("Provider '{}' unreachable: {}", self.id(), reason);
                false
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}
