//! Market data provider abstractions and implementations.
//!
//! This module contains:
//! - The `MarketDataProvider` trait that all providers implement
//! - Provider capability declarations
//! - Per-call timeout and scoped-session helpers shared by adapters
//! - Concrete provider implementations (IBKR, tastytrade)
//!
//! # Architecture
//!
//! The provider system is designed to be:
//! - **Provider-agnostic**: callers and the selector see only the trait and capability set
//! - **Extensible**: New providers can be added by implementing `MarketDataProvider`
//! - **Explicit about gaps**: an undeclared operation fails with `NotSupported`,
//!   distinguishable from connectivity failures
//!
//! Adapters never leak vendor types: responses are translated into the
//! records in [`crate::models`] and vendor failures into [`MarketDataError`].

mod capabilities;
mod traits;

pub mod ibkr;
pub mod tastytrade;

pub use capabilities::{Capability, ProviderCapabilities};
pub use traits::{MarketDataProvider, ProviderLiveness, PROBE_SYMBOL};

use std::future::Future;
use std::time::Duration;

use log::warn;
use rust_decimal::Decimal;

use crate::errors::MarketDataError;
use crate::models::validate_timeout;

/// Run `fut` under a per-call deadline.
///
/// On expiry the in-flight future is dropped, which cancels the underlying
/// request, and `Timeout` is returned. A zero timeout is a validation error.
pub async fn with_timeout<T, F>(
    provider: &str,
    timeout: Duration,
    fut: F,
) -> Result<T, MarketDataError>
where
    F: Future<Output = Result<T, MarketDataError>>,
{
    validate_timeout(timeout)?;
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!("Provider '{}' timed out after {:?}", provider, timeout);
            Err(MarketDataError::Timeout {
                provider: provider.to_string(),
                timeout,
            })
        }
    }
}

/// Run `op` inside a scoped session: connect, run, then disconnect even if `op` failed.
///
/// `op` is typically a data call on the same provider, e.g.
/// `with_session(&ibkr, timeout, ibkr.get_quote(&request))`; it does not
/// start until the session is open. `timeout` bounds connect and `op`
/// together, and separately bounds the disconnect. When both `op` and the
/// disconnect fail, the error of `op` is returned and the disconnect failure
/// is logged.
pub async fn with_session<P, T, F>(
    provider: &P,
    timeout: Duration,
    op: F,
) -> Result<T, MarketDataError>
where
    P: MarketDataProvider + ?Sized,
    F: Future<Output = Result<T, MarketDataError>>,
{
    validate_timeout(timeout)?;
    let mut connect_failed = false;
    let result = with_timeout(provider.id(), timeout, async {
        if let Err(e) = provider.connect().await {
            connect_failed = true;
            return Err(e);
        }
        op.await
    })
    .await;

    if !connect_failed {
        if let Err(e) = with_timeout(provider.id(), timeout, provider.disconnect()).await {
            warn!("Provider '{}' failed to disconnect: {}", provider.id(), e);
        }
    }
    result
}

/// Normalize one side of a book: non-positive or missing becomes `None`.
pub(crate) fn book_side(value: Option<Decimal>) -> Option<Decimal> {
    value.filter(|v| *v > Decimal::ZERO)
}

/// Normalize bid/ask; a crossed book drops both sides.
pub(crate) fn normalize_book(
    provider: &str,
    symbol: &str,
    bid: Option<Decimal>,
    ask: Option<Decimal>,
) -> (Option<Decimal>, Option<Decimal>) {
    let (bid, ask) = (book_side(bid), book_side(ask));
    match (bid, ask) {
        (Some(b), Some(a)) if b > a => {
            warn!(
                "Provider '{}' returned crossed book for {} (bid {} > ask {}), dropping both sides",
                provider, symbol, b, a
            );
            (None, None)
        }
        _ => (bid, ask),
    }
}

/// Translate a transport failure into the error taxonomy.
///
/// `transport_timeout` is the ceiling configured on the client, reported when
/// reqwest gives up on its own before the caller's deadline.
pub(crate) fn map_request_error(
    provider: &str,
    err: reqwest::Error,
    transport_timeout: Duration,
) -> MarketDataError {
    if err.is_timeout() {
        MarketDataError::Timeout {
            provider: provider.to_string(),
            timeout: transport_timeout,
        }
    } else if err.is_connect() {
        MarketDataError::Connection {
            provider: provider.to_string(),
            message: err.to_string(),
        }
    } else {
        MarketDataError::ProviderError {
            provider: provider.to_string(),
            message: err.to_string(),
        }
    }
}
