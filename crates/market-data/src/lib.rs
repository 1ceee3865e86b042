//! Brokerdata Market Data Crate
//!
//! This crate provides a provider-agnostic interface for fetching quotes and
//! historical price data from brokerage connections.
//!
//! # Overview
//!
//! The market data crate supports:
//! - Multiple providers: Interactive Brokers (TWS / IB Gateway) and tastytrade
//! - Capability declarations, so callers can ask what a provider supports
//! - Ordered failover: pick the first reachable provider from a priority list
//! - Per-call timeouts and scoped sessions
//!
//! # Architecture
//!
//! ```text
//! +------------------+     +------------------+
//! |     Caller       | --> | ProviderSelector |  (ordered probe)
//! +------------------+     +------------------+
//!                                  |
//!                                  v
//!                          +--------------------+
//!                          | MarketDataProvider |  (IBKR, tastytrade)
//!                          +--------------------+
//!                                  |
//!                                  v
//!                     +---------------------------+
//!                     | Quote / HistoricalSeries  |  (plain records)
//!                     +---------------------------+
//! ```
//!
//! # Core Types
//!
//! - [`Quote`] - Point-in-time price snapshot
//! - [`HistoricalSeries`] - Ordered OHLCV bars for one symbol
//! - [`MarketDataProvider`] - The provider contract
//! - [`ProviderSelector`] - First-reachable provider selection
//! - [`MarketDataError`] - Error taxonomy shared by all providers
//!
//! # Example
//!
//! ```ignore
//! use brokerdata_market_data::{ProvidersConfig, ProviderSelector, QuoteRequest};
//!
//! let providers = ProvidersConfig::from_env()?.build_providers()?;
//! let selection = ProviderSelector::new(providers).select().await?;
//! let quote = selection.provider.get_quote(&QuoteRequest::new("AAPL")).await?;
//! ```

pub mod config;
pub mod errors;
pub mod models;
pub mod provider;
pub mod quick;
pub mod registry;

// Re-export all public types from models
pub use models::{
    AccountSummary, AccountValue, Bar, ContractMatch, HistoricalSeries, HistoryRequest, Period,
    Position, ProviderId, Quote, QuoteBatch, QuoteRequest, Timeframe, WhatToShow,
};

// Re-export provider types
pub use provider::ibkr::IbkrProvider;
pub use provider::tastytrade::TastytradeProvider;
pub use provider::{
    with_session, with_timeout, Capability, MarketDataProvider, ProviderCapabilities,
    ProviderLiveness,
};

// Re-export registry types
pub use registry::{ProbeState, ProviderAttempt, ProviderSelector, Selection, SelectionReport};

// Re-export configuration
pub use config::{IbkrConfig, ProviderKind, ProvidersConfig, TastytradeConfig};

// Re-export error types
pub use errors::{MarketDataError, RetryClass};
