//! Interactive Brokers provider implementation.
//!
//! Talks to the REST surface of a locally running TWS / IB Gateway
//! (`https://{host}:{port}/v1/api`). Supports quotes, historical bars,
//! account data and contract search.
//!
//! # API Endpoints
//!
//! - Session: `GET /iserver/auth/status`, `POST /logout`
//! - Contract qualification: `GET /trsrv/stocks?symbols={symbol}`
//! - Quote snapshot: `GET /iserver/marketdata/snapshot?conids={conid}&fields=...`
//! - Historical bars: `GET /iserver/marketdata/history?conid={conid}&period=...&bar=...`
//! - Accounts: `GET /portfolio/accounts`, `/portfolio/{id}/summary`, `/portfolio/{id}/positions/0`
//! - Search: `GET /iserver/secdef/search?symbol={pattern}`
//!
//! The first snapshot request for a contract only opens the market data
//! line; values arrive on subsequent requests, so snapshots are polled until
//! a price shows up or the poll budget is spent.

mod models;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use log::{debug, info, warn};
use num_traits::ToPrimitive;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use urlencoding::encode;

use crate::config::IbkrConfig;
use crate::errors::MarketDataError;
use crate::models::{
    normalize_bars, validate_symbol, AccountSummary, AccountValue, Bar, ContractMatch,
    HistoricalSeries, HistoryRequest, Period, Position, Quote, QuoteRequest, Timeframe,
    WhatToShow,
};
use crate::provider::{
    map_request_error, normalize_book, with_timeout, Capability, MarketDataProvider,
    ProviderCapabilities,
};

use self::models::{
    AuthStatus, ErrorBody, HistoryResponse, PortfolioAccount, PositionRow, SearchRow,
    SnapshotRow, StocksResponse, SummaryResponse, FIELD_ASK, FIELD_BID, FIELD_CHANGE,
    FIELD_CHANGE_PCT, FIELD_LAST, FIELD_VOLUME, FIELD_VOLUME_FORMATTED, SNAPSHOT_FIELDS,
};

const PROVIDER_ID: &str = "IBKR";

const CAPABILITIES: &[Capability] = &[
    Capability::Quotes,
    Capability::HistoricalData,
    Capability::AccountData,
    Capability::Search,
];

/// Transport-level ceiling; callers' per-call timeouts are normally shorter.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Snapshot polls before concluding there is no live data.
const SNAPSHOT_POLLS: usize = 5;
const SNAPSHOT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// IBKR gateway provider.
///
/// One instance owns one gateway session; it is opened on first use and
/// closed by [`disconnect`](MarketDataProvider::disconnect).
///
/// # Example
///
/// ```ignore
/// let ibkr = IbkrProvider::new(&IbkrConfig::paper())?;
/// let quote = ibkr.get_quote(&QuoteRequest::new("AAPL")).await?;
/// ```
pub struct IbkrProvider {
    client: Client,
    base_url: String,
    client_id: u32,
    connected: Mutex<bool>,
}

impl IbkrProvider {
    /// Create a provider; no I/O happens until the first call.
    pub fn new(config: &IbkrConfig) -> Result<Self, MarketDataError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| MarketDataError::Config(format!("cannot build IBKR client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url(),
            client_id: config.client_id,
            connected: Mutex::new(false),
        })
    }

    pub fn client_id(&self) -> u32 {
        self.client_id
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Map a non-success status to the error taxonomy, keeping the body text.
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, MarketDataError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.error)
            .unwrap_or_else(|| format!("HTTP error: {} {}", status, body.trim()));

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(MarketDataError::Connection {
                provider: PROVIDER_ID.to_string(),
                message,
            }),
            _ => Err(MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message,
            }),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, MarketDataError> {
        let response = self
            .client
            .get(self.url(path))
            .query(query)
            .send()
            .await
            .map_err(|e| map_request_error(PROVIDER_ID, e, REQUEST_TIMEOUT))?;

        Self::check_status(response)
            .await?
            .json::<T>()
            .await
            .map_err(|e| MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: format!("Failed to parse response from {}: {}", path, e),
            })
    }

    async fn auth_status(&self) -> Result<AuthStatus, MarketDataError> {
        self.get_json("/iserver/auth/status", &[]).await
    }

    /// Open the gateway session unless it is already open.
    async fn ensure_connected(&self) -> Result<(), MarketDataError> {
        let mut connected = self.connected.lock().await;
        if *connected {
            return Ok(());
        }

        let status = self.auth_status().await?;
        if !status.authenticated {
            let detail = status
                .message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "gateway session is not authenticated".to_string());
            warn!(
                "IBKR gateway at {} rejected client {}: {}",
                self.base_url, self.client_id, detail
            );
            return Err(MarketDataError::Connection {
                provider: PROVIDER_ID.to_string(),
                message: detail,
            });
        }
        if status.competing {
            warn!("IBKR gateway reports a competing session for client {}", self.client_id);
        }

        *connected = true;
        info!(
            "Connected to IBKR at {} (client id {})",
            self.base_url, self.client_id
        );
        Ok(())
    }

    /// Resolve a symbol to a contract id; `None` when the gateway does not know it.
    async fn qualify_contract(
        &self,
        symbol: &str,
        exchange: &str,
        currency: &str,
    ) -> Result<Option<i64>, MarketDataError> {
        let symbol = symbol.trim().to_uppercase();
        let stocks: StocksResponse = self
            .get_json("/trsrv/stocks", &[("symbols", symbol.clone())])
            .await?;

        let contracts: Vec<_> = stocks
            .get(&symbol)
            .into_iter()
            .flatten()
            .flat_map(|entry| entry.contracts.iter())
            .collect();

        let chosen = if exchange.eq_ignore_ascii_case("SMART") {
            let want_us = currency.eq_ignore_ascii_case("USD");
            contracts
                .iter()
                .find(|c| c.is_us == want_us)
                .or_else(|| contracts.first())
        } else {
            contracts.iter().find(|c| {
                c.exchange
                    .as_deref()
                    .is_some_and(|e| e.eq_ignore_ascii_case(exchange))
            })
        };

        match chosen {
            Some(contract) => {
                debug!("IBKR qualified {} on {} as conid {}", symbol, exchange, contract.conid);
                Ok(Some(contract.conid))
            }
            None => {
                debug!("IBKR could not qualify {} on {} ({})", symbol, exchange, currency);
                Ok(None)
            }
        }
    }

    async fn fetch_quote(&self, request: &QuoteRequest) -> Result<Option<Quote>, MarketDataError> {
        self.ensure_connected().await?;

        let conid = match self
            .qualify_contract(&request.symbol, &request.exchange, &request.currency)
            .await?
        {
            Some(conid) => conid,
            None => return Ok(None),
        };

        for attempt in 0..SNAPSHOT_POLLS {
            let rows: Vec<SnapshotRow> = self
                .get_json(
                    "/iserver/marketdata/snapshot",
                    &[
                        ("conids", conid.to_string()),
                        ("fields", SNAPSHOT_FIELDS.to_string()),
                    ],
                )
                .await?;

            if let Some(row) = rows.iter().find(|r| r.conid.map_or(true, |c| c == conid)) {
                if let Some(quote) = snapshot_to_quote(&request.symbol, row)? {
                    return Ok(Some(quote));
                }
            }

            debug!(
                "IBKR snapshot for {} has no price yet (attempt {})",
                request.symbol,
                attempt + 1
            );
            if attempt + 1 < SNAPSHOT_POLLS {
                tokio::time::sleep(SNAPSHOT_POLL_INTERVAL).await;
            }
        }

        warn!("No market data received for {} from IBKR", request.symbol);
        Ok(None)
    }

    async fn fetch_history(
        &self,
        request: &HistoryRequest,
    ) -> Result<Option<HistoricalSeries>, MarketDataError> {
        self.ensure_connected().await?;

        let conid = match self
            .qualify_contract(&request.symbol, &request.exchange, &request.currency)
            .await?
        {
            Some(conid) => conid,
            None => return Ok(None),
        };

        let history: HistoryResponse = self
            .get_json(
                "/iserver/marketdata/history",
                &[
                    ("conid", conid.to_string()),
                    ("period", period_param(request.period).to_string()),
                    ("bar", bar_param(request.timeframe).to_string()),
                    ("source", source_param(request.what_to_show).to_string()),
                    ("outsideRth", "false".to_string()),
                ],
            )
            .await?;

        let bars = normalize_bars(history.data.iter().filter_map(to_bar).collect());
        if bars.is_empty() {
            warn!("No historical data received for {} from IBKR", request.symbol);
            return Ok(None);
        }

        HistoricalSeries::new(
            &request.symbol,
            request.period,
            request.timeframe,
            bars,
            PROVIDER_ID,
        )
        .map(Some)
    }

    async fn primary_account(&self) -> Result<String, MarketDataError> {
        let accounts: Vec<PortfolioAccount> = self.get_json("/portfolio/accounts", &[]).await?;
        accounts
            .into_iter()
            .next()
            .map(|a| a.id)
            .ok_or_else(|| MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: "no managed accounts on this session".to_string(),
            })
    }

    async fn fetch_account_summary(&self) -> Result<AccountSummary, MarketDataError> {
        self.ensure_connected().await?;
        let account_id = self.primary_account().await?;
        let raw: SummaryResponse = self
            .get_json(&format!("/portfolio/{}/summary", encode(&account_id)), &[])
            .await?;

        let values = raw
            .into_iter()
            .filter(|(_, v)| !v.is_null)
            .filter_map(|(tag, v)| {
                let value = v
                    .value
                    .filter(|s| !s.is_empty())
                    .or_else(|| v.amount.map(|a| a.to_string()))?;
                Some((
                    tag,
                    AccountValue {
                        value,
                        currency: v.currency,
                    },
                ))
            })
            .collect();

        Ok(AccountSummary { account_id, values })
    }

    async fn fetch_positions(&self) -> Result<Vec<Position>, MarketDataError> {
        self.ensure_connected().await?;
        let account_id = self.primary_account().await?;
        let rows: Vec<PositionRow> = self
            .get_json(&format!("/portfolio/{}/positions/0", encode(&account_id)), &[])
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| Position {
                account_id: row.acct_id.unwrap_or_else(|| account_id.clone()),
                symbol: row.ticker.or(row.contract_desc).unwrap_or_default(),
                quantity: decimal(row.position).unwrap_or_default(),
                avg_cost: row.avg_cost.and_then(decimal),
                market_value: row.mkt_value.and_then(decimal),
                unrealized_pnl: row.unrealized_pnl.and_then(decimal),
                asset_class: row.asset_class.unwrap_or_default(),
                currency: row.currency,
            })
            .collect())
    }

    async fn fetch_contract_matches(
        &self,
        pattern: &str,
    ) -> Result<Vec<ContractMatch>, MarketDataError> {
        self.ensure_connected().await?;
        let rows: Vec<SearchRow> = self
            .get_json("/iserver/secdef/search", &[("symbol", pattern.trim().to_string())])
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let contract_id = row.conid();
                Some(ContractMatch {
                    symbol: row.symbol?,
                    name: row.company_name.unwrap_or_default(),
                    exchange: row.description.unwrap_or_default(),
                    sec_types: row.sections.into_iter().map(|s| s.sec_type).collect(),
                    contract_id,
                })
            })
            .collect())
    }
}

#[async_trait]
impl MarketDataProvider for IbkrProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::new(CAPABILITIES)
    }

    async fn connect(&self) -> Result<(), MarketDataError> {
        self.ensure_connected().await
    }

    async fn disconnect(&self) -> Result<(), MarketDataError> {
        let mut connected = self.connected.lock().await;
        if !*connected {
            return Ok(());
        }

        // The session stays marked open until the gateway confirms the logout.
        let response = self
            .client
            .post(self.url("/logout"))
            .send()
            .await
            .map_err(|e| map_request_error(PROVIDER_ID, e, REQUEST_TIMEOUT))?;
        Self::check_status(response).await?;
        *connected = false;
        info!("Disconnected from IBKR (client id {})", self.client_id);
        Ok(())
    }

    async fn get_quote(&self, request: &QuoteRequest) -> Result<Option<Quote>, MarketDataError> {
        request.validate()?;
        with_timeout(PROVIDER_ID, request.timeout, self.fetch_quote(request)).await
    }

    async fn get_historical_data(
        &self,
        request: &HistoryRequest,
    ) -> Result<Option<HistoricalSeries>, MarketDataError> {
        request.validate()?;
        with_timeout(PROVIDER_ID, request.timeout, self.fetch_history(request)).await
    }

    /// Checks the gateway's auth status without touching market data lines.
    async fn probe(&self, timeout: Duration) -> Result<(), MarketDataError> {
        with_timeout(PROVIDER_ID, timeout, self.ensure_connected()).await
    }

    async fn get_account_summary(
        &self,
        timeout: Duration,
    ) -> Result<AccountSummary, MarketDataError> {
        with_timeout(PROVIDER_ID, timeout, self.fetch_account_summary()).await
    }

    async fn get_positions(&self, timeout: Duration) -> Result<Vec<Position>, MarketDataError> {
        with_timeout(PROVIDER_ID, timeout, self.fetch_positions()).await
    }

    async fn search_contracts(
        &self,
        pattern: &str,
        timeout: Duration,
    ) -> Result<Vec<ContractMatch>, MarketDataError> {
        validate_symbol(pattern)?;
        with_timeout(PROVIDER_ID, timeout, self.fetch_contract_matches(pattern)).await
    }
}

/// Build a quote from a snapshot row; `None` while the row carries no price.
fn snapshot_to_quote(symbol: &str, row: &SnapshotRow) -> Result<Option<Quote>, MarketDataError> {
    let (bid, ask) = normalize_book(PROVIDER_ID, symbol, row.price(FIELD_BID), row.price(FIELD_ASK));

    let last = row.price(FIELD_LAST).filter(|p| *p > Decimal::ZERO);
    let price = match (last, bid, ask) {
        (Some(last), _, _) => last,
        (None, Some(bid), Some(ask)) => (bid + ask) / Decimal::TWO,
        _ => return Ok(None),
    };

    let volume = row
        .field(FIELD_VOLUME)
        .or_else(|| row.field(FIELD_VOLUME_FORMATTED))
        .and_then(models::parse_volume)
        .unwrap_or(0);

    let mut builder = Quote::builder(symbol, price, PROVIDER_ID)
        .bid(bid)
        .ask(ask)
        .volume(volume)
        .change(row.price(FIELD_CHANGE))
        .change_percent(row.price(FIELD_CHANGE_PCT));
    if let Some(ts) = row.updated.and_then(millis_to_utc) {
        builder = builder.timestamp(ts);
    }
    builder.build().map(Some)
}

fn to_bar(raw: &models::HistoryBar) -> Option<Bar> {
    let timestamp = match millis_to_utc(raw.t) {
        Some(ts) => ts,
        None => {
            warn!("Skipping IBKR bar with invalid timestamp {}", raw.t);
            return None;
        }
    };
    Some(Bar {
        timestamp,
        open: decimal(raw.o)?,
        high: decimal(raw.h)?,
        low: decimal(raw.l)?,
        close: decimal(raw.c)?,
        volume: raw.v.max(0.0).to_u64().unwrap_or(0),
    })
}

fn decimal(value: f64) -> Option<Decimal> {
    Decimal::from_f64_retain(value).map(|d| d.round_dp(8).normalize())
}

fn millis_to_utc(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Gateway `period` parameter: `m` is months, `min` minutes.
fn period_param(period: Period) -> &'static str {
    match period {
        Period::OneDay => "1d",
        Period::FiveDays => "5d",
        Period::OneWeek => "1w",
        Period::OneMonth => "1m",
        Period::ThreeMonths => "3m",
        Period::SixMonths => "6m",
        Period::OneYear => "1y",
        Period::TwoYears => "2y",
    }
}

fn bar_param(timeframe: Timeframe) -> &'static str {
    match timeframe {
        Timeframe::OneMinute => "1min",
        Timeframe::FiveMinutes => "5min",
        Timeframe::FifteenMinutes => "15min",
        Timeframe::ThirtyMinutes => "30min",
        Timeframe::OneHour => "1h",
        Timeframe::TwoHours => "2h",
        Timeframe::FourHours => "4h",
        Timeframe::OneDay => "1d",
        Timeframe::OneWeek => "1w",
    }
}

fn source_param(what_to_show: WhatToShow) -> &'static str {
    match what_to_show {
        WhatToShow::Trades => "trades",
        WhatToShow::Midpoint => "midpoint",
        WhatToShow::Bid => "bid",
        WhatToShow::Ask => "ask",
        WhatToShow::BidAsk => "bid_ask",
    }
}
