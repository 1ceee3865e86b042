use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use brokerdata_market_data::{
    Capability, HistoryRequest, MarketDataProvider, Period, ProviderLiveness, ProviderSelector,
    QuoteRequest, Timeframe,
};
use serde_json::{json, Value};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::command::Command;
use crate::config::Config;

pub fn init_tracing() {
    let log_format = std::env::var("BD_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Logs go to stderr so stdout stays valid JSON.
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn required_capability(command: &Command) -> Capability {
    match command {
        Command::History { .. } | Command::Volatility { .. } => Capability::HistoricalData,
        Command::Account | Command::Positions => Capability::AccountData,
        Command::Search { .. } => Capability::Search,
        Command::Quote { .. } | Command::Probe | Command::Help => Capability::Quotes,
    }
}

/// Run `command` against the first suitable provider and return its JSON output.
///
/// The provider session is closed before returning, whatever the outcome.
pub async fn execute(command: &Command, config: &Config) -> Result<Value> {
    let providers = config.providers.build_providers()?;
    if *command == Command::Probe {
        return Ok(probe_all(&providers, config.probe_timeout).await);
    }

    let selection = ProviderSelector::new(providers)
        .with_probe_timeout(config.probe_timeout)
        .select_for(required_capability(command))
        .await?;
    tracing::debug!("Selection: {}", selection.report.summary());

    let provider = Arc::clone(&selection.provider);
    let result = run_on(provider.as_ref(), command, config).await;
    if let Err(e) = provider.disconnect().await {
        tracing::warn!("Failed to disconnect from {}: {}", provider.id(), e);
    }

    Ok(json!({
        "provider": provider.id(),
        "data": result?,
    }))
}

async fn run_on(
    provider: &dyn MarketDataProvider,
    command: &Command,
    config: &Config,
) -> Result<Value> {
    let value = match command {
        Command::Quote { symbols } => {
            let template = QuoteRequest::new("").with_timeout(config.request_timeout);
            let batch = provider.get_quotes(symbols, &template).await?;
            serde_json::to_value(batch)?
        }
        Command::History {
            symbol,
            period,
            timeframe,
        } => {
            let request =
                HistoryRequest::parse(symbol, period, timeframe)?.with_timeout(config.request_timeout);
            serde_json::to_value(provider.get_historical_data(&request).await?)?
        }
        Command::Volatility { symbol, period } => {
            let period: Period = period.parse()?;
            let request = HistoryRequest::new(symbol, period, Timeframe::OneDay)
                .with_timeout(config.request_timeout);
            match provider.get_historical_data(&request).await? {
                Some(series) => json!({
                    "symbol": series.symbol(),
                    "period": series.period(),
                    "bars": series.len(),
                    "latest_price": series.latest_price(),
                    "annualized_volatility": series.annualized_volatility(),
                }),
                None => Value::Null,
            }
        }
        Command::Account => {
            serde_json::to_value(provider.get_account_summary(config.request_timeout).await?)?
        }
        Command::Positions => {
            serde_json::to_value(provider.get_positions(config.request_timeout).await?)?
        }
        Command::Search { pattern } => serde_json::to_value(
            provider
                .search_contracts(pattern, config.request_timeout)
                .await?,
        )?,
        Command::Probe | Command::Help => Value::Null,
    };
    Ok(value)
}

/// Probe every configured provider, not just the first reachable one.
async fn probe_all(providers: &[Arc<dyn MarketDataProvider>], timeout: Duration) -> Value {
    let mut report = Vec::with_capacity(providers.len());
    for provider in providers {
        let outcome = provider.check_liveness(timeout).await;
        if let Err(e) = provider.disconnect().await {
            tracing::debug!("Disconnect after probe failed for {}: {}", provider.id(), e);
        }
        report.push(json!({
            "provider": provider.id(),
            "capabilities": provider.capabilities(),
            "reachable": outcome.is_ok(),
            "reason": outcome.err(),
        }));
    }
    Value::Array(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use brokerdata_market_data::{
        IbkrConfig, MarketDataError, ProviderCapabilities, ProviderKind, ProvidersConfig, Quote,
    };
    use std::sync::Mutex;

    /// Records the timeout of every quote request it receives.
    #[derive(Default)]
    struct RecordingProvider {
        timeouts: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl MarketDataProvider for RecordingProvider {
        fn id(&self) -> &'static str {
            "RECORDING"
        }

        fn capabilities(&self) -> ProviderCapabilities {
            ProviderCapabilities::new(&[Capability::Quotes])
        }

        async fn get_quote(
            &self,
            request: &QuoteRequest,
        ) -> Result<Option<Quote>, MarketDataError> {
            if let Ok(mut timeouts) = self.timeouts.lock() {
                timeouts.push(request.timeout);
            }
            Ok(None)
        }
    }

    fn offline_config() -> Config {
        Config {
            providers: ProvidersConfig {
                ibkr: Some(IbkrConfig::default().with_base_url("http://127.0.0.1:9/v1/api")),
                tastytrade: None,
                order: vec![ProviderKind::Ibkr],
            },
            probe_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(2),
        }
    }

    #[test]
    fn test_required_capability() {
        assert_eq!(
            required_capability(&Command::Account),
            Capability::AccountData
        );
        assert_eq!(
            required_capability(&Command::Search {
                pattern: "AA".to_string()
            }),
            Capability::Search
        );
        assert_eq!(
            required_capability(&Command::Volatility {
                symbol: "SPY".to_string(),
                period: "1Y".to_string()
            }),
            Capability::HistoricalData
        );
    }

    #[tokio::test]
    async fn test_quote_uses_configured_request_timeout() {
        let provider = RecordingProvider::default();
        let config = offline_config();
        let command = Command::Quote {
            symbols: vec!["AAPL".to_string(), "MSFT".to_string()],
        };

        let output = run_on(&provider, &command, &config).await.unwrap();
        assert_eq!(output["missing"], json!(["AAPL", "MSFT"]));
        assert_eq!(
            *provider.timeouts.lock().unwrap(),
            vec![config.request_timeout; 2]
        );
    }

    #[tokio::test]
    async fn test_probe_reports_unreachable_provider() {
        let output = execute(&Command::Probe, &offline_config()).await.unwrap();
        let entries = output.as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["provider"], "IBKR");
        assert_eq!(entries[0]["reachable"], false);
        assert!(entries[0]["reason"].as_str().unwrap().contains("IBKR"));
    }

    #[tokio::test]
    async fn test_quote_without_reachable_provider_fails() {
        let command = Command::Quote {
            symbols: vec!["AAPL".to_string()],
        };
        let err = execute(&command, &offline_config()).await.unwrap_err();
        assert!(err.to_string().contains("No provider available"));
    }
}
