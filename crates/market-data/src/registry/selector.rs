//! Ordered-probe failover across configured providers.
//!
//! The selector walks its candidates in priority order, probes each with a
//! bounded timeout and returns the first one that answers. A candidate whose
//! probe fails, times out or panics is recorded and skipped; later candidates
//! are never probed once one succeeds. When every candidate fails the caller
//! gets `NoProviderAvailable` with the full, ordered attempt list.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use super::{ProviderAttempt, SelectionReport};
use crate::errors::MarketDataError;
use crate::models::ProviderId;
use crate::provider::{Capability, MarketDataProvider, ProviderLiveness};

/// Default bound on a single liveness probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// The chosen provider plus the diagnostics gathered while choosing it.
pub struct Selection {
    pub provider: Arc<dyn MarketDataProvider>,
    pub report: SelectionReport,
}

impl Selection {
    pub fn provider_id(&self) -> &'static str {
        self.provider.id()
    }
}

/// Picks the first reachable provider from a prioritized list.
///
/// The selector holds no state between calls; every selection probes afresh.
/// Re-selecting after a mid-session failure is up to the caller.
pub struct ProviderSelector {
    candidates: Vec<Arc<dyn MarketDataProvider>>,
    probe_timeout: Duration,
}

impl ProviderSelector {
    /// Candidates are tried in the given order.
    pub fn new(candidates: Vec<Arc<dyn MarketDataProvider>>) -> Self {
        Self {
            candidates,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_probe_timeout(mut self, probe_timeout: Duration) -> Self {
        self.probe_timeout = probe_timeout;
        self
    }

    pub fn candidates(&self) -> &[Arc<dyn MarketDataProvider>] {
        &self.candidates
    }

    /// First reachable candidate, regardless of capabilities.
    pub async fn select(&self) -> Result<Selection, MarketDataError> {
        self.select_where(None).await
    }

    /// First reachable candidate that declares `capability`.
    ///
    /// Candidates without it are recorded as skipped and not probed.
    pub async fn select_for(&self, capability: Capability) -> Result<Selection, MarketDataError> {
        self.select_where(Some(capability)).await
    }

    async fn select_where(
        &self,
        capability: Option<Capability>,
    ) -> Result<Selection, MarketDataError> {
        let mut report = SelectionReport::new();

        for provider in &self.candidates {
            let provider_id: ProviderId = Cow::Borrowed(provider.id());

            if let Some(capability) = capability {
                if !provider.capabilities().supports(capability) {
                    debug!(
                        "Provider '{}' does not provide {}, skipping",
                        provider_id, capability
                    );
                    report.record(ProviderAttempt::not_capable(
                        provider_id,
                        format!("no {}", capability),
                    ));
                    continue;
                }
            }

            match provider.as_ref().check_liveness(self.probe_timeout).await {
                Ok(()) => {
                    info!("Selected provider '{}'", provider_id);
                    report.record(ProviderAttempt::reachable(provider_id));
                    return Ok(Selection {
                        provider: Arc::clone(provider),
                        report,
                    });
                }
                Err(reason) => {
                    warn!("Provider '{}' unreachable: {}", provider_id, reason);
                    report.record(ProviderAttempt::unreachable(provider_id, reason));
                }
            }
        }

        warn!("No provider available: {}", report.summary());
        Err(MarketDataError::NoProviderAvailable {
            attempts: report.into_attempts(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::errors::RetryClass;
    use crate::models::{Quote, QuoteRequest};
    use crate::provider::ProviderCapabilities;
    use crate::registry::ProbeState;

    #[derive(Clone, Copy)]
    enum Behavior {
        Up,
        Refuse,
        Hang,
        Panic,
    }

    struct MockProvider {
        id: &'static str,
        capabilities: &'static [Capability],
        behavior: Behavior,
        probes: AtomicUsize,
    }

    impl MockProvider {
        fn new(id: &'static str, behavior: Behavior) -> Arc<Self> {
            Self::with_capabilities(id, behavior, &[Capability::Quotes])
        }

        fn with_capabilities(
            id: &'static str,
            behavior: Behavior,
            capabilities: &'static [Capability],
        ) -> Arc<Self> {
            Arc::new(Self {
                id,
                capabilities,
                behavior,
                probes: AtomicUsize::new(0),
            })
        }

        fn probes(&self) -> usize {
            self.probes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MarketDataProvider for MockProvider {
        fn id(&self) -> &'static str {
            self.id
        }

        fn capabilities(&self) -> ProviderCapabilities {
            ProviderCapabilities::new(self.capabilities)
        }

        async fn get_quote(
            &self,
            request: &QuoteRequest,
        ) -> Result<Option<Quote>, MarketDataError> {
            Quote::builder(&request.symbol, dec!(1), self.id)
                .build()
                .map(Some)
        }

        async fn probe(&self, _timeout: Duration) -> Result<(), MarketDataError> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Up => Ok(()),
                Behavior::Refuse => Err(MarketDataError::Connection {
                    provider: self.id.to_string(),
                    message: "connection refused".to_string(),
                }),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(())
                }
                Behavior::Panic => panic!("gateway exploded"),
            }
        }
    }

    fn selector(candidates: &[Arc<MockProvider>]) -> ProviderSelector {
        ProviderSelector::new(
            candidates
                .iter()
                .map(|c| Arc::clone(c) as Arc<dyn MarketDataProvider>)
                .collect(),
        )
        .with_probe_timeout(Duration::from_millis(100))
    }

    #[tokio::test]
    async fn test_selects_first_reachable_and_stops() {
        let a = MockProvider::new("A", Behavior::Refuse);
        let b = MockProvider::new("B", Behavior::Up);
        let c = MockProvider::new("C", Behavior::Up);

        let selection = selector(&[a.clone(), b.clone(), c.clone()])
            .select()
            .await
            .unwrap();

        assert_eq!(selection.provider_id(), "B");
        assert_eq!(a.probes(), 1);
        assert_eq!(b.probes(), 1);
        assert_eq!(c.probes(), 0);
        assert_eq!(selection.report.attempts.len(), 2);
        assert_eq!(selection.report.attempts[0].state, ProbeState::Unreachable);
        assert_eq!(
            selection.report.selected().map(|id| id.as_ref()),
            Some("B")
        );
    }

    #[tokio::test]
    async fn test_exhaustion_lists_attempts_in_order() {
        let a = MockProvider::new("A", Behavior::Refuse);
        let b = MockProvider::new("B", Behavior::Refuse);

        let err = selector(&[a, b]).select().await.err().unwrap();
        assert_eq!(err.retry_class(), RetryClass::Never);

        match err {
            MarketDataError::NoProviderAvailable { attempts } => {
                let ids: Vec<_> = attempts.iter().map(|a| a.provider_id.as_ref()).collect();
                assert_eq!(ids, vec!["A", "B"]);
                assert!(attempts
                    .iter()
                    .all(|a| a.reason.as_deref().unwrap().contains("connection refused")));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_candidate_list() {
        let err = ProviderSelector::new(Vec::new()).select().await.err().unwrap();
        assert_eq!(err.to_string(), "No provider available: no candidates");
    }

    #[tokio::test]
    async fn test_hanging_probe_is_bounded() {
        let slow = MockProvider::new("SLOW", Behavior::Hang);
        let fast = MockProvider::new("FAST", Behavior::Up);

        let started = std::time::Instant::now();
        let selection = selector(&[slow, fast]).select().await.unwrap();

        assert_eq!(selection.provider_id(), "FAST");
        assert!(started.elapsed() < Duration::from_secs(5));
        let reason = selection.report.attempts[0].reason.clone().unwrap();
        assert!(reason.contains("Timeout"));
    }

    #[tokio::test]
    async fn test_panicking_probe_counts_as_unreachable() {
        let broken = MockProvider::new("BROKEN", Behavior::Panic);
        let backup = MockProvider::new("BACKUP", Behavior::Up);

        let selection = selector(&[broken, backup]).select().await.unwrap();

        assert_eq!(selection.provider_id(), "BACKUP");
        let reason = selection.report.attempts[0].reason.clone().unwrap();
        assert!(reason.contains("gateway exploded"));
    }

    #[tokio::test]
    async fn test_selection_agrees_with_is_reachable() {
        // Quotes work for every mock; only the liveness hook differs.
        for behavior in [Behavior::Up, Behavior::Refuse, Behavior::Hang, Behavior::Panic] {
            let provider = MockProvider::new("ONLY", behavior);
            let reachable = provider.is_reachable(Duration::from_millis(100)).await;
            let selected = selector(&[provider]).select().await.is_ok();
            assert_eq!(reachable, selected);
            assert_eq!(reachable, matches!(behavior, Behavior::Up));
        }
    }

    #[tokio::test]
    async fn test_select_for_skips_incapable_without_probing() {
        let quotes_only = MockProvider::new("QUOTES", Behavior::Up);
        let full = MockProvider::with_capabilities(
            "FULL",
            Behavior::Up,
            &[Capability::Quotes, Capability::HistoricalData],
        );

        let selection = selector(&[quotes_only.clone(), full])
            .select_for(Capability::HistoricalData)
            .await
            .unwrap();

        assert_eq!(selection.provider_id(), "FULL");
        assert_eq!(quotes_only.probes(), 0);
        assert_eq!(selection.report.attempts[0].state, ProbeState::NotCapable);
    }

    #[tokio::test]
    async fn test_select_for_with_no_capable_candidate() {
        let quotes_only = MockProvider::new("QUOTES", Behavior::Up);
        let err = selector(&[quotes_only])
            .select_for(Capability::AccountData)
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("QUOTES: SKIPPED (no account data)"));
    }
}
