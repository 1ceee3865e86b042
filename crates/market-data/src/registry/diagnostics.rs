//! Probe outcome tracking for provider selection diagnostics.

use std::fmt;

use serde::Serialize;

use crate::models::ProviderId;

/// Outcome of considering one candidate during selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeState {
    /// Probe succeeded; the candidate was selected.
    Reachable,
    /// Probe failed, timed out or panicked.
    Unreachable,
    /// Candidate lacks the required capability and was not probed.
    NotCapable,
}

/// Record of a single candidate considered during selection.
#[derive(Clone, Debug, Serialize)]
pub struct ProviderAttempt {
    pub provider_id: ProviderId,
    pub state: ProbeState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ProviderAttempt {
    pub fn reachable(provider_id: impl Into<ProviderId>) -> Self {
        Self {
            provider_id: provider_id.into(),
            state: ProbeState::Reachable,
            reason: None,
        }
    }

    pub fn unreachable(provider_id: impl Into<ProviderId>, reason: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            state: ProbeState::Unreachable,
            reason: Some(reason.into()),
        }
    }

    pub fn not_capable(provider_id: impl Into<ProviderId>, reason: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            state: ProbeState::NotCapable,
            reason: Some(reason.into()),
        }
    }
}

impl fmt::Display for ProviderAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.state {
            ProbeState::Reachable => "REACHABLE",
            ProbeState::Unreachable => "UNREACHABLE",
            ProbeState::NotCapable => "SKIPPED",
        };
        match &self.reason {
            Some(reason) => write!(f, "{}: {} ({})", self.provider_id, label, reason),
            None => write!(f, "{}: {}", self.provider_id, label),
        }
    }
}

/// Ordered record of every candidate considered by one selection.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SelectionReport {
    pub attempts: Vec<ProviderAttempt>,
}

impl SelectionReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, attempt: ProviderAttempt) {
        self.attempts.push(attempt);
    }

    /// Summary for logging/debugging.
    pub fn summary(&self) -> String {
        self.attempts
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    /// Id of the selected candidate, if any.
    pub fn selected(&self) -> Option<&ProviderId> {
        self.attempts
            .iter()
            .find(|a| a.state == ProbeState::Reachable)
            .map(|a| &a.provider_id)
    }

    /// Candidates whose probe failed, with the reason.
    pub fn failures(&self) -> Vec<(&ProviderId, &str)> {
        self.attempts
            .iter()
            .filter(|a| a.state == ProbeState::Unreachable)
            .map(|a| (&a.provider_id, a.reason.as_deref().unwrap_or_default()))
            .collect()
    }

    pub fn into_attempts(self) -> Vec<ProviderAttempt> {
        self.attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_summary() {
        let mut report = SelectionReport::new();
        report.record(ProviderAttempt::not_capable("TASTYTRADE", "no historical data"));
        report.record(ProviderAttempt::unreachable("IBKR", "Timeout after 5s: IBKR"));
        report.record(ProviderAttempt::reachable("BACKUP"));

        let summary = report.summary();
        assert_eq!(
            summary,
            "TASTYTRADE: SKIPPED (no historical data) -> IBKR: UNREACHABLE (Timeout after 5s: IBKR) -> BACKUP: REACHABLE"
        );
    }

    #[test]
    fn test_selected() {
        let mut report = SelectionReport::new();
        report.record(ProviderAttempt::unreachable("IBKR", "refused"));
        assert!(report.selected().is_none());

        report.record(ProviderAttempt::reachable("TASTYTRADE"));
        assert_eq!(report.selected().map(|id| id.as_ref()), Some("TASTYTRADE"));
    }

    #[test]
    fn test_failures_exclude_skips() {
        let mut report = SelectionReport::new();
        report.record(ProviderAttempt::not_capable("A", "no quotes"));
        report.record(ProviderAttempt::unreachable("B", "refused"));

        let failures = report.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].1, "refused");
    }

    #[test]
    fn test_attempt_serializes_state() {
        let json = serde_json::to_value(ProviderAttempt::unreachable("IBKR", "refused")).unwrap();
        assert_eq!(json["provider_id"], "IBKR");
        assert_eq!(json["state"], "unreachable");
        assert_eq!(json["reason"], "refused");
    }
}
