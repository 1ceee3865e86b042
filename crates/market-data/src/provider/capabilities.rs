//! Provider capability declarations.
//!
//! A provider's capabilities are plain data so that callers and the selector
//! can ask "can this provider do X" without knowing the concrete type.

use std::fmt;

use serde::Serialize;

/// One operation a provider may support.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Real-time quote snapshots.
    Quotes,
    /// Historical OHLCV bars.
    HistoricalData,
    /// Account summary and positions.
    AccountData,
    /// Contract/symbol search.
    Search,
}

impl Capability {
    /// Human-readable operation name used in `NotSupported` errors.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Quotes => "quotes",
            Self::HistoricalData => "historical data",
            Self::AccountData => "account data",
            Self::Search => "contract search",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.operation())
    }
}

/// Set of operations a provider supports.
///
/// Declared statically per provider type; querying it performs no I/O.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProviderCapabilities {
    supported: &'static [Capability],
}

impl ProviderCapabilities {
    pub const fn new(supported: &'static [Capability]) -> Self {
        Self { supported }
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.supported.contains(&capability)
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.supported.iter().copied()
    }
}

impl Serialize for ProviderCapabilities {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.supported.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUOTES_ONLY: ProviderCapabilities = ProviderCapabilities::new(&[Capability::Quotes]);

    #[test]
    fn test_supports() {
        assert!(QUOTES_ONLY.supports(Capability::Quotes));
        assert!(!QUOTES_ONLY.supports(Capability::HistoricalData));
        assert!(!QUOTES_ONLY.supports(Capability::AccountData));
    }

    #[test]
    fn test_iter_preserves_declaration_order() {
        let caps = ProviderCapabilities::new(&[Capability::HistoricalData, Capability::Quotes]);
        let listed: Vec<_> = caps.iter().collect();
        assert_eq!(listed, vec![Capability::HistoricalData, Capability::Quotes]);
    }

    #[test]
    fn test_serializes_as_list() {
        let json = serde_json::to_string(&QUOTES_ONLY).unwrap();
        assert_eq!(json, "[\"quotes\"]");
    }

    #[test]
    fn test_operation_names() {
        assert_eq!(Capability::HistoricalData.to_string(), "historical data");
        assert_eq!(Capability::Search.operation(), "contract search");
    }
}
