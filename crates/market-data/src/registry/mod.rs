//! Provider selection.
//!
//! This module picks a working provider out of a prioritized list:
//! - Ordered liveness probing with a bounded timeout per candidate
//! - Capability filtering for operations only some providers offer
//! - Per-candidate diagnostics carried by `NoProviderAvailable`

mod diagnostics;
mod selector;

pub use diagnostics::{ProbeState, ProviderAttempt, SelectionReport};
pub use selector::{ProviderSelector, Selection, DEFAULT_PROBE_TIMEOUT};
