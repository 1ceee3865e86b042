/// Classification for retry policy.
///
/// Tells calling code how to react to a failed provider call.
///
/// # Behavior Summary
///
/// | Class | Retry same provider? | Select another provider? |
/// |-------|----------------------|--------------------------|
/// | `Never` | No | No |
/// | `Retry` | Yes (longer timeout) | Optional |
/// | `Reselect` | Yes | Yes |
/// | `SkipProvider` | No (permanent) | Yes |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Never retry - malformed input, bad configuration, or an unmapped failure.
    /// The request is fundamentally invalid and retrying won't help.
    Never,

    /// The call exceeded the caller's deadline.
    ///
    /// The same provider may be asked again, typically with a longer timeout.
    Retry,

    /// The session to the external source could not be established or was lost.
    ///
    /// Retry later, or run provider selection again to fail over.
    Reselect,

    /// The operation is outside the provider's declared capability set.
    ///
    /// This is permanent for that provider; never retry against it.
    SkipProvider,
}
