//! Lookup configuration

use std::time::Duration;

/// Timing configuration for lookup coordinators.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use verifield::lookup::LookupConfig;
///
/// let config = LookupConfig::default()
///     .with_debounce(Duration::from_millis(300))
///     .with_request_timeout(Duration::from_secs(5));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupConfig {
    /// Quiescence window after the last qualifying edit before dispatch.
    ///
    /// Default: 500 ms
    pub debounce: Duration,

    /// Upper bound on a single lookup call. A timeout counts as a failed call.
    ///
    /// Default: 10 seconds
    pub request_timeout: Duration,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl LookupConfig {
    /// Creates a new lookup config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the quiescence window.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Sets the per-call timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
