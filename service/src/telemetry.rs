//! Telemetry sink for exceptional cache-bypass events.
//!
//! Fire-and-forget counters: implementations must never block or fail
//! the caller.

pub trait TelemetryReporter: Send + Sync {
    /// A cache-bypass request was rejected by the rate limiter.
    fn inc_rate_limit(&self);

    /// A cache-bypass request timed out waiting on the refresh loop.
    fn inc_timeout(&self);
}

/// Drops all events. Useful for callers that have no metrics pipeline.
pub struct NoopTelemetryReporter;

impl TelemetryReporter for NoopTelemetryReporter {
    fn inc_rate_limit(&self) {}
    fn inc_timeout(&self) {}
}
