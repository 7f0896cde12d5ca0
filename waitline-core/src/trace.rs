//! Injected diagnostic tracing.
//!
//! Queue diagnostics (placement decisions, swallowed cleanup failures) are
//! only emitted when the queue was configured with `debug = true`. Output goes
//! through `tracing` under the `waitline::trace` target, so writing a trace can
//! never fail the caller.

use tracing::{debug, warn};

use crate::error::QueueError;

/// `tracing` target for diagnostic output
pub const TRACE_TARGET: &str = "waitline::trace";

/// Debug-gated diagnostic sink
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tracer {
    enabled: bool,
}

impl Tracer {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Emit a free-form diagnostic line
    pub fn trace(&self, message: impl AsRef<str>) {
        if self.enabled {
            debug!(target: TRACE_TARGET, "{}", message.as_ref());
        }
    }

    /// Report an error that was swallowed on purpose
    pub fn swallowed(&self, error: &QueueError) {
        if self.enabled {
            warn!(target: TRACE_TARGET, error = %error, "Ignoring background failure, this is probably fine");
        }
    }
}
