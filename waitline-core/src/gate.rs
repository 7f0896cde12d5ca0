//! Admission gate: may the queue release its head entrant now?
//!
//! The gate is a pure predicate over a [`GateInputs`] snapshot. All four
//! conditions must hold for a send:
//!
//! - the queue is not paused
//! - someone is waiting
//! - the backend has a free slot (`live < capacity`)
//! - at least `min_interval` passed since the last successful admission

use std::fmt;
use std::time::Duration;

/// Why the head entrant cannot be released
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    Paused,
    Empty,
    AtCapacity { live: usize, capacity: usize },
    RateLimited { wait_ms: u64 },
    /// A previous admission attempt has not reported back yet
    SendInFlight,
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockReason::Paused => write!(f, "queue is paused"),
            BlockReason::Empty => write!(f, "nobody is waiting"),
            BlockReason::AtCapacity { live, capacity } => {
                write!(f, "backend is full ({}/{})", live, capacity)
            }
            BlockReason::RateLimited { wait_ms } => {
                write!(f, "rate limited for another {}ms", wait_ms)
            }
            BlockReason::SendInFlight => write!(f, "an admission is already in flight"),
        }
    }
}

/// Snapshot of everything the gate reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateInputs {
    pub paused: bool,
    pub waiting: usize,
    pub live: usize,
    pub capacity: usize,
    /// Last successful admission in wall-clock millis (0 = never)
    pub last_sent_ms: u64,
    pub now_ms: u64,
}

/// Pause, capacity and rate predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionGate {
    min_interval: Duration,
}

impl AdmissionGate {
    pub fn new(min_interval: Duration) -> Self {
        Self { min_interval }
    }

    /// Check every condition, reporting the first one that blocks
    pub fn check(&self, inputs: &GateInputs) -> Result<(), BlockReason> {
        if inputs.paused {
            return Err(BlockReason::Paused);
        }
        if inputs.waiting == 0 {
            return Err(BlockReason::Empty);
        }
        if inputs.live >= inputs.capacity {
            return Err(BlockReason::AtCapacity {
                live: inputs.live,
                capacity: inputs.capacity,
            });
        }

        let interval = self.min_interval.as_millis() as u64;
        let elapsed = inputs.now_ms.saturating_sub(inputs.last_sent_ms);
        if elapsed < interval {
            return Err(BlockReason::RateLimited {
                wait_ms: interval - elapsed,
            });
        }

        Ok(())
    }

    pub fn allows(&self, inputs: &GateInputs) -> bool {
        self.check(inputs).is_ok()
    }
}
