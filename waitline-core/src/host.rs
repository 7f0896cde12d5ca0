//! Capabilities supplied by the host environment.

use std::fmt;

use crate::entrant::EntrantId;
use crate::error::ConnectError;

/// The single backend a queue feeds entrants into
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BackendTarget(String);

impl BackendTarget {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackendTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// User-visible notices delivered to entrants
///
/// Rendering (colors, localisation) belongs to the host; `Display` gives a
/// plain-text default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The entrant left the queue and is being connected
    Sending { target: String },
    /// The backend accepted the entrant
    Sent { target: String },
    /// The backend refused the entrant
    ConnectFailed { target: String, reason: String },
    /// 1-based position among the remaining waiting entrants
    Progress {
        position: usize,
        total: usize,
        target: String,
    },
    /// Cosmetic access tier matched through a capability flag
    AccessTier { label: String },
    QueuePaused,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Sending { target } => write!(f, "Sending you to {}...", target),
            Notice::Sent { target } => write!(f, "You have been sent to {}", target),
            Notice::ConnectFailed { target, reason } => {
                write!(f, "Unable to connect to {}: {}", target, reason)
            }
            Notice::Progress {
                position,
                total,
                target,
            } => write!(
                f,
                "You are currently in position {} of {} for {}",
                position, total, target
            ),
            Notice::AccessTier { label } => write!(f, "{} access activated.", label),
            Notice::QueuePaused => write!(f, "The queue you are currently in is paused"),
        }
    }
}

/// Outcome of a backend admission attempt
pub type ConnectResult = Result<(), ConnectError>;

/// Completion handler for [`Host::connect`], invoked exactly once
pub type ConnectCallback = Box<dyn FnOnce(ConnectResult) + Send + 'static>;

/// Host environment consumed by the queue and dispatcher
///
/// Implementations must not block: `connect` starts the attempt and returns,
/// calling `done` later from any thread.
pub trait Host: Send + Sync {
    /// Configured maximum concurrent occupants of the backend
    fn capacity_of(&self, target: &BackendTarget) -> usize;

    /// Current occupant count of the backend
    fn live_occupancy(&self, target: &BackendTarget) -> usize;

    /// Deliver a notice to an entrant
    fn notify(&self, entrant: &EntrantId, notice: Notice);

    /// Whether the entrant holds a capability flag (access tier lookup only)
    fn has_capability(&self, entrant: &EntrantId, flag: &str) -> bool;

    /// Start an asynchronous admission attempt
    fn connect(&self, entrant: &EntrantId, target: &BackendTarget, done: ConnectCallback);
}
