//! Configuration for a waiting line.

use std::time::Duration;

/// Cosmetic access tier announced with progress updates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessTier {
    /// Capability flag checked through the host
    pub flag: String,
    /// Label shown to the entrant
    pub label: String,
}

impl AccessTier {
    pub fn new(flag: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            flag: flag.into(),
            label: label.into(),
        }
    }
}

/// Configuration for a single queue
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Minimum time between two successful admissions
    pub send_interval: Duration,

    /// Number of front positions immune to priority placement
    pub protected_slots: usize,

    /// How long a departed entrant's position is remembered
    pub position_grace: Duration,

    /// Progress updates are only broadcast when the last successful
    /// admission is older than this
    pub progress_quiet_period: Duration,

    /// Enable diagnostic tracing
    pub debug: bool,

    /// Access tiers, checked in order; the first held flag wins
    pub access_tiers: Vec<AccessTier>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            send_interval: Duration::from_millis(500),
            protected_slots: 5,
            position_grace: Duration::from_secs(15 * 60),
            progress_quiet_period: Duration::from_millis(3000),
            debug: false,
            access_tiers: vec![
                AccessTier::new("queue.priority.staff", "Staff"),
                AccessTier::new("queue.priority.donator3", "Blue donator"),
                AccessTier::new("queue.priority.donator2", "Purple donator"),
                AccessTier::new("queue.priority.donator", "Yellow donator"),
                AccessTier::new("queue.priority.priority", "Priority"),
            ],
        }
    }
}

impl QueueConfig {
    /// Create config for a small backend that should fill quickly
    pub fn fast_drain() -> Self {
        Self {
            send_interval: Duration::from_millis(250),
            protected_slots: 3,
            position_grace: Duration::from_secs(5 * 60),
            progress_quiet_period: Duration::from_millis(1500),
            ..Self::default()
        }
    }

    /// Create config for a crowded launch (many entrants, slow joins)
    pub fn event_rush() -> Self {
        Self {
            send_interval: Duration::from_secs(1),
            protected_slots: 10,
            position_grace: Duration::from_secs(30 * 60),
            progress_quiet_period: Duration::from_secs(5),
            ..Self::default()
        }
    }

    /// Create config from environment variables
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Override fields from environment variables, keeping the rest
    pub fn with_env_overrides(self) -> Self {
        let mut config = self;

        if let Ok(val) = std::env::var("WAITLINE_SEND_INTERVAL_MS") {
            if let Ok(n) = val.parse() {
                config.send_interval = Duration::from_millis(n);
            }
        }

        if let Ok(val) = std::env::var("WAITLINE_PROTECTED_SLOTS") {
            if let Ok(n) = val.parse() {
                config.protected_slots = n;
            }
        }

        if let Ok(val) = std::env::var("WAITLINE_POSITION_GRACE_SECS") {
            if let Ok(n) = val.parse() {
                config.position_grace = Duration::from_secs(n);
            }
        }

        if let Ok(val) = std::env::var("WAITLINE_PROGRESS_QUIET_MS") {
            if let Ok(n) = val.parse() {
                config.progress_quiet_period = Duration::from_millis(n);
            }
        }

        if let Ok(val) = std::env::var("WAITLINE_DEBUG") {
            config.debug = val == "1" || val.to_lowercase() == "true";
        }

        config
    }

    /// Toggle diagnostic tracing
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// First access tier whose flag the entrant holds
    pub fn access_tier_for(&self, mut holds: impl FnMut(&str) -> bool) -> Option<&AccessTier> {
        self.access_tiers.iter().find(|tier| holds(&tier.flag))
    }
}
