//! Waiting entrants and their identities.

use std::fmt;
use std::hash::{Hash, Hasher};

/// Priority weight meaning "no priority"
pub const NO_PRIORITY: i32 = -1;

/// Case-insensitive identity of an entrant
///
/// The display name is kept as given; equality and hashing use the
/// lowercase key.
#[derive(Debug, Clone)]
pub struct EntrantId {
    name: String,
    key: String,
}

impl EntrantId {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let key = name.to_lowercase();
        Self { name, key }
    }

    /// Name as supplied by the host
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lowercase key used for lookups
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl PartialEq for EntrantId {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for EntrantId {}

impl Hash for EntrantId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for EntrantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<&str> for EntrantId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for EntrantId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// A client waiting for admission
///
/// Its index is not stored: it is the entrant's position in the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entrant {
    id: EntrantId,
    priority: i32,
}

impl Entrant {
    /// Create an entrant with the given priority weight
    pub fn new(id: impl Into<EntrantId>, priority: i32) -> Self {
        Self {
            id: id.into(),
            priority,
        }
    }

    /// Create an entrant without priority
    pub fn without_priority(id: impl Into<EntrantId>) -> Self {
        Self::new(id, NO_PRIORITY)
    }

    pub fn id(&self) -> &EntrantId {
        &self.id
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Whether priority placement applies to this entrant
    pub fn has_priority(&self) -> bool {
        self.priority != NO_PRIORITY
    }
}
