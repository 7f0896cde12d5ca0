//! Remembered queue positions for departed entrants.
//!
//! Each `remember` schedules a deferred forget on the tokio runtime after the
//! grace window. The deferred forget is fire-and-forget: it is never
//! cancelled, and a newer `remember` for the same identity turns the older
//! timer into a no-op through a generation check. Lookups also compare the
//! entry age against the grace window, so entries expire even when no runtime
//! was available to run the timer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::debug;

use crate::clock::Clock;
use crate::entrant::EntrantId;
use crate::error::QueueError;
use crate::trace::Tracer;

#[derive(Debug, Clone, Copy)]
struct Slot {
    index: usize,
    remembered_at: u64,
    generation: u64,
}

type Slots = Arc<Mutex<HashMap<String, Slot>>>;

/// Time-bounded map from entrant identity to last known queue index
pub struct PositionMemory {
    slots: Slots,
    generation: AtomicU64,
    grace: Duration,
    clock: Arc<dyn Clock>,
    tracer: Tracer,
}

impl PositionMemory {
    pub fn new(grace: Duration, clock: Arc<dyn Clock>, tracer: Tracer) -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
            grace,
            clock,
            tracer,
        }
    }

    /// Store or overwrite the position and schedule its deferred forget
    pub fn remember(&self, id: &EntrantId, index: usize) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let slot = Slot {
            index,
            remembered_at: self.clock.now_millis(),
            generation,
        };
        self.lock().insert(id.key().to_string(), slot);
        self.schedule_forget(id.key().to_string(), generation);
    }

    /// Drop the entry; true iff one existed
    pub fn forget(&self, id: &EntrantId) -> bool {
        self.lock().remove(id.key()).is_some()
    }

    /// Remembered index, if the entry is still inside the grace window
    pub fn lookup(&self, id: &EntrantId) -> Option<usize> {
        let now = self.clock.now_millis();
        let grace = self.grace.as_millis() as u64;

        let mut slots = self.lock();
        let slot = *slots.get(id.key())?;
        if now.saturating_sub(slot.remembered_at) >= grace {
            slots.remove(id.key());
            return None;
        }
        Some(slot.index)
    }

    /// Number of stored entries, including expired ones not yet purged
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn schedule_forget(&self, key: String, generation: u64) {
        let Ok(handle) = Handle::try_current() else {
            self.tracer.trace(format!(
                "No runtime to schedule forgetting {}, expiry is checked on lookup",
                key
            ));
            return;
        };

        let slots = Arc::clone(&self.slots);
        let tracer = self.tracer;
        let deadline = tokio::time::Instant::now() + self.grace;

        handle.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            match purge(&slots, &key, generation) {
                Ok(true) => debug!(key = %key, "Forgot remembered position"),
                Ok(false) => {}
                Err(err) => tracer.swallowed(&err),
            }
        });
    }
}

/// Remove `key` if it still holds the entry written by `generation`
fn purge(slots: &Mutex<HashMap<String, Slot>>, key: &str, generation: u64) -> Result<bool, QueueError> {
    let mut slots = slots
        .lock()
        .map_err(|e| QueueError::memory_cleanup(key, e.to_string()))?;

    match slots.get(key) {
        Some(slot) if slot.generation == generation => {
            slots.remove(key);
            Ok(true)
        }
        _ => Ok(false),
    }
}
