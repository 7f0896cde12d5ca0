//! Priority-ordered waiting line for a single backend.
//!
//! The ordered sequence is private: callers can only insert, pop, leave,
//! pause and query, so the ordering and uniqueness invariants hold.
//!
//! # Placement
//!
//! An arriving entrant gets two candidate indices:
//!
//! - **saved**: its remembered position if still inside the queue, else the
//!   back of the line
//! - **priority**: `0` for an empty queue or an entrant without priority,
//!   otherwise the first index at or after the protected zone whose occupant
//!   has a strictly lower weight, else the back of the line
//!
//! The smaller index wins; on a tie the priority placement is reported.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::config::QueueConfig;
use crate::entrant::{Entrant, EntrantId};
use crate::error::QueueError;
use crate::gate::{AdmissionGate, BlockReason, GateInputs};
use crate::host::{BackendTarget, Host};
use crate::memory::PositionMemory;
use crate::metrics::QueueMetrics;
use crate::trace::{Tracer, TRACE_TARGET};

/// Default time between two admissions
pub const TIME_BETWEEN_SENDING: Duration = Duration::from_millis(500);

/// Which policy decided an insertion index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Saved,
    Priority,
}

/// Waiting line feeding exactly one backend target
pub struct WaitQueue {
    target: BackendTarget,
    host: Arc<dyn Host>,
    clock: Arc<dyn Clock>,
    config: QueueConfig,
    gate: AdmissionGate,
    entrants: Mutex<VecDeque<Entrant>>,
    memory: PositionMemory,
    paused: AtomicBool,
    /// An admission attempt is outstanding
    sending: AtomicBool,
    /// Last successful admission in wall-clock millis (0 = never)
    last_sent: AtomicU64,
    metrics: Arc<QueueMetrics>,
    tracer: Tracer,
}

impl WaitQueue {
    pub fn new(
        target: BackendTarget,
        host: Arc<dyn Host>,
        clock: Arc<dyn Clock>,
        config: QueueConfig,
    ) -> Self {
        let tracer = Tracer::new(config.debug);
        let memory = PositionMemory::new(config.position_grace, Arc::clone(&clock), tracer);
        Self {
            target,
            host,
            clock,
            gate: AdmissionGate::new(config.send_interval),
            config,
            entrants: Mutex::new(VecDeque::new()),
            memory,
            paused: AtomicBool::new(false),
            sending: AtomicBool::new(false),
            last_sent: AtomicU64::new(0),
            metrics: Arc::new(QueueMetrics::new()),
            tracer,
        }
    }

    /// Create a queue timed by the system wall clock
    pub fn with_system_clock(target: BackendTarget, host: Arc<dyn Host>, config: QueueConfig) -> Self {
        Self::new(target, host, Arc::new(SystemClock), config)
    }

    pub fn target(&self) -> &BackendTarget {
        &self.target
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<QueueMetrics> {
        &self.metrics
    }

    pub fn memory(&self) -> &PositionMemory {
        &self.memory
    }

    pub(crate) fn host(&self) -> &Arc<dyn Host> {
        &self.host
    }

    pub(crate) fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub(crate) fn tracer(&self) -> Tracer {
        self.tracer
    }

    /// Insert an arriving entrant, returning the index it was placed at
    pub async fn insert(&self, entrant: Entrant) -> Result<usize, QueueError> {
        let mut entrants = self.entrants.lock().await;

        if entrants.iter().any(|e| e.id() == entrant.id()) {
            self.metrics.record_duplicate();
            return Err(QueueError::already_queued(
                entrant.id().name(),
                self.target.name(),
            ));
        }

        let len = entrants.len();
        let remembered = self.memory.lookup(entrant.id());
        let saved_index = remembered.filter(|&index| index < len).unwrap_or(len);
        let priority_index = priority_index(&entrants, &entrant, self.config.protected_slots);

        let (index, placement) = if saved_index < priority_index {
            (saved_index, Placement::Saved)
        } else {
            (priority_index, Placement::Priority)
        };

        if self.tracer.is_enabled() {
            debug!(
                target: TRACE_TARGET,
                entrant = %entrant.id(),
                queue = %self.target,
                index,
                placement = ?placement,
                saved_index,
                priority_index,
                queue_size = len,
                weight = entrant.priority(),
                remembered = remembered.is_some(),
                "Inserted entrant"
            );
        }

        entrants.insert(index, entrant);
        self.metrics.record_inserted(placement, entrants.len());
        Ok(index)
    }

    /// Remove and return the entrant at index 0
    pub async fn pop_head(&self) -> Result<Entrant, QueueError> {
        let mut entrants = self.entrants.lock().await;
        entrants
            .pop_front()
            .ok_or_else(|| QueueError::empty(self.target.name()))
    }

    /// Pop the head and remember it at the front, under one lock
    pub(crate) async fn take_for_dispatch(&self) -> Result<Entrant, QueueError> {
        let mut entrants = self.entrants.lock().await;
        let entrant = entrants
            .pop_front()
            .ok_or_else(|| QueueError::empty(self.target.name()))?;
        self.memory.remember(entrant.id(), 0);
        Ok(entrant)
    }

    /// Remove a waiting entrant (disconnect) and remember where it stood
    pub async fn leave(&self, id: &EntrantId) -> Option<usize> {
        let mut entrants = self.entrants.lock().await;
        let index = entrants.iter().position(|e| e.id() == id)?;
        entrants.remove(index);
        self.memory.remember(id, index);
        self.metrics.record_left();

        debug!(entrant = %id, queue = %self.target, index, "Entrant left queue");
        Some(index)
    }

    /// Drop a remembered position; true iff one existed
    pub fn forget(&self, id: &EntrantId) -> bool {
        self.memory.forget(id)
    }

    pub async fn position_of(&self, id: &EntrantId) -> Option<usize> {
        let entrants = self.entrants.lock().await;
        entrants.iter().position(|e| e.id() == id)
    }

    pub async fn len(&self) -> usize {
        self.entrants.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entrants.lock().await.is_empty()
    }

    /// Snapshot of the waiting entrants in order
    pub async fn waiting(&self) -> Vec<Entrant> {
        let entrants = self.entrants.lock().await;
        entrants.iter().cloned().collect()
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
        debug!(queue = %self.target, paused, "Queue pause state changed");
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Last successful admission in wall-clock millis (0 = never)
    pub fn last_sent(&self) -> u64 {
        self.last_sent.load(Ordering::Acquire)
    }

    pub(crate) fn mark_sent(&self, at_millis: u64) {
        self.last_sent.store(at_millis, Ordering::Release);
    }

    /// Whether an admission attempt is outstanding for this queue
    pub fn is_sending(&self) -> bool {
        self.sending.load(Ordering::Acquire)
    }

    /// Claim the single in-flight slot; false if another send holds it
    pub(crate) fn begin_send(&self) -> bool {
        self.sending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn finish_send(&self) {
        self.sending.store(false, Ordering::Release);
    }

    /// Everything the admission gate reads, captured now
    pub async fn gate_inputs(&self) -> GateInputs {
        GateInputs {
            paused: self.is_paused(),
            waiting: self.len().await,
            live: self.host.live_occupancy(&self.target),
            capacity: self.host.capacity_of(&self.target),
            last_sent_ms: self.last_sent(),
            now_ms: self.clock.now_millis(),
        }
    }

    pub async fn check_gate(&self) -> Result<(), BlockReason> {
        let inputs = self.gate_inputs().await;
        self.gate.check(&inputs)
    }

    /// Whether the head entrant may be sent now
    pub async fn can_send(&self) -> bool {
        self.check_gate().await.is_ok()
    }
}

fn priority_index(entrants: &VecDeque<Entrant>, entrant: &Entrant, protected_slots: usize) -> usize {
    if entrants.is_empty() || !entrant.has_priority() {
        return 0;
    }
    let weight = entrant.priority();

    entrants
        .iter()
        .enumerate()
        .skip(protected_slots)
        .find(|(_, occupant)| occupant.priority() < weight)
        .map(|(index, _)| index)
        .unwrap_or(entrants.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::entrant::NO_PRIORITY;
    use crate::testing::RecordingHost;
    use std::collections::HashSet;

    fn queue_with(capacity: usize) -> (WaitQueue, Arc<RecordingHost>, Arc<ManualClock>) {
        let host = Arc::new(RecordingHost::new(capacity));
        let clock = Arc::new(ManualClock::new(100_000));
        let queue = WaitQueue::new(
            BackendTarget::new("survival"),
            host.clone(),
            clock.clone(),
            QueueConfig::default().with_debug(true),
        );
        (queue, host, clock)
    }

    async fn fill(queue: &WaitQueue, names: &[&str], weight: i32) {
        for name in names {
            queue.insert(Entrant::new(*name, weight)).await.unwrap();
        }
    }

    async fn order(queue: &WaitQueue) -> Vec<String> {
        queue
            .waiting()
            .await
            .iter()
            .map(|e| e.id().name().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_empty_queue_inserts_at_front() {
        let (queue, _host, _clock) = queue_with(10);
        queue.memory().remember(&EntrantId::new("vip"), 3);

        assert_eq!(queue.insert(Entrant::new("vip", 50)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_small_queue_keeps_priority_behind() {
        let (queue, _host, _clock) = queue_with(10);

        assert_eq!(queue.insert(Entrant::without_priority("a")).await.unwrap(), 0);
        assert_eq!(queue.insert(Entrant::new("b", 10)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_priority_overtakes_beyond_protected_zone() {
        let (queue, _host, _clock) = queue_with(10);

        // Unprioritised entrants always land at the front
        fill(&queue, &["a1", "a2", "a3", "a4", "a5"], NO_PRIORITY).await;
        assert_eq!(queue.insert(Entrant::new("x", 3)).await.unwrap(), 5);

        assert_eq!(queue.insert(Entrant::new("y", 5)).await.unwrap(), 5);
        assert_eq!(queue.position_of(&EntrantId::new("x")).await, Some(6));
    }

    #[tokio::test]
    async fn test_priority_never_enters_protected_zone() {
        let (queue, _host, _clock) = queue_with(10);
        fill(&queue, &["p0", "p1", "p2", "p3", "p4", "p5", "p6", "p7"], 0).await;

        assert_eq!(queue.insert(Entrant::new("boss", 100)).await.unwrap(), 5);
        assert_eq!(
            order(&queue).await,
            ["p0", "p1", "p2", "p3", "p4", "boss", "p5", "p6", "p7"]
        );
    }

    #[tokio::test]
    async fn test_equal_weight_does_not_overtake() {
        let (queue, _host, _clock) = queue_with(10);
        fill(&queue, &["p0", "p1", "p2", "p3", "p4", "p5", "p6"], 4).await;

        assert_eq!(queue.insert(Entrant::new("late", 4)).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_out_of_range_saved_position_falls_back() {
        let (queue, _host, _clock) = queue_with(10);
        fill(&queue, &["p0", "p1", "p2"], 0).await;
        queue.memory().remember(&EntrantId::new("ghost"), 10);

        assert_eq!(queue.insert(Entrant::new("ghost", 0)).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_leave_and_rejoin_resumes_position() {
        let (queue, _host, _clock) = queue_with(10);
        fill(&queue, &["p0", "p1", "p2", "p3", "p4", "p5", "p6", "p7"], 0).await;

        assert_eq!(queue.leave(&EntrantId::new("P2")).await, Some(2));
        assert_eq!(queue.len().await, 7);

        assert_eq!(queue.insert(Entrant::new("p2", 0)).await.unwrap(), 2);
        assert_eq!(queue.metrics().snapshot().saved_placements, 1);
    }

    #[tokio::test]
    async fn test_unprioritised_rejoin_goes_to_front() {
        let (queue, _host, _clock) = queue_with(10);
        fill(&queue, &["p0", "p1", "p2", "p3"], 0).await;
        queue.leave(&EntrantId::new("p2")).await;

        // Weight -1 yields priority index 0, which beats the saved index 2
        assert_eq!(queue.insert(Entrant::without_priority("p2")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_expired_saved_position_is_ignored() {
        let (queue, _host, clock) = queue_with(10);
        fill(&queue, &["p0", "p1", "p2", "p3", "p4", "p5", "p6", "p7"], 0).await;
        queue.leave(&EntrantId::new("p1")).await;

        clock.advance(Duration::from_secs(15 * 60) + Duration::from_millis(1));
        assert_eq!(queue.insert(Entrant::new("p1", 0)).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_duplicate_identity_rejected() {
        let (queue, _host, _clock) = queue_with(10);
        queue.insert(Entrant::new("Alice", 0)).await.unwrap();

        let result = queue.insert(Entrant::new("alice", 9)).await;
        assert!(matches!(result, Err(QueueError::AlreadyQueued { .. })));
        assert_eq!(queue.len().await, 1);
        assert_eq!(queue.metrics().snapshot().duplicates_rejected, 1);
    }

    #[tokio::test]
    async fn test_pop_head_order_and_empty() {
        let (queue, _host, _clock) = queue_with(10);
        fill(&queue, &["a", "b"], 0).await;

        assert_eq!(queue.pop_head().await.unwrap().id().name(), "a");
        assert_eq!(queue.pop_head().await.unwrap().id().name(), "b");
        assert_eq!(
            queue.pop_head().await,
            Err(QueueError::empty("survival"))
        );
    }

    #[tokio::test]
    async fn test_take_for_dispatch_remembers_front() {
        let (queue, _host, _clock) = queue_with(10);
        fill(&queue, &["a", "b"], 0).await;

        let head = queue.take_for_dispatch().await.unwrap();
        assert_eq!(queue.memory().lookup(head.id()), Some(0));
    }

    #[tokio::test]
    async fn test_can_send_conditions() {
        let (queue, host, clock) = queue_with(2);
        assert!(!queue.can_send().await);

        fill(&queue, &["a"], 0).await;
        assert!(queue.can_send().await);

        queue.set_paused(true);
        assert_eq!(queue.check_gate().await, Err(BlockReason::Paused));
        queue.set_paused(false);

        host.set_occupancy(2);
        assert!(!queue.can_send().await);
        host.set_occupancy(1);

        queue.mark_sent(clock.now_millis());
        clock.advance(Duration::from_millis(499));
        assert!(!queue.can_send().await);
        clock.advance(Duration::from_millis(1));
        assert!(queue.can_send().await);
    }

    #[tokio::test]
    async fn test_pause_does_not_affect_insertion() {
        let (queue, _host, _clock) = queue_with(10);
        queue.set_paused(true);

        fill(&queue, &["a", "b"], 0).await;
        assert_eq!(order(&queue).await, ["a", "b"]);
        assert!(queue.is_paused());
    }

    #[tokio::test]
    async fn test_send_slot_is_exclusive() {
        let (queue, _host, _clock) = queue_with(10);

        assert!(!queue.is_sending());
        assert!(queue.begin_send());
        assert!(!queue.begin_send());
        queue.finish_send();
        assert!(queue.begin_send());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_case_variants_insert_once() {
        let (queue, _host, _clock) = queue_with(10);
        let queue = Arc::new(queue);
        let names = ["steve", "Steve", "STEVE", "sTeVe", "stevE", "StEvE", "steVE", "STeve"];

        let handles: Vec<_> = names
            .iter()
            .map(|name| {
                let queue = Arc::clone(&queue);
                let name = name.to_string();
                tokio::spawn(async move { queue.insert(Entrant::new(name, 0)).await })
            })
            .collect();

        let mut accepted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => accepted += 1,
                Err(err) => assert!(matches!(err, QueueError::AlreadyQueued { .. })),
            }
        }

        assert_eq!(accepted, 1);
        assert_eq!(queue.len().await, 1);
        assert_eq!(queue.metrics().snapshot().duplicates_rejected, 7);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_take_and_insert_lose_nobody() {
        let (queue, _host, _clock) = queue_with(10);
        let queue = Arc::new(queue);
        let all: HashSet<String> = (0..40).map(|n| format!("e{}", n)).collect();

        let inserts: Vec<_> = all
            .iter()
            .map(|name| {
                let queue = Arc::clone(&queue);
                let name = name.clone();
                tokio::spawn(async move { queue.insert(Entrant::new(name, 0)).await })
            })
            .collect();
        let takes: Vec<_> = (0..25)
            .map(|_| {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move { queue.take_for_dispatch().await })
            })
            .collect();

        for handle in inserts {
            handle.await.unwrap().unwrap();
        }

        let mut taken = Vec::new();
        for handle in takes {
            match handle.await.unwrap() {
                Ok(entrant) => taken.push(entrant.id().name().to_string()),
                Err(err) => assert_eq!(err, QueueError::empty("survival")),
            }
        }

        let remaining = order(&queue).await;
        let mut seen = HashSet::new();
        for name in taken.iter().chain(remaining.iter()) {
            assert!(seen.insert(name.clone()), "{} seen twice", name);
        }
        assert_eq!(seen, all);
        assert_eq!(taken.len() + remaining.len(), 40);
    }
}
