//! Dispatcher: releases the head entrant to the backend.
//!
//! # State machine
//!
//! ```text
//!   Idle ──tick (gate open)──► Sending ──connect callback──► Idle
//! ```
//!
//! The `Sending` flag lives on the queue, so any number of dispatchers sharing
//! one queue still keep at most one admission in flight. While `Sending`,
//! ticks are no-ops. The connect callback only touches the queue's
//! `last_sent` timestamp, the in-flight flag, metrics and the host
//! notification; it never mutates the waiting sequence. A failed admission is
//! reported to the entrant once and is not retried or re-queued.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::entrant::{Entrant, EntrantId};
use crate::error::QueueError;
use crate::gate::BlockReason;
use crate::host::{ConnectCallback, Notice};
use crate::queue::WaitQueue;

/// Whether an admission attempt is outstanding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Sending,
}

/// What a tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The entrant was popped and its admission attempt started
    Dispatched(EntrantId),
    /// The gate was closed before anything was attempted
    Blocked(BlockReason),
    /// The gate closed between the tick's own check and the send
    Rejected(QueueError),
    /// The queue emptied between the gate check and the pop
    Skipped,
}

impl TickOutcome {
    fn from_send(result: Result<EntrantId, QueueError>) -> Self {
        match result {
            Ok(id) => TickOutcome::Dispatched(id),
            Err(err) if err.is_benign() => TickOutcome::Skipped,
            Err(err) => TickOutcome::Rejected(err),
        }
    }
}

/// Periodic sender for one queue
pub struct Dispatcher {
    queue: Arc<WaitQueue>,
}

impl Dispatcher {
    pub fn new(queue: Arc<WaitQueue>) -> Self {
        Self { queue }
    }

    pub fn queue(&self) -> &Arc<WaitQueue> {
        &self.queue
    }

    pub fn state(&self) -> DispatchState {
        if self.queue.is_sending() {
            DispatchState::Sending
        } else {
            DispatchState::Idle
        }
    }

    /// One scheduler tick: send the head entrant if the gate allows it
    pub async fn tick(&self) -> TickOutcome {
        if let Err(reason) = self.queue.check_gate().await {
            return TickOutcome::Blocked(reason);
        }
        if self.state() == DispatchState::Sending {
            return TickOutcome::Blocked(BlockReason::SendInFlight);
        }

        let outcome = TickOutcome::from_send(self.send_next().await);
        if outcome == TickOutcome::Skipped {
            self.queue.metrics().record_skipped_tick();
            debug!(queue = %self.queue.target(), "Skipping tick, queue emptied");
        }
        outcome
    }

    /// Send the head entrant to the backend
    ///
    /// Fails with `InvalidState` when the gate is closed or an attempt is
    /// already in flight, and with `EmptyQueue` when the queue emptied after
    /// the gate check.
    pub async fn send_next(&self) -> Result<EntrantId, QueueError> {
        let target = self.queue.target().clone();

        self.queue
            .check_gate()
            .await
            .map_err(|reason| QueueError::invalid_state(target.name(), reason))?;

        if !self.queue.begin_send() {
            return Err(QueueError::invalid_state(
                target.name(),
                BlockReason::SendInFlight,
            ));
        }

        let entrant = match self.queue.take_for_dispatch().await {
            Ok(entrant) => entrant,
            Err(err) => {
                self.queue.finish_send();
                return Err(err);
            }
        };

        let id = entrant.id().clone();
        let host = Arc::clone(self.queue.host());

        host.notify(
            &id,
            Notice::Sending {
                target: target.name().to_string(),
            },
        );
        info!(entrant = %id, backend = %target, "Entrant sent via queue");
        self.queue.metrics().record_dispatched();

        self.broadcast_progress().await;

        host.connect(&id, &target, self.completion(entrant));
        Ok(id)
    }

    /// Tell every remaining entrant where it stands
    ///
    /// Throttled: nothing is sent while the last successful admission is
    /// within the quiet period.
    async fn broadcast_progress(&self) {
        let queue = &self.queue;
        let quiet = queue.config().progress_quiet_period.as_millis() as u64;
        let now = queue.clock().now_millis();
        if now.saturating_sub(queue.last_sent()) <= quiet {
            return;
        }

        let waiting = queue.waiting().await;
        let total = waiting.len();
        let paused = queue.is_paused();
        let host = queue.host();
        let target = queue.target().name();

        for (index, entrant) in waiting.iter().enumerate() {
            let id = entrant.id();
            host.notify(
                id,
                Notice::Progress {
                    position: index + 1,
                    total,
                    target: target.to_string(),
                },
            );

            if let Some(tier) = queue
                .config()
                .access_tier_for(|flag| host.has_capability(id, flag))
            {
                host.notify(
                    id,
                    Notice::AccessTier {
                        label: tier.label.clone(),
                    },
                );
            }

            if paused {
                host.notify(id, Notice::QueuePaused);
            }
        }

        queue.tracer().trace(format!(
            "Sent progress to {} entrants waiting for {}",
            total, target
        ));
    }

    fn completion(&self, entrant: Entrant) -> ConnectCallback {
        let queue = Arc::clone(&self.queue);

        Box::new(move |result| {
            let id = entrant.id();
            let target = queue.target().name().to_string();

            match result {
                Ok(()) => {
                    queue.host().notify(id, Notice::Sent { target });
                    queue.mark_sent(queue.clock().now_millis());
                    queue.metrics().record_connected();
                    debug!(entrant = %id, backend = %queue.target(), "Admission succeeded");
                }
                Err(err) => {
                    warn!(entrant = %id, backend = %queue.target(), error = %err, "Admission failed");
                    queue.host().notify(
                        id,
                        Notice::ConnectFailed {
                            target,
                            reason: err.to_string(),
                        },
                    );
                    queue.metrics().record_connect_failed();
                }
            }

            queue.finish_send();
        })
    }
}
