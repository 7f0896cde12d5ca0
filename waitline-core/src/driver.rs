//! Fixed-period driver ticking one dispatcher per backend.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use crate::dispatcher::{Dispatcher, TickOutcome};
use crate::queue::TIME_BETWEEN_SENDING;

/// Shared scheduler for any number of queues
///
/// Queues never share state; the driver only calls `tick` on each in turn.
pub struct Driver {
    dispatchers: Vec<Arc<Dispatcher>>,
    period: Duration,
}

impl Default for Driver {
    fn default() -> Self {
        Self::new(TIME_BETWEEN_SENDING)
    }
}

impl Driver {
    pub fn new(period: Duration) -> Self {
        Self {
            dispatchers: Vec::new(),
            period,
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: Arc<Dispatcher>) -> Self {
        self.dispatchers.push(dispatcher);
        self
    }

    /// Tick every dispatcher once
    pub async fn tick_all(&self) -> Vec<TickOutcome> {
        let mut outcomes = Vec::with_capacity(self.dispatchers.len());

        for dispatcher in &self.dispatchers {
            let outcome = dispatcher.tick().await;
            match &outcome {
                TickOutcome::Dispatched(id) => {
                    debug!(queue = %dispatcher.queue().target(), entrant = %id, "Dispatched")
                }
                TickOutcome::Blocked(reason) => {
                    trace!(queue = %dispatcher.queue().target(), reason = %reason, "Blocked")
                }
                TickOutcome::Rejected(err) => {
                    warn!(queue = %dispatcher.queue().target(), error = %err, "Send rejected after gate check")
                }
                TickOutcome::Skipped => {}
            }
            outcomes.push(outcome);
        }

        outcomes
    }

    /// Tick on a fixed period until `shutdown` flips to true or its sender drops
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            queues = self.dispatchers.len(),
            period_ms = self.period.as_millis() as u64,
            "Queue driver started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick_all().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Queue driver stopped");
    }

    /// Run on the current tokio runtime
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::QueueConfig;
    use crate::entrant::{Entrant, EntrantId};
    use crate::gate::BlockReason;
    use crate::host::BackendTarget;
    use crate::queue::WaitQueue;
    use crate::testing::RecordingHost;

    fn dispatcher(name: &str, host: Arc<RecordingHost>, clock: Arc<ManualClock>) -> Arc<Dispatcher> {
        let queue = WaitQueue::new(BackendTarget::new(name), host, clock, QueueConfig::default());
        Arc::new(Dispatcher::new(Arc::new(queue)))
    }

    #[tokio::test]
    async fn test_tick_all_keeps_queues_independent() {
        let clock = Arc::new(ManualClock::new(50_000));
        let host_a = Arc::new(RecordingHost::new(5));
        let host_b = Arc::new(RecordingHost::new(5));
        let first = dispatcher("lobby", host_a.clone(), clock.clone());
        let second = dispatcher("survival", host_b.clone(), clock.clone());

        first.queue().insert(Entrant::new("steve", 0)).await.unwrap();
        second.queue().set_paused(true);
        second.queue().insert(Entrant::new("alex", 0)).await.unwrap();

        let driver = Driver::default()
            .with_dispatcher(first.clone())
            .with_dispatcher(second.clone());

        let outcomes = driver.tick_all().await;
        assert_eq!(
            outcomes,
            vec![
                TickOutcome::Dispatched(EntrantId::new("steve")),
                TickOutcome::Blocked(BlockReason::Paused),
            ]
        );
        assert_eq!(host_a.connect_calls(), 1);
        assert_eq!(host_b.connect_calls(), 0);
        assert_eq!(second.queue().len().await, 1);
    }

    #[tokio::test]
    async fn test_tick_all_with_shared_queue_sends_once() {
        let clock = Arc::new(ManualClock::new(50_000));
        let host = Arc::new(RecordingHost::new(5));
        let first = dispatcher("lobby", host.clone(), clock);
        let second = Arc::new(Dispatcher::new(Arc::clone(first.queue())));
        first.queue().insert(Entrant::new("steve", 0)).await.unwrap();
        first.queue().insert(Entrant::new("alex", 0)).await.unwrap();

        let driver = Driver::default().with_dispatcher(first).with_dispatcher(second);

        assert_eq!(
            driver.tick_all().await,
            vec![
                TickOutcome::Dispatched(EntrantId::new("steve")),
                TickOutcome::Blocked(BlockReason::SendInFlight),
            ]
        );
        assert_eq!(host.connect_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_shutdown() {
        let clock = Arc::new(ManualClock::new(50_000));
        let host = Arc::new(RecordingHost::new(5));
        let only = dispatcher("lobby", host.clone(), clock);
        only.queue().insert(Entrant::new("steve", 0)).await.unwrap();

        let (tx, rx) = watch::channel(false);
        let handle = Driver::default().with_dispatcher(only.clone()).spawn(rx);

        tokio::time::sleep(Duration::from_millis(1_200)).await;
        assert_eq!(host.connect_calls(), 1);

        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
