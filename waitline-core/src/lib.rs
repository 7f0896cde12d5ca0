//! Waitline Core Library
//!
//! Admission-controlled waiting line that decides in what order, and at what
//! rate, waiting entrants are let into a single capacity-limited backend.
//!
//! # Architecture
//!
//! ```text
//!   arrivals ──► WaitQueue::insert ◄── PositionMemory (15 min grace)
//!                     │
//!          ┌──────────▼──────────┐
//!          │       Driver        │ ← fixed period (500 ms)
//!          └──────────┬──────────┘
//!                     │ tick
//!          ┌──────────▼──────────┐
//!          │    AdmissionGate    │ ← pause / empty / capacity / rate
//!          └──────────┬──────────┘
//!                     │
//!          ┌──────────▼──────────┐
//!          │     Dispatcher      │ ← pop head, notify, Host::connect
//!          └──────────┬──────────┘
//!                     │ callback (success / failure)
//!                     ▼
//!              last_sent + notice
//! ```
//!
//! The host environment (connection transport, permission lookup, message
//! rendering, capacity configuration) is reached through the [`Host`] trait.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use waitline_core::{BackendTarget, Dispatcher, Entrant, Host, QueueConfig, WaitQueue};
//!
//! async fn admit(host: Arc<dyn Host>) -> Result<(), waitline_core::QueueError> {
//!     let queue = Arc::new(WaitQueue::with_system_clock(
//!         BackendTarget::new("survival"),
//!         host,
//!         QueueConfig::default(),
//!     ));
//!     queue.insert(Entrant::new("Steve", 10)).await?;
//!
//!     let dispatcher = Dispatcher::new(Arc::clone(&queue));
//!     dispatcher.tick().await;
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod config;
pub mod dispatcher;
pub mod driver;
pub mod entrant;
pub mod error;
pub mod gate;
pub mod host;
pub mod memory;
pub mod metrics;
pub mod queue;
pub mod trace;

#[cfg(test)]
mod testing;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AccessTier, QueueConfig};
pub use dispatcher::{DispatchState, Dispatcher, TickOutcome};
pub use driver::Driver;
pub use entrant::{Entrant, EntrantId, NO_PRIORITY};
pub use error::{ConnectError, QueueError};
pub use gate::{AdmissionGate, BlockReason, GateInputs};
pub use host::{BackendTarget, ConnectCallback, ConnectResult, Host, Notice};
pub use memory::PositionMemory;
pub use metrics::{MetricsSnapshot, QueueMetrics};
pub use queue::{Placement, WaitQueue, TIME_BETWEEN_SENDING};
pub use trace::Tracer;
