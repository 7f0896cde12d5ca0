//! Waitline simulator - drives a fake backend through the real queue.
//!
//! ## Quick Start
//!
//! ```bash
//! # 20 entrants, backend with 5 slots
//! waitline-sim
//!
//! # Slow, flaky backend with diagnostic tracing
//! waitline-sim --debug --connect-latency-ms 400 --fail-every 4
//!
//! # Tighter timing for a small backend
//! waitline-sim --preset fast-drain --capacity 2
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use waitline_core::{
    BackendTarget, ConnectCallback, ConnectError, DispatchState, Dispatcher, Driver, Entrant,
    EntrantId, Host, Notice, QueueConfig, WaitQueue, NO_PRIORITY,
};

#[derive(Clone, Copy, ValueEnum)]
enum Preset {
    Default,
    FastDrain,
    EventRush,
}

impl Preset {
    fn config(self) -> QueueConfig {
        match self {
            Preset::Default => QueueConfig::default(),
            Preset::FastDrain => QueueConfig::fast_drain(),
            Preset::EventRush => QueueConfig::event_rush(),
        }
    }
}

#[derive(Parser)]
#[command(name = "waitline-sim")]
#[command(version)]
#[command(about = "Drive a simulated backend through the waiting line", long_about = None)]
struct Cli {
    /// Number of entrants joining the queue
    #[arg(short, long, default_value_t = 20)]
    entrants: usize,

    /// Backend slot count
    #[arg(short, long, default_value_t = 5)]
    capacity: usize,

    /// Name of the backend target
    #[arg(short, long, default_value = "survival")]
    target: String,

    /// Delay before the backend answers an admission attempt
    #[arg(long, default_value_t = 150)]
    connect_latency_ms: u64,

    /// How long an admitted entrant occupies a slot
    #[arg(long, default_value_t = 2_000)]
    session_ms: u64,

    /// Refuse every Nth admission attempt (0 = never)
    #[arg(long, default_value_t = 0)]
    fail_every: usize,

    /// Every Nth entrant joins with priority (0 = nobody)
    #[arg(long, default_value_t = 4)]
    priority_every: usize,

    /// Give up after this many seconds
    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,

    /// Queue timing preset, overridable through WAITLINE_* variables
    #[arg(long, value_enum, default_value_t = Preset::Default)]
    preset: Preset,

    /// Enable diagnostic tracing
    #[arg(long)]
    debug: bool,
}

/// Backend with a fixed number of slots and a fixed answer latency
struct SimBackend {
    capacity: usize,
    occupancy: Arc<AtomicUsize>,
    attempts: AtomicUsize,
    latency: Duration,
    session: Duration,
    fail_every: usize,
}

impl Host for SimBackend {
    fn capacity_of(&self, _target: &BackendTarget) -> usize {
        self.capacity
    }

    fn live_occupancy(&self, _target: &BackendTarget) -> usize {
        self.occupancy.load(Ordering::SeqCst)
    }

    fn notify(&self, entrant: &EntrantId, notice: Notice) {
        info!(entrant = %entrant, "{}", notice);
    }

    fn has_capability(&self, entrant: &EntrantId, flag: &str) -> bool {
        entrant.key().starts_with("vip") && flag == "queue.priority.priority"
    }

    fn connect(&self, entrant: &EntrantId, target: &BackendTarget, done: ConnectCallback) {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let refuse = self.fail_every > 0 && attempt % self.fail_every == 0;
        let occupancy = Arc::clone(&self.occupancy);
        let latency = self.latency;
        let session = self.session;
        let entrant = entrant.clone();
        let target = target.clone();

        tokio::spawn(async move {
            tokio::time::sleep(latency).await;
            if refuse {
                warn!(entrant = %entrant, backend = %target, "Backend refused entrant");
                done(Err(ConnectError::new("backend refused the connection")));
                return;
            }

            occupancy.fetch_add(1, Ordering::SeqCst);
            done(Ok(()));

            tokio::time::sleep(session).await;
            occupancy.fetch_sub(1, Ordering::SeqCst);
        });
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_filter = if cli.debug {
        "waitline_sim=info,waitline_core=debug,waitline::trace=debug"
    } else {
        "waitline_sim=info,waitline_core=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    let mut config = cli.preset.config().with_env_overrides();
    if cli.debug {
        config.debug = true;
    }
    let period = config.send_interval;

    let backend = Arc::new(SimBackend {
        capacity: cli.capacity,
        occupancy: Arc::new(AtomicUsize::new(0)),
        attempts: AtomicUsize::new(0),
        latency: Duration::from_millis(cli.connect_latency_ms),
        session: Duration::from_millis(cli.session_ms),
        fail_every: cli.fail_every,
    });

    let queue = Arc::new(WaitQueue::with_system_clock(
        BackendTarget::new(cli.target.clone()),
        backend,
        config,
    ));

    info!(
        backend = %cli.target,
        entrants = cli.entrants,
        capacity = cli.capacity,
        "Starting waitline simulation v{}",
        env!("CARGO_PKG_VERSION")
    );

    for n in 1..=cli.entrants {
        let entrant = if cli.priority_every > 0 && n % cli.priority_every == 0 {
            Entrant::new(format!("vip-{}", n), 10)
        } else {
            Entrant::new(format!("guest-{}", n), NO_PRIORITY)
        };
        let index = queue.insert(entrant).await?;
        info!(entrant = n, index, "Joined queue");
    }

    let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&queue)));
    let (shutdown, rx) = watch::channel(false);
    let driver = Driver::new(period).with_dispatcher(Arc::clone(&dispatcher)).spawn(rx);

    let drained = tokio::time::timeout(Duration::from_secs(cli.timeout_secs), async {
        loop {
            if queue.is_empty().await && dispatcher.state() == DispatchState::Idle {
                break;
            }
            tokio::time::sleep(period).await;
        }
    })
    .await;

    shutdown.send(true)?;
    driver.await?;

    if drained.is_err() {
        warn!(remaining = queue.len().await, "Simulation timed out before the queue drained");
    }

    println!("{}", serde_json::to_string_pretty(&queue.metrics().snapshot())?);

    Ok(())
}
