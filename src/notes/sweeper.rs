//! Background Prune Sweeper
//!
//! Timed notes that are never read after they expire would stay in the
//! store forever without this task. The sweeper wakes on a fixed interval
//! and asks [`NoteService::prune_expired`] to remove them.
//!
//! ## Design
//!
//! The sweeper runs as a Tokio task and:
//! 1. Waits for the next tick of a fixed-interval timer (default: 6 minutes)
//! 2. Runs the prune on the blocking pool, since store calls are synchronous
//! 3. Logs how many notes were removed
//!
//! Prunes are idempotent, so a slow prune overlapping the next tick, or a
//! second sweeper on another replica, is harmless.

use crate::notes::NoteService;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, trace};

/// Default interval between prune sweeps.
pub const DEFAULT_PRUNE_INTERVAL: Duration = Duration::from_secs(6 * 60);

/// Shortest interval the sweeper accepts.
pub const MIN_PRUNE_INTERVAL: Duration = Duration::from_millis(1);

/// Configuration for the prune sweeper.
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Interval between sweeps
    pub interval: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_PRUNE_INTERVAL,
        }
    }
}

/// A handle to the running prune sweeper.
///
/// When this handle is dropped, the sweeper task will be stopped.
#[derive(Debug)]
pub struct PruneSweeper {
    shutdown_tx: watch::Sender<bool>,
}

impl PruneSweeper {
    /// Starts the prune sweeper as a background task.
    ///
    /// Must be called from within a Tokio runtime. The first sweep runs
    /// immediately, the following ones every `config.interval`.
    /// Intervals shorter than [`MIN_PRUNE_INTERVAL`] are raised to it.
    pub fn start(service: NoteService, mut config: SweeperConfig) -> Self {
        config.interval = config.interval.max(MIN_PRUNE_INTERVAL);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let interval_secs = config.interval.as_secs();
        tokio::spawn(sweeper_loop(service, config, shutdown_rx));

        info!(interval_secs, "Background prune sweeper started");

        Self { shutdown_tx }
    }

    /// Stops the prune sweeper.
    ///
    /// This is called automatically when the handle is dropped.
    pub fn stop(&self) {
        if self.shutdown_tx.send(true).is_ok() {
            info!("Background prune sweeper stopped");
        }
    }
}

impl Drop for PruneSweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn sweeper_loop(
    service: NoteService,
    config: SweeperConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Prune sweeper received shutdown signal");
                    return;
                }
                continue;
            }
        }

        let service = service.clone();
        match tokio::task::spawn_blocking(move || service.prune_expired()).await {
            Ok(Ok(0)) => trace!("Prune sweep found nothing to remove"),
            Ok(Ok(pruned)) => debug!(pruned, "Expired notes pruned"),
            Ok(Err(e)) => error!(error = %e, "Prune sweep failed"),
            Err(e) => error!(error = %e, "Prune sweep task panicked"),
        }
    }
}

/// Starts the prune sweeper with the default interval.
pub fn start_prune_sweeper(service: NoteService) -> PruneSweeper {
    PruneSweeper::start(service, SweeperConfig::default())
}
