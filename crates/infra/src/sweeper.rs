//! Background reclamation of elapsed holds.

use std::io;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use holdfast_core::{Clock, UnitId};
use holdfast_events::EventBus;
use holdfast_inventory::UnitChangeEvent;

use crate::config::EngineConfig;
use crate::coordinator::ReservationCoordinator;
use crate::store::{InventoryStore, StoreError};

/// Sweeper configuration.
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Pause between cycles
    pub interval: Duration,
    /// Maximum holds reclaimed per cycle
    pub batch_limit: usize,
    /// Thread name, also used in logs
    pub name: String,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            batch_limit: 500,
            name: "expiry-sweeper".to_string(),
        }
    }
}

impl SweeperConfig {
    pub fn from_engine(config: &EngineConfig) -> Self {
        Self {
            interval: config.sweep_interval,
            batch_limit: config.sweep_batch_limit,
            ..Self::default()
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Outcome of one sweep cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Due holds found by the scan.
    pub examined: usize,
    /// Units returned to available by this cycle.
    pub expired: Vec<UnitId>,
    /// Units that changed between scan and commit (released, extended,
    /// advanced or expired by an overlapping sweep).
    pub skipped: usize,
    /// Units whose expiry failed; they are retried next cycle.
    pub failed: usize,
}

/// Cumulative sweeper statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweeperStats {
    pub cycles: u64,
    pub units_expired: u64,
    pub units_skipped: u64,
    pub failed_cycles: u64,
    pub last_sweep_at: Option<DateTime<Utc>>,
}

/// Handle to a running sweeper. Dropping it stops the sweeper.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
    stats: Arc<Mutex<SweeperStats>>,
}

impl SweeperHandle {
    /// Stop the sweeper and wait for the current cycle to finish.
    pub fn shutdown(mut self) {
        self.stop();
    }

    pub fn stats(&self) -> SweeperStats {
        self.stats
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    fn stop(&mut self) {
        let _ = self.shutdown.send(());
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Periodically returns reserved units whose hold has elapsed to available.
///
/// Expiry goes through the coordinator like any other write, so a holder who
/// releases, extends or books at the last moment races the sweeper on the
/// unit version and exactly one of them wins. Overlapping sweeps are
/// harmless: the loser of the race sees the unit already reclaimed and skips
/// it.
pub struct ExpirySweeper<S, B, C> {
    coordinator: Arc<ReservationCoordinator<S, B, C>>,
    config: SweeperConfig,
}

impl<S, B, C> ExpirySweeper<S, B, C>
where
    S: InventoryStore + 'static,
    B: EventBus<UnitChangeEvent> + 'static,
    C: Clock + 'static,
{
    pub fn new(coordinator: Arc<ReservationCoordinator<S, B, C>>, config: SweeperConfig) -> Self {
        Self {
            coordinator,
            config,
        }
    }

    /// Run one cycle: scan for due holds and reclaim each one.
    ///
    /// Only a failed scan is an error; failures on individual units are
    /// counted and left for the next cycle.
    pub fn sweep_once(&self) -> Result<SweepReport, StoreError> {
        let due = self.coordinator.due_holds(self.config.batch_limit)?;
        let mut report = SweepReport {
            examined: due.len(),
            ..SweepReport::default()
        };

        for unit in due {
            match self.coordinator.expire(unit.id()) {
                Ok(Some(_)) => report.expired.push(unit.id()),
                Ok(None) => report.skipped += 1,
                Err(err) => {
                    warn!(
                        sweeper = %self.config.name,
                        unit_id = %unit.id(),
                        error = %err,
                        "failed to expire hold"
                    );
                    report.failed += 1;
                }
            }
        }

        if report.examined > 0 {
            debug!(
                sweeper = %self.config.name,
                examined = report.examined,
                expired = report.expired.len(),
                skipped = report.skipped,
                failed = report.failed,
                "sweep cycle finished"
            );
        }
        Ok(report)
    }

    /// Spawn the sweeper in a background thread.
    pub fn spawn(self) -> io::Result<SweeperHandle>
    where
        S: Send + Sync,
        B: Send + Sync,
        C: Send + Sync,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let stats = Arc::new(Mutex::new(SweeperStats::default()));
        let stats_clone = stats.clone();

        let join = thread::Builder::new()
            .name(self.config.name.clone())
            .spawn(move || sweeper_loop(self, shutdown_rx, stats_clone))?;

        Ok(SweeperHandle {
            shutdown: shutdown_tx,
            join: Some(join),
            stats,
        })
    }
}

fn sweeper_loop<S, B, C>(
    sweeper: ExpirySweeper<S, B, C>,
    shutdown_rx: mpsc::Receiver<()>,
    stats: Arc<Mutex<SweeperStats>>,
) where
    S: InventoryStore + 'static,
    B: EventBus<UnitChangeEvent> + 'static,
    C: Clock + 'static,
{
    let name = sweeper.config.name.clone();
    info!(
        sweeper = %name,
        interval_ms = sweeper.config.interval.as_millis() as u64,
        "expiry sweeper started"
    );

    loop {
        let result = sweeper.sweep_once();

        if let Ok(mut s) = stats.lock() {
            s.cycles += 1;
            s.last_sweep_at = Some(sweeper.coordinator.clock().now());
            match &result {
                Ok(report) => {
                    s.units_expired += report.expired.len() as u64;
                    s.units_skipped += report.skipped as u64;
                }
                Err(_) => s.failed_cycles += 1,
            }
        }

        if let Err(err) = result {
            // Keep going: the next cycle picks the same holds up again.
            error!(sweeper = %name, error = %err, "sweep cycle failed");
        }

        match shutdown_rx.recv_timeout(sweeper.config.interval) {
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    info!(sweeper = %name, "expiry sweeper stopped");
}
