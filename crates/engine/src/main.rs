use std::io::{self, BufRead};
use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, Context};
use tracing::{error, info, warn};

use holdfast_core::SystemClock;
use holdfast_engine::{parse_line, JsonLines, Output, Session};
use holdfast_events::{InMemoryEventBus, Subscription, SubscriptionFilter};
use holdfast_infra::{
    load_inventory_file, EngineConfig, ExpirySweeper, InMemoryInventoryStore,
    ReservationCoordinator, SweeperConfig,
};
use holdfast_inventory::UnitChangeEvent;

fn main() -> anyhow::Result<()> {
    holdfast_observability::init();

    let config = EngineConfig::from_env().context("invalid engine configuration")?;

    let store = Arc::new(InMemoryInventoryStore::new());
    match &config.inventory_path {
        Some(path) => {
            load_inventory_file(store.as_ref(), path)
                .with_context(|| format!("failed to load inventory from {}", path.display()))?;
        }
        None => warn!("HOLDFAST_INVENTORY not set; starting with an empty inventory"),
    }

    let bus: Arc<InMemoryEventBus<UnitChangeEvent>> =
        Arc::new(InMemoryEventBus::with_capacity(config.subscriber_capacity));
    let coordinator = Arc::new(ReservationCoordinator::with_config(
        store,
        bus,
        SystemClock,
        &config,
    ));

    let out = Arc::new(JsonLines::new(io::stdout()));
    let feed = coordinator.subscribe(SubscriptionFilter::All);
    let stream = thread::Builder::new()
        .name("event-stream".to_string())
        .spawn({
            let out = out.clone();
            move || stream_events(feed, &out)
        })
        .context("failed to spawn event stream thread")?;

    let sweeper = ExpirySweeper::new(coordinator.clone(), SweeperConfig::from_engine(&config))
        .spawn()
        .context("failed to spawn expiry sweeper")?;

    let units = coordinator
        .list(None)
        .context("inventory store unavailable")?
        .len();
    info!(
        units,
        sweep_interval_ms = config.sweep_interval.as_millis() as u64,
        "reservation engine ready"
    );

    let session = Session::new(coordinator.clone());
    for (index, line) in io::stdin().lock().lines().enumerate() {
        let line = line.context("failed to read stdin")?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let output = match parse_line(trimmed) {
            Ok(command) => Output::Reply(session.execute(command)),
            Err(err) => Output::Invalid {
                line: index + 1,
                message: err.to_string(),
            },
        };
        out.emit(&output).context("failed to write reply")?;
    }

    let stats = sweeper.stats();
    sweeper.shutdown();
    info!(
        cycles = stats.cycles,
        units_expired = stats.units_expired,
        failed_cycles = stats.failed_cycles,
        "input closed, shutting down"
    );

    // Dropping the last coordinator handle closes the bus and ends the stream.
    drop(session);
    drop(coordinator);
    stream
        .join()
        .map_err(|_| anyhow!("event stream thread panicked"))?;

    Ok(())
}

fn stream_events<W: io::Write>(feed: Subscription<UnitChangeEvent>, out: &JsonLines<W>) {
    let mut reported_drops = 0;
    while let Ok(event) = feed.recv() {
        let dropped = feed.dropped();
        if dropped > reported_drops {
            warn!(lost = dropped - reported_drops, "event stream fell behind");
            reported_drops = dropped;
        }
        if let Err(err) = out.emit(&Output::Event(event)) {
            error!(error = %err, "failed to write event; stopping event stream");
            break;
        }
    }
}
