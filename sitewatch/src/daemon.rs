use anyhow::Result;
use site_store::Store;
use sitewatch_engine::{ScanEngine, ScheduleConfig, Scheduler};
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Run the scheduler until Ctrl-C, re-reading the store's scan settings every
/// `poll` and applying them through `Scheduler::restart`.
pub async fn run(engine: ScanEngine, cadence: Duration, poll: Duration) -> Result<()> {
    let store = engine.store().clone();
    let mut scheduler = Scheduler::new(engine);
    scheduler.start(ScheduleConfig::from_scan_config(&store.scan_config()?, cadence));
    tracing::info!(
        version = sitewatch_core::version(),
        cadence_secs = cadence.as_secs(),
        poll_secs = poll.as_secs(),
        running = scheduler.is_running(),
        "sitewatch daemon started"
    );

    let mut ticker = tokio::time::interval(poll);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            res = &mut shutdown => {
                if let Err(e) = res {
                    tracing::error!(error = %e, "failed to listen for shutdown signal");
                }
                tracing::info!("shutdown requested");
                break;
            }
            _ = ticker.tick() => match store.scan_config() {
                Ok(scan) => {
                    scheduler.restart(ScheduleConfig::from_scan_config(&scan, cadence)).await;
                }
                Err(e) => tracing::warn!(error = %e, "could not read scan settings, keeping current schedule"),
            },
        }
    }

    scheduler.stop().await;
    tracing::info!("sitewatch daemon stopped");
    Ok(())
}
