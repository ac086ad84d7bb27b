//! Background overdue sweep

use std::time::Duration;

use tokio::{sync::watch, task::JoinHandle};

use super::lending::LendingService;

/// Run [`LendingService::sweep`] every `every` until `shutdown` flips to
/// `true` or its sender is dropped. The first pass runs immediately.
///
/// A loan's `status` lags its due date by at most one interval; the
/// overdue listing sweeps on demand and never lags.
pub fn spawn_sweeper(
    lending: LendingService,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    match lending.sweep().await {
                        Ok(report) if !report.reclassified.is_empty() => {
                            tracing::info!(
                                reclassified = report.reclassified.len(),
                                suspended = report.suspended.len(),
                                "Overdue sweep reclassified loans"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => tracing::error!("Overdue sweep failed: {}", e),
                    }
                }
            }
        }

        tracing::info!("Overdue sweeper stopped");
    })
}
