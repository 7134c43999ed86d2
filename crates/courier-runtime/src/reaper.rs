//! Deadline reaper
//!
//! A background sweep closing tasks whose helper never finished the
//! handshake.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::relay::{RelayEngine, RelaySink};

/// Spawn the sweep. It runs every `every` until `shutdown` is cancelled.
pub fn spawn_task_reaper<S>(
    engine: Arc<RelayEngine<S>>,
    every: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()>
where
    S: RelaySink + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = every.as_secs(), "Task reaper started");

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    info!("Task reaper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let expired = engine.sweep_expired(Instant::now()).await;
                    if !expired.is_empty() {
                        debug!(count = expired.len(), "Reaped overdue tasks");
                    }
                }
            }
        }
    })
}
