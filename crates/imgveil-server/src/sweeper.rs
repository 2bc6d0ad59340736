//! Background removal of expired sessions.

use std::time::Duration;

use imgveil_core::SessionStore;
use tracing::{debug, info};

/// Spawn a task that sweeps expired sessions every `interval` until
/// `shutdown` flips.
pub fn spawn_session_sweeper(
    store: SessionStore,
    interval: Duration,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        timer.tick().await; // Skip first immediate tick

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    let removed = store.sweep_expired().await;
                    let live_sessions = store.len().await;
                    debug!(removed, live_sessions, "Session sweep finished");
                }
                _ = shutdown.changed() => {
                    info!("Session sweeper shutting down");
                    return;
                }
            }
        }
    })
}
