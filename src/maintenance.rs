//! Background Maintenance
//!
//! Periodic tick that evicts expired dedup ids, conversation markers and
//! model-budget windows, then flushes the store if anything changed.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::BotEngine;

/// What one tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub evicted: usize,
    /// Dirty tables were written successfully
    pub flushed: bool,
}

/// Run a single maintenance pass
pub fn tick(engine: &BotEngine) -> TickReport {
    let evicted = engine.sweep();
    let store = engine.store();
    let flushed = store.is_dirty() && store.flush();
    if evicted > 0 || flushed {
        debug!("Maintenance: evicted={} flushed={}", evicted, flushed);
    }
    TickReport { evicted, flushed }
}

/// Spawn the periodic maintenance loop
pub fn spawn(engine: Arc<BotEngine>, every: Duration) -> JoinHandle<()> {
    info!("Maintenance task started (every {:?})", every);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick fires immediately
        interval.tick().await;

        loop {
            interval.tick().await;
            // Flushing writes files; keep it off the async workers
            let engine = Arc::clone(&engine);
            if let Err(e) = tokio::task::spawn_blocking(move || tick(&engine)).await {
                warn!("Maintenance tick failed: {}", e);
            }
        }
    })
}
