//! Expiry policy and the background sweeper.
//!
//! A key is expired as soon as its deadline has been reached. That condition
//! lives in exactly one place, [`is_expired`], and is shared by the two ways a
//! key gets reclaimed:
//!
//! 1. **Lazy**: every read path in the storage engine checks the entry it is
//!    about to return and removes it instead when it is expired.
//! 2. **Active**: [`ExpirySweeper`] periodically walks the keyspace and drops
//!    expired entries nobody is reading.
//!
//! Both paths re-check the predicate while holding the shard's write lock,
//! so whichever runs first removes the key and the other finds nothing to do.
//!
//! ## Sweeping
//!
//! The sweeper runs as a Tokio task and:
//! 1. Sleeps for an adaptive interval (default: 100ms)
//! 2. Sweeps the keyspace one shard at a time, yielding between shards
//! 3. Speeds up when many keys expired, backs off when none did

use crate::storage::StorageEngine;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, trace};

/// Returns true iff a deadline is set and `now` has reached it.
#[inline]
pub fn is_expired(expires_at: Option<Instant>, now: Instant) -> bool {
    matches!(expires_at, Some(deadline) if now >= deadline)
}

/// Configuration for the expiry sweeper.
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    /// Base interval between sweeps (default: 100ms)
    pub base_interval: Duration,

    /// Minimum interval between sweeps (default: 10ms)
    pub min_interval: Duration,

    /// Maximum interval between sweeps (default: 1s)
    pub max_interval: Duration,

    /// If this fraction of keys expired in a pass, speed up sweeping
    pub speedup_threshold: f64,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_millis(100),
            min_interval: Duration::from_millis(10),
            max_interval: Duration::from_secs(1),
            speedup_threshold: 0.25,
        }
    }
}

impl ExpiryConfig {
    /// Builds a config around a base interval, keeping the bounds consistent.
    pub fn with_base_interval(base_interval: Duration) -> Self {
        let defaults = Self::default();
        Self {
            base_interval,
            min_interval: defaults.min_interval.min(base_interval),
            max_interval: defaults.max_interval.max(base_interval),
            ..defaults
        }
    }
}

/// A handle to the running expiry sweeper.
///
/// When this handle is dropped, the sweeper task will be stopped.
#[derive(Debug)]
pub struct ExpirySweeper {
    shutdown_tx: watch::Sender<bool>,
}

impl ExpirySweeper {
    /// Starts the expiry sweeper as a background task on the current runtime.
    pub fn start(engine: Arc<StorageEngine>, config: ExpiryConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!(interval = ?config.base_interval, "Background expiry sweeper started");

        tokio::spawn(sweeper_loop(engine, config, shutdown_rx));

        Self { shutdown_tx }
    }

    /// Stops the expiry sweeper.
    ///
    /// This is called automatically when the handle is dropped.
    pub fn stop(&self) {
        if self.shutdown_tx.send_replace(true) {
            return;
        }
        info!("Background expiry sweeper stopped");
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Sweeps every shard once, yielding to the runtime between shards.
///
/// Returns the number of entries removed.
pub async fn sweep_once(engine: &StorageEngine) -> u64 {
    let mut expired = 0;
    for index in 0..engine.shard_count() {
        expired += engine.sweep_shard(index, Instant::now());
        tokio::task::yield_now().await;
    }
    expired
}

async fn sweeper_loop(
    engine: Arc<StorageEngine>,
    config: ExpiryConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut current_interval = config.base_interval;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(current_interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Expiry sweeper received shutdown signal");
                    return;
                }
            }
        }

        let keys_before = engine.len();
        let expired = sweep_once(&engine).await;

        if keys_before > 0 {
            let expiry_rate = expired as f64 / keys_before as f64;

            if expiry_rate > config.speedup_threshold {
                current_interval = (current_interval / 2).max(config.min_interval);
                debug!(
                    expired = expired,
                    rate = %format!("{:.2}%", expiry_rate * 100.0),
                    new_interval_ms = current_interval.as_millis(),
                    "High expiry rate, speeding up sweeper"
                );
            } else if expired == 0 {
                current_interval = (current_interval * 2).min(config.max_interval);
                trace!(
                    new_interval_ms = current_interval.as_millis(),
                    "No expired keys, slowing down sweeper"
                );
            }
        }

        if expired > 0 {
            debug!(
                expired = expired,
                keys_remaining = engine.len(),
                "Expired keys cleaned up"
            );
        }
    }
}

/// Starts the expiry sweeper with default configuration.
pub fn start_expiry_sweeper(engine: Arc<StorageEngine>) -> ExpirySweeper {
    ExpirySweeper::start(engine, ExpiryConfig::default())
}
