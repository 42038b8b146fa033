//! TTL leases in the shared store and the key scheme both coordinators use.
//!
//! A lease is nothing more than a key whose presence claims a resource.
//! Absence (explicit delete or TTL expiry) releases the claim. No owner
//! identity is recorded: whoever wrote the key owns it collectively.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::store::{LeaseStore, StoreError};

/// Control flag: stop the scheduler after draining.
pub const STOP_KEY: &str = "STOP";
/// Control flag: restart the scheduler after draining.
pub const RESTART_KEY: &str = "RESTART";

/// Value written into every lease key.
const LEASE_VALUE: &str = "true";

/// Start of the recurring window `now` falls in.
///
/// `window_start = now - (now mod interval) + offset`. Intervals below one
/// second are treated as one second.
pub fn window_start(now: i64, interval_secs: i64, offset_secs: i64) -> i64 {
    let interval = interval_secs.max(1);
    now - now.rem_euclid(interval) + offset_secs
}

/// TTL for a window lease: the interval itself, or `fallback` when the
/// interval is not positive.
pub fn window_ttl(interval_secs: i64, fallback_secs: u64) -> u64 {
    if interval_secs > 0 {
        interval_secs as u64
    } else {
        fallback_secs
    }
}

/// Response cache key: `<prefix>:<method>:<url>`.
pub fn cache_key(prefix: &str, method: &str, url: &str) -> String {
    format!("{}:{}:{}", prefix, method, url)
}

/// Scheduler key derivation under one prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseKeys {
    prefix: String,
}

impl LeaseKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// `<prefix>:running:<shard>:<taskId>`
    pub fn running(&self, task_id: &str, shard: u32) -> String {
        format!("{}:running:{}:{}", self.prefix, shard, task_id)
    }

    /// Common prefix of every running lease, used by recovery and drain.
    pub fn running_prefix(&self) -> String {
        format!("{}:running:", self.prefix)
    }

    /// `<prefix>:current:<shard>:<taskId>:<windowStart>`
    pub fn window(&self, task_id: &str, shard: u32, window_start: i64) -> String {
        format!("{}:current:{}:{}:{}", self.prefix, shard, task_id, window_start)
    }
}

/// A held lease key.
///
/// Dropping a lease that was neither released nor detached schedules a
/// best-effort delete on the current tokio runtime, so the claim is given
/// up on every exit path including panics and cancellation.
pub struct Lease {
    key: String,
    store: Arc<dyn LeaseStore>,
    armed: bool,
}

impl fmt::Debug for Lease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("key", &self.key)
            .field("armed", &self.armed)
            .finish()
    }
}

impl Lease {
    /// Claim `key` for `ttl_secs` if nobody holds it.
    pub async fn try_acquire(
        store: &Arc<dyn LeaseStore>,
        key: impl Into<String>,
        ttl_secs: u64,
    ) -> Result<Option<Lease>, StoreError> {
        let key = key.into();
        if store.set_if_absent(&key, LEASE_VALUE, ttl_secs).await? {
            debug!(key = %key, ttl = ttl_secs, "lease acquired");
            Ok(Some(Self::armed(store, key)))
        } else {
            Ok(None)
        }
    }

    /// Write `key` unconditionally, overwriting any earlier holder.
    pub async fn write(
        store: &Arc<dyn LeaseStore>,
        key: impl Into<String>,
        ttl_secs: u64,
    ) -> Result<Lease, StoreError> {
        let key = key.into();
        store.set_with_ttl(&key, LEASE_VALUE, ttl_secs).await?;
        debug!(key = %key, ttl = ttl_secs, "lease written");
        Ok(Self::armed(store, key))
    }

    fn armed(store: &Arc<dyn LeaseStore>, key: String) -> Self {
        Self {
            key,
            store: Arc::clone(store),
            armed: true,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Delete the key now. On error the key is left to expire by TTL.
    pub async fn release(mut self) -> Result<(), StoreError> {
        self.armed = false;
        self.store.delete(&self.key).await?;
        debug!(key = %self.key, "lease released");
        Ok(())
    }

    /// Keep the key in the store until its TTL lapses.
    pub fn detach(mut self) -> String {
        self.armed = false;
        std::mem::take(&mut self.key)
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let key = std::mem::take(&mut self.key);
        let store = Arc::clone(&self.store);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = store.delete(&key).await {
                        warn!(key = %key, error = %e, "failed to release dropped lease, leaving it to expire");
                    }
                });
            }
            Err(_) => {
                warn!(key = %key, "lease dropped outside a runtime, leaving it to expire");
            }
        }
    }
}
