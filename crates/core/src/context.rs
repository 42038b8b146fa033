//! Shared process context handed to tasks and handlers.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use rand::Rng;

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::CoreError;
use crate::store::LeaseStore;

/// Named, typed registry of shared helpers (HTTP clients, DB pools, ...).
#[derive(Default)]
pub struct Utilities {
    entries: RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl Utilities {
    /// Register `value` under `name`, replacing any previous entry.
    pub fn register<T: Any + Send + Sync>(&self, name: impl Into<String>, value: T) {
        let name = name.into();
        tracing::info!("Loaded util {}", name);
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name, Arc::new(value));
    }

    /// Look up `name` as a `T`. `None` if missing or of another type.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        let entry = self
            .entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()?;
        entry.downcast::<T>().ok()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

impl fmt::Debug for Utilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Utilities").field("names", &self.names()).finish()
    }
}

struct Inner {
    config: Config,
    store: Arc<dyn LeaseStore>,
    clock: Arc<dyn Clock>,
    utilities: Utilities,
    bailout: AtomicBool,
    debug: AtomicBool,
}

/// Cheaply clonable handle on the process context.
///
/// Each scheduler and dispatcher is built from one of these; nothing in the
/// core reaches for process globals, so several independent contexts can
/// live side by side (tests do exactly that).
#[derive(Clone)]
pub struct AppContext {
    inner: Arc<Inner>,
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext")
            .field("profile", &self.inner.config.profile_label())
            .field("clock", &self.inner.clock)
            .field("bailout", &self.is_bailout())
            .finish()
    }
}

impl AppContext {
    pub fn new(config: Config, store: Arc<dyn LeaseStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                store,
                clock,
                utilities: Utilities::default(),
                bailout: AtomicBool::new(false),
                debug: AtomicBool::new(false),
            }),
        }
    }

    /// Context over `store` with default config and the system clock.
    pub fn with_store(store: Arc<dyn LeaseStore>) -> Self {
        Self::new(Config::default(), store, Arc::new(SystemClock))
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<dyn LeaseStore> {
        &self.inner.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.inner.clock
    }

    pub fn utilities(&self) -> &Utilities {
        &self.inner.utilities
    }

    /// Current unix time in seconds.
    pub fn now(&self) -> i64 {
        self.inner.clock.now()
    }

    /// Current unix time rounded down to a multiple of `modulo` (0 = no rounding).
    pub fn now_mod(&self, modulo: i64) -> i64 {
        let now = self.now();
        if modulo > 0 {
            now - now.rem_euclid(modulo)
        } else {
            now
        }
    }

    pub async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    /// Sleep a random duration in `[min_ms, max_ms)`.
    pub async fn random_sleep(&self, min_ms: u64, max_ms: u64) -> Result<(), CoreError> {
        if max_ms < min_ms {
            return Err(CoreError::InvalidArgument(format!(
                "max cannot be less than min ({} < {})",
                max_ms, min_ms
            )));
        }
        let extra = if max_ms > min_ms {
            rand::thread_rng().gen_range(0..max_ms - min_ms)
        } else {
            0
        };
        self.sleep(Duration::from_millis(min_ms + extra)).await;
        Ok(())
    }

    /// Set once the scheduler starts draining; running tasks may poll it.
    pub fn is_bailout(&self) -> bool {
        self.inner.bailout.load(Ordering::SeqCst)
    }

    pub fn set_bailout(&self) {
        self.inner.bailout.store(true, Ordering::SeqCst);
    }

    pub fn is_debug(&self) -> bool {
        self.inner.debug.load(Ordering::Relaxed)
    }

    pub fn set_debug(&self, debug: bool) {
        self.inner.debug.store(debug, Ordering::Relaxed);
    }
}
