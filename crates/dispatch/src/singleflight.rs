//! Process-local execution deduplication.
//!
//! The first caller for a key spawns the computation as its own task and
//! publishes a shared handle to its result; concurrent callers for the same
//! key await a clone of that handle. The entry belongs to the spawned task
//! and is removed when the computation finishes, not when a caller gives
//! up, so a disconnected caller never opens the door to a second
//! concurrent computation for the key.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{BoxFuture, FutureExt, Shared};
use thiserror::Error;

type Outcome<V> = Result<V, FlightError>;
type Entries<K, V> = Arc<Mutex<HashMap<K, Shared<BoxFuture<'static, Outcome<V>>>>>>;

/// The spawned computation did not produce a value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("in-flight computation aborted: {0}")]
pub struct FlightError(pub String);

pub struct InFlight<K, V> {
    entries: Entries<K, V>,
}

impl<K, V> Default for InFlight<K, V> {
    fn default() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

/// How a caller got its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Created the computation.
    Leader,
    /// Joined one already in flight.
    Follower,
}

impl<K, V> InFlight<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Shared<BoxFuture<'static, Outcome<V>>>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Await the computation for `key`, spawning it from `make` if none is
    /// in flight. `make` is only called by the leader. Must be called
    /// inside a tokio runtime.
    pub async fn run<F, Fut>(&self, key: K, make: F) -> (Outcome<V>, Role)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let (shared, role) = {
            let mut entries = self.lock();
            match entries.get(&key) {
                Some(shared) => (shared.clone(), Role::Follower),
                None => {
                    let computation = make();
                    let guard = RemoveOnDrop {
                        entries: Arc::clone(&self.entries),
                        key: Some(key.clone()),
                    };
                    // The entry is inserted before this lock is released, so
                    // the task's removal cannot overtake the insert.
                    let handle = tokio::spawn(async move {
                        let _guard = guard;
                        computation.await
                    });
                    let shared = handle
                        .map(|joined| joined.map_err(|e| FlightError(e.to_string())))
                        .boxed()
                        .shared();
                    entries.insert(key, shared.clone());
                    (shared, Role::Leader)
                }
            }
        };
        (shared.await, role)
    }

    /// Keys currently in flight.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Owned by the spawned computation; removes its entry on completion,
/// panic, or runtime shutdown.
struct RemoveOnDrop<K, V>
where
    K: Eq + Hash,
{
    entries: Entries<K, V>,
    key: Option<K>,
}

impl<K, V> Drop for RemoveOnDrop<K, V>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            entries.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_computation() {
        let flight: InFlight<String, u32> = InFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let make = || {
            let calls = Arc::clone(&calls);
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                7
            }
        };

        let (a, b) = tokio::join!(flight.run("k".into(), make()), flight.run("k".into(), make()));
        assert_eq!(a, (Ok(7), Role::Leader));
        assert_eq!(b, (Ok(7), Role::Follower));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(flight.is_empty());
    }

    #[tokio::test]
    async fn sequential_callers_recompute() {
        let flight: InFlight<&'static str, usize> = InFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));
        for expected in 1..=2 {
            let calls = Arc::clone(&calls);
            let (v, role) = flight
                .run("k", move || async move { calls.fetch_add(1, Ordering::SeqCst) + 1 })
                .await;
            assert_eq!((v, role), (Ok(expected), Role::Leader));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_leader_keeps_the_computation_in_flight() {
        let flight: InFlight<&'static str, u8> = InFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let slow = {
            let calls = Arc::clone(&calls);
            flight.run("k", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(100)).await;
                1
            })
        };
        let timed_out = tokio::time::timeout(Duration::from_millis(10), slow).await;
        assert!(timed_out.is_err());
        assert_eq!(flight.len(), 1);

        let late = {
            let calls = Arc::clone(&calls);
            flight.run("k", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                2
            })
        };
        assert_eq!(late.await, (Ok(1), Role::Follower));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(flight.is_empty());
    }

    #[tokio::test]
    async fn panicking_computation_is_reported_and_released() {
        let flight: InFlight<u8, u8> = InFlight::new();
        let (outcome, role) = flight
            .run(1, || async {
                if true {
                    panic!("boom");
                }
                0
            })
            .await;
        assert_eq!(role, Role::Leader);
        assert!(outcome.is_err());
        assert!(flight.is_empty());

        let (outcome, _) = flight.run(1, || async { 3 }).await;
        assert_eq!(outcome, Ok(3));
    }

    #[tokio::test(start_paused = true)]
    async fn different_keys_do_not_share() {
        let flight: InFlight<u8, u8> = InFlight::new();
        let (a, b) = tokio::join!(
            flight.run(1, || async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                10
            }),
            flight.run(2, || async { 20 })
        );
        assert_eq!(a, (Ok(10), Role::Leader));
        assert_eq!(b, (Ok(20), Role::Leader));
    }
}
