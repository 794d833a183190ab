//! Request coalescing keyed by an arbitrary value
//!
//! The first caller for a key spawns the work and publishes its output
//! through a shared oneshot; callers arriving while it is in flight await the
//! same output. The spawned task removes the entry when the work completes,
//! whether or not anyone is still waiting.

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{FutureExt, Shared};
use tokio::sync::oneshot;

pub struct SingleFlight<K, T>
where
    K: Hash + Eq,
{
    in_flight: Arc<DashMap<K, Shared<oneshot::Receiver<T>>>>,
}

impl<K, T> SingleFlight<K, T>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(DashMap::new()),
        }
    }

    /// Run `work` for `key` unless a run is already in flight, in which case
    /// its output is awaited instead. The flag is `true` for joiners.
    ///
    /// The work runs on its own task, so dropping every caller neither stops
    /// it nor leaves its entry behind.
    pub async fn run<F, Fut>(&self, key: K, work: F) -> (T, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let (flight, leader) = match self.in_flight.entry(key.clone()) {
            Entry::Occupied(entry) => (entry.get().clone(), None),
            Entry::Vacant(entry) => {
                let (done, flight) = oneshot::channel();
                let flight = flight.shared();
                entry.insert(flight.clone());
                (flight, Some(done))
            }
        };

        let shared = leader.is_none();
        if let Some(done) = leader {
            let work = work();
            let in_flight = self.in_flight.clone();
            tokio::spawn(async move {
                let guard = RemoveOnDrop { in_flight, key };
                let output = work.await;
                drop(guard);
                let _ = done.send(output);
            });
        }

        match flight.await {
            Ok(output) => (output, shared),
            // The sender is only dropped without a value when the work panicked
            Err(_) => panic!("single-flight work panicked"),
        }
    }

    /// Keys with a run in flight
    pub fn len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }
}

/// Removes the entry once the work has finished or unwound
struct RemoveOnDrop<K, T>
where
    K: Hash + Eq,
{
    in_flight: Arc<DashMap<K, Shared<oneshot::Receiver<T>>>>,
    key: K,
}

impl<K, T> Drop for RemoveOnDrop<K, T>
where
    K: Hash + Eq,
{
    fn drop(&mut self) {
        self.in_flight.remove(&self.key);
    }
}

impl<K, T> Default for SingleFlight<K, T>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_calls_share_one_run() {
        let group = SingleFlight::<String, usize>::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let call = || {
            let runs = runs.clone();
            group.run("key".to_string(), move || async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                runs.fetch_add(1, Ordering::SeqCst) + 1
            })
        };

        let (first, second, third) = tokio::join!(call(), call(), call());

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(first, (1, false));
        assert_eq!(second, (1, true));
        assert_eq!(third, (1, true));
        assert!(group.is_empty());
    }

    #[tokio::test]
    async fn test_different_keys_run_independently() {
        let group = SingleFlight::<&'static str, &'static str>::new();

        let (a, b) = tokio::join!(
            group.run("a", || async { "first" }),
            group.run("b", || async { "second" }),
        );

        assert_eq!(a, ("first", false));
        assert_eq!(b, ("second", false));
    }

    #[tokio::test]
    async fn test_sequential_calls_run_again() {
        let group = SingleFlight::<&'static str, usize>::new();
        let runs = Arc::new(AtomicUsize::new(0));

        for expected in 1..=2 {
            let runs = runs.clone();
            let (output, shared) = group
                .run("key", move || async move { runs.fetch_add(1, Ordering::SeqCst) + 1 })
                .await;
            assert_eq!(output, expected);
            assert!(!shared);
        }

        assert_eq!(group.len(), 0);
    }

    #[tokio::test]
    async fn test_abandoned_runs_complete_and_are_removed() {
        let group = SingleFlight::<String, usize>::new();
        let runs = Arc::new(AtomicUsize::new(0));

        for i in 0..50 {
            let runs = runs.clone();
            let call = group.run(format!("user{}", i), move || async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                runs.fetch_add(1, Ordering::SeqCst)
            });
            assert!(tokio::time::timeout(Duration::from_millis(1), call)
                .await
                .is_err());
        }

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(group.is_empty());
        assert_eq!(runs.load(Ordering::SeqCst), 50);
    }

    #[tokio::test]
    async fn test_joiner_finishes_after_leader_is_dropped() {
        let group = SingleFlight::<&'static str, u8>::new();
        let work = || async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            7
        };

        let leader = group.run("key", work);
        assert!(tokio::time::timeout(Duration::from_millis(1), leader)
            .await
            .is_err());

        let (output, shared) = group.run("key", || async { 0 }).await;
        assert_eq!(output, 7);
        assert!(shared);
        assert!(group.is_empty());
    }

    #[tokio::test]
    async fn test_errors_are_shared_and_not_kept() {
        let group = SingleFlight::<&'static str, Result<u8, String>>::new();

        let call = || {
            group.run("key", || async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Err::<u8, _>("boom".to_string())
            })
        };
        let (first, second) = tokio::join!(call(), call());

        assert_eq!(first.0, Err("boom".to_string()));
        assert_eq!(second.0, Err("boom".to_string()));
        assert!(group.is_empty());

        let (third, shared) = group.run("key", || async { Ok(1) }).await;
        assert_eq!(third, Ok(1));
        assert!(!shared);
    }
}
