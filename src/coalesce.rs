//! Request Coalescing
//!
//! Collapses concurrent operations on the same key into a single execution.
//! Every caller that arrives while an operation is in flight waits for it and
//! receives a clone of the same outcome.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::OnceCell;

use crate::error::Result;

type Call<T> = Arc<OnceCell<Result<T>>>;

// == Flight ==
/// In-flight operations of one class, keyed by cache key.
pub struct Flight<T> {
    calls: Mutex<HashMap<String, Call<T>>>,
}

impl<T: Clone> Flight<T> {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }

    // == Run ==
    /// Runs `op` unless an operation for `key` is already in flight, in which
    /// case the caller waits for that one and shares its result.
    ///
    /// There is no timeout here; the wrapped operation bounds itself.
    pub async fn run<F, Fut>(&self, key: &str, op: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let call = {
            let mut calls = self.calls.lock();
            calls
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        // If the executing caller is dropped before finishing, the cell stays
        // empty and the next waiter in line runs its own `op` instead.
        let result = call.get_or_init(op).await.clone();

        let mut calls = self.calls.lock();
        if calls.get(key).is_some_and(|current| Arc::ptr_eq(current, &call)) {
            calls.remove(key);
        }
        result
    }

    /// Number of keys with an operation in flight.
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }
}

impl<T: Clone> Default for Flight<T> {
    fn default() -> Self {
        Self::new()
    }
}

// == Request Coalescer ==
/// Independent flights per operation class.
///
/// A read and a write on the same key never wait on each other. Deletes have
/// their own class so a concurrent set and delete of one key both execute.
/// Reads served for a peer (`owner_reads`) never join a read this node has
/// delegated, or two nodes with diverging rings could wait on each other.
#[derive(Default)]
pub struct RequestCoalescer {
    pub reads: Flight<(Bytes, u64)>,
    pub owner_reads: Flight<(Bytes, u64)>,
    pub writes: Flight<()>,
    pub deletes: Flight<()>,
}

impl RequestCoalescer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::task::JoinSet;

    #[tokio::test]
    async fn test_single_call_runs_op() {
        let flight: Flight<u32> = Flight::new();
        let result = flight.run("k", || async { Ok(7) }).await;

        assert_eq!(result, Ok(7));
        assert_eq!(flight.in_flight(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_calls_share_one_execution() {
        let flight: Arc<Flight<String>> = Arc::new(Flight::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let mut tasks = JoinSet::new();

        for _ in 0..16 {
            let flight = flight.clone();
            let calls = calls.clone();
            tasks.spawn(async move {
                flight
                    .run("hot", || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok("value".to_string())
                    })
                    .await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            assert_eq!(joined.unwrap(), Ok("value".to_string()));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(flight.in_flight(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_waiters_share_the_error() {
        let flight: Arc<Flight<u32>> = Arc::new(Flight::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let mut tasks = JoinSet::new();

        for _ in 0..8 {
            let flight = flight.clone();
            let calls = calls.clone();
            tasks.spawn(async move {
                flight
                    .run("bad", || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Err(CacheError::NotFound("bad".to_string()))
                    })
                    .await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            assert_eq!(joined.unwrap(), Err(CacheError::NotFound("bad".to_string())));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_different_keys_run_independently() {
        let flight: Flight<String> = Flight::new();

        let (a, b) = tokio::join!(
            flight.run("a", || async { Ok("A".to_string()) }),
            flight.run("b", || async { Ok("B".to_string()) }),
        );

        assert_eq!(a, Ok("A".to_string()));
        assert_eq!(b, Ok("B".to_string()));
    }

    #[tokio::test]
    async fn test_sequential_calls_run_again() {
        let flight: Flight<usize> = Flight::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            flight
                .run("k", || async { Ok(calls.fetch_add(1, Ordering::SeqCst)) })
                .await
                .unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_read_and_write_classes_do_not_block_each_other() {
        let coalescer = RequestCoalescer::new();

        // The write completes while the read on the same key is still pending.
        let read = coalescer.reads.run("k", || async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok((Bytes::from_static(b"v"), 0))
        });
        let write = async {
            let result = coalescer.writes.run("k", || async { Ok(()) }).await;
            assert_eq!(coalescer.reads.in_flight(), 1);
            result
        };

        let (read, write) = tokio::join!(read, write);
        assert!(read.is_ok());
        assert!(write.is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_leader_hands_over() {
        let flight: Arc<Flight<u32>> = Arc::new(Flight::new());

        let leader = {
            let flight = flight.clone();
            tokio::spawn(async move {
                flight
                    .run("k", || async {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        Ok(1)
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        leader.abort();
        let _ = leader.await;

        let result = flight.run("k", || async { Ok(2) }).await;
        assert_eq!(result, Ok(2));
        assert_eq!(flight.in_flight(), 0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        // Any number of overlapping callers observe one execution and one result.
        #[test]
        fn prop_overlapping_callers_share_one_execution(callers in 1usize..24) {
            let (calls, results) = tokio_test::block_on(async {
                let flight: Arc<Flight<usize>> = Arc::new(Flight::new());
                let calls = Arc::new(AtomicUsize::new(0));
                let mut tasks = JoinSet::new();

                for _ in 0..callers {
                    let flight = flight.clone();
                    let calls = calls.clone();
                    tasks.spawn(async move {
                        flight
                            .run("k", || async move {
                                tokio::time::sleep(Duration::from_millis(20)).await;
                                Ok(calls.fetch_add(1, Ordering::SeqCst))
                            })
                            .await
                    });
                }

                let mut results = Vec::new();
                while let Some(joined) = tasks.join_next().await {
                    results.push(joined.unwrap());
                }
                (calls.load(Ordering::SeqCst), results)
            });

            prop_assert_eq!(calls, 1);
            prop_assert_eq!(results.len(), callers);
            prop_assert!(results.iter().all(|r| *r == Ok(0)));
        }
    }
}
