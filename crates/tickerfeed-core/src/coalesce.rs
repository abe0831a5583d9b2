//! Request coalescing.
//!
//! Concurrent fetches that share a key join a single in-flight future. The
//! pending entry is removed by the shared future itself as soon as the
//! producer completes, before any waiter observes the result, so removal does
//! not depend on which waiter happens to drive the future.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::debug;

type PendingFetch<T> = Shared<BoxFuture<'static, T>>;

/// Table of in-flight fetches keyed by cache key.
pub struct Coalescer<T: Clone> {
    pending: Arc<Mutex<HashMap<String, PendingFetch<T>>>>,
}

impl<T: Clone> Clone for Coalescer<T> {
    fn clone(&self) -> Self {
        Self {
            pending: Arc::clone(&self.pending),
        }
    }
}

impl<T> Default for Coalescer<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Coalescer<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Runs `producer` unless a fetch for `key` is already in flight, in which
    /// case the caller awaits that fetch's outcome instead. Every waiter on a
    /// key receives the same resolved value.
    pub async fn run<F, Fut>(&self, key: &str, producer: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let shared = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(existing) = pending.get(key) {
                debug!(%key, "joining in-flight fetch");
                existing.clone()
            } else {
                let table = Arc::clone(&self.pending);
                let owned_key = key.to_owned();
                let work = producer();
                let fetch = async move {
                    let output = work.await;
                    table
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .remove(&owned_key);
                    output
                }
                .boxed()
                .shared();
                pending.insert(key.to_owned(), fetch.clone());
                fetch
            }
        };

        shared.await
    }

    /// Number of fetches currently in flight.
    pub fn in_flight(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
