//! Hand-rolled single-flight: when several callers trigger
//! a session reconnect concurrently, only the first actually reconnects; the
//! rest await the same in-flight attempt instead of racing independent ones.
//! No crate in the dependency table provides this, so it's built on
//! `futures_util::future::Shared` the way `tokio::sync::Mutex` guards state
//! elsewhere in this workspace.

use std::future::Future;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;

pub struct SingleFlight<T: Clone + Send + 'static> {
    inflight: Mutex<Option<Shared<BoxFuture<'static, T>>>>,
}

impl<T: Clone + Send + 'static> Default for SingleFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> SingleFlight<T> {
    pub fn new() -> Self {
        Self { inflight: Mutex::new(None) }
    }

    /// Runs `make` to produce the work only if no attempt is already in
    /// flight; otherwise awaits the existing attempt's result.
    pub async fn run<F, Fut>(&self, make: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let mut guard = self.inflight.lock().await;
        if let Some(shared) = guard.as_ref() {
            let shared = shared.clone();
            drop(guard);
            return shared.await;
        }

        let shared: Shared<BoxFuture<'static, T>> = make().boxed().shared();
        *guard = Some(shared.clone());
        drop(guard);

        let result = shared.await;

        let mut guard = self.inflight.lock().await;
        *guard = None;
        drop(guard);

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn concurrent_callers_share_one_execution() {
        let flight: Arc<SingleFlight<u32>> = Arc::new(SingleFlight::new());
        let executions = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let flight = flight.clone();
            let executions = executions.clone();
            handles.push(tokio::spawn(async move {
                flight
                    .run(|| async move {
                        executions.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        42
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), 42);
        }
        assert_eq!(executions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn sequential_calls_each_run_independently() {
        let flight: SingleFlight<u32> = SingleFlight::new();
        let executions = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let executions = executions.clone();
            flight.run(|| async move { executions.fetch_add(1, Ordering::SeqCst) as u32 }).await;
        }

        assert_eq!(executions.load(Ordering::SeqCst), 3);
    }
}
