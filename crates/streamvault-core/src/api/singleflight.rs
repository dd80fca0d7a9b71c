//! Operation deduplication: at most one outstanding instance of an async
//! operation, with later callers attaching to its result.

use std::future::Future;
use std::sync::{Arc, Weak};

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;
use tracing::debug;

type Flight<T> = Shared<BoxFuture<'static, T>>;

struct Slot<T: Clone> {
    next_id: u64,
    active: Option<(u64, Flight<T>)>,
}

/// A slot holding at most one in-flight operation.
///
/// `run` either installs a new operation (slot empty) or hands back a clone
/// of the one already running. The installed operation clears the slot
/// itself when it settles, so the next caller after that starts fresh.
pub struct SingleFlight<T: Clone> {
    slot: Arc<Mutex<Slot<T>>>,
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot {
                next_id: 0,
                active: None,
            })),
        }
    }

    /// Run `start()`'s future unless one is already in flight, in which case
    /// wait for that one instead. Every caller gets a clone of the output.
    pub async fn run<F, Fut>(&self, start: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let flight = {
            let mut guard = self.slot.lock().await;
            let slot = &mut *guard;
            match slot.active {
                Some((id, ref flight)) => {
                    debug!(flight = id, "Joining in-flight operation");
                    flight.clone()
                }
                None => {
                    let id = slot.next_id;
                    slot.next_id += 1;
                    let flight = Self::install(Arc::downgrade(&self.slot), id, start());
                    slot.active = Some((id, flight.clone()));
                    debug!(flight = id, "Started operation");
                    flight
                }
            }
        };
        flight.await
    }

    /// Whether an operation is currently in flight.
    pub async fn is_active(&self) -> bool {
        self.slot.lock().await.active.is_some()
    }

    fn install<Fut>(slot: Weak<Mutex<Slot<T>>>, id: u64, operation: Fut) -> Flight<T>
    where
        Fut: Future<Output = T> + Send + 'static,
    {
        async move {
            let output = operation.await;
            if let Some(slot) = slot.upgrade() {
                let mut slot = slot.lock().await;
                if slot.active.as_ref().is_some_and(|(active, _)| *active == id) {
                    slot.active = None;
                }
            }
            output
        }
        .boxed()
        .shared()
    }
}

impl<T> Default for SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::Semaphore;

    use super::*;

    #[tokio::test]
    async fn test_concurrent_callers_share_one_operation() {
        let flight = Arc::new(SingleFlight::<Result<u32, String>>::new());
        let starts = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Semaphore::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let flight = flight.clone();
            let starts = starts.clone();
            let gate = gate.clone();
            handles.push(tokio::spawn(async move {
                flight
                    .run(move || async move {
                        starts.fetch_add(1, Ordering::SeqCst);
                        let _permit = gate.acquire().await.map_err(|e| e.to_string())?;
                        Ok(7)
                    })
                    .await
            }));
        }

        while !flight.is_active().await {
            tokio::task::yield_now().await;
        }
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        gate.add_permits(10);

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(7));
        }
        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert!(!flight.is_active().await);
    }

    #[tokio::test]
    async fn test_settled_operation_frees_the_slot() {
        let flight = SingleFlight::<Result<(), String>>::new();
        let starts = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let starts = starts.clone();
            let result = flight
                .run(move || async move {
                    starts.fetch_add(1, Ordering::SeqCst);
                    Err("refresh rejected".to_string())
                })
                .await;
            assert_eq!(result, Err("refresh rejected".to_string()));
            assert!(!flight.is_active().await);
        }
        assert_eq!(starts.load(Ordering::SeqCst), 3);
    }
}
