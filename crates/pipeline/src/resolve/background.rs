//! Bounded pool for fire-and-forget resolutions.

use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// At most `max_concurrent` tasks run at once and at most `max_queued` more
/// wait for a slot. Anything beyond that is dropped.
#[derive(Debug, Clone)]
pub struct BackgroundPool {
    capacity: usize,
    slots: Arc<Semaphore>,
    workers: Arc<Semaphore>,
}
impl BackgroundPool {
    pub fn new(max_concurrent: usize, max_queued: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        let capacity = max_concurrent + max_queued;
        Self {
            capacity,
            slots: Arc::new(Semaphore::new(capacity)),
            workers: Arc::new(Semaphore::new(max_concurrent)),
        }
    }

    /// Queue `task`, or return `None` if the queue is full.
    pub fn spawn<F>(&self, task: F) -> Option<JoinHandle<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let Ok(slot) = self.slots.clone().try_acquire_owned() else {
            tracing::warn!("Background queue full, dropping cover resolution");
            return None;
        };
        let workers = self.workers.clone();
        Some(tokio::spawn(async move {
            let _slot = slot;
            // The semaphore is never closed, so this always holds a permit.
            let _permit = workers.acquire_owned().await;
            task.await
        }))
    }

    /// Tasks queued or running.
    pub fn in_flight(&self) -> usize {
        self.capacity.saturating_sub(self.slots.available_permits())
    }
}

/// Run `task`, turning a panic into an error message.
pub async fn catch_panic<F: Future>(task: F) -> Result<F::Output, String> {
    AssertUnwindSafe(task).catch_unwind().await.map_err(panic_message)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => (*message).to_string(),
            Err(_) => "unknown panic".to_string(),
        },
    }
}
