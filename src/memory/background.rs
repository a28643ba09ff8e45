//! Background side effects
//!
//! Counter updates run on a single worker fed by a bounded queue, so a save
//! or delete never waits on the counter store. Failures are logged, not
//! returned.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::core::storage::CounterService;

/// A queued side effect
#[derive(Debug)]
enum Job {
    Increment(String),
    Decrement(String),
    /// Answered once every job queued before it has run
    Barrier(oneshot::Sender<()>),
}

/// Handle to the background worker
pub struct BackgroundTasks {
    sender: RwLock<Option<mpsc::Sender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl BackgroundTasks {
    /// Start the worker with a queue of `capacity` jobs
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(counter: Arc<dyn CounterService>, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(run_worker(counter, receiver));

        BackgroundTasks {
            sender: RwLock::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Queue a counter increment for `user_id`
    pub async fn increment_count(&self, user_id: &str) {
        self.enqueue(Job::Increment(user_id.to_string())).await;
    }

    /// Queue a counter decrement for `user_id`
    pub async fn decrement_count(&self, user_id: &str) {
        self.enqueue(Job::Decrement(user_id.to_string())).await;
    }

    /// Wait until every job queued so far has run
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.enqueue(Job::Barrier(tx)).await {
            let _ = rx.await;
        }
    }

    /// Stop accepting jobs and wait for the queue to drain
    pub async fn shutdown(&self) {
        self.sender.write().await.take();

        if let Some(worker) = self.worker.lock().await.take() {
            if let Err(e) = worker.await {
                error!("Background worker panicked: {}", e);
            }
            info!("Background worker stopped");
        }
    }

    async fn enqueue(&self, job: Job) -> bool {
        let sender = self.sender.read().await.clone();
        let Some(sender) = sender else {
            warn!("Background queue is closed, dropping {:?}", job);
            return false;
        };

        if let Err(e) = sender.send(job).await {
            warn!("Background worker is gone, dropping {:?}", e.0);
            return false;
        }
        true
    }
}

async fn run_worker(counter: Arc<dyn CounterService>, mut receiver: mpsc::Receiver<Job>) {
    while let Some(job) = receiver.recv().await {
        match job {
            Job::Increment(user_id) => match counter.increment(&user_id).await {
                Ok(count) => debug!("Memory count for user={} is now {}", user_id, count),
                Err(e) => error!("Failed to increment memory count for user={}: {}", user_id, e),
            },
            Job::Decrement(user_id) => match counter.decrement(&user_id).await {
                Ok(count) => debug!("Memory count for user={} is now {}", user_id, count),
                Err(e) => error!("Failed to decrement memory count for user={}: {}", user_id, e),
            },
            Job::Barrier(done) => {
                let _ = done.send(());
            }
        }
    }
}
