//! Per-user consolidation locks
//!
//! Saves for the same user run "find nearest, classify, write" one at a
//! time. Locks for users that have gone quiet are evicted by moka.

use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Keyed table of async mutexes
#[derive(Clone)]
pub struct UserLocks {
    locks: Cache<String, Arc<Mutex<()>>>,
}

impl UserLocks {
    /// Create a lock table whose entries expire after `idle` without use
    pub fn new(idle: Duration) -> Self {
        UserLocks {
            locks: Cache::builder().time_to_idle(idle).build(),
        }
    }

    /// Wait for and take the lock of `user_id`
    pub async fn acquire(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .get_with(user_id.to_string(), async { Arc::new(Mutex::new(())) })
            .await;
        lock.lock_owned().await
    }
}
