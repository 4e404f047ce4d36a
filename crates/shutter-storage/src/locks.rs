//! Per-object locking
//!
//! Ingests, deletes and the decrypt step of retrievals of one identifier
//! all touch its committed artifact, so they are serialized. A retrieval
//! gives the lock up once its stream is open. Distinct identifiers never
//! contend.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::object_id::ObjectId;

type LockTable = DashMap<ObjectId, Arc<Mutex<()>>>;

/// Table of async mutexes keyed by object identifier
///
/// Entries are created on first use and removed once the last holder or
/// waiter lets go, so the table only grows with concurrent activity.
#[derive(Debug, Clone, Default)]
pub struct ObjectLocks {
    table: Arc<LockTable>,
}

impl ObjectLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to an identifier
    pub async fn acquire(&self, id: ObjectId) -> ObjectLockGuard {
        let mutex = self.table.entry(id).or_default().clone();
        let guard = mutex.lock_owned().await;

        ObjectLockGuard {
            guard: Some(guard),
            id,
            table: self.table.clone(),
        }
    }

    /// Number of identifiers currently locked or waited on
    pub fn active(&self) -> usize {
        self.table.len()
    }
}

/// Exclusive access to one identifier, released on drop
///
/// Owns its mutex, so it does not borrow the table it came from.
#[derive(Debug)]
pub struct ObjectLockGuard {
    guard: Option<OwnedMutexGuard<()>>,
    id: ObjectId,
    table: Arc<LockTable>,
}

impl ObjectLockGuard {
    pub fn id(&self) -> &ObjectId {
        &self.id
    }
}

impl Drop for ObjectLockGuard {
    fn drop(&mut self) {
        // Release first so our own reference is not counted below
        drop(self.guard.take());
        // Shard is write-locked here, so no new waiter can clone the entry
        self.table
            .remove_if(&self.id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
