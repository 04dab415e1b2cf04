//! Per-user balance mutual exclusion. Two transfers touching the same user
//! on either end must not interleave their read-modify-write; acquiring in
//! ascending uuid order avoids deadlocks between mirrored transfers.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Default)]
pub struct BalanceLocks {
    table: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

/// Holds both balance guards for the lifetime of a critical section. When
/// `a == b` only `first` is populated.
pub struct BalancePairGuard {
    _first: OwnedMutexGuard<()>,
    _second: Option<OwnedMutexGuard<()>>,
}

impl BalanceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    async fn mutex_for(&self, id: Uuid) -> Arc<Mutex<()>> {
        let mut table = self.table.lock().await;
        table
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Acquire the two per-user locks in ascending uuid order, so that a
    /// concurrent transfer between the same two users (in either direction)
    /// always requests them in the same order.
    pub async fn lock_pair(&self, a: Uuid, b: Uuid) -> BalancePairGuard {
        let (first_id, second_id) = if a <= b { (a, b) } else { (b, a) };

        let first = self.mutex_for(first_id).await.lock_owned().await;

        if first_id == second_id {
            return BalancePairGuard {
                _first: first,
                _second: None,
            };
        }

        let second = self.mutex_for(second_id).await.lock_owned().await;
        BalancePairGuard {
            _first: first,
            _second: Some(second),
        }
    }
}
