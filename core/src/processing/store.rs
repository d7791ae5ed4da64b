use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::interface::fix::Fix;

/// Append-only history of received fixes, in receipt order.
///
/// One writer appends while any number of readers take snapshots. A snapshot
/// is an owned copy, so readers never hold the lock while iterating.
#[derive(Default)]
pub struct FixStore {
    fixes: RwLock<Vec<Fix>>,
}

impl FixStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fixes: RwLock::new(Vec::with_capacity(capacity)),
        }
    }

    pub fn append(&self, fix: Fix) {
        self.write().push(fix);
    }

    /// Copy of every fix appended before this call.
    pub fn snapshot(&self) -> Vec<Fix> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn last(&self) -> Option<Fix> {
        self.read().last().copied()
    }

    // A push either completed or never started, so a poisoned lock still
    // guards a well-formed history.
    fn read(&self) -> RwLockReadGuard<'_, Vec<Fix>> {
        self.fixes.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Fix>> {
        self.fixes.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn snapshot_preserves_append_order() {
        let store = FixStore::new();
        store.append(Fix::new(1.0, 1.0));
        store.append(Fix::new(2.0, 2.0));
        store.append(Fix::new(1.0, 1.0));
        assert_eq!(
            store.snapshot(),
            vec![Fix::new(1.0, 1.0), Fix::new(2.0, 2.0), Fix::new(1.0, 1.0)]
        );
        assert_eq!(store.last(), Some(Fix::new(1.0, 1.0)));
    }

    #[test]
    fn snapshot_is_independent_of_later_appends() {
        let store = FixStore::new();
        store.append(Fix::origin());
        let snapshot = store.snapshot();
        store.append(Fix::new(0.0, 1.0));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn concurrent_snapshots_see_growing_prefixes() {
        let store = Arc::new(FixStore::with_capacity(1000));
        let writer_store = store.clone();
        let writer = thread::spawn(move || {
            for i in 0..1000 {
                writer_store.append(Fix::new(0.0, i as f64 * 0.001));
            }
        });

        let mut previous = 0;
        let mut observed = Vec::new();
        while observed.len() < 1000 {
            observed = store.snapshot();
            assert!(observed.len() >= previous);
            for (i, fix) in observed.iter().enumerate() {
                assert_eq!(fix.longitude, i as f64 * 0.001);
            }
            previous = observed.len();
        }
        writer.join().unwrap();
        assert_eq!(store.len(), 1000);
    }
}
