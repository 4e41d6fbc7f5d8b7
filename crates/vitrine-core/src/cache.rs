//! Proximity cache.
//!
//! A bounded registry of images currently holding decoded and encoded
//! payloads. When it is full and another image is about to become resident,
//! one entry is evicted based on its position relative to the incoming one:
//!
//! 1. distance = `cached position - incoming position`
//! 2. if some entry sits 2 or more places behind, evict the one furthest behind
//! 3. otherwise evict the one furthest ahead
//!
//! Browsing is assumed to be mostly forward, so entries far behind go first
//! while the immediate predecessor survives. Ties go to the entry that was
//! admitted first.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

/// Something that can hold a payload in the cache.
pub trait Resident: Send + Sync {
    /// Position in the listing, used to compute eviction distance.
    fn position(&self) -> usize;

    /// Drop the in-memory payload. Called with the registry locked.
    fn release(&self);
}

/// Pick the entry to evict for `incoming`, as an index into `positions`.
///
/// Returns `None` only when `positions` is empty.
pub fn select_victim(positions: &[usize], incoming: usize) -> Option<usize> {
    let distances: Vec<i64> = positions
        .iter()
        .map(|&p| p as i64 - incoming as i64)
        .collect();

    let min = *distances.iter().min()?;
    let target = if min <= -2 {
        min
    } else {
        *distances.iter().max()?
    };
    distances.iter().position(|&d| d == target)
}

/// Shared, bounded registry of resident entries.
pub struct CacheRegistry<T: Resident> {
    capacity: usize,
    entries: Mutex<Vec<Arc<T>>>,
}

impl<T: Resident> CacheRegistry<T> {
    /// A registry holding at most `capacity` entries (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn contains(&self, entry: &Arc<T>) -> bool {
        self.lock().iter().any(|e| Arc::ptr_eq(e, entry))
    }

    /// Positions of resident entries in admission order.
    pub fn positions(&self) -> Vec<usize> {
        self.lock().iter().map(|e| e.position()).collect()
    }

    /// Evict one entry if the registry is full, ahead of admitting `incoming`.
    pub fn make_room(&self, incoming: usize) -> Option<Arc<T>> {
        let mut entries = self.lock();
        if entries.len() < self.capacity {
            return None;
        }
        Self::evict_one(&mut entries, incoming)
    }

    /// Admit `entry`, evicting as needed so the bound holds.
    ///
    /// `install` runs with the registry locked, right before the entry is
    /// added, so residency and membership change together. Entries already
    /// present are left alone. Returns the evicted entries.
    pub fn admit(&self, entry: Arc<T>, install: impl FnOnce(&T)) -> Vec<Arc<T>> {
        let mut entries = self.lock();
        if entries.iter().any(|e| Arc::ptr_eq(e, &entry)) {
            return Vec::new();
        }

        let mut evicted = Vec::new();
        while entries.len() >= self.capacity {
            match Self::evict_one(&mut entries, entry.position()) {
                Some(victim) => evicted.push(victim),
                None => break,
            }
        }

        install(&entry);
        entries.push(entry);
        evicted
    }

    /// Release and forget every entry.
    pub fn clear(&self) {
        let mut entries = self.lock();
        for entry in entries.drain(..) {
            entry.release();
        }
    }

    fn evict_one(entries: &mut Vec<Arc<T>>, incoming: usize) -> Option<Arc<T>> {
        let positions: Vec<usize> = entries.iter().map(|e| e.position()).collect();
        let index = select_victim(&positions, incoming)?;
        let victim = entries.remove(index);
        victim.release();
        debug!(evicted = victim.position(), incoming, "cache eviction");
        Some(victim)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
