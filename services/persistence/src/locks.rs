//! Per-position mutual-exclusion lock table
//!
//! Set-if-absent with a short TTL, the in-process rendition of a
//! distributed `SET NX EX` lock. The enforcer, the watcher, and the manual
//! close path all acquire here before mutating a position; failure to
//! acquire means another evaluator is already handling it and the caller
//! skips (a no-op, not an error). The TTL bounds how long a crashed or
//! stalled holder can block the position.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use types::ids::PositionId;

/// Default lock expiry, matching the closure protocol's "few seconds".
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(3);

#[derive(Debug)]
struct LockEntry {
    expires_at: Instant,
    /// Which acquisition owns this entry; release only removes its own
    token: u64,
}

/// TTL'd set-if-absent lock table keyed by position id.
#[derive(Debug)]
pub struct PositionLockTable {
    entries: Arc<DashMap<PositionId, LockEntry>>,
    next_token: AtomicU64,
    ttl: Duration,
}

impl PositionLockTable {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            next_token: AtomicU64::new(1),
            ttl,
        }
    }

    pub fn with_default_ttl() -> Self {
        Self::new(DEFAULT_LOCK_TTL)
    }

    /// Try to take the lock for a position.
    ///
    /// Returns `None` when an unexpired entry exists (contention); expired
    /// entries are reclaimed on contact. The guard releases on drop.
    pub fn try_acquire(&self, position_id: PositionId) -> Option<PositionLockGuard> {
        let now = Instant::now();
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let mut acquired = false;

        self.entries
            .entry(position_id)
            .and_modify(|entry| {
                if entry.expires_at <= now {
                    entry.expires_at = now + self.ttl;
                    entry.token = token;
                    acquired = true;
                }
            })
            .or_insert_with(|| {
                acquired = true;
                LockEntry {
                    expires_at: now + self.ttl,
                    token,
                }
            });

        if acquired {
            Some(PositionLockGuard {
                entries: Arc::clone(&self.entries),
                position_id,
                token,
            })
        } else {
            None
        }
    }

    /// Number of live (possibly expired, not yet reclaimed) entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for PositionLockTable {
    fn default() -> Self {
        Self::with_default_ttl()
    }
}

/// Held lock on one position; released on drop.
#[derive(Debug)]
pub struct PositionLockGuard {
    entries: Arc<DashMap<PositionId, LockEntry>>,
    position_id: PositionId,
    token: u64,
}

impl PositionLockGuard {
    pub fn position_id(&self) -> PositionId {
        self.position_id
    }
}

impl Drop for PositionLockGuard {
    fn drop(&mut self) {
        // Only remove the entry this guard created; if the TTL expired and
        // another evaluator reclaimed the slot, their lock stands.
        self.entries
            .remove_if(&self.position_id, |_, entry| entry.token == self.token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_and_release() {
        let table = PositionLockTable::with_default_ttl();
        let id = PositionId::new();

        let guard = table.try_acquire(id);
        assert!(guard.is_some());

        drop(guard);
        assert!(table.try_acquire(id).is_some(), "released lock re-acquirable");
    }

    #[test]
    fn test_contention_skips() {
        let table = PositionLockTable::with_default_ttl();
        let id = PositionId::new();

        let _held = table.try_acquire(id).unwrap();
        assert!(table.try_acquire(id).is_none(), "second acquire must fail");
    }

    #[test]
    fn test_independent_positions_do_not_contend() {
        let table = PositionLockTable::with_default_ttl();
        let a = PositionId::new();
        let b = PositionId::new();

        let _ga = table.try_acquire(a).unwrap();
        assert!(table.try_acquire(b).is_some());
    }

    #[test]
    fn test_expired_lock_reclaimed() {
        let table = PositionLockTable::new(Duration::from_millis(10));
        let id = PositionId::new();

        let guard = table.try_acquire(id).unwrap();
        std::thread::sleep(Duration::from_millis(20));

        // TTL elapsed: a new evaluator reclaims the slot
        let reclaimed = table.try_acquire(id);
        assert!(reclaimed.is_some(), "expired entry must be reclaimable");

        // The stale guard's release must not free the reclaimed lock
        drop(guard);
        assert!(table.try_acquire(id).is_none());
    }
}
