//! Token revocation registry
//!
//! Tracks revoked token identifiers until the token's natural expiry.
//! The registry is process-local and non-persistent: a fresh process has no
//! revocation history, so `is_revoked` answers `false` for anything it has
//! never seen.
//!
//! `InMemoryRevocationStore` keeps a min-heap ordered by expiry next to the
//! lookup map and drops expired entries lazily on every insert and lookup,
//! so memory is bounded by the number of live revoked tokens.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::jwt::now_secs;

/// Storage for revoked token identifiers
pub trait RevocationStore: Send + Sync {
    /// Revoke `token_id` until `expires_at` (Unix seconds).
    ///
    /// Idempotent. Returns `true` only for the call that inserted the entry,
    /// which lets callers implement check-and-revoke atomically.
    fn revoke(&self, token_id: &str, expires_at: u64) -> bool;

    /// Whether `token_id` is currently revoked
    fn is_revoked(&self, token_id: &str) -> bool;

    /// Number of entries currently held
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop entries whose token expired before `now`; returns how many were dropped
    fn purge_expired(&self, now: u64) -> usize;
}

type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

#[derive(Default)]
struct Entries {
    by_id: HashMap<String, u64>,
    by_expiry: BinaryHeap<Reverse<(u64, String)>>,
}

impl Entries {
    fn evict(&mut self, now: u64) -> usize {
        let mut evicted = 0;
        while let Some(Reverse((expires_at, _))) = self.by_expiry.peek() {
            if *expires_at >= now {
                break;
            }
            if let Some(Reverse((_, id))) = self.by_expiry.pop() {
                self.by_id.remove(&id);
                evicted += 1;
            }
        }
        evicted
    }
}

/// Mutex-guarded in-memory revocation store with lazy expiry eviction
pub struct InMemoryRevocationStore {
    entries: Mutex<Entries>,
    clock: Clock,
}

impl std::fmt::Debug for InMemoryRevocationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRevocationStore")
            .field("len", &self.len())
            .finish()
    }
}

impl Default for InMemoryRevocationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRevocationStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(now_secs))
    }

    /// Use a custom time source (Unix seconds) for eviction decisions
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            entries: Mutex::new(Entries::default()),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        // A panic while holding the lock cannot leave the map half-written
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RevocationStore for InMemoryRevocationStore {
    fn revoke(&self, token_id: &str, expires_at: u64) -> bool {
        let now = (self.clock)();
        let mut entries = self.lock();
        entries.evict(now);

        if entries.by_id.contains_key(token_id) {
            return false;
        }
        entries.by_id.insert(token_id.to_string(), expires_at);
        entries
            .by_expiry
            .push(Reverse((expires_at, token_id.to_string())));
        true
    }

    fn is_revoked(&self, token_id: &str) -> bool {
        let now = (self.clock)();
        let mut entries = self.lock();
        entries.evict(now);
        entries.by_id.contains_key(token_id)
    }

    fn len(&self) -> usize {
        self.lock().by_id.len()
    }

    fn purge_expired(&self, now: u64) -> usize {
        self.lock().evict(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn manual_clock(start: u64) -> (Arc<AtomicU64>, Clock) {
        let time = Arc::new(AtomicU64::new(start));
        let handle = time.clone();
        (time, Arc::new(move || handle.load(Ordering::SeqCst)))
    }

    #[test]
    fn test_revoke_and_lookup() {
        let store = InMemoryRevocationStore::new();
        let far_future = now_secs() + 3600;

        assert!(!store.is_revoked("a"));
        assert!(store.revoke("a", far_future));
        assert!(store.is_revoked("a"));
        assert!(!store.is_revoked("b"));
    }

    #[test]
    fn test_revoke_is_idempotent() {
        let store = InMemoryRevocationStore::new();
        let far_future = now_secs() + 3600;

        assert!(store.revoke("a", far_future));
        assert!(!store.revoke("a", far_future));
        assert!(store.is_revoked("a"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_entries_evicted_after_expiry() {
        let (time, clock) = manual_clock(1_000);
        let store = InMemoryRevocationStore::with_clock(clock);

        store.revoke("short", 1_010);
        store.revoke("long", 5_000);
        assert_eq!(store.len(), 2);

        // Still held at the exact expiry second
        time.store(1_010, Ordering::SeqCst);
        assert!(store.is_revoked("short"));

        time.store(1_011, Ordering::SeqCst);
        assert!(!store.is_revoked("short"));
        assert!(store.is_revoked("long"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_purge_expired() {
        let (_time, clock) = manual_clock(0);
        let store = InMemoryRevocationStore::with_clock(clock);
        for (i, exp) in [10u64, 20, 30, 40].iter().enumerate() {
            store.revoke(&format!("t{i}"), *exp);
        }

        assert_eq!(store.purge_expired(25), 2);
        assert_eq!(store.len(), 2);
        assert_eq!(store.purge_expired(25), 0);
        assert!(store.is_revoked("t3"));
    }

    #[test]
    fn test_concurrent_revocations_are_not_lost() {
        let store = Arc::new(InMemoryRevocationStore::new());
        let exp = now_secs() + 3600;

        std::thread::scope(|scope| {
            for worker in 0..8 {
                let store = store.clone();
                scope.spawn(move || {
                    for i in 0..250 {
                        store.revoke(&format!("w{worker}-{i}"), exp);
                    }
                });
            }
        });

        assert_eq!(store.len(), 2000);
        assert!(store.is_revoked("w7-249"));
    }

    #[test]
    fn test_concurrent_revoke_of_same_id_has_one_winner() {
        let store = Arc::new(InMemoryRevocationStore::new());
        let exp = now_secs() + 3600;
        let winners = AtomicU64::new(0);

        std::thread::scope(|scope| {
            for _ in 0..16 {
                scope.spawn(|| {
                    if store.revoke("shared", exp) {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }
}
