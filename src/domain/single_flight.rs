use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use chrono::Local;

use crate::error::{Error, Result};

/// Default waiter poll interval. The cache memoizes computations running for
/// seconds to minutes, so waiters do not need sub-second wakeups.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
enum EntryState<V> {
    /// Some caller is currently running the computation for this key.
    InProgress,
    Ready(V),
    Failed(String),
}

/// Keyed memoization cache with single-flight semantics.
///
/// For a given key, across any number of concurrent callers, the producer
/// closure runs at most once; every other caller blocks until a result
/// (value or error) is available and then receives that exact result.
///
/// The state-check-and-mark transition is protected by a short-held mutex;
/// the potentially long computation runs outside of it, so one slow key never
/// blocks the others. Waiters poll at a fixed interval.
///
/// The cache is an explicit object: construct it once per process and hand a
/// reference to every worker that needs it. There is no implicit singleton.
pub struct SingleFlightCache<V: Clone> {
    entries: Mutex<HashMap<String, EntryState<V>>>,

    // Process-lifetime statistics.
    hits: AtomicU64,
    misses: AtomicU64,
    waits: AtomicU64,

    poll_interval: Duration,

    /// Injected append-only log receiving one line per blocking wait. The
    /// path is owned by the enclosing run, not by the cache.
    wait_log_path: Option<PathBuf>,
}

impl<V: Clone> SingleFlightCache<V> {
    pub fn new(poll_interval: Duration, wait_log_path: Option<PathBuf>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            waits: AtomicU64::new(0),
            poll_interval,
            wait_log_path,
        }
    }

    /// Returns the cached value for `key`, running `compute` if and only if
    /// no caller has produced (or is currently producing) one.
    ///
    /// - Ready entry: returns immediately, counts a hit.
    /// - Absent entry: this caller marks it in-progress, counts a miss, and
    ///   runs `compute` outside the lock.
    /// - In-progress entry: counts a wait (once), appends one line to the
    ///   wait log, and polls until a value or error is available.
    /// - Failed entry: returns the stored error without recomputation, for
    ///   every current and future caller, until `invalidate` clears the key.
    pub fn get<F>(&self, key: &str, compute: F) -> Result<V>
    where
        F: FnOnce() -> Result<V>,
    {
        let mut registered_wait = false;

        loop {
            let mut log_this_wait = false;

            {
                let mut entries = self.lock_entries();

                match entries.get(key) {
                    Some(EntryState::Ready(value)) => {
                        // A caller that already counted a wait is not also a hit;
                        // each call lands in exactly one of hits/misses/waits.
                        if !registered_wait {
                            self.hits.fetch_add(1, Ordering::Relaxed);
                        }
                        return Ok(value.clone());
                    }

                    Some(EntryState::Failed(message)) => {
                        return Err(Error::ComputeFailed { key: key.to_string(), message: message.clone() });
                    }

                    Some(EntryState::InProgress) => {
                        if !registered_wait {
                            registered_wait = true;
                            self.waits.fetch_add(1, Ordering::Relaxed);
                            log_this_wait = true;
                        }
                    }

                    None => {
                        entries.insert(key.to_string(), EntryState::InProgress);
                        self.misses.fetch_add(1, Ordering::Relaxed);
                        break;
                    }
                }
            }

            // File IO stays outside the lock; the mutex only covers the
            // state-check-and-mark transition.
            if log_this_wait {
                self.log_wait(key);
            }

            thread::sleep(self.poll_interval);
        }

        // This caller owns the computation now. Run it unlocked; it may take
        // arbitrarily long and must not block other keys.
        let produced = compute();

        let mut entries = self.lock_entries();

        match produced {
            Ok(value) => {
                entries.insert(key.to_string(), EntryState::Ready(value.clone()));
                Ok(value)
            }
            Err(error) => {
                let message = error.to_string();
                log::warn!("Computation for cache key '{}' failed: {}", key, message);

                entries.insert(key.to_string(), EntryState::Failed(message.clone()));
                Err(Error::ComputeFailed { key: key.to_string(), message })
            }
        }
    }

    /// Drops the entry for `key` so the next `get` recomputes it. This is the
    /// owner's retry path after a failure; the cache itself never retries.
    ///
    /// An in-progress entry is left alone: removing it would let a second
    /// computation start while the first is still running.
    pub fn invalidate(&self, key: &str) {
        let mut entries = self.lock_entries();

        match entries.get(key) {
            Some(EntryState::InProgress) => {
                log::warn!("Refusing to invalidate cache key '{}' while its computation is in progress.", key);
            }
            Some(_) => {
                entries.remove(key);
            }
            None => {}
        }
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn waits(&self) -> u64 {
        self.waits.load(Ordering::Relaxed)
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, EntryState<V>>> {
        // A poisoned map only means some producer panicked mid-update of an
        // unrelated key; the map itself is still consistent.
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn log_wait(&self, key: &str) {
        let Some(path) = &self.wait_log_path else {
            return;
        };

        let line = format!("[{}] waiting on key '{}'\n", Local::now().format("%Y-%m-%d %H:%M:%S"), key);

        let appended = OpenOptions::new().append(true).create(true).open(path).and_then(|mut file| file.write_all(line.as_bytes()));

        if let Err(e) = appended {
            log::warn!("Failed to append to cache wait log '{}': {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> SingleFlightCache<String> {
        SingleFlightCache::new(Duration::from_millis(5), None)
    }

    #[test]
    fn test_failure_is_sticky_until_invalidated() {
        let cache = cache();

        let first = cache.get("k", || Err(Error::InternalInvariant("boom".to_string())));
        assert!(matches!(first, Err(Error::ComputeFailed { .. })));

        // No silent retry: the stored failure keeps being served.
        let second = cache.get("k", || Ok("recovered".to_string()));
        assert!(matches!(second, Err(Error::ComputeFailed { ref message, .. }) if message.contains("boom")));

        cache.invalidate("k");

        let third = cache.get("k", || Ok("recovered".to_string())).unwrap();
        assert_eq!(third, "recovered");
    }

    #[test]
    fn test_distinct_keys_do_not_share_entries() {
        let cache = cache();

        cache.get("a", || Ok("va".to_string())).unwrap();
        cache.get("b", || Ok("vb".to_string())).unwrap();

        assert_eq!(cache.misses(), 2);
        assert_eq!(cache.get("a", || Ok("never".to_string())).unwrap(), "va");
        assert_eq!(cache.get("b", || Ok("never".to_string())).unwrap(), "vb");
    }
}
