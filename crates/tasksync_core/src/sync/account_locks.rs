//! Per-account serialisation.
//!
//! Two runs for the same account must not interleave; runs for different
//! accounts may. Each account key maps to its own mutex, created on first use.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Registry of one mutex per account key.
#[derive(Debug, Default)]
pub struct AccountLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, account_key: &str) -> Arc<Mutex<()>> {
        // The mutexes guard no data, so a poisoned lock is still usable.
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(account_key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Runs `work` while holding the lock for `account_key`.
    pub fn with_account<T>(&self, account_key: &str, work: impl FnOnce() -> T) -> T {
        let lock = self.lock_for(account_key);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        work()
    }

    /// Number of accounts that have been locked at least once.
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::AccountLocks;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn same_account_runs_never_overlap() {
        let locks = Arc::new(AccountLocks::new());
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let active = Arc::clone(&active);
                let max_seen = Arc::clone(&max_seen);
                thread::spawn(move || {
                    locks.with_account("acct1", || {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(10));
                        active.fetch_sub(1, Ordering::SeqCst);
                    });
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(locks.len(), 1);
    }

    #[test]
    fn different_accounts_run_concurrently() {
        let locks = Arc::new(AccountLocks::new());
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = ["acct1", "acct2"]
            .into_iter()
            .map(|key| {
                let locks = Arc::clone(&locks);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    // Both closures must be inside their lock at the same time
                    // for the barrier to release.
                    locks.with_account(key, || {
                        barrier.wait();
                    });
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(locks.len(), 2);
    }
}
