//! Per-destination admission tokens.
//!
//! A [`TokenBucket`] counts how many more connections may be opened to one
//! destination. Tokens are handed out as [`Permit`] values that give their
//! token back when dropped, so a token can never be returned twice.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Bounded counter of connection slots for a single destination.
///
/// Invariant: `0 <= available <= capacity`.
pub struct TokenBucket {
    available: Mutex<usize>,
    capacity: usize,
}

impl TokenBucket {
    pub fn new(capacity: usize) -> Self {
        Self {
            available: Mutex::new(capacity),
            capacity,
        }
    }

    /// Maximum number of tokens this bucket hands out at once.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Tokens currently free for opening a new connection.
    pub fn available(&self) -> usize {
        *self.lock()
    }

    /// Take a token without blocking. Returns `None` when the bucket is empty.
    pub fn try_acquire(self: &Arc<Self>) -> Option<Permit> {
        if !self.acquire() {
            return None;
        }
        Some(Permit {
            bucket: Arc::downgrade(self),
        })
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        self.available.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn acquire(&self) -> bool {
        let mut available = self.lock();
        if *available == 0 {
            tracing::trace!("token bucket empty");
            return false;
        }
        *available -= 1;
        tracing::trace!(available = *available, "token acquired");
        true
    }

    fn release(&self) {
        let mut available = self.lock();
        if *available >= self.capacity {
            tracing::warn!(
                capacity = self.capacity,
                "token released into a full bucket; ignoring"
            );
            return;
        }
        *available += 1;
        tracing::trace!(available = *available, "token released");
    }
}

impl fmt::Debug for TokenBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenBucket")
            .field("available", &self.available())
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// One acquired token. Dropping it returns the token to its bucket.
///
/// The permit only holds a weak reference, so an outstanding connection
/// never keeps its pool alive.
pub struct Permit {
    bucket: Weak<TokenBucket>,
}

impl Drop for Permit {
    fn drop(&mut self) {
        if let Some(bucket) = self.bucket.upgrade() {
            bucket.release();
        }
    }
}

impl fmt::Debug for Permit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Permit").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_until_empty() {
        let bucket = Arc::new(TokenBucket::new(2));
        let first = bucket.try_acquire();
        let second = bucket.try_acquire();
        assert!(first.is_some());
        assert!(second.is_some());
        assert_eq!(bucket.available(), 0);

        // Empty bucket reports failure immediately.
        assert!(bucket.try_acquire().is_none());
        assert_eq!(bucket.available(), 0);
    }

    #[test]
    fn test_drop_releases() {
        let bucket = Arc::new(TokenBucket::new(1));
        let permit = bucket.try_acquire().unwrap();
        assert_eq!(bucket.available(), 0);
        drop(permit);
        assert_eq!(bucket.available(), 1);
        assert!(bucket.try_acquire().is_some());
    }

    #[test]
    fn test_release_saturates_at_capacity() {
        let bucket = Arc::new(TokenBucket::new(2));
        bucket.release();
        assert_eq!(bucket.available(), bucket.capacity());

        let permit = bucket.try_acquire().unwrap();
        bucket.release();
        bucket.release();
        assert_eq!(bucket.available(), 2);

        // The permit's own release is absorbed too.
        drop(permit);
        assert_eq!(bucket.available(), 2);
    }

    #[test]
    fn test_zero_capacity_never_admits() {
        let bucket = Arc::new(TokenBucket::new(0));
        assert!(bucket.try_acquire().is_none());
    }

    #[test]
    fn test_permit_outliving_bucket() {
        let bucket = Arc::new(TokenBucket::new(1));
        let permit = bucket.try_acquire().unwrap();
        drop(bucket);
        // Nothing to release into; must not panic.
        drop(permit);
    }

    #[test]
    fn test_concurrent_accounting() {
        let bucket = Arc::new(TokenBucket::new(4));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let bucket = Arc::clone(&bucket);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        if let Some(permit) = bucket.try_acquire() {
                            assert!(bucket.available() < bucket.capacity());
                            drop(permit);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(bucket.available(), 4);
    }
}
