//! Lock ordering for operations spanning two processes.
//!
//! Two process locks are always taken in ascending process ID order, whichever way round
//! the operation goes, so that two processes operating on each other cannot deadlock. The
//! same process named twice is locked once.

use spinning_top::{guard::SpinlockGuard, Spinlock};

pub enum PairGuard<'a, T> {
    Same(SpinlockGuard<'a, T>),
    Distinct {
        first: SpinlockGuard<'a, T>,
        second: SpinlockGuard<'a, T>,
    },
}

/// Lock `a` and `b`, ordered by their keys. In the `Distinct` case, `first` is `a`'s guard
/// and `second` is `b`'s, regardless of the order they were acquired in.
pub fn lock_pair<'a, K: Ord, T>(
    a_key: K,
    a: &'a Spinlock<T>,
    b_key: K,
    b: &'a Spinlock<T>,
) -> PairGuard<'a, T> {
    match a_key.cmp(&b_key) {
        core::cmp::Ordering::Equal => {
            assert!(core::ptr::eq(a, b), "two locks share one ordering key");
            PairGuard::Same(a.lock())
        }
        core::cmp::Ordering::Less => {
            let first = a.lock();
            let second = b.lock();
            PairGuard::Distinct { first, second }
        }
        core::cmp::Ordering::Greater => {
            let second = b.lock();
            let first = a.lock();
            PairGuard::Distinct { first, second }
        }
    }
}
