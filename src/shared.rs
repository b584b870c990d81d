//! Copy-on-write snapshot cell.
//!
//! Readers take an `Arc` snapshot and drop the lock straight away, so a
//! sample never holds a lock while it evaluates or dispatches. Writers clone
//! the current value, modify the clone and swap it in.

use parking_lot::RwLock;
use std::sync::Arc;

pub struct Shared<T> {
    current: RwLock<Arc<T>>,
}

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Shared {
            current: RwLock::new(Arc::new(value)),
        }
    }

    /// The current snapshot.
    pub fn load(&self) -> Arc<T> {
        Arc::clone(&self.current.read())
    }

    /// Replace the value outright.
    pub fn store(&self, value: T) {
        *self.current.write() = Arc::new(value);
    }
}

impl<T: Clone> Shared<T> {
    /// Apply `f` to a copy of the current value and publish the copy.
    ///
    /// The write lock is held for the duration of `f`, so concurrent updates
    /// are serialised; readers keep seeing the previous snapshot until the
    /// swap.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.current.write();
        let mut next = T::clone(&**guard);
        let result = f(&mut next);
        *guard = Arc::new(next);
        result
    }
}

impl<T: Default> Default for Shared<T> {
    fn default() -> Self {
        Shared::new(T::default())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Shared").field(&self.load()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_survives_update() {
        let cell = Shared::new(vec![1, 2]);
        let before = cell.load();
        cell.update(|v| v.push(3));
        assert_eq!(*before, vec![1, 2]);
        assert_eq!(*cell.load(), vec![1, 2, 3]);
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let cell = Arc::new(Shared::new(0_u32));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cell = Arc::clone(&cell);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        cell.update(|n| *n += 1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(*cell.load(), 400);
    }
}
