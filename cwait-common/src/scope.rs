//! Scoped ownership of test resources with guaranteed release.

use std::ops::{Deref, DerefMut};

/// Owns a value and runs `release` on it exactly once when dropped,
/// including during unwinding.
pub struct Scoped<T, F: FnOnce(&mut T)> {
    value: T,
    release: Option<F>,
}

impl<T, F: FnOnce(&mut T)> Scoped<T, F> {
    pub fn new(value: T, release: F) -> Self {
        Self {
            value,
            release: Some(release),
        }
    }

    /// Skip the release action (e.g. the test deleted the resource itself).
    pub fn disarm(&mut self) {
        self.release = None;
    }

    pub fn is_armed(&self) -> bool {
        self.release.is_some()
    }

    /// Run the release action now and return the value.
    pub fn release(mut self) -> T
    where
        T: Default,
    {
        if let Some(release) = self.release.take() {
            release(&mut self.value);
        }
        std::mem::take(&mut self.value)
    }
}

impl<T, F: FnOnce(&mut T)> Deref for Scoped<T, F> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T, F: FnOnce(&mut T)> DerefMut for Scoped<T, F> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T, F: FnOnce(&mut T)> Drop for Scoped<T, F> {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release(&mut self.value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::panic::{AssertUnwindSafe, catch_unwind};

    #[test]
    fn test_release_runs_on_drop() {
        let released = Cell::new(0);
        {
            let guard = Scoped::new(7u64, |_| released.set(released.get() + 1));
            assert_eq!(*guard, 7);
        }
        assert_eq!(released.get(), 1);
    }

    #[test]
    fn test_disarm_skips_release() {
        let released = Cell::new(false);
        {
            let mut guard = Scoped::new(1u64, |_| released.set(true));
            guard.disarm();
            assert!(!guard.is_armed());
        }
        assert!(!released.get());
    }

    #[test]
    fn test_explicit_release_runs_once() {
        let released = Cell::new(0);
        let guard = Scoped::new(vec![1, 2], |v: &mut Vec<i32>| {
            v.clear();
            released.set(released.get() + 1);
        });
        let value = guard.release();
        assert!(value.is_empty());
        assert_eq!(released.get(), 1);
    }

    #[test]
    fn test_release_runs_during_unwind() {
        let released = Cell::new(false);
        let result = catch_unwind(AssertUnwindSafe(|| {
            let _guard = Scoped::new((), |_| released.set(true));
            panic!("test body failed");
        }));
        assert!(result.is_err());
        assert!(released.get());
    }

    #[test]
    fn test_deref_mut() {
        let mut guard = Scoped::new(String::from("vm"), |_| {});
        guard.push_str("-1");
        assert_eq!(guard.as_str(), "vm-1");
    }
}
