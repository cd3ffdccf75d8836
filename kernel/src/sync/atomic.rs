//! Atomic integer (spec.md §3): "a single volatile word, modified with
//! locked read-modify-write." `core::sync::atomic` already gives us this
//! on IA-32 via the `lock` prefix, so this is a thin, purpose-named
//! wrapper rather than a hand-rolled one.

use core::sync::atomic::{AtomicI32, Ordering};

#[repr(transparent)]
pub struct AtomicInt(AtomicI32);

impl AtomicInt {
    pub const fn new(value: i32) -> Self {
        Self(AtomicI32::new(value))
    }

    pub fn load(&self) -> i32 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn store(&self, value: i32) {
        self.0.store(value, Ordering::SeqCst);
    }

    pub fn fetch_add(&self, delta: i32) -> i32 {
        self.0.fetch_add(delta, Ordering::SeqCst)
    }

    pub fn fetch_sub(&self, delta: i32) -> i32 {
        self.0.fetch_sub(delta, Ordering::SeqCst)
    }

    pub fn compare_exchange(&self, current: i32, new: i32) -> Result<i32, i32> {
        self.0
            .compare_exchange(current, new, Ordering::SeqCst, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_add_returns_previous_value() {
        let a = AtomicInt::new(5);
        assert_eq!(a.fetch_add(3), 5);
        assert_eq!(a.load(), 8);
    }

    #[test]
    fn compare_exchange_fails_on_mismatch() {
        let a = AtomicInt::new(1);
        assert_eq!(a.compare_exchange(0, 9), Err(1));
        assert_eq!(a.compare_exchange(1, 9), Ok(1));
        assert_eq!(a.load(), 9);
    }
}
