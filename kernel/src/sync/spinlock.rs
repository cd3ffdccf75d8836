// =============================================================================
// Protokernel — Spinlock
// =============================================================================
//
// A single word: 0 (free) or 1 (held). Acquisition is an atomic exchange of
// 1 into the word, spinning while the previous value was non-zero; release
// is a plain store of 0 (spec.md §4.4). This kernel is single-CPU, so a
// spinlock's only job is to keep an interrupt handler from observing data
// mid-mutation by code it preempted — hence the IRQ-safe variant below,
// which disables interrupts for the duration of the hold rather than
// relying on true multi-core contention to ever happen.
// =============================================================================

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicU32, Ordering};

/// A busy-wait lock whose acquisition also disables interrupts on entry
/// and restores the previous interrupt-enable state on release. Every
/// shared kernel structure in this crate (GDT slot pool, physical bitmap,
/// scheduler lists) is protected by one of these.
pub struct SpinLock<T> {
    state: AtomicU32,
    data: UnsafeCell<T>,
}

unsafe impl<T: Send> Send for SpinLock<T> {}
unsafe impl<T: Send> Sync for SpinLock<T> {}

const FREE: u32 = 0;
const HELD: u32 = 1;

impl<T> SpinLock<T> {
    pub const fn new(value: T) -> Self {
        Self {
            state: AtomicU32::new(FREE),
            data: UnsafeCell::new(value),
        }
    }

    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        let irq_was_enabled = crate::arch::cpu::interrupts_enabled();
        crate::arch::cpu::disable_interrupts();

        while self.state.swap(HELD, Ordering::Acquire) != FREE {
            core::hint::spin_loop();
        }

        SpinLockGuard {
            lock: self,
            irq_was_enabled,
        }
    }

    pub fn try_lock(&self) -> Option<SpinLockGuard<'_, T>> {
        let irq_was_enabled = crate::arch::cpu::interrupts_enabled();
        crate::arch::cpu::disable_interrupts();

        if self.state.swap(HELD, Ordering::Acquire) == FREE {
            Some(SpinLockGuard {
                lock: self,
                irq_was_enabled,
            })
        } else {
            if irq_was_enabled {
                crate::arch::cpu::enable_interrupts();
            }
            None
        }
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }
}

pub struct SpinLockGuard<'a, T> {
    lock: &'a SpinLock<T>,
    irq_was_enabled: bool,
}

impl<T> Deref for SpinLockGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for SpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for SpinLockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.state.store(FREE, Ordering::Release);
        if self.irq_was_enabled {
            crate::arch::cpu::enable_interrupts();
        }
    }
}

/// Disables interrupts and returns the previous state, without taking any
/// lock. Used by the sleeping primitives (`semaphore`, `mutex`) and by
/// the scheduler's own list mutations, which need the critical section
/// but have no contended word to spin on.
pub fn enter_protection() -> bool {
    let was_enabled = crate::arch::cpu::interrupts_enabled();
    crate::arch::cpu::disable_interrupts();
    was_enabled
}

/// Restores the interrupt state captured by [`enter_protection`].
pub fn leave_protection(was_enabled: bool) {
    if was_enabled {
        crate::arch::cpu::enable_interrupts();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_excludes_concurrent_access() {
        let lock = SpinLock::new(0u32);
        {
            let mut guard = lock.lock();
            *guard += 1;
        }
        assert_eq!(*lock.lock(), 1);
    }

    #[test]
    fn try_lock_fails_while_held() {
        let lock = SpinLock::new(());
        let _guard = lock.lock();
        assert!(lock.try_lock().is_none());
    }
}
