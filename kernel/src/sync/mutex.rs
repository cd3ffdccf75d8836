//! Recursive mutex with owner tracking (spec.md §3/§4.4): owner handle,
//! positive recursion count, FIFO wait queue. The owning task may
//! re-acquire without blocking; `unlock` must be called once per `lock`.

use crate::sync::spinlock::{enter_protection, leave_protection};
use crate::task::process::{self, TaskId, WaitQueue, INVALID_TASK};
use core::cell::UnsafeCell;

pub struct Mutex {
    owner: UnsafeCell<TaskId>,
    count: UnsafeCell<u32>,
    waiters: UnsafeCell<WaitQueue>,
}

unsafe impl Sync for Mutex {}

impl Mutex {
    pub const fn new() -> Self {
        Self {
            owner: UnsafeCell::new(INVALID_TASK),
            count: UnsafeCell::new(0),
            waiters: UnsafeCell::new(WaitQueue::new()),
        }
    }

    pub fn lock(&self) {
        loop {
            let irq = enter_protection();
            let owner = unsafe { &mut *self.owner.get() };
            let count = unsafe { &mut *self.count.get() };
            let current = process::current_id();

            if *count == 0 {
                *owner = current;
                *count = 1;
                leave_protection(irq);
                return;
            }
            if *owner == current {
                *count += 1;
                leave_protection(irq);
                return;
            }
            let waiters = unsafe { &mut *self.waiters.get() };
            process::block_current_on(waiters);
            leave_protection(irq);
        }
    }

    /// # Panics
    /// Panics if the calling task does not own the mutex — that is a
    /// kernel-internal usage bug, not a recoverable condition.
    pub fn unlock(&self) {
        let irq = enter_protection();
        let owner = unsafe { &mut *self.owner.get() };
        let count = unsafe { &mut *self.count.get() };
        let current = process::current_id();
        assert_eq!(*owner, current, "mutex: unlock by non-owner task");

        *count -= 1;
        if *count == 0 {
            // Release ownership outright rather than handing it to the
            // next waiter directly: `lock()` re-checks `*count == 0` after
            // being woken and acquires from there, so waking a waiter
            // while still owning the mutex would make its re-check take
            // the `*owner == current` recursive-acquire branch instead,
            // corrupting the recursion count for a task that only ever
            // called `lock()` once.
            *owner = INVALID_TASK;
            let waiters = unsafe { &mut *self.waiters.get() };
            if let Some(next) = waiters.pop_front() {
                process::ready(next);
            }
        }
        leave_protection(irq);
    }

    pub fn is_locked(&self) -> bool {
        let irq = enter_protection();
        let locked = unsafe { *self.count.get() } > 0;
        leave_protection(irq);
        locked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recursive_lock_requires_matching_unlocks() {
        let m = Mutex::new();
        m.lock();
        m.lock();
        m.lock();
        assert!(m.is_locked());
        m.unlock();
        assert!(m.is_locked());
        m.unlock();
        assert!(m.is_locked());
        m.unlock();
        assert!(!m.is_locked());
    }
}
