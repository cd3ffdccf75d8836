//! Counting semaphore (spec.md §3/§4.4): a non-negative counter plus a
//! FIFO wait queue of blocked tasks, protected by disabling interrupts
//! rather than a spinlock (see the module doc in `sync::mod`).

use crate::sync::spinlock::{enter_protection, leave_protection};
use crate::task::process::{self, WaitQueue};
use core::cell::UnsafeCell;

pub struct Semaphore {
    count: UnsafeCell<i32>,
    waiters: UnsafeCell<WaitQueue>,
}

unsafe impl Sync for Semaphore {}

impl Semaphore {
    pub const fn new(initial: i32) -> Self {
        Self {
            count: UnsafeCell::new(initial),
            waiters: UnsafeCell::new(WaitQueue::new()),
        }
    }

    /// If `count > 0`, decrements and returns immediately. Otherwise
    /// blocks the current task in FIFO order until [`notify`] wakes it.
    pub fn wait(&self) {
        loop {
            let irq = enter_protection();
            let count = unsafe { &mut *self.count.get() };
            if *count > 0 {
                *count -= 1;
                leave_protection(irq);
                return;
            }
            let waiters = unsafe { &mut *self.waiters.get() };
            process::block_current_on(waiters);
            // `block_current_on` dispatches away and only returns here once
            // this task has been woken and rescheduled; interrupts were
            // re-enabled by the dispatch that ran while we were off-CPU,
            // so re-check the condition rather than assume we own the
            // count decrement (another waiter or `wait()` caller may have
            // raced us between wake and re-dispatch on a future SMP port).
            leave_protection(irq);
        }
    }

    /// Always increments the counter first, then wakes the head waiter
    /// if any. `wait()` re-checks `count > 0` after being woken, so the
    /// increment must happen before the wake or a woken waiter would see
    /// `count == 0` and block again forever.
    pub fn notify(&self) {
        let irq = enter_protection();
        let count = unsafe { &mut *self.count.get() };
        *count += 1;
        let waiters = unsafe { &mut *self.waiters.get() };
        process::wake_one_from(waiters);
        leave_protection(irq);
    }

    pub fn count(&self) -> i32 {
        let irq = enter_protection();
        let count = unsafe { *self.count.get() };
        leave_protection(irq);
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_then_notify_restores_count() {
        let sem = Semaphore::new(1);
        sem.wait();
        assert_eq!(sem.count(), 0);
        sem.notify();
        assert_eq!(sem.count(), 1);
    }

    #[test]
    fn notify_with_no_waiters_increments_count() {
        let sem = Semaphore::new(0);
        sem.notify();
        assert_eq!(sem.count(), 1);
    }
}
