//! Synchronisation primitives (spec.md §3/§4.4): a busy-wait spinlock, an
//! atomic integer, and two sleeping primitives (counting semaphore,
//! recursive mutex) built on top of the scheduler's block/wake machinery.
//!
//! The sleeping primitives disable interrupts rather than taking a
//! spinlock around their queue mutations: this kernel is single-CPU, so
//! the only thing that can interleave with a `sem_wait`/`sem_notify` pair
//! is the timer tick, and disabling interrupts rules that out directly
//! (spec.md §4.4).

pub mod atomic;
pub mod mutex;
pub mod semaphore;
pub mod spinlock;
