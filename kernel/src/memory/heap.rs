//! `sbrk`-style per-process heap extension (spec.md §4.2/§8).
//!
//! This has nothing to do with the kernel's own heap — this kernel has
//! none (Non-goals carry no heap allocator requirement, and every kernel
//! pool here is a fixed-size static array). This is the user-space
//! `sbrk(2)` a process uses to grow its own break.

use crate::memory::address::{PhysAddr, VirtAddr, PAGE_SIZE};
use crate::memory::paging::{self, PageFlags};
use crate::memory::pmm;
use crate::util::error::KResult;

fn align_up(x: u32) -> u32 {
    (x + PAGE_SIZE - 1) & !(PAGE_SIZE - 1)
}

/// Grows (or merely queries, for `incr == 0`) a task's heap.
///
/// Returns the *previous* `heap_end`, per the `sbrk(2)` convention
/// spec.md §8 pins down: "`sbrk(0)` returns current `heap_end` unchanged."
/// Negative `incr` is a non-goal (spec.md §1) and is rejected rather than
/// silently shrinking the heap.
pub fn sbrk(dir: PhysAddr, heap_end: &mut u32, incr: i32) -> KResult<u32> {
    let old_end = *heap_end;
    if incr == 0 {
        return Ok(old_end);
    }
    assert!(incr > 0, "sbrk: negative increment is unimplemented (spec.md Non-goals)");

    let new_end = old_end + incr as u32;
    let mut vaddr = align_up(old_end);
    let target = align_up(new_end);

    while vaddr < target {
        let frame = pmm::alloc_frame_zeroed()?;
        paging::map_page_in(dir, VirtAddr::new(vaddr), frame, PageFlags::USER_RW)?;
        vaddr += PAGE_SIZE;
    }
    *heap_end = new_end;
    Ok(old_end)
}

#[cfg(test)]
mod tests {
    // `sbrk`'s page-mapping side effect needs a live address space, so it
    // is exercised end-to-end in task::process's fork/exec tests instead;
    // the boundary arithmetic alone is simple enough to state as a fact
    // checked there: an increment spanning exactly one page boundary
    // touches exactly one new page.
}
