// =============================================================================
// Protokernel — Physical Memory Manager
// =============================================================================
//
// A single bitmap covers every 4 KiB frame of physical RAM from 1 MiB up to
// the highest usable address the boot loader reported, rounded down to a
// page (spec.md §3/§4.2). Bit i tracks frame i (frame 0 of the bitmap is
// physical address 1 MiB, not address 0 — the first megabyte is legacy
// BIOS/VGA territory this kernel never hands out).
//
// Allocation returns the lowest run of n clear bits; deallocation clears
// bits. There is no coalescing structure — the bitmap is the ground truth,
// exactly as spec.md §4.2 specifies.
//
// Unlike a general-purpose kernel that sizes its bitmap to match however
// much RAM is actually present (usually by carving the bitmap itself out
// of the RAM it describes), this kernel has no heap and keeps every other
// pool (tasks, GDT slots) at a fixed static size, so the bitmap is sized
// the same way: a fixed array big enough for the largest RAM this kernel
// is meant to manage (256 MiB), with `total_frames` clamping use to
// whatever the boot loader actually reported.
// =============================================================================

use crate::boot::HardwareInfo;
use crate::memory::address::{PhysAddr, PAGE_SIZE};
use crate::sync::spinlock::SpinLock;
use crate::util::error::{KResult, KernelError};

const FIRST_MANAGED_ADDR: u32 = 0x10_0000; // 1 MiB
const MAX_MANAGED_BYTES: u32 = 256 * 1024 * 1024;
const MAX_FRAMES: usize = (MAX_MANAGED_BYTES / PAGE_SIZE) as usize;
const BITMAP_BYTES: usize = MAX_FRAMES / 8;

pub struct BitmapAllocator {
    bitmap: [u8; BITMAP_BYTES],
    total_frames: usize,
    used_frames: usize,
    search_start: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct MemoryStats {
    pub total_frames: usize,
    pub used_frames: usize,
    pub free_frames: usize,
}

impl BitmapAllocator {
    const fn empty() -> Self {
        Self {
            bitmap: [0xFF; BITMAP_BYTES], // everything starts "used" until marked free
            total_frames: 0,
            used_frames: 0,
            search_start: 0,
        }
    }

    fn frame_of(addr: u32) -> usize {
        ((addr - FIRST_MANAGED_ADDR) / PAGE_SIZE) as usize
    }

    fn addr_of(frame: usize) -> u32 {
        FIRST_MANAGED_ADDR + (frame as u32) * PAGE_SIZE
    }

    fn set_free(&mut self, frame: usize, free: bool) {
        let byte = frame / 8;
        let bit = frame % 8;
        if free {
            self.bitmap[byte] &= !(1 << bit);
        } else {
            self.bitmap[byte] |= 1 << bit;
        }
    }

    fn is_free(&self, frame: usize) -> bool {
        self.bitmap[frame / 8] & (1 << (frame % 8)) == 0
    }

    fn init(&mut self, hw: &HardwareInfo) {
        let top = hw.highest_usable_end().min(FIRST_MANAGED_ADDR + MAX_MANAGED_BYTES);
        self.total_frames = if top > FIRST_MANAGED_ADDR {
            ((top - FIRST_MANAGED_ADDR) / PAGE_SIZE) as usize
        } else {
            0
        };
        self.used_frames = self.total_frames; // all used until regions are cleared below

        for region in hw.regions() {
            let start = region.start.max(FIRST_MANAGED_ADDR);
            let end = region.start.saturating_add(region.size).min(FIRST_MANAGED_ADDR + MAX_MANAGED_BYTES);
            if end <= start {
                continue;
            }
            let first_frame = Self::frame_of(start & !(PAGE_SIZE - 1));
            let last_frame = Self::frame_of(end & !(PAGE_SIZE - 1));
            for frame in first_frame..last_frame.min(self.total_frames) {
                if !self.is_free(frame) {
                    self.set_free(frame, true);
                    self.used_frames -= 1;
                }
            }
        }
        self.search_start = 0;
    }

    fn alloc_frame(&mut self) -> Option<PhysAddr> {
        self.alloc_contiguous(1).map(|a| a)
    }

    /// Finds the lowest run of `count` consecutive clear bits within
    /// `[start, end)`, without touching allocator state.
    fn find_run(&self, start: usize, end: usize, count: usize) -> Option<usize> {
        let mut run_start = None;
        let mut run_len = 0usize;
        for frame in start..end {
            if self.is_free(frame) {
                if run_start.is_none() {
                    run_start = Some(frame);
                }
                run_len += 1;
                if run_len == count {
                    return run_start;
                }
            } else {
                run_start = None;
                run_len = 0;
            }
        }
        None
    }

    /// Returns the lowest run of `n` clear bits in the whole bitmap
    /// (spec.md §4.2), using `search_start` only as a hint to skip a
    /// known-exhausted prefix: if the hinted scan comes up empty, the
    /// scan restarts from frame 0 before giving up, so a frame freed
    /// below the cursor by `free_frame` is still found.
    fn alloc_contiguous(&mut self, count: usize) -> Option<PhysAddr> {
        if count == 0 || self.used_frames + count > self.total_frames {
            return None;
        }
        let base = self
            .find_run(self.search_start, self.total_frames, count)
            .or_else(|| self.find_run(0, self.search_start, count))?;

        for f in base..base + count {
            self.set_free(f, false);
        }
        self.used_frames += count;
        self.search_start = base + count;
        Some(PhysAddr::new(Self::addr_of(base)))
    }

    fn free_frame(&mut self, addr: PhysAddr) {
        debug_assert!(addr.is_page_aligned(), "pmm: free of unaligned address");
        let frame = Self::frame_of(addr.as_u32());
        assert!(!self.is_free(frame), "pmm: double free of frame 0x{:08x}", addr.as_u32());
        self.set_free(frame, true);
        self.used_frames -= 1;
        // Rewind the cursor so a freed frame below it is found by the next
        // allocation's hinted scan instead of only by its 0-fallback pass.
        if frame < self.search_start {
            self.search_start = frame;
        }
    }

    fn stats(&self) -> MemoryStats {
        MemoryStats {
            total_frames: self.total_frames,
            used_frames: self.used_frames,
            free_frames: self.total_frames - self.used_frames,
        }
    }
}

static PMM: SpinLock<BitmapAllocator> = SpinLock::new(BitmapAllocator::empty());

pub fn init(hw: &HardwareInfo) {
    PMM.lock().init(hw);
    let stats = PMM.lock().stats();
    log::info!(
        "pmm: {} frames managed ({} MiB), {} free",
        stats.total_frames,
        stats.total_frames * (PAGE_SIZE as usize) / (1024 * 1024),
        stats.free_frames
    );
}

pub fn alloc_frame() -> KResult<PhysAddr> {
    PMM.lock().alloc_frame().ok_or(KernelError::OutOfMemory)
}

pub fn alloc_contiguous(count: usize) -> KResult<PhysAddr> {
    PMM.lock().alloc_contiguous(count).ok_or(KernelError::OutOfMemory)
}

/// Allocates a frame and zeroes it through the kernel's identity map.
/// Used for every fresh page table and page directory, so stale frame
/// contents can never leak between address spaces.
pub fn alloc_frame_zeroed() -> KResult<PhysAddr> {
    let frame = alloc_frame()?;
    unsafe {
        let ptr = frame.as_kernel_ptr::<u8>();
        core::ptr::write_bytes(ptr, 0, PAGE_SIZE as usize);
    }
    Ok(frame)
}

pub fn free_frame(addr: PhysAddr) {
    PMM.lock().free_frame(addr);
}

pub fn stats() -> MemoryStats {
    PMM.lock().stats()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_allocator() -> BitmapAllocator {
        let mut a = BitmapAllocator::empty();
        a.total_frames = 16;
        a.used_frames = 16;
        for f in 0..16 {
            a.set_free(f, true);
        }
        a.used_frames = 0;
        a
    }

    #[test]
    fn alloc_then_free_restores_state() {
        let mut a = test_allocator();
        let before = a.stats();
        let addr = a.alloc_frame().expect("alloc");
        assert_eq!(a.used_frames, 1);
        a.free_frame(addr);
        assert_eq!(a.stats().free_frames, before.free_frames);
    }

    #[test]
    fn alloc_contiguous_returns_lowest_run() {
        let mut a = test_allocator();
        let base = a.alloc_contiguous(4).expect("alloc 4");
        assert_eq!(base, PhysAddr::new(FIRST_MANAGED_ADDR));
        assert_eq!(a.used_frames, 4);
    }

    #[test]
    fn alloc_fails_when_exhausted() {
        let mut a = test_allocator();
        assert!(a.alloc_contiguous(17).is_none());
    }

    #[test]
    #[should_panic(expected = "double free")]
    fn double_free_panics() {
        let mut a = test_allocator();
        let addr = a.alloc_frame().unwrap();
        a.free_frame(addr);
        a.free_frame(addr);
    }
}
