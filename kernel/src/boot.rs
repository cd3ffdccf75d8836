//! Boot handover — the interface to the (external) two-stage boot loader.
//!
//! The loader runs entirely before `kmain`: real-mode BIOS disk load, A20
//! enable, an initial GDT, ELF header parsing into kernel memory, and the
//! final jump into protected mode. None of that lives in this crate. What
//! the loader leaves behind is a single hardware-info record, described
//! here, that `kmain` reads once and never mutates.

/// One contiguous, usable physical RAM region as reported by the loader.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct RamRegion {
    pub start: u32,
    pub size: u32,
}

/// Maximum number of RAM regions the record can describe. The loader's
/// BIOS `INT 0x15, EAX=0xE820` probe rarely reports more than a handful
/// of usable ranges; this bound keeps the record a fixed-size, easily
/// validated struct instead of needing an allocator before one exists.
pub const MAX_RAM_REGIONS: usize = 32;

/// The raw record handed to `kmain`, exactly as the loader lays it out.
#[repr(C)]
struct RawHardwareInfo {
    region_count: u32,
    regions: [RamRegion; MAX_RAM_REGIONS],
}

/// Validated, owned copy of the hardware-info record.
///
/// We copy out of the raw pointer immediately rather than holding onto it,
/// since the page containing the loader's scratch data is not guaranteed
/// to stay mapped once the kernel rebuilds its own page tables.
pub struct HardwareInfo {
    regions: [RamRegion; MAX_RAM_REGIONS],
    region_count: usize,
}

impl HardwareInfo {
    /// Reads and validates the record at `ptr`. Halts the CPU if the
    /// loader reported zero usable regions — there is nothing a kernel
    /// can do without any RAM to manage.
    pub fn from_raw(ptr: *const RawHardwareInfo) -> Self {
        // SAFETY: the loader's calling convention guarantees `ptr` points
        // at a live `RawHardwareInfo` for the duration of this call; we
        // copy it out before any other subsystem can remap this memory.
        let raw = unsafe { ptr.read_unaligned() };
        let region_count = raw.region_count as usize;
        if region_count == 0 || region_count > MAX_RAM_REGIONS {
            crate::kprintln!("boot: loader reported {} RAM regions, halting", region_count);
            crate::arch::cpu::halt_forever();
        }
        Self {
            regions: raw.regions,
            region_count,
        }
    }

    pub fn region_count(&self) -> usize {
        self.region_count
    }

    pub fn regions(&self) -> &[RamRegion] {
        &self.regions[..self.region_count]
    }

    /// The end of the largest usable region, rounded down to a page. This
    /// is the upper bound the physical bitmap allocator covers.
    pub fn highest_usable_end(&self) -> u32 {
        self.regions()
            .iter()
            .map(|r| r.start.saturating_add(r.size))
            .max()
            .unwrap_or(0)
            & !0xFFF
    }
}
