//! Global Descriptor Table for IA-32 protected mode.
//!
//! 256 slots (spec.md §3/§4.1). Slot 0 is the CPU-reserved null descriptor.
//! A handful of slots are fixed at boot (kernel code/data, the system-call
//! gate, one application code/data pair); the rest are handed out
//! dynamically, one per live task, to hold that task's TSS descriptor —
//! the mechanism hardware task switching (`arch::cpu::far_jump_to_task`)
//! depends on.

use crate::arch::tss::Tss;
use crate::sync::spinlock::SpinLock;
use crate::util::error::{KResult, KernelError};
use core::mem::size_of;
use x86::dtables::DescriptorTablePointer;

pub const GDT_ENTRIES: usize = 256;

/// Fixed selectors, matching spec.md §6 exactly.
pub const SEL_KERNEL_CODE: u16 = 0x08;
pub const SEL_KERNEL_DATA: u16 = 0x10;
pub const SEL_SYSCALL_GATE: u16 = 0x18;

const SLOT_NULL: usize = 0;
const SLOT_KERNEL_CODE: usize = 1;
const SLOT_KERNEL_DATA: usize = 2;
const SLOT_SYSCALL_GATE: usize = 3;
const FIRST_DYNAMIC_SLOT: usize = 4;

/// A raw 8-byte GDT entry, good for both segment and call-gate
/// descriptors — they differ only in how the 64 bits are interpreted.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct GdtEntry(u64);

impl GdtEntry {
    pub const fn null() -> Self {
        Self(0)
    }

    /// Builds a flat (base 0, limit 4 GiB) code or data segment descriptor.
    ///
    /// `access` is the standard 8-bit access byte (present, DPL, type);
    /// `flags` occupies the top nibble alongside the limit's top nibble
    /// (granularity + default operation size).
    pub const fn flat_segment(access: u8, flags: u8) -> Self {
        let limit: u32 = 0xFFFFF;
        let base: u32 = 0;
        let mut value: u64 = 0;
        value |= (limit & 0xFFFF) as u64;
        value |= ((base & 0xFFFF) as u64) << 16;
        value |= (((base >> 16) & 0xFF) as u64) << 32;
        value |= (access as u64) << 40;
        value |= ((((limit >> 16) & 0xF) as u64) | (((flags & 0xF) as u64) << 4)) << 48;
        value |= (((base >> 24) & 0xFF) as u64) << 56;
        Self(value)
    }

    pub const fn kernel_code() -> Self {
        // present, DPL0, code, executable, readable: 1001_1010
        Self::flat_segment(0x9A, 0xC)
    }

    pub const fn kernel_data() -> Self {
        // present, DPL0, data, writable: 1001_0010
        Self::flat_segment(0x92, 0xC)
    }

    pub const fn user_code() -> Self {
        // present, DPL3, code, executable, readable: 1111_1010
        Self::flat_segment(0xFA, 0xC)
    }

    pub const fn user_data() -> Self {
        // present, DPL3, data, writable: 1111_0010
        Self::flat_segment(0xF2, 0xC)
    }

    /// Builds a TSS descriptor (spec.md: "one TSS per task").
    pub fn tss(tss: &Tss) -> Self {
        let base = tss as *const Tss as u32;
        let limit = (size_of::<Tss>() - 1) as u32;
        let mut value: u64 = 0;
        value |= (limit & 0xFFFF) as u64;
        value |= ((base & 0xFFFF) as u64) << 16;
        value |= (((base >> 16) & 0xFF) as u64) << 32;
        value |= 0x89u64 << 40; // present, DPL0, 32-bit TSS (available)
        value |= (((limit >> 16) & 0xF) as u64) << 48;
        value |= (((base >> 24) & 0xFF) as u64) << 56;
        Self(value)
    }

    /// Builds a 32-bit call gate (spec.md §4.1: parameter count 5,
    /// DPL-3 callable) pointing at `handler`, reached through
    /// `selector:offset` like any far call.
    pub fn call_gate(selector: u16, handler: u32, param_count: u8, dpl: u8) -> Self {
        let mut value: u64 = 0;
        value |= (handler & 0xFFFF) as u64;
        value |= (selector as u64) << 16;
        value |= ((param_count & 0x1F) as u64) << 32;
        let access = 0x80 | ((dpl & 0x3) << 5) | 0x0C; // present | DPL | 32-bit call gate type
        value |= (access as u64) << 40;
        value |= ((handler >> 16) as u64) << 48;
        Self(value)
    }

    /// An entry's access byte is zero iff the slot is free (spec.md §3).
    pub fn is_free(self) -> bool {
        ((self.0 >> 40) & 0xFF) == 0
    }
}

#[repr(C, align(8))]
pub struct Gdt {
    entries: [GdtEntry; GDT_ENTRIES],
}

/// Guards slot allocation/free so concurrent `alloc_slot`/`free_slot`
/// calls (from `fork` and `exit` on different tasks, interleaved by the
/// scheduler) cannot race on the same free slot (spec.md §4.1).
pub static GDT: SpinLock<Gdt> = SpinLock::new(Gdt::new());

impl Gdt {
    pub const fn new() -> Self {
        Self {
            entries: [GdtEntry::null(); GDT_ENTRIES],
        }
    }

    /// Installs a segment descriptor directly at `selector`'s slot. Used
    /// for the fixed kernel/application segments at boot.
    pub fn install_segment(&mut self, selector: u16, descriptor: GdtEntry) {
        self.entries[(selector >> 3) as usize] = descriptor;
    }

    /// Installs a call gate at `slot`, with `offset` as the handler
    /// address and `selector` as the code segment it runs in.
    pub fn install_gate(&mut self, slot: usize, selector: u16, offset: u32, param_count: u8, dpl: u8) {
        self.entries[slot] = GdtEntry::call_gate(selector, offset, param_count, dpl);
    }

    /// Finds the first free slot at or after `FIRST_DYNAMIC_SLOT`, installs
    /// `descriptor` there, and returns the 8-byte-scaled selector.
    pub fn alloc_slot(&mut self, descriptor: GdtEntry) -> KResult<u16> {
        for (i, entry) in self.entries.iter_mut().enumerate().skip(FIRST_DYNAMIC_SLOT) {
            if entry.is_free() {
                *entry = descriptor;
                return Ok((i << 3) as u16);
            }
        }
        Err(KernelError::OutOfGdtSlots)
    }

    /// Zeroes the access byte, marking `selector`'s slot free again.
    pub fn free_slot(&mut self, selector: u16) {
        self.entries[(selector >> 3) as usize] = GdtEntry::null();
    }

    fn pointer(&self) -> DescriptorTablePointer<u64> {
        DescriptorTablePointer {
            limit: (size_of::<Self>() - 1) as u16,
            base: self.entries.as_ptr() as *const u64,
        }
    }
}

/// Selectors for the fixed application code/data pair, allocated once at
/// task-manager init (spec.md §4.1: "allocated dynamically during
/// task-manager init").
pub struct AppSelectors {
    pub user_code: u16,
    pub user_data: u16,
}

static APP_SELECTORS: SpinLock<Option<AppSelectors>> = SpinLock::new(None);

pub fn app_selectors() -> AppSelectors {
    APP_SELECTORS
        .lock()
        .as_ref()
        .map(|s| AppSelectors { user_code: s.user_code, user_data: s.user_data })
        .expect("gdt: app_selectors() read before init()")
}

/// Builds the fixed slots and loads the GDT. The system-call gate and
/// per-task TSS descriptors are installed later, once those subsystems
/// exist (`syscall::init`, `task::process::spawn`).
pub fn init() {
    let mut gdt = GDT.lock();
    gdt.install_segment(SLOT_NULL as u16 * 8, GdtEntry::null());
    gdt.install_segment(SEL_KERNEL_CODE, GdtEntry::kernel_code());
    gdt.install_segment(SEL_KERNEL_DATA, GdtEntry::kernel_data());
    let _ = SLOT_SYSCALL_GATE; // installed by syscall::init once the handler address is known

    let user_code = gdt
        .alloc_slot(GdtEntry::user_code())
        .expect("gdt: out of slots installing application code segment");
    let user_data = gdt
        .alloc_slot(GdtEntry::user_data())
        .expect("gdt: out of slots installing application data segment");
    *APP_SELECTORS.lock() = Some(AppSelectors { user_code, user_data });

    let ptr = gdt.pointer();
    unsafe {
        crate::arch::cpu::lgdt(&ptr);
        reload_segments();
    }
    log::info!(
        "gdt: loaded ({} entries), user code=0x{:04x} user data=0x{:04x}",
        GDT_ENTRIES, user_code, user_data
    );
}

/// Reloads CS via a far return and DS/ES/FS/GS/SS with the kernel data
/// selector, per the usual "load GDTR then reload every segment
/// register" dance.
unsafe fn reload_segments() {
    use core::arch::asm;
    asm!(
        "push {code_sel}",
        "lea {tmp}, [2f]",
        "push {tmp}",
        "retf",
        "2:",
        "mov ax, {data_sel:x}",
        "mov ds, ax",
        "mov es, ax",
        "mov fs, ax",
        "mov gs, ax",
        "mov ss, ax",
        code_sel = in(reg) SEL_KERNEL_CODE as u32,
        tmp = out(reg) _,
        data_sel = in(reg) SEL_KERNEL_DATA,
        out("ax") _,
        options(nostack),
    );
}
