//! Low-level CPU primitives: port I/O, control-register access, interrupt
//! enable/disable, table-register loads, and far jumps. A pure leaf module
//! — nothing here depends on any other kernel subsystem.

use core::arch::asm;
use x86::controlregs;
use x86::dtables::DescriptorTablePointer;
use x86::io;

#[inline(always)]
pub unsafe fn inb(port: u16) -> u8 {
    io::inb(port)
}

#[inline(always)]
pub unsafe fn outb(port: u16, val: u8) {
    io::outb(port, val);
}

#[inline(always)]
pub unsafe fn inw(port: u16) -> u16 {
    io::inw(port)
}

#[inline(always)]
pub unsafe fn outw(port: u16, val: u16) {
    io::outw(port, val);
}

/// Reads CR2: the faulting linear address on the most recent page fault.
#[inline(always)]
pub fn read_cr2() -> u32 {
    unsafe { controlregs::cr2() as u32 }
}

/// Reads CR3: the physical address of the current page directory.
#[inline(always)]
pub fn read_cr3() -> u32 {
    unsafe { controlregs::cr3() as u32 }
}

/// Loads CR3, switching the active page directory. The TLB is flushed as
/// a side effect of the write, per the architecture.
#[inline(always)]
pub unsafe fn write_cr3(phys_dir: u32) {
    controlregs::cr3_write(phys_dir as u64);
}

/// Enables paging and write-protect enforcement (CR0.PG, CR0.WP) in one
/// step, used once during kernel page-table bring-up.
#[inline(always)]
pub unsafe fn enable_paging() {
    let mut cr0 = controlregs::cr0();
    cr0 |= controlregs::Cr0::CR0_ENABLE_PAGING | controlregs::Cr0::CR0_WRITE_PROTECT;
    controlregs::cr0_write(cr0);
}

/// Loads the GDTR via `lgdt`.
#[inline(always)]
pub unsafe fn lgdt(ptr: &DescriptorTablePointer<u64>) {
    x86::dtables::lgdt(ptr);
}

/// Loads the IDTR via `lidt`.
#[inline(always)]
pub unsafe fn lidt(ptr: &DescriptorTablePointer<u64>) {
    x86::dtables::lidt(ptr);
}

/// Loads the task register via `ltr`, given an 8-byte-scaled GDT selector.
#[inline(always)]
pub unsafe fn ltr(selector: u16) {
    asm!("ltr {0:x}", in(reg) selector, options(nostack, preserves_flags));
}

/// A far pointer as consumed by `ljmp [mem]`: a 32-bit offset followed by
/// a 16-bit segment selector. For a jump to a task-gate/TSS selector the
/// offset is ignored by the CPU, but the encoding still requires one.
#[repr(C, packed)]
struct FarPointer {
    offset: u32,
    selector: u16,
}

/// Performs a far jump to the given GDT task selector, invoking hardware
/// task switching: the CPU saves the outgoing task's full register state
/// into its TSS and loads the incoming task's state (including CR3) from
/// the target TSS, entirely in microcode.
///
/// # Safety
/// `selector` must address a present, valid TSS descriptor whose busy bit
/// is clear, or the CPU will fault instead of switching.
#[inline(always)]
pub unsafe fn far_jump_to_task(selector: u16) {
    let target = FarPointer { offset: 0, selector };
    asm!(
        "ljmp [{0}]",
        in(reg) &target,
        options(nostack),
    );
}

// CLI/STI/PUSHFD are only meaningful (and only legal outside ring 0) on a
// real IA-32 target. The host-side unit tests in `sync::spinlock` and
// friends run on whatever architecture `cargo test` targets, so on any
// non-x86 target we simulate a single-core interrupt-enable flag instead
// of emitting instructions that would fault. This is the seam SPEC_FULL's
// test-tooling section relies on to make the sleeping primitives'
// queueing logic host-testable without real hardware.

#[cfg(target_arch = "x86")]
#[inline(always)]
pub fn interrupts_enabled() -> bool {
    let eflags: u32;
    unsafe {
        asm!(
            "pushfd",
            "pop {0:e}",
            out(reg) eflags,
            options(nomem, preserves_flags)
        );
    }
    eflags & (1 << 9) != 0
}

#[cfg(target_arch = "x86")]
#[inline(always)]
pub fn disable_interrupts() {
    unsafe { asm!("cli", options(nomem, nostack)) }
}

#[cfg(target_arch = "x86")]
#[inline(always)]
pub fn enable_interrupts() {
    unsafe { asm!("sti", options(nomem, nostack)) }
}

#[cfg(not(target_arch = "x86"))]
mod host_irq_shim {
    use core::sync::atomic::{AtomicBool, Ordering};
    static ENABLED: AtomicBool = AtomicBool::new(true);

    pub fn interrupts_enabled() -> bool {
        ENABLED.load(Ordering::SeqCst)
    }

    pub fn disable_interrupts() {
        ENABLED.store(false, Ordering::SeqCst);
    }

    pub fn enable_interrupts() {
        ENABLED.store(true, Ordering::SeqCst);
    }
}

#[cfg(not(target_arch = "x86"))]
pub use host_irq_shim::{disable_interrupts, enable_interrupts, interrupts_enabled};

/// Disables interrupts permanently and parks the CPU on `hlt` in a loop.
/// Used by the panic handler and as the idle task's body.
pub fn halt_forever() -> ! {
    disable_interrupts();
    loop {
        unsafe { asm!("hlt", options(nomem, nostack)) }
    }
}
