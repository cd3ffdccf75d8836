//! Typed per-vector exception and interrupt handling (spec.md §4.5/§4.6).
//!
//! A CPU exception taken in kernel mode is unrecoverable in this kernel
//! (there is no kernel-mode fault recovery); one taken in user mode
//! terminates the faulting task with its vector as exit status, matching
//! `exit`'s own `i32` status convention even though the value didn't come
//! from a real `exit` syscall (spec.md §9).

use crate::arch::cpu::read_cr2;
use crate::drivers::pit;
use crate::traps::entry::TrapFrame;
use crate::{kprintln, task};

const VECTOR_DIVIDE_ERROR: u32 = 0;
const VECTOR_DEBUG: u32 = 1;
const VECTOR_NMI: u32 = 2;
const VECTOR_BREAKPOINT: u32 = 3;
const VECTOR_INVALID_OPCODE: u32 = 6;
const VECTOR_DOUBLE_FAULT: u32 = 8;
const VECTOR_GENERAL_PROTECTION: u32 = 13;
const VECTOR_PAGE_FAULT: u32 = 14;

const VECTOR_IRQ_TIMER: u32 = 0x20;
const VECTOR_IRQ_KEYBOARD: u32 = 0x21;
const VECTOR_SYSCALL: u32 = 0x80;

/// Called by the common assembly trampoline with a pointer to the
/// just-built frame. Never panics on an unrecognised vector: an IDT
/// entry only exists for vectors this module is prepared to handle.
pub fn dispatch(frame: &mut TrapFrame) {
    match frame.vector {
        VECTOR_IRQ_TIMER => pit::on_irq(),
        VECTOR_IRQ_KEYBOARD => keyboard_irq(),
        VECTOR_SYSCALL => syscall_trap(frame),
        VECTOR_PAGE_FAULT => page_fault(frame),
        VECTOR_GENERAL_PROTECTION => general_protection(frame),
        VECTOR_DOUBLE_FAULT => fatal(frame, "double fault"),
        VECTOR_DIVIDE_ERROR => exception(frame, "divide error"),
        VECTOR_INVALID_OPCODE => exception(frame, "invalid opcode"),
        VECTOR_DEBUG | VECTOR_BREAKPOINT => {
            kprintln!("trap: debug/breakpoint at eip={:#x}", frame.eip);
        }
        VECTOR_NMI => fatal(frame, "non-maskable interrupt"),
        _ => exception(frame, "cpu exception"),
    }
}

fn keyboard_irq() {
    // A full PS/2 scancode-to-ASCII table is outside this kernel's
    // scope; the controller's output port still must be drained or it
    // never raises IRQ1 again.
    let scancode = unsafe { crate::arch::cpu::inb(0x60) };
    crate::drivers::pic::send_eoi(crate::drivers::pic::IRQ_KEYBOARD);
    if scancode < 0x80 {
        if let Some(byte) = scancode_to_ascii(scancode) {
            crate::drivers::tty::tty_in(byte);
        }
    }
}

fn scancode_to_ascii(scancode: u8) -> Option<u8> {
    const SET1_LOWER: &[u8; 58] = b"\x001234567890-=\x08\tqwertyuiop[]\r\x00asdfghjkl;'`\x00\\zxcvbnm,./\x00*\x00 ";
    SET1_LOWER.get(scancode as usize).copied().filter(|&b| b != 0)
}

fn syscall_trap(frame: &mut TrapFrame) {
    // INT 0x80 arrives through the same interrupt frame every other
    // vector does; the syscall dispatcher wants the caller-saved
    // registers that encode the call convention (spec.md §6), not the
    // whole exception frame, so hand it just those.
    let result = crate::syscall::dispatch_from_trap(frame);
    frame.eax = result as u32;
}

fn page_fault(frame: &mut TrapFrame) {
    let addr = read_cr2();
    if frame.from_cpl3() {
        log::warn!("page fault: task touched {:#x} (err={:#x}), killing it", addr, frame.error_code);
        task::process::exit_current(-14);
    } else {
        fatal(frame, "page fault in kernel mode");
    }
}

fn general_protection(frame: &mut TrapFrame) {
    if frame.from_cpl3() {
        log::warn!("general protection fault in task (err={:#x}), killing it", frame.error_code);
        task::process::exit_current(-13);
    } else {
        fatal(frame, "general protection fault in kernel mode");
    }
}

fn exception(frame: &mut TrapFrame, name: &str) {
    if frame.from_cpl3() {
        log::warn!("{} in task at eip={:#x}, killing it", name, frame.eip);
        task::process::exit_current(-(frame.vector as i32));
    } else {
        fatal(frame, name);
    }
}

fn fatal(frame: &TrapFrame, name: &str) -> ! {
    kprintln!();
    kprintln!("*** fatal: {} (vector {}) ***", name, frame.vector);
    kprintln!("eip={:#x} cs={:#x} eflags={:#x}", frame.eip, frame.cs, frame.eflags);
    crate::arch::cpu::halt_forever()
}
