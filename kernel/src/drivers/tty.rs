//! Cooked-mode TTY line discipline (spec.md §4.7).
//!
//! Each TTY owns an input and an output FIFO, each paired with a
//! semaphore counting bytes available (input) or slots free (output).
//! Pointer updates are a brief interrupts-off critical section; the
//! actual byte movement happens outside that section so a slow console
//! backend never runs with interrupts disabled.

use crate::config::TTY_NR;
use crate::drivers::DeviceOps;
use crate::sync::semaphore::Semaphore;
use crate::sync::spinlock::{enter_protection, leave_protection};
use crate::util::error::{KResult, KernelError};
use bitflags::bitflags;
use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicUsize, Ordering};

bitflags! {
    #[derive(Clone, Copy)]
    pub struct TtyFlags: u32 {
        /// Translate NL to CR on input.
        const INLCR = 1 << 0;
        /// Echo input bytes back to the console.
        const IECHO = 1 << 1;
        /// Translate NL to CRLF on output.
        const OCRLF = 1 << 2;
    }
}

const FIFO_SIZE: usize = 256;
const DEFAULT_FLAGS: TtyFlags = TtyFlags::INLCR.union(TtyFlags::IECHO).union(TtyFlags::OCRLF);

struct Fifo {
    buf: UnsafeCell<[u8; FIFO_SIZE]>,
    head: AtomicUsize,
    tail: AtomicUsize,
}

unsafe impl Sync for Fifo {}

impl Fifo {
    const fn new() -> Self {
        Self {
            buf: UnsafeCell::new([0; FIFO_SIZE]),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    fn put(&self, byte: u8) {
        let irq = enter_protection();
        let tail = self.tail.load(Ordering::Relaxed);
        unsafe { (*self.buf.get())[tail % FIFO_SIZE] = byte };
        self.tail.store(tail + 1, Ordering::Relaxed);
        leave_protection(irq);
    }

    fn get(&self) -> u8 {
        let irq = enter_protection();
        let head = self.head.load(Ordering::Relaxed);
        let byte = unsafe { (*self.buf.get())[head % FIFO_SIZE] };
        self.head.store(head + 1, Ordering::Relaxed);
        leave_protection(irq);
        byte
    }
}

struct Tty {
    input: Fifo,
    output: Fifo,
    input_ready: Semaphore,
    output_free: Semaphore,
    flags: UnsafeCell<TtyFlags>,
}

unsafe impl Sync for Tty {}

impl Tty {
    const fn new() -> Self {
        Self {
            input: Fifo::new(),
            output: Fifo::new(),
            input_ready: Semaphore::new(0),
            output_free: Semaphore::new(FIFO_SIZE as i32),
            flags: UnsafeCell::new(DEFAULT_FLAGS),
        }
    }

    fn flags(&self) -> TtyFlags {
        unsafe { *self.flags.get() }
    }

    fn set_flags(&self, flags: TtyFlags) {
        unsafe { *self.flags.get() = flags };
    }

    /// Writer semantics: for each source byte, wait for an output slot,
    /// put the byte (with `\r` inserted before `\n` if `OCRLF`), and hand
    /// it to the console backend.
    fn write_line(&self, data: &[u8]) -> usize {
        for &byte in data {
            if byte == b'\n' && self.flags().contains(TtyFlags::OCRLF) {
                self.output_free.wait();
                self.output.put(b'\r');
                console_drain(b'\r');
            }
            self.output_free.wait();
            self.output.put(byte);
            console_drain(byte);
        }
        data.len()
    }

    /// Reader semantics: pull bytes until CR or LF terminates the line,
    /// applying DEL-erase and optional echo along the way.
    fn read_line(&self, buf: &mut [u8]) -> usize {
        let mut n = 0;
        loop {
            self.input_ready.wait();
            let mut byte = self.input.get();
            if byte == 0x7F {
                // DEL: erase the previous character, if any.
                if n > 0 {
                    n -= 1;
                }
                if self.flags().contains(TtyFlags::IECHO) {
                    console_drain(byte);
                }
                continue;
            }
            if byte == b'\r' && self.flags().contains(TtyFlags::INLCR) {
                byte = b'\n';
            }
            if n < buf.len() {
                buf[n] = byte;
                n += 1;
            }
            if self.flags().contains(TtyFlags::IECHO) {
                if byte == b'\n' {
                    console_drain(b'\r');
                }
                console_drain(byte);
            }
            if byte == b'\n' {
                break;
            }
        }
        n
    }
}

/// Drains a single byte to the physical console. The console backend
/// itself (VGA text mode, framebuffer, whatever) is an external
/// collaborator; this kernel only needs somewhere to send the byte so
/// cooked-mode echo is observable, and reuses the serial port the
/// logger already owns.
fn console_drain(byte: u8) {
    crate::kprint!("{}", byte as char);
}

static TTYS: [Tty; TTY_NR] = [const { Tty::new() }; TTY_NR];
static FOCUSED: AtomicUsize = AtomicUsize::new(0);

pub fn init() {
    log::info!("tty: {} TTY device(s) ready, focus=0", TTY_NR);
}

/// Called from the keyboard IRQ handler: appends a byte to the currently
/// focused TTY's input and signals its semaphore.
pub fn tty_in(byte: u8) {
    let focus = FOCUSED.load(Ordering::Relaxed);
    TTYS[focus].input.put(byte);
    TTYS[focus].input_ready.notify();
}

/// Switches keyboard focus to TTY `i`.
pub fn select(i: usize) {
    if i < TTY_NR {
        FOCUSED.store(i, Ordering::Relaxed);
    }
}

pub struct TtyDriver;
pub static TTY_DRIVER: TtyDriver = TtyDriver;

impl DeviceOps for TtyDriver {
    fn open(&self, minor: u8, _flags: u32) -> KResult<()> {
        if (minor as usize) < TTY_NR {
            Ok(())
        } else {
            Err(KernelError::BadFileDescriptor)
        }
    }

    fn read(&self, minor: u8, buf: &mut [u8]) -> KResult<usize> {
        let tty = TTYS.get(minor as usize).ok_or(KernelError::BadFileDescriptor)?;
        Ok(tty.read_line(buf))
    }

    fn write(&self, minor: u8, buf: &[u8]) -> KResult<usize> {
        let tty = TTYS.get(minor as usize).ok_or(KernelError::BadFileDescriptor)?;
        Ok(tty.write_line(buf))
    }

    fn control(&self, minor: u8, cmd: u32, arg0: u32, _arg1: u32) -> KResult<i32> {
        let tty = TTYS.get(minor as usize).ok_or(KernelError::BadFileDescriptor)?;
        match cmd {
            0 => Ok(tty.flags().bits() as i32), // get flags
            1 => {
                tty.set_flags(TtyFlags::from_bits_truncate(arg0));
                Ok(0)
            }
            _ => Err(KernelError::BadFileDescriptor),
        }
    }

    fn close(&self, _minor: u8) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_line_consumes_output_slots() {
        let tty = Tty::new();
        let before = tty.output_free.count();
        tty.write_line(b"hi");
        assert_eq!(tty.output_free.count(), before - 2);
    }
}
