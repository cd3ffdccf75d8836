// =============================================================================
// Protokernel — Kernel Logger (kprint! / kprintln!)
// =============================================================================
//
// Provides formatted text output for the kernel, similar to Linux's printk().
// Output goes to the serial port (COM1), which is reachable from the very
// first instruction of kmain(), long before the scheduler, memory manager,
// or anything else exists.
//
// WHY NOT USE THE `log` CRATE DIRECTLY FROM THE START?
//   The `log` crate needs a global logger installed via `log::set_logger`,
//   which we only want to do once the serial writer itself is constructed.
//   `kprint!`/`kprintln!` work unconditionally from the first line of
//   kmain(); the `log` facade is wired to the same backend a few lines
//   later, once init_log_facade() runs, and is what the rest of the kernel
//   (GDT/IDT setup, PMM, scheduler, syscalls) should call through.
//
// THREAD SAFETY:
//   The serial port is protected by a spinlock. This kernel is single-CPU,
//   so the lock's only job is to keep an interrupt handler's own
//   kprintln!() call from interleaving with one the handler preempted.
// =============================================================================

use crate::arch::serial::SERIAL;
use core::fmt;
use core::fmt::Write;
use log::{Level, Metadata, Record};

/// Sets up the serial port so `kprint!`/`kprintln!` are usable. Must be
/// the first thing `kmain` calls.
pub fn init_early() {
    SERIAL.lock().init();
}

#[doc(hidden)]
pub fn _kprint(args: fmt::Arguments) {
    let mut serial = SERIAL.lock();
    let _ = serial.write_fmt(args);
}

#[macro_export]
macro_rules! kprint {
    ($($arg:tt)*) => {
        $crate::util::logger::_kprint(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! kprintln {
    () => {
        $crate::kprint!("\n")
    };
    ($($arg:tt)*) => {
        $crate::kprint!("{}\n", format_args!($($arg)*))
    };
}

/// Bridges the `log` crate facade onto the same serial backend `kprint!`
/// uses, so subsystem code can use `log::info!` etc. instead of writing
/// directly to the console.
struct SerialLogger;

static LOGGER: SerialLogger = SerialLogger;

impl log::Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Trace
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        kprintln!("[{:>5}] {}", record.level(), record.args());
    }

    fn flush(&self) {}
}

/// Installs the `log` crate facade. Safe to call exactly once, after
/// [`init_early`].
pub fn init_log_facade() {
    log::set_logger(&LOGGER)
        .map(|()| log::set_max_level(log::LevelFilter::Trace))
        .expect("logger: init_log_facade called more than once");
}
