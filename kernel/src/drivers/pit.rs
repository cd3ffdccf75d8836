//! Programmable interval timer (spec.md §4.8/§6): channel 0, mode 3
//! (square wave), driving the scheduler's time slice and sleep-tick
//! accounting.

use crate::arch::cpu::outb;
use crate::drivers::pic;
use core::sync::atomic::{AtomicU64, Ordering};

const CHANNEL0_DATA: u16 = 0x40;
const COMMAND: u16 = 0x43;
const BASE_FREQUENCY: u32 = 1_193_182;
const MODE3_SQUARE_WAVE: u8 = 0b0011_0110;

pub const IRQ_TIMER: u8 = 0;

static TICKS: AtomicU64 = AtomicU64::new(0);

/// Programs channel 0 for a `tick_ms`-period square wave and unmasks the
/// timer IRQ. `tick_ms` of 0 or a divisor that overflows 16 bits is a
/// configuration error this kernel does not attempt to recover from.
pub fn init(tick_ms: u32) {
    let divisor = BASE_FREQUENCY / (1000 / tick_ms);
    assert!(divisor > 0 && divisor <= u16::MAX as u32, "pit: tick_ms out of range");

    unsafe {
        outb(COMMAND, MODE3_SQUARE_WAVE);
        outb(CHANNEL0_DATA, (divisor & 0xFF) as u8);
        outb(CHANNEL0_DATA, (divisor >> 8) as u8);
    }
    pic::enable(IRQ_TIMER);
    log::info!("pit: tick period {}ms (divisor {})", tick_ms, divisor);
}

/// Current tick count since boot.
pub fn ticks() -> u64 {
    TICKS.load(Ordering::Relaxed)
}

/// Called from the timer IRQ handler. Sends EOI before running scheduler
/// accounting, so a slow `on_timer_tick` never delays acknowledging the
/// interrupt that drives it.
pub fn on_irq() {
    TICKS.fetch_add(1, Ordering::Relaxed);
    pic::send_eoi(IRQ_TIMER);
    crate::task::process::on_timer_tick();
}
