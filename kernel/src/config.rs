//! Boot-time configuration.
//!
//! This kernel has no runtime configuration file — it is not a hosted
//! service — but it does have a handful of tunables that several
//! subsystems need to agree on (tick length, pool sizes). Rather than
//! scatter them as `const`s the way a couple of the teacher's single-use
//! tunables are, we collect the cross-referenced ones here and set them
//! once at boot from the hardware-info record.

use crate::boot::HardwareInfo;
use spin::Once;

/// Default timer tick period in milliseconds (spec.md §4.8 default).
pub const DEFAULT_TICK_MS: u32 = 10;

/// Fixed size of the task pool (spec.md §3: "drawn from a fixed pool of 128").
pub const TASK_NR: usize = 128;

/// Fixed size of each task's open-file table (spec.md §3).
pub const TASK_OFILE_NR: usize = 128;

/// Number of independent TTYs the driver maintains.
pub const TTY_NR: usize = 4;

#[derive(Debug, Clone, Copy)]
pub struct BootConfig {
    pub tick_ms: u32,
    pub ram_top: u32,
}

impl BootConfig {
    pub fn from_hwinfo(hw: &HardwareInfo) -> Self {
        Self {
            tick_ms: DEFAULT_TICK_MS,
            ram_top: hw.highest_usable_end(),
        }
    }
}

static CONFIG: Once<BootConfig> = Once::new();

/// Installs the boot configuration. Must be called exactly once, early in
/// `kmain`, before any subsystem that reads it via [`get`].
pub fn install(cfg: BootConfig) {
    CONFIG.call_once(|| cfg);
}

/// Reads the installed boot configuration.
///
/// # Panics
/// Panics if called before [`install`] — this is a kernel-internal
/// ordering bug, not a recoverable condition.
pub fn get() -> BootConfig {
    *CONFIG.get().expect("config: read before install()")
}
