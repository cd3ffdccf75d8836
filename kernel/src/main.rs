//! Protokernel — a small educational 32-bit protected-mode x86 kernel.
//!
//! Boots already in 32-bit protected mode (the two-stage boot loader that
//! gets us here is an external collaborator, see [`boot`]), builds its own
//! descriptor tables, memory manager and scheduler, then drops into the
//! first user task at CPL-3 and never returns to `kmain`.

#![no_std]
#![no_main]

mod arch;
mod boot;
mod config;
mod drivers;
mod fs;
mod memory;
mod sync;
mod syscall;
mod task;
mod traps;
mod util;

use core::panic::PanicInfo;
use crate::kprintln;

/// Entry point. Called by the boot loader's final far jump with a pointer
/// to the hardware-info record described in `spec.md` §6 sitting in `ebx`,
/// following the same convention the loader already uses to hand off
/// boot-time facts (available RAM regions) to the kernel.
#[no_mangle]
pub extern "C" fn kmain(hwinfo_ptr: *const boot::HardwareInfo) -> ! {
    util::logger::init_early();
    kprintln!();
    kprintln!("protokernel booting...");

    let hwinfo = boot::HardwareInfo::from_raw(hwinfo_ptr);
    let cfg = config::BootConfig::from_hwinfo(&hwinfo);
    config::install(cfg);

    util::logger::init_log_facade();
    log::info!("hardware info: {} usable RAM region(s)", hwinfo.region_count());

    memory::pmm::init(&hwinfo);
    memory::paging::init_kernel_address_space();
    arch::gdt::init();
    traps::init();
    drivers::pit::init(config::get().tick_ms);
    drivers::tty::init();

    task::process::init();
    task::process::spawn_first_task();

    // `spawn_first_task` performs a simulated interrupt return into CPL-3
    // and never comes back here; this loop only guards against the
    // impossible case where it does.
    arch::cpu::halt_forever()
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    util::panic::handle(info)
}
