//! Exception and interrupt wiring (spec.md §4.5/§4.6): builds and loads
//! the IDT, registering a real handler for every vector the kernel cares
//! about. Unlike a table that leaves some registered handlers undefined,
//! every vector installed here has a corresponding arm in
//! [`handlers::dispatch`].

pub mod entry;
pub mod handlers;

use crate::arch::gdt::SEL_KERNEL_CODE;
use crate::arch::idt::{GateType, Idt, PrivilegeLevel};

// A plain `static mut` rather than the `SpinLock<T>` every other shared
// table in this kernel uses: `init` is the only writer, runs once before
// interrupts are enabled, and `Idt::load` needs a `&'static Idt` a lock
// guard can't hand out.
static mut IDT: Idt = Idt::new();

/// CPU exception vectors this kernel installs a trampoline for. Vector
/// 21 (control-protection) is the one gap: no hardware in this kernel's
/// target ever raises it, since that requires a shadow-stack feature
/// this kernel never enables, so it is left unregistered rather than
/// wired to a handler that can never run.
const EXCEPTION_VECTORS: [(u8, unsafe extern "C" fn()); 31] = [
    (0, entry::stub_0),
    (1, entry::stub_1),
    (2, entry::stub_2),
    (3, entry::stub_3),
    (4, entry::stub_4),
    (5, entry::stub_5),
    (6, entry::stub_6),
    (7, entry::stub_7),
    (8, entry::stub_8),
    (9, entry::stub_9),
    (10, entry::stub_10),
    (11, entry::stub_11),
    (12, entry::stub_12),
    (13, entry::stub_13),
    (14, entry::stub_14),
    (15, entry::stub_15),
    (16, entry::stub_16),
    (17, entry::stub_17),
    (18, entry::stub_18),
    (19, entry::stub_19),
    (20, entry::stub_20),
    (22, entry::stub_22),
    (23, entry::stub_23),
    (24, entry::stub_24),
    (25, entry::stub_25),
    (26, entry::stub_26),
    (27, entry::stub_27),
    (28, entry::stub_28),
    (29, entry::stub_29),
    (30, entry::stub_30),
    (31, entry::stub_31),
];

/// Builds the IDT and loads it. Must run after [`crate::arch::gdt::init`]
/// so `SEL_KERNEL_CODE` is valid, and before [`crate::drivers::pic::init`]
/// unmasks any hardware IRQ.
pub fn init() {
    // SAFETY: single-threaded at this point in boot, and this is the
    // only place that ever takes `&mut IDT`.
    unsafe {
        for &(vector, stub) in EXCEPTION_VECTORS.iter() {
            IDT.set_handler(vector, stub as usize as u32, SEL_KERNEL_CODE, GateType::Interrupt, PrivilegeLevel::Ring0);
        }
        IDT.set_handler(
            0x20,
            entry::stub_irq0 as usize as u32,
            SEL_KERNEL_CODE,
            GateType::Interrupt,
            PrivilegeLevel::Ring0,
        );
        IDT.set_handler(
            0x21,
            entry::stub_irq1 as usize as u32,
            SEL_KERNEL_CODE,
            GateType::Interrupt,
            PrivilegeLevel::Ring0,
        );
        // INT 0x80 is a trap gate, callable from ring 3, per spec.md §4.6.
        IDT.set_handler(
            0x80,
            entry::stub_syscall as usize as u32,
            SEL_KERNEL_CODE,
            GateType::Trap,
            PrivilegeLevel::Ring3,
        );

        IDT.load();
    }
    crate::drivers::pic::init();
    log::info!("traps: idt loaded, {} exception vectors wired", EXCEPTION_VECTORS.len());
}
