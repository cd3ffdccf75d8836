//! IA-32 architecture layer: CPU primitives, descriptor tables, and the
//! serial port used by the early logger.

pub mod cpu;
pub mod gdt;
pub mod idt;
pub mod serial;
pub mod tss;
