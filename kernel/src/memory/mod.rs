//! Physical and virtual memory management (spec.md §3/§4.2): a bitmap
//! frame allocator, two-level page tables, and per-process address-space
//! lifecycle (create/destroy/copy, `sbrk`-style heap extension).
//!
//! Layered the way the teacher repo's memory subsystem is, minus the
//! parts that only make sense with demand paging or a heap allocator,
//! neither of which this kernel has (spec.md Non-goals):
//!
//!   address.rs — PhysAddr/VirtAddr newtypes
//!   pmm.rs     — bitmap physical frame allocator
//!   paging.rs  — page directory/table construction and address spaces
//!   heap.rs    — per-task `sbrk` heap extension

pub mod address;
pub mod heap;
pub mod paging;
pub mod pmm;
