//! File-facing surface that lives inside the kernel: the ELF32 image
//! loader (spec.md §4.9) and the per-task file-descriptor table that
//! routes `open`/`read`/`write`/`close` to the device abstraction
//! (spec.md §4.7). The filesystem proper — directories, inodes, on-disk
//! layout — is an external collaborator and is not implemented here.

pub mod elf;
pub mod file_table;
