//! Scheduler and task lifecycle (spec.md §3/§4.3): task control blocks
//! drawn from a fixed pool, round-robin dispatch via hardware task
//! switching, and the Unix-style fork/execve/wait/exit process model.

mod init_image;
pub mod process;
