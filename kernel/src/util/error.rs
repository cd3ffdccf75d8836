//! The syscall-facing error taxonomy (spec.md §7).
//!
//! Kernel helpers return `Result<T, KernelError>` and propagate with `?`.
//! The syscall dispatch boundary (`syscall::dispatch`) is the single place
//! that flattens a `Result` into the signed-integer return-value contract
//! the architectural ABI uses: negative means failure.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// No free slot in a fixed-size pool: GDT slots, task slots, physical
    /// pages, or per-task file descriptors.
    OutOfGdtSlots,
    OutOfTasks,
    OutOfMemory,
    OutOfFileDescriptors,

    /// Bad syscall argument: unknown call id, invalid fd, a pointer that
    /// does not resolve in the current address space, or a malformed ELF.
    BadFileDescriptor,
    BadPointer,
    UnknownSyscall,
    InvalidImage,

    /// No child in the pool is ready for this operation.
    NoSuchChild,

    /// A syscall id names a real operation this kernel has no backing
    /// collaborator for (a filesystem directory, `fstat`, `unlink`) —
    /// distinct from `UnknownSyscall`, which means the id itself is
    /// unrecognised.
    Unsupported,
}

impl KernelError {
    /// Stable negative-integer mapping returned to user space. Values are
    /// deliberately distinct (never just -1) so a caller that does print
    /// the raw code gets a clue which thing failed.
    pub const fn as_errno(self) -> i32 {
        match self {
            KernelError::OutOfGdtSlots => -1,
            KernelError::OutOfTasks => -2,
            KernelError::OutOfMemory => -3,
            KernelError::OutOfFileDescriptors => -4,
            KernelError::BadFileDescriptor => -5,
            KernelError::BadPointer => -6,
            KernelError::UnknownSyscall => -7,
            KernelError::InvalidImage => -8,
            KernelError::NoSuchChild => -9,
            KernelError::Unsupported => -10,
        }
    }
}

pub type KResult<T> = Result<T, KernelError>;
