//! Per-task open-file table (spec.md §3: `file_table[128]`).
//!
//! The filesystem proper is an external collaborator (spec.md §1); what
//! lives here is the fixed-size table of open-file *references* a task
//! owns, and the thin glue that routes a file descriptor to the device
//! abstraction in `drivers` by major/minor number. A "file" in this
//! kernel is therefore always backed by a device (the TTYs are the only
//! device this kernel ships); a real filesystem would plug in here by
//! handing back an `OpenFile` whose major number names its own driver.

use crate::config::TASK_OFILE_NR;
use crate::drivers::{self, DeviceId};
use crate::util::error::{KResult, KernelError};

#[derive(Clone, Copy)]
pub struct OpenFile {
    pub device: DeviceId,
    pub offset: u32,
    pub refcount: u32,
}

pub struct FileTable {
    files: [Option<OpenFile>; TASK_OFILE_NR],
}

impl FileTable {
    pub const fn new() -> Self {
        Self {
            files: [None; TASK_OFILE_NR],
        }
    }

    /// Opens `name` against the device table and installs it at the
    /// lowest free descriptor. Returns that descriptor, or a negative
    /// error if the table is full or no device answers to `name`
    /// (spec.md §8: "Opening more than 128 files in one task fails with
    /// a negative return.").
    pub fn open(&mut self, name: &str, flags: u32) -> KResult<i32> {
        let device = drivers::resolve(name).ok_or(KernelError::BadFileDescriptor)?;
        let fd = self
            .files
            .iter()
            .position(|f| f.is_none())
            .ok_or(KernelError::OutOfFileDescriptors)?;
        drivers::open(device, flags)?;
        self.files[fd] = Some(OpenFile { device, offset: 0, refcount: 1 });
        Ok(fd as i32)
    }

    pub fn get(&self, fd: i32) -> KResult<OpenFile> {
        self.files
            .get(fd as usize)
            .and_then(|f| *f)
            .ok_or(KernelError::BadFileDescriptor)
    }

    pub fn set_offset(&mut self, fd: i32, offset: u32) -> KResult<()> {
        let entry = self.files.get_mut(fd as usize).and_then(|f| f.as_mut()).ok_or(KernelError::BadFileDescriptor)?;
        entry.offset = offset;
        Ok(())
    }

    pub fn close(&mut self, fd: i32) -> KResult<()> {
        let slot = self.files.get_mut(fd as usize).ok_or(KernelError::BadFileDescriptor)?;
        let file = slot.take().ok_or(KernelError::BadFileDescriptor)?;
        if file.refcount <= 1 {
            drivers::close(file.device);
        }
        Ok(())
    }

    /// Installs a copy of `src` sharing its descriptor slot at `fd` of
    /// this (the child's) table, bumping the source's reference count.
    /// Used by `fork` (spec.md §4.3 step 3).
    pub fn dup_from(&mut self, fd: usize, src: &mut OpenFile) {
        src.refcount += 1;
        self.files[fd] = Some(*src);
    }

    /// `dup(2)` within a single table: installs a copy of `fd` at the
    /// lowest free descriptor, bumping the shared reference count.
    pub fn dup(&mut self, fd: i32) -> KResult<i32> {
        let mut file = self.get(fd)?;
        let new_fd = self.files.iter().position(|f| f.is_none()).ok_or(KernelError::OutOfFileDescriptors)?;
        file.refcount += 1;
        self.files[fd as usize] = Some(file);
        self.files[new_fd] = Some(file);
        Ok(new_fd as i32)
    }

    /// Closes every open descriptor. Used by `exit` (spec.md §4.3).
    pub fn close_all(&mut self) {
        for fd in 0..TASK_OFILE_NR {
            if self.files[fd].is_some() {
                let _ = self.close(fd as i32);
            }
        }
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut Option<OpenFile>)> {
        self.files.iter_mut().enumerate()
    }
}
