//! Numbered system-call dispatch (spec.md §4.6/§6): the single boundary
//! where a CPL-3 request becomes a kernel action and a signed return
//! value. Both entry paths — the `SEL_SYSCALL_GATE` call gate and the
//! `INT 0x80` trap gate — land here; `traps::handlers::syscall_trap`
//! only ever drives the `INT 0x80` path, the call gate is wired for the
//! benefit of a user-space C library that prefers it (spec.md §4.6).
//!
//! Arguments travel in `ebx, ecx, edx, esi` (up to four), matching
//! `traps::entry::TrapFrame`'s layout rather than inventing a second
//! frame shape for this one path; the call id travels in `eax`, and the
//! handler's signed result overwrites it on return.

use crate::drivers;
use crate::memory::address::{PAGE_SIZE, VirtAddr};
use crate::memory::paging;
use crate::task::process;
use crate::traps::entry::TrapFrame;
use crate::util::error::{KResult, KernelError};

pub const SYS_MSLEEP: u32 = 0;
pub const SYS_GETPID: u32 = 1;
pub const SYS_FORK: u32 = 2;
pub const SYS_EXECVE: u32 = 3;
pub const SYS_YIELD: u32 = 4;
pub const SYS_EXIT: u32 = 5;
pub const SYS_WAIT: u32 = 6;

pub const SYS_OPEN: u32 = 50;
pub const SYS_READ: u32 = 51;
pub const SYS_WRITE: u32 = 52;
pub const SYS_CLOSE: u32 = 53;
pub const SYS_LSEEK: u32 = 54;
pub const SYS_ISATTY: u32 = 55;
pub const SYS_SBRK: u32 = 56;
pub const SYS_FSTAT: u32 = 57;
pub const SYS_DUP: u32 = 58;
pub const SYS_IOCTL: u32 = 59;
pub const SYS_OPENDIR: u32 = 60;
pub const SYS_READDIR: u32 = 61;
pub const SYS_CLOSEDIR: u32 = 62;
pub const SYS_UNLINK: u32 = 63;

pub const SYS_PRINTMSG: u32 = 100;

const SEEK_SET: u32 = 0;
const SEEK_CUR: u32 = 1;

const MAX_PATH: usize = 64;
const MAX_MSG: usize = 128;

/// Resolves a user virtual address to a kernel-dereferenceable pointer
/// through the *current* page directory (spec.md §4.6: "handlers
/// translate user pointers through the current page directory"). Only
/// valid for addresses backed by RAM under the kernel's identity map,
/// which every user page this kernel hands out is.
fn translate(vaddr: u32) -> KResult<*mut u8> {
    paging::translate(VirtAddr::new(vaddr)).map(|p| p.as_kernel_ptr::<u8>()).ok_or(KernelError::BadPointer)
}

/// Bytes available before `vaddr` runs off the end of its containing
/// page — the unit a translated pointer stays contiguous for.
fn chunk_len(vaddr: u32, remaining: u32) -> u32 {
    let page_off = vaddr & (PAGE_SIZE - 1);
    (PAGE_SIZE - page_off).min(remaining)
}

/// Reads a NUL-terminated user string into a fixed-size stack buffer,
/// translating one byte at a time so the read never assumes the string
/// is physically contiguous across a page boundary.
fn read_user_cstr<'a>(vaddr: u32, out: &'a mut [u8]) -> KResult<&'a str> {
    let mut n = 0;
    let mut addr = vaddr;
    while n < out.len() {
        let ptr = translate(addr)?;
        let byte = unsafe { ptr.read() };
        if byte == 0 {
            break;
        }
        out[n] = byte;
        n += 1;
        addr += 1;
    }
    core::str::from_utf8(&out[..n]).map_err(|_| KernelError::BadPointer)
}

fn sys_write(fd: i32, vaddr: u32, len: u32) -> KResult<i32> {
    process::with_current_files(|files| -> KResult<i32> {
        let file = files.get(fd)?;
        let mut total = 0u32;
        let mut addr = vaddr;
        let mut remaining = len;
        while remaining > 0 {
            let n = chunk_len(addr, remaining);
            let phys = translate(addr)?;
            let slice = unsafe { core::slice::from_raw_parts(phys, n as usize) };
            let written = drivers::write(file.device, slice)? as u32;
            total += written;
            if written < n {
                break;
            }
            addr += n;
            remaining -= n;
        }
        Ok(total as i32)
    })
}

fn sys_read(fd: i32, vaddr: u32, len: u32) -> KResult<i32> {
    process::with_current_files(|files| -> KResult<i32> {
        let file = files.get(fd)?;
        let mut total = 0u32;
        let mut addr = vaddr;
        let mut remaining = len;
        while remaining > 0 {
            let n = chunk_len(addr, remaining);
            let phys = translate(addr)?;
            let slice = unsafe { core::slice::from_raw_parts_mut(phys, n as usize) };
            let got = drivers::read(file.device, slice)? as u32;
            total += got;
            if got < n {
                break;
            }
            addr += n;
            remaining -= n;
        }
        Ok(total as i32)
    })
}

fn sys_open(name_vaddr: u32, flags: u32) -> KResult<i32> {
    let mut buf = [0u8; MAX_PATH];
    let name = read_user_cstr(name_vaddr, &mut buf)?;
    process::with_current_files(|files| files.open(name, flags))
}

fn sys_lseek(fd: i32, offset: u32, whence: u32) -> KResult<i32> {
    process::with_current_files(|files| -> KResult<i32> {
        let file = files.get(fd)?;
        let new_offset = match whence {
            SEEK_SET => offset,
            SEEK_CUR => file.offset.wrapping_add(offset),
            _ => return Err(KernelError::Unsupported),
        };
        files.set_offset(fd, new_offset)?;
        Ok(new_offset as i32)
    })
}

fn sys_execve(frame: &mut TrapFrame, image_vaddr: u32, image_len: u32) -> KResult<i32> {
    if image_len == 0 || image_len > PAGE_SIZE {
        return Err(KernelError::InvalidImage);
    }
    if chunk_len(image_vaddr, image_len) != image_len {
        // The image crosses a page boundary; this kernel only resolves a
        // single contiguous physical run per call, so an `execve` image
        // must fit in one page (spec.md Non-goals: no general scatter
        // read here, see DESIGN.md).
        return Err(KernelError::InvalidImage);
    }
    let phys = translate(image_vaddr)?;
    let image = unsafe { core::slice::from_raw_parts(phys, image_len as usize) };
    process::execve(image, frame)?;
    Ok(0)
}

fn sys_wait(status_vaddr: u32) -> KResult<i32> {
    let (pid, status) = process::wait()?;
    if status_vaddr != 0 {
        let phys = translate(status_vaddr)?;
        unsafe { (phys as *mut i32).write_unaligned(status) };
    }
    Ok(pid)
}

fn sys_printmsg(fmt_vaddr: u32, arg: u32) -> KResult<i32> {
    let mut buf = [0u8; MAX_MSG];
    let msg = read_user_cstr(fmt_vaddr, &mut buf)?;
    log::info!("user: {} ({})", msg, arg as i32);
    Ok(0)
}

fn dispatch(id: u32, a0: u32, a1: u32, a2: u32, _a3: u32, frame: &mut TrapFrame) -> KResult<i32> {
    match id {
        SYS_MSLEEP => {
            process::msleep(a0);
            Ok(0)
        }
        SYS_GETPID => Ok(process::getpid()),
        SYS_FORK => process::fork(frame),
        SYS_EXECVE => sys_execve(frame, a0, a1),
        SYS_YIELD => {
            process::yield_now();
            Ok(0)
        }
        SYS_EXIT => process::exit_current(a0 as i32),
        SYS_WAIT => sys_wait(a0),

        SYS_OPEN => sys_open(a0, a1),
        SYS_READ => sys_read(a0 as i32, a1, a2),
        SYS_WRITE => sys_write(a0 as i32, a1, a2),
        SYS_CLOSE => process::with_current_files(|files| files.close(a0 as i32)).map(|_| 0),
        SYS_LSEEK => sys_lseek(a0 as i32, a1, a2),
        SYS_ISATTY => process::with_current_files(|files| files.get(a0 as i32)).map(|_| 1),
        SYS_SBRK => process::sbrk(a0 as i32),
        SYS_DUP => process::with_current_files(|files| files.dup(a0 as i32)),
        SYS_IOCTL => process::with_current_files(|files| -> KResult<i32> {
            let file = files.get(a0 as i32)?;
            drivers::control(file.device, a1, a2, _a3)
        }),

        SYS_FSTAT | SYS_OPENDIR | SYS_READDIR | SYS_CLOSEDIR | SYS_UNLINK => Err(KernelError::Unsupported),

        SYS_PRINTMSG => sys_printmsg(a0, a1),

        _ => Err(KernelError::UnknownSyscall),
    }
}

/// Entry point from `traps::handlers::syscall_trap`: pulls the call id
/// and up to four arguments out of the trap frame and flattens the
/// `KResult` into the signed-integer ABI (spec.md §6: "negative values
/// indicate failure").
pub fn dispatch_from_trap(frame: &mut TrapFrame) -> i32 {
    let id = frame.eax;
    let (a0, a1, a2, a3) = (frame.ebx, frame.ecx, frame.edx, frame.esi);
    match dispatch(id, a0, a1, a2, a3, frame) {
        Ok(v) => v,
        Err(e) => e.as_errno(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_len_stops_at_page_boundary() {
        assert_eq!(chunk_len(0x1000, 100), 100);
        assert_eq!(chunk_len(0x1FF8, 100), 8);
    }
}
