//! Device abstraction (spec.md §4.7): a tiny major/minor device table
//! associating each major number with an `{open, read, write, control,
//! close}` vtable; minor numbers disambiguate instances within a driver.
//! The only driver this kernel ships is the TTY line discipline; a real
//! system would register a keyboard/console/ATA-disk driver here too,
//! each an external collaborator per spec.md §1.

pub mod pic;
pub mod pit;
pub mod tty;

use crate::util::error::{KResult, KernelError};

pub const MAJOR_TTY: u8 = 1;

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct DeviceId {
    pub major: u8,
    pub minor: u8,
}

/// The per-major vtable (spec.md §4.7 and §9: "model it as a trait/
/// interface over a device handle"). Implemented once, by `tty`.
pub trait DeviceOps: Sync {
    fn open(&self, minor: u8, flags: u32) -> KResult<()>;
    fn read(&self, minor: u8, buf: &mut [u8]) -> KResult<usize>;
    fn write(&self, minor: u8, buf: &[u8]) -> KResult<usize>;
    fn control(&self, minor: u8, cmd: u32, arg0: u32, arg1: u32) -> KResult<i32>;
    fn close(&self, minor: u8);
}

fn driver_for(major: u8) -> KResult<&'static dyn DeviceOps> {
    match major {
        MAJOR_TTY => Ok(&tty::TTY_DRIVER),
        _ => Err(KernelError::BadFileDescriptor),
    }
}

/// Parses a device name into a `DeviceId`. This kernel recognises only
/// `/dev/ttyN`; any other name fails to resolve (there is no filesystem
/// namespace here to fall back to — see the module doc).
pub fn resolve(name: &str) -> Option<DeviceId> {
    let minor_str = name.strip_prefix("/dev/tty")?;
    let minor: u8 = minor_str.parse().ok()?;
    Some(DeviceId { major: MAJOR_TTY, minor })
}

pub fn open(id: DeviceId, flags: u32) -> KResult<()> {
    driver_for(id.major)?.open(id.minor, flags)
}

pub fn read(id: DeviceId, buf: &mut [u8]) -> KResult<usize> {
    driver_for(id.major)?.read(id.minor, buf)
}

pub fn write(id: DeviceId, buf: &[u8]) -> KResult<usize> {
    driver_for(id.major)?.write(id.minor, buf)
}

pub fn control(id: DeviceId, cmd: u32, arg0: u32, arg1: u32) -> KResult<i32> {
    driver_for(id.major)?.control(id.minor, cmd, arg0, arg1)
}

pub fn close(id: DeviceId) {
    if let Ok(driver) = driver_for(id.major) {
        driver.close(id.minor);
    }
}
