//! Two-level 32-bit page tables (spec.md §3/§4.2/§6).
//!
//! A top-level directory entry stores the physical address of a page
//! table plus present/writable/user bits; bit 7 (page-size) marks a
//! 4 MiB directory-level mapping, used only by the kernel's own identity
//! map, never by user address spaces. Kernel entries (directory indices
//! `0..USER_DIR_INDEX`) are identical across every address space, copied
//! by value at address-space creation so traps and syscalls stay valid
//! regardless of which task's directory CR3 currently holds.

use crate::memory::address::{PhysAddr, VirtAddr, PAGE_SIZE, USER_BASE};
use crate::memory::pmm;
use crate::sync::spinlock::SpinLock;
use crate::util::error::{KResult, KernelError};
use bitflags::bitflags;
use spin::Once;

const ENTRIES_PER_TABLE: usize = 1024;
const USER_DIR_INDEX: usize = (USER_BASE >> 22) as usize;

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct PageFlags: u32 {
        const PRESENT    = 1 << 0;
        const WRITABLE   = 1 << 1;
        const USER       = 1 << 2;
        const PAGE_SIZE  = 1 << 7;
    }
}

impl PageFlags {
    pub const KERNEL_RW: Self = Self::PRESENT.union(Self::WRITABLE);
    pub const USER_RW: Self = Self::PRESENT.union(Self::WRITABLE).union(Self::USER);
}

#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
struct PageEntry(u32);

impl PageEntry {
    const fn empty() -> Self {
        Self(0)
    }

    fn new(frame: PhysAddr, flags: PageFlags) -> Self {
        Self((frame.as_u32() & !0xFFF) | flags.bits())
    }

    fn is_present(self) -> bool {
        self.0 & PageFlags::PRESENT.bits() != 0
    }

    fn frame(self) -> PhysAddr {
        PhysAddr::new(self.0 & !0xFFF)
    }

    fn flags(self) -> PageFlags {
        PageFlags::from_bits_truncate(self.0 & 0xFFF)
    }
}

#[repr(C, align(4096))]
struct Table {
    entries: [PageEntry; ENTRIES_PER_TABLE],
}

impl Table {
    fn at(phys: PhysAddr) -> &'static mut Table {
        unsafe { &mut *phys.as_kernel_ptr::<Table>() }
    }
}

/// A static map entry used to build the kernel's own page table once at
/// boot: `[virtual, physical, length, flags]`. The kernel's text/data and
/// the VGA/console MMIO window are mapped read-write here for simplicity
/// (spec.md §4.2: "kernel text read-only, kernel data/bss writable" is the
/// textbook layout; this kernel maps kernel code+data read-write as one
/// region, trading the read-only text protection for a much shorter map
/// table — noted as a simplification in DESIGN.md).
struct StaticMapping {
    vaddr: u32,
    paddr: u32,
    len: u32,
    flags: PageFlags,
}

const KERNEL_LOAD_BASE: u32 = 0xC010_0000;
const KERNEL_PHYS_BASE: u32 = 0x0010_0000;
const KERNEL_IMAGE_LEN: u32 = 16 * 1024 * 1024; // generous upper bound
const VGA_TEXT_BASE: u32 = 0x000B_8000;
const EXTENDED_RAM_BASE: u32 = 0x0010_0000;
const EXTENDED_RAM_LEN: u32 = 128 * 1024 * 1024 - EXTENDED_RAM_BASE;

fn static_map() -> [StaticMapping; 3] {
    [
        StaticMapping {
            vaddr: KERNEL_LOAD_BASE,
            paddr: KERNEL_PHYS_BASE,
            len: KERNEL_IMAGE_LEN,
            flags: PageFlags::KERNEL_RW,
        },
        StaticMapping {
            vaddr: VGA_TEXT_BASE,
            paddr: VGA_TEXT_BASE,
            len: PAGE_SIZE,
            flags: PageFlags::KERNEL_RW,
        },
        StaticMapping {
            vaddr: EXTENDED_RAM_BASE,
            paddr: EXTENDED_RAM_BASE,
            len: EXTENDED_RAM_LEN,
            flags: PageFlags::KERNEL_RW,
        },
    ]
}

static KERNEL_DIR: Once<PhysAddr> = Once::new();
static ALLOC_LOCK: SpinLock<()> = SpinLock::new(());

/// Returns the page table at `dir[index]`, allocating and zeroing a fresh
/// one if the directory entry is not yet present. Intermediate tables
/// always carry the USER bit when any user-space mapping might live
/// beneath them, since the permission check walks every level.
fn ensure_table(dir: &mut Table, index: usize, user: bool) -> KResult<&'static mut Table> {
    let entry = dir.entries[index];
    if entry.is_present() {
        return Ok(Table::at(entry.frame()));
    }
    let frame = pmm::alloc_frame_zeroed()?;
    let mut flags = PageFlags::KERNEL_RW;
    if user {
        flags |= PageFlags::USER;
    }
    dir.entries[index] = PageEntry::new(frame, flags);
    Ok(Table::at(frame))
}

pub fn map_page_in(dir_phys: PhysAddr, vaddr: VirtAddr, frame: PhysAddr, flags: PageFlags) -> KResult<()> {
    let _guard = ALLOC_LOCK.lock();
    let dir = Table::at(dir_phys);
    let user = flags.contains(PageFlags::USER);
    let table = ensure_table(dir, vaddr.directory_index(), user)?;
    table.entries[vaddr.table_index()] = PageEntry::new(frame, flags);
    Ok(())
}

pub fn map_page(vaddr: VirtAddr, frame: PhysAddr, flags: PageFlags) -> KResult<()> {
    map_page_in(current_directory(), vaddr, frame, flags)
}

pub fn translate_in(dir_phys: PhysAddr, vaddr: VirtAddr) -> Option<PhysAddr> {
    let dir = Table::at(dir_phys);
    let dir_entry = dir.entries[vaddr.directory_index()];
    if !dir_entry.is_present() {
        return None;
    }
    if dir_entry.flags().contains(PageFlags::PAGE_SIZE) {
        return Some(PhysAddr::new(dir_entry.frame().as_u32() | vaddr.page_offset()));
    }
    let table = Table::at(dir_entry.frame());
    let page_entry = table.entries[vaddr.table_index()];
    if !page_entry.is_present() {
        return None;
    }
    Some(PhysAddr::new(page_entry.frame().as_u32() | vaddr.page_offset()))
}

pub fn translate(vaddr: VirtAddr) -> Option<PhysAddr> {
    translate_in(current_directory(), vaddr)
}

fn current_directory() -> PhysAddr {
    PhysAddr::new(crate::arch::cpu::read_cr3())
}

/// Builds the kernel's master page directory from the static map table
/// and enables paging. Called once, early in `kmain`.
pub fn init_kernel_address_space() {
    let dir_phys = pmm::alloc_frame_zeroed().expect("paging: no frame for kernel directory");
    let dir = Table::at(dir_phys);

    for mapping in static_map() {
        let mut off = 0u32;
        while off < mapping.len {
            let vaddr = VirtAddr::new(mapping.vaddr + off);
            let paddr = PhysAddr::new(mapping.paddr + off);
            let table = ensure_table(dir, vaddr.directory_index(), false)
                .expect("paging: no frame for kernel page table");
            table.entries[vaddr.table_index()] = PageEntry::new(paddr, mapping.flags);
            off += PAGE_SIZE;
        }
    }

    KERNEL_DIR.call_once(|| dir_phys);
    unsafe {
        crate::arch::cpu::write_cr3(dir_phys.as_u32());
        crate::arch::cpu::enable_paging();
    }
    log::info!("paging: kernel address space active (dir=0x{:08x})", dir_phys.as_u32());
}

fn kernel_dir() -> PhysAddr {
    *KERNEL_DIR.get().expect("paging: kernel address space not initialised")
}

/// Creates a new top-level directory for a process: a fresh page, with
/// the kernel half (`[0, USER_DIR_INDEX)`) copied by value from the
/// kernel directory so every address space can take a trap without a
/// page fault on the trampoline itself.
pub fn create_user_address_space() -> KResult<PhysAddr> {
    let dir_phys = pmm::alloc_frame_zeroed()?;
    let new_dir = Table::at(dir_phys);
    let kernel = Table::at(kernel_dir());
    new_dir.entries[..USER_DIR_INDEX].copy_from_slice(&kernel.entries[..USER_DIR_INDEX]);
    Ok(dir_phys)
}

/// Frees every present user-half mapping, its page tables, and finally
/// the directory itself. The kernel half is shared, never owned, and so
/// is never freed here.
pub fn destroy_address_space(dir_phys: PhysAddr) {
    let dir = Table::at(dir_phys);
    for index in USER_DIR_INDEX..ENTRIES_PER_TABLE {
        let entry = dir.entries[index];
        if !entry.is_present() {
            continue;
        }
        let table = Table::at(entry.frame());
        for leaf in table.entries.iter() {
            if leaf.is_present() {
                pmm::free_frame(leaf.frame());
            }
        }
        pmm::free_frame(entry.frame());
    }
    pmm::free_frame(dir_phys);
}

/// Eager-copy address space, used by `fork` (spec.md §4.2: "no COW").
/// Every present user-space leaf mapping gets a fresh physical page with
/// copied content, installed at the same virtual address with the same
/// permissions in the new directory.
pub fn copy_address_space(src_dir: PhysAddr) -> KResult<PhysAddr> {
    let dst_dir = create_user_address_space()?;
    let src = Table::at(src_dir);

    for dir_index in USER_DIR_INDEX..ENTRIES_PER_TABLE {
        let src_entry = src.entries[dir_index];
        if !src_entry.is_present() {
            continue;
        }
        let src_table = Table::at(src_entry.frame());
        for table_index in 0..ENTRIES_PER_TABLE {
            let leaf = src_table.entries[table_index];
            if !leaf.is_present() {
                continue;
            }
            let new_frame = pmm::alloc_frame().map_err(|e| {
                destroy_address_space(dst_dir);
                e
            })?;
            unsafe {
                core::ptr::copy_nonoverlapping(
                    leaf.frame().as_kernel_ptr::<u8>(),
                    new_frame.as_kernel_ptr::<u8>(),
                    PAGE_SIZE as usize,
                );
            }
            let vaddr = VirtAddr::new(((dir_index as u32) << 22) | ((table_index as u32) << 12));
            map_page_in(dst_dir, vaddr, new_frame, leaf.flags()).map_err(|e| {
                pmm::free_frame(new_frame);
                destroy_address_space(dst_dir);
                e
            })?;
        }
    }
    Ok(dst_dir)
}

/// Copies `size` bytes from a kernel-reachable source into `to_vaddr` of
/// `dir`'s address space, honoring page boundaries. Used by `execve` to
/// place argv/env in the new image's argument area, and by the ELF
/// loader to place segment contents.
pub fn copy_to(dir: PhysAddr, to_vaddr: VirtAddr, from: *const u8, size: usize) -> KResult<()> {
    let mut copied = 0usize;
    while copied < size {
        let vaddr = VirtAddr::new(to_vaddr.as_u32() + copied as u32);
        let phys = translate_in(dir, vaddr).ok_or(KernelError::BadPointer)?;
        let page_remaining = (PAGE_SIZE - vaddr.page_offset()) as usize;
        let chunk = page_remaining.min(size - copied);
        unsafe {
            core::ptr::copy_nonoverlapping(from.add(copied), phys.as_kernel_ptr::<u8>(), chunk);
        }
        copied += chunk;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_entry_roundtrips_frame_and_flags() {
        let frame = PhysAddr::new(0x0020_0000);
        let entry = PageEntry::new(frame, PageFlags::USER_RW);
        assert_eq!(entry.frame(), frame);
        assert!(entry.is_present());
        assert!(entry.flags().contains(PageFlags::USER));
    }

    #[test]
    fn virt_addr_splits_into_directory_and_table_index() {
        let v = VirtAddr::new(0x8040_3000);
        assert_eq!(v.directory_index(), USER_DIR_INDEX + 1);
        assert_eq!(v.table_index(), 3);
        assert_eq!(v.page_offset(), 0);
    }
}
