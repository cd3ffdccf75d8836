//! Executable image loader (spec.md §4.9/§6).
//!
//! Consumes a 32-bit, little-endian ELF with machine = i386 and type =
//! executable. This module only parses and validates the header and
//! program headers; `task::process::load_segments` does the actual
//! per-segment page allocation and copy, since that needs the target
//! address space's page directory.

use crate::util::error::{KResult, KernelError};

const ELF_MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];
const ELFCLASS32: u8 = 1;
const ELFDATA2LSB: u8 = 1;
const ET_EXEC: u16 = 2;
const EM_386: u16 = 3;
pub const PT_LOAD: u32 = 1;
pub const PF_X: u32 = 1 << 0;
pub const PF_W: u32 = 1 << 1;
pub const PF_R: u32 = 1 << 2;

#[derive(Clone, Copy)]
#[repr(C, packed)]
struct Elf32Header {
    e_ident: [u8; 16],
    e_type: u16,
    e_machine: u16,
    e_version: u32,
    e_entry: u32,
    e_phoff: u32,
    e_shoff: u32,
    e_flags: u32,
    e_ehsize: u16,
    e_phentsize: u16,
    e_phnum: u16,
    e_shentsize: u16,
    e_shnum: u16,
    e_shstrndx: u16,
}

#[derive(Clone, Copy)]
#[repr(C, packed)]
pub struct Elf32ProgramHeader {
    pub p_type: u32,
    pub p_offset: u32,
    pub p_vaddr: u32,
    pub p_paddr: u32,
    pub p_filesz: u32,
    pub p_memsz: u32,
    pub p_flags: u32,
    pub p_align: u32,
}

impl Elf32ProgramHeader {
    pub fn is_load(&self) -> bool {
        self.p_type == PT_LOAD
    }
}

pub struct ElfImage<'a> {
    data: &'a [u8],
    header: Elf32Header,
}

impl<'a> ElfImage<'a> {
    /// Validates the ELF header and returns a handle good for iterating
    /// program headers. Rejects anything that is not a 32-bit,
    /// little-endian, i386, statically-linked executable with at least
    /// one program header (spec.md §6).
    pub fn parse(data: &'a [u8]) -> KResult<Self> {
        if data.len() < core::mem::size_of::<Elf32Header>() {
            return Err(KernelError::InvalidImage);
        }
        let header = unsafe { (data.as_ptr() as *const Elf32Header).read_unaligned() };

        if header.e_ident[0..4] != ELF_MAGIC {
            return Err(KernelError::InvalidImage);
        }
        if header.e_ident[4] != ELFCLASS32 || header.e_ident[5] != ELFDATA2LSB {
            return Err(KernelError::InvalidImage);
        }
        if header.e_type != ET_EXEC || header.e_machine != EM_386 {
            return Err(KernelError::InvalidImage);
        }
        if header.e_entry == 0 || header.e_phentsize == 0 || header.e_phnum == 0 {
            return Err(KernelError::InvalidImage);
        }
        let phdrs_end = (header.e_phoff as usize)
            .checked_add(header.e_phnum as usize * header.e_phentsize as usize)
            .ok_or(KernelError::InvalidImage)?;
        if phdrs_end > data.len() {
            return Err(KernelError::InvalidImage);
        }

        let image = Self { data, header };
        if !image.program_headers().any(|p| p.is_load()) {
            return Err(KernelError::InvalidImage);
        }
        Ok(image)
    }

    pub fn entry(&self) -> u32 {
        self.header.e_entry
    }

    pub fn program_headers(&self) -> impl Iterator<Item = Elf32ProgramHeader> + '_ {
        let off = self.header.e_phoff as usize;
        let entsize = self.header.e_phentsize as usize;
        let count = self.header.e_phnum as usize;
        let data = self.data;
        (0..count).map(move |i| {
            let start = off + i * entsize;
            unsafe { (data[start..].as_ptr() as *const Elf32ProgramHeader).read_unaligned() }
        })
    }

    /// The file bytes backing a `PT_LOAD` segment's `p_filesz` prefix.
    pub fn segment_data(&self, phdr: &Elf32ProgramHeader) -> KResult<&'a [u8]> {
        let start = phdr.p_offset as usize;
        let end = start.checked_add(phdr.p_filesz as usize).ok_or(KernelError::InvalidImage)?;
        self.data.get(start..end).ok_or(KernelError::InvalidImage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_buffer() {
        let data = [0u8; 4];
        assert!(ElfImage::parse(&data).is_err());
    }

    #[test]
    fn rejects_bad_magic() {
        let mut data = [0u8; 64];
        data[0..4].copy_from_slice(&[0, 0, 0, 0]);
        assert!(ElfImage::parse(&data).is_err());
    }

    #[test]
    fn accepts_minimal_valid_header() {
        let mut data = [0u8; 64];
        data[0..4].copy_from_slice(&ELF_MAGIC);
        data[4] = ELFCLASS32;
        data[5] = ELFDATA2LSB;
        data[16..18].copy_from_slice(&ET_EXEC.to_le_bytes());
        data[18..20].copy_from_slice(&EM_386.to_le_bytes());
        data[24..28].copy_from_slice(&0x1000u32.to_le_bytes()); // e_entry
        data[28..32].copy_from_slice(&52u32.to_le_bytes()); // e_phoff
        data[42..44].copy_from_slice(&32u16.to_le_bytes()); // e_phentsize
        data[44..46].copy_from_slice(&1u16.to_le_bytes()); // e_phnum
        // one PT_LOAD program header starting at offset 52, inside a
        // larger buffer than `data` above so it fits the phdr + payload
        let mut buf = [0u8; 96];
        buf[..64].copy_from_slice(&data);
        buf[52..56].copy_from_slice(&PT_LOAD.to_le_bytes());
        assert!(ElfImage::parse(&buf).is_ok());
    }
}
