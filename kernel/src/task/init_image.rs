//! The kernel's resident first task (spec.md §4.9's "init"), hand-built
//! as raw ELF bytes rather than compiled, since this kernel ships no
//! user-space toolchain to produce one. A real deployment would load
//! init off disk or out of a boot-loader module instead.
//!
//! The program itself is about as small as a task can be: it repeatedly
//! issues the `yield` syscall and loops, giving the scheduler something
//! live to round-robin against without doing anything that could corrupt
//! state. Its machine code, placed right after the program header at
//! file offset 84:
//!
//! ```text
//! loop:
//!     mov eax, 4      ; b8 04 00 00 00   (SYS_YIELD)
//!     int 0x80        ; cd 80
//!     jmp loop        ; eb f7
//! ```

const ENTRY_VADDR: u32 = 0x8004_8000;
const HEADERS_LEN: u32 = 52 + 32;

const CODE: [u8; 9] = [0xB8, 0x04, 0x00, 0x00, 0x00, 0xCD, 0x80, 0xEB, 0xF7];

const FILE_LEN: u32 = HEADERS_LEN + CODE.len() as u32;

const fn le32(v: u32) -> [u8; 4] {
    v.to_le_bytes()
}

const fn le16(v: u16) -> [u8; 2] {
    v.to_le_bytes()
}

/// Builds the 93-byte image at compile time: ELF header, one `PT_LOAD`
/// program header covering the whole file, then `CODE`.
const fn build() -> [u8; FILE_LEN as usize] {
    let mut out = [0u8; FILE_LEN as usize];
    let entry = ENTRY_VADDR + HEADERS_LEN;

    // e_ident
    out[0] = 0x7F;
    out[1] = b'E';
    out[2] = b'L';
    out[3] = b'F';
    out[4] = 1; // ELFCLASS32
    out[5] = 1; // ELFDATA2LSB
    out[6] = 1; // EI_VERSION

    // e_type = ET_EXEC
    let ty = le16(2);
    out[16] = ty[0];
    out[17] = ty[1];
    // e_machine = EM_386
    let machine = le16(3);
    out[18] = machine[0];
    out[19] = machine[1];
    // e_version
    let version = le32(1);
    out[20] = version[0];
    out[21] = version[1];
    out[22] = version[2];
    out[23] = version[3];
    // e_entry
    let e = le32(entry);
    out[24] = e[0];
    out[25] = e[1];
    out[26] = e[2];
    out[27] = e[3];
    // e_phoff = 52
    let phoff = le32(52);
    out[28] = phoff[0];
    out[29] = phoff[1];
    out[30] = phoff[2];
    out[31] = phoff[3];
    // e_shoff, e_flags stay zero
    // e_ehsize = 52
    let ehsize = le16(52);
    out[40] = ehsize[0];
    out[41] = ehsize[1];
    // e_phentsize = 32
    let phentsize = le16(32);
    out[42] = phentsize[0];
    out[43] = phentsize[1];
    // e_phnum = 1
    let phnum = le16(1);
    out[44] = phnum[0];
    out[45] = phnum[1];
    // e_shentsize, e_shnum, e_shstrndx stay zero

    // program header at offset 52
    let ph = 52;
    // p_type = PT_LOAD
    let p_type = le32(1);
    out[ph] = p_type[0];
    out[ph + 1] = p_type[1];
    out[ph + 2] = p_type[2];
    out[ph + 3] = p_type[3];
    // p_offset = 0 (stays zero)
    // p_vaddr
    let vaddr = le32(ENTRY_VADDR);
    out[ph + 8] = vaddr[0];
    out[ph + 9] = vaddr[1];
    out[ph + 10] = vaddr[2];
    out[ph + 11] = vaddr[3];
    // p_paddr (unused, mirror p_vaddr)
    out[ph + 12] = vaddr[0];
    out[ph + 13] = vaddr[1];
    out[ph + 14] = vaddr[2];
    out[ph + 15] = vaddr[3];
    // p_filesz
    let filesz = le32(FILE_LEN);
    out[ph + 16] = filesz[0];
    out[ph + 17] = filesz[1];
    out[ph + 18] = filesz[2];
    out[ph + 19] = filesz[3];
    // p_memsz (same as filesz, no bss growth)
    out[ph + 20] = filesz[0];
    out[ph + 21] = filesz[1];
    out[ph + 22] = filesz[2];
    out[ph + 23] = filesz[3];
    // p_flags = PF_R | PF_X
    let flags = le32(5);
    out[ph + 24] = flags[0];
    out[ph + 25] = flags[1];
    out[ph + 26] = flags[2];
    out[ph + 27] = flags[3];
    // p_align = 0x1000
    let align = le32(0x1000);
    out[ph + 28] = align[0];
    out[ph + 29] = align[1];
    out[ph + 30] = align[2];
    out[ph + 31] = align[3];

    // code, immediately after the program header
    let mut i = 0;
    while i < CODE.len() {
        out[HEADERS_LEN as usize + i] = CODE[i];
        i += 1;
    }

    out
}

pub static INIT_IMAGE: [u8; FILE_LEN as usize] = build();

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::elf::ElfImage;

    #[test]
    fn init_image_parses_as_a_valid_elf() {
        let elf = ElfImage::parse(&INIT_IMAGE).expect("hand-built init image must be well-formed");
        assert_eq!(elf.entry(), ENTRY_VADDR + HEADERS_LEN);
        let loads = elf.program_headers().filter(|p| p.is_load()).count();
        assert_eq!(loads, 1);
    }
}
