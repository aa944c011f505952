//! ELF64 image loading.

use goblin;

use crate::error::*;
use crate::image::{Image, MemoryPermissions};

/// Map the `PT_LOAD` segments of a 64-bit ELF at their preferred virtual
/// addresses.
pub(crate) fn load(bytes: &[u8]) -> Result<Image> {
    let elf = goblin::elf::Elf::parse(bytes)?;

    if !elf.is_64 {
        bail!(ErrorKind::FormatUnsupported);
    }

    let mut image = Image::new();

    for ph in &elf.program_headers {
        if ph.p_type != goblin::elf::program_header::PT_LOAD {
            continue;
        }

        let file_range = (ph.p_offset as usize)..((ph.p_offset + ph.p_filesz) as usize);
        let mut data = bytes
            .get(file_range)
            .ok_or_else(|| Error::from("Malformed Elf"))?
            .to_vec();

        // Zero-fill the segment up to its in-memory size (bss).
        if data.len() != ph.p_memsz as usize {
            data.append(&mut vec![0; (ph.p_memsz - ph.p_filesz) as usize]);
        }

        let mut permissions = MemoryPermissions::NONE;
        if ph.p_flags & goblin::elf::program_header::PF_R != 0 {
            permissions |= MemoryPermissions::READ;
        }
        if ph.p_flags & goblin::elf::program_header::PF_W != 0 {
            permissions |= MemoryPermissions::WRITE;
        }
        if ph.p_flags & goblin::elf::program_header::PF_X != 0 {
            permissions |= MemoryPermissions::EXECUTE;
        }

        image.add_section(ph.p_vaddr, data, permissions);
    }

    Ok(image)
}
