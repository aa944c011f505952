//! PE64 image loading.

use goblin;

use crate::error::*;
use crate::image::{Image, MemoryPermissions};

/// Map the sections of a PE32+ at `image_base + virtual_address`.
pub(crate) fn load(bytes: &[u8]) -> Result<Image> {
    let pe = goblin::pe::PE::parse(bytes)?;

    if !pe.is_64 {
        bail!(ErrorKind::FormatUnsupported);
    }

    let mut image = Image::new();

    for section in &pe.sections {
        let file_offset = section.pointer_to_raw_data as usize;
        let file_size = section.size_of_raw_data as usize;
        let mut data = bytes
            .get(file_offset..(file_offset + file_size))
            .ok_or_else(|| Error::from("Malformed PE"))?
            .to_vec();

        // Zero-fill up to the in-memory size of the section.
        let virtual_size = section.virtual_size as usize;
        if data.len() < virtual_size {
            data.append(&mut vec![0; virtual_size - data.len()]);
        }

        let address = section.virtual_address as u64 + pe.image_base as u64;

        let mut permissions = MemoryPermissions::NONE;
        if section.characteristics & goblin::pe::section_table::IMAGE_SCN_MEM_READ != 0 {
            permissions |= MemoryPermissions::READ;
        }
        if section.characteristics & goblin::pe::section_table::IMAGE_SCN_MEM_WRITE != 0 {
            permissions |= MemoryPermissions::WRITE;
        }
        if section.characteristics & goblin::pe::section_table::IMAGE_SCN_MEM_EXECUTE != 0 {
            permissions |= MemoryPermissions::EXECUTE;
        }

        image.add_section(address, data, permissions);
    }

    Ok(image)
}
