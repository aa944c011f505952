//! Virtual-address-indexed read-only views of executable images.
//!
//! An [`Image`] maps the loaded segments of a binary at their preferred
//! virtual addresses and answers byte reads for the translation core.
//! Loaders for ELF64 and PE64 construct images through the same public
//! surface tests use: [`Image::new`] and [`Image::add_section`].

mod elf;
mod pe;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::collections::Bound::Included;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::*;

/// The executable file formats an `Image` can be loaded from.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum FileFormat {
    Elf64,
    Pe64,
}

bitflags! {
    /// RWX permissions for image memory.
    #[derive(Deserialize, Serialize)]
    pub struct MemoryPermissions: u32 {
        const NONE    = 0b000;
        const READ    = 0b001;
        const WRITE   = 0b010;
        const EXECUTE = 0b100;
        const ALL     = 0b111;
    }
}

/// A section of image memory. Essentially a vector of type `u8` with
/// permissions.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Section {
    data: Vec<u8>,
    permissions: MemoryPermissions,
}

impl Section {
    /// Create a new memory section.
    pub fn new(data: Vec<u8>, permissions: MemoryPermissions) -> Section {
        Section { data, permissions }
    }

    /// Get this memory section's data.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get the length of this memory section.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if this memory section holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get the permissions of this memory section.
    pub fn permissions(&self) -> MemoryPermissions {
        self.permissions
    }
}

/// A read-only memory model over the loaded segments of a binary.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Image {
    sections: BTreeMap<u64, Section>,
}

impl Image {
    /// Create a new, empty `Image`.
    pub fn new() -> Image {
        Image {
            sections: BTreeMap::new(),
        }
    }

    /// Load an `Image` from a file in the given format.
    ///
    /// Fails with `FormatUnsupported` if the file does not hold a 64-bit
    /// binary of the declared format.
    pub fn from_file<P: AsRef<Path>>(filename: P, format: FileFormat) -> Result<Image> {
        let mut file = File::open(filename)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        match format {
            FileFormat::Elf64 => elf::load(&bytes),
            FileFormat::Pe64 => pe::load(&bytes),
        }
    }

    /// Place a section at the given virtual address.
    pub fn add_section(&mut self, address: u64, data: Vec<u8>, permissions: MemoryPermissions) {
        self.sections.insert(address, Section::new(data, permissions));
    }

    /// Get the sections in this `Image`, keyed by virtual address.
    pub fn sections(&self) -> &BTreeMap<u64, Section> {
        &self.sections
    }

    /// Get the bytes from `address` to the end of the section containing
    /// it.
    ///
    /// The returned slice runs to the section end, which for well-formed
    /// inputs always covers the lifter's maximum lift window. Fails with
    /// `ImageError` if no loaded section maps `address`.
    pub fn bytes_at(&self, address: u64) -> Result<&[u8]> {
        self.section_address_offset(address)
            .map(|(section_address, offset)| &self.sections[&section_address].data()[offset..])
            .ok_or_else(|| ErrorKind::ImageError(address).into())
    }

    /// Get the permissions at the given address, or `None` if the address
    /// is unmapped.
    pub fn permissions(&self, address: u64) -> Option<MemoryPermissions> {
        self.section_address_offset(address)
            .map(|(section_address, _)| self.sections[&section_address].permissions())
    }

    fn section_address_offset(&self, address: u64) -> Option<(u64, usize)> {
        let mut sections = self.sections.range((Included(0), Included(address)));
        if let Some((section_address, section)) = sections.next_back() {
            if *section_address + section.len() as u64 > address {
                return Some((*section_address, (address - section_address) as usize));
            }
        }
        None
    }
}
