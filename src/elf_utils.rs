//! ELF program loading
//!
//! Fills a [`Memory`] image from the allocatable sections of an ELF
//! executable and reports the entry point. Only the loaded-memory
//! contract matters to the core; anything beyond flat section
//! placement (relocation, dynamic linking) is out of scope.

use std::path::Path;

use elf::abi::{SHF_ALLOC, SHT_NOBITS};
use elf::endian::AnyEndian;
use elf::section::SectionHeader;
use elf::string_table::StringTable;
use elf::ElfBytes;
use thiserror::Error;

use crate::hart::memory::{Memory, MemoryError};

#[derive(Debug, Error)]
pub enum ElfLoadError {
    #[error("could not read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse ELF: {0}")]
    Parse(#[from] elf::ParseError),
    #[error("section {name} at 0x{addr:x} does not fit in memory: {source}")]
    SectionOutOfRange {
        name: String,
        addr: u64,
        source: MemoryError,
    },
}

/// Get the section header name for this section
fn section_name<'a>(header: &SectionHeader, strtab: &'a StringTable) -> &'a str {
    strtab.get(header.sh_name as usize).unwrap_or("<unnamed>")
}

/// Load the allocatable sections of an ELF executable into memory at
/// their link addresses and return the entry point. NOBITS sections
/// (bss) stay zero, which a fresh memory already is.
pub fn load_elf(memory: &mut Memory, path: &Path) -> Result<u64, ElfLoadError> {
    let file_data = std::fs::read(path)?;
    let file = ElfBytes::<AnyEndian>::minimal_parse(&file_data)?;

    let (section_headers, strtab) = file.section_headers_with_strtab()?;
    let (section_headers, strtab) = match (section_headers, strtab) {
        (Some(headers), Some(strtab)) => (headers, strtab),
        _ => return Ok(file.ehdr.e_entry),
    };

    for header in section_headers.iter() {
        if header.sh_flags & u64::from(SHF_ALLOC) == 0 || header.sh_type == SHT_NOBITS {
            continue;
        }
        let name = section_name(&header, &strtab);
        let (data, compression) = file.section_data(&header)?;
        if compression.is_some() {
            log::warn!("skipping compressed section {name}");
            continue;
        }
        log::info!(
            "loading section {name}: {} bytes at 0x{:x}",
            data.len(),
            header.sh_addr
        );
        memory
            .load_image(header.sh_addr, data)
            .map_err(|source| ElfLoadError::SectionOutOfRange {
                name: name.to_string(),
                addr: header.sh_addr,
                source,
            })?;
    }

    Ok(file.ehdr.e_entry)
}
