// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{anyhow, bail, Context, Result};
use goblin::elf::program_header::PT_LOAD;
use goblin::elf::Elf;
use picosim_core::memory::{ProgramImage, BOOTROM_BASE, BOOTROM_WORDS, FLASH_BASE};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

pub mod ihex;
pub mod uf2;

pub use ihex::load_ihex_bytes;
pub use uf2::{load_uf2_bytes, RP2040_FAMILY_ID};

/// Image formats understood by [`load_image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Elf,
    IntelHex,
    Uf2,
    /// Raw bytes placed at a fixed base address.
    Binary,
}

impl ImageFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "elf" | "axf" | "out" => Some(Self::Elf),
            "hex" | "ihex" => Some(Self::IntelHex),
            "uf2" => Some(Self::Uf2),
            "bin" => Some(Self::Binary),
            _ => None,
        }
    }

    /// Guess from the first bytes of a file with an unknown extension.
    pub fn sniff(data: &[u8]) -> Self {
        if data.starts_with(b"\x7fELF") {
            Self::Elf
        } else if data.starts_with(&uf2::MAGIC_START0.to_le_bytes()) {
            Self::Uf2
        } else if data.first() == Some(&b':') {
            Self::IntelHex
        } else {
            Self::Binary
        }
    }
}

/// Loads any supported image; the format comes from the file extension,
/// falling back to the file contents. Raw binaries go to flash.
pub fn load_image(path: &Path) -> Result<ProgramImage> {
    let data = fs::read(path).with_context(|| format!("Failed to read image file: {:?}", path))?;
    let format = ImageFormat::from_path(path).unwrap_or_else(|| ImageFormat::sniff(&data));
    info!("Loading {:?} as {:?}", path, format);

    let image = match format {
        ImageFormat::Elf => load_elf_bytes(&data),
        ImageFormat::IntelHex => load_ihex_bytes(&data),
        ImageFormat::Uf2 => load_uf2_bytes(&data, None),
        ImageFormat::Binary => Ok(load_binary_bytes(&data, FLASH_BASE)),
    }
    .with_context(|| format!("Failed to load image {:?}", path))?;

    if image.segments.is_empty() {
        warn!("Image {:?} contains no data", path);
    }
    Ok(image)
}

pub fn load_elf(path: &Path) -> Result<ProgramImage> {
    let buffer = fs::read(path).with_context(|| format!("Failed to read ELF file: {:?}", path))?;
    load_elf_bytes(&buffer)
}

pub fn load_elf_bytes(buffer: &[u8]) -> Result<ProgramImage> {
    let elf = Elf::parse(buffer).context("Failed to parse ELF binary")?;

    info!("ELF Entry Point: {:#x}", elf.entry);
    if elf.header.e_machine != goblin::elf::header::EM_ARM {
        warn!(
            "ELF machine type {} is not ARM, loading anyway",
            elf.header.e_machine
        );
    }

    let entry = u32::try_from(elf.entry).context("ELF entry point above 4 GiB")?;
    let mut program_image = ProgramImage::new(entry);

    for ph in &elf.program_headers {
        if ph.p_type != PT_LOAD {
            continue;
        }
        // Load address, so initialised data lands in flash where the
        // startup code copies it from.
        let start_addr = u32::try_from(ph.p_paddr).context("Segment address above 4 GiB")?;
        let size = ph.p_filesz as usize;
        let offset = ph.p_offset as usize;

        if size == 0 {
            continue;
        }

        debug!(
            "Found Loadable Segment: Addr={:#x}, Size={} bytes, Offset={:#x}",
            start_addr, size, offset
        );

        let end = offset
            .checked_add(size)
            .filter(|end| *end <= buffer.len())
            .ok_or_else(|| anyhow!("Segment out of bounds in ELF file"))?;
        program_image.add_segment(start_addr, buffer[offset..end].to_vec());
    }

    if program_image.segments.is_empty() {
        warn!("No loadable segments found in ELF file");
    }

    Ok(program_image)
}

pub fn load_binary_bytes(data: &[u8], base: u32) -> ProgramImage {
    let mut image = ProgramImage::new(base);
    if !data.is_empty() {
        image.add_segment(base, data.to_vec());
    }
    image
}

/// Reads a boot ROM: a raw `.bin` dump, or any image format whose segments
/// all lie inside the 16 KiB ROM window.
pub fn load_bootrom(path: &Path) -> Result<Vec<u32>> {
    let image = match ImageFormat::from_path(path) {
        Some(ImageFormat::Binary) | None => {
            let data =
                fs::read(path).with_context(|| format!("Failed to read boot ROM: {:?}", path))?;
            match ImageFormat::sniff(&data) {
                ImageFormat::Binary => load_binary_bytes(&data, BOOTROM_BASE),
                _ => load_image(path)?,
            }
        }
        Some(_) => load_image(path)?,
    };
    bootrom_words(&image).with_context(|| format!("Invalid boot ROM image {:?}", path))
}

/// Packs an image into little-endian boot ROM words.
pub fn bootrom_words(image: &ProgramImage) -> Result<Vec<u32>> {
    let rom_bytes = BOOTROM_WORDS * 4;
    let mut bytes = Vec::new();
    for segment in &image.segments {
        let start = segment.start_addr.wrapping_sub(BOOTROM_BASE) as usize;
        let end = start + segment.data.len();
        if end > rom_bytes {
            bail!(
                "Segment {:#010x}+{:#x} lies outside the boot ROM",
                segment.start_addr,
                segment.data.len()
            );
        }
        if bytes.len() < end {
            bytes.resize(end, 0);
        }
        bytes[start..end].copy_from_slice(&segment.data);
    }
    bytes.resize(bytes.len().next_multiple_of(4), 0);
    Ok(bytes
        .chunks_exact(4)
        .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
        .collect())
}

/// Appends `data` at `addr`, extending the last segment when contiguous.
pub(crate) fn push_bytes(image: &mut ProgramImage, addr: u32, data: &[u8]) {
    if let Some(last) = image.segments.last_mut() {
        if last.start_addr as u64 + last.data.len() as u64 == addr as u64 {
            last.data.extend_from_slice(data);
            return;
        }
    }
    image.add_segment(addr, data.to_vec());
}
