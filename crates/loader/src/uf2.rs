// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! UF2 reader: a sequence of self-describing 512-byte flash blocks.

use crate::push_bytes;
use anyhow::{bail, Context, Result};
use picosim_core::memory::ProgramImage;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

pub const BLOCK_SIZE: usize = 512;
pub const MAGIC_START0: u32 = 0x0A32_4655;
pub const MAGIC_START1: u32 = 0x9E5D_5157;
pub const MAGIC_END: u32 = 0x0AB1_6F30;
pub const RP2040_FAMILY_ID: u32 = 0xE48B_FF56;

const MAX_PAYLOAD: usize = 476;
const DATA_OFFSET: usize = 32;

const FLAG_NOT_MAIN_FLASH: u32 = 0x0000_0001;
const FLAG_FAMILY_ID_PRESENT: u32 = 0x0000_2000;

#[derive(Debug, Clone, Copy)]
struct BlockHeader {
    flags: u32,
    target_addr: u32,
    payload_size: usize,
    block_no: u32,
    num_blocks: u32,
    family_id: Option<u32>,
}

fn word(block: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        block[offset],
        block[offset + 1],
        block[offset + 2],
        block[offset + 3],
    ])
}

fn parse_header(block: &[u8]) -> Result<BlockHeader> {
    if word(block, 0) != MAGIC_START0 || word(block, 4) != MAGIC_START1 {
        bail!("Bad start magic");
    }
    if word(block, BLOCK_SIZE - 4) != MAGIC_END {
        bail!("Bad end magic");
    }
    let flags = word(block, 8);
    let payload_size = word(block, 16) as usize;
    if payload_size > MAX_PAYLOAD {
        bail!("Payload size {} exceeds {}", payload_size, MAX_PAYLOAD);
    }
    Ok(BlockHeader {
        flags,
        target_addr: word(block, 12),
        payload_size,
        block_no: word(block, 20),
        num_blocks: word(block, 24),
        family_id: (flags & FLAG_FAMILY_ID_PRESENT != 0).then(|| word(block, 28)),
    })
}

pub fn load_uf2(path: &Path, family: Option<u32>) -> Result<ProgramImage> {
    let data = fs::read(path).with_context(|| format!("Failed to read UF2 file: {:?}", path))?;
    load_uf2_bytes(&data, family)
}

/// Collects the main-flash payloads of every block. With `family` set,
/// blocks tagged with a different family id are skipped; untagged blocks
/// are always taken. The entry point is the lowest target address.
pub fn load_uf2_bytes(data: &[u8], family: Option<u32>) -> Result<ProgramImage> {
    if data.len() % BLOCK_SIZE != 0 {
        warn!(
            "UF2 size {} is not a multiple of {}, ignoring the tail",
            data.len(),
            BLOCK_SIZE
        );
    }

    let mut image = ProgramImage::new(0);
    let mut skipped = 0usize;
    for (index, block) in data.chunks_exact(BLOCK_SIZE).enumerate() {
        let header = parse_header(block).with_context(|| format!("UF2 block {}", index))?;
        if header.flags & FLAG_NOT_MAIN_FLASH != 0 {
            skipped += 1;
            continue;
        }
        if let (Some(wanted), Some(found)) = (family, header.family_id) {
            if wanted != found {
                skipped += 1;
                continue;
            }
        }
        if header.block_no >= header.num_blocks {
            warn!(
                "UF2 block {} claims number {} of {}",
                index, header.block_no, header.num_blocks
            );
        }
        let payload = &block[DATA_OFFSET..DATA_OFFSET + header.payload_size];
        push_bytes(&mut image, header.target_addr, payload);
    }

    image.entry_point = image
        .segments
        .iter()
        .map(|s| s.start_addr)
        .min()
        .unwrap_or(0);
    debug!(
        "UF2 image: {} segments, {} bytes, {} blocks skipped",
        image.segments.len(),
        image.total_bytes(),
        skipped
    );
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(addr: u32, payload: &[u8], flags: u32, family: u32, no: u32, total: u32) -> Vec<u8> {
        let mut b = vec![0u8; BLOCK_SIZE];
        for (i, w) in [
            MAGIC_START0,
            MAGIC_START1,
            flags,
            addr,
            payload.len() as u32,
            no,
            total,
            family,
        ]
        .iter()
        .enumerate()
        {
            b[i * 4..i * 4 + 4].copy_from_slice(&w.to_le_bytes());
        }
        b[DATA_OFFSET..DATA_OFFSET + payload.len()].copy_from_slice(payload);
        b[BLOCK_SIZE - 4..].copy_from_slice(&MAGIC_END.to_le_bytes());
        b
    }

    #[test]
    fn test_consecutive_blocks_merge() {
        let mut file = block(0x1000_0000, &[0xAA; 256], 0x2000, RP2040_FAMILY_ID, 0, 2);
        file.extend(block(0x1000_0100, &[0xBB; 256], 0x2000, RP2040_FAMILY_ID, 1, 2));

        let image = load_uf2_bytes(&file, Some(RP2040_FAMILY_ID)).unwrap();
        assert_eq!(image.entry_point, 0x1000_0000);
        assert_eq!(image.segments.len(), 1);
        assert_eq!(image.segments[0].data.len(), 512);
        assert_eq!(image.segments[0].data[255], 0xAA);
        assert_eq!(image.segments[0].data[256], 0xBB);
    }

    #[test]
    fn test_foreign_family_and_non_flash_blocks_are_skipped() {
        let mut file = block(0x1000_0000, &[1; 4], 0x2000, RP2040_FAMILY_ID, 0, 3);
        file.extend(block(0x1000_1000, &[2; 4], 0x2000, 0x1234_5678, 1, 3));
        file.extend(block(0x1000_2000, &[3; 4], 0x0001, 0, 2, 3));

        let image = load_uf2_bytes(&file, Some(RP2040_FAMILY_ID)).unwrap();
        assert_eq!(image.segments.len(), 1);
        assert_eq!(image.segments[0].data, vec![1; 4]);

        // Without a family filter every main-flash block is taken.
        let image = load_uf2_bytes(&file, None).unwrap();
        assert_eq!(image.segments.len(), 2);
    }

    #[test]
    fn test_bad_magic_is_rejected() {
        let mut file = block(0x1000_0000, &[0; 4], 0, 0, 0, 1);
        file[BLOCK_SIZE - 1] ^= 0xFF;
        assert!(load_uf2_bytes(&file, None).is_err());

        let mut file = block(0x1000_0000, &[0; 4], 0, 0, 0, 1);
        file[16..20].copy_from_slice(&1000u32.to_le_bytes());
        assert!(load_uf2_bytes(&file, None).is_err());
    }
}
