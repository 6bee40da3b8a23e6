// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Intel HEX reader.

use crate::push_bytes;
use anyhow::{anyhow, bail, Context, Result};
use picosim_core::memory::ProgramImage;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

const DATA: u8 = 0x00;
const END_OF_FILE: u8 = 0x01;
const EXTENDED_SEGMENT_ADDRESS: u8 = 0x02;
const START_SEGMENT_ADDRESS: u8 = 0x03;
const EXTENDED_LINEAR_ADDRESS: u8 = 0x04;
const START_LINEAR_ADDRESS: u8 = 0x05;

struct Record {
    kind: u8,
    offset: u16,
    data: Vec<u8>,
}

fn parse_record(line: &str) -> Result<Record> {
    let hex = line
        .strip_prefix(':')
        .ok_or_else(|| anyhow!("Record does not start with ':'"))?;
    if !hex.is_ascii() || hex.len() % 2 != 0 || hex.len() < 10 {
        bail!("Record has invalid length {}", hex.len());
    }
    let bytes = (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16))
        .collect::<Result<Vec<u8>, _>>()
        .context("Record contains non-hex characters")?;

    let count = bytes[0] as usize;
    if bytes.len() != count + 5 {
        bail!(
            "Record byte count {} does not match its length {}",
            count,
            bytes.len() - 5
        );
    }
    let sum = bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    if sum != 0 {
        bail!("Checksum mismatch (sum {:#04x})", sum);
    }

    Ok(Record {
        kind: bytes[3],
        offset: u16::from_be_bytes([bytes[1], bytes[2]]),
        data: bytes[4..4 + count].to_vec(),
    })
}

fn be_value(record: &Record, len: usize) -> Result<u32> {
    if record.data.len() != len {
        bail!(
            "Record type {:02x} needs {} data bytes, got {}",
            record.kind,
            len,
            record.data.len()
        );
    }
    Ok(record
        .data
        .iter()
        .fold(0u32, |acc, b| (acc << 8) | *b as u32))
}

pub fn load_ihex(path: &Path) -> Result<ProgramImage> {
    let data = fs::read(path).with_context(|| format!("Failed to read HEX file: {:?}", path))?;
    load_ihex_bytes(&data)
}

/// Parses an Intel HEX file. Contiguous data records are merged into one
/// segment; the entry point comes from a start address record if present,
/// otherwise it is the lowest data address.
pub fn load_ihex_bytes(data: &[u8]) -> Result<ProgramImage> {
    let text = std::str::from_utf8(data).context("HEX file is not ASCII")?;
    let mut image = ProgramImage::new(0);
    let mut base = 0u32;
    let mut entry = None;
    let mut saw_eof = false;

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let record = parse_record(line).with_context(|| format!("Line {}", index + 1))?;
        match record.kind {
            DATA => {
                let addr = base.wrapping_add(record.offset as u32);
                push_bytes(&mut image, addr, &record.data);
            }
            END_OF_FILE => {
                saw_eof = true;
                break;
            }
            EXTENDED_SEGMENT_ADDRESS => base = be_value(&record, 2)? << 4,
            EXTENDED_LINEAR_ADDRESS => base = be_value(&record, 2)? << 16,
            START_LINEAR_ADDRESS => entry = Some(be_value(&record, 4)?),
            START_SEGMENT_ADDRESS => {
                let cs_ip = be_value(&record, 4)?;
                entry = Some(((cs_ip >> 16) << 4) + (cs_ip & 0xFFFF));
            }
            other => {
                warn!("Line {}: skipping unknown record type {:02x}", index + 1, other);
            }
        }
    }

    if !saw_eof {
        warn!("HEX file has no end-of-file record");
    }
    image.entry_point = entry
        .or_else(|| image.segments.iter().map(|s| s.start_addr).min())
        .unwrap_or(0);
    debug!(
        "HEX image: {} segments, {} bytes, entry {:#010x}",
        image.segments.len(),
        image.total_bytes(),
        image.entry_point
    );
    Ok(image)
}
