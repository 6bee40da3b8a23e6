// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

pub const BOOTROM_BASE: u32 = 0x0000_0000;
pub const BOOTROM_WORDS: usize = 4096;
pub const FLASH_BASE: u32 = 0x1000_0000;
pub const FLASH_SIZE: usize = 16 * 1024 * 1024;
pub const SRAM_BASE: u32 = 0x2000_0000;
pub const SRAM_SIZE: usize = 264 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub start_addr: u32,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramImage {
    pub entry_point: u32,
    pub segments: Vec<Segment>,
}

impl ProgramImage {
    pub fn new(entry_point: u32) -> Self {
        Self {
            entry_point,
            segments: Vec::new(),
        }
    }

    pub fn add_segment(&mut self, start_addr: u32, data: Vec<u8>) {
        self.segments.push(Segment { start_addr, data });
    }

    pub fn total_bytes(&self) -> usize {
        self.segments.iter().map(|s| s.data.len()).sum()
    }
}

/// A flat little-endian memory window.
pub struct LinearMemory {
    pub data: Vec<u8>,
    pub base_addr: u32,
}

impl std::fmt::Debug for LinearMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinearMemory")
            .field("base_addr", &format_args!("{:#010x}", self.base_addr))
            .field("size", &self.data.len())
            .finish()
    }
}

impl LinearMemory {
    pub fn new(size: usize, base_addr: u32, fill: u8) -> Self {
        Self {
            data: vec![fill; size],
            base_addr,
        }
    }

    /// Offset of `addr` if the whole `width`-byte access fits in the window.
    #[inline(always)]
    fn offset(&self, addr: u32, width: usize) -> Option<usize> {
        let off = addr.wrapping_sub(self.base_addr) as usize;
        if addr >= self.base_addr && off + width <= self.data.len() {
            Some(off)
        } else {
            None
        }
    }

    #[inline(always)]
    pub fn contains(&self, addr: u32) -> bool {
        self.offset(addr, 1).is_some()
    }

    pub fn read_u8(&self, addr: u32) -> Option<u8> {
        self.offset(addr, 1).map(|o| self.data[o])
    }

    pub fn read_u16(&self, addr: u32) -> Option<u16> {
        self.offset(addr, 2)
            .map(|o| u16::from_le_bytes([self.data[o], self.data[o + 1]]))
    }

    pub fn read_u32(&self, addr: u32) -> Option<u32> {
        self.offset(addr, 4).map(|o| {
            u32::from_le_bytes([
                self.data[o],
                self.data[o + 1],
                self.data[o + 2],
                self.data[o + 3],
            ])
        })
    }

    pub fn write_u8(&mut self, addr: u32, value: u8) -> bool {
        match self.offset(addr, 1) {
            Some(o) => {
                self.data[o] = value;
                true
            }
            None => false,
        }
    }

    pub fn write_u16(&mut self, addr: u32, value: u16) -> bool {
        match self.offset(addr, 2) {
            Some(o) => {
                self.data[o..o + 2].copy_from_slice(&value.to_le_bytes());
                true
            }
            None => false,
        }
    }

    pub fn write_u32(&mut self, addr: u32, value: u32) -> bool {
        match self.offset(addr, 4) {
            Some(o) => {
                self.data[o..o + 4].copy_from_slice(&value.to_le_bytes());
                true
            }
            None => false,
        }
    }

    pub fn load_from_segment(&mut self, segment: &Segment) -> bool {
        match self.offset(segment.start_addr, segment.data.len()) {
            Some(o) => {
                self.data[o..o + segment.data.len()].copy_from_slice(&segment.data);
                true
            }
            None => false,
        }
    }
}
