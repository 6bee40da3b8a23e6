// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Just enough of a Thumb assembler to write test programs inline.

use picosim_core::memory::ProgramImage;

pub const NOP: u16 = 0xBF00;
pub const WFE: u16 = 0xBF20;
pub const WFI: u16 = 0xBF30;
pub const SEV: u16 = 0xBF40;
pub const CPSIE_I: u16 = 0xB662;
pub const CPSID_I: u16 = 0xB672;

pub const LR: u8 = 14;

pub fn movs(rd: u8, imm: u8) -> u16 {
    0x2000 | (rd as u16) << 8 | imm as u16
}

pub fn adds_imm(rdn: u8, imm: u8) -> u16 {
    0x3000 | (rdn as u16) << 8 | imm as u16
}

pub fn subs_imm(rdn: u8, imm: u8) -> u16 {
    0x3800 | (rdn as u16) << 8 | imm as u16
}

pub fn cmp_imm(rn: u8, imm: u8) -> u16 {
    0x2800 | (rn as u16) << 8 | imm as u16
}

pub fn lsls(rd: u8, rm: u8, shift: u8) -> u16 {
    ((shift as u16) & 0x1F) << 6 | (rm as u16) << 3 | rd as u16
}

/// `ldr rt, [rn, #offset]`, offset in bytes.
pub fn ldr_imm(rt: u8, rn: u8, offset: u8) -> u16 {
    0x6800 | (((offset as u16) >> 2) & 0x1F) << 6 | (rn as u16) << 3 | rt as u16
}

/// `str rt, [rn, #offset]`, offset in bytes.
pub fn str_imm(rt: u8, rn: u8, offset: u8) -> u16 {
    0x6000 | (((offset as u16) >> 2) & 0x1F) << 6 | (rn as u16) << 3 | rt as u16
}

pub fn bx(rm: u8) -> u16 {
    0x4700 | (rm as u16) << 3
}

/// Unconditional branch; `offset` is relative to the instruction address + 4.
pub fn b(offset: i32) -> u16 {
    0xE000 | ((offset >> 1) as u16 & 0x7FF)
}

/// Conditional branch, `cond` as in the architecture (0 = EQ, 1 = NE, ...).
pub fn b_cond(cond: u8, offset: i32) -> u16 {
    0xD000 | (cond as u16) << 8 | ((offset >> 1) as u16 & 0xFF)
}

pub fn bl(offset: i32) -> [u16; 2] {
    let s = ((offset >> 24) & 1) as u16;
    let i1 = ((offset >> 23) & 1) as u16;
    let i2 = ((offset >> 22) & 1) as u16;
    let j1 = (!(i1 ^ s)) & 1;
    let j2 = (!(i2 ^ s)) & 1;
    let imm10 = ((offset >> 12) & 0x3FF) as u16;
    let imm11 = ((offset >> 1) & 0x7FF) as u16;
    [0xF000 | s << 10 | imm10, 0xD000 | j1 << 13 | j2 << 11 | imm11]
}

pub fn push(registers: u8, lr: bool) -> u16 {
    0xB400 | (lr as u16) << 8 | registers as u16
}

pub fn pop(registers: u8, pc: bool) -> u16 {
    0xBC00 | (pc as u16) << 8 | registers as u16
}

pub fn svc(imm: u8) -> u16 {
    0xDF00 | imm as u16
}

pub fn bkpt(imm: u8) -> u16 {
    0xBE00 | imm as u16
}

/// A program under construction at a fixed load address.
#[derive(Debug, Clone)]
pub struct Asm {
    base: u32,
    code: Vec<u16>,
}

impl Asm {
    pub fn new(base: u32) -> Self {
        Self {
            base,
            code: Vec::new(),
        }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    /// Address of the next instruction.
    pub fn here(&self) -> u32 {
        self.base + 2 * self.code.len() as u32
    }

    pub fn emit(&mut self, op: u16) -> &mut Self {
        self.code.push(op);
        self
    }

    pub fn emit_all(&mut self, ops: &[u16]) -> &mut Self {
        self.code.extend_from_slice(ops);
        self
    }

    /// Loads a 32-bit constant: `ldr rt, [pc, #0]`, a branch over the
    /// literal, then the literal itself.
    pub fn load(&mut self, rt: u8, value: u32) -> &mut Self {
        if self.here() % 4 != 0 {
            self.emit(NOP);
        }
        self.emit(0x4800 | (rt as u16) << 8);
        self.emit(b(2));
        self.word(value)
    }

    pub fn word(&mut self, value: u32) -> &mut Self {
        self.code.push(value as u16);
        self.code.push((value >> 16) as u16);
        self
    }

    /// `b .`
    pub fn spin(&mut self) -> &mut Self {
        self.emit(b(-4))
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.code.iter().flat_map(|h| h.to_le_bytes()).collect()
    }

    pub fn image(&self, entry_point: u32) -> ProgramImage {
        let mut image = ProgramImage::new(entry_point);
        image.add_segment(self.base, self.bytes());
        image
    }
}

/// Vector table with the initial SP, reset handler and any extra entries,
/// each handler address given without the Thumb bit.
pub fn vector_table(base: u32, sp: u32, reset: u32, handlers: &[(u32, u32)]) -> ProgramImage {
    let size = handlers.iter().map(|(n, _)| *n + 1).max().unwrap_or(2).max(2);
    let mut words = vec![0u32; size as usize];
    words[0] = sp;
    words[1] = reset | 1;
    for (n, addr) in handlers {
        words[*n as usize] = addr | 1;
    }
    let mut image = ProgramImage::new(reset | 1);
    image.add_segment(base, words.iter().flat_map(|w| w.to_le_bytes()).collect());
    image
}
