// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

pub const REG_SP: u8 = 13;
pub const REG_LR: u8 = 14;
pub const REG_PC: u8 = 15;

/// xPSR.T, always set: only Thumb state exists on this core.
pub const XPSR_THUMB: u32 = 1 << 24;
const SP_INIT: u32 = 0xFFFF_FFFC;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExecutionMode {
    #[default]
    Thread,
    Handler,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StackSelect {
    #[default]
    Main,
    Process,
}

/// APSR condition flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Flags {
    pub n: bool,
    pub z: bool,
    pub c: bool,
    pub v: bool,
}

impl Flags {
    pub fn to_apsr(self) -> u32 {
        ((self.n as u32) << 31)
            | ((self.z as u32) << 30)
            | ((self.c as u32) << 29)
            | ((self.v as u32) << 28)
    }

    pub fn from_apsr(value: u32) -> Self {
        Self {
            n: value & (1 << 31) != 0,
            z: value & (1 << 30) != 0,
            c: value & (1 << 29) != 0,
            v: value & (1 << 28) != 0,
        }
    }

    #[inline(always)]
    pub fn set_nz(&mut self, result: u32) {
        self.n = (result as i32) < 0;
        self.z = result == 0;
    }
}

/// Architectural register state of one core.
///
/// `r[13]` is always the live stack pointer. The other bank is kept in
/// `banked_sp` and the two are only ever exchanged by [`switch_stack`].
///
/// [`switch_stack`]: RegisterFile::switch_stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterFile {
    r: [u32; 16],
    banked_sp: u32,
    pub flags: Flags,
    pub mode: ExecutionMode,
    spsel: StackSelect,
    pub npriv: bool,
    pub ipsr: u32,
    pub primask: bool,
}

impl Default for RegisterFile {
    fn default() -> Self {
        let mut r = [0; 16];
        r[REG_SP as usize] = SP_INIT;
        Self {
            r,
            banked_sp: SP_INIT,
            flags: Flags::default(),
            mode: ExecutionMode::Thread,
            spsel: StackSelect::Main,
            npriv: false,
            ipsr: 0,
            primask: false,
        }
    }
}

impl RegisterFile {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn get(&self, n: u8) -> u32 {
        self.r[(n & 0xF) as usize]
    }

    /// Plain register write. SP drops its two low bits, PC is stored as is.
    #[inline(always)]
    pub fn set(&mut self, n: u8, value: u32) {
        let n = (n & 0xF) as usize;
        self.r[n] = if n == REG_SP as usize { value & !3 } else { value };
    }

    pub fn sp(&self) -> u32 {
        self.r[REG_SP as usize]
    }

    pub fn set_sp(&mut self, value: u32) {
        self.r[REG_SP as usize] = value & !3;
    }

    pub fn lr(&self) -> u32 {
        self.r[REG_LR as usize]
    }

    pub fn set_lr(&mut self, value: u32) {
        self.r[REG_LR as usize] = value;
    }

    pub fn pc(&self) -> u32 {
        self.r[REG_PC as usize]
    }

    pub fn set_pc(&mut self, value: u32) {
        self.r[REG_PC as usize] = value;
    }

    pub fn apsr(&self) -> u32 {
        self.flags.to_apsr()
    }

    pub fn set_apsr(&mut self, value: u32) {
        self.flags = Flags::from_apsr(value);
    }

    pub fn xpsr(&self) -> u32 {
        self.apsr() | self.ipsr | XPSR_THUMB
    }

    pub fn set_xpsr(&mut self, value: u32) {
        self.set_apsr(value);
        self.ipsr = value & 0x3F;
    }

    pub fn spsel(&self) -> StackSelect {
        self.spsel
    }

    pub fn msp(&self) -> u32 {
        match self.spsel {
            StackSelect::Main => self.sp(),
            StackSelect::Process => self.banked_sp,
        }
    }

    pub fn set_msp(&mut self, value: u32) {
        match self.spsel {
            StackSelect::Main => self.set_sp(value),
            StackSelect::Process => self.banked_sp = value & !3,
        }
    }

    pub fn psp(&self) -> u32 {
        match self.spsel {
            StackSelect::Process => self.sp(),
            StackSelect::Main => self.banked_sp,
        }
    }

    pub fn set_psp(&mut self, value: u32) {
        match self.spsel {
            StackSelect::Process => self.set_sp(value),
            StackSelect::Main => self.banked_sp = value & !3,
        }
    }

    /// Makes `select` the live stack pointer, stashing the current one.
    pub fn switch_stack(&mut self, select: StackSelect) {
        if self.spsel != select {
            std::mem::swap(&mut self.r[REG_SP as usize], &mut self.banked_sp);
            self.spsel = select;
        }
    }

    /// CONTROL register: SPSEL in bit 1, nPRIV in bit 0.
    pub fn control(&self) -> u32 {
        let spsel = if self.spsel == StackSelect::Process { 2 } else { 0 };
        spsel | self.npriv as u32
    }

    pub fn registers(&self) -> &[u32; 16] {
        &self.r
    }
}
