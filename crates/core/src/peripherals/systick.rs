// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use bitflags::bitflags;
use serde::Serialize;

bitflags! {
    /// SYST_CSR bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
    pub struct SystickControl: u32 {
        const ENABLE = 1 << 0;
        const TICKINT = 1 << 1;
        const CLKSOURCE = 1 << 2;
        const COUNTFLAG = 1 << 16;
    }
}

const RELOAD_MASK: u32 = 0x00FF_FFFF;

/// SysTick timer of one core. Standard address: 0xE000_E010.
///
/// Counts down once per core cycle. `advance` is arithmetic so a sleeping
/// core can be fast-forwarded by any number of cycles at once.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Systick {
    control: SystickControl,
    count_flag: bool,
    reload: u32,
    current: u32,
}

impl Systick {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_reg(&mut self, offset: u32) -> Option<u32> {
        let value = match offset {
            0x00 => {
                let flag = if std::mem::take(&mut self.count_flag) {
                    SystickControl::COUNTFLAG.bits()
                } else {
                    0
                };
                flag | self.control.bits()
            }
            0x04 => self.reload,
            0x08 => self.current,
            0x0C => 0x0000_270F,
            _ => return None,
        };
        Some(value)
    }

    /// Returns `false` for offsets outside the SysTick block.
    pub fn write_reg(&mut self, offset: u32, value: u32) -> bool {
        match offset {
            0x00 => {
                self.control = SystickControl::from_bits_truncate(value & 0x7);
            }
            0x04 => {
                self.reload = value & RELOAD_MASK;
            }
            0x08 => {
                self.current = 0;
                self.count_flag = false;
            }
            0x0C => {}
            _ => return false,
        }
        true
    }

    pub fn enabled(&self) -> bool {
        self.control.contains(SystickControl::ENABLE)
    }

    /// Runs the counter for `cycles`. Returns `true` if it reached zero with
    /// TICKINT set, i.e. the SysTick exception must be pended.
    pub fn advance(&mut self, cycles: u64) -> bool {
        if !self.enabled() || cycles == 0 {
            return false;
        }

        let mut remaining = cycles;
        let mut wrapped = false;

        if self.current > 0 {
            if remaining < self.current as u64 {
                self.current -= remaining as u32;
                return false;
            }
            remaining -= self.current as u64;
            self.current = 0;
            wrapped = true;
        }

        // At zero: the next cycle reloads, `reload` more cycles reach zero again.
        if remaining > 0 && self.reload != 0 {
            let period = self.reload as u64 + 1;
            if remaining >= period {
                wrapped = true;
            }
            let rem = remaining % period;
            self.current = if rem == 0 {
                0
            } else {
                self.reload - (rem as u32 - 1)
            };
        }

        if wrapped {
            self.count_flag = true;
        }
        wrapped && self.control.contains(SystickControl::TICKINT)
    }

    /// Cycles until the next exception request, if one can happen.
    pub fn cycles_until_fire(&self) -> Option<u64> {
        if !self.enabled() || !self.control.contains(SystickControl::TICKINT) {
            return None;
        }
        if self.current > 0 {
            Some(self.current as u64)
        } else if self.reload != 0 {
            Some(self.reload as u64 + 1)
        } else {
            None
        }
    }
}
