// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Private Peripheral Bus of one core: SysTick, NVIC and the SCB registers
//! the M0+ implements. Offsets are relative to 0xE000_E000.

use super::cortex_m0::CortexM0;
use super::exceptions::MAX_HARDWARE_IRQ;

const SOURCE: &str = "PPB";

const CPUID_VALUE: u32 = 0x410C_C601;

const SYST_CSR: u32 = 0x010;
const SYST_CALIB: u32 = 0x01C;
const NVIC_ISER: u32 = 0x100;
const NVIC_ICER: u32 = 0x180;
const NVIC_ISPR: u32 = 0x200;
const NVIC_ICPR: u32 = 0x280;
const NVIC_IPR0: u32 = 0x400;
const NVIC_IPR7: u32 = 0x41C;
const CPUID: u32 = 0xD00;
const ICSR: u32 = 0xD04;
const VTOR: u32 = 0xD08;
const SHPR2: u32 = 0xD1C;
const SHPR3: u32 = 0xD20;

const ICSR_NMIPENDSET: u32 = 1 << 31;
const ICSR_PENDSVSET: u32 = 1 << 28;
const ICSR_PENDSVCLR: u32 = 1 << 27;
const ICSR_PENDSTSET: u32 = 1 << 26;
const ICSR_PENDSTCLR: u32 = 1 << 25;
const ICSR_ISRPENDING: u32 = 1 << 22;

/// Pending bits of these lines follow the peripheral level and cannot be
/// cleared by software.
const HARDWARE_LINES: u32 = (1 << (MAX_HARDWARE_IRQ + 1)) - 1;

impl CortexM0 {
    pub(crate) fn ppb_read(&mut self, offset: u32) -> u32 {
        match offset {
            SYST_CSR..=SYST_CALIB => self.systick.read_reg(offset - SYST_CSR).unwrap_or(0),
            NVIC_ISER | NVIC_ICER => self.nvic.enabled,
            NVIC_ISPR | NVIC_ICPR => self.nvic.pending,
            NVIC_IPR0..=NVIC_IPR7 => self.nvic.read_ipr((offset - NVIC_IPR0) >> 2),
            CPUID => CPUID_VALUE,
            ICSR => {
                let nvic = &self.nvic;
                let mut value = 0;
                if nvic.pending_nmi {
                    value |= ICSR_NMIPENDSET;
                }
                if nvic.pending_pendsv {
                    value |= ICSR_PENDSVSET;
                }
                if nvic.pending_systick {
                    value |= ICSR_PENDSTSET;
                }
                if nvic.any_pending() {
                    value |= ICSR_ISRPENDING;
                }
                value | (nvic.vect_pending() << 12) | (self.regs.ipsr & 0x1FF)
            }
            VTOR => self.nvic.vtor,
            SHPR2 => self.nvic.shpr2,
            SHPR3 => self.nvic.shpr3,
            _ => {
                self.logger().warn(
                    SOURCE,
                    format_args!("Unimplemented peripheral read from {:#x}", offset),
                );
                0xFFFF_FFFF
            }
        }
    }

    pub(crate) fn ppb_write(&mut self, offset: u32, value: u32) {
        match offset {
            SYST_CSR..=SYST_CALIB => {
                self.systick.write_reg(offset - SYST_CSR, value);
            }
            NVIC_ISER => {
                self.nvic.enabled |= value;
                self.nvic.dirty = true;
            }
            NVIC_ICER => self.nvic.enabled &= !value,
            NVIC_ISPR => {
                self.nvic.pending |= value;
                self.nvic.dirty = true;
            }
            NVIC_ICPR => self.nvic.pending &= !value | HARDWARE_LINES,
            NVIC_IPR0..=NVIC_IPR7 => self.nvic.write_ipr((offset - NVIC_IPR0) >> 2, value),
            CPUID => {}
            ICSR => {
                let nvic = &mut self.nvic;
                if value & ICSR_NMIPENDSET != 0 {
                    nvic.pending_nmi = true;
                    nvic.dirty = true;
                }
                if value & ICSR_PENDSVSET != 0 {
                    nvic.pending_pendsv = true;
                    nvic.dirty = true;
                }
                if value & ICSR_PENDSVCLR != 0 {
                    nvic.pending_pendsv = false;
                }
                if value & ICSR_PENDSTSET != 0 {
                    nvic.pending_systick = true;
                    nvic.dirty = true;
                }
                if value & ICSR_PENDSTCLR != 0 {
                    nvic.pending_systick = false;
                }
            }
            VTOR => self.nvic.vtor = value,
            SHPR2 => self.nvic.shpr2 = value,
            SHPR3 => self.nvic.shpr3 = value,
            _ => {
                self.logger().warn(
                    SOURCE,
                    format_args!(
                        "Unimplemented peripheral write to {:#x}: {:#x}",
                        offset, value
                    ),
                );
            }
        }
    }
}
