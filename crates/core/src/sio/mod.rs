// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Single-cycle IO block at 0xD000_0000. Every access carries the id of the
//! issuing core: CPUID, the FIFO ports, the divider and the interpolators
//! are banked per core, GPIO and spinlocks are shared.

pub mod divider;
pub mod interp;

use crate::logging::SharedLogger;
use crate::utils::fifo::Fifo;
use divider::{HardwareDivider, DIVIDER_STALL_CYCLES};
use interp::Interpolator;
use serde::Serialize;

const SOURCE: &str = "SIO";

pub const SIO_BASE: u32 = 0xD000_0000;
pub const FIFO_DEPTH: usize = 8;

/// NVIC line raised on core n by its inter-core FIFO is `SIO_IRQ_PROC0 + n`.
pub const SIO_IRQ_PROC0: u32 = 15;
pub const SIO_IRQ_PROC1: u32 = 16;

const CPUID: u32 = 0x000;
const GPIO_IN: u32 = 0x004;
const GPIO_HI_IN: u32 = 0x008;
const GPIO_OUT: u32 = 0x010;
const GPIO_OUT_SET: u32 = 0x014;
const GPIO_OUT_CLR: u32 = 0x018;
const GPIO_OUT_XOR: u32 = 0x01C;
const GPIO_OE: u32 = 0x020;
const GPIO_OE_SET: u32 = 0x024;
const GPIO_OE_CLR: u32 = 0x028;
const GPIO_OE_XOR: u32 = 0x02C;
const GPIO_HI_OUT: u32 = 0x030;
const GPIO_HI_OUT_SET: u32 = 0x034;
const GPIO_HI_OUT_CLR: u32 = 0x038;
const GPIO_HI_OUT_XOR: u32 = 0x03C;
const GPIO_HI_OE: u32 = 0x040;
const GPIO_HI_OE_SET: u32 = 0x044;
const GPIO_HI_OE_CLR: u32 = 0x048;
const GPIO_HI_OE_XOR: u32 = 0x04C;

const FIFO_ST: u32 = 0x050;
const FIFO_WR: u32 = 0x054;
const FIFO_RD: u32 = 0x058;
const SPINLOCK_ST: u32 = 0x05C;

const DIV_UDIVIDEND: u32 = 0x060;
const DIV_UDIVISOR: u32 = 0x064;
const DIV_SDIVIDEND: u32 = 0x068;
const DIV_SDIVISOR: u32 = 0x06C;
const DIV_QUOTIENT: u32 = 0x070;
const DIV_REMAINDER: u32 = 0x074;
const DIV_CSR: u32 = 0x078;

const INTERP0_BASE: u32 = 0x080;
const INTERP1_BASE: u32 = 0x0C0;
const INTERP_END: u32 = 0x100;

// Offsets within one interpolator
const ACCUM0: u32 = 0x00;
const ACCUM1: u32 = 0x04;
const BASE0: u32 = 0x08;
const BASE1: u32 = 0x0C;
const BASE2: u32 = 0x10;
const POP_LANE0: u32 = 0x14;
const POP_LANE1: u32 = 0x18;
const POP_FULL: u32 = 0x1C;
const PEEK_LANE0: u32 = 0x20;
const PEEK_LANE1: u32 = 0x24;
const PEEK_FULL: u32 = 0x28;
const CTRL_LANE0: u32 = 0x2C;
const CTRL_LANE1: u32 = 0x30;
const ACCUM0_ADD: u32 = 0x34;
const ACCUM1_ADD: u32 = 0x38;
const BASE_1AND0: u32 = 0x3C;

const SPINLOCK0: u32 = 0x100;
const SPINLOCK31: u32 = 0x17C;

const GPIO_MASK: u32 = 0x3FFF_FFFF;
const QSPI_MASK: u32 = 0x3F;

// FIFO_ST
const FIFO_VLD: u32 = 1 << 0;
const FIFO_RDY: u32 = 1 << 1;
const FIFO_WOF: u32 = 1 << 2;
const FIFO_ROE: u32 = 1 << 3;

/// State banked per core.
#[derive(Debug, Clone, Serialize)]
pub struct SioCore {
    pub divider: HardwareDivider,
    pub interp: [Interpolator; 2],
    /// Sticky WOF/ROE bits of FIFO_ST.
    pub fifo_flags: u32,
    #[serde(skip)]
    stall_cycles: u32,
}

impl SioCore {
    fn new() -> Self {
        Self {
            divider: HardwareDivider::new(),
            interp: [Interpolator::new(0), Interpolator::new(1)],
            fifo_flags: 0,
            stall_cycles: 0,
        }
    }
}

#[derive(Serialize)]
pub struct Sio {
    pub gpio_out: u32,
    pub gpio_oe: u32,
    pub qspi_out: u32,
    pub qspi_oe: u32,
    /// Pin levels driven by the host.
    pub gpio_in: u32,
    pub qspi_in: u32,
    pub spinlocks: u32,
    /// `rx_fifos[n]` is read by core n and written by the other core.
    pub rx_fifos: [Fifo; 2],
    pub cores: [SioCore; 2],
    #[serde(skip)]
    logger: SharedLogger,
}

impl std::fmt::Debug for Sio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sio")
            .field("gpio_out", &self.gpio_out)
            .field("gpio_oe", &self.gpio_oe)
            .field("spinlocks", &self.spinlocks)
            .field("rx_fifos", &self.rx_fifos)
            .finish()
    }
}

impl Sio {
    pub fn new(logger: SharedLogger) -> Self {
        Self {
            gpio_out: 0,
            gpio_oe: 0,
            qspi_out: 0,
            qspi_oe: 0,
            gpio_in: 0,
            qspi_in: 0,
            spinlocks: 0,
            rx_fifos: [Fifo::new(FIFO_DEPTH), Fifo::new(FIFO_DEPTH)],
            cores: [SioCore::new(), SioCore::new()],
            logger,
        }
    }

    /// Clears all internal state. Input pin levels are driven from outside
    /// and survive.
    pub fn reset(&mut self) {
        let (gpio_in, qspi_in) = (self.gpio_in, self.qspi_in);
        *self = Self::new(self.logger.clone());
        self.gpio_in = gpio_in;
        self.qspi_in = qspi_in;
    }

    pub fn set_gpio_input(&mut self, pin: u32, high: bool) {
        if pin >= 30 {
            return;
        }
        if high {
            self.gpio_in |= 1 << pin;
        } else {
            self.gpio_in &= !(1 << pin);
        }
    }

    /// Level of SIO_IRQ_PROCn for core `core`.
    pub fn irq_level(&self, core: usize) -> bool {
        !self.rx_fifos[core & 1].is_empty() || self.cores[core & 1].fifo_flags != 0
    }

    /// Divider latency accumulated by `core` since the last call.
    pub fn take_stall_cycles(&mut self, core: usize) -> u32 {
        std::mem::take(&mut self.cores[core & 1].stall_cycles)
    }

    pub fn read_u32(&mut self, core: usize, offset: u32) -> u32 {
        let core = core & 1;
        if (SPINLOCK0..=SPINLOCK31).contains(&offset) {
            let bit = 1 << ((offset - SPINLOCK0) >> 2);
            if self.spinlocks & bit != 0 {
                return 0;
            }
            self.spinlocks |= bit;
            return bit;
        }
        if (INTERP0_BASE..INTERP_END).contains(&offset) {
            let lane = ((offset - INTERP0_BASE) >> 6) as usize;
            let reg = (offset - INTERP0_BASE) & 0x3F;
            if let Some(value) = Self::interp_read(&mut self.cores[core].interp[lane], reg) {
                return value;
            }
        }

        match offset {
            CPUID => core as u32,
            GPIO_IN => self.gpio_in,
            GPIO_HI_IN => self.qspi_in & QSPI_MASK,
            GPIO_OUT => self.gpio_out,
            GPIO_OE => self.gpio_oe,
            GPIO_HI_OUT => self.qspi_out,
            GPIO_HI_OE => self.qspi_oe,
            GPIO_OUT_SET | GPIO_OUT_CLR | GPIO_OUT_XOR | GPIO_OE_SET | GPIO_OE_CLR
            | GPIO_OE_XOR | GPIO_HI_OUT_SET | GPIO_HI_OUT_CLR | GPIO_HI_OUT_XOR
            | GPIO_HI_OE_SET | GPIO_HI_OE_CLR | GPIO_HI_OE_XOR => 0,
            FIFO_ST => {
                let mut status = self.cores[core].fifo_flags;
                if !self.rx_fifos[core].is_empty() {
                    status |= FIFO_VLD;
                }
                if !self.rx_fifos[core ^ 1].is_full() {
                    status |= FIFO_RDY;
                }
                status
            }
            FIFO_RD => {
                if self.rx_fifos[core].is_empty() {
                    self.cores[core].fifo_flags |= FIFO_ROE;
                    0
                } else {
                    self.rx_fifos[core].pull()
                }
            }
            SPINLOCK_ST => self.spinlocks,
            DIV_UDIVIDEND | DIV_SDIVIDEND => self.cores[core].divider.dividend,
            DIV_UDIVISOR | DIV_SDIVISOR => self.cores[core].divider.divisor,
            DIV_QUOTIENT => self.cores[core].divider.read_quotient(),
            DIV_REMAINDER => self.cores[core].divider.remainder,
            DIV_CSR => self.cores[core].divider.csr,
            _ => {
                self.logger.warn(
                    SOURCE,
                    format_args!("Read from invalid SIO address: {:#x}", offset),
                );
                0xFFFF_FFFF
            }
        }
    }

    pub fn write_u32(&mut self, core: usize, offset: u32, value: u32) {
        let core = core & 1;
        if (SPINLOCK0..=SPINLOCK31).contains(&offset) {
            self.spinlocks &= !(1 << ((offset - SPINLOCK0) >> 2));
            return;
        }
        if (INTERP0_BASE..INTERP_END).contains(&offset) {
            let lane = ((offset - INTERP0_BASE) >> 6) as usize;
            let reg = (offset - INTERP0_BASE) & 0x3F;
            if Self::interp_write(&mut self.cores[core].interp[lane], reg, value) {
                return;
            }
        }

        match offset {
            GPIO_OUT => self.gpio_out = value & GPIO_MASK,
            GPIO_OUT_SET => self.gpio_out |= value & GPIO_MASK,
            GPIO_OUT_CLR => self.gpio_out &= !value,
            GPIO_OUT_XOR => self.gpio_out ^= value & GPIO_MASK,
            GPIO_OE => self.gpio_oe = value & GPIO_MASK,
            GPIO_OE_SET => self.gpio_oe |= value & GPIO_MASK,
            GPIO_OE_CLR => self.gpio_oe &= !value,
            GPIO_OE_XOR => self.gpio_oe ^= value & GPIO_MASK,
            GPIO_HI_OUT => self.qspi_out = value & QSPI_MASK,
            GPIO_HI_OUT_SET => self.qspi_out |= value & QSPI_MASK,
            GPIO_HI_OUT_CLR => self.qspi_out &= !value,
            GPIO_HI_OUT_XOR => self.qspi_out ^= value & QSPI_MASK,
            GPIO_HI_OE => self.qspi_oe = value & QSPI_MASK,
            GPIO_HI_OE_SET => self.qspi_oe |= value & QSPI_MASK,
            GPIO_HI_OE_CLR => self.qspi_oe &= !value,
            GPIO_HI_OE_XOR => self.qspi_oe ^= value & QSPI_MASK,
            FIFO_ST => self.cores[core].fifo_flags &= !(value & (FIFO_WOF | FIFO_ROE)),
            FIFO_WR => {
                if !self.rx_fifos[core ^ 1].push(value) {
                    self.cores[core].fifo_flags |= FIFO_WOF;
                }
            }
            DIV_UDIVIDEND | DIV_SDIVIDEND => {
                let signed = offset == DIV_SDIVIDEND;
                self.cores[core].divider.set_dividend(value, signed);
                self.cores[core].stall_cycles += DIVIDER_STALL_CYCLES;
            }
            DIV_UDIVISOR | DIV_SDIVISOR => {
                let signed = offset == DIV_SDIVISOR;
                self.cores[core].divider.set_divisor(value, signed);
                self.cores[core].stall_cycles += DIVIDER_STALL_CYCLES;
            }
            DIV_QUOTIENT => self.cores[core].divider.set_quotient(value),
            DIV_REMAINDER => self.cores[core].divider.set_remainder(value),
            _ => {
                self.logger.warn(
                    SOURCE,
                    format_args!(
                        "Write to invalid SIO address: {:#x}, value={:#x}",
                        offset, value
                    ),
                );
            }
        }
    }

    fn interp_read(interp: &mut Interpolator, reg: u32) -> Option<u32> {
        let value = match reg {
            ACCUM0 => interp.accum0,
            ACCUM1 => interp.accum1,
            BASE0 => interp.base0,
            BASE1 => interp.base1,
            BASE2 => interp.base2,
            POP_LANE0 | POP_LANE1 | POP_FULL => {
                let value = match reg {
                    POP_LANE0 => interp.result0,
                    POP_LANE1 => interp.result1,
                    _ => interp.result2,
                };
                interp.writeback();
                value
            }
            PEEK_LANE0 => interp.result0,
            PEEK_LANE1 => interp.result1,
            PEEK_FULL => interp.result2,
            CTRL_LANE0 => interp.ctrl0,
            CTRL_LANE1 => interp.ctrl1,
            ACCUM0_ADD => interp.smresult0,
            ACCUM1_ADD => interp.smresult1,
            _ => return None,
        };
        Some(value)
    }

    fn interp_write(interp: &mut Interpolator, reg: u32, value: u32) -> bool {
        match reg {
            ACCUM0 => interp.accum0 = value,
            ACCUM1 => interp.accum1 = value,
            BASE0 => interp.base0 = value,
            BASE1 => interp.base1 = value,
            BASE2 => interp.base2 = value,
            CTRL_LANE0 => interp.ctrl0 = value,
            CTRL_LANE1 => interp.ctrl1 = value,
            ACCUM0_ADD => {
                interp.add_accum0(value);
                return true;
            }
            ACCUM1_ADD => {
                interp.add_accum1(value);
                return true;
            }
            BASE_1AND0 => {
                interp.set_base01(value);
                return true;
            }
            _ => return false,
        }
        interp.update();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogLevel, NullLogger, RecordingLogger};
    use std::sync::Arc;

    fn sio() -> Sio {
        Sio::new(Arc::new(NullLogger))
    }

    #[test]
    fn test_cpuid_per_core() {
        let mut sio = sio();
        assert_eq!(sio.read_u32(0, CPUID), 0);
        assert_eq!(sio.read_u32(1, CPUID), 1);
    }

    #[test]
    fn test_gpio_set_clear_xor() {
        let mut sio = sio();
        sio.write_u32(0, GPIO_OUT_SET, 0xFFFF_FFFF);
        assert_eq!(sio.read_u32(0, GPIO_OUT), GPIO_MASK);
        sio.write_u32(1, GPIO_OUT_CLR, 0x0000_00F0);
        sio.write_u32(0, GPIO_OUT_XOR, 0x0000_0001);
        assert_eq!(sio.read_u32(1, GPIO_OUT), GPIO_MASK & !0xF1);
        assert_eq!(sio.read_u32(0, GPIO_OUT_SET), 0);

        sio.write_u32(0, GPIO_OE, 0x25);
        sio.write_u32(0, GPIO_OE_CLR, 0x05);
        assert_eq!(sio.read_u32(0, GPIO_OE), 0x20);
    }

    #[test]
    fn test_qspi_writes_keep_six_pins() {
        let mut sio = sio();
        sio.write_u32(0, GPIO_HI_OUT_SET, 0xFFFF_FFFF);
        assert_eq!(sio.read_u32(0, GPIO_HI_OUT), QSPI_MASK);
        sio.write_u32(0, GPIO_HI_OUT_XOR, 0x0000_0FC1);
        assert_eq!(sio.read_u32(0, GPIO_HI_OUT), 0x3E);
        sio.write_u32(1, GPIO_HI_OE, 0x0000_FF00);
        assert_eq!(sio.read_u32(1, GPIO_HI_OE), 0);
        sio.write_u32(1, GPIO_HI_OE_SET, 0x0000_00FF);
        assert_eq!(sio.read_u32(0, GPIO_HI_OE), QSPI_MASK);
        sio.write_u32(0, GPIO_HI_OE_XOR, 0xFFFF_FFFF);
        assert_eq!(sio.read_u32(0, GPIO_HI_OE), 0);
    }

    #[test]
    fn test_gpio_inputs_from_host() {
        let mut sio = sio();
        sio.set_gpio_input(3, true);
        sio.set_gpio_input(29, true);
        sio.set_gpio_input(30, true);
        assert_eq!(sio.read_u32(0, GPIO_IN), (1 << 3) | (1 << 29));
        sio.set_gpio_input(3, false);
        assert_eq!(sio.read_u32(1, GPIO_IN), 1 << 29);
    }

    #[test]
    fn test_spinlock_claim_and_release() {
        let mut sio = sio();
        let lock5 = SPINLOCK0 + 5 * 4;
        assert_eq!(sio.read_u32(0, lock5), 1 << 5);
        assert_eq!(sio.read_u32(1, lock5), 0);
        assert_eq!(sio.read_u32(0, SPINLOCK_ST), 1 << 5);
        sio.write_u32(1, lock5, 0);
        assert_eq!(sio.read_u32(1, lock5), 1 << 5);
        assert_eq!(sio.read_u32(0, SPINLOCK31), 1 << 31);
    }

    #[test]
    fn test_fifo_between_cores() {
        let mut sio = sio();
        assert_eq!(sio.read_u32(0, FIFO_ST), FIFO_RDY);
        sio.write_u32(0, FIFO_WR, 0xCAFE);
        sio.write_u32(0, FIFO_WR, 0xBEEF);
        assert!(sio.irq_level(1));
        assert!(!sio.irq_level(0));
        assert_eq!(sio.read_u32(1, FIFO_ST), FIFO_VLD | FIFO_RDY);
        assert_eq!(sio.read_u32(1, FIFO_RD), 0xCAFE);
        assert_eq!(sio.read_u32(1, FIFO_RD), 0xBEEF);
        assert!(!sio.irq_level(1));
    }

    #[test]
    fn test_fifo_overflow_and_underflow_are_sticky() {
        let mut sio = sio();
        for i in 0..=FIFO_DEPTH as u32 {
            sio.write_u32(0, FIFO_WR, i);
        }
        assert_eq!(sio.read_u32(0, FIFO_ST), FIFO_WOF);
        assert!(sio.irq_level(0));

        assert_eq!(sio.read_u32(0, FIFO_RD), 0);
        assert_eq!(sio.read_u32(0, FIFO_ST) & FIFO_ROE, FIFO_ROE);

        sio.write_u32(0, FIFO_ST, FIFO_WOF | FIFO_ROE);
        assert_eq!(sio.read_u32(0, FIFO_ST), 0);
        assert!(!sio.irq_level(0));
        // The ninth value was dropped.
        assert_eq!(sio.rx_fifos[1].items(), (0..8).collect::<Vec<u32>>());
    }

    #[test]
    fn test_divider_is_banked_and_stalls() {
        let mut sio = sio();
        sio.write_u32(0, DIV_SDIVIDEND, (-7i32) as u32);
        sio.write_u32(0, DIV_SDIVISOR, 2);
        sio.write_u32(1, DIV_UDIVIDEND, 9);
        assert_eq!(sio.take_stall_cycles(0), 16);
        assert_eq!(sio.take_stall_cycles(0), 0);
        assert_eq!(sio.take_stall_cycles(1), 8);

        assert_eq!(sio.read_u32(0, DIV_CSR), 0b11);
        assert_eq!(sio.read_u32(0, DIV_QUOTIENT) as i32, -3);
        assert_eq!(sio.read_u32(0, DIV_REMAINDER) as i32, -1);
        assert_eq!(sio.read_u32(0, DIV_CSR), 0b01);
        assert_eq!(sio.read_u32(1, DIV_QUOTIENT), 9);
    }

    #[test]
    fn test_interpolator_registers_through_sio() {
        let mut sio = sio();
        // interp1 lane0: full mask; base0 = 10
        sio.write_u32(0, INTERP1_BASE + CTRL_LANE0, 31 << 10);
        sio.write_u32(0, INTERP1_BASE + BASE0, 10);
        sio.write_u32(0, INTERP1_BASE + ACCUM0, 5);
        assert_eq!(sio.read_u32(0, INTERP1_BASE + PEEK_LANE0), 15);
        assert_eq!(sio.read_u32(0, INTERP1_BASE + POP_LANE0), 15);
        assert_eq!(sio.read_u32(0, INTERP1_BASE + ACCUM0), 15);
        sio.write_u32(0, INTERP1_BASE + ACCUM0_ADD, 1);
        assert_eq!(sio.read_u32(0, INTERP1_BASE + ACCUM0), 16);
        // Core 1 has its own interpolators.
        assert_eq!(sio.read_u32(1, INTERP1_BASE + ACCUM0), 0);
        assert_eq!(sio.read_u32(0, INTERP0_BASE + ACCUM0), 0);
    }

    #[test]
    fn test_unknown_offset_warns() {
        let logger = Arc::new(RecordingLogger::new());
        let mut sio = Sio::new(logger.clone());
        assert_eq!(sio.read_u32(0, 0x200), 0xFFFF_FFFF);
        sio.write_u32(0, 0x200, 1);
        sio.write_u32(0, CPUID, 1);
        assert_eq!(logger.count(LogLevel::Warn), 3);
        assert_eq!(logger.records()[0].source, "SIO");
    }
}
