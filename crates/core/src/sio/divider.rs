// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use serde::Serialize;

/// Cycles a core is stalled by a division.
pub const DIVIDER_STALL_CYCLES: u32 = 8;

/// DIV_CSR: READY in bit 0, DIRTY in bit 1.
const CSR_READY_DIRTY: u32 = 0b11;
const CSR_DIRTY: u32 = 0b10;

/// Per-core hardware divider. Results are available immediately; the
/// eight cycle latency is charged to the issuing core as a stall.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HardwareDivider {
    pub dividend: u32,
    pub divisor: u32,
    pub quotient: u32,
    pub remainder: u32,
    pub csr: u32,
}

impl Default for HardwareDivider {
    fn default() -> Self {
        Self {
            dividend: 0,
            divisor: 1,
            quotient: 0,
            remainder: 0,
            csr: 0,
        }
    }
}

impl HardwareDivider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_dividend(&mut self, value: u32, signed: bool) {
        self.dividend = value;
        self.divide(signed);
    }

    pub fn set_divisor(&mut self, value: u32, signed: bool) {
        self.divisor = value;
        self.divide(signed);
    }

    pub fn set_quotient(&mut self, value: u32) {
        self.quotient = value;
        self.csr = CSR_READY_DIRTY;
    }

    pub fn set_remainder(&mut self, value: u32) {
        self.remainder = value;
        self.csr = CSR_READY_DIRTY;
    }

    /// Reading the quotient clears DIRTY.
    pub fn read_quotient(&mut self) -> u32 {
        self.csr &= !CSR_DIRTY;
        self.quotient
    }

    fn divide(&mut self, signed: bool) {
        if self.divisor == 0 {
            let positive = if signed {
                (self.dividend as i32) > 0
            } else {
                self.dividend > 0
            };
            self.quotient = if positive { u32::MAX } else { 1 };
            self.remainder = self.dividend;
        } else if signed {
            let dividend = self.dividend as i32;
            let divisor = self.divisor as i32;
            self.quotient = dividend.wrapping_div(divisor) as u32;
            self.remainder = dividend.wrapping_rem(divisor) as u32;
        } else {
            self.quotient = self.dividend / self.divisor;
            self.remainder = self.dividend % self.divisor;
        }
        self.csr = CSR_READY_DIRTY;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsigned_and_signed_division() {
        let mut div = HardwareDivider::new();
        div.set_dividend(100, false);
        div.set_divisor(7, false);
        assert_eq!(div.read_quotient(), 14);
        assert_eq!(div.remainder, 2);
        assert_eq!(div.csr, 0b01);

        div.set_dividend((-100i32) as u32, true);
        div.set_divisor(7, true);
        assert_eq!(div.quotient as i32, -14);
        assert_eq!(div.remainder as i32, -2);
        assert_eq!(div.csr, 0b11);
    }

    #[test]
    fn test_divide_by_zero() {
        let mut div = HardwareDivider::new();
        div.set_divisor(0, false);
        div.set_dividend(5, false);
        assert_eq!(div.quotient, 0xFFFF_FFFF);
        assert_eq!(div.remainder, 5);

        div.set_dividend((-5i32) as u32, true);
        assert_eq!(div.quotient, 1);
        assert_eq!(div.remainder as i32, -5);
    }

    #[test]
    fn test_signed_overflow_wraps() {
        let mut div = HardwareDivider::new();
        div.set_dividend(i32::MIN as u32, true);
        div.set_divisor(u32::MAX, true);
        assert_eq!(div.quotient, i32::MIN as u32);
        assert_eq!(div.remainder, 0);
    }
}
