// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use serde::Serialize;

/// Decoded INTERPn_CTRL_LANEx register.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct LaneCtrl {
    shift: u32,
    mask_lsb: u32,
    mask_msb: u32,
    signed: bool,
    cross_input: bool,
    cross_result: bool,
    add_raw: bool,
    force_msb: u32,
    blend: bool,
    clamp: bool,
    overf0: bool,
    overf1: bool,
    overf: bool,
}

impl LaneCtrl {
    fn from_bits(value: u32) -> Self {
        let bit = |n: u32| (value >> n) & 1 != 0;
        Self {
            shift: value & 0x1F,
            mask_lsb: (value >> 5) & 0x1F,
            mask_msb: (value >> 10) & 0x1F,
            signed: bit(15),
            cross_input: bit(16),
            cross_result: bit(17),
            add_raw: bit(18),
            force_msb: (value >> 19) & 0b11,
            blend: bit(21),
            clamp: bit(22),
            overf0: bit(23),
            overf1: bit(24),
            overf: bit(25),
        }
    }

    fn bits(&self) -> u32 {
        self.shift
            | (self.mask_lsb << 5)
            | (self.mask_msb << 10)
            | ((self.signed as u32) << 15)
            | ((self.cross_input as u32) << 16)
            | ((self.cross_result as u32) << 17)
            | ((self.add_raw as u32) << 18)
            | (self.force_msb << 19)
            | ((self.blend as u32) << 21)
            | ((self.clamp as u32) << 22)
            | ((self.overf0 as u32) << 23)
            | ((self.overf1 as u32) << 24)
            | ((self.overf as u32) << 25)
    }
}

/// One SIO interpolator. Interpolator 0 supports blend mode, interpolator 1
/// clamp mode; everything else is shared.
#[derive(Debug, Clone, Serialize)]
pub struct Interpolator {
    index: u8,
    pub accum0: u32,
    pub accum1: u32,
    pub base0: u32,
    pub base1: u32,
    pub base2: u32,
    pub ctrl0: u32,
    pub ctrl1: u32,
    pub result0: u32,
    pub result1: u32,
    pub result2: u32,
    pub smresult0: u32,
    pub smresult1: u32,
}

impl Interpolator {
    pub fn new(index: u8) -> Self {
        let mut interp = Self {
            index,
            accum0: 0,
            accum1: 0,
            base0: 0,
            base1: 0,
            base2: 0,
            ctrl0: 0,
            ctrl1: 0,
            result0: 0,
            result1: 0,
            result2: 0,
            smresult0: 0,
            smresult1: 0,
        };
        interp.update();
        interp
    }

    /// Recomputes the lane results from the current register values.
    pub fn update(&mut self) {
        let mut ctrl0 = LaneCtrl::from_bits(self.ctrl0);
        let mut ctrl1 = LaneCtrl::from_bits(self.ctrl1);

        let do_clamp = ctrl0.clamp && self.index == 1;
        let do_blend = ctrl0.blend && self.index == 0;

        ctrl0.clamp = do_clamp;
        ctrl0.blend = do_blend;
        ctrl1.clamp = false;
        ctrl1.blend = false;
        ctrl1.overf0 = false;
        ctrl1.overf1 = false;
        ctrl1.overf = false;

        let input0 = if ctrl0.cross_input { self.accum1 } else { self.accum0 };
        let input1 = if ctrl1.cross_input { self.accum0 } else { self.accum1 };

        let msbmask0 = msb_mask(ctrl0.mask_msb);
        let msbmask1 = msb_mask(ctrl1.mask_msb);
        let mask0 = msbmask0 & !lsb_mask(ctrl0.mask_lsb);
        let mask1 = msbmask1 & !lsb_mask(ctrl1.mask_lsb);

        let shifted0 = input0 >> ctrl0.shift;
        let shifted1 = input1 >> ctrl1.shift;
        let uresult0 = shifted0 & mask0;
        let uresult1 = shifted1 & mask1;

        let overf0 = shifted0 & !msbmask0 != 0;
        let overf1 = shifted1 & !msbmask1 != 0;

        let result0 = if ctrl0.signed {
            sign_extend(uresult0, ctrl0.mask_msb)
        } else {
            uresult0
        };
        let result1 = if ctrl1.signed {
            sign_extend(uresult1, ctrl1.mask_msb)
        } else {
            uresult1
        };

        let addresult0 = self
            .base0
            .wrapping_add(if ctrl0.add_raw { input0 } else { result0 });
        let addresult1 = self
            .base1
            .wrapping_add(if ctrl1.add_raw { input1 } else { result1 });
        let addresult2 = self
            .base2
            .wrapping_add(result0)
            .wrapping_add(if do_blend { 0 } else { result1 });

        let clamp0 = if ctrl0.signed {
            let r = result0 as i32;
            if r < self.base0 as i32 {
                self.base0
            } else if r > self.base1 as i32 {
                self.base1
            } else {
                result0
            }
        } else if result0 < self.base0 {
            self.base0
        } else if result0 > self.base1 {
            self.base1
        } else {
            result0
        };

        let alpha1 = result1 & 0xFF;
        let blend1 = if ctrl1.signed {
            lerp(self.base0 as i32 as i64, self.base1 as i32 as i64, alpha1)
        } else {
            lerp(self.base0 as i64, self.base1 as i64, alpha1)
        };

        let force_msb = ctrl0.force_msb << 28;
        self.smresult0 = result0;
        self.smresult1 = result1;
        self.result0 = if do_blend {
            alpha1
        } else {
            (if do_clamp { clamp0 } else { addresult0 }) | force_msb
        };
        self.result1 = (if do_blend { blend1 } else { addresult1 }) | force_msb;
        self.result2 = addresult2;

        ctrl0.overf0 = overf0;
        ctrl0.overf1 = overf1;
        ctrl0.overf = overf0 || overf1;
        self.ctrl0 = ctrl0.bits();
        self.ctrl1 = ctrl1.bits();
    }

    /// POP side effect: lane results are written back into the accumulators.
    pub fn writeback(&mut self) {
        let ctrl0 = LaneCtrl::from_bits(self.ctrl0);
        let ctrl1 = LaneCtrl::from_bits(self.ctrl1);
        self.accum0 = if ctrl0.cross_result { self.result1 } else { self.result0 };
        self.accum1 = if ctrl1.cross_result { self.result0 } else { self.result1 };
        self.update();
    }

    /// BASE_1AND0: low half to BASE0, high half to BASE1, each sign
    /// extended when its lane is signed.
    pub fn set_base01(&mut self, value: u32) {
        let ctrl0 = LaneCtrl::from_bits(self.ctrl0);
        let ctrl1 = LaneCtrl::from_bits(self.ctrl1);
        let do_blend = ctrl0.blend && self.index == 0;

        let input0 = value & 0xFFFF;
        let input1 = value >> 16;
        let signed0 = if do_blend { ctrl1.signed } else { ctrl0.signed };

        self.base0 = if signed0 { sign_extend(input0, 15) } else { input0 };
        self.base1 = if ctrl1.signed { sign_extend(input1, 15) } else { input1 };
        self.update();
    }

    pub fn add_accum0(&mut self, value: u32) {
        self.accum0 = self.accum0.wrapping_add(value);
        self.update();
    }

    pub fn add_accum1(&mut self, value: u32) {
        self.accum1 = self.accum1.wrapping_add(value);
        self.update();
    }
}

fn msb_mask(msb: u32) -> u32 {
    if msb >= 31 {
        u32::MAX
    } else {
        (1 << (msb + 1)) - 1
    }
}

fn lsb_mask(lsb: u32) -> u32 {
    (1u32 << lsb) - 1
}

fn sign_extend(value: u32, msb: u32) -> u32 {
    if value & (1 << msb) != 0 {
        value | (u32::MAX << msb)
    } else {
        value
    }
}

/// `base0 + floor(alpha * (base1 - base0) / 256)`, modulo 2^32.
fn lerp(base0: i64, base1: i64, alpha: u32) -> u32 {
    let step = (alpha as i64 * (base1 - base0)).div_euclid(256);
    (base0 + step) as u32
}
