// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! ARMv6-M Thumb decoder.
//!
//! 16-bit encodings are dispatched on the top four bits, then on the minimal
//! field that separates the forms sharing that prefix. Places where two forms
//! alias in the prefix are resolved explicitly and covered by tests:
//! `1101 111x` is UDF/SVC, never a conditional branch; `0100 0111` needs bits
//! [2:0] clear to be BX/BLX; the `1011 1111` hints only match exactly.

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Instruction {
    // Shift (immediate), add, subtract, move, compare
    LslImm {
        rd: u8,
        rm: u8,
        imm: u8,
    }, // LSLS Rd, Rm, #imm5
    LsrImm {
        rd: u8,
        rm: u8,
        imm: u8,
    }, // LSRS Rd, Rm, #imm5 (0 means 32)
    AsrImm {
        rd: u8,
        rm: u8,
        imm: u8,
    }, // ASRS Rd, Rm, #imm5 (0 means 32)
    AddReg {
        rd: u8,
        rn: u8,
        rm: u8,
    }, // ADDS Rd, Rn, Rm
    SubReg {
        rd: u8,
        rn: u8,
        rm: u8,
    }, // SUBS Rd, Rn, Rm
    AddImm3 {
        rd: u8,
        rn: u8,
        imm: u8,
    }, // ADDS Rd, Rn, #imm3
    SubImm3 {
        rd: u8,
        rn: u8,
        imm: u8,
    }, // SUBS Rd, Rn, #imm3
    MovImm {
        rd: u8,
        imm: u8,
    }, // MOVS Rd, #imm8
    CmpImm {
        rn: u8,
        imm: u8,
    }, // CMP Rn, #imm8
    AddImm8 {
        rd: u8,
        imm: u8,
    }, // ADDS Rdn, #imm8
    SubImm8 {
        rd: u8,
        imm: u8,
    }, // SUBS Rdn, #imm8

    // Data processing (register)
    And { rd: u8, rm: u8 },    // ANDS Rdn, Rm
    Eor { rd: u8, rm: u8 },    // EORS Rdn, Rm
    LslReg { rd: u8, rm: u8 }, // LSLS Rdn, Rm
    LsrReg { rd: u8, rm: u8 }, // LSRS Rdn, Rm
    AsrReg { rd: u8, rm: u8 }, // ASRS Rdn, Rm
    Adc { rd: u8, rm: u8 },    // ADCS Rdn, Rm
    Sbc { rd: u8, rm: u8 },    // SBCS Rdn, Rm
    Ror { rd: u8, rm: u8 },    // RORS Rdn, Rm
    Tst { rn: u8, rm: u8 },    // TST Rn, Rm
    Rsbs { rd: u8, rn: u8 },   // RSBS Rd, Rn, #0 (NEGS)
    CmpReg { rn: u8, rm: u8 }, // CMP Rn, Rm
    Cmn { rn: u8, rm: u8 },    // CMN Rn, Rm
    Orr { rd: u8, rm: u8 },    // ORRS Rdn, Rm
    Mul { rd: u8, rn: u8 },    // MULS Rdm, Rn, Rdm
    Bic { rd: u8, rm: u8 },    // BICS Rdn, Rm
    Mvn { rd: u8, rm: u8 },    // MVNS Rd, Rm

    // Special data processing and branch exchange (high registers)
    AddRegHigh { rd: u8, rm: u8 }, // ADD Rdn, Rm
    CmpRegHigh { rn: u8, rm: u8 }, // CMP Rn, Rm
    MovRegHigh { rd: u8, rm: u8 }, // MOV Rd, Rm
    Bx { rm: u8 },                 // BX Rm
    Blx { rm: u8 },                // BLX Rm

    // Loads and stores. Immediate offsets are already scaled to bytes.
    LdrLit { rt: u8, imm: u16 },        // LDR Rt, [PC, #imm]
    StrReg { rt: u8, rn: u8, rm: u8 },  // STR Rt, [Rn, Rm]
    StrhReg { rt: u8, rn: u8, rm: u8 }, // STRH Rt, [Rn, Rm]
    StrbReg { rt: u8, rn: u8, rm: u8 }, // STRB Rt, [Rn, Rm]
    Ldrsb { rt: u8, rn: u8, rm: u8 },   // LDRSB Rt, [Rn, Rm]
    LdrReg { rt: u8, rn: u8, rm: u8 },  // LDR Rt, [Rn, Rm]
    LdrhReg { rt: u8, rn: u8, rm: u8 }, // LDRH Rt, [Rn, Rm]
    LdrbReg { rt: u8, rn: u8, rm: u8 }, // LDRB Rt, [Rn, Rm]
    Ldrsh { rt: u8, rn: u8, rm: u8 },   // LDRSH Rt, [Rn, Rm]
    StrImm { rt: u8, rn: u8, imm: u8 }, // STR Rt, [Rn, #imm]
    LdrImm { rt: u8, rn: u8, imm: u8 }, // LDR Rt, [Rn, #imm]
    StrbImm { rt: u8, rn: u8, imm: u8 },
    LdrbImm { rt: u8, rn: u8, imm: u8 },
    StrhImm { rt: u8, rn: u8, imm: u8 },
    LdrhImm { rt: u8, rn: u8, imm: u8 },
    StrSp { rt: u8, imm: u16 }, // STR Rt, [SP, #imm]
    LdrSp { rt: u8, imm: u16 }, // LDR Rt, [SP, #imm]

    // PC/SP relative address generation
    Adr { rd: u8, imm: u16 },      // ADR Rd, <label>
    AddSpReg { rd: u8, imm: u16 }, // ADD Rd, SP, #imm
    AddSp { imm: u16 },            // ADD SP, SP, #imm
    SubSp { imm: u16 },            // SUB SP, SP, #imm

    // Miscellaneous
    Sxth { rd: u8, rm: u8 },
    Sxtb { rd: u8, rm: u8 },
    Uxth { rd: u8, rm: u8 },
    Uxtb { rd: u8, rm: u8 },
    Push { registers: u8, m: bool }, // PUSH {reglist, LR?}
    Pop { registers: u8, p: bool },  // POP {reglist, PC?}
    Cpsie,
    Cpsid,
    Rev { rd: u8, rm: u8 },
    Rev16 { rd: u8, rm: u8 },
    RevSh { rd: u8, rm: u8 },
    Bkpt { imm: u8 },
    Nop,
    Yield,
    Wfe,
    Wfi,
    Sev,

    // Multiple load/store
    Stm { rn: u8, registers: u8 }, // STMIA Rn!, {reglist}
    Ldm { rn: u8, registers: u8 }, // LDMIA Rn!, {reglist}

    // Branches, supervisor call, permanently undefined
    BranchCond { cond: u8, offset: i32 }, // B<cond> <label>
    Udf { imm: u8 },                      // UDF #imm8
    Svc { imm: u8 },                      // SVC #imm8
    Branch { offset: i32 },               // B <label>

    // 32-bit encodings
    Bl { offset: i32 },         // BL <label>
    Mrs { rd: u8, sysm: u8 },   // MRS Rd, <spec_reg>
    Msr { rn: u8, sysm: u8 },   // MSR <spec_reg>, Rn
    Dmb,
    Dsb,
    Isb,
    UdfWide { imm: u16 }, // UDF.W #imm16

    Unknown(u16),
    Unknown32(u16, u16),
}

impl Instruction {
    /// Size of the encoding in bytes. Unknown wide encodings are skipped as
    /// a single halfword.
    pub fn size(&self) -> u32 {
        match self {
            Instruction::Bl { .. }
            | Instruction::Mrs { .. }
            | Instruction::Msr { .. }
            | Instruction::Dmb
            | Instruction::Dsb
            | Instruction::Isb
            | Instruction::UdfWide { .. } => 4,
            _ => 2,
        }
    }
}

/// True if `h1` is the first halfword of a 32-bit encoding.
#[inline(always)]
pub fn is_wide(h1: u16) -> bool {
    h1 >> 12 == 0b1111 || h1 >> 11 == 0b11101
}

#[inline(always)]
fn low3(opcode: u16, shift: u32) -> u8 {
    ((opcode >> shift) & 0x7) as u8
}

fn sign_extend(value: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((value << shift) as i32) >> shift
}

pub fn decode_thumb_16(opcode: u16) -> Instruction {
    let rd = low3(opcode, 0);
    let rm = low3(opcode, 3);
    let imm5 = ((opcode >> 6) & 0x1F) as u8;
    let imm8 = (opcode & 0xFF) as u8;

    match opcode >> 12 {
        // 000x: shift by immediate, add/sub register or 3-bit immediate
        0b0000 | 0b0001 => match (opcode >> 11) & 0x3 {
            0 => Instruction::LslImm { rd, rm, imm: imm5 },
            1 => Instruction::LsrImm { rd, rm, imm: imm5 },
            2 => Instruction::AsrImm { rd, rm, imm: imm5 },
            _ => {
                let rn = rm;
                let third = low3(opcode, 6);
                match (opcode >> 9) & 0x3 {
                    0 => Instruction::AddReg { rd, rn, rm: third },
                    1 => Instruction::SubReg { rd, rn, rm: third },
                    2 => Instruction::AddImm3 { rd, rn, imm: third },
                    _ => Instruction::SubImm3 { rd, rn, imm: third },
                }
            }
        },

        // 001x: move/compare/add/subtract 8-bit immediate
        0b0010 | 0b0011 => {
            let rdn = low3(opcode, 8);
            match (opcode >> 11) & 0x3 {
                0 => Instruction::MovImm { rd: rdn, imm: imm8 },
                1 => Instruction::CmpImm { rn: rdn, imm: imm8 },
                2 => Instruction::AddImm8 { rd: rdn, imm: imm8 },
                _ => Instruction::SubImm8 { rd: rdn, imm: imm8 },
            }
        }

        0b0100 => {
            if opcode & 0x0800 != 0 {
                // 01001: LDR (literal)
                return Instruction::LdrLit {
                    rt: low3(opcode, 8),
                    imm: (imm8 as u16) << 2,
                };
            }
            if opcode & 0x0400 == 0 {
                // 010000: data processing
                return match (opcode >> 6) & 0xF {
                    0x0 => Instruction::And { rd, rm },
                    0x1 => Instruction::Eor { rd, rm },
                    0x2 => Instruction::LslReg { rd, rm },
                    0x3 => Instruction::LsrReg { rd, rm },
                    0x4 => Instruction::AsrReg { rd, rm },
                    0x5 => Instruction::Adc { rd, rm },
                    0x6 => Instruction::Sbc { rd, rm },
                    0x7 => Instruction::Ror { rd, rm },
                    0x8 => Instruction::Tst { rn: rd, rm },
                    0x9 => Instruction::Rsbs { rd, rn: rm },
                    0xA => Instruction::CmpReg { rn: rd, rm },
                    0xB => Instruction::Cmn { rn: rd, rm },
                    0xC => Instruction::Orr { rd, rm },
                    0xD => Instruction::Mul { rd, rn: rm },
                    0xE => Instruction::Bic { rd, rm },
                    _ => Instruction::Mvn { rd, rm },
                };
            }
            // 010001: special data processing, branch and exchange
            let rm4 = ((opcode >> 3) & 0xF) as u8;
            let rdn4 = (((opcode >> 4) & 0x8) as u8) | rd;
            match (opcode >> 8) & 0x3 {
                0 => Instruction::AddRegHigh { rd: rdn4, rm: rm4 },
                1 => Instruction::CmpRegHigh { rn: rdn4, rm: rm4 },
                2 => Instruction::MovRegHigh { rd: rdn4, rm: rm4 },
                _ if opcode & 0x7 != 0 => Instruction::Unknown(opcode),
                _ if opcode & 0x80 != 0 => Instruction::Blx { rm: rm4 },
                _ => Instruction::Bx { rm: rm4 },
            }
        }

        // 0101: load/store with register offset
        0b0101 => {
            let rt = rd;
            let rn = rm;
            let rm = low3(opcode, 6);
            match (opcode >> 9) & 0x7 {
                0 => Instruction::StrReg { rt, rn, rm },
                1 => Instruction::StrhReg { rt, rn, rm },
                2 => Instruction::StrbReg { rt, rn, rm },
                3 => Instruction::Ldrsb { rt, rn, rm },
                4 => Instruction::LdrReg { rt, rn, rm },
                5 => Instruction::LdrhReg { rt, rn, rm },
                6 => Instruction::LdrbReg { rt, rn, rm },
                _ => Instruction::Ldrsh { rt, rn, rm },
            }
        }

        // 011x: word/byte load/store with immediate offset
        0b0110 | 0b0111 => {
            let (rt, rn) = (rd, rm);
            match (opcode >> 11) & 0x3 {
                0 => Instruction::StrImm { rt, rn, imm: imm5 << 2 },
                1 => Instruction::LdrImm { rt, rn, imm: imm5 << 2 },
                2 => Instruction::StrbImm { rt, rn, imm: imm5 },
                _ => Instruction::LdrbImm { rt, rn, imm: imm5 },
            }
        }

        // 1000: halfword load/store with immediate offset
        0b1000 => {
            let (rt, rn) = (rd, rm);
            if opcode & 0x0800 == 0 {
                Instruction::StrhImm { rt, rn, imm: imm5 << 1 }
            } else {
                Instruction::LdrhImm { rt, rn, imm: imm5 << 1 }
            }
        }

        // 1001: SP-relative load/store
        0b1001 => {
            let rt = low3(opcode, 8);
            let imm = (imm8 as u16) << 2;
            if opcode & 0x0800 == 0 {
                Instruction::StrSp { rt, imm }
            } else {
                Instruction::LdrSp { rt, imm }
            }
        }

        // 1010: ADR / ADD Rd, SP, #imm
        0b1010 => {
            let rd = low3(opcode, 8);
            let imm = (imm8 as u16) << 2;
            if opcode & 0x0800 == 0 {
                Instruction::Adr { rd, imm }
            } else {
                Instruction::AddSpReg { rd, imm }
            }
        }

        0b1011 => decode_misc(opcode),

        // 1100: STM/LDM
        0b1100 => {
            let rn = low3(opcode, 8);
            if opcode & 0x0800 == 0 {
                Instruction::Stm { rn, registers: imm8 }
            } else {
                Instruction::Ldm { rn, registers: imm8 }
            }
        }

        // 1101: conditional branch; cond 1110 is UDF and 1111 is SVC
        0b1101 => match (opcode >> 8) & 0xF {
            0xE => Instruction::Udf { imm: imm8 },
            0xF => Instruction::Svc { imm: imm8 },
            cond => Instruction::BranchCond {
                cond: cond as u8,
                offset: sign_extend((imm8 as u32) << 1, 9),
            },
        },

        // 11100: unconditional branch; 11101 is a wide prefix
        0b1110 if opcode & 0x0800 == 0 => Instruction::Branch {
            offset: sign_extend(((opcode & 0x7FF) as u32) << 1, 12),
        },

        _ => Instruction::Unknown(opcode),
    }
}

/// `1011 xxxx`: stack adjust, extend, push/pop, CPS, reverse, hints.
fn decode_misc(opcode: u16) -> Instruction {
    let rd = low3(opcode, 0);
    let rm = low3(opcode, 3);
    let reglist = (opcode & 0xFF) as u8;

    match (opcode >> 8) & 0xF {
        0x0 => {
            let imm = (opcode & 0x7F) << 2;
            if opcode & 0x80 == 0 {
                Instruction::AddSp { imm }
            } else {
                Instruction::SubSp { imm }
            }
        }
        0x2 => match (opcode >> 6) & 0x3 {
            0 => Instruction::Sxth { rd, rm },
            1 => Instruction::Sxtb { rd, rm },
            2 => Instruction::Uxth { rd, rm },
            _ => Instruction::Uxtb { rd, rm },
        },
        0x4 | 0x5 => Instruction::Push {
            registers: reglist,
            m: opcode & 0x100 != 0,
        },
        0x6 => match opcode {
            0xB662 => Instruction::Cpsie,
            0xB672 => Instruction::Cpsid,
            _ => Instruction::Unknown(opcode),
        },
        0xA => match (opcode >> 6) & 0x3 {
            0 => Instruction::Rev { rd, rm },
            1 => Instruction::Rev16 { rd, rm },
            3 => Instruction::RevSh { rd, rm },
            _ => Instruction::Unknown(opcode),
        },
        0xC | 0xD => Instruction::Pop {
            registers: reglist,
            p: opcode & 0x100 != 0,
        },
        0xE => Instruction::Bkpt { imm: reglist },
        0xF => match opcode {
            0xBF00 => Instruction::Nop,
            0xBF10 => Instruction::Yield,
            0xBF20 => Instruction::Wfe,
            0xBF30 => Instruction::Wfi,
            0xBF40 => Instruction::Sev,
            _ => Instruction::Unknown(opcode),
        },
        _ => Instruction::Unknown(opcode),
    }
}

/// Decodes a 32-bit encoding whose first halfword satisfies [`is_wide`].
///
/// BL is recognised first and is told apart from the system forms by the
/// second halfword: BL has bits [15:14] = `11` and bit 12 set, MRS/MSR and
/// the barriers have `10` and UDF.W has `1010` in [15:12].
pub fn decode_thumb_32(h1: u16, h2: u16) -> Instruction {
    if h1 >> 11 == 0b11110 && h2 >> 14 == 0b11 && (h2 >> 12) & 0x1 == 1 {
        let s = ((h1 >> 10) & 0x1) as u32;
        let imm10 = (h1 & 0x3FF) as u32;
        let j1 = ((h2 >> 13) & 0x1) as u32;
        let j2 = ((h2 >> 11) & 0x1) as u32;
        let imm11 = (h2 & 0x7FF) as u32;
        let i1 = 1 - (s ^ j1);
        let i2 = 1 - (s ^ j2);
        let imm = (s << 24) | (i1 << 23) | (i2 << 22) | (imm10 << 12) | (imm11 << 1);
        return Instruction::Bl {
            offset: sign_extend(imm, 25),
        };
    }

    if h1 == 0xF3EF && h2 >> 12 == 0b1000 {
        return Instruction::Mrs {
            rd: ((h2 >> 8) & 0xF) as u8,
            sysm: (h2 & 0xFF) as u8,
        };
    }

    if h1 >> 4 == 0xF38 && h2 >> 8 == 0x88 {
        return Instruction::Msr {
            rn: (h1 & 0xF) as u8,
            sysm: (h2 & 0xFF) as u8,
        };
    }

    if h1 == 0xF3BF {
        match h2 & 0xFFF0 {
            0x8F50 => return Instruction::Dmb,
            0x8F40 => return Instruction::Dsb,
            0x8F60 => return Instruction::Isb,
            _ => {}
        }
    }

    if h1 >> 4 == 0xF7F && h2 >> 12 == 0b1010 {
        let imm4 = h1 & 0xF;
        let imm12 = h2 & 0xFFF;
        return Instruction::UdfWide {
            imm: (imm4 << 12) | imm12,
        };
    }

    Instruction::Unknown32(h1, h2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wide_prefixes() {
        assert!(is_wide(0xF000));
        assert!(is_wide(0xE800));
        assert!(!is_wide(0xE7FE));
        assert!(!is_wide(0xDF00));
    }

    #[test]
    fn test_conditional_branch_vs_udf_svc() {
        assert_eq!(decode_thumb_16(0xDE01), Instruction::Udf { imm: 1 });
        assert_eq!(decode_thumb_16(0xDF05), Instruction::Svc { imm: 5 });
        assert_eq!(
            decode_thumb_16(0xD1FE),
            Instruction::BranchCond {
                cond: 1,
                offset: -4
            }
        );
        assert_eq!(
            decode_thumb_16(0xE7F6),
            Instruction::Branch { offset: -20 }
        );
    }

    #[test]
    fn test_branch_exchange_requires_clear_low_bits() {
        assert_eq!(decode_thumb_16(0x4770), Instruction::Bx { rm: 14 });
        assert_eq!(decode_thumb_16(0x4788), Instruction::Blx { rm: 1 });
        assert_eq!(decode_thumb_16(0x4771), Instruction::Unknown(0x4771));
    }

    #[test]
    fn test_high_register_forms() {
        // ADD sp, r8 / MOV pc, lr / CMP r9, r0
        assert_eq!(
            decode_thumb_16(0x44C5),
            Instruction::AddRegHigh { rd: 13, rm: 8 }
        );
        assert_eq!(
            decode_thumb_16(0x46F7),
            Instruction::MovRegHigh { rd: 15, rm: 14 }
        );
        assert_eq!(
            decode_thumb_16(0x4581),
            Instruction::CmpRegHigh { rn: 9, rm: 0 }
        );
    }

    #[test]
    fn test_hints_match_exactly() {
        assert_eq!(decode_thumb_16(0xBF00), Instruction::Nop);
        assert_eq!(decode_thumb_16(0xBF10), Instruction::Yield);
        assert_eq!(decode_thumb_16(0xBF20), Instruction::Wfe);
        assert_eq!(decode_thumb_16(0xBF30), Instruction::Wfi);
        assert_eq!(decode_thumb_16(0xBF40), Instruction::Sev);
        assert_eq!(decode_thumb_16(0xBF50), Instruction::Unknown(0xBF50));
        assert_eq!(decode_thumb_16(0xB662), Instruction::Cpsie);
        assert_eq!(decode_thumb_16(0xB672), Instruction::Cpsid);
        assert_eq!(decode_thumb_16(0xB663), Instruction::Unknown(0xB663));
    }

    #[test]
    fn test_push_pop_and_stack_adjust() {
        assert_eq!(
            decode_thumb_16(0xB570),
            Instruction::Push {
                registers: 0x70,
                m: true
            }
        );
        assert_eq!(
            decode_thumb_16(0xBD70),
            Instruction::Pop {
                registers: 0x70,
                p: true
            }
        );
        assert_eq!(decode_thumb_16(0xB082), Instruction::SubSp { imm: 8 });
        assert_eq!(decode_thumb_16(0xB002), Instruction::AddSp { imm: 8 });
        assert_eq!(decode_thumb_16(0xBA80), Instruction::Unknown(0xBA80));
    }

    #[test]
    fn test_load_store_offsets_are_scaled() {
        assert_eq!(
            decode_thumb_16(0x6848),
            Instruction::LdrImm {
                rt: 0,
                rn: 1,
                imm: 4
            }
        );
        assert_eq!(
            decode_thumb_16(0x8848),
            Instruction::LdrhImm {
                rt: 0,
                rn: 1,
                imm: 2
            }
        );
        assert_eq!(decode_thumb_16(0x4A01), Instruction::LdrLit { rt: 2, imm: 4 });
        assert_eq!(decode_thumb_16(0x9902), Instruction::LdrSp { rt: 1, imm: 8 });
        assert_eq!(
            decode_thumb_16(0x5C8B),
            Instruction::LdrbReg {
                rt: 3,
                rn: 1,
                rm: 2
            }
        );
    }

    #[test]
    fn test_data_processing_table() {
        assert_eq!(decode_thumb_16(0x4165), Instruction::Adc { rd: 5, rm: 4 });
        assert_eq!(decode_thumb_16(0x4248), Instruction::Rsbs { rd: 0, rn: 1 });
        assert_eq!(decode_thumb_16(0x4348), Instruction::Mul { rd: 0, rn: 1 });
        assert_eq!(decode_thumb_16(0x43C8), Instruction::Mvn { rd: 0, rm: 1 });
    }

    #[test]
    fn test_bl_offsets() {
        assert_eq!(decode_thumb_32(0xF000, 0xF800), Instruction::Bl { offset: 0 });
        assert_eq!(decode_thumb_32(0xF7FF, 0xFFFE), Instruction::Bl { offset: -4 });
        assert_eq!(
            decode_thumb_32(0xF000, 0xF802),
            Instruction::Bl { offset: 4 }
        );
    }

    #[test]
    fn test_system_wide_forms() {
        assert_eq!(
            decode_thumb_32(0xF3EF, 0x8010),
            Instruction::Mrs { rd: 0, sysm: 16 }
        );
        assert_eq!(
            decode_thumb_32(0xF381, 0x8808),
            Instruction::Msr { rn: 1, sysm: 8 }
        );
        assert_eq!(decode_thumb_32(0xF3BF, 0x8F5F), Instruction::Dmb);
        assert_eq!(decode_thumb_32(0xF3BF, 0x8F4F), Instruction::Dsb);
        assert_eq!(decode_thumb_32(0xF3BF, 0x8F6F), Instruction::Isb);
        assert_eq!(
            decode_thumb_32(0xF7F1, 0xA234),
            Instruction::UdfWide { imm: 0x1234 }
        );
        assert_eq!(
            decode_thumb_32(0xF3BF, 0x8F70),
            Instruction::Unknown32(0xF3BF, 0x8F70)
        );
        assert_eq!(Instruction::Dmb.size(), 4);
        assert_eq!(Instruction::Unknown32(0, 0).size(), 2);
    }
}
