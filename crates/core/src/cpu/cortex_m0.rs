// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::exceptions::{
    InterruptController, EXC_RETURN_HANDLER, EXC_RETURN_THREAD_MSP, EXC_RETURN_THREAD_PSP,
    EXC_SVCALL, EXC_SYSTICK, LOWEST_PRIORITY,
};
use super::registers::{ExecutionMode, RegisterFile, StackSelect, REG_PC, REG_SP};
use crate::decoder::{decode_thumb_16, decode_thumb_32, is_wide, Instruction};
use crate::logging::SharedLogger;
use crate::peripherals::systick::Systick;
use crate::{Bus, SimResult, SimulationError};

pub(crate) const SOURCE: &str = "CortexM0Core";

/// Base of the System Control Space served by each core itself.
pub const PPB_BASE: u32 = 0xE000_E000;
const SIO_BASE: u32 = 0xD000_0000;
const APB_BASE: u32 = 0x4000_0000;

// MRS/MSR SYSm encodings
const SYSM_APSR: u8 = 0;
const SYSM_XPSR: u8 = 3;
const SYSM_IPSR: u8 = 5;
const SYSM_MSP: u8 = 8;
const SYSM_PSP: u8 = 9;
const SYSM_PRIMASK: u8 = 16;
const SYSM_CONTROL: u8 = 20;

// Debugger register numbering beyond r0..r15
pub const DEBUG_REG_XPSR: u8 = 16;
pub const DEBUG_REG_MSP: u8 = 17;
pub const DEBUG_REG_PSP: u8 = 18;
pub const DEBUG_REG_PRIMASK: u8 = 19;
pub const DEBUG_REG_CONTROL: u8 = 20;

/// A BL or BLX that was just taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchLink {
    pub target: u32,
    pub blx: bool,
}

/// Side effects of one `step` that the owner of the core has to act on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepOutcome {
    pub cycles: u32,
    /// Immediate of an executed BKPT or UDF.
    pub break_code: Option<u32>,
    /// SEV was executed.
    pub sev: bool,
    pub branch_link: Option<BranchLink>,
}

/// Shift flavours sharing the carry-out rules of the data processing forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shift {
    Lsl,
    Lsr,
    Asr,
    Ror,
}

/// One ARMv6-M (Cortex-M0+) core: registers, NVIC/SCB state, SysTick and
/// the Thumb executor.
pub struct CortexM0 {
    id: usize,
    pub regs: RegisterFile,
    pub nvic: InterruptController,
    pub systick: Systick,
    pub cycles: u64,
    /// Sleeping in WFI/WFE; the owner must not call `step` until it clears.
    pub waiting: bool,
    /// The current sleep was entered through WFE and ends on an event.
    pub wait_for_event: bool,
    pub event_registered: bool,
    /// Bytes the PC has to be moved back to re-execute the last BKPT/UDF.
    pub break_rewind: u32,
    logger: SharedLogger,
}

impl std::fmt::Debug for CortexM0 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CortexM0")
            .field("id", &self.id)
            .field("regs", &self.regs)
            .field("nvic", &self.nvic)
            .field("cycles", &self.cycles)
            .field("waiting", &self.waiting)
            .finish()
    }
}

impl CortexM0 {
    pub fn new(id: usize, logger: SharedLogger) -> Self {
        Self {
            id,
            regs: RegisterFile::new(),
            nvic: InterruptController::new(),
            systick: Systick::new(),
            cycles: 0,
            waiting: false,
            wait_for_event: false,
            event_registered: false,
            break_rewind: 0,
            logger,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn logger(&self) -> &SharedLogger {
        &self.logger
    }

    pub fn pc(&self) -> u32 {
        self.regs.pc()
    }

    /// Power-on reset: clears all state and loads SP/PC from the boot ROM
    /// vector table at address 0.
    pub fn reset<B: Bus + ?Sized>(&mut self, bus: &mut B) {
        self.reset_with_vector_table(bus, 0);
    }

    /// Like [`reset`](Self::reset) but with VTOR pointing at `vtor`.
    pub fn reset_with_vector_table<B: Bus + ?Sized>(&mut self, bus: &mut B, vtor: u32) {
        *self = Self::new(self.id, self.logger.clone());
        self.nvic.vtor = vtor;
        let sp = self.read32(bus, vtor);
        let pc = self.read32(bus, vtor.wrapping_add(4));
        self.regs.set_sp(sp);
        self.regs.set_pc(pc & !1);
    }

    /// Applies an IRQ line level. A new pending edge can wake a sleeping
    /// core and take the interrupt right away.
    pub fn set_interrupt<B: Bus + ?Sized>(&mut self, bus: &mut B, irq: u32, high: bool) {
        if self.nvic.set_interrupt(irq, high) && self.waiting && self.check_for_interrupts(bus) {
            self.wake();
        }
    }

    /// Event from SEV on the other core.
    pub fn signal_event(&mut self) {
        if self.waiting && self.wait_for_event {
            self.wake();
        } else {
            self.event_registered = true;
        }
    }

    fn wake(&mut self) {
        self.waiting = false;
        self.wait_for_event = false;
    }

    /// Lets `cycles` pass without fetching, as for a sleeping core.
    pub fn advance_idle<B: Bus + ?Sized>(&mut self, bus: &mut B, cycles: u64) {
        self.cycles += cycles;
        self.tick_systick(bus, cycles);
    }

    fn tick_systick<B: Bus + ?Sized>(&mut self, bus: &mut B, cycles: u64) {
        if self.systick.advance(cycles) {
            self.nvic.pend_exception(EXC_SYSTICK);
            if self.waiting && self.check_for_interrupts(bus) {
                self.wake();
            }
        }
    }

    /// Takes the highest priority exception able to preempt the current
    /// execution priority, if any.
    pub fn check_for_interrupts<B: Bus + ?Sized>(&mut self, bus: &mut B) -> bool {
        let active_priority = self.nvic.exception_priority(self.regs.ipsr);
        let current_priority = if self.waiting {
            if self.regs.primask {
                active_priority
            } else {
                LOWEST_PRIORITY
            }
        } else {
            let mask = if self.regs.primask { 0 } else { LOWEST_PRIORITY };
            active_priority.min(mask)
        };

        match self.nvic.select(current_priority) {
            Some(exception) => {
                self.exception_entry(bus, exception);
                true
            }
            None => false,
        }
    }

    fn exception_entry<B: Bus + ?Sized>(&mut self, bus: &mut B, exception: u32) {
        let use_psp =
            self.regs.spsel() == StackSelect::Process && self.regs.mode == ExecutionMode::Thread;
        let sp = if use_psp { self.regs.psp() } else { self.regs.msp() };
        let align = (sp >> 2) & 1;
        let frame = sp.wrapping_sub(0x20) & !0b100;
        if use_psp {
            self.regs.set_psp(frame);
        } else {
            self.regs.set_msp(frame);
        }

        let stacked = [
            self.regs.get(0),
            self.regs.get(1),
            self.regs.get(2),
            self.regs.get(3),
            self.regs.get(12),
            self.regs.lr(),
            self.regs.pc() & !1,
            (self.regs.xpsr() & !(1 << 9)) | (align << 9),
        ];
        for (i, value) in stacked.iter().enumerate() {
            self.write32(bus, frame.wrapping_add(4 * i as u32), *value);
        }

        let exc_return = match (self.regs.mode, self.regs.spsel()) {
            (ExecutionMode::Handler, _) => EXC_RETURN_HANDLER,
            (ExecutionMode::Thread, StackSelect::Main) => EXC_RETURN_THREAD_MSP,
            (ExecutionMode::Thread, StackSelect::Process) => EXC_RETURN_THREAD_PSP,
        };
        self.regs.set_lr(exc_return);

        self.regs.mode = ExecutionMode::Handler;
        self.regs.ipsr = exception;
        self.regs.switch_stack(StackSelect::Main);
        self.event_registered = true;

        let vector = self.nvic.vtor.wrapping_add(4 * exception);
        let handler = self.read32(bus, vector);
        self.regs.set_pc(handler & !1);
    }

    fn exception_return<B: Bus + ?Sized>(&mut self, bus: &mut B, exc_return: u32) {
        let kind = exc_return & 0xF;
        let mut frame = self.regs.msp();
        match kind {
            0b0001 => {
                self.regs.mode = ExecutionMode::Handler;
                self.regs.switch_stack(StackSelect::Main);
            }
            0b1001 => {
                self.regs.mode = ExecutionMode::Thread;
                self.regs.switch_stack(StackSelect::Main);
            }
            0b1101 => {
                frame = self.regs.psp();
                self.regs.mode = ExecutionMode::Thread;
                self.regs.switch_stack(StackSelect::Process);
            }
            _ => {
                self.logger.warn(
                    SOURCE,
                    format_args!("Unsupported EXC_RETURN value {:#x}", exc_return),
                );
            }
        }

        for reg in 0..4u8 {
            let value = self.read32(bus, frame.wrapping_add(4 * reg as u32));
            self.regs.set(reg, value);
        }
        let r12 = self.read32(bus, frame.wrapping_add(0x10));
        self.regs.set(12, r12);
        let lr = self.read32(bus, frame.wrapping_add(0x14));
        self.regs.set_lr(lr);
        let pc = self.read32(bus, frame.wrapping_add(0x18));
        self.regs.set_pc(pc & !1);
        let psr = self.read32(bus, frame.wrapping_add(0x1C));

        let align = if psr & (1 << 9) != 0 { 0b100 } else { 0 };
        match kind {
            0b0001 | 0b1001 => self.regs.set_msp(frame.wrapping_add(0x20) | align),
            0b1101 => self.regs.set_psp(frame.wrapping_add(0x20) | align),
            _ => {}
        }

        self.regs.set_apsr(psr & 0xF000_0000);
        let force_thread = self.regs.mode == ExecutionMode::Thread && self.regs.npriv;
        self.regs.ipsr = if force_thread { 0 } else { psr & 0x3F };
        self.nvic.dirty = true;
        self.event_registered = true;
    }

    /// Branch with interworking; EXC_RETURN values in Handler mode return
    /// from the active exception.
    fn bx_write_pc<B: Bus + ?Sized>(&mut self, bus: &mut B, addr: u32) {
        if self.regs.mode == ExecutionMode::Handler && addr >> 28 == 0xF {
            self.exception_return(bus, addr & 0x0FFF_FFFF);
        } else {
            self.regs.set_pc(addr & !1);
        }
    }

    fn read_special(&self, sysm: u8) -> u32 {
        match sysm {
            SYSM_APSR => self.regs.apsr(),
            SYSM_XPSR => self.regs.xpsr(),
            SYSM_IPSR => self.regs.ipsr,
            SYSM_PRIMASK => self.regs.primask as u32,
            SYSM_MSP => self.regs.msp(),
            SYSM_PSP => self.regs.psp(),
            SYSM_CONTROL => self.regs.control(),
            _ => {
                self.logger.warn(
                    SOURCE,
                    format_args!("MRS with unimplemented SYSm value: {}", sysm),
                );
                0
            }
        }
    }

    fn write_special(&mut self, sysm: u8, value: u32) {
        match sysm {
            SYSM_APSR => self.regs.set_apsr(value),
            SYSM_XPSR => self.regs.set_xpsr(value),
            SYSM_IPSR => self.regs.ipsr = value & 0x3F,
            SYSM_PRIMASK => {
                self.regs.primask = value & 1 != 0;
                self.nvic.dirty = true;
            }
            SYSM_MSP => self.regs.set_msp(value),
            SYSM_PSP => self.regs.set_psp(value),
            SYSM_CONTROL => {
                self.regs.npriv = value & 1 != 0;
                if self.regs.mode == ExecutionMode::Thread {
                    let select = if value & 2 != 0 {
                        StackSelect::Process
                    } else {
                        StackSelect::Main
                    };
                    self.regs.switch_stack(select);
                }
            }
            _ => {
                self.logger.warn(
                    SOURCE,
                    format_args!("MSR with unimplemented SYSm value: {}", sysm),
                );
            }
        }
    }

    /// Register access for debuggers: r0-r15, then xPSR, MSP, PSP, PRIMASK
    /// and CONTROL.
    pub fn read_debug_reg(&self, id: u8) -> SimResult<u32> {
        match id {
            0..=15 => Ok(self.regs.get(id)),
            DEBUG_REG_XPSR => Ok(self.regs.xpsr()),
            DEBUG_REG_MSP => Ok(self.regs.msp()),
            DEBUG_REG_PSP => Ok(self.regs.psp()),
            DEBUG_REG_PRIMASK => Ok(self.regs.primask as u32),
            DEBUG_REG_CONTROL => Ok(self.regs.control()),
            _ => Err(SimulationError::InvalidRegister(id)),
        }
    }

    pub fn write_debug_reg(&mut self, id: u8, value: u32) -> SimResult<()> {
        match id {
            REG_PC => self.regs.set_pc(value & !1),
            0..=14 => self.regs.set(id, value),
            DEBUG_REG_XPSR => self.regs.set_xpsr(value),
            DEBUG_REG_MSP => self.regs.set_msp(value),
            DEBUG_REG_PSP => self.regs.set_psp(value),
            DEBUG_REG_PRIMASK => self.write_special(SYSM_PRIMASK, value),
            DEBUG_REG_CONTROL => self.write_special(SYSM_CONTROL, value),
            _ => return Err(SimulationError::InvalidRegister(id)),
        }
        Ok(())
    }

    // Memory access: the PPB window is local to the core, everything else
    // goes to the bus it is given.

    pub(crate) fn read32<B: Bus + ?Sized>(&mut self, bus: &mut B, addr: u32) -> u32 {
        if is_ppb(addr) {
            self.ppb_read(addr.wrapping_sub(PPB_BASE) & !3)
        } else {
            bus.read_u32(addr)
        }
    }

    fn read16<B: Bus + ?Sized>(&mut self, bus: &mut B, addr: u32) -> u16 {
        if is_ppb(addr) {
            let word = self.ppb_read(addr.wrapping_sub(PPB_BASE) & !3);
            (word >> ((addr & 2) * 8)) as u16
        } else {
            bus.read_u16(addr)
        }
    }

    pub(crate) fn read8<B: Bus + ?Sized>(&mut self, bus: &mut B, addr: u32) -> u8 {
        if is_ppb(addr) {
            let word = self.ppb_read(addr.wrapping_sub(PPB_BASE) & !3);
            (word >> ((addr & 3) * 8)) as u8
        } else {
            bus.read_u8(addr)
        }
    }

    pub(crate) fn write32<B: Bus + ?Sized>(&mut self, bus: &mut B, addr: u32, value: u32) {
        if is_ppb(addr) {
            self.ppb_write(addr.wrapping_sub(PPB_BASE) & !3, value);
        } else {
            bus.write_u32(addr, value);
        }
    }

    fn write16<B: Bus + ?Sized>(&mut self, bus: &mut B, addr: u32, value: u16) {
        if is_ppb(addr) {
            self.ppb_write_partial(addr, value as u32, 0xFFFF, addr & 2);
        } else {
            bus.write_u16(addr, value);
        }
    }

    pub(crate) fn write8<B: Bus + ?Sized>(&mut self, bus: &mut B, addr: u32, value: u8) {
        if is_ppb(addr) {
            self.ppb_write_partial(addr, value as u32, 0xFF, addr & 3);
        } else {
            bus.write_u8(addr, value);
        }
    }

    fn ppb_write_partial(&mut self, addr: u32, value: u32, mask: u32, byte: u32) {
        let offset = addr.wrapping_sub(PPB_BASE) & !3;
        let shift = byte * 8;
        let current = self.ppb_read(offset);
        let merged = (current & !(mask << shift)) | ((value & mask) << shift);
        self.ppb_write(offset, merged);
    }

    /// Reads PC as an operand: the address of the current instruction + 4.
    #[inline(always)]
    fn operand(&self, n: u8) -> u32 {
        if n == REG_PC {
            self.regs.pc().wrapping_add(2)
        } else {
            self.regs.get(n)
        }
    }

    fn update_nz(&mut self, result: u32) {
        self.regs.flags.set_nz(result);
    }

    fn update_nzcv(&mut self, result: u32, carry: bool, overflow: bool) {
        self.regs.flags.set_nz(result);
        self.regs.flags.c = carry;
        self.regs.flags.v = overflow;
    }

    fn shift_update_flags(&mut self, kind: Shift, value: u32, amount: u32) -> u32 {
        let (result, carry) = shift_with_carry(kind, value, amount, self.regs.flags.c);
        self.regs.flags.set_nz(result);
        self.regs.flags.c = carry;
        result
    }

    fn check_condition(&self, cond: u8) -> bool {
        let f = self.regs.flags;
        match cond {
            0x0 => f.z,                     // EQ
            0x1 => !f.z,                    // NE
            0x2 => f.c,                     // CS/HS
            0x3 => !f.c,                    // CC/LO
            0x4 => f.n,                     // MI
            0x5 => !f.n,                    // PL
            0x6 => f.v,                     // VS
            0x7 => !f.v,                    // VC
            0x8 => f.c && !f.z,             // HI
            0x9 => !f.c || f.z,             // LS
            0xA => f.n == f.v,              // GE
            0xB => f.n != f.v,              // LT
            0xC => !f.z && (f.n == f.v),    // GT
            0xD => f.z || (f.n != f.v),     // LE
            _ => true,                      // AL
        }
    }

    /// Executes one instruction, taking a pending exception first if one
    /// can preempt. Returns the cycles spent and the side effects the
    /// owner has to handle.
    pub fn step<B: Bus + ?Sized>(&mut self, bus: &mut B) -> StepOutcome {
        if self.nvic.dirty && self.check_for_interrupts(bus) {
            self.wake();
        }

        let opcode_pc = self.regs.pc() & !1;
        let opcode = self.read16(bus, opcode_pc);
        let instruction = if is_wide(opcode) {
            let opcode2 = self.read16(bus, opcode_pc.wrapping_add(2));
            decode_thumb_32(opcode, opcode2)
        } else {
            decode_thumb_16(opcode)
        };
        self.regs.set_pc(opcode_pc.wrapping_add(2));

        let mut outcome = StepOutcome::default();
        let mut cycles = self.execute(bus, instruction, opcode_pc, &mut outcome);
        cycles += bus.take_stall_cycles();

        self.cycles += cycles as u64;
        self.tick_systick(bus, cycles as u64);
        outcome.cycles = cycles;
        outcome
    }

    fn execute<B: Bus + ?Sized>(
        &mut self,
        bus: &mut B,
        instruction: Instruction,
        opcode_pc: u32,
        outcome: &mut StepOutcome,
    ) -> u32 {
        let mut cycles = 1;
        let pc = self.regs.pc();

        match instruction {
            // Shifts by immediate
            Instruction::LslImm { rd, rm, imm } => {
                let result = self.shift_update_flags(Shift::Lsl, self.regs.get(rm), imm as u32);
                self.regs.set(rd, result);
            }
            Instruction::LsrImm { rd, rm, imm } => {
                let amount = if imm == 0 { 32 } else { imm as u32 };
                let result = self.shift_update_flags(Shift::Lsr, self.regs.get(rm), amount);
                self.regs.set(rd, result);
            }
            Instruction::AsrImm { rd, rm, imm } => {
                let amount = if imm == 0 { 32 } else { imm as u32 };
                let result = self.shift_update_flags(Shift::Asr, self.regs.get(rm), amount);
                self.regs.set(rd, result);
            }

            // Add / subtract
            Instruction::AddReg { rd, rn, rm } => {
                let (res, c, v) = add_with_flags(self.regs.get(rn), self.regs.get(rm));
                self.update_nzcv(res, c, v);
                self.regs.set(rd, res);
            }
            Instruction::SubReg { rd, rn, rm } => {
                let (res, c, v) = sub_with_flags(self.regs.get(rn), self.regs.get(rm));
                self.update_nzcv(res, c, v);
                self.regs.set(rd, res);
            }
            Instruction::AddImm3 { rd, rn, imm } => {
                let (res, c, v) = add_with_flags(self.regs.get(rn), imm as u32);
                self.update_nzcv(res, c, v);
                self.regs.set(rd, res);
            }
            Instruction::SubImm3 { rd, rn, imm } => {
                let (res, c, v) = sub_with_flags(self.regs.get(rn), imm as u32);
                self.update_nzcv(res, c, v);
                self.regs.set(rd, res);
            }
            Instruction::MovImm { rd, imm } => {
                self.update_nz(imm as u32);
                self.regs.set(rd, imm as u32);
            }
            Instruction::CmpImm { rn, imm } => {
                let (res, c, v) = sub_with_flags(self.regs.get(rn), imm as u32);
                self.update_nzcv(res, c, v);
            }
            Instruction::AddImm8 { rd, imm } => {
                let (res, c, v) = add_with_flags(self.regs.get(rd), imm as u32);
                self.update_nzcv(res, c, v);
                self.regs.set(rd, res);
            }
            Instruction::SubImm8 { rd, imm } => {
                let (res, c, v) = sub_with_flags(self.regs.get(rd), imm as u32);
                self.update_nzcv(res, c, v);
                self.regs.set(rd, res);
            }

            // Data processing
            Instruction::And { rd, rm } => {
                let res = self.regs.get(rd) & self.regs.get(rm);
                self.update_nz(res);
                self.regs.set(rd, res);
            }
            Instruction::Eor { rd, rm } => {
                let res = self.regs.get(rd) ^ self.regs.get(rm);
                self.update_nz(res);
                self.regs.set(rd, res);
            }
            Instruction::LslReg { rd, rm } => {
                let amount = self.regs.get(rm) & 0xFF;
                let res = self.shift_update_flags(Shift::Lsl, self.regs.get(rd), amount);
                self.regs.set(rd, res);
            }
            Instruction::LsrReg { rd, rm } => {
                let amount = self.regs.get(rm) & 0xFF;
                let res = self.shift_update_flags(Shift::Lsr, self.regs.get(rd), amount);
                self.regs.set(rd, res);
            }
            Instruction::AsrReg { rd, rm } => {
                let amount = self.regs.get(rm) & 0xFF;
                let res = self.shift_update_flags(Shift::Asr, self.regs.get(rd), amount);
                self.regs.set(rd, res);
            }
            Instruction::Adc { rd, rm } => {
                let carry = self.regs.flags.c as u32;
                let (res, c, v) = adc_with_flags(self.regs.get(rd), self.regs.get(rm), carry);
                self.update_nzcv(res, c, v);
                self.regs.set(rd, res);
            }
            Instruction::Sbc { rd, rm } => {
                let carry = self.regs.flags.c as u32;
                let (res, c, v) = sbc_with_flags(self.regs.get(rd), self.regs.get(rm), carry);
                self.update_nzcv(res, c, v);
                self.regs.set(rd, res);
            }
            Instruction::Ror { rd, rm } => {
                let amount = self.regs.get(rm) & 0xFF;
                let res = self.shift_update_flags(Shift::Ror, self.regs.get(rd), amount);
                self.regs.set(rd, res);
            }
            Instruction::Tst { rn, rm } => {
                let res = self.regs.get(rn) & self.regs.get(rm);
                self.update_nz(res);
            }
            Instruction::Rsbs { rd, rn } => {
                let (res, c, v) = sub_with_flags(0, self.regs.get(rn));
                self.update_nzcv(res, c, v);
                self.regs.set(rd, res);
            }
            Instruction::CmpReg { rn, rm } => {
                let (res, c, v) = sub_with_flags(self.regs.get(rn), self.regs.get(rm));
                self.update_nzcv(res, c, v);
            }
            Instruction::Cmn { rn, rm } => {
                let (res, c, v) = add_with_flags(self.regs.get(rn), self.regs.get(rm));
                self.update_nzcv(res, c, v);
            }
            Instruction::Orr { rd, rm } => {
                let res = self.regs.get(rd) | self.regs.get(rm);
                self.update_nz(res);
                self.regs.set(rd, res);
            }
            Instruction::Mul { rd, rn } => {
                let res = self.regs.get(rn).wrapping_mul(self.regs.get(rd));
                self.update_nz(res);
                self.regs.set(rd, res);
            }
            Instruction::Bic { rd, rm } => {
                let res = self.regs.get(rd) & !self.regs.get(rm);
                self.update_nz(res);
                self.regs.set(rd, res);
            }
            Instruction::Mvn { rd, rm } => {
                let res = !self.regs.get(rm);
                self.update_nz(res);
                self.regs.set(rd, res);
            }

            // High registers
            Instruction::AddRegHigh { rd, rm } => {
                let res = self.operand(rd).wrapping_add(self.operand(rm));
                match rd {
                    REG_PC => {
                        self.regs.set_pc(res & !1);
                        cycles += 1;
                    }
                    _ => self.regs.set(rd, res),
                }
            }
            Instruction::CmpRegHigh { rn, rm } => {
                let (res, c, v) = sub_with_flags(self.operand(rn), self.operand(rm));
                self.update_nzcv(res, c, v);
            }
            Instruction::MovRegHigh { rd, rm } => {
                let value = self.operand(rm);
                match rd {
                    REG_PC => {
                        self.regs.set_pc(value & !1);
                        cycles += 1;
                    }
                    _ => self.regs.set(rd, value),
                }
            }
            Instruction::Bx { rm } => {
                let target = self.operand(rm);
                self.bx_write_pc(bus, target);
                cycles += 1;
            }
            Instruction::Blx { rm } => {
                let target = self.operand(rm) & !1;
                self.regs.set_lr(pc | 1);
                self.regs.set_pc(target);
                cycles += 1;
                outcome.branch_link = Some(BranchLink { target, blx: true });
            }

            // Loads
            Instruction::LdrLit { rt, imm } => {
                let addr = (pc.wrapping_add(2) & !3).wrapping_add(imm as u32);
                cycles += cycles_io(addr, false);
                let value = self.read32(bus, addr);
                self.regs.set(rt, value);
            }
            Instruction::LdrReg { rt, rn, rm } => {
                let addr = self.regs.get(rn).wrapping_add(self.regs.get(rm));
                cycles += cycles_io(addr, false);
                let value = self.read32(bus, addr);
                self.regs.set(rt, value);
            }
            Instruction::LdrhReg { rt, rn, rm } => {
                let addr = self.regs.get(rn).wrapping_add(self.regs.get(rm));
                cycles += cycles_io(addr, false);
                let value = self.read16(bus, addr) as u32;
                self.regs.set(rt, value);
            }
            Instruction::LdrbReg { rt, rn, rm } => {
                let addr = self.regs.get(rn).wrapping_add(self.regs.get(rm));
                cycles += cycles_io(addr, false);
                let value = self.read8(bus, addr) as u32;
                self.regs.set(rt, value);
            }
            Instruction::Ldrsb { rt, rn, rm } => {
                let addr = self.regs.get(rn).wrapping_add(self.regs.get(rm));
                cycles += cycles_io(addr, false);
                let value = self.read8(bus, addr) as i8 as i32 as u32;
                self.regs.set(rt, value);
            }
            Instruction::Ldrsh { rt, rn, rm } => {
                let addr = self.regs.get(rn).wrapping_add(self.regs.get(rm));
                cycles += cycles_io(addr, false);
                let value = self.read16(bus, addr) as i16 as i32 as u32;
                self.regs.set(rt, value);
            }
            Instruction::LdrImm { rt, rn, imm } => {
                let addr = self.regs.get(rn).wrapping_add(imm as u32);
                cycles += cycles_io(addr, false);
                let value = self.read32(bus, addr);
                self.regs.set(rt, value);
            }
            Instruction::LdrbImm { rt, rn, imm } => {
                let addr = self.regs.get(rn).wrapping_add(imm as u32);
                cycles += cycles_io(addr, false);
                let value = self.read8(bus, addr) as u32;
                self.regs.set(rt, value);
            }
            Instruction::LdrhImm { rt, rn, imm } => {
                let addr = self.regs.get(rn).wrapping_add(imm as u32);
                cycles += cycles_io(addr, false);
                let value = self.read16(bus, addr) as u32;
                self.regs.set(rt, value);
            }
            Instruction::LdrSp { rt, imm } => {
                let addr = self.regs.sp().wrapping_add(imm as u32);
                cycles += cycles_io(addr, false);
                let value = self.read32(bus, addr);
                self.regs.set(rt, value);
            }

            // Stores
            Instruction::StrReg { rt, rn, rm } => {
                let addr = self.regs.get(rn).wrapping_add(self.regs.get(rm));
                cycles += cycles_io(addr, true);
                self.write32(bus, addr, self.regs.get(rt));
            }
            Instruction::StrhReg { rt, rn, rm } => {
                let addr = self.regs.get(rn).wrapping_add(self.regs.get(rm));
                cycles += cycles_io(addr, true);
                self.write16(bus, addr, self.regs.get(rt) as u16);
            }
            Instruction::StrbReg { rt, rn, rm } => {
                let addr = self.regs.get(rn).wrapping_add(self.regs.get(rm));
                cycles += cycles_io(addr, true);
                self.write8(bus, addr, self.regs.get(rt) as u8);
            }
            Instruction::StrImm { rt, rn, imm } => {
                let addr = self.regs.get(rn).wrapping_add(imm as u32);
                cycles += cycles_io(addr, true);
                self.write32(bus, addr, self.regs.get(rt));
            }
            Instruction::StrbImm { rt, rn, imm } => {
                let addr = self.regs.get(rn).wrapping_add(imm as u32);
                cycles += cycles_io(addr, true);
                self.write8(bus, addr, self.regs.get(rt) as u8);
            }
            Instruction::StrhImm { rt, rn, imm } => {
                let addr = self.regs.get(rn).wrapping_add(imm as u32);
                cycles += cycles_io(addr, true);
                self.write16(bus, addr, self.regs.get(rt) as u16);
            }
            Instruction::StrSp { rt, imm } => {
                let addr = self.regs.sp().wrapping_add(imm as u32);
                cycles += cycles_io(addr, true);
                self.write32(bus, addr, self.regs.get(rt));
            }

            // Address generation and SP adjust
            Instruction::Adr { rd, imm } => {
                let value = (opcode_pc & !3).wrapping_add(4).wrapping_add(imm as u32);
                self.regs.set(rd, value);
            }
            Instruction::AddSpReg { rd, imm } => {
                let value = self.regs.sp().wrapping_add(imm as u32);
                self.regs.set(rd, value);
            }
            Instruction::AddSp { imm } => {
                let value = self.regs.sp().wrapping_add(imm as u32);
                self.regs.set_sp(value);
            }
            Instruction::SubSp { imm } => {
                let value = self.regs.sp().wrapping_sub(imm as u32);
                self.regs.set_sp(value);
            }

            // Extend / reverse
            Instruction::Sxth { rd, rm } => {
                self.regs.set(rd, self.regs.get(rm) as i16 as i32 as u32);
            }
            Instruction::Sxtb { rd, rm } => {
                self.regs.set(rd, self.regs.get(rm) as i8 as i32 as u32);
            }
            Instruction::Uxth { rd, rm } => {
                self.regs.set(rd, self.regs.get(rm) & 0xFFFF);
            }
            Instruction::Uxtb { rd, rm } => {
                self.regs.set(rd, self.regs.get(rm) & 0xFF);
            }
            Instruction::Rev { rd, rm } => {
                self.regs.set(rd, self.regs.get(rm).swap_bytes());
            }
            Instruction::Rev16 { rd, rm } => {
                let input = self.regs.get(rm);
                let value = ((input & 0x00FF_00FF) << 8) | ((input >> 8) & 0x00FF_00FF);
                self.regs.set(rd, value);
            }
            Instruction::RevSh { rd, rm } => {
                let value = (self.regs.get(rm) as u16).swap_bytes() as i16 as i32 as u32;
                self.regs.set(rd, value);
            }

            // Stack and multiple transfers
            Instruction::Push { registers, m } => {
                let count = registers.count_ones() + m as u32;
                let sp = self.regs.sp().wrapping_sub(4 * count);
                let mut addr = sp;
                for i in 0..8u8 {
                    if registers & (1 << i) != 0 {
                        self.write32(bus, addr, self.regs.get(i));
                        addr = addr.wrapping_add(4);
                        cycles += 1;
                    }
                }
                if m {
                    self.write32(bus, addr, self.regs.lr());
                    cycles += 1;
                }
                self.regs.set_sp(sp);
            }
            Instruction::Pop { registers, p } => {
                let mut addr = self.regs.sp();
                for i in 0..8u8 {
                    if registers & (1 << i) != 0 {
                        let value = self.read32(bus, addr);
                        self.regs.set(i, value);
                        addr = addr.wrapping_add(4);
                        cycles += 1;
                    }
                }
                if p {
                    self.regs.set_sp(addr.wrapping_add(4));
                    let target = self.read32(bus, addr);
                    self.bx_write_pc(bus, target);
                    cycles += 2;
                } else {
                    self.regs.set_sp(addr);
                }
            }
            Instruction::Stm { rn, registers } => {
                let mut addr = self.regs.get(rn);
                for i in 0..8u8 {
                    if registers & (1 << i) != 0 {
                        self.write32(bus, addr, self.regs.get(i));
                        addr = addr.wrapping_add(4);
                        cycles += 1;
                    }
                }
                if registers & (1 << rn) == 0 {
                    self.regs.set(rn, addr);
                }
            }
            Instruction::Ldm { rn, registers } => {
                let mut addr = self.regs.get(rn);
                for i in 0..8u8 {
                    if registers & (1 << i) != 0 {
                        let value = self.read32(bus, addr);
                        self.regs.set(i, value);
                        addr = addr.wrapping_add(4);
                        cycles += 1;
                    }
                }
                if registers & (1 << rn) == 0 {
                    self.regs.set(rn, addr);
                }
            }

            // Branches
            Instruction::BranchCond { cond, offset } => {
                if self.check_condition(cond) {
                    self.regs
                        .set_pc(pc.wrapping_add(offset as u32).wrapping_add(2));
                    cycles += 1;
                }
            }
            Instruction::Branch { offset } => {
                self.regs
                    .set_pc(pc.wrapping_add(offset as u32).wrapping_add(2));
                cycles += 1;
            }
            Instruction::Bl { offset } => {
                let target = pc.wrapping_add(2).wrapping_add(offset as u32);
                self.regs.set_lr(pc.wrapping_add(2) | 1);
                self.regs.set_pc(target);
                cycles += 2;
                outcome.branch_link = Some(BranchLink { target, blx: false });
            }

            // System
            Instruction::Svc { .. } => {
                self.nvic.pend_exception(EXC_SVCALL);
            }
            Instruction::Cpsid => {
                self.regs.primask = true;
            }
            Instruction::Cpsie => {
                self.regs.primask = false;
                self.nvic.dirty = true;
            }
            Instruction::Mrs { rd, sysm } => {
                let value = self.read_special(sysm);
                self.regs.set(rd, value);
                self.regs.set_pc(pc.wrapping_add(2));
                cycles += 2;
            }
            Instruction::Msr { rn, sysm } => {
                self.write_special(sysm, self.regs.get(rn));
                self.regs.set_pc(pc.wrapping_add(2));
                cycles += 2;
            }
            Instruction::Dmb | Instruction::Dsb | Instruction::Isb => {
                self.regs.set_pc(pc.wrapping_add(2));
                cycles += 2;
            }
            Instruction::Bkpt { imm } | Instruction::Udf { imm } => {
                self.break_rewind = 2;
                outcome.break_code = Some(imm as u32);
            }
            Instruction::UdfWide { imm } => {
                self.break_rewind = 4;
                outcome.break_code = Some(imm as u32);
                self.regs.set_pc(pc.wrapping_add(2));
            }

            // Hints
            Instruction::Nop => {}
            Instruction::Yield => {
                self.logger.info(SOURCE, format_args!("Yield"));
            }
            Instruction::Sev => {
                self.logger.info(SOURCE, format_args!("SEV"));
                outcome.sev = true;
            }
            Instruction::Wfe => {
                cycles += 1;
                if self.event_registered {
                    self.event_registered = false;
                } else {
                    self.waiting = true;
                    self.wait_for_event = true;
                }
            }
            Instruction::Wfi => {
                cycles += 1;
                self.waiting = true;
                self.wait_for_event = false;
            }

            Instruction::Unknown(opcode) => {
                self.logger.warn(
                    SOURCE,
                    format_args!(
                        "Unknown instruction at {:#010x}: opcode {:#06x}",
                        opcode_pc, opcode
                    ),
                );
            }
            Instruction::Unknown32(opcode, opcode2) => {
                self.logger.warn(
                    SOURCE,
                    format_args!(
                        "Unknown instruction at {:#010x}: opcode {:#06x} ({:#06x})",
                        opcode_pc, opcode, opcode2
                    ),
                );
            }
        }

        cycles
    }
}

#[inline(always)]
fn is_ppb(addr: u32) -> bool {
    addr >> 28 == 0xE
}

/// Extra bus cycles of a load/store: SIO is single cycle, APB peripherals
/// are slow, everything else costs one wait state.
fn cycles_io(addr: u32, write: bool) -> u32 {
    if (SIO_BASE..SIO_BASE + 0x1000_0000).contains(&addr) {
        0
    } else if (APB_BASE..APB_BASE + 0x1000_0000).contains(&addr) {
        if write {
            4
        } else {
            3
        }
    } else {
        1
    }
}

/// Shift with the ARM carry-out rules. An amount of 0 leaves both the
/// value and the carry untouched; immediate encodings that mean 32 must
/// pass 32.
fn shift_with_carry(kind: Shift, value: u32, amount: u32, carry_in: bool) -> (u32, bool) {
    if amount == 0 {
        return (value, carry_in);
    }
    match kind {
        Shift::Lsl => match amount {
            1..=31 => (value << amount, (value >> (32 - amount)) & 1 != 0),
            32 => (0, value & 1 != 0),
            _ => (0, false),
        },
        Shift::Lsr => match amount {
            1..=31 => (value >> amount, (value >> (amount - 1)) & 1 != 0),
            32 => (0, value >> 31 != 0),
            _ => (0, false),
        },
        Shift::Asr => {
            if amount >= 32 {
                let fill = ((value as i32) >> 31) as u32;
                (fill, value >> 31 != 0)
            } else {
                (
                    ((value as i32) >> amount) as u32,
                    (value >> (amount - 1)) & 1 != 0,
                )
            }
        }
        Shift::Ror => {
            let result = value.rotate_right(amount % 32);
            (result, result >> 31 != 0)
        }
    }
}

fn add_with_flags(op1: u32, op2: u32) -> (u32, bool, bool) {
    adc_with_flags(op1, op2, 0)
}

/// AddWithCarry: carry out of bit 31, overflow when both operands share a
/// sign the result does not.
fn adc_with_flags(op1: u32, op2: u32, carry_in: u32) -> (u32, bool, bool) {
    let unsigned_sum = op1 as u64 + op2 as u64 + carry_in as u64;
    let signed_sum = op1 as i32 as i64 + op2 as i32 as i64 + carry_in as i64;
    let res = unsigned_sum as u32;
    let carry = res as u64 != unsigned_sum;
    let overflow = res as i32 as i64 != signed_sum;
    (res, carry, overflow)
}

fn sub_with_flags(op1: u32, op2: u32) -> (u32, bool, bool) {
    adc_with_flags(op1, !op2, 1)
}

fn sbc_with_flags(op1: u32, op2: u32, carry_in: u32) -> (u32, bool, bool) {
    adc_with_flags(op1, !op2, carry_in)
}
