// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use core::convert::Infallible;
use gdbstub::common::Signal;
use gdbstub::conn::Connection;
use gdbstub::stub::run_blocking::{BlockingEventLoop, Event, WaitForStopReasonError};
use gdbstub::stub::{BaseStopReason, GdbStub};
use gdbstub::target::ext::base::singlethread::{
    SingleThreadBase, SingleThreadResume, SingleThreadResumeOps, SingleThreadSingleStep,
    SingleThreadSingleStepOps,
};
use gdbstub::target::ext::base::BaseOps;
use gdbstub::target::ext::breakpoints::{
    Breakpoints, BreakpointsOps, SwBreakpoint, SwBreakpointOps,
};
use gdbstub::target::{Target, TargetError, TargetResult};
use gdbstub_arch::arm::reg::ArmCoreRegs;
use gdbstub_arch::arm::ArmBreakpointKind;
use picosim_core::{DebugControl, Rp2040, StopReason};
use std::net::{SocketAddr, TcpListener, TcpStream};

/// Instructions executed between checks for a GDB interrupt.
const RUN_CHUNK: u32 = 1000;

const REG_SP: u8 = 13;
const REG_LR: u8 = 14;
const REG_PC: u8 = 15;
const REG_XPSR: u8 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    Continue,
    Step,
}

/// The chip as a single-threaded GDB target. GDB sees the currently
/// selected core; a BKPT on the other core switches the selection.
pub struct PicoTarget {
    pub chip: Rp2040,
    exec_mode: ExecMode,
}

impl PicoTarget {
    pub fn new(chip: Rp2040) -> Self {
        Self {
            chip,
            exec_mode: ExecMode::Continue,
        }
    }

    pub fn exec_mode(&self) -> ExecMode {
        self.exec_mode
    }

    pub fn into_chip(self) -> Rp2040 {
        self.chip
    }

    fn reg(&self, id: u8) -> TargetResult<u32, Self> {
        self.chip
            .read_core_reg(id)
            .map_err(|_| TargetError::NonFatal)
    }

    fn set_reg(&mut self, id: u8, value: u32) -> TargetResult<(), Self> {
        self.chip
            .write_core_reg(id, value)
            .map_err(|_| TargetError::NonFatal)
    }

    /// Runs according to the last resume request and converts the outcome
    /// into a GDB stop reason. `None` means keep going.
    fn execute(&mut self) -> Option<BaseStopReason<(), u32>> {
        let result = match self.exec_mode {
            ExecMode::Step => self.chip.step_single(),
            ExecMode::Continue => self.chip.run(Some(RUN_CHUNK)),
        };
        match result {
            Ok(StopReason::Breakpoint(_)) => Some(BaseStopReason::SwBreak(())),
            Ok(StopReason::BreakInstruction(code)) => {
                tracing::info!("BKPT #{} on core {}", code, self.chip.selected_core());
                Some(BaseStopReason::Signal(Signal::SIGTRAP))
            }
            Ok(StopReason::StepDone) => Some(BaseStopReason::DoneStep),
            Ok(StopReason::ManualStop) => Some(BaseStopReason::Signal(Signal::SIGINT)),
            Ok(StopReason::MaxStepsReached) => None,
            Err(e) => {
                tracing::error!("GDB Simulation Error: {}", e);
                Some(BaseStopReason::Signal(Signal::SIGSEGV))
            }
        }
    }
}

impl Target for PicoTarget {
    type Arch = gdbstub_arch::arm::Armv4t;
    type Error = Infallible;

    fn base_ops(&mut self) -> BaseOps<'_, Self::Arch, Self::Error> {
        BaseOps::SingleThread(self)
    }

    fn support_breakpoints(&mut self) -> Option<BreakpointsOps<'_, Self>> {
        Some(self)
    }
}

impl SingleThreadBase for PicoTarget {
    fn read_registers(&mut self, regs: &mut ArmCoreRegs) -> TargetResult<(), Self> {
        for (i, r) in regs.r.iter_mut().enumerate() {
            *r = self.reg(i as u8)?;
        }
        regs.sp = self.reg(REG_SP)?;
        regs.lr = self.reg(REG_LR)?;
        regs.pc = self.reg(REG_PC)?;
        regs.cpsr = self.reg(REG_XPSR)?;
        Ok(())
    }

    fn write_registers(&mut self, regs: &ArmCoreRegs) -> TargetResult<(), Self> {
        for (i, r) in regs.r.iter().enumerate() {
            self.set_reg(i as u8, *r)?;
        }
        self.set_reg(REG_SP, regs.sp)?;
        self.set_reg(REG_LR, regs.lr)?;
        self.set_reg(REG_PC, regs.pc)?;
        self.set_reg(REG_XPSR, regs.cpsr)?;
        Ok(())
    }

    fn read_addrs(&mut self, start_addr: u32, data: &mut [u8]) -> TargetResult<usize, Self> {
        let mem = self
            .chip
            .read_memory(start_addr, data.len())
            .map_err(|_| TargetError::NonFatal)?;
        let len = mem.len().min(data.len());
        data[..len].copy_from_slice(&mem[..len]);
        Ok(len)
    }

    fn write_addrs(&mut self, start_addr: u32, data: &[u8]) -> TargetResult<(), Self> {
        self.chip
            .write_memory(start_addr, data)
            .map_err(|_| TargetError::NonFatal)
    }

    fn support_resume(&mut self) -> Option<SingleThreadResumeOps<'_, Self>> {
        Some(self)
    }
}

impl SingleThreadResume for PicoTarget {
    fn resume(&mut self, _signal: Option<Signal>) -> Result<(), Self::Error> {
        self.exec_mode = ExecMode::Continue;
        Ok(())
    }

    fn support_single_step(&mut self) -> Option<SingleThreadSingleStepOps<'_, Self>> {
        Some(self)
    }
}

impl SingleThreadSingleStep for PicoTarget {
    fn step(&mut self, _signal: Option<Signal>) -> Result<(), Self::Error> {
        self.exec_mode = ExecMode::Step;
        Ok(())
    }
}

impl Breakpoints for PicoTarget {
    fn support_sw_breakpoint(&mut self) -> Option<SwBreakpointOps<'_, Self>> {
        Some(self)
    }
}

impl SwBreakpoint for PicoTarget {
    fn add_sw_breakpoint(
        &mut self,
        addr: u32,
        _kind: ArmBreakpointKind,
    ) -> TargetResult<bool, Self> {
        self.chip.add_breakpoint(addr);
        Ok(true)
    }

    fn remove_sw_breakpoint(
        &mut self,
        addr: u32,
        _kind: ArmBreakpointKind,
    ) -> TargetResult<bool, Self> {
        self.chip.remove_breakpoint(addr);
        Ok(true)
    }
}

/// GDB Remote Serial Protocol server for one client session over TCP.
pub struct GdbServer {
    listener: TcpListener,
}

impl GdbServer {
    /// Listens on all interfaces; port 0 picks a free port.
    pub fn bind(port: u16) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port))?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves a single client until it detaches or disconnects and hands
    /// the chip back for reporting.
    pub fn run(&self, chip: Rp2040) -> anyhow::Result<Rp2040> {
        tracing::info!("GDB server listening on {}", self.local_addr()?);

        let (stream, addr) = self.listener.accept()?;
        tracing::info!("GDB client connected from {}", addr);

        let mut target = PicoTarget::new(chip);
        let gdb = GdbStub::new(stream);

        match gdb.run_blocking::<GdbEventLoop>(&mut target) {
            Ok(reason) => tracing::info!("GDB session ended: {:?}", reason),
            Err(e) => tracing::error!("GDB session error: {:?}", e),
        }

        Ok(target.into_chip())
    }
}

pub enum GdbEventLoop {}

impl BlockingEventLoop for GdbEventLoop {
    type Target = PicoTarget;
    type Connection = TcpStream;
    type StopReason = BaseStopReason<(), u32>;

    fn wait_for_stop_reason(
        target: &mut Self::Target,
        conn: &mut Self::Connection,
    ) -> Result<
        Event<Self::StopReason>,
        WaitForStopReasonError<
            <Self::Target as Target>::Error,
            <Self::Connection as Connection>::Error,
        >,
    > {
        use std::io::Read;

        loop {
            // Non-blocking peek at the connection for an interrupt.
            let mut byte = [0];
            conn.set_nonblocking(true).ok();
            let incoming = match conn.read(&mut byte) {
                Ok(1) => Some(byte[0]),
                _ => None,
            };
            conn.set_nonblocking(false).ok();

            if let Some(b) = incoming {
                return Ok(Event::IncomingData(b));
            }

            if let Some(reason) = target.execute() {
                return Ok(Event::TargetStopped(reason));
            }
        }
    }

    fn on_interrupt(
        _target: &mut Self::Target,
    ) -> Result<Option<Self::StopReason>, <Self::Target as Target>::Error> {
        Ok(Some(BaseStopReason::Signal(Signal::SIGINT)))
    }
}
