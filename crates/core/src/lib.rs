// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod bus;
pub mod chip;
pub mod clock;
pub mod config;
pub mod cpu;
pub mod decoder;
pub mod logging;
pub mod memory;
pub mod metrics;
pub mod peripherals;
pub mod sio;
pub mod snapshot;
pub mod system;
pub mod utils;


pub use chip::Rp2040;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SimulationError {
    #[error("Invalid register id {0}")]
    InvalidRegister(u8),
    #[error("Invalid core {0}")]
    InvalidCore(usize),
    #[error("Image segment at {addr:#x} ({len} bytes) is outside of the memory map")]
    ImageOutOfRange { addr: u32, len: usize },
    #[error("Misaligned access at {addr:#x}")]
    MisalignedAccess { addr: u32 },
}

pub type SimResult<T> = Result<T, SimulationError>;

/// The two Cortex-M0+ cores of the chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum CoreId {
    Core0,
    Core1,
}

impl CoreId {
    pub fn index(self) -> usize {
        match self {
            CoreId::Core0 => 0,
            CoreId::Core1 => 1,
        }
    }

    pub fn from_index(index: usize) -> SimResult<Self> {
        match index {
            0 => Ok(CoreId::Core0),
            1 => Ok(CoreId::Core1),
            n => Err(SimulationError::InvalidCore(n)),
        }
    }
}

/// Trait for observing simulation events in a modular way.
pub trait SimulationObserver: std::fmt::Debug + Send + Sync {
    fn on_simulation_start(&self) {}
    fn on_simulation_stop(&self) {}
    fn on_step_start(&self, _core: usize, _pc: u32, _opcode: u32) {}
    fn on_step_end(&self, _core: usize, _cycles: u32) {}
    /// BKPT or UDF executed with the given immediate.
    fn on_break(&self, _core: usize, _code: u32) {}
    fn on_branch_link(&self, _core: usize, _target: u32, _blx: bool) {}
}

/// Memory as seen by one core. Reads take `&mut self` because peripheral
/// reads may have side effects (FIFO pops, spinlock claims, flag clears).
pub trait Bus {
    fn read_u8(&mut self, addr: u32) -> u8;
    fn read_u16(&mut self, addr: u32) -> u16;
    fn read_u32(&mut self, addr: u32) -> u32;
    fn write_u8(&mut self, addr: u32, value: u8);
    fn write_u16(&mut self, addr: u32, value: u16);
    fn write_u32(&mut self, addr: u32, value: u32);

    /// Extra cycles the last accesses cost the issuing core.
    fn take_stall_cycles(&mut self) -> u32 {
        0
    }
}

/// Trait for controlling the machine in debug mode
pub trait DebugControl {
    fn add_breakpoint(&mut self, addr: u32);
    fn remove_breakpoint(&mut self, addr: u32);
    fn clear_breakpoints(&mut self);

    /// Run until breakpoint or steps limit
    fn run(&mut self, max_steps: Option<u32>) -> SimResult<StopReason>;

    /// Step a single instruction
    fn step_single(&mut self) -> SimResult<StopReason>;

    /// r0-r15, then 16 xPSR, 17 MSP, 18 PSP, 19 PRIMASK, 20 CONTROL.
    fn read_core_reg(&self, id: u8) -> SimResult<u32>;
    fn write_core_reg(&mut self, id: u8, val: u32) -> SimResult<()>;

    fn read_memory(&mut self, addr: u32, len: usize) -> SimResult<Vec<u8>>;
    fn write_memory(&mut self, addr: u32, data: &[u8]) -> SimResult<()>;

    fn get_pc(&self) -> u32;
    fn set_pc(&mut self, addr: u32);
    fn get_register_names(&self) -> Vec<String>;
    fn get_cycle_count(&self) -> u64;
    fn reset(&mut self) -> SimResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "reason", content = "value", rename_all = "snake_case")]
pub enum StopReason {
    Breakpoint(u32),
    BreakInstruction(u32),
    StepDone,
    MaxStepsReached,
    ManualStop,
}
