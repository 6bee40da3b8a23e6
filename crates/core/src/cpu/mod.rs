// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod cortex_m0;
pub mod exceptions;
pub mod ppb;
pub mod registers;

pub use cortex_m0::{BranchLink, CortexM0, StepOutcome, PPB_BASE};
pub use exceptions::InterruptController;
pub use registers::{ExecutionMode, Flags, RegisterFile, StackSelect};
