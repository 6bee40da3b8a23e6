// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::cpu::{CortexM0, ExecutionMode, Flags, InterruptController};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ChipSnapshot {
    pub cycles: u64,
    pub now_nanos: u64,
    pub cores: Vec<CoreSnapshot>,
    pub sio: serde_json::Value,
    pub peripherals: BTreeMap<String, serde_json::Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CoreSnapshot {
    pub id: usize,
    pub registers: Vec<u32>,
    pub flags: Flags,
    pub mode: ExecutionMode,
    pub xpsr: u32,
    pub msp: u32,
    pub psp: u32,
    pub primask: bool,
    pub control: u32,
    pub nvic: InterruptController,
    pub systick: serde_json::Value,
    pub cycles: u64,
    pub waiting: bool,
}

impl CoreSnapshot {
    pub fn from_core(core: &CortexM0) -> Self {
        let regs = &core.regs;
        Self {
            id: core.id(),
            registers: regs.registers().to_vec(),
            flags: regs.flags,
            mode: regs.mode,
            xpsr: regs.xpsr(),
            msp: regs.msp(),
            psp: regs.psp(),
            primask: regs.primask,
            control: regs.control(),
            nvic: core.nvic.clone(),
            systick: serde_json::to_value(&core.systick).unwrap_or(serde_json::Value::Null),
            cycles: core.cycles,
            waiting: core.waiting,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NullLogger;
    use std::sync::Arc;

    #[test]
    fn test_core_snapshot_serializes_to_json() {
        let mut core = CortexM0::new(1, Arc::new(NullLogger));
        core.regs.set(3, 0xCAFE);
        core.regs.flags.z = true;
        let snapshot = CoreSnapshot::from_core(&core);
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["registers"][3], 0xCAFE);
        assert_eq!(json["flags"]["z"], true);
        assert_eq!(json["mode"], "Thread");

        let back: CoreSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back.nvic, core.nvic);
    }
}
