// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::logging::LogLevel;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// System clock frequency, used to convert core cycles to clock time.
    pub clock_hz: u64,
    /// Cycles a core runs before the scheduler switches to the other core.
    pub quantum_cycles: u64,
    pub log_level: LogLevel,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            clock_hz: 125_000_000,
            quantum_cycles: 1000,
            log_level: LogLevel::Info,
        }
    }
}
