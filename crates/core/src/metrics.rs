// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::chip::CORE_COUNT;
use crate::SimulationObserver;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

#[derive(Debug, Default)]
struct CoreCounters {
    instructions: AtomicU64,
    cycles: AtomicU64,
    breaks: AtomicU64,
}

#[derive(Debug)]
pub struct PerformanceMetrics {
    cores: [CoreCounters; CORE_COUNT],
    start_time: Mutex<Instant>,
}

/// Counter values of one core at the time of the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CoreMetrics {
    pub instructions: u64,
    pub cycles: u64,
    pub breaks: u64,
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceMetrics {
    pub fn new() -> Self {
        Self {
            cores: Default::default(),
            start_time: Mutex::new(Instant::now()),
        }
    }

    pub fn reset(&self) {
        for core in &self.cores {
            core.instructions.store(0, Ordering::SeqCst);
            core.cycles.store(0, Ordering::SeqCst);
            core.breaks.store(0, Ordering::SeqCst);
        }
        if let Ok(mut start) = self.start_time.lock() {
            *start = Instant::now();
        }
    }

    pub fn core(&self, core: usize) -> Option<CoreMetrics> {
        self.cores.get(core).map(|c| CoreMetrics {
            instructions: c.instructions.load(Ordering::SeqCst),
            cycles: c.cycles.load(Ordering::SeqCst),
            breaks: c.breaks.load(Ordering::SeqCst),
        })
    }

    pub fn get_instructions(&self) -> u64 {
        self.cores
            .iter()
            .map(|c| c.instructions.load(Ordering::SeqCst))
            .sum()
    }

    pub fn get_cycles(&self) -> u64 {
        self.cores
            .iter()
            .map(|c| c.cycles.load(Ordering::SeqCst))
            .sum()
    }

    pub fn get_ips(&self) -> f64 {
        let elapsed = self
            .start_time
            .lock()
            .map(|start| start.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        if elapsed > 0.0 {
            self.get_instructions() as f64 / elapsed
        } else {
            0.0
        }
    }
}

impl SimulationObserver for PerformanceMetrics {
    fn on_step_start(&self, core: usize, _pc: u32, _opcode: u32) {
        if let Some(c) = self.cores.get(core) {
            c.instructions.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn on_step_end(&self, core: usize, cycles: u32) {
        if let Some(c) = self.cores.get(core) {
            c.cycles.fetch_add(cycles as u64, Ordering::SeqCst);
        }
    }

    fn on_break(&self, core: usize, _code: u32) {
        if let Some(c) = self.cores.get(core) {
            c.breaks.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_per_core() {
        let metrics = PerformanceMetrics::new();
        metrics.on_step_start(0, 0x100, 0xBF00);
        metrics.on_step_end(0, 1);
        metrics.on_step_start(1, 0x200, 0xE7FE);
        metrics.on_step_end(1, 2);
        metrics.on_break(1, 0);
        metrics.on_step_start(7, 0, 0);

        assert_eq!(metrics.get_instructions(), 2);
        assert_eq!(metrics.get_cycles(), 3);
        assert_eq!(
            metrics.core(1),
            Some(CoreMetrics {
                instructions: 1,
                cycles: 2,
                breaks: 1
            })
        );
        assert_eq!(metrics.core(2), None);

        metrics.reset();
        assert_eq!(metrics.get_instructions(), 0);
    }
}
