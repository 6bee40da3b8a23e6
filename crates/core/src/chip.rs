// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Dual-core RP2040 composition: two Cortex-M0+ cores sharing the memory
//! bus and the SIO block, scheduled cooperatively against one clock.

use crate::bus::MemoryBus;
use crate::clock::{cycles_to_nanos, nanos_to_cycles, Clock, SimulationClock, TimerHandle};
use crate::config::SimulationConfig;
use crate::cpu::cortex_m0::{
    StepOutcome, DEBUG_REG_CONTROL, DEBUG_REG_MSP, DEBUG_REG_PRIMASK, DEBUG_REG_PSP,
    DEBUG_REG_XPSR,
};
use crate::cpu::CortexM0;
use crate::logging::SharedLogger;
use crate::peripherals::TimerCommand;
use crate::sio::{Sio, SIO_BASE, SIO_IRQ_PROC0};
use crate::snapshot::{ChipSnapshot, CoreSnapshot};
use crate::{Bus, DebugControl, SimResult, SimulationError, SimulationObserver, StopReason};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

const SOURCE: &str = "Rp2040";

pub const CORE_COUNT: usize = 2;

/// Number of NVIC lines driven by bus peripherals.
const HARDWARE_IRQ_LINES: u32 = 26;

/// Stack pointer used by `boot_at` callers that have no vector table.
pub const DEFAULT_STACK_TOP: u32 = 0x2004_2000;

/// Event carried by a clock alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChipEvent {
    /// Timer scheduled by the peripheral in bus slot `slot`.
    Peripheral { slot: usize, token: u32 },
}

/// One core's view of the system: SIO with the core's id, everything else
/// through the shared bus.
struct CoreBus<'a> {
    bus: &'a mut MemoryBus,
    sio: &'a mut Sio,
    core: usize,
}

impl CoreBus<'_> {
    fn is_sio(addr: u32) -> bool {
        addr >> 28 == SIO_BASE >> 28
    }

    fn sio_offset(addr: u32) -> u32 {
        addr.wrapping_sub(SIO_BASE) & !3
    }
}

impl Bus for CoreBus<'_> {
    fn read_u8(&mut self, addr: u32) -> u8 {
        if Self::is_sio(addr) {
            let word = self.sio.read_u32(self.core, Self::sio_offset(addr));
            (word >> ((addr & 3) * 8)) as u8
        } else {
            self.bus.read_u8(addr)
        }
    }

    fn read_u16(&mut self, addr: u32) -> u16 {
        if Self::is_sio(addr) {
            let word = self.sio.read_u32(self.core, Self::sio_offset(addr));
            (word >> ((addr & 2) * 8)) as u16
        } else {
            self.bus.read_u16(addr)
        }
    }

    fn read_u32(&mut self, addr: u32) -> u32 {
        if Self::is_sio(addr) {
            self.sio.read_u32(self.core, Self::sio_offset(addr))
        } else {
            self.bus.read_u32(addr)
        }
    }

    fn write_u8(&mut self, addr: u32, value: u8) {
        if Self::is_sio(addr) {
            let value = value as u32 * 0x0101_0101;
            self.sio.write_u32(self.core, Self::sio_offset(addr), value);
        } else {
            self.bus.write_u8(addr, value);
        }
    }

    fn write_u16(&mut self, addr: u32, value: u16) {
        if Self::is_sio(addr) {
            let value = value as u32 * 0x0001_0001;
            self.sio.write_u32(self.core, Self::sio_offset(addr), value);
        } else {
            self.bus.write_u16(addr, value);
        }
    }

    fn write_u32(&mut self, addr: u32, value: u32) {
        if Self::is_sio(addr) {
            self.sio.write_u32(self.core, Self::sio_offset(addr), value);
        } else {
            self.bus.write_u32(addr, value);
        }
    }

    fn take_stall_cycles(&mut self) -> u32 {
        self.sio.take_stall_cycles(self.core)
    }
}

/// The dual-core chip.
///
/// Chip time is counted in cycles of the system clock; both cores' cycle
/// counters share that time base, and the clock follows at
/// `cycles_to_nanos(cycles)`.
pub struct Rp2040<C: Clock<Event = ChipEvent> = SimulationClock<ChipEvent>> {
    pub cores: [CortexM0; CORE_COUNT],
    pub bus: MemoryBus,
    pub sio: Sio,
    pub clock: C,
    pub config: SimulationConfig,
    pub observers: Vec<Arc<dyn SimulationObserver>>,
    pub breakpoints: HashSet<u32>,
    cycles: u64,
    timers: HashMap<(usize, u32), TimerHandle>,
    irq_level: u32,
    sio_irq_level: [bool; CORE_COUNT],
    selected_core: usize,
    step_budget: Option<u64>,
    stop_requested: bool,
    logger: SharedLogger,
}

impl<C: Clock<Event = ChipEvent>> std::fmt::Debug for Rp2040<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rp2040")
            .field("cores", &self.cores)
            .field("bus", &self.bus)
            .field("cycles", &self.cycles)
            .field("selected_core", &self.selected_core)
            .finish()
    }
}

impl Rp2040<SimulationClock<ChipEvent>> {
    pub fn new(bus: MemoryBus, config: SimulationConfig, logger: SharedLogger) -> Self {
        Self::with_clock(bus, SimulationClock::new(), config, logger)
    }
}

impl<C: Clock<Event = ChipEvent>> Rp2040<C> {
    /// Builds the chip and performs a power-on reset from the boot ROM.
    pub fn with_clock(
        bus: MemoryBus,
        clock: C,
        config: SimulationConfig,
        logger: SharedLogger,
    ) -> Self {
        let mut chip = Self {
            cores: [
                CortexM0::new(0, logger.clone()),
                CortexM0::new(1, logger.clone()),
            ],
            bus,
            sio: Sio::new(logger.clone()),
            clock,
            config,
            observers: Vec::new(),
            breakpoints: HashSet::new(),
            cycles: 0,
            timers: HashMap::new(),
            irq_level: 0,
            sio_irq_level: [false; CORE_COUNT],
            selected_core: 0,
            step_budget: None,
            stop_requested: false,
            logger,
        };
        chip.reset_cores(None);
        chip
    }

    pub fn logger(&self) -> &SharedLogger {
        &self.logger
    }

    pub fn add_observer(&mut self, observer: Arc<dyn SimulationObserver>) {
        self.observers.push(observer);
    }

    /// Current chip time in cycles.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn now_nanos(&self) -> u64 {
        self.clock.now_nanos()
    }

    pub fn selected_core(&self) -> usize {
        self.selected_core
    }

    /// Core addressed by the debug API.
    pub fn select_core(&mut self, core: usize) -> SimResult<()> {
        if core >= CORE_COUNT {
            return Err(SimulationError::InvalidCore(core));
        }
        self.selected_core = core;
        Ok(())
    }

    /// Makes the current or next run loop return `ManualStop`.
    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    pub fn set_gpio_input(&mut self, pin: u32, high: bool) {
        self.sio.set_gpio_input(pin, high);
    }

    /// Both cores start from the boot ROM vector table.
    pub fn reset_from_bootrom(&mut self) {
        self.reset_cores(None);
    }

    /// Direct boot: core 0 starts from the vector table at `vector_table`,
    /// core 1 sleeps in WFE.
    pub fn boot_flash(&mut self, vector_table: u32) {
        self.reset_cores(Some(vector_table));
        self.park_core1();
        tracing::info!(
            "Core 0 booted from vector table {:#010x}: SP={:#010x} PC={:#010x}",
            vector_table,
            self.cores[0].regs.sp(),
            self.cores[0].pc()
        );
    }

    /// Direct boot at an explicit entry point.
    pub fn boot_at(&mut self, sp: u32, pc: u32) {
        self.reset_cores(None);
        self.cores[0].regs.set_sp(sp);
        self.cores[0].regs.set_pc(pc & !1);
        self.park_core1();
    }

    fn park_core1(&mut self) {
        let core1 = &mut self.cores[1];
        core1.waiting = true;
        core1.wait_for_event = true;
    }

    fn reset_cores(&mut self, vector_table: Option<u32>) {
        self.sio.reset();
        self.sio_irq_level = [false; CORE_COUNT];
        self.irq_level = 0;
        self.bus.irq.take_changed();
        let level = self.bus.irq.level();
        for (id, core) in self.cores.iter_mut().enumerate() {
            let mut view = CoreBus {
                bus: &mut self.bus,
                sio: &mut self.sio,
                core: id,
            };
            match vector_table {
                Some(vt) if id == 0 => core.reset_with_vector_table(&mut view, vt),
                _ => core.reset(&mut view),
            }
            // Core counters share the chip's time base.
            core.cycles = self.cycles;
        }
        self.apply_irq_level(level);
    }

    fn core_view(&mut self, core: usize) -> (&mut CortexM0, CoreBus<'_>) {
        (
            &mut self.cores[core],
            CoreBus {
                bus: &mut self.bus,
                sio: &mut self.sio,
                core,
            },
        )
    }

    fn next_alarm_cycles(&self) -> Option<u64> {
        let now = self.clock.now_nanos();
        self.clock
            .nanos_to_next_alarm()
            .map(|delta| nanos_to_cycles(now.saturating_add(delta), self.config.clock_hz))
    }

    /// Runs one cooperative burst: core 0 up to `now + quantum`, then core 1
    /// until it catches up, then the clock. Returns early when a core stops.
    pub fn run_slice(&mut self) -> Option<StopReason> {
        let quantum = self.config.quantum_cycles.max(1);
        let mut target = self.cycles + quantum;

        if self.cores.iter().all(|c| c.waiting) {
            // Nothing fetches: jump to whatever wakes a core first.
            let mut wake = self.next_alarm_cycles();
            for core in &self.cores {
                if let Some(n) = core.systick.cycles_until_fire() {
                    let at = core.cycles + n;
                    wake = Some(wake.map_or(at, |w| w.min(at)));
                }
            }
            target = wake.unwrap_or(target);
        } else if let Some(alarm) = self.next_alarm_cycles() {
            target = target.min(alarm);
        }
        let target = target.max(self.cycles + 1);

        for core in 0..CORE_COUNT {
            if let Some(stop) = self.advance_core(core, target) {
                self.settle_after_stop();
                return Some(stop);
            }
        }

        self.cycles = target;
        self.advance_clock();
        None
    }

    /// Brings chip time up to the furthest core after a slice ended early.
    fn settle_after_stop(&mut self) {
        let reached = self.cores.iter().map(|c| c.cycles).max().unwrap_or(0);
        if reached > self.cycles {
            self.cycles = reached;
            self.advance_clock();
        }
    }

    /// Runs until `cycles` more cycles of chip time elapsed or a core stops.
    pub fn run_cycles(&mut self, cycles: u64) -> StopReason {
        let end = self.cycles.saturating_add(cycles);
        while self.cycles < end {
            if std::mem::take(&mut self.stop_requested) {
                return StopReason::ManualStop;
            }
            let saved = self.config.quantum_cycles;
            self.config.quantum_cycles = saved.min(end - self.cycles);
            let stop = self.run_slice();
            self.config.quantum_cycles = saved;
            if let Some(stop) = stop {
                return stop;
            }
        }
        StopReason::MaxStepsReached
    }

    fn advance_core(&mut self, core: usize, target: u64) -> Option<StopReason> {
        while self.cores[core].cycles < target {
            if self.cores[core].waiting {
                let (cpu, mut view) = self.core_view(core);
                let mut idle = target - cpu.cycles;
                if let Some(n) = cpu.systick.cycles_until_fire() {
                    idle = idle.min(n.max(1));
                }
                cpu.advance_idle(&mut view, idle);
                continue;
            }
            if let Some(stop) = self.execute_one(core, true) {
                return Some(stop);
            }
        }
        None
    }

    fn execute_one(&mut self, core: usize, check_breakpoints: bool) -> Option<StopReason> {
        let pc = self.cores[core].pc();
        if check_breakpoints && self.breakpoints.contains(&pc) {
            return Some(StopReason::Breakpoint(pc));
        }
        if let Some(budget) = self.step_budget.as_mut() {
            if *budget == 0 {
                return Some(StopReason::MaxStepsReached);
            }
            *budget -= 1;
        }

        self.bus
            .set_time(cycles_to_nanos(self.cores[core].cycles, self.config.clock_hz));

        if !self.observers.is_empty() {
            let opcode = self.bus.read_u16(pc) as u32;
            for observer in &self.observers {
                observer.on_step_start(core, pc, opcode);
            }
        }

        let outcome = {
            let (cpu, mut view) = self.core_view(core);
            cpu.step(&mut view)
        };
        self.after_step(core, outcome)
    }

    fn after_step(&mut self, core: usize, outcome: StepOutcome) -> Option<StopReason> {
        for observer in &self.observers {
            observer.on_step_end(core, outcome.cycles);
        }

        self.apply_timer_commands();
        self.sync_irqs();

        if outcome.sev {
            self.cores[core ^ 1].signal_event();
        }
        if let Some(link) = outcome.branch_link {
            for observer in &self.observers {
                observer.on_branch_link(core, link.target, link.blx);
            }
        }
        if let Some(code) = outcome.break_code {
            for observer in &self.observers {
                observer.on_break(core, code);
            }
            self.selected_core = core;
            return Some(StopReason::BreakInstruction(code));
        }
        None
    }

    fn apply_timer_commands(&mut self) {
        let commands = self.bus.take_timer_commands();
        apply_timer_commands(&mut self.clock, &mut self.timers, commands);
    }

    /// Moves the clock up to chip time and delivers every alarm due on the way.
    fn advance_clock(&mut self) {
        let target = cycles_to_nanos(self.cycles, self.config.clock_hz);
        let now = self.clock.now_nanos();
        if target > now {
            let bus = &mut self.bus;
            let timers = &mut self.timers;
            self.clock.advance(target - now, |clock, event| match event {
                ChipEvent::Peripheral { slot, token } => {
                    timers.remove(&(slot, token));
                    bus.dispatch_timer(slot, token, clock.now_nanos());
                    let commands = bus.take_timer_commands();
                    apply_timer_commands(clock, timers, commands);
                }
            });
        }
        self.sync_irqs();
    }

    /// Propagates peripheral line changes to both NVICs and each core's SIO
    /// FIFO line to that core.
    fn sync_irqs(&mut self) {
        if let Some(level) = self.bus.irq.take_changed() {
            self.apply_irq_level(level);
        }
        for core in 0..CORE_COUNT {
            let high = self.sio.irq_level(core);
            if high != self.sio_irq_level[core] {
                self.sio_irq_level[core] = high;
                let (cpu, mut view) = self.core_view(core);
                cpu.set_interrupt(&mut view, SIO_IRQ_PROC0 + core as u32, high);
            }
        }
    }

    fn apply_irq_level(&mut self, level: u32) {
        let changed = (level ^ self.irq_level) & ((1 << HARDWARE_IRQ_LINES) - 1);
        self.irq_level = level;
        if changed == 0 {
            return;
        }
        for line in 0..HARDWARE_IRQ_LINES {
            if changed & (1 << line) == 0 {
                continue;
            }
            let high = level & (1 << line) != 0;
            for core in 0..CORE_COUNT {
                let (cpu, mut view) = self.core_view(core);
                cpu.set_interrupt(&mut view, line, high);
            }
        }
    }

    pub fn snapshot(&self) -> ChipSnapshot {
        ChipSnapshot {
            cycles: self.cycles,
            now_nanos: self.clock.now_nanos(),
            cores: self.cores.iter().map(CoreSnapshot::from_core).collect(),
            sio: serde_json::to_value(&self.sio).unwrap_or(serde_json::Value::Null),
            peripherals: self
                .bus
                .peripherals()
                .iter()
                .map(|p| (p.name.clone(), p.dev.snapshot()))
                .collect(),
        }
    }
}

fn apply_timer_commands<C: Clock<Event = ChipEvent>>(
    clock: &mut C,
    timers: &mut HashMap<(usize, u32), TimerHandle>,
    commands: Vec<TimerCommand>,
) {
    for command in commands {
        match command {
            TimerCommand::Schedule {
                slot,
                token,
                deadline_nanos,
            } => {
                if let Some(old) = timers.remove(&(slot, token)) {
                    clock.cancel_timer(old);
                }
                let delta = deadline_nanos.saturating_sub(clock.now_nanos());
                let handle = clock.create_timer(delta, ChipEvent::Peripheral { slot, token });
                timers.insert((slot, token), handle);
            }
            TimerCommand::Cancel { slot, token } => {
                if let Some(old) = timers.remove(&(slot, token)) {
                    clock.cancel_timer(old);
                }
            }
        }
    }
}

impl<C: Clock<Event = ChipEvent>> DebugControl for Rp2040<C> {
    fn add_breakpoint(&mut self, addr: u32) {
        self.breakpoints.insert(addr & !1);
    }

    fn remove_breakpoint(&mut self, addr: u32) {
        self.breakpoints.remove(&(addr & !1));
    }

    fn clear_breakpoints(&mut self) {
        self.breakpoints.clear();
    }

    fn run(&mut self, max_steps: Option<u32>) -> SimResult<StopReason> {
        self.step_budget = max_steps.map(u64::from);
        for observer in &self.observers {
            observer.on_simulation_start();
        }

        let reason = loop {
            if std::mem::take(&mut self.stop_requested) {
                break StopReason::ManualStop;
            }
            let idle = self.cores.iter().all(|c| c.waiting);
            if let Some(stop) = self.run_slice() {
                break stop;
            }
            // Sleeping slices fetch nothing, so they draw on the budget here.
            if idle {
                if let Some(budget) = self.step_budget.as_mut() {
                    if *budget == 0 {
                        break StopReason::MaxStepsReached;
                    }
                    *budget -= 1;
                }
            }
        };

        self.step_budget = None;
        for observer in &self.observers {
            observer.on_simulation_stop();
        }
        if let StopReason::Breakpoint(pc) = reason {
            self.logger
                .debug(SOURCE, format_args!("Breakpoint hit at {:#010x}", pc));
        }
        Ok(reason)
    }

    fn step_single(&mut self) -> SimResult<StopReason> {
        let core = self.selected_core;
        if self.cores[core].waiting {
            // A sleeping core only moves with time.
            return Ok(self.run_slice().unwrap_or(StopReason::StepDone));
        }

        if let Some(stop) = self.execute_one(core, false) {
            return Ok(stop);
        }

        let now = self.cores[core].cycles;
        let other = core ^ 1;
        if let Some(stop) = self.advance_core(other, now) {
            return Ok(stop);
        }
        if now > self.cycles {
            self.cycles = now;
            self.advance_clock();
        }
        Ok(StopReason::StepDone)
    }

    fn read_core_reg(&self, id: u8) -> SimResult<u32> {
        self.cores[self.selected_core].read_debug_reg(id)
    }

    fn write_core_reg(&mut self, id: u8, val: u32) -> SimResult<()> {
        self.cores[self.selected_core].write_debug_reg(id, val)
    }

    fn read_memory(&mut self, addr: u32, len: usize) -> SimResult<Vec<u8>> {
        let core = self.selected_core;
        let (cpu, mut view) = self.core_view(core);
        Ok((0..len as u32)
            .map(|i| cpu.read8(&mut view, addr.wrapping_add(i)))
            .collect())
    }

    fn write_memory(&mut self, addr: u32, data: &[u8]) -> SimResult<()> {
        let core = self.selected_core;
        let (cpu, mut view) = self.core_view(core);
        for (i, byte) in data.iter().enumerate() {
            cpu.write8(&mut view, addr.wrapping_add(i as u32), *byte);
        }
        Ok(())
    }

    fn get_pc(&self) -> u32 {
        self.cores[self.selected_core].pc()
    }

    fn set_pc(&mut self, addr: u32) {
        self.cores[self.selected_core].regs.set_pc(addr & !1);
    }

    fn get_register_names(&self) -> Vec<String> {
        let mut names: Vec<String> = (0..13).map(|i| format!("r{}", i)).collect();
        names.extend(["sp", "lr", "pc"].iter().map(|s| s.to_string()));
        for (id, name) in [
            (DEBUG_REG_XPSR, "xpsr"),
            (DEBUG_REG_MSP, "msp"),
            (DEBUG_REG_PSP, "psp"),
            (DEBUG_REG_PRIMASK, "primask"),
            (DEBUG_REG_CONTROL, "control"),
        ] {
            debug_assert_eq!(names.len(), id as usize);
            names.push(name.to_string());
        }
        names
    }

    fn get_cycle_count(&self) -> u64 {
        self.cores[self.selected_core].cycles
    }

    fn reset(&mut self) -> SimResult<()> {
        self.reset_cores(None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NullLogger;
    use crate::memory::SRAM_BASE;
    use crate::peripherals::timer::Timer;

    const CODE: u32 = SRAM_BASE + 0x100;
    const STACK: u32 = SRAM_BASE + 0x1000;

    fn chip_with(code: &[u16]) -> Rp2040 {
        let logger: SharedLogger = Arc::new(NullLogger);
        let mut bus = MemoryBus::new(logger.clone());
        for (i, half) in code.iter().enumerate() {
            bus.write_u16(CODE + 2 * i as u32, *half);
        }
        let mut chip = Rp2040::new(bus, SimulationConfig::default(), logger);
        chip.boot_at(STACK, CODE);
        chip
    }

    #[test]
    fn test_boot_at_parks_core1() {
        let chip = chip_with(&[0xE7FE]);
        assert_eq!(chip.cores[0].pc(), CODE);
        assert_eq!(chip.cores[0].regs.sp(), STACK);
        assert!(!chip.cores[0].waiting);
        assert!(chip.cores[1].waiting);
    }

    #[test]
    fn test_run_slice_advances_chip_time_and_clock() {
        // b .
        let mut chip = chip_with(&[0xE7FE]);
        assert!(chip.run_slice().is_none());
        assert_eq!(chip.cycles(), 1000);
        assert!(chip.cores[0].cycles >= 1000);
        assert_eq!(chip.cores[1].cycles, 1000);
        assert_eq!(chip.now_nanos(), 8_000);
    }

    #[test]
    fn test_sev_wakes_core_parked_in_wfe() {
        // sev; b .
        let mut chip = chip_with(&[0xBF40, 0xE7FE]);
        chip.cores[1].regs.set_pc(CODE + 2);
        assert!(chip.run_slice().is_none());
        assert!(!chip.cores[1].waiting);
    }

    #[test]
    fn test_bkpt_stops_run_with_code() {
        // movs r0, #1; bkpt #0x42
        let mut chip = chip_with(&[0x2001, 0xBE42]);
        let reason = chip.run(None).unwrap();
        assert_eq!(reason, StopReason::BreakInstruction(0x42));
        assert_eq!(chip.read_core_reg(0).unwrap(), 1);
    }

    #[test]
    fn test_breakpoint_and_max_steps() {
        // movs r0, #1; movs r1, #2; b .
        let mut chip = chip_with(&[0x2001, 0x2102, 0xE7FE]);
        chip.add_breakpoint(CODE + 2);
        assert_eq!(chip.run(None).unwrap(), StopReason::Breakpoint(CODE + 2));
        chip.clear_breakpoints();
        assert_eq!(chip.run(Some(3)).unwrap(), StopReason::MaxStepsReached);
        assert_eq!(chip.read_core_reg(1).unwrap(), 2);
    }

    #[test]
    fn test_run_with_budget_returns_when_both_cores_sleep() {
        // wfi; b .
        let mut chip = chip_with(&[0xBF30, 0xE7FE]);
        assert_eq!(chip.run(Some(10)).unwrap(), StopReason::MaxStepsReached);
        assert!(chip.cores[0].waiting);
        assert!(chip.cores[1].waiting);
        assert!(chip.cycles() > 0);
    }

    #[test]
    fn test_early_stop_brings_chip_time_forward() {
        // movs r0, #1; movs r0, #2; movs r0, #3; bkpt #1
        let mut chip = chip_with(&[0x2001, 0x2002, 0x2003, 0xBE01]);
        assert_eq!(chip.run(None).unwrap(), StopReason::BreakInstruction(1));
        assert!(chip.cores[0].cycles >= 4);
        assert_eq!(chip.cycles(), chip.cores[0].cycles);
        assert_eq!(
            chip.now_nanos(),
            cycles_to_nanos(chip.cycles(), chip.config.clock_hz)
        );
    }

    #[test]
    fn test_step_single_keeps_other_core_in_step() {
        let mut chip = chip_with(&[0x2001, 0x2102, 0xE7FE]);
        assert_eq!(chip.step_single().unwrap(), StopReason::StepDone);
        assert_eq!(chip.get_pc(), CODE + 2);
        assert_eq!(chip.cycles(), chip.cores[0].cycles);
        assert!(chip.cores[1].cycles >= chip.cores[0].cycles);
    }

    #[test]
    fn test_sio_cpuid_through_core_view() {
        // ldr r1, [pc, #0]; b over the literal; .word SIO_BASE; ldr r0, [r1, #0]
        let mut chip = chip_with(&[0x4900, 0xE001, 0x0000, 0xD000, 0x6808, 0xE7FE]);
        chip.write_core_reg(0, 0xFF).unwrap();
        for _ in 0..3 {
            chip.step_single().unwrap();
        }
        assert_eq!(chip.read_core_reg(1).unwrap(), SIO_BASE);
        assert_eq!(chip.read_core_reg(0).unwrap(), 0);
    }

    #[test]
    fn test_debug_memory_access_is_byte_granular() {
        let mut chip = chip_with(&[0xE7FE]);
        chip.write_memory(SRAM_BASE + 0x10, &[1, 2, 3]).unwrap();
        assert_eq!(chip.read_memory(SRAM_BASE + 0x10, 4).unwrap(), vec![1, 2, 3, 0]);
        assert!(chip.select_core(2).is_err());
        assert_eq!(chip.get_register_names().len(), 21);
    }

    #[test]
    fn test_timer_alarm_raises_irq_on_both_cores() {
        let logger: SharedLogger = Arc::new(NullLogger);
        let mut bus = MemoryBus::new(logger.clone());
        bus.add_peripheral(0x4005_4000, Box::new(Timer::new("TIMER", 0)));
        // b .
        bus.write_u16(CODE, 0xE7FE);
        let mut chip = Rp2040::new(bus, SimulationConfig::default(), logger);
        chip.boot_at(STACK, CODE);

        // INTE = 1, ALARM0 = now + 10us
        chip.bus.write_u32(0x4005_4038, 1);
        chip.bus.write_u32(0x4005_4010, 10);
        chip.apply_timer_commands();
        assert_eq!(chip.clock.nanos_to_next_alarm(), Some(10_000));

        chip.run_cycles(2_000);
        assert!(chip.bus.irq.is_high(0));
        assert_ne!(chip.cores[0].nvic.pending & 1, 0);
        assert_ne!(chip.cores[1].nvic.pending & 1, 0);
    }

    #[test]
    fn test_idle_chip_jumps_to_next_alarm() {
        let logger: SharedLogger = Arc::new(NullLogger);
        let mut bus = MemoryBus::new(logger.clone());
        bus.add_peripheral(0x4005_4000, Box::new(Timer::new("TIMER", 0)));
        let mut chip = Rp2040::new(bus, SimulationConfig::default(), logger);
        chip.boot_at(STACK, CODE);
        chip.cores[0].waiting = true;

        chip.bus.write_u32(0x4005_4010, 100);
        chip.apply_timer_commands();
        assert!(chip.run_slice().is_none());
        // 100us at 125 MHz
        assert_eq!(chip.cycles(), 12_500);
        assert_eq!(chip.clock.nanos_to_next_alarm(), None);
    }

    #[test]
    fn test_snapshot_contains_both_cores() {
        let chip = chip_with(&[0xE7FE]);
        let snapshot = chip.snapshot();
        assert_eq!(snapshot.cores.len(), 2);
        assert_eq!(snapshot.cores[0].registers[15], CODE);
        assert!(snapshot.cores[1].waiting);
    }
}
