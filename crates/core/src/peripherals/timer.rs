// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::unimplemented::{unimplemented_read, unimplemented_write};
use super::{Peripheral, PeripheralContext};

const TIMEHR: u32 = 0x08;
const TIMELR: u32 = 0x0c;
const ALARM0: u32 = 0x10;
const ALARM3: u32 = 0x1c;
const ARMED: u32 = 0x20;
const TIMERAWH: u32 = 0x24;
const TIMERAWL: u32 = 0x28;
const PAUSE: u32 = 0x30;
const INTR: u32 = 0x34;
const INTE: u32 = 0x38;
const INTF: u32 = 0x3c;
const INTS: u32 = 0x40;

const ALARM_COUNT: usize = 4;

#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
struct TimerAlarm {
    armed: bool,
    target_micros: u32,
}

/// RP2040 TIMER: a 64-bit microsecond counter with four 32-bit alarms.
///
/// Time is read from the context (the shared clock); alarm `n` is a clock
/// timer with token `n` and drives IRQ line `irq_base + n`.
#[derive(Debug, serde::Serialize)]
pub struct Timer {
    name: String,
    irq_base: u32,
    latched_time_high: u32,
    alarms: [TimerAlarm; ALARM_COUNT],
    int_raw: u32,
    int_enable: u32,
    int_force: u32,
    paused: bool,
}

impl Timer {
    pub fn new(name: impl Into<String>, irq_base: u32) -> Self {
        Self {
            name: name.into(),
            irq_base,
            latched_time_high: 0,
            alarms: [TimerAlarm::default(); ALARM_COUNT],
            int_raw: 0,
            int_enable: 0,
            int_force: 0,
            paused: false,
        }
    }

    fn int_status(&self) -> u32 {
        (self.int_raw & self.int_enable) | self.int_force
    }

    fn armed_mask(&self) -> u32 {
        self.alarms
            .iter()
            .enumerate()
            .filter(|(_, a)| a.armed)
            .fold(0, |acc, (i, _)| acc | (1 << i))
    }

    fn fire_alarm(&mut self, index: usize, ctx: &mut PeripheralContext<'_>) {
        self.disarm(index, ctx);
        self.int_raw |= 1 << index;
        self.check_interrupts(ctx);
    }

    fn disarm(&mut self, index: usize, ctx: &mut PeripheralContext<'_>) {
        ctx.cancel(index as u32);
        self.alarms[index].armed = false;
    }

    fn check_interrupts(&self, ctx: &mut PeripheralContext<'_>) {
        let status = self.int_status();
        for i in 0..ALARM_COUNT as u32 {
            ctx.set_irq(self.irq_base + i, status & (1 << i) != 0);
        }
    }
}

impl Peripheral for Timer {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_u32(&mut self, offset: u32, ctx: &mut PeripheralContext<'_>) -> u32 {
        let time = ctx.now_micros();
        match offset {
            TIMEHR => self.latched_time_high,
            TIMELR => {
                self.latched_time_high = (time >> 32) as u32;
                time as u32
            }
            TIMERAWH => (time >> 32) as u32,
            TIMERAWL => time as u32,
            ALARM0..=ALARM3 if offset % 4 == 0 => {
                self.alarms[((offset - ALARM0) / 4) as usize].target_micros
            }
            ARMED => self.armed_mask(),
            PAUSE => self.paused as u32,
            INTR => self.int_raw,
            INTE => self.int_enable,
            INTF => self.int_force,
            INTS => self.int_status(),
            _ => unimplemented_read(&self.name, offset, ctx),
        }
    }

    fn write_u32(&mut self, offset: u32, value: u32, ctx: &mut PeripheralContext<'_>) {
        match offset {
            ALARM0..=ALARM3 if offset % 4 == 0 => {
                let index = ((offset - ALARM0) / 4) as usize;
                let delta_micros = value.wrapping_sub(ctx.now_micros() as u32);
                self.alarms[index] = TimerAlarm {
                    armed: true,
                    target_micros: value,
                };
                ctx.schedule(delta_micros as u64 * 1000, index as u32);
            }
            ARMED => {
                let raw = ctx.raw_write_value();
                for index in 0..ALARM_COUNT {
                    if raw & (1 << index) != 0 {
                        self.disarm(index, ctx);
                    }
                }
            }
            PAUSE => {
                self.paused = value & 1 != 0;
                if self.paused {
                    ctx.logger()
                        .warn(&self.name, format_args!("Unimplemented Timer Pause"));
                }
            }
            INTR => {
                self.int_raw &= !ctx.raw_write_value();
                self.check_interrupts(ctx);
            }
            INTE => {
                self.int_enable = value & 0xf;
                self.check_interrupts(ctx);
            }
            INTF => {
                self.int_force = value & 0xf;
                self.check_interrupts(ctx);
            }
            _ => unimplemented_write(&self.name, offset, value, ctx),
        }
    }

    fn on_timer(&mut self, token: u32, ctx: &mut PeripheralContext<'_>) {
        let index = token as usize;
        if index < ALARM_COUNT {
            self.fire_alarm(index, ctx);
        }
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NullLogger;
    use crate::peripherals::{AtomicKind, IrqLines, TimerCommand};

    struct Harness {
        timers: Vec<TimerCommand>,
        irq: IrqLines,
        logger: NullLogger,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                timers: Vec::new(),
                irq: IrqLines::default(),
                logger: NullLogger,
            }
        }

        fn ctx(&mut self, now_nanos: u64) -> PeripheralContext<'_> {
            PeripheralContext::new(now_nanos, 0, &mut self.timers, &mut self.irq, &self.logger)
        }
    }

    #[test]
    fn test_time_registers_latch_high_word() {
        let mut h = Harness::new();
        let mut timer = Timer::new("timer", 0);
        let now = (5u64 << 32) + 123;
        let mut ctx = h.ctx(now * 1000);
        assert_eq!(timer.read_u32(TIMEHR, &mut ctx), 0);
        assert_eq!(timer.read_u32(TIMELR, &mut ctx), 123);
        assert_eq!(timer.read_u32(TIMEHR, &mut ctx), 5);
        assert_eq!(timer.read_u32(TIMERAWH, &mut ctx), 5);
        assert_eq!(timer.read_u32(TIMERAWL, &mut ctx), 123);
    }

    #[test]
    fn test_alarm_schedules_with_wraparound() {
        let mut h = Harness::new();
        let mut timer = Timer::new("timer", 0);
        {
            let mut ctx = h.ctx(0xFFFF_FFF0 * 1000);
            timer.write_u32(ALARM0 + 8, 0x10, &mut ctx);
            assert_eq!(timer.read_u32(ARMED, &mut ctx), 0b100);
        }
        assert_eq!(
            h.timers,
            vec![TimerCommand::Schedule {
                slot: 0,
                token: 2,
                deadline_nanos: (0xFFFF_FFF0 + 0x20) * 1000,
            }]
        );
    }

    #[test]
    fn test_alarm_fire_raises_irq_and_intr_clears() {
        let mut h = Harness::new();
        let mut timer = Timer::new("timer", 0);
        {
            let mut ctx = h.ctx(0);
            timer.write_u32(INTE, 0x2, &mut ctx);
            timer.write_u32(ALARM0 + 4, 1000, &mut ctx);
            timer.on_timer(1, &mut ctx);
            assert_eq!(timer.read_u32(INTR, &mut ctx), 0x2);
            assert_eq!(timer.read_u32(INTS, &mut ctx), 0x2);
            assert_eq!(timer.read_u32(ARMED, &mut ctx), 0);
        }
        assert!(h.irq.is_high(1));
        {
            let mut ctx = h.ctx(0).with_raw_write_value(0x2);
            timer.write_u32_atomic(INTR, 0x2, AtomicKind::Normal, &mut ctx);
        }
        assert!(!h.irq.is_high(1));
    }

    #[test]
    fn test_armed_write_disarms_by_raw_value() {
        let mut h = Harness::new();
        let mut timer = Timer::new("timer", 0);
        {
            let mut ctx = h.ctx(0);
            timer.write_u32(ALARM0, 10, &mut ctx);
            timer.write_u32(ALARM0 + 4, 10, &mut ctx);
        }
        {
            let mut ctx = h.ctx(0).with_raw_write_value(0x1);
            timer.write_u32_atomic(ARMED, 0x1, AtomicKind::Normal, &mut ctx);
            assert_eq!(timer.read_u32(ARMED, &mut ctx), 0b10);
        }
        assert!(h
            .timers
            .contains(&TimerCommand::Cancel { slot: 0, token: 0 }));
    }

    #[test]
    fn test_force_drives_irq_with_offset_base() {
        let mut h = Harness::new();
        let mut timer = Timer::new("timer", 4);
        {
            let mut ctx = h.ctx(0);
            timer.write_u32(INTF, 0x8, &mut ctx);
        }
        assert!(h.irq.is_high(7));
        assert_eq!(h.irq.level(), 1 << 7);
    }
}
