// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod systick;
pub mod timer;
pub mod unimplemented;

use serde::Serialize;

/// Write flavour selected by address bits [13:12] of a peripheral access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AtomicKind {
    Normal,
    Xor,
    Set,
    Clear,
}

impl AtomicKind {
    pub fn from_address(addr: u32) -> Self {
        match (addr >> 12) & 0x3 {
            1 => AtomicKind::Xor,
            2 => AtomicKind::Set,
            3 => AtomicKind::Clear,
            _ => AtomicKind::Normal,
        }
    }
}

pub fn atomic_update(current: u32, kind: AtomicKind, value: u32) -> u32 {
    match kind {
        AtomicKind::Xor => current ^ value,
        AtomicKind::Set => current | value,
        AtomicKind::Clear => current & !value,
        AtomicKind::Normal => value,
    }
}

/// Level of the 32 shared interrupt lines driven by bus peripherals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IrqLines {
    level: u32,
    dirty: bool,
}

impl IrqLines {
    pub fn set(&mut self, line: u32, high: bool) {
        if line >= 32 {
            return;
        }
        let prev = self.level;
        if high {
            self.level |= 1 << line;
        } else {
            self.level &= !(1 << line);
        }
        self.dirty |= prev != self.level;
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn is_high(&self, line: u32) -> bool {
        line < 32 && self.level & (1 << line) != 0
    }

    /// Returns the level if it changed since the last call.
    pub fn take_changed(&mut self) -> Option<u32> {
        if std::mem::take(&mut self.dirty) {
            Some(self.level)
        } else {
            None
        }
    }
}

/// Timer request issued by a peripheral, applied to the clock by the chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCommand {
    /// Replaces any pending timer of the same `(slot, token)`.
    Schedule {
        slot: usize,
        token: u32,
        deadline_nanos: u64,
    },
    Cancel {
        slot: usize,
        token: u32,
    },
}

/// What a peripheral may touch besides its own registers.
pub struct PeripheralContext<'a> {
    now_nanos: u64,
    slot: usize,
    raw_write_value: u32,
    timers: &'a mut Vec<TimerCommand>,
    irq: &'a mut IrqLines,
    logger: &'a dyn crate::logging::Logger,
}

impl<'a> PeripheralContext<'a> {
    pub fn new(
        now_nanos: u64,
        slot: usize,
        timers: &'a mut Vec<TimerCommand>,
        irq: &'a mut IrqLines,
        logger: &'a dyn crate::logging::Logger,
    ) -> Self {
        Self {
            now_nanos,
            slot,
            raw_write_value: 0,
            timers,
            irq,
            logger,
        }
    }

    pub fn with_raw_write_value(mut self, value: u32) -> Self {
        self.raw_write_value = value;
        self
    }

    pub fn now_nanos(&self) -> u64 {
        self.now_nanos
    }

    pub fn now_micros(&self) -> u64 {
        self.now_nanos / 1000
    }

    /// The value the CPU actually wrote, before any atomic alias was applied.
    pub fn raw_write_value(&self) -> u32 {
        self.raw_write_value
    }

    pub fn schedule(&mut self, delta_nanos: u64, token: u32) {
        self.timers.push(TimerCommand::Schedule {
            slot: self.slot,
            token,
            deadline_nanos: self.now_nanos.saturating_add(delta_nanos),
        });
    }

    pub fn cancel(&mut self, token: u32) {
        self.timers.push(TimerCommand::Cancel {
            slot: self.slot,
            token,
        });
    }

    pub fn set_irq(&mut self, line: u32, high: bool) {
        self.irq.set(line, high);
    }

    pub fn logger(&self) -> &dyn crate::logging::Logger {
        self.logger
    }
}

/// A memory-mapped block on the APB/AHB bus. Offsets are relative to the
/// peripheral's base address; every access is a full 32-bit register access.
pub trait Peripheral: std::fmt::Debug + Send {
    fn name(&self) -> &str;

    fn read_u32(&mut self, offset: u32, ctx: &mut PeripheralContext<'_>) -> u32;

    fn write_u32(&mut self, offset: u32, value: u32, ctx: &mut PeripheralContext<'_>);

    fn write_u32_atomic(
        &mut self,
        offset: u32,
        value: u32,
        kind: AtomicKind,
        ctx: &mut PeripheralContext<'_>,
    ) {
        let new_value = match kind {
            AtomicKind::Normal => value,
            _ => atomic_update(self.read_u32(offset, ctx), kind, value),
        };
        self.write_u32(offset, new_value, ctx);
    }

    /// Called when a timer scheduled through the context fires.
    fn on_timer(&mut self, _token: u32, _ctx: &mut PeripheralContext<'_>) {}

    fn snapshot(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_kind_from_alias() {
        assert_eq!(AtomicKind::from_address(0x4005_4000), AtomicKind::Normal);
        assert_eq!(AtomicKind::from_address(0x4005_5000), AtomicKind::Xor);
        assert_eq!(AtomicKind::from_address(0x4005_6000), AtomicKind::Set);
        assert_eq!(AtomicKind::from_address(0x4005_7000), AtomicKind::Clear);
    }

    #[test]
    fn test_atomic_update() {
        assert_eq!(atomic_update(0xff, AtomicKind::Xor, 0x0f), 0xf0);
        assert_eq!(atomic_update(0xf0, AtomicKind::Set, 0x0f), 0xff);
        assert_eq!(atomic_update(0xff, AtomicKind::Clear, 0x0f), 0xf0);
        assert_eq!(atomic_update(0xff, AtomicKind::Normal, 0x0f), 0x0f);
    }

    #[test]
    fn test_irq_lines_report_changes_once() {
        let mut lines = IrqLines::default();
        lines.set(3, true);
        assert_eq!(lines.take_changed(), Some(1 << 3));
        assert_eq!(lines.take_changed(), None);
        lines.set(3, true);
        assert_eq!(lines.take_changed(), None);
        lines.set(3, false);
        assert_eq!(lines.take_changed(), Some(0));
        lines.set(40, true);
        assert_eq!(lines.level(), 0);
    }
}
