// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::logging::SharedLogger;
use crate::memory::{
    LinearMemory, ProgramImage, BOOTROM_WORDS, FLASH_BASE, FLASH_SIZE, SRAM_BASE, SRAM_SIZE,
};
use crate::peripherals::timer::Timer;
use crate::peripherals::unimplemented::UnimplementedPeripheral;
use crate::peripherals::{AtomicKind, IrqLines, Peripheral, PeripheralContext, TimerCommand};
use crate::{Bus, SimResult, SimulationError};
use picosim_config::{ChipDescriptor, PeripheralKind};
use std::collections::HashMap;

const SOURCE: &str = "MemoryBus";

/// Size of the address window owned by one peripheral (4 KiB registers
/// plus the XOR/set/clear aliases).
pub const PERIPHERAL_WINDOW_SHIFT: u32 = 14;
const BOOTROM_END: u32 = (BOOTROM_WORDS * 4) as u32;

/// Single-cell behaviour for addresses outside every memory and peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusHook {
    /// Read-only value, writes are ignored.
    Constant(u32),
    /// Plain read/write storage cell.
    Scratch(u32),
}

pub struct PeripheralEntry {
    pub name: String,
    pub base: u32,
    pub dev: Box<dyn Peripheral>,
}

/// The shared system bus: boot ROM, flash, SRAM and the APB/AHB peripherals.
///
/// SIO and the per-core PPB are not reachable from here; the chip's per-core
/// bus view and the core itself serve those ranges.
pub struct MemoryBus {
    bootrom: Vec<u32>,
    pub flash: LinearMemory,
    pub sram: LinearMemory,
    peripherals: Vec<PeripheralEntry>,
    peripheral_index: HashMap<u32, usize>,
    hooks: HashMap<u32, BusHook>,
    pub irq: IrqLines,
    timer_commands: Vec<TimerCommand>,
    now_nanos: u64,
    logger: SharedLogger,
}

impl std::fmt::Debug for MemoryBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBus")
            .field("flash", &self.flash)
            .field("sram", &self.sram)
            .field("peripherals", &self.peripherals.len())
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

impl MemoryBus {
    /// An empty RP2040 memory map: no peripherals, no hooks.
    pub fn new(logger: SharedLogger) -> Self {
        Self {
            bootrom: vec![0; BOOTROM_WORDS],
            flash: LinearMemory::new(FLASH_SIZE, FLASH_BASE, 0xFF),
            sram: LinearMemory::new(SRAM_SIZE, SRAM_BASE, 0),
            peripherals: Vec::new(),
            peripheral_index: HashMap::new(),
            hooks: HashMap::new(),
            irq: IrqLines::default(),
            timer_commands: Vec::new(),
            now_nanos: 0,
            logger,
        }
    }

    pub fn from_config(chip: &ChipDescriptor, logger: SharedLogger) -> anyhow::Result<Self> {
        chip.validate()?;
        let mut bus = Self::new(logger);

        for p_cfg in &chip.peripherals {
            let dev: Box<dyn Peripheral> = match p_cfg.r#type {
                PeripheralKind::Timer => {
                    Box::new(Timer::new(p_cfg.id.clone(), p_cfg.irq.unwrap_or(0)))
                }
                PeripheralKind::Unimplemented => {
                    Box::new(UnimplementedPeripheral::new(p_cfg.id.clone()))
                }
            };
            bus.add_peripheral(p_cfg.base_address, dev);
        }

        for constant in &chip.constants {
            bus.add_hook(constant.address, BusHook::Constant(constant.value));
        }

        Ok(bus)
    }

    pub fn logger(&self) -> &SharedLogger {
        &self.logger
    }

    /// Maps `dev` at `base` and returns its slot (used as the timer owner id).
    pub fn add_peripheral(&mut self, base: u32, dev: Box<dyn Peripheral>) -> usize {
        let slot = self.peripherals.len();
        self.peripheral_index
            .insert(base >> PERIPHERAL_WINDOW_SHIFT, slot);
        self.peripherals.push(PeripheralEntry {
            name: dev.name().to_string(),
            base,
            dev,
        });
        slot
    }

    pub fn add_hook(&mut self, addr: u32, hook: BusHook) {
        self.hooks.insert(addr & !3, hook);
    }

    pub fn peripherals(&self) -> &[PeripheralEntry] {
        &self.peripherals
    }

    pub fn find_peripheral(&self, name: &str) -> Option<&PeripheralEntry> {
        self.peripherals.iter().find(|p| p.name == name)
    }

    /// Time seen by peripherals during the accesses that follow.
    pub fn set_time(&mut self, now_nanos: u64) {
        self.now_nanos = now_nanos;
    }

    pub fn take_timer_commands(&mut self) -> Vec<TimerCommand> {
        std::mem::take(&mut self.timer_commands)
    }

    /// Delivers a fired clock timer to the peripheral that scheduled it.
    pub fn dispatch_timer(&mut self, slot: usize, token: u32, now_nanos: u64) {
        if let Some(entry) = self.peripherals.get_mut(slot) {
            let mut ctx = PeripheralContext::new(
                now_nanos,
                slot,
                &mut self.timer_commands,
                &mut self.irq,
                &*self.logger,
            );
            entry.dev.on_timer(token, &mut ctx);
        }
    }

    pub fn bootrom(&self) -> &[u32] {
        &self.bootrom
    }

    pub fn load_bootrom(&mut self, words: &[u32]) -> SimResult<()> {
        if words.len() > BOOTROM_WORDS {
            return Err(SimulationError::ImageOutOfRange {
                addr: 0,
                len: words.len() * 4,
            });
        }
        self.bootrom[..words.len()].copy_from_slice(words);
        Ok(())
    }

    /// Copies every segment into boot ROM, flash or SRAM.
    pub fn load_image(&mut self, image: &ProgramImage) -> SimResult<()> {
        for segment in &image.segments {
            let len = segment.data.len();
            let end = segment.start_addr as u64 + len as u64;
            let loaded = if end <= BOOTROM_END as u64 {
                for (i, byte) in segment.data.iter().enumerate() {
                    let addr = segment.start_addr as usize + i;
                    let word = &mut self.bootrom[addr / 4];
                    let shift = (addr % 4) * 8;
                    *word = (*word & !(0xFF << shift)) | ((*byte as u32) << shift);
                }
                true
            } else {
                self.flash.load_from_segment(segment) || self.sram.load_from_segment(segment)
            };
            if !loaded {
                return Err(SimulationError::ImageOutOfRange {
                    addr: segment.start_addr,
                    len,
                });
            }
        }
        Ok(())
    }

    fn peripheral_slot(&self, addr: u32) -> Option<usize> {
        if self.peripheral_index.is_empty() {
            return None;
        }
        self.peripheral_index
            .get(&(addr >> PERIPHERAL_WINDOW_SHIFT))
            .copied()
    }

    fn with_peripheral<R>(
        &mut self,
        slot: usize,
        raw_write_value: u32,
        f: impl FnOnce(&mut dyn Peripheral, &mut PeripheralContext<'_>) -> R,
    ) -> R {
        let entry = &mut self.peripherals[slot];
        let mut ctx = PeripheralContext::new(
            self.now_nanos,
            slot,
            &mut self.timer_commands,
            &mut self.irq,
            &*self.logger,
        )
        .with_raw_write_value(raw_write_value);
        f(entry.dev.as_mut(), &mut ctx)
    }

    fn align(&self, addr: u32, mask: u32, width: u32) -> u32 {
        if addr & mask != 0 {
            self.logger.warn(
                SOURCE,
                format_args!("Unaligned {}-bit access at {:#010x}", width, addr),
            );
        }
        addr & !mask
    }

    pub fn read_u32(&mut self, addr: u32) -> u32 {
        let addr = self.align(addr, 3, 32);
        if addr < BOOTROM_END {
            return self.bootrom[(addr >> 2) as usize];
        }
        if let Some(slot) = self.peripheral_slot(addr) {
            return self.with_peripheral(slot, 0, |dev, ctx| dev.read_u32(addr & 0x3FFF, ctx));
        }
        if let Some(v) = self.flash.read_u32(addr) {
            return v;
        }
        if let Some(v) = self.sram.read_u32(addr) {
            return v;
        }
        match self.hooks.get(&addr) {
            Some(BusHook::Constant(v)) | Some(BusHook::Scratch(v)) => *v,
            None => {
                self.logger.warn(
                    SOURCE,
                    format_args!("Read from invalid memory address: {:#010x}", addr),
                );
                0xFFFF_FFFF
            }
        }
    }

    pub fn read_u16(&mut self, addr: u32) -> u16 {
        let addr = self.align(addr, 1, 16);
        if let Some(v) = self.sram.read_u16(addr).or_else(|| self.flash.read_u16(addr)) {
            return v;
        }
        let word = self.read_u32(addr & !3);
        (word >> ((addr & 2) * 8)) as u16
    }

    pub fn read_u8(&mut self, addr: u32) -> u8 {
        if let Some(v) = self.sram.read_u8(addr).or_else(|| self.flash.read_u8(addr)) {
            return v;
        }
        let half = self.read_u16(addr & !1);
        (half >> ((addr & 1) * 8)) as u8
    }

    pub fn write_u32(&mut self, addr: u32, value: u32) {
        let addr = self.align(addr, 3, 32);
        if addr < BOOTROM_END {
            self.logger.warn(
                SOURCE,
                format_args!("Write to boot ROM ignored: {:#010x}", addr),
            );
            return;
        }
        if let Some(slot) = self.peripheral_slot(addr) {
            let kind = AtomicKind::from_address(addr);
            self.with_peripheral(slot, value, |dev, ctx| {
                dev.write_u32_atomic(addr & 0xFFF, value, kind, ctx)
            });
            return;
        }
        if self.flash.write_u32(addr, value) || self.sram.write_u32(addr, value) {
            return;
        }
        match self.hooks.get_mut(&addr) {
            Some(BusHook::Scratch(cell)) => *cell = value,
            Some(BusHook::Constant(_)) => {}
            None => self.logger.warn(
                SOURCE,
                format_args!(
                    "Write to undefined address: {:#010x} (value {:#x})",
                    addr, value
                ),
            ),
        }
    }

    pub fn write_u16(&mut self, addr: u32, value: u16) {
        let addr = self.align(addr, 1, 16);
        if self.sram.write_u16(addr, value) || self.flash.write_u16(addr, value) {
            return;
        }
        if self.peripheral_slot(addr).is_some() {
            self.write_u32(addr & !3, (value as u32) * 0x0001_0001);
            return;
        }
        let aligned = addr & !3;
        let shift = (addr & 2) * 8;
        let word = self.read_u32(aligned);
        self.write_u32(
            aligned,
            (word & !(0xFFFF << shift)) | ((value as u32) << shift),
        );
    }

    pub fn write_u8(&mut self, addr: u32, value: u8) {
        if self.sram.write_u8(addr, value) || self.flash.write_u8(addr, value) {
            return;
        }
        if self.peripheral_slot(addr).is_some() {
            self.write_u32(addr & !3, (value as u32) * 0x0101_0101);
            return;
        }
        let aligned = addr & !3;
        let shift = (addr & 3) * 8;
        let word = self.read_u32(aligned);
        self.write_u32(aligned, (word & !(0xFF << shift)) | ((value as u32) << shift));
    }
}

impl Bus for MemoryBus {
    fn read_u8(&mut self, addr: u32) -> u8 {
        MemoryBus::read_u8(self, addr)
    }

    fn read_u16(&mut self, addr: u32) -> u16 {
        MemoryBus::read_u16(self, addr)
    }

    fn read_u32(&mut self, addr: u32) -> u32 {
        MemoryBus::read_u32(self, addr)
    }

    fn write_u8(&mut self, addr: u32, value: u8) {
        MemoryBus::write_u8(self, addr, value)
    }

    fn write_u16(&mut self, addr: u32, value: u16) {
        MemoryBus::write_u16(self, addr, value)
    }

    fn write_u32(&mut self, addr: u32, value: u32) {
        MemoryBus::write_u32(self, addr, value)
    }
}
