// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! The RP2040 register map as firmware sees it through the bus.

use picosim_config::ChipDescriptor;
use picosim_core::bus::MemoryBus;
use picosim_core::logging::{LogLevel, RecordingLogger};
use std::sync::Arc;

fn rp2040_bus() -> (MemoryBus, Arc<RecordingLogger>) {
    let logger = Arc::new(RecordingLogger::new());
    let bus = MemoryBus::from_config(&ChipDescriptor::rp2040(), logger.clone()).unwrap();
    (bus, logger)
}

#[test]
fn test_sysinfo_constants() {
    let (mut bus, logger) = rp2040_bus();
    assert_eq!(bus.read_u32(0x4000_0000), 0x1000_2927);
    assert_eq!(bus.read_u32(0x4000_0004), 0x0000_0002);
    assert_eq!(bus.read_u32(0x4000_0040), 0);

    // Writes are ignored.
    bus.write_u32(0x4000_0000, 0);
    assert_eq!(bus.read_u32(0x4000_0000), 0x1000_2927);
    assert_eq!(logger.count(LogLevel::Warn), 0);
}

#[test]
fn test_every_block_is_mapped() {
    let chip = ChipDescriptor::rp2040();
    let (bus, _) = rp2040_bus();
    for p in &chip.peripherals {
        let entry = bus
            .find_peripheral(&p.id)
            .unwrap_or_else(|| panic!("{} is not mapped", p.id));
        assert_eq!(entry.base, p.base_address, "{}", p.id);
    }
}

#[test]
fn test_unimplemented_block_reads_all_ones_and_warns() {
    let (mut bus, logger) = rp2040_bus();

    assert_eq!(bus.read_u32(0x4003_4018), 0xFFFF_FFFF);
    let records = logger.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].level, LogLevel::Warn);
    assert_eq!(records[0].source, "uart0");

    logger.clear();
    bus.write_u32(0x4003_4000, 0x41);
    assert_eq!(logger.count(LogLevel::Warn), 1);
}

#[test]
fn test_timer_counts_microseconds() {
    let (mut bus, logger) = rp2040_bus();
    bus.set_time(12_345_000);
    assert_eq!(bus.read_u32(0x4005_4028), 12_345);
    assert_eq!(bus.read_u32(0x4005_4024), 0);
    assert_eq!(logger.count(LogLevel::Warn), 0);
}

#[test]
fn test_unmapped_address_reads_all_ones() {
    let (mut bus, logger) = rp2040_bus();
    assert_eq!(bus.read_u32(0x6000_0000), 0xFFFF_FFFF);
    assert_eq!(logger.count(LogLevel::Warn), 1);
    assert!(logger.records()[0]
        .message
        .contains("Read from invalid memory address"));
}
