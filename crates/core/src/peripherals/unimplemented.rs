// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::{Peripheral, PeripheralContext};

/// Placeholder for a register block that is mapped but not modelled.
#[derive(Debug, Clone, serde::Serialize)]
pub struct UnimplementedPeripheral {
    name: String,
}

impl UnimplementedPeripheral {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Peripheral for UnimplementedPeripheral {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_u32(&mut self, offset: u32, ctx: &mut PeripheralContext<'_>) -> u32 {
        unimplemented_read(&self.name, offset, ctx)
    }

    fn write_u32(&mut self, offset: u32, value: u32, ctx: &mut PeripheralContext<'_>) {
        unimplemented_write(&self.name, offset, value, ctx)
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Default read path shared by partially modelled peripherals.
pub fn unimplemented_read(name: &str, offset: u32, ctx: &PeripheralContext<'_>) -> u32 {
    let log = ctx.logger();
    log.warn(
        name,
        format_args!("Unimplemented peripheral read from {:#x}", offset),
    );
    if offset > 0x1000 {
        log.warn(
            name,
            format_args!("Unimplemented read from peripheral in the atomic operation region"),
        );
    }
    0xffff_ffff
}

pub fn unimplemented_write(name: &str, offset: u32, value: u32, ctx: &PeripheralContext<'_>) {
    ctx.logger().warn(
        name,
        format_args!(
            "Unimplemented peripheral write to {:#x}: {:#x}",
            offset, value
        ),
    );
}
