// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

#![allow(dead_code)]

pub mod asm;

use picosim_core::logging::{NullLogger, SharedLogger};
use std::sync::Arc;

pub fn quiet() -> SharedLogger {
    Arc::new(NullLogger)
}
