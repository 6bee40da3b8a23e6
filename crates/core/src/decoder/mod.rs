// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod thumb;

pub use thumb::{decode_thumb_16, decode_thumb_32, is_wide, Instruction};
