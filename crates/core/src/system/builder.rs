// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::bus::MemoryBus;
use crate::chip::{Rp2040, DEFAULT_STACK_TOP};
use crate::config::SimulationConfig;
use crate::logging::{LogLevel, SharedLogger, TracingLogger};
use crate::memory::ProgramImage;
use anyhow::Context;
use picosim_config::{BootMode, ChipDescriptor, SystemManifest};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Assembles an [`Rp2040`] from a chip descriptor, the simulation settings
/// and the images to preload.
pub struct ChipBuilder {
    chip: ChipDescriptor,
    config: SimulationConfig,
    boot: BootMode,
    vector_table: Option<u32>,
    gpio_inputs: BTreeMap<u8, bool>,
    bootrom: Option<Vec<u32>>,
    images: Vec<ProgramImage>,
    logger: Option<SharedLogger>,
}

impl std::fmt::Debug for ChipBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChipBuilder")
            .field("chip", &self.chip.name)
            .field("config", &self.config)
            .field("boot", &self.boot)
            .field("vector_table", &self.vector_table)
            .field("gpio_inputs", &self.gpio_inputs)
            .field("bootrom", &self.bootrom.is_some())
            .field("images", &self.images.len())
            .field("custom_logger", &self.logger.is_some())
            .finish()
    }
}

impl Default for ChipBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChipBuilder {
    /// Default RP2040 layout, direct flash boot.
    pub fn new() -> Self {
        Self {
            chip: ChipDescriptor::rp2040(),
            config: SimulationConfig::default(),
            boot: BootMode::default(),
            vector_table: None,
            gpio_inputs: BTreeMap::new(),
            bootrom: None,
            images: Vec::new(),
            logger: None,
        }
    }

    /// Takes everything but the image files from a system manifest; the
    /// caller loads `firmware` and `bootrom` and hands them over.
    pub fn from_manifest(manifest: &SystemManifest) -> anyhow::Result<Self> {
        info!("Loading system manifest: {}", manifest.name);
        let chip = manifest.load_chip()?;

        let mut config = SimulationConfig {
            clock_hz: chip.clock_hz,
            ..SimulationConfig::default()
        };
        if let Some(quantum) = manifest.quantum_cycles {
            config.quantum_cycles = quantum;
        }
        if let Some(level) = &manifest.log_level {
            config.log_level = level
                .parse::<LogLevel>()
                .map_err(|e| anyhow::anyhow!(e))
                .with_context(|| format!("Invalid log level in manifest {}", manifest.name))?;
        }

        Ok(Self {
            chip,
            config,
            boot: manifest.boot,
            vector_table: manifest.vector_table,
            gpio_inputs: manifest.gpio_inputs.clone(),
            ..Self::new()
        })
    }

    pub fn chip(mut self, chip: ChipDescriptor) -> Self {
        self.config.clock_hz = chip.clock_hz;
        self.chip = chip;
        self
    }

    pub fn config(mut self, config: SimulationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn boot(mut self, boot: BootMode) -> Self {
        self.boot = boot;
        self
    }

    pub fn vector_table(mut self, addr: u32) -> Self {
        self.vector_table = Some(addr);
        self
    }

    pub fn gpio_input(mut self, pin: u8, high: bool) -> Self {
        self.gpio_inputs.insert(pin, high);
        self
    }

    pub fn bootrom(mut self, words: Vec<u32>) -> Self {
        self.bootrom = Some(words);
        self
    }

    pub fn image(mut self, image: ProgramImage) -> Self {
        self.images.push(image);
        self
    }

    pub fn logger(mut self, logger: SharedLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn build(self) -> anyhow::Result<Rp2040> {
        let logger = self
            .logger
            .unwrap_or_else(|| TracingLogger::shared(self.config.log_level));

        let mut bus = MemoryBus::from_config(&self.chip, logger.clone())
            .with_context(|| format!("Failed to map chip {}", self.chip.name))?;
        info!(
            "Chip {}: {} peripherals, {} constant registers",
            self.chip.name,
            self.chip.peripherals.len(),
            self.chip.constants.len()
        );

        if let Some(words) = &self.bootrom {
            bus.load_bootrom(words).context("Failed to load boot ROM")?;
        }
        let mut entry_point = None;
        for image in &self.images {
            bus.load_image(image).context("Failed to load program image")?;
            info!(
                "Loaded {} bytes in {} segments, entry {:#010x}",
                image.total_bytes(),
                image.segments.len(),
                image.entry_point
            );
            entry_point.get_or_insert(image.entry_point);
        }

        let mut chip = Rp2040::new(bus, self.config, logger);
        for (pin, high) in &self.gpio_inputs {
            chip.set_gpio_input(*pin as u32, *high);
        }

        match self.boot {
            BootMode::Bootrom => chip.reset_from_bootrom(),
            BootMode::Flash | BootMode::Ram => {
                let vector_table = self
                    .vector_table
                    .unwrap_or_else(|| self.boot.default_vector_table());
                chip.boot_flash(vector_table);
                let pc = chip.cores[0].pc();
                if let Some(entry) = entry_point.filter(|_| pc == 0 || pc == 0xFFFF_FFFE) {
                    warn!(
                        "No vector table at {:#010x}, starting at entry point {:#010x}",
                        vector_table, entry
                    );
                    chip.boot_at(DEFAULT_STACK_TOP, entry);
                }
            }
        }

        Ok(chip)
    }
}
