// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default schema version for YAML configs
fn default_schema_version() -> String {
    "1.0".to_string()
}

fn default_clock_hz() -> u64 {
    125_000_000
}

/// Peripherals are mapped in 16 KiB windows: four 4 KiB alias regions
/// (normal, XOR, set, clear) per register block.
pub const PERIPHERAL_WINDOW: u32 = 0x4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeripheralKind {
    Timer,
    #[serde(alias = "stub")]
    Unimplemented,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PeripheralConfig {
    pub id: String,
    pub r#type: PeripheralKind,
    pub base_address: u32,
    /// First IRQ line driven by the peripheral (timers use `irq..irq+4`).
    #[serde(default)]
    pub irq: Option<u32>,
}

/// A fixed, read-only memory cell served by the bus hook table.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ConstantRegister {
    pub address: u32,
    pub value: u32,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChipDescriptor {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub name: String,
    #[serde(default = "default_clock_hz")]
    pub clock_hz: u64,
    #[serde(default)]
    pub peripherals: Vec<PeripheralConfig>,
    #[serde(default)]
    pub constants: Vec<ConstantRegister>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("peripheral '{id}' base {base:#010x} is not aligned to a 16 KiB window")]
    MisalignedPeripheral { id: String, base: u32 },
    #[error("peripheral '{id}' at {base:#010x} lies outside the APB/AHB peripheral space")]
    OutsidePeripheralSpace { id: String, base: u32 },
    #[error("peripherals '{first}' and '{second}' share the window at {base:#010x}")]
    OverlappingPeripherals {
        first: String,
        second: String,
        base: u32,
    },
    #[error("clock frequency must be non-zero")]
    ZeroClock,
}

impl ChipDescriptor {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read chip descriptor {:?}", path))?;

        let chip: Self = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse chip descriptor JSON {:?}", path))?
        } else {
            serde_yaml::from_str(&content).context("Failed to parse Chip Descriptor YAML")?
        };
        chip.validate()?;
        Ok(chip)
    }

    /// The stock RP2040 layout: TIMER on IRQ 0..3, every other APB block
    /// present as an unimplemented placeholder, SYSINFO served as constants.
    pub fn rp2040() -> Self {
        let unimplemented = [
            ("clocks", 0x4000_8000),
            ("resets", 0x4000_c000),
            ("psm", 0x4001_0000),
            ("io_bank0", 0x4001_4000),
            ("io_qspi", 0x4001_8000),
            ("pads_bank0", 0x4001_c000),
            ("pads_qspi", 0x4002_0000),
            ("xosc", 0x4002_4000),
            ("pll_sys", 0x4002_8000),
            ("pll_usb", 0x4002_c000),
            ("busctrl", 0x4003_0000),
            ("uart0", 0x4003_4000),
            ("uart1", 0x4003_8000),
            ("spi0", 0x4003_c000),
            ("spi1", 0x4004_0000),
            ("i2c0", 0x4004_4000),
            ("i2c1", 0x4004_8000),
            ("adc", 0x4004_c000),
            ("pwm", 0x4005_0000),
            ("watchdog", 0x4005_8000),
            ("rtc", 0x4005_c000),
            ("rosc", 0x4006_0000),
            ("vreg_and_chip_reset", 0x4006_4000),
            ("tbman", 0x4006_c000),
            ("dma", 0x5000_0000),
            ("usbctrl_regs", 0x5011_0000),
            ("pio0", 0x5020_0000),
            ("pio1", 0x5030_0000),
        ];

        let mut peripherals = vec![PeripheralConfig {
            id: "timer".to_string(),
            r#type: PeripheralKind::Timer,
            base_address: 0x4005_4000,
            irq: Some(0),
        }];
        peripherals.extend(unimplemented.iter().map(|(id, base)| PeripheralConfig {
            id: id.to_string(),
            r#type: PeripheralKind::Unimplemented,
            base_address: *base,
            irq: None,
        }));

        Self {
            schema_version: default_schema_version(),
            name: "rp2040".to_string(),
            clock_hz: default_clock_hz(),
            peripherals,
            constants: vec![
                ConstantRegister {
                    address: 0x4000_0000,
                    value: 0x1000_2927,
                    name: Some("SYSINFO_CHIP_ID".to_string()),
                },
                ConstantRegister {
                    address: 0x4000_0004,
                    value: 0x0000_0002,
                    name: Some("SYSINFO_PLATFORM".to_string()),
                },
                ConstantRegister {
                    address: 0x4000_0040,
                    value: 0x0000_0000,
                    name: Some("SYSINFO_GITREF_RP2040".to_string()),
                },
            ],
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clock_hz == 0 {
            return Err(ConfigError::ZeroClock);
        }

        let mut windows: BTreeMap<u32, &str> = BTreeMap::new();
        for p in &self.peripherals {
            if p.base_address % PERIPHERAL_WINDOW != 0 {
                return Err(ConfigError::MisalignedPeripheral {
                    id: p.id.clone(),
                    base: p.base_address,
                });
            }
            if !(0x4000_0000..0xD000_0000).contains(&p.base_address) {
                return Err(ConfigError::OutsidePeripheralSpace {
                    id: p.id.clone(),
                    base: p.base_address,
                });
            }
            if let Some(first) = windows.insert(p.base_address, &p.id) {
                return Err(ConfigError::OverlappingPeripherals {
                    first: first.to_string(),
                    second: p.id.clone(),
                    base: p.base_address,
                });
            }
        }
        Ok(())
    }
}

impl Default for ChipDescriptor {
    fn default() -> Self {
        Self::rp2040()
    }
}

/// How core 0 is started after the images are loaded.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BootMode {
    /// Both cores start from the boot ROM vector table.
    Bootrom,
    /// Core 0 starts from the vector table in flash (after the 256 byte boot2 stage).
    #[default]
    Flash,
    /// Core 0 starts from a vector table copied into SRAM.
    Ram,
}

impl BootMode {
    pub fn default_vector_table(self) -> u32 {
        match self {
            BootMode::Bootrom => 0x0000_0000,
            BootMode::Flash => 0x1000_0100,
            BootMode::Ram => 0x2000_0000,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct SystemManifest {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub name: String,
    /// Chip descriptor path; the built-in RP2040 layout is used when absent.
    #[serde(default)]
    pub chip: Option<String>,
    #[serde(default)]
    pub firmware: Option<String>,
    #[serde(default)]
    pub bootrom: Option<String>,
    #[serde(default)]
    pub boot: BootMode,
    #[serde(default)]
    pub vector_table: Option<u32>,
    #[serde(default)]
    pub quantum_cycles: Option<u64>,
    /// Initial GPIO input levels, by pin number.
    #[serde(default)]
    pub gpio_inputs: BTreeMap<u8, bool>,
    #[serde(default)]
    pub log_level: Option<String>,
}

impl SystemManifest {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let f = std::fs::File::open(path)
            .with_context(|| format!("Failed to open system manifest {:?}", path))?;
        let mut manifest: Self =
            serde_yaml::from_reader(f).context("Failed to parse System Manifest")?;

        // Relative paths are resolved against the manifest's directory.
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        for entry in [
            &mut manifest.chip,
            &mut manifest.firmware,
            &mut manifest.bootrom,
        ] {
            if let Some(p) = entry.as_mut() {
                *p = resolve(base, p).to_string_lossy().into_owned();
            }
        }
        Ok(manifest)
    }

    /// Loads the referenced chip descriptor, or the built-in RP2040 layout.
    pub fn load_chip(&self) -> Result<ChipDescriptor> {
        match &self.chip {
            Some(path) => {
                tracing::info!("Loading chip descriptor: {}", path);
                ChipDescriptor::from_file(path)
            }
            None => Ok(ChipDescriptor::rp2040()),
        }
    }

    pub fn vector_table(&self) -> u32 {
        self.vector_table
            .unwrap_or_else(|| self.boot.default_vector_table())
    }
}

fn resolve(base: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_rp2040_is_valid() {
        let chip = ChipDescriptor::rp2040();
        assert!(chip.validate().is_ok());
        assert_eq!(chip.clock_hz, 125_000_000);
        let timer = chip
            .peripherals
            .iter()
            .find(|p| p.r#type == PeripheralKind::Timer)
            .unwrap();
        assert_eq!(timer.base_address, 0x4005_4000);
        assert_eq!(timer.irq, Some(0));
    }

    #[test]
    fn test_misaligned_peripheral_rejected() {
        let mut chip = ChipDescriptor::rp2040();
        chip.peripherals[0].base_address = 0x4005_4100;
        assert_eq!(
            chip.validate(),
            Err(ConfigError::MisalignedPeripheral {
                id: "timer".to_string(),
                base: 0x4005_4100
            })
        );
    }

    #[test]
    fn test_overlapping_peripherals_rejected() {
        let mut chip = ChipDescriptor::rp2040();
        chip.peripherals[1].base_address = 0x4005_4000;
        assert!(matches!(
            chip.validate(),
            Err(ConfigError::OverlappingPeripherals { .. })
        ));
    }

    #[test]
    fn test_manifest_defaults() {
        let yaml = r#"
name: "blinky"
firmware: "blink.uf2"
"#;
        let manifest: SystemManifest = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(manifest.boot, BootMode::Flash);
        assert_eq!(manifest.vector_table(), 0x1000_0100);
        assert!(manifest.chip.is_none());
        assert!(manifest.gpio_inputs.is_empty());
    }

    #[test]
    fn test_manifest_full() {
        let yaml = r#"
name: "ram-test"
boot: ram
vector_table: 0x20001000
quantum_cycles: 64
gpio_inputs:
  2: true
  3: false
log_level: debug
"#;
        let manifest: SystemManifest = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(manifest.boot, BootMode::Ram);
        assert_eq!(manifest.vector_table(), 0x2000_1000);
        assert_eq!(manifest.quantum_cycles, Some(64));
        assert_eq!(manifest.gpio_inputs.get(&2), Some(&true));
        assert_eq!(manifest.log_level.as_deref(), Some("debug"));
    }
}
