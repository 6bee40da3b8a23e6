// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::Context;
use clap::Parser;
use picosim_config::{BootMode, SystemManifest};
use picosim_core::logging::{LogLevel, TracingLogger};
use picosim_core::metrics::{CoreMetrics, PerformanceMetrics};
use picosim_core::system::ChipBuilder;
use picosim_core::{DebugControl, Rp2040, StopReason};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

const EXIT_PASS: u8 = 0;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_RUNTIME_ERROR: u8 = 3;

const REPORT_SCHEMA_VERSION: &str = "1.0";

/// Cycles between progress lines.
const PROGRESS_CYCLES: u64 = 50_000_000;

fn parse_u32_addr(s: &str) -> Result<u32, String> {
    let trimmed = s.trim();
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        u32::from_str_radix(&hex.replace('_', ""), 16)
            .map_err(|e| format!("Invalid hex address '{}': {}", s, e))
    } else {
        u32::from_str(trimmed).map_err(|e| format!("Invalid address '{}': {}", s, e))
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "picosim RP2040 emulator", long_about = None)]
struct Cli {
    /// Firmware image (ELF, Intel HEX, UF2 or raw .bin for flash)
    #[arg(short, long)]
    image: Option<PathBuf>,

    /// Boot ROM image; both cores then start from the ROM vector table
    /// unless a system manifest says otherwise
    #[arg(long)]
    bootrom: Option<PathBuf>,

    /// Path to the system manifest (YAML)
    #[arg(short, long)]
    system: Option<PathBuf>,

    /// Stop after this many chip cycles
    #[arg(long, default_value = "125000000")]
    max_cycles: u64,

    /// Breakpoint PC address (repeatable)
    #[arg(long, value_parser = parse_u32_addr)]
    breakpoint: Vec<u32>,

    /// Serve a GDB remote session on this TCP port instead of free-running
    #[arg(long)]
    gdb: Option<u16>,

    /// Write a JSON run report
    #[arg(long)]
    report: Option<PathBuf>,

    /// Write the final chip state as JSON
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Debug-level logging, including every modelling gap
    #[arg(short, long)]
    trace: bool,
}

#[derive(Debug, Serialize)]
struct CoreReport {
    core: usize,
    pc: u32,
    cycles: u64,
    waiting: bool,
    metrics: Option<CoreMetrics>,
}

#[derive(Debug, Serialize)]
struct RunReport {
    report_schema_version: &'static str,
    stop_reason: Option<StopReason>,
    cycles: u64,
    simulated_nanos: u64,
    instructions: u64,
    wall_time_ms: u64,
    instructions_per_second: f64,
    cores: Vec<CoreReport>,
    firmware: Option<PathBuf>,
    firmware_hash: Option<String>,
    bootrom_hash: Option<String>,
}

/// Everything resolved from the command line and the manifest before the
/// chip is built.
struct RunInputs {
    builder: ChipBuilder,
    firmware: Option<PathBuf>,
    firmware_hash: Option<String>,
    bootrom_hash: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    }

    info!("Starting picosim");
    let inputs = match prepare(&cli) {
        Ok(inputs) => inputs,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let chip = match inputs.builder.build() {
        Ok(chip) => chip,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    match execute(
        &cli,
        chip,
        &inputs.firmware,
        inputs.firmware_hash,
        inputs.bootrom_hash,
    ) {
        Ok(()) => ExitCode::from(EXIT_PASS),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(EXIT_RUNTIME_ERROR)
        }
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn file_hash(path: &Path) -> anyhow::Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    Ok(sha256_hex(&bytes))
}

fn prepare(cli: &Cli) -> anyhow::Result<RunInputs> {
    let manifest = cli
        .system
        .as_ref()
        .map(SystemManifest::from_file)
        .transpose()?;

    let firmware = cli
        .image
        .clone()
        .or_else(|| manifest.as_ref()?.firmware.as_ref().map(PathBuf::from));
    let bootrom = cli
        .bootrom
        .clone()
        .or_else(|| manifest.as_ref()?.bootrom.as_ref().map(PathBuf::from));
    if firmware.is_none() && bootrom.is_none() {
        anyhow::bail!("Nothing to run: pass --image, --bootrom or a manifest naming one");
    }

    let mut builder = match &manifest {
        Some(manifest) => ChipBuilder::from_manifest(manifest)?,
        None if firmware.is_none() => ChipBuilder::new().boot(BootMode::Bootrom),
        None => ChipBuilder::new(),
    };
    if cli.trace {
        builder = builder.logger(TracingLogger::shared(LogLevel::Debug));
    }

    let mut bootrom_hash = None;
    if let Some(path) = &bootrom {
        info!("Loading boot ROM: {:?}", path);
        builder = builder.bootrom(picosim_loader::load_bootrom(path)?);
        bootrom_hash = Some(file_hash(path)?);
    }

    let mut firmware_hash = None;
    if let Some(path) = &firmware {
        info!("Loading firmware: {:?}", path);
        let image = picosim_loader::load_image(path)?;
        info!("Entry Point: {:#x}", image.entry_point);
        builder = builder.image(image);
        firmware_hash = Some(file_hash(path)?);
    }

    Ok(RunInputs {
        builder,
        firmware,
        firmware_hash,
        bootrom_hash,
    })
}

fn execute(
    cli: &Cli,
    mut chip: Rp2040,
    firmware: &Option<PathBuf>,
    firmware_hash: Option<String>,
    bootrom_hash: Option<String>,
) -> anyhow::Result<()> {
    let metrics = Arc::new(PerformanceMetrics::new());
    chip.add_observer(metrics.clone());
    for bp in &cli.breakpoint {
        info!("Breakpoint at {:#010x}", bp);
        chip.add_breakpoint(*bp);
    }

    let started = Instant::now();
    let (chip, stop_reason) = match cli.gdb {
        Some(port) => {
            let server = picosim_gdbstub::GdbServer::bind(port)
                .with_context(|| format!("Failed to listen on port {}", port))?;
            (server.run(chip)?, None)
        }
        None => {
            let reason = run_simulation_loop(&mut chip, cli.max_cycles, &metrics);
            (chip, Some(reason))
        }
    };
    let elapsed = started.elapsed();

    report_metrics(&chip, &metrics, stop_reason);

    if let Some(path) = &cli.report {
        let report = RunReport {
            report_schema_version: REPORT_SCHEMA_VERSION,
            stop_reason,
            cycles: chip.cycles(),
            simulated_nanos: chip.now_nanos(),
            instructions: metrics.get_instructions(),
            wall_time_ms: elapsed.as_millis().min(u128::from(u64::MAX)) as u64,
            instructions_per_second: metrics.get_ips(),
            cores: chip
                .cores
                .iter()
                .enumerate()
                .map(|(i, core)| CoreReport {
                    core: i,
                    pc: core.pc(),
                    cycles: core.cycles,
                    waiting: core.waiting,
                    metrics: metrics.core(i),
                })
                .collect(),
            firmware: firmware.clone(),
            firmware_hash,
            bootrom_hash,
        };
        write_json(path, &report).context("Failed to write report")?;
        info!("Report written to {:?}", path);
    }

    if let Some(path) = &cli.snapshot {
        write_json(path, &chip.snapshot()).context("Failed to write snapshot")?;
        info!("Snapshot written to {:?}", path);
    }

    Ok(())
}

fn run_simulation_loop(
    chip: &mut Rp2040,
    max_cycles: u64,
    metrics: &PerformanceMetrics,
) -> StopReason {
    info!("Running for up to {} cycles...", max_cycles);
    let end = chip.cycles().saturating_add(max_cycles);
    loop {
        let chunk = (end - chip.cycles()).min(PROGRESS_CYCLES);
        let reason = chip.run_cycles(chunk);
        if reason != StopReason::MaxStepsReached || chip.cycles() >= end {
            return reason;
        }
        info!(
            "Progress: {} cycles, current IPS: {:.2}",
            chip.cycles(),
            metrics.get_ips()
        );
    }
}

fn report_metrics(chip: &Rp2040, metrics: &PerformanceMetrics, stop: Option<StopReason>) {
    info!("Simulation finished: {:?}", stop);
    for (i, core) in chip.cores.iter().enumerate() {
        info!(
            "Core {}: PC={:#010x} cycles={} waiting={}",
            i,
            core.pc(),
            core.cycles,
            core.waiting
        );
    }
    info!("Total Instructions: {}", metrics.get_instructions());
    info!("Total Cycles: {}", chip.cycles());
    info!("Average IPS: {:.2}", metrics.get_ips());
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(file, value)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_u32_addr() {
        assert_eq!(parse_u32_addr("0x1000_0200"), Ok(0x1000_0200));
        assert_eq!(parse_u32_addr("0X20"), Ok(0x20));
        assert_eq!(parse_u32_addr(" 4096 "), Ok(4096));
        assert!(parse_u32_addr("0xZZ").is_err());
        assert!(parse_u32_addr("-1").is_err());
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from([
            "picosim",
            "--image",
            "fw.elf",
            "--breakpoint",
            "0x10000200",
            "--breakpoint",
            "0x10000210",
            "--max-cycles",
            "1000",
            "--trace",
        ])
        .unwrap();
        assert_eq!(cli.image, Some(PathBuf::from("fw.elf")));
        assert_eq!(cli.breakpoint, vec![0x1000_0200, 0x1000_0210]);
        assert_eq!(cli.max_cycles, 1000);
        assert!(cli.trace);
        assert!(cli.gdb.is_none());
    }

    #[test]
    fn test_stop_reason_report_format() {
        assert_eq!(
            serde_json::to_value(StopReason::BreakInstruction(3)).unwrap(),
            serde_json::json!({ "reason": "break_instruction", "value": 3 })
        );
        assert_eq!(
            serde_json::to_value(StopReason::MaxStepsReached).unwrap(),
            serde_json::json!({ "reason": "max_steps_reached" })
        );
    }

    #[test]
    fn test_prepare_requires_an_image() {
        let cli = Cli::try_parse_from(["picosim"]).unwrap();
        assert!(prepare(&cli).is_err());
    }
}
