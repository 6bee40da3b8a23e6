// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

const FLASH_BASE: u32 = 0x1000_0000;

fn temp_dir(prefix: &str) -> PathBuf {
    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir()
        .join("picosim-tests")
        .join(format!("{}-{}", prefix, nonce));
    std::fs::create_dir_all(&dir).expect("Failed to create temp dir");
    dir
}

/// Raw flash image: 256 bytes of boot2 padding, the vector table, then
/// `code` at offset 0x200.
fn flash_image(code: &[u16]) -> Vec<u8> {
    let mut image = vec![0u8; 0x200];
    image[0x100..0x104].copy_from_slice(&0x2004_2000u32.to_le_bytes());
    image[0x104..0x108].copy_from_slice(&(FLASH_BASE + 0x201).to_le_bytes());
    for op in code {
        image.extend_from_slice(&op.to_le_bytes());
    }
    image
}

fn picosim(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_picosim"))
        .args(args)
        .output()
        .expect("Failed to execute picosim")
}

fn read_json(path: &Path) -> serde_json::Value {
    let text = std::fs::read_to_string(path).expect("Missing JSON output");
    serde_json::from_str(&text).expect("Invalid JSON output")
}

fn s(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_bkpt_stops_run_and_report_is_written() {
    let dir = temp_dir("bkpt");
    let fw = dir.join("fw.bin");
    // movs r0, #42; bkpt #3
    std::fs::write(&fw, flash_image(&[0x202A, 0xBE03])).unwrap();
    let report = dir.join("report.json");
    let snapshot = dir.join("snapshot.json");

    let output = picosim(&[
        "--image",
        s(&fw),
        "--report",
        s(&report),
        "--snapshot",
        s(&snapshot),
    ]);
    assert_eq!(
        output.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let json = read_json(&report);
    assert_eq!(json["stop_reason"]["reason"], "break_instruction");
    assert_eq!(json["stop_reason"]["value"], 3);
    assert_eq!(json["cores"].as_array().unwrap().len(), 2);
    assert_eq!(json["cores"][1]["waiting"], true);
    assert_eq!(json["cores"][0]["metrics"]["instructions"], 2);
    let hash = json["firmware_hash"].as_str().unwrap();
    assert_eq!(hash.len(), 64);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));

    let snap = read_json(&snapshot);
    assert_eq!(snap["cores"][0]["registers"][0], 42);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_max_cycles_limits_a_spinning_firmware() {
    let dir = temp_dir("spin");
    let fw = dir.join("fw.bin");
    std::fs::write(&fw, flash_image(&[0xE7FE])).unwrap();
    let report = dir.join("report.json");

    let output = picosim(&[
        "--image",
        s(&fw),
        "--max-cycles",
        "5000",
        "--report",
        s(&report),
    ]);
    assert_eq!(output.status.code(), Some(0));

    let json = read_json(&report);
    assert_eq!(json["stop_reason"]["reason"], "max_steps_reached");
    let cycles = json["cycles"].as_u64().unwrap();
    assert!((5000..5010).contains(&cycles), "cycles = {}", cycles);
    // 125 MHz: 8 ns per cycle
    assert_eq!(json["simulated_nanos"].as_u64().unwrap(), cycles * 8);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_breakpoint_flag_halts_before_instruction() {
    let dir = temp_dir("breakpoint");
    let fw = dir.join("fw.bin");
    // movs r0, #1; movs r0, #2; b .
    std::fs::write(&fw, flash_image(&[0x2001, 0x2002, 0xE7FE])).unwrap();
    let report = dir.join("report.json");

    let output = picosim(&[
        "--image",
        s(&fw),
        "--breakpoint",
        "0x10000202",
        "--report",
        s(&report),
    ]);
    assert_eq!(output.status.code(), Some(0));

    let json = read_json(&report);
    assert_eq!(json["stop_reason"]["reason"], "breakpoint");
    assert_eq!(json["stop_reason"]["value"], 0x1000_0202u32);
    assert_eq!(json["cores"][0]["pc"], 0x1000_0202u32);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_manifest_resolves_firmware_relative_to_itself() {
    let dir = temp_dir("manifest");
    std::fs::write(dir.join("fw.bin"), flash_image(&[0xBE07])).unwrap();
    let manifest = dir.join("system.yaml");
    std::fs::write(
        &manifest,
        "name: bench\nfirmware: fw.bin\nboot: flash\nquantum_cycles: 100\ngpio_inputs:\n  2: true\n",
    )
    .unwrap();
    let report = dir.join("report.json");

    let output = picosim(&["--system", s(&manifest), "--report", s(&report)]);
    assert_eq!(
        output.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(read_json(&report)["stop_reason"]["value"], 7);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_config_errors_exit_with_code_2() {
    let dir = temp_dir("config-errors");

    // Nothing to run.
    assert_eq!(picosim(&[]).status.code(), Some(2));

    // Missing image file.
    let missing = dir.join("missing.elf");
    assert_eq!(picosim(&["--image", s(&missing)]).status.code(), Some(2));

    // Invalid log level in the manifest.
    std::fs::write(dir.join("fw.bin"), flash_image(&[0xBE00])).unwrap();
    let manifest = dir.join("system.yaml");
    std::fs::write(&manifest, "name: bad\nfirmware: fw.bin\nlog_level: loud\n").unwrap();
    assert_eq!(picosim(&["--system", s(&manifest)]).status.code(), Some(2));

    // Malformed manifest.
    std::fs::write(&manifest, "name: [unterminated\n").unwrap();
    assert_eq!(picosim(&["--system", s(&manifest)]).status.code(), Some(2));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_unwritable_report_is_a_runtime_error() {
    let dir = temp_dir("runtime-error");
    let fw = dir.join("fw.bin");
    std::fs::write(&fw, flash_image(&[0xBE00])).unwrap();
    // A directory where the report file should go.
    let report = dir.join("report.json");
    std::fs::create_dir_all(&report).unwrap();

    let output = picosim(&["--image", s(&fw), "--report", s(&report)]);
    assert_eq!(output.status.code(), Some(3));

    std::fs::remove_dir_all(&dir).ok();
}
