// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use picosim_core::bus::MemoryBus;
use picosim_core::config::SimulationConfig;
use picosim_core::logging::{NullLogger, SharedLogger};
use picosim_core::memory::{ProgramImage, SRAM_BASE};
use picosim_core::Rp2040;
use std::sync::Arc;

const CODE: u32 = SRAM_BASE + 0x100;
const CYCLES: u64 = 100_000;

// r0 counts down from 200, the outer b restarts it.
const LOOP: [u16; 4] = [
    0x20C8, // movs r0, #200
    0x3801, // subs r0, #1
    0xD1FD, // bne  .-2
    0xE7FB, // b    start
];

fn chip(program: &[u16], both_cores: bool) -> Rp2040 {
    let logger: SharedLogger = Arc::new(NullLogger);
    let mut bus = MemoryBus::new(logger.clone());
    let mut image = ProgramImage::new(CODE | 1);
    image.add_segment(CODE, program.iter().flat_map(|h| h.to_le_bytes()).collect());
    bus.load_image(&image).expect("load benchmark program");

    let mut chip = Rp2040::new(bus, SimulationConfig::default(), logger);
    chip.boot_at(SRAM_BASE + 0x2000, CODE);
    if both_cores {
        let core1 = &mut chip.cores[1];
        core1.regs.set_pc(CODE);
        core1.regs.set_sp(SRAM_BASE + 0x1000);
        core1.waiting = false;
    }
    chip
}

fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("rp2040");
    group.throughput(Throughput::Elements(CYCLES));

    group.bench_function("single_core_loop", |b| {
        let mut chip = chip(&LOOP, false);
        b.iter(|| chip.run_cycles(CYCLES))
    });
    group.bench_function("dual_core_loop", |b| {
        let mut chip = chip(&LOOP, true);
        b.iter(|| chip.run_cycles(CYCLES))
    });
    group.finish();
}

criterion_group!(benches, bench_step);
criterion_main!(benches);
