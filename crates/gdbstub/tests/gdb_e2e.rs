// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use picosim_core::bus::MemoryBus;
use picosim_core::config::SimulationConfig;
use picosim_core::logging::NullLogger;
use picosim_core::memory::{ProgramImage, SRAM_BASE};
use picosim_core::Rp2040;
use picosim_gdbstub::GdbServer;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn compute_checksum(data: &str) -> String {
    let sum: u8 = data.as_bytes().iter().fold(0, |acc, &x| acc.wrapping_add(x));
    format!("{:02x}", sum)
}

fn send_packet(stream: &mut TcpStream, data: &str) {
    let packet = format!("${}#{}", data, compute_checksum(data));
    stream.write_all(packet.as_bytes()).unwrap();
    stream.flush().unwrap();
}

/// Expands RSP run-length encoding: `X*c` repeats `X` a further `c - 29` times.
fn decode_rle(payload: &str) -> String {
    let mut out = String::with_capacity(payload.len());
    let mut chars = payload.chars();
    while let Some(c) = chars.next() {
        if c == '*' {
            let count = chars.next().map_or(0, |n| n as usize - 29);
            if let Some(last) = out.chars().last() {
                out.extend(std::iter::repeat(last).take(count));
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Reads until one complete `$...#xx` packet arrived and returns its
/// payload with run-length encoding expanded.
fn read_packet(stream: &mut TcpStream) -> String {
    let mut buffer = [0; 2048];
    let mut response = String::new();
    let start = std::time::Instant::now();
    loop {
        if start.elapsed() > Duration::from_secs(2) {
            panic!("Timed out reading GDB packet. Data so far: {:?}", response);
        }
        match stream.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => response.push_str(&String::from_utf8_lossy(&buffer[..n])),
            Err(ref e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                thread::sleep(Duration::from_millis(10));
                continue;
            }
            Err(e) => panic!("Error reading GDB packet: {:?}", e),
        }

        if let (Some(dollar), Some(hash)) = (response.find('$'), response.rfind('#')) {
            if hash > dollar && response.len() >= hash + 3 {
                stream.write_all(b"+").unwrap();
                return decode_rle(&response[dollar + 1..hash]);
            }
        }
    }
    response
}

fn chip() -> Rp2040 {
    let logger = Arc::new(NullLogger);
    let mut bus = MemoryBus::new(logger.clone());
    // movs r0, #5; nop; b .
    let mut image = ProgramImage::new(SRAM_BASE | 1);
    image.add_segment(SRAM_BASE, vec![0x05, 0x20, 0x00, 0xBF, 0xFE, 0xE7]);
    bus.load_image(&image).unwrap();
    let mut chip = Rp2040::new(bus, SimulationConfig::default(), logger);
    chip.boot_at(SRAM_BASE + 0x1000, SRAM_BASE);
    chip
}

#[test]
fn test_decode_rle() {
    assert_eq!(decode_rle("0*\""), "000000");
    assert_eq!(decode_rle("05*!20"), "05555520");
    assert_eq!(decode_rle("OK"), "OK");
}

#[test]
fn test_gdb_rsp_session() {
    let server = GdbServer::bind(0).unwrap();
    let port = server.local_addr().unwrap().port();
    let handle = thread::spawn(move || server.run(chip()).unwrap());

    let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_millis(200)))
        .unwrap();
    stream.write_all(b"+").unwrap();

    // r0 is the first register of the `g` reply, little-endian hex.
    send_packet(&mut stream, "g");
    let regs = read_packet(&mut stream);
    assert_eq!(&regs[0..8], "00000000", "Got: {}", regs);
    assert_eq!(&regs[120..128], "00000020", "Got: {}", regs);

    send_packet(&mut stream, "s");
    let resp = read_packet(&mut stream);
    assert!(resp.contains("05"), "No SIGTRAP after step. Got: {}", resp);

    send_packet(&mut stream, "g");
    let regs = read_packet(&mut stream);
    assert_eq!(&regs[0..8], "05000000", "Got: {}", regs);
    assert_eq!(&regs[120..128], "02000020", "Got: {}", regs);

    send_packet(&mut stream, "m20000000,2");
    assert_eq!(read_packet(&mut stream), "0520");

    send_packet(&mut stream, "M20000100,2:beef");
    assert_eq!(read_packet(&mut stream), "OK");

    // Continue into the spin loop, then interrupt it.
    send_packet(&mut stream, "c");
    thread::sleep(Duration::from_millis(100));
    stream.write_all(&[0x03]).unwrap();
    stream.flush().unwrap();
    let resp = read_packet(&mut stream);
    assert!(resp.contains("02"), "No SIGINT stop reply. Got: {}", resp);

    send_packet(&mut stream, "D");
    assert_eq!(read_packet(&mut stream), "OK");

    let mut chip = handle.join().unwrap();
    assert_eq!(chip.cores[0].pc(), SRAM_BASE + 4);
    assert_eq!(chip.bus.read_u16(SRAM_BASE + 0x100), 0xEFBE);
}
