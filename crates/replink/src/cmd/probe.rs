use std::time::{Duration, Instant};

use replink_driver::extruder::DEVICE_ADDRESS;
use replink_frame::{Packet, PacketPort, ResultCode};
use replink_transport::{SerialConfig, SerialLink};
use tracing::debug;

use crate::cmd::ProbeArgs;
use crate::exit::{frame_error, transport_error, CliResult, FAILURE, SUCCESS};

/// Firmware self-test command: echoes back a fixed readback including the
/// current temperature and the control-loop rate.
const CMD_COMM_TEST: u8 = 120;

/// Filler parameter bytes for the self-test command.
const COMM_TEST_FILL: [u8; 6] = [150; 6];

/// Number of readback bytes dumped for inspection.
const DUMP_LEN: usize = 13;

/// Point-query diagnostic for the serial link.
///
/// Must not run while a supervised driver session owns the same device;
/// the bus supports exactly one session at a time.
pub fn run(args: ProbeArgs) -> CliResult<i32> {
    let config = SerialConfig {
        path: args.device.clone(),
        baud_rate: args.baud,
    };
    let link = SerialLink::open(&config).map_err(|err| transport_error("open failed", err))?;
    let mut port = PacketPort::new(link);

    println!(
        "Sleeping {}s for the serial port and firmware to settle...",
        args.settle_secs
    );
    std::thread::sleep(Duration::from_secs(args.settle_secs));

    println!("Flushing communication channel...");
    port.reset().map_err(|err| frame_error("bus reset failed", err))?;

    println!("Querying...");
    // Warm-up round trip, not timed.
    let _ = exchange(&mut port)?;

    let start = Instant::now();
    let mut last = Packet::new();
    for _ in 0..args.iterations.max(1) {
        last = exchange(&mut port)?;
    }
    let per_round_trip = start.elapsed() / args.iterations.max(1);

    println!("Time spent for a two-way packet: {per_round_trip:?}");
    println!(
        "Readback result code (1 for success, anything else - failure): {}",
        last.result.value()
    );

    if last.result != ResultCode::Ok {
        return Ok(FAILURE);
    }

    println!("The current temperature is: {}", last.u16_at(4));
    println!(
        "The loop-cycles per second is (hopefully over 200): {}",
        u32::from(last.u8_at(3)) * 4
    );
    for i in 0..DUMP_LEN {
        println!("{}", last.u8_at(i));
    }

    Ok(SUCCESS)
}

fn comm_test_request() -> CliResult<Packet> {
    let build = || -> replink_frame::Result<Packet> {
        let mut packet = Packet::new();
        packet.push_u8(DEVICE_ADDRESS)?;
        packet.push_u8(CMD_COMM_TEST)?;
        for &b in &COMM_TEST_FILL {
            packet.push_u8(b)?;
        }
        Ok(packet)
    };
    build().map_err(|err| frame_error("building probe packet", err))
}

/// Send one self-test command and wait for its (possibly timed-out) reply.
fn exchange(port: &mut PacketPort<SerialLink>) -> CliResult<Packet> {
    let request = comm_test_request()?;
    port.send(&request)
        .map_err(|err| frame_error("send failed", err))?;

    loop {
        match port.readback() {
            Ok(Some(packet)) => {
                debug!(result = ?packet.result, len = packet.len(), "probe readback");
                return Ok(packet);
            }
            Ok(None) => std::thread::sleep(Duration::from_millis(1)),
            Err(err) => return Err(frame_error("readback failed", err)),
        }
    }
}
