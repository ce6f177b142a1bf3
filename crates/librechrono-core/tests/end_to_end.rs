//! End-to-end scenarios: host `Connection` against the simulated rig over TCP

use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use librechrono_core::capture::{CaptureEngine, TimerConfig};
use librechrono_core::protocol::stream::TcpChannel;
use librechrono_core::protocol::{Connection, ConnectionConfig, Measurement, WireFormat};
use librechrono_core::sim::{serve, SimulatedRange};
use pretty_assertions::assert_eq;

/// Spawn a simulated rig serving one connection, return the address to dial
fn spawn_rig(range: SimulatedRange, format: WireFormat) -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");

    thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let mut engine = CaptureEngine::new(TimerConfig::default());
        let mut range = range;
        let _ = serve(&mut stream, &mut engine, &mut range, format);
    });

    addr
}

/// Host connection with the hardware reset delays zeroed out
fn dial(addr: std::net::SocketAddr, format: WireFormat) -> Connection {
    let config = ConnectionConfig {
        timeout_ms: 2000,
        format,
        reset_on_connect: false,
        ..Default::default()
    };
    let stream = TcpStream::connect(addr).expect("connect");
    let mut conn = Connection::new(config);
    conn.connect_channel(Box::new(TcpChannel::new(stream)))
        .expect("attach channel");
    conn
}

#[test]
fn scenario_detection_at_50000_ticks() {
    let addr = spawn_rig(SimulatedRange::new(Some(50_000)), WireFormat::Raw);
    let mut conn = dial(addr, WireFormat::Raw);

    assert_eq!(conn.measure().unwrap(), Measurement::Ticks(50_000));
}

#[test]
fn scenario_no_detection_reports_timeout() {
    let addr = spawn_rig(SimulatedRange::new(None), WireFormat::Raw);
    let mut conn = dial(addr, WireFormat::Raw);

    // a rig-reported timeout is an Ok outcome, not an error
    assert_eq!(conn.measure().unwrap(), Measurement::TimedOut);
}

#[test]
fn scenario_legacy_hex_firmware() {
    let addr = spawn_rig(SimulatedRange::new(Some(50_000)), WireFormat::LegacyHex);
    let mut conn = dial(addr, WireFormat::LegacyHex);

    assert_eq!(conn.measure().unwrap(), Measurement::Ticks(50_000));
}

#[test]
fn garbage_byte_before_fire_command_is_ignored() {
    let addr = spawn_rig(SimulatedRange::new(Some(1_000)), WireFormat::Raw);

    // slip a garbage byte onto the wire before the client fires
    let stream = TcpStream::connect(addr).expect("connect");
    let mut raw = stream.try_clone().expect("clone");
    raw.write_all(&[0x00]).expect("garbage write");
    raw.flush().expect("flush");
    thread::sleep(Duration::from_millis(50));

    let mut conn = Connection::new(ConnectionConfig {
        timeout_ms: 2000,
        reset_on_connect: false,
        ..Default::default()
    });
    conn.connect_channel(Box::new(TcpChannel::new(stream)))
        .expect("attach channel");

    assert_eq!(conn.measure().unwrap(), Measurement::Ticks(1_000));
}

#[test]
fn repeated_measurements_on_one_connection() {
    let addr = spawn_rig(SimulatedRange::seeded(40_000, 2_000, 7), WireFormat::Raw);
    let mut conn = dial(addr, WireFormat::Raw);

    // half-duplex request/response: each fire waits out the previous reply
    for _ in 0..5 {
        match conn.measure().unwrap() {
            Measurement::Ticks(t) => assert!((38_000..=42_000).contains(&t), "got {}", t),
            Measurement::TimedOut => panic!("unexpected timeout"),
        }
    }
}

#[test]
fn silent_rig_is_a_transport_timeout() {
    // listener that accepts and never answers
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");
    thread::spawn(move || {
        let (_stream, _) = listener.accept().expect("accept");
        thread::sleep(Duration::from_secs(5));
    });

    let stream = TcpStream::connect(addr).expect("connect");
    let mut conn = Connection::new(ConnectionConfig {
        timeout_ms: 300,
        reset_on_connect: false,
        ..Default::default()
    });
    conn.connect_channel(Box::new(TcpChannel::new(stream)))
        .expect("attach channel");

    assert!(matches!(
        conn.measure(),
        Err(librechrono_core::protocol::ProtocolError::Timeout)
    ));
}
