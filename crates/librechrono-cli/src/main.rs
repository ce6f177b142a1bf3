//! LibreChrono command-line front end
//!
//! Measure against a real serial-attached rig, list candidate ports, or run
//! the built-in simulated rig over TCP for development.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::net::TcpStream;
use tracing::info;
use tracing_subscriber::EnvFilter;

use librechrono_core::capture::TimerConfig;
use librechrono_core::protocol::{
    stream::TcpChannel, Connection, ConnectionConfig, Measurement, WireFormat,
};
use librechrono_core::sim::{serve_tcp, SimulatedRange};

#[derive(Parser)]
#[command(name = "librechrono", version, about = "Time-of-flight chronograph host")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List serial ports that may have a rig attached
    Ports,

    /// Fire the rig and print the measured time of flight
    Measure {
        /// Serial port of the rig (e.g. /dev/ttyACM0)
        #[arg(long, conflicts_with = "tcp")]
        port: Option<String>,

        /// Dial a simulated rig over TCP instead of a serial port
        #[arg(long)]
        tcp: Option<String>,

        /// Line speed
        #[arg(long, default_value_t = librechrono_core::protocol::DEFAULT_BAUD_RATE)]
        baud: u32,

        /// Rig speaks the deprecated 8-byte ASCII-hex response
        #[arg(long)]
        legacy_hex: bool,

        /// Skip the DTR/RTS reset handshake
        #[arg(long)]
        no_reset: bool,

        /// Number of shots to fire
        #[arg(long, default_value_t = 1)]
        shots: u32,
    },

    /// Run the simulated rig as a TCP server
    Simulate {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:7700")]
        listen: String,

        /// Detection tick reported for each shot
        #[arg(long, default_value_t = 50_000, conflicts_with = "miss")]
        detect_at: u64,

        /// Never detect; every shot times out
        #[arg(long)]
        miss: bool,

        /// Uniform jitter (in ticks) around the detection tick
        #[arg(long, default_value_t = 0)]
        jitter: u64,

        /// Serve the deprecated 8-byte ASCII-hex response
        #[arg(long)]
        legacy_hex: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match Cli::parse().command {
        Commands::Ports => ports(),
        Commands::Measure {
            port,
            tcp,
            baud,
            legacy_hex,
            no_reset,
            shots,
        } => measure(port, tcp, baud, legacy_hex, no_reset, shots),
        Commands::Simulate {
            listen,
            detect_at,
            miss,
            jitter,
            legacy_hex,
        } => simulate(&listen, detect_at, miss, jitter, legacy_hex),
    }
}

fn ports() -> Result<()> {
    let ports = Connection::list_ports();
    if ports.is_empty() {
        println!("no serial ports found");
        return Ok(());
    }
    for p in ports {
        match (p.vid, p.pid, p.product.as_deref()) {
            (Some(vid), Some(pid), product) => println!(
                "{}  [{:04x}:{:04x}] {}",
                p.name,
                vid,
                pid,
                product.unwrap_or("")
            ),
            _ => println!("{}", p.name),
        }
    }
    Ok(())
}

fn wire_format(legacy_hex: bool) -> WireFormat {
    if legacy_hex {
        WireFormat::LegacyHex
    } else {
        WireFormat::Raw
    }
}

fn measure(
    port: Option<String>,
    tcp: Option<String>,
    baud: u32,
    legacy_hex: bool,
    no_reset: bool,
    shots: u32,
) -> Result<()> {
    let config = ConnectionConfig {
        port_name: port.clone().unwrap_or_default(),
        baud_rate: baud,
        format: wire_format(legacy_hex),
        reset_on_connect: !no_reset,
        ..Default::default()
    };
    let mut conn = Connection::new(config);

    match (port, tcp) {
        (Some(_), None) => conn.connect().context("opening serial port")?,
        (None, Some(addr)) => {
            let stream =
                TcpStream::connect(&addr).with_context(|| format!("dialing {}", addr))?;
            conn.connect_channel(Box::new(TcpChannel::new(stream)))
                .context("attaching TCP channel")?;
        }
        _ => bail!("exactly one of --port or --tcp is required"),
    }
    info!(format = ?conn.format(), "connected to rig");

    // presentation only: the rig reports raw ticks, seconds are derived from
    // the reference clock tree
    let tick_hz = TimerConfig::default().fast_tick_hz();
    for shot in 1..=shots {
        match conn.measure().context("measurement failed")? {
            Measurement::Ticks(ticks) => {
                let secs = f64::from(ticks) / f64::from(tick_hz);
                println!("shot {}: {} ticks ({:.6} s)", shot, ticks, secs);
            }
            Measurement::TimedOut => println!("shot {}: timeout, no detection", shot),
        }
    }
    Ok(())
}

fn simulate(listen: &str, detect_at: u64, miss: bool, jitter: u64, legacy_hex: bool) -> Result<()> {
    let mut range = if miss {
        SimulatedRange::new(None)
    } else if jitter > 0 {
        SimulatedRange::with_jitter(detect_at, jitter)
    } else {
        SimulatedRange::new(Some(detect_at))
    };

    serve_tcp(
        listen,
        TimerConfig::default(),
        &mut range,
        wire_format(legacy_hex),
    )
    .context("simulated rig failed")?;
    Ok(())
}
