//! Connection management
//!
//! Drives the rig through one fire/measure/report exchange at a time: open
//! the transport, reset the rig over the DTR/RTS lines, send the fire
//! command, block for the fixed-size response, decode it.
//!
//! The protocol is strictly half-duplex; a second fire command is never sent
//! before the previous response has been fully read.

use serde::{Deserialize, Serialize};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{
    codec::WireFormat,
    serial::{configure_port, list_ports, open_port, PortInfo},
    stream::{Channel, SerialChannel},
    ProtocolError, BOOT_DELAY_MS, DEFAULT_BAUD_RATE, DEFAULT_TIMEOUT_MS, FIRE_COMMAND,
    RESET_SETTLE_MS,
};
use crate::capture::TIMEOUT_SENTINEL;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Not connected
    Disconnected,
    /// Connecting (reset handshake in progress)
    Connecting,
    /// Connected and ready
    Connected,
    /// Connection error
    Error,
}

/// Outcome of one measurement exchange
///
/// A rig-reported timeout is a valid, expected outcome and is kept apart
/// from both tick counts and transport errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Measurement {
    /// Detection occurred after this many fast-timer ticks
    Ticks(u32),
    /// The rig's watchdog expired before any detection
    TimedOut,
}

/// Connection configuration
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Serial port name
    pub port_name: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Response deadline in milliseconds (rig watchdog window plus margin)
    pub timeout_ms: u64,
    /// Response encoding the attached firmware speaks
    pub format: WireFormat,
    /// Toggle the DTR/RTS reset lines after opening the transport
    pub reset_on_connect: bool,
    /// Settle delay after each reset-line edge, milliseconds
    pub reset_settle_ms: u64,
    /// Boot delay after releasing reset, milliseconds
    pub boot_delay_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            format: WireFormat::Raw,
            reset_on_connect: true,
            reset_settle_ms: RESET_SETTLE_MS,
            boot_delay_ms: BOOT_DELAY_MS,
        }
    }
}

/// Host-side client for a chronograph rig
pub struct Connection {
    /// Transport handle
    channel: Option<Box<dyn Channel>>,
    /// Current connection state
    state: ConnectionState,
    /// Connection configuration
    config: ConnectionConfig,
}

impl Connection {
    /// Create a new connection (not yet connected)
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            channel: None,
            state: ConnectionState::Disconnected,
            config,
        }
    }

    /// List available serial ports
    pub fn list_ports() -> Vec<PortInfo> {
        list_ports()
    }

    /// Get current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Response encoding this connection is pinned to
    pub fn format(&self) -> WireFormat {
        self.config.format
    }

    /// Open and configure the serial port, then reset the rig
    pub fn connect(&mut self) -> Result<(), ProtocolError> {
        if self.state == ConnectionState::Connected {
            return Err(ProtocolError::AlreadyConnected);
        }

        let mut port = open_port(&self.config.port_name, Some(self.config.baud_rate))?;
        configure_port(port.as_mut())?;
        info!(port = %self.config.port_name, baud = self.config.baud_rate, "serial port opened");

        self.attach(Box::new(SerialChannel::new(port)))
    }

    /// Attach an already-open transport (TCP to a simulated rig, tests)
    pub fn connect_channel(&mut self, channel: Box<dyn Channel>) -> Result<(), ProtocolError> {
        if self.state == ConnectionState::Connected {
            return Err(ProtocolError::AlreadyConnected);
        }
        self.attach(channel)
    }

    fn attach(&mut self, mut channel: Box<dyn Channel>) -> Result<(), ProtocolError> {
        self.state = ConnectionState::Connecting;

        channel.set_timeout(Duration::from_millis(100))?;
        self.channel = Some(channel);

        if self.config.reset_on_connect {
            if let Err(e) = self.reset_rig() {
                warn!(error = %e, "reset handshake failed, session aborted");
                self.channel = None;
                self.state = ConnectionState::Error;
                return Err(e);
            }
        }

        // Drop bootloader chatter that arrived while the rig settled
        if let Some(ch) = self.channel.as_mut() {
            ch.clear_input_buffer()?;
        }

        self.state = ConnectionState::Connected;
        Ok(())
    }

    /// Disconnect from the rig, releasing the transport
    pub fn disconnect(&mut self) {
        self.channel = None;
        self.state = ConnectionState::Disconnected;
    }

    /// Hardware reset handshake over the DTR/RTS lines
    ///
    /// Deassert, settle, assert, settle, then wait out the bootloader. The
    /// long boot delay is not optional on real hardware: commands sent
    /// earlier are eaten by the bootloader and the rig appears locked.
    fn reset_rig(&mut self) -> Result<(), ProtocolError> {
        let settle = Duration::from_millis(self.config.reset_settle_ms);
        let boot = Duration::from_millis(self.config.boot_delay_ms);
        let channel = self.channel.as_mut().ok_or(ProtocolError::NotConnected)?;

        debug!("resetting rig via DTR/RTS");
        channel.set_reset_lines(false)?;
        thread::sleep(settle);
        channel.set_reset_lines(true)?;
        thread::sleep(settle);

        debug!(delay_ms = self.config.boot_delay_ms, "waiting for rig boot");
        thread::sleep(boot);
        Ok(())
    }

    /// Fire the rig and read back one measurement
    ///
    /// Blocks until the full fixed-size response has arrived or the deadline
    /// passes. The rig's timeout sentinel decodes to
    /// [`Measurement::TimedOut`]; every other decoded value is a tick count.
    pub fn measure(&mut self) -> Result<Measurement, ProtocolError> {
        if self.state != ConnectionState::Connected {
            return Err(ProtocolError::NotConnected);
        }
        let format = self.config.format;
        let deadline = Duration::from_millis(self.config.timeout_ms);
        let channel = self.channel.as_mut().ok_or(ProtocolError::NotConnected)?;

        // Stale bytes here would be decoded as part of our response
        channel.clear_input_buffer()?;

        debug!(command = FIRE_COMMAND, "sending fire command");
        channel.write_all(&[FIRE_COMMAND])?;
        channel.flush()?;

        let mut response = vec![0u8; format.response_len()];
        let started = Instant::now();
        read_exact_deadline(channel.as_mut(), &mut response, deadline)?;
        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            bytes = ?response,
            "response received"
        );

        let ticks = format.decode(&response)?;
        if ticks == TIMEOUT_SENTINEL {
            info!("rig reported timeout, no detection");
            Ok(Measurement::TimedOut)
        } else {
            info!(ticks, "measurement complete");
            Ok(Measurement::Ticks(ticks))
        }
    }
}

/// Read exactly `buf.len()` bytes within `deadline`
///
/// Polls `bytes_to_read()` instead of issuing blocking reads so a slow or
/// silent rig turns into a clean [`ProtocolError::Timeout`] rather than a
/// transport stall.
fn read_exact_deadline(
    channel: &mut dyn Channel,
    buf: &mut [u8],
    deadline: Duration,
) -> Result<(), ProtocolError> {
    let start = Instant::now();
    let mut offset = 0;

    while offset < buf.len() {
        if start.elapsed() > deadline {
            debug!(got = offset, want = buf.len(), "response deadline passed");
            return Err(ProtocolError::Timeout);
        }

        let available = channel.bytes_to_read()? as usize;
        if available == 0 {
            thread::sleep(Duration::from_millis(2));
            continue;
        }

        let to_read = available.min(buf.len() - offset);
        match channel.read(&mut buf[offset..offset + to_read]) {
            Ok(0) => return Err(ProtocolError::Timeout),
            Ok(n) => offset += n,
            Err(ref e)
                if e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::WouldBlock =>
            {
                continue;
            }
            Err(e) => return Err(ProtocolError::SerialError(e.to_string())),
        }
    }
    Ok(())
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.disconnect();
    }
}
