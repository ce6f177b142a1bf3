//! Serial Protocol Communication
//!
//! Implements the chronograph rig's command/response protocol over a serial
//! link: a single fire command byte, a fixed-size tick-count response, and a
//! DTR/RTS reset handshake for Arduino-style rigs.
//!
//! Supports both the canonical raw 4-byte response and the legacy 8-byte
//! ASCII-hex response of earlier firmware revisions.

mod codec;
mod connection;
mod error;
pub mod serial;
pub mod stream;

pub use codec::WireFormat;
pub use connection::{Connection, ConnectionConfig, ConnectionState, Measurement};
pub use error::ProtocolError;
pub use serial::{configure_port, list_ports, open_port, PortInfo};

/// Command byte that arms the rig and fires the trigger
pub const FIRE_COMMAND: u8 = b'f';

/// Default baud rate for rig communication
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default timeout for responses in milliseconds
///
/// The rig's own watchdog window is ~2 s; the host deadline adds margin so a
/// device-reported timeout is never misread as a transport failure.
pub const DEFAULT_TIMEOUT_MS: u64 = 3000;

/// Settle delay after toggling the DTR/RTS reset lines, milliseconds
pub const RESET_SETTLE_MS: u64 = 50;

/// Boot delay after releasing reset before the rig accepts commands,
/// milliseconds. Removing this leaves the bootloader holding the port.
pub const BOOT_DELAY_MS: u64 = 1000;
