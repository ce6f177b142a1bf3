//! # LibreChrono Core Library
//!
//! Core functionality for the LibreChrono chronograph software.
//!
//! This library provides:
//! - The device-side capture engine (dual-timer tick counter, timeout
//!   watchdog, fire/wait/report state machine)
//! - Serial protocol communication with capture rigs
//! - A simulated capture rig for development and testing
//!
//! ## Supported rigs
//!
//! - Arduino-based trigger/sensor rigs speaking the raw 4-byte protocol
//! - Earlier firmware revisions speaking the 8-byte ASCII-hex protocol
//!
//! ## Example
//!
//! ```rust,ignore
//! use librechrono_core::protocol::{Connection, ConnectionConfig, Measurement};
//!
//! let mut conn = Connection::new(ConnectionConfig {
//!     port_name: "/dev/ttyACM0".to_string(),
//!     ..Default::default()
//! });
//! conn.connect()?;
//!
//! match conn.measure()? {
//!     Measurement::Ticks(ticks) => println!("time of flight: {} ticks", ticks),
//!     Measurement::TimedOut => println!("no detection before timeout"),
//! }
//! ```

#![warn(missing_docs)]

pub mod capture;
pub mod protocol;
pub mod sim;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::capture::{CaptureEngine, CaptureState, TimerConfig, TIMEOUT_SENTINEL};
    pub use crate::protocol::{
        Connection, ConnectionConfig, ConnectionState, Measurement, ProtocolError, WireFormat,
    };
    pub use crate::sim::SimulatedRange;
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
