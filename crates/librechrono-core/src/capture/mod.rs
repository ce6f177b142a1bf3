//! Time-of-flight capture engine
//!
//! Models the device side of a chronograph rig: a 32-bit tick counter
//! assembled from two 16-bit hardware timers, a slow-timer timeout watchdog,
//! and the fire/wait/report state machine that ties them together.
//!
//! On the reference hardware these pieces live in interrupt handlers racing a
//! bare-metal main loop. Here every interrupt source is an explicit method on
//! [`CaptureEngine`], so delivery through `&mut self` plays the role of the
//! disable-interrupts critical section.

mod engine;
mod timer;

pub use engine::{CaptureEngine, CaptureState};
pub use timer::{combine, split, TimerConfig, TIMEOUT_SENTINEL};
