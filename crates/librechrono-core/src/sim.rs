//! Simulated rig - runs the capture engine without hardware
//!
//! Stands in for a real chronograph rig during development and testing: the
//! same [`CaptureEngine`] state machine, driven by a scripted "range" that
//! decides when (or whether) the projectile reaches the sensor, served over
//! any byte stream. The CLI exposes it over TCP so a host connection can be
//! exercised end to end on one machine.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::{self, Read, Write};
use std::net::{TcpListener, ToSocketAddrs};
use tracing::{debug, info, trace};

use crate::capture::{CaptureEngine, TimerConfig, TIMEOUT_SENTINEL};
use crate::protocol::{WireFormat, FIRE_COMMAND};

/// Scripted physical range: decides the detection tick for each shot
pub struct SimulatedRange {
    /// Nominal detection tick; `None` means the projectile never reaches the
    /// sensor and every cycle times out
    detection_tick: Option<u64>,
    /// Uniform jitter applied around the nominal tick
    jitter_ticks: u64,
    rng: StdRng,
}

impl SimulatedRange {
    /// Range with a fixed detection tick (or none at all)
    pub fn new(detection_tick: Option<u64>) -> Self {
        Self {
            detection_tick,
            jitter_ticks: 0,
            rng: StdRng::from_entropy(),
        }
    }

    /// Range with uniform jitter around the nominal detection tick
    pub fn with_jitter(detection_tick: u64, jitter_ticks: u64) -> Self {
        Self {
            detection_tick: Some(detection_tick),
            jitter_ticks,
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministically seeded variant of [`with_jitter`](Self::with_jitter)
    pub fn seeded(detection_tick: u64, jitter_ticks: u64, seed: u64) -> Self {
        Self {
            detection_tick: Some(detection_tick),
            jitter_ticks,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Detection tick for the next shot
    fn next_detection(&mut self) -> Option<u64> {
        let nominal = self.detection_tick?;
        if self.jitter_ticks == 0 {
            return Some(nominal);
        }
        let low = nominal.saturating_sub(self.jitter_ticks);
        let high = nominal + self.jitter_ticks;
        Some(self.rng.gen_range(low..=high))
    }
}

/// Run one fire→measure→report cycle against the engine
///
/// Replays the interrupt sequence a real shot would produce: fast-timer
/// overflows and elapsed watchdog ticks leading up to the detection edge, or
/// the full watchdog budget when the projectile never arrives. A detection
/// scheduled past the watchdog window times out, exactly as on hardware.
pub fn run_cycle(engine: &mut CaptureEngine, range: &mut SimulatedRange) -> u32 {
    engine.arm_and_fire();
    let window = engine.config().timeout_window_ticks();
    let ticks_per_slow = engine.config().fast_ticks_per_slow_tick();
    let budget = engine.config().timeout_budget;

    match range.next_detection() {
        Some(tick) if tick < window => {
            for _ in 0..(tick / ticks_per_slow) {
                engine.on_slow_tick();
            }
            for _ in 0..(tick >> 16) {
                engine.on_fast_overflow();
            }
            engine.on_detection((tick & 0xFFFF) as u16);
        }
        scheduled => {
            if let Some(tick) = scheduled {
                debug!(tick, window, "detection scheduled past watchdog window");
            }
            for _ in 0..budget {
                engine.on_slow_tick();
            }
        }
    }

    // an armed cycle always finalizes through one of the two paths above
    engine.poll_result().unwrap_or(TIMEOUT_SENTINEL)
}

/// Device main loop over a byte stream
///
/// Blocks on command receipt, fires on `'f'`, writes the encoded response.
/// Anything that is not the fire command is noise (bootloader chatter, line
/// garbage) and is dropped without disturbing the engine. Returns when the
/// peer closes the stream.
pub fn serve<S: Read + Write>(
    stream: &mut S,
    engine: &mut CaptureEngine,
    range: &mut SimulatedRange,
    format: WireFormat,
) -> io::Result<()> {
    let mut byte = [0u8; 1];
    loop {
        match stream.read(&mut byte) {
            Ok(0) => return Ok(()),
            Ok(_) if byte[0] == FIRE_COMMAND => {
                let ticks = run_cycle(engine, range);
                stream.write_all(&format.encode(ticks))?;
                stream.flush()?;
            }
            Ok(_) => trace!(byte = byte[0], "ignoring non-command byte"),
            Err(ref e)
                if e.kind() == io::ErrorKind::TimedOut
                    || e.kind() == io::ErrorKind::WouldBlock =>
            {
                continue;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Serve the simulated rig over TCP, one connection at a time
///
/// Each connection gets a fresh engine, mirroring a rig power-cycled between
/// sessions. Runs until the listener fails.
pub fn serve_tcp<A: ToSocketAddrs>(
    addr: A,
    config: TimerConfig,
    range: &mut SimulatedRange,
    format: WireFormat,
) -> io::Result<()> {
    let listener = TcpListener::bind(addr)?;
    info!(addr = %listener.local_addr()?, "simulated rig listening");

    for stream in listener.incoming() {
        let mut stream = stream?;
        info!(peer = %stream.peer_addr()?, "host connected");
        let mut engine = CaptureEngine::new(config);
        match serve(&mut stream, &mut engine, range, format) {
            Ok(()) => info!("host disconnected"),
            Err(e) => info!(error = %e, "connection dropped"),
        }
    }
    Ok(())
}
