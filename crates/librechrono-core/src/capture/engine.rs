//! Capture engine state machine
//!
//! One fire→measure→report cycle per accepted command. The engine guarantees
//! that exactly one of {valid counter, timeout sentinel} is produced per
//! cycle: every path that finalizes a result stops both counters before
//! touching the counter halves, and the main loop only reads them after
//! observing `Done`.

use tracing::{debug, warn};

use super::timer::{combine, TimerConfig};

/// Lifecycle of a single measurement cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// At rest, ready to accept a fire command
    Idle,
    /// Counters running, waiting for detection or timeout
    Armed,
    /// Result finalized, waiting for the main loop to drain it
    Done,
}

/// Device-side time-of-flight capture engine
///
/// On the reference hardware the fields below are file-scope volatiles shared
/// between three interrupt handlers and the main loop. Modeling them as one
/// struct with interrupt delivery through `&mut self` makes the handlers
/// mutually exclusive by construction, which is the discipline the hardware
/// version has to get from stop-counters-before-latch ordering.
pub struct CaptureEngine {
    config: TimerConfig,
    state: CaptureState,
    /// Overflow tally of the fast timer (upper 16 bits of the counter)
    high_part: u16,
    /// Fast-timer value latched at the moment of detection (lower 16 bits)
    low_part: u16,
    /// Watchdog countdown, decremented per slow-timer overflow
    timeout_left: u8,
    /// Clock gate for both counters; cleared before any result is finalized
    counters_running: bool,
}

impl CaptureEngine {
    /// Create an engine at rest
    pub fn new(config: TimerConfig) -> Self {
        Self {
            config,
            state: CaptureState::Idle,
            high_part: 0,
            low_part: 0,
            timeout_left: config.timeout_budget,
            counters_running: false,
        }
    }

    /// Clock tree configuration this engine was built with
    pub fn config(&self) -> &TimerConfig {
        &self.config
    }

    /// Current cycle state
    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Accept a fire command: reset the counters and watchdog, start both
    /// timers, and issue the trigger pulse.
    ///
    /// A fire command received while a cycle is still outstanding (`Armed`
    /// or an undrained `Done`) is ignored; the rig is single-shot and the
    /// in-flight measurement keeps running. The original firmware left this
    /// case to chance by resetting unconditionally.
    pub fn arm_and_fire(&mut self) {
        if self.state != CaptureState::Idle {
            warn!(state = ?self.state, "fire command while cycle outstanding, ignoring");
            return;
        }

        self.high_part = 0;
        self.low_part = 0;
        self.timeout_left = self.config.timeout_budget;
        // Both counters start in the same instruction window on hardware;
        // one flag models that synchronous start.
        self.counters_running = true;
        self.state = CaptureState::Armed;
        debug!("armed, trigger pulse issued");
    }

    /// Drain the completed result, returning the engine to `Idle`
    ///
    /// Non-blocking: `None` while the cycle is still armed (or never started).
    /// Once `Done`, both interrupt sources have already stopped the counters,
    /// so the two halves are stable when read here.
    pub fn poll_result(&mut self) -> Option<u32> {
        if self.state != CaptureState::Done {
            return None;
        }
        self.state = CaptureState::Idle;
        Some(combine(self.high_part, self.low_part))
    }

    /// Detection edge interrupt: the sensor saw the projectile
    ///
    /// `latched_low` is the fast-timer value captured at the edge. Counters
    /// are stopped before the latch is stored so the overflow interrupt can
    /// no longer race the final value.
    pub fn on_detection(&mut self, latched_low: u16) {
        if !self.active() {
            return;
        }
        self.counters_running = false;
        self.low_part = latched_low;
        self.state = CaptureState::Done;
        debug!(
            high = self.high_part,
            low = self.low_part,
            "detection, counters stopped"
        );
    }

    /// Fast-timer overflow interrupt: one full 2^16-tick wraparound elapsed
    pub fn on_fast_overflow(&mut self) {
        if !self.active() {
            return;
        }
        self.high_part = self.high_part.wrapping_add(1);
    }

    /// Slow-timer overflow interrupt: one watchdog tick elapsed
    ///
    /// When the budget reaches zero the cycle is declared timed out: counters
    /// stop and both halves are forced to `0xFFFF`, producing the sentinel.
    pub fn on_slow_tick(&mut self) {
        if !self.active() {
            return;
        }
        self.timeout_left = self.timeout_left.saturating_sub(1);
        if self.timeout_left == 0 {
            self.counters_running = false;
            self.high_part = 0xFFFF;
            self.low_part = 0xFFFF;
            self.state = CaptureState::Done;
            debug!("watchdog expired, reporting timeout sentinel");
        }
    }

    /// An interrupt source may only act while armed with counters running;
    /// once either finalizing path has stopped the counters, late interrupts
    /// are no-ops.
    fn active(&self) -> bool {
        self.state == CaptureState::Armed && self.counters_running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::timer::TIMEOUT_SENTINEL;
    use pretty_assertions::assert_eq;

    fn engine() -> CaptureEngine {
        CaptureEngine::new(TimerConfig::default())
    }

    #[test]
    fn test_detection_yields_combined_ticks() {
        let mut eng = engine();
        eng.arm_and_fire();
        assert_eq!(eng.state(), CaptureState::Armed);
        assert_eq!(eng.poll_result(), None);

        // two full wraps plus a latch of 0x1234
        eng.on_fast_overflow();
        eng.on_fast_overflow();
        eng.on_detection(0x1234);

        assert_eq!(eng.state(), CaptureState::Done);
        assert_eq!(eng.poll_result(), Some(0x0002_1234));
        assert_eq!(eng.state(), CaptureState::Idle);
    }

    #[test]
    fn test_watchdog_expiry_yields_sentinel() {
        let mut eng = engine();
        eng.arm_and_fire();
        let budget = eng.config().timeout_budget;
        for _ in 0..budget {
            eng.on_slow_tick();
        }
        assert_eq!(eng.poll_result(), Some(TIMEOUT_SENTINEL));
    }

    #[test]
    fn test_slow_ticks_below_budget_do_not_finalize() {
        let mut eng = engine();
        eng.arm_and_fire();
        let budget = eng.config().timeout_budget;
        for _ in 0..budget - 1 {
            eng.on_slow_tick();
        }
        assert_eq!(eng.state(), CaptureState::Armed);
        eng.on_detection(500);
        assert_eq!(eng.poll_result(), Some(500));
    }

    #[test]
    fn test_interrupts_after_stop_are_ignored() {
        let mut eng = engine();
        eng.arm_and_fire();
        eng.on_detection(100);

        // late overflow and watchdog interrupts must not disturb the result
        eng.on_fast_overflow();
        eng.on_slow_tick();
        eng.on_detection(999);

        assert_eq!(eng.poll_result(), Some(100));
    }

    #[test]
    fn test_fire_while_armed_is_ignored() {
        let mut eng = engine();
        eng.arm_and_fire();
        eng.on_fast_overflow();

        // second fire must not reset the running cycle
        eng.arm_and_fire();
        eng.on_detection(7);
        assert_eq!(eng.poll_result(), Some(combine(1, 7)));
    }

    #[test]
    fn test_fire_while_done_is_ignored_until_drained() {
        let mut eng = engine();
        eng.arm_and_fire();
        eng.on_detection(42);

        eng.arm_and_fire();
        assert_eq!(eng.state(), CaptureState::Done);
        assert_eq!(eng.poll_result(), Some(42));

        // drained, a new cycle may start
        eng.arm_and_fire();
        assert_eq!(eng.state(), CaptureState::Armed);
    }

    #[test]
    fn test_interrupts_while_idle_are_ignored() {
        let mut eng = engine();
        eng.on_detection(5);
        eng.on_fast_overflow();
        eng.on_slow_tick();
        assert_eq!(eng.state(), CaptureState::Idle);
        assert_eq!(eng.poll_result(), None);
    }
}
