//! Timer configuration and combined-counter arithmetic
//!
//! The rig counts elapsed time with two hardware timers: a fast free-running
//! 16-bit timer whose overflows are tallied into a second 16-bit count, and a
//! slow prescaled timer that drives the timeout watchdog. The effective tick
//! count is the two 16-bit halves glued into a u32.

/// Reserved counter value meaning "timed out, no detection occurred".
///
/// Produced by forcing both halves to `0xFFFF` when the watchdog expires.
/// [`TimerConfig::timeout_window_ticks`] guarantees a genuine capture can
/// never reach this value before the watchdog fires.
pub const TIMEOUT_SENTINEL: u32 = 0xFFFF_FFFF;

/// Assemble the combined counter from the overflow tally and the fast-timer latch
#[inline]
pub fn combine(high_part: u16, low_part: u16) -> u32 {
    (u32::from(high_part) << 16) | u32::from(low_part)
}

/// Split a combined counter back into `(high_part, low_part)`
#[inline]
pub fn split(counter: u32) -> (u16, u16) {
    ((counter >> 16) as u16, (counter & 0xFFFF) as u16)
}

/// Clock tree configuration of the capture rig
///
/// The timeout window is not a magic constant: it is derived from the CPU
/// clock, the two prescalers, and the watchdog budget. The defaults describe
/// the reference rig (16 MHz AVR, fast timer at clk/8, slow timer at clk/1024
/// with an 8-bit modulus), which puts one slow tick at ~16.4 ms and the
/// default budget of 122 at ~2.0 s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerConfig {
    /// CPU clock frequency in Hz
    pub cpu_hz: u32,
    /// Prescaler feeding the fast free-running timer
    pub fast_prescaler: u32,
    /// Prescaler feeding the slow watchdog timer
    pub slow_prescaler: u32,
    /// Counts per slow-timer overflow (256 for an 8-bit timer)
    pub slow_modulus: u32,
    /// Watchdog countdown: slow-timer overflows before a cycle is declared
    /// timed out
    pub timeout_budget: u8,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            cpu_hz: 16_000_000,
            fast_prescaler: 8,
            slow_prescaler: 1024,
            slow_modulus: 256,
            timeout_budget: 122,
        }
    }
}

impl TimerConfig {
    /// Fast-timer tick rate in Hz (the device's native time unit)
    pub fn fast_tick_hz(&self) -> u32 {
        self.cpu_hz / self.fast_prescaler
    }

    /// Fast ticks elapsed per slow-timer overflow
    pub fn fast_ticks_per_slow_tick(&self) -> u64 {
        u64::from(self.slow_prescaler) * u64::from(self.slow_modulus) / u64::from(self.fast_prescaler)
    }

    /// Maximum fast ticks a cycle can accumulate before the watchdog expires
    ///
    /// This bounds the largest combined counter a genuine capture can report,
    /// which must stay below [`TIMEOUT_SENTINEL`] for the sentinel to remain
    /// unambiguous on the wire.
    pub fn timeout_window_ticks(&self) -> u64 {
        u64::from(self.timeout_budget) * self.fast_ticks_per_slow_tick()
    }

    /// Approximate timeout window in seconds, for display
    pub fn timeout_secs(&self) -> f64 {
        self.timeout_window_ticks() as f64 / self.fast_tick_hz() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_combine_bit_layout() {
        assert_eq!(combine(0, 0), 0);
        assert_eq!(combine(0, 1), 1);
        assert_eq!(combine(1, 0), 0x0001_0000);
        assert_eq!(combine(0x0001, 0x86A0), 100_000);
        assert_eq!(combine(0xFFFF, 0xFFFF), TIMEOUT_SENTINEL);
    }

    #[test]
    fn test_combine_split_roundtrip() {
        for &(h, l) in &[
            (0u16, 0u16),
            (0, 0xFFFF),
            (0xFFFF, 0),
            (0x1234, 0x5678),
            (0xFFFE, 0xFFFF),
        ] {
            assert_eq!(split(combine(h, l)), (h, l));
        }
        for &v in &[0u32, 1, 50_000, 0xDEAD_BEEF, u32::MAX - 1] {
            let (h, l) = split(v);
            assert_eq!(combine(h, l), v);
        }
    }

    #[test]
    fn test_sentinel_unreachable_with_default_config() {
        let config = TimerConfig::default();
        // A genuine capture is bounded by the watchdog window; the sentinel
        // must stay strictly out of that range.
        assert!(config.timeout_window_ticks() < u64::from(TIMEOUT_SENTINEL));
    }

    #[test]
    fn test_reference_config_window_is_about_two_seconds() {
        let config = TimerConfig::default();
        assert_eq!(config.fast_tick_hz(), 2_000_000);
        assert_eq!(config.fast_ticks_per_slow_tick(), 32_768);
        let secs = config.timeout_secs();
        assert!((1.9..2.1).contains(&secs), "window was {} s", secs);
    }
}
