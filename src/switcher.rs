//! Hysteresis state machine arbitrating between the primary source and the
//! microphone fallback.
//!
//! Failover is deliberately asymmetric: switching to the microphone happens
//! quickly so the display never looks frozen, while switching back waits out
//! a longer stretch of recovered primary data so a brief notification chime
//! can't bounce the display off the microphone and back.

use serde::Serialize;
use tracing::debug;

/// Which source the arbitrator currently considers authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArbitrationState {
    UsingPrimary,
    UsingFallback,
}

/// A state change requested by the gate. The caller starts/stops the
/// fallback source and notifies observers; the gate itself is pure state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Silence threshold reached: start the fallback source.
    StartFallback,
    /// Recovery threshold reached: stop the fallback source.
    StopFallback,
}

/// Tick-counting hysteresis gate.
///
/// Fed one observation per primary-source frame: `filled` when the frame
/// carried signal, `empty` otherwise. Fallback-source frames are never fed
/// here; they bypass arbitration entirely.
pub struct FallbackGate {
    state: ArbitrationState,
    /// Consecutive empty primary ticks while using the primary.
    silence_ticks: u32,
    /// Consecutive filled primary ticks while using the fallback.
    activity_ticks: u32,
    ticks_before_fallback_start: u32,
    ticks_before_fallback_stop: u32,
    /// Set when a fallback start attempt failed; the gate stays on the
    /// primary and never retries on its own.
    disabled: bool,
}

impl FallbackGate {
    /// Creates a gate with the given tick thresholds.
    ///
    /// The silence counter starts pre-biased by `fuzz_ticks` short of the
    /// start threshold, so a data stream that is still initializing gets only
    /// a brief grace period rather than the full silence window.
    pub fn new(ticks_before_fallback_start: u32, ticks_before_fallback_stop: u32, fuzz_ticks: u32) -> Self {
        Self {
            state: ArbitrationState::UsingPrimary,
            silence_ticks: ticks_before_fallback_start.saturating_sub(fuzz_ticks),
            activity_ticks: 0,
            ticks_before_fallback_start: ticks_before_fallback_start.max(1),
            ticks_before_fallback_stop: ticks_before_fallback_stop.max(1),
            disabled: false,
        }
    }

    pub fn state(&self) -> ArbitrationState {
        self.state
    }

    /// Whether the primary source's frames should be fully processed and
    /// rendered (as opposed to cheaply scanned for recovery).
    pub fn primary_output_enabled(&self) -> bool {
        self.state == ArbitrationState::UsingPrimary
    }

    /// Feeds one primary-source observation into the gate. Returns the
    /// transition the caller must perform, if any; at most one transition is
    /// ever returned per observation.
    pub fn observe_primary(&mut self, filled: bool) -> Option<Transition> {
        match self.state {
            ArbitrationState::UsingPrimary => {
                if filled {
                    self.silence_ticks = 0;
                    return None;
                }
                if self.disabled {
                    return None;
                }
                self.silence_ticks += 1;
                if self.silence_ticks < self.ticks_before_fallback_start {
                    return None;
                }
                debug!(ticks = self.silence_ticks, "primary went silent, engaging fallback");
                self.state = ArbitrationState::UsingFallback;
                self.silence_ticks = 0;
                self.activity_ticks = 0;
                Some(Transition::StartFallback)
            }
            ArbitrationState::UsingFallback => {
                if !filled {
                    self.activity_ticks = 0;
                    return None;
                }
                self.activity_ticks += 1;
                if self.activity_ticks < self.ticks_before_fallback_stop {
                    return None;
                }
                debug!(ticks = self.activity_ticks, "primary recovered, releasing fallback");
                self.state = ArbitrationState::UsingPrimary;
                self.silence_ticks = 0;
                self.activity_ticks = 0;
                Some(Transition::StopFallback)
            }
        }
    }

    /// Records that starting the fallback source failed. The gate reverts to
    /// the primary and will not attempt the fallback again; structural
    /// misconfiguration is for the caller to fix, not for the gate to retry.
    pub fn fallback_start_failed(&mut self) {
        self.state = ArbitrationState::UsingPrimary;
        self.silence_ticks = 0;
        self.disabled = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Gate with the warm-up grace equal to the full silence window, so the
    /// counters behave unbiased from the first observation.
    fn gate(start: u32, stop: u32) -> FallbackGate {
        FallbackGate::new(start, stop, start)
    }

    #[test]
    fn stays_on_primary_below_threshold() {
        let mut gate = gate(5, 3);
        for _ in 0..4 {
            assert_eq!(gate.observe_primary(false), None);
        }
        assert_eq!(gate.state(), ArbitrationState::UsingPrimary);
    }

    #[test]
    fn switches_exactly_once_at_threshold() {
        let mut gate = gate(5, 3);
        for _ in 0..4 {
            assert_eq!(gate.observe_primary(false), None);
        }
        assert_eq!(gate.observe_primary(false), Some(Transition::StartFallback));
        assert_eq!(gate.state(), ArbitrationState::UsingFallback);
        // Continued silence never re-fires the transition.
        for _ in 0..20 {
            assert_eq!(gate.observe_primary(false), None);
        }
    }

    #[test]
    fn filled_frame_resets_silence_counter() {
        let mut gate = gate(5, 3);
        for _ in 0..4 {
            assert_eq!(gate.observe_primary(false), None);
        }
        assert_eq!(gate.observe_primary(true), None);
        for _ in 0..4 {
            assert_eq!(gate.observe_primary(false), None);
        }
        assert_eq!(gate.state(), ArbitrationState::UsingPrimary);
    }

    #[test]
    fn recovery_requires_sustained_activity() {
        let mut gate = gate(2, 3);
        gate.observe_primary(false);
        assert_eq!(gate.observe_primary(false), Some(Transition::StartFallback));

        // A two-tick chime isn't enough to switch back.
        assert_eq!(gate.observe_primary(true), None);
        assert_eq!(gate.observe_primary(true), None);
        assert_eq!(gate.observe_primary(false), None);
        assert_eq!(gate.state(), ArbitrationState::UsingFallback);

        // Three consecutive filled ticks are.
        assert_eq!(gate.observe_primary(true), None);
        assert_eq!(gate.observe_primary(true), None);
        assert_eq!(gate.observe_primary(true), Some(Transition::StopFallback));
        assert_eq!(gate.state(), ArbitrationState::UsingPrimary);
    }

    #[test]
    fn warm_up_fuzz_pre_biases_silence_counter() {
        // Threshold 20 with fuzz 10: only 10 silent ticks needed at startup.
        let mut gate = FallbackGate::new(20, 3, 10);
        for _ in 0..9 {
            assert_eq!(gate.observe_primary(false), None);
        }
        assert_eq!(gate.observe_primary(false), Some(Transition::StartFallback));
    }

    #[test]
    fn failed_fallback_start_is_not_retried() {
        let mut gate = gate(2, 3);
        gate.observe_primary(false);
        assert_eq!(gate.observe_primary(false), Some(Transition::StartFallback));
        gate.fallback_start_failed();
        assert_eq!(gate.state(), ArbitrationState::UsingPrimary);
        for _ in 0..50 {
            assert_eq!(gate.observe_primary(false), None);
        }
    }

    #[test]
    fn full_cycle_round_trip() {
        let mut gate = gate(3, 2);
        for _ in 0..2 {
            gate.observe_primary(false);
        }
        assert_eq!(gate.observe_primary(false), Some(Transition::StartFallback));
        gate.observe_primary(true);
        assert_eq!(gate.observe_primary(true), Some(Transition::StopFallback));
        // Counters reset: the next silence window is the full threshold.
        gate.observe_primary(false);
        gate.observe_primary(false);
        assert_eq!(gate.observe_primary(false), Some(Transition::StartFallback));
    }
}
