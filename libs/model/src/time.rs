//! Time service: a monotonic wall clock for real timestamps, plus a
//! simulated clock the dispatcher can substitute in for reproducible runs.
//!
//! The simulated clock is carried over from the original as the stub it
//! always was: it reports a fixed instant rather than advancing. That is a
//! fact about this system, not a placeholder awaiting a real implementation.

use std::time::{SystemTime, UNIX_EPOCH};

/// A 64-bit packed timestamp: seconds in the high 32 bits, a sub-second
/// fraction in the low 32. The fraction is always zero (see module docs);
/// the packing exists so wire consumers see the field width they expect.
pub fn pack(seconds: u32, fraction: u32) -> u64 {
    ((seconds as u64) << 32) | (fraction as u64)
}

pub fn unpack(packed: u64) -> (u32, u32) {
    ((packed >> 32) as u32, packed as u32)
}

/// Real wall-clock time, truncated to whole seconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct WallClock;

impl WallClock {
    pub fn now_packed(&self) -> u64 {
        let seconds = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);
        pack(seconds, 0)
    }
}

/// The simulated clock. `now()` always returns zero: nothing in this
/// dispatcher advances simulated time yet, matching the original.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulationClock;

impl SimulationClock {
    pub fn now_packed(&self) -> u64 {
        pack(0, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack_round_trips() {
        let packed = pack(12345, 0);
        assert_eq!(unpack(packed), (12345, 0));
    }

    #[test]
    fn simulation_clock_is_always_zero() {
        let clock = SimulationClock;
        assert_eq!(clock.now_packed(), 0);
    }

    #[test]
    fn wall_clock_reports_nonzero_seconds() {
        let clock = WallClock;
        let (seconds, fraction) = unpack(clock.now_packed());
        assert!(seconds > 0);
        assert_eq!(fraction, 0);
    }
}
