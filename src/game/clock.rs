//! Cooperative Tick Scheduling
//!
//! One tick drives both participant simulations. The tick re-arms itself at
//! its own end, but only if the handle it started with is still current:
//! cancelling bumps the generation so a tick in flight can never re-arm a
//! stopped loop, and a later `arm` never produces two pending ticks.

use std::time::Instant;

/// Identifies one armed run of the loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickHandle(u64);

/// A tick that is allowed to run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickFrame {
    /// Handle to pass back to [`TickScheduler::end_tick`]
    pub handle: TickHandle,
    /// Wall-clock milliseconds since the previous tick (0 on the first)
    pub delta_ms: f64,
}

/// Self-rescheduling tick loop with an explicit cancel handle.
#[derive(Debug, Default)]
pub struct TickScheduler {
    generation: u64,
    pending: bool,
    last: Option<Instant>,
}

impl TickScheduler {
    /// Create an idle scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new run of the loop. No-op if one is already pending.
    pub fn arm(&mut self, now: Instant) -> TickHandle {
        if !self.pending {
            self.generation += 1;
            self.pending = true;
            self.last = Some(now);
        }
        TickHandle(self.generation)
    }

    /// Cancel the loop. A tick in flight will not re-arm.
    pub fn cancel(&mut self) {
        self.generation += 1;
        self.pending = false;
        self.last = None;
    }

    /// Whether a tick is scheduled.
    pub fn is_armed(&self) -> bool {
        self.pending
    }

    /// Consume the pending tick, if any, and measure elapsed time.
    pub fn begin_tick(&mut self, now: Instant) -> Option<TickFrame> {
        if !self.pending {
            return None;
        }
        self.pending = false;

        let delta_ms = self
            .last
            .map(|last| now.saturating_duration_since(last).as_secs_f64() * 1000.0)
            .unwrap_or(0.0);
        self.last = Some(now);

        Some(TickFrame { handle: TickHandle(self.generation), delta_ms })
    }

    /// Re-arm for the next frame. Returns false if the loop was cancelled
    /// (or restarted) while the tick ran.
    pub fn end_tick(&mut self, handle: TickHandle) -> bool {
        if handle.0 != self.generation || self.pending {
            return false;
        }
        self.pending = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_idle_scheduler_does_not_tick() {
        let mut clock = TickScheduler::new();
        assert!(clock.begin_tick(Instant::now()).is_none());
    }

    #[test]
    fn test_first_tick_has_zero_delta() {
        let t0 = Instant::now();
        let mut clock = TickScheduler::new();
        clock.arm(t0);

        let frame = clock.begin_tick(t0).unwrap();
        assert_eq!(frame.delta_ms, 0.0);
    }

    #[test]
    fn test_delta_between_ticks() {
        let t0 = Instant::now();
        let mut clock = TickScheduler::new();
        clock.arm(t0);

        let frame = clock.begin_tick(t0).unwrap();
        assert!(clock.end_tick(frame.handle));

        let frame = clock.begin_tick(t0 + Duration::from_millis(16)).unwrap();
        assert!((frame.delta_ms - 16.0).abs() < 1e-9);
    }

    #[test]
    fn test_tick_without_rearm_stops() {
        let t0 = Instant::now();
        let mut clock = TickScheduler::new();
        clock.arm(t0);
        clock.begin_tick(t0).unwrap();
        assert!(clock.begin_tick(t0).is_none());
    }

    #[test]
    fn test_cancel_during_tick_prevents_rearm() {
        let t0 = Instant::now();
        let mut clock = TickScheduler::new();
        clock.arm(t0);

        let frame = clock.begin_tick(t0).unwrap();
        clock.cancel();
        assert!(!clock.end_tick(frame.handle));
        assert!(!clock.is_armed());
        assert!(clock.begin_tick(t0 + Duration::from_millis(16)).is_none());
    }

    #[test]
    fn test_restart_during_tick_keeps_single_pending() {
        let t0 = Instant::now();
        let mut clock = TickScheduler::new();
        clock.arm(t0);

        let frame = clock.begin_tick(t0).unwrap();
        clock.cancel();
        clock.arm(t0);

        // The stale tick must not add a second pending run.
        assert!(!clock.end_tick(frame.handle));
        assert!(clock.begin_tick(t0).is_some());
        assert!(clock.begin_tick(t0).is_none());
    }

    #[test]
    fn test_arm_is_idempotent() {
        let t0 = Instant::now();
        let mut clock = TickScheduler::new();
        let a = clock.arm(t0);
        let b = clock.arm(t0 + Duration::from_millis(5));
        assert_eq!(a, b);

        let frame = clock.begin_tick(t0 + Duration::from_millis(10)).unwrap();
        assert!((frame.delta_ms - 10.0).abs() < 1e-9);
    }
}
