//! Monotonic time source injection.
//!
//! # Responsibilities
//! - Define the `Clock` trait the recorder measures phases against
//! - Provide the production monotonic implementation
//! - Provide a programmable test double for deterministic phase durations

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Source of monotonic instants.
///
/// The recorder never reads ambient time; it takes a `Clock` so tests can
/// simulate phase durations without real sockets or sleeps.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Production clock backed by `Instant::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Test clock that hands out a pre-programmed sequence of instants.
///
/// Each call to `now()` advances by the next queued offset; once the queue is
/// drained the clock stands still.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    elapsed: Mutex<Duration>,
    steps: Mutex<VecDeque<Duration>>,
}

impl ManualClock {
    pub fn new(step_ms: &[u64]) -> Self {
        Self {
            base: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
            steps: Mutex::new(step_ms.iter().map(|ms| Duration::from_millis(*ms)).collect()),
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let mut elapsed = self.elapsed.lock().unwrap();
        if let Some(step) = self.steps.lock().unwrap().pop_front() {
            *elapsed += step;
        }
        self.base + *elapsed
    }
}

/// Phase stopwatch over an injected clock.
///
/// `lap_ms` measures from the previous mark; `mark` resets the window without
/// attributing the elapsed time to any phase (the send gap before TTFB).
pub struct Stopwatch<'c, C: Clock + ?Sized> {
    clock: &'c C,
    origin: Instant,
    last: Instant,
}

impl<'c, C: Clock + ?Sized> Stopwatch<'c, C> {
    pub fn start(clock: &'c C) -> Self {
        let origin = clock.now();
        Self { clock, origin, last: origin }
    }

    /// Duration since the previous mark, in milliseconds; re-marks.
    pub fn lap_ms(&mut self) -> f64 {
        let now = self.clock.now();
        let lap = now.saturating_duration_since(self.last);
        self.last = now;
        lap.as_secs_f64() * 1000.0
    }

    /// Reset the lap window without recording a phase.
    pub fn mark(&mut self) {
        self.last = self.clock.now();
    }

    /// Total time since the stopwatch started.
    pub fn elapsed(&self) -> Duration {
        self.clock.now().saturating_duration_since(self.origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn laps_follow_programmed_steps() {
        let clock = ManualClock::new(&[0, 12, 30, 5]);
        let mut watch = Stopwatch::start(&clock);
        assert!((watch.lap_ms() - 12.0).abs() < 1e-9);
        assert!((watch.lap_ms() - 30.0).abs() < 1e-9);
        assert!((watch.lap_ms() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn mark_discards_the_window() {
        let clock = ManualClock::new(&[0, 100, 7]);
        let mut watch = Stopwatch::start(&clock);
        watch.mark();
        assert!((watch.lap_ms() - 7.0).abs() < 1e-9);
    }

    #[test]
    fn drained_clock_stands_still() {
        let clock = ManualClock::new(&[0]);
        let mut watch = Stopwatch::start(&clock);
        assert_eq!(watch.lap_ms(), 0.0);
        assert_eq!(watch.elapsed(), Duration::ZERO);
    }
}
