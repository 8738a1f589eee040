use std::time::{Duration, Instant};

/// Duration and throughput of the epoch that was just recorded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochTiming {
    pub duration: Duration,
    /// Epochs per second, from this epoch alone. Infinite for a zero duration.
    pub speed: f64,
}

impl EpochTiming {
    /// Estimate for `epochs_left` more epochs at this epoch's pace.
    pub fn remaining_secs(&self, epochs_left: usize) -> f64 {
        if epochs_left == 0 {
            return 0.0;
        }
        epochs_left as f64 / self.speed
    }
}

/// Wall-clock bookkeeping for the epoch loop.
///
/// Only time between `start` and the following `record` calls is counted, so
/// pauses between two `run` invocations never inflate `elapsed_secs`.
#[derive(Debug, Clone, Default)]
pub struct EpochTimer {
    last_stamp: Option<Instant>,
    elapsed_secs: f64,
}

impl EpochTimer {
    pub fn new() -> Self {
        EpochTimer::default()
    }

    pub fn start(&mut self) {
        self.last_stamp = Some(Instant::now());
    }

    /// Closes the current epoch: adds its duration to the elapsed total and
    /// re-stamps for the next one.
    pub fn record(&mut self) -> EpochTiming {
        self.record_at(Instant::now())
    }

    fn record_at(&mut self, now: Instant) -> EpochTiming {
        let duration = match self.last_stamp {
            Some(stamp) => now.saturating_duration_since(stamp),
            None => Duration::ZERO,
        };
        self.last_stamp = Some(now);
        self.elapsed_secs += duration.as_secs_f64();

        let secs = duration.as_secs_f64();
        let speed = if secs > 0.0 { 1.0 / secs } else { f64::INFINITY };
        EpochTiming { duration, speed }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed_secs
    }

    pub fn reset(&mut self) {
        self.elapsed_secs = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn record_accumulates_deltas() {
        let mut timer = EpochTimer::new();
        let t0 = Instant::now();
        timer.last_stamp = Some(t0);

        let first = timer.record_at(t0 + Duration::from_millis(500));
        assert_abs_diff_eq!(first.speed, 2.0, epsilon = 1e-9);

        let second = timer.record_at(t0 + Duration::from_millis(1500));
        assert_abs_diff_eq!(second.speed, 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(timer.elapsed_secs(), 1.5, epsilon = 1e-9);
    }

    #[test]
    fn zero_duration_gives_infinite_speed() {
        let mut timer = EpochTimer::new();
        let t0 = Instant::now();
        timer.last_stamp = Some(t0);
        let timing = timer.record_at(t0);
        assert!(timing.speed.is_infinite());
        assert_eq!(timing.remaining_secs(3), 0.0);
        assert_eq!(timing.remaining_secs(0), 0.0);
    }

    #[test]
    fn remaining_scales_with_last_duration() {
        let timing = EpochTiming { duration: Duration::from_secs(2), speed: 0.5 };
        assert_abs_diff_eq!(timing.remaining_secs(4), 8.0);
    }

    #[test]
    fn reset_zeroes_elapsed() {
        let mut timer = EpochTimer::new();
        timer.start();
        timer.record();
        timer.reset();
        assert_eq!(timer.elapsed_secs(), 0.0);
    }
}
