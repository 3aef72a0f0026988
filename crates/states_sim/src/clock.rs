//! Logical tick counter with optional wall-clock pacing.
//!
//! The [`Clock`] never sleeps or spawns anything: the driver passes the
//! current [`Instant`] to [`due`](Clock::due) and runs as many ticks as it
//! reports. A tick always completes before the next one starts.

use std::time::{Duration, Instant};

/// Smallest accepted period.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Counts simulation ticks and schedules them while autoplay is running.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Clock {
    period: Duration,
    ticks: u64,
    /// Instant of the next due tick; `None` while stopped.
    next_due: Option<Instant>,
}

impl Clock {
    /// Creates a stopped clock. Periods shorter than one millisecond are
    /// raised to one millisecond.
    pub fn new(period: Duration) -> Self {
        Self {
            period: period.max(MIN_PERIOD),
            ticks: 0,
            next_due: None,
        }
    }

    /// The autoplay period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Changes the autoplay period; takes effect from the next due tick.
    pub fn set_period(&mut self, period: Duration) {
        self.period = period.max(MIN_PERIOD);
    }

    /// Number of ticks counted since the last [`reset`](Self::reset).
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Counts one tick and returns the new count.
    pub fn advance(&mut self) -> u64 {
        self.ticks += 1;
        self.ticks
    }

    /// Zeroes the tick counter. Autoplay state is kept.
    pub fn reset(&mut self) {
        self.ticks = 0;
    }

    /// Starts autoplay; the first tick is due one period after `now`.
    pub fn start(&mut self, now: Instant) {
        self.next_due = Some(now + self.period);
    }

    /// Stops autoplay. Ticks already counted are kept.
    pub fn stop(&mut self) {
        self.next_due = None;
    }

    /// Returns `true` while autoplay is running.
    pub fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    /// Returns how many ticks became due at `now` and schedules the next one.
    ///
    /// Always 0 while stopped.
    pub fn due(&mut self, now: Instant) -> u64 {
        let Some(next) = self.next_due else {
            return 0;
        };
        if now < next {
            return 0;
        }
        let late = now.duration_since(next).as_nanos();
        let period = self.period.as_nanos();
        let count = u64::try_from(late / period + 1).unwrap_or(u64::MAX);
        let skip = u32::try_from(count).unwrap_or(u32::MAX);
        self.next_due = Some(next + self.period.saturating_mul(skip));
        count
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopped_clock_is_never_due() {
        let mut clock = Clock::new(Duration::from_millis(10));
        assert!(!clock.is_running());
        assert_eq!(clock.due(Instant::now() + Duration::from_secs(5)), 0);
    }

    #[test]
    fn due_counts_elapsed_periods() {
        let start = Instant::now();
        let mut clock = Clock::new(Duration::from_millis(100));
        clock.start(start);
        assert!(clock.is_running());
        assert_eq!(clock.due(start + Duration::from_millis(50)), 0);
        assert_eq!(clock.due(start + Duration::from_millis(100)), 1);
        assert_eq!(clock.due(start + Duration::from_millis(150)), 0);
        assert_eq!(clock.due(start + Duration::from_millis(420)), 3);
        assert_eq!(clock.due(start + Duration::from_millis(500)), 1);
    }

    #[test]
    fn stop_cancels_pending_ticks() {
        let start = Instant::now();
        let mut clock = Clock::new(Duration::from_millis(10));
        clock.start(start);
        clock.stop();
        assert_eq!(clock.due(start + Duration::from_secs(1)), 0);
    }

    #[test]
    fn counter_and_period() {
        let mut clock = Clock::new(Duration::ZERO);
        assert_eq!(clock.period(), Duration::from_millis(1));
        clock.set_period(Duration::from_millis(250));
        assert_eq!(clock.period(), Duration::from_millis(250));
        assert_eq!(clock.advance(), 1);
        assert_eq!(clock.advance(), 2);
        clock.reset();
        assert_eq!(clock.ticks(), 0);
    }
}
