//! RenderTicker - wall-clock cadence for drain + snapshot

use std::time::{Duration, Instant};

/// Fires once per `interval`, measured from the last tick
#[derive(Debug, Clone, Copy)]
pub struct RenderTicker {
    interval: Duration,
    last_update: Option<Instant>,
}

impl Default for RenderTicker {
    fn default() -> Self {
        Self::from_hz(30.0)
    }
}

impl RenderTicker {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_update: None,
        }
    }

    /// Non-positive or non-finite rates fall back to 30 Hz
    pub fn from_hz(hz: f64) -> Self {
        let hz = if hz.is_finite() && hz > 0.0 { hz } else { 30.0 };
        Self::new(Duration::from_secs_f64(1.0 / hz))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn last_update(&self) -> Option<Instant> {
        self.last_update
    }

    /// True if no tick has happened yet or a full interval has passed
    pub fn is_due(&self, now: Instant) -> bool {
        match self.last_update {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        }
    }

    pub fn mark(&mut self, now: Instant) {
        self.last_update = Some(now);
    }

    pub fn time_until_next(&self, now: Instant) -> Duration {
        match self.last_update {
            None => Duration::ZERO,
            Some(last) => self
                .interval
                .saturating_sub(now.saturating_duration_since(last)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cadence() {
        let mut ticker = RenderTicker::new(Duration::from_millis(100));
        let t0 = Instant::now();
        assert!(ticker.is_due(t0));
        assert_eq!(ticker.time_until_next(t0), Duration::ZERO);

        ticker.mark(t0);
        assert!(!ticker.is_due(t0 + Duration::from_millis(50)));
        assert_eq!(
            ticker.time_until_next(t0 + Duration::from_millis(40)),
            Duration::from_millis(60)
        );
        assert!(ticker.is_due(t0 + Duration::from_millis(100)));
    }

    #[test]
    fn test_from_hz() {
        let ticker = RenderTicker::from_hz(30.0);
        assert_eq!(ticker.interval().as_micros(), 33_333);
        assert_eq!(RenderTicker::from_hz(0.0).interval(), ticker.interval());
        assert_eq!(RenderTicker::from_hz(f64::NAN).interval(), ticker.interval());
    }
}
