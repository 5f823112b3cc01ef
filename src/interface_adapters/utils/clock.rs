use crate::domain::ports::Clock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch, anchored once at construction and then advanced by a
/// monotonic [`Instant`]. Wall-clock adjustments after startup do not move it backwards.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    epoch_millis_at_start: u64,
    started: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        let epoch_millis_at_start = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Self {
            epoch_millis_at_start,
            started: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        let elapsed = self.started.elapsed().as_millis() as u64;
        self.epoch_millis_at_start.saturating_add(elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn when_clock_is_read_repeatedly_then_it_never_goes_backwards() {
        let clock = SystemClock::new();
        let mut last = clock.now_millis();
        for _ in 0..1_000 {
            let now = clock.now_millis();
            assert!(now >= last);
            last = now;
        }
    }

    #[test]
    fn when_clock_is_created_then_it_reads_close_to_wall_time() {
        let clock = SystemClock::new();
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("wall clock after epoch")
            .as_millis() as u64;

        assert!(clock.now_millis().abs_diff(wall) < 1_000);
    }
}
