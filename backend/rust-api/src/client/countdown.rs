use crate::utils::time::elapsed_secs;

/// Per-question countdown, anchored at the epoch-millis instant the question
/// went live so host and players agree on the remaining time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    started_at: i64,
    duration_secs: u32,
}

impl Countdown {
    pub fn new(started_at: i64, duration_secs: u32) -> Self {
        Self {
            started_at,
            duration_secs,
        }
    }

    pub fn remaining(&self, now: i64) -> u32 {
        self.duration_secs
            .saturating_sub(elapsed_secs(self.started_at, now))
    }

    pub fn is_expired(&self, now: i64) -> bool {
        self.remaining(now) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_down_whole_seconds() {
        let countdown = Countdown::new(10_000, 15);
        assert_eq!(countdown.remaining(10_000), 15);
        assert_eq!(countdown.remaining(12_500), 13);
        assert!(!countdown.is_expired(24_999));
        assert!(countdown.is_expired(25_000));
        assert_eq!(countdown.remaining(90_000), 0);
    }
}
