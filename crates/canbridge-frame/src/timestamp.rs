use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Seconds and microseconds since the Unix epoch.
///
/// Field order makes the derived ordering chronological.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeStamp {
    pub seconds: i64,
    pub microseconds: i32,
}

impl TimeStamp {
    pub fn new(seconds: i64, microseconds: i32) -> Self {
        Self {
            seconds,
            microseconds,
        }
    }

    /// Wall-clock time now.
    pub fn now() -> Self {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(Self::from)
            .unwrap_or_default()
    }

    /// Total microseconds since the epoch.
    pub fn as_micros(&self) -> i64 {
        self.seconds
            .saturating_mul(1_000_000)
            .saturating_add(i64::from(self.microseconds))
    }
}

impl From<Duration> for TimeStamp {
    fn from(since_epoch: Duration) -> Self {
        Self {
            seconds: i64::try_from(since_epoch.as_secs()).unwrap_or(i64::MAX),
            microseconds: since_epoch.subsec_micros() as i32,
        }
    }
}

impl std::fmt::Display for TimeStamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:06}", self.seconds, self.microseconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_duration_splits_micros() {
        let ts = TimeStamp::from(Duration::new(1_709_287_503, 123_456_789));
        assert_eq!(ts, TimeStamp::new(1_709_287_503, 123_456));
        assert_eq!(ts.as_micros(), 1_709_287_503_123_456);
    }

    #[test]
    fn ordering_is_chronological() {
        assert!(TimeStamp::new(10, 999_999) < TimeStamp::new(11, 0));
        assert!(TimeStamp::new(10, 1) < TimeStamp::new(10, 2));
    }

    #[test]
    fn now_is_after_2020() {
        assert!(TimeStamp::now().seconds > 1_577_836_800);
    }

    #[test]
    fn display_pads_micros() {
        assert_eq!(TimeStamp::new(5, 42).to_string(), "5.000042");
    }
}
