use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
use parking_lot::RwLock;
use std::sync::Arc;

/// Source of the current time.
///
/// Token issuance, expiry checks, the cleanup job and the rate-limit window
/// all read the same clock so that tests can move time forward.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    current: Arc<RwLock<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(RwLock::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut current = self.current.write();
        *current += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.current.write() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.read()
    }
}

/// Drops sub-microsecond digits, the precision timestamps are stored with.
///
/// Instants compared against stored timestamps go through this first, so a
/// value read back from the database equals the one that was written.
pub fn to_db_precision(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(6)
}

/// Formats a timestamp the way it is stored in the database.
///
/// Fixed microsecond precision and a `Z` suffix keep lexical order equal to
/// chronological order, which the expiry queries rely on.
pub fn to_db_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_db_timestamp(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_manual_clock_advances() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        clock.advance(Duration::hours(25));
        assert_eq!(clock.now(), start + Duration::hours(25));
    }

    #[test]
    fn test_db_timestamp_round_trip_and_ordering() {
        let early = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let late = early + Duration::milliseconds(1500);

        let early_str = to_db_timestamp(early);
        let late_str = to_db_timestamp(late);

        assert_eq!(early_str, "2026-01-01T09:00:00.000000Z");
        assert!(early_str < late_str);
        assert_eq!(parse_db_timestamp(&late_str).unwrap(), late);
    }

    #[test]
    fn test_db_precision_survives_storage() {
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap()
            + Duration::nanoseconds(123_456_789);
        let truncated = to_db_precision(at);

        assert_eq!(to_db_timestamp(truncated), "2026-01-01T09:00:00.123456Z");
        assert_eq!(parse_db_timestamp(&to_db_timestamp(at)).unwrap(), truncated);
        assert_eq!(
            parse_db_timestamp(&to_db_timestamp(truncated + Duration::hours(24))).unwrap(),
            truncated + Duration::hours(24)
        );
    }
}
