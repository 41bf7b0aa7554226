use chrono::{FixedOffset, NaiveDateTime, Offset, Utc};

/// Source of the operator-local wall clock.
///
/// Windows and settlement dates are defined on the operator's calendar, so the
/// core only ever sees naive local date-times.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// UTC shifted by a fixed operator offset.
#[derive(Debug, Clone)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    /// Falls back to UTC when the offset is out of range (beyond ±24h).
    pub fn with_offset_minutes(minutes: i32) -> Self {
        let offset = FixedOffset::east_opt(minutes.saturating_mul(60)).unwrap_or_else(|| Utc.fix());
        SystemClock { offset }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.offset).naive_local()
    }
}

/// Clock pinned to one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_fixed_clock() {
        let at = NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(14, 5, 0)
            .unwrap();
        assert_eq!(FixedClock(at).now(), at);
    }

    #[test]
    fn test_system_clock_offset() {
        let ist = SystemClock::with_offset_minutes(330).now();
        let utc = Utc::now().naive_utc();
        let diff = (ist - utc).num_minutes();
        assert!((329..=331).contains(&diff));
    }
}
