//! Remaining-lifetime computation.
//!
//! Pure arithmetic over `(expiry, created, now)`. Relative lifetimes are a
//! subtraction; daily wall-clock lifetimes go through `jiff` because "today
//! at 03:00" is a civil-time question the host's local time zone answers.

use std::time::{Duration, SystemTime};

use jiff::{Span, Timestamp, tz::TimeZone};

use crate::rule::{DayTime, Expiry};

/// Entries expiring at a daily clock time never outlive a full day.
const DAY: Duration = Duration::from_millis(86_400_000);

/// Remaining lifetime of an entry created at `created`, observed at `now`.
///
/// Zero when no expiry is configured, when the clock has moved backwards
/// past `created`, or when the entry has expired.
pub(crate) fn remaining(expiry: Option<&Expiry>, created: SystemTime, now: SystemTime) -> Duration {
    if now < created {
        // Clock skew; nothing sensible to report.
        return Duration::ZERO;
    }

    match expiry {
        Some(Expiry::In(lifetime)) => {
            let age = now.duration_since(created).unwrap_or_default();
            lifetime.saturating_sub(age)
        }
        Some(Expiry::At(at)) => daily(*at, created, now),
        None => Duration::ZERO,
    }
}

fn daily(at: DayTime, created: SystemTime, now: SystemTime) -> Duration {
    let age = now.duration_since(created).unwrap_or_default();
    if age > DAY {
        return Duration::ZERO;
    }

    let Some(expires) = expiry_instant(at, created) else {
        return Duration::ZERO;
    };
    if now >= expires {
        return Duration::ZERO;
    }
    expires.duration_since(now).unwrap_or_default()
}

/// The instant on `created`'s local calendar day at `at` - or the next day's,
/// when that clock time has already passed by `created`.
fn expiry_instant(at: DayTime, created: SystemTime) -> Option<SystemTime> {
    let created_ts = Timestamp::try_from(created).ok()?;
    let zoned = created_ts.to_zoned(TimeZone::system());

    let same_day = zoned.date().at(at.hours as i8, at.minutes as i8, 0, 0);
    let mut expires = same_day.to_zoned(TimeZone::system()).ok()?;
    if expires.timestamp() <= created_ts {
        expires = expires.checked_add(Span::new().days(1)).ok()?;
    }

    SystemTime::try_from(expires.timestamp()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(hours: i8, minutes: i8) -> SystemTime {
        // A mid-June date keeps clear of DST transitions in every zone the
        // suite realistically runs in.
        let dt = jiff::civil::date(2025, 6, 15).at(hours, minutes, 0, 0);
        let zoned = dt.to_zoned(TimeZone::system()).expect("test date resolves");
        SystemTime::try_from(zoned.timestamp()).expect("test date in range")
    }

    fn at(hours: u8, minutes: u8) -> Expiry {
        Expiry::At(DayTime { hours, minutes })
    }

    #[test]
    fn no_expiry_means_zero() {
        let t = SystemTime::UNIX_EPOCH;
        assert_eq!(remaining(None, t, t), Duration::ZERO);
    }

    #[test]
    fn clock_skew_yields_zero() {
        let expiry = Expiry::In(Duration::from_secs(10));
        let created = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        let earlier = created - Duration::from_secs(1);
        assert_eq!(remaining(Some(&expiry), created, earlier), Duration::ZERO);
    }

    #[test]
    fn relative_expiry_counts_down() {
        let expiry = Expiry::In(Duration::from_millis(1000));
        let created = SystemTime::UNIX_EPOCH + Duration::from_secs(5);

        assert_eq!(remaining(Some(&expiry), created, created), Duration::from_millis(1000));
        assert_eq!(
            remaining(Some(&expiry), created, created + Duration::from_millis(400)),
            Duration::from_millis(600)
        );
        assert_eq!(
            remaining(Some(&expiry), created, created + Duration::from_millis(1000)),
            Duration::ZERO
        );
        assert_eq!(
            remaining(Some(&expiry), created, created + Duration::from_millis(2000)),
            Duration::ZERO
        );
    }

    #[test]
    fn relative_expiry_never_increases_with_now() {
        let expiry = Expiry::In(Duration::from_millis(750));
        let created = SystemTime::UNIX_EPOCH + Duration::from_secs(9);

        let mut previous = Duration::MAX;
        for offset_ms in [0_u64, 1, 100, 500, 749, 750, 751, 10_000] {
            let current = remaining(Some(&expiry), created, created + Duration::from_millis(offset_ms));
            assert!(current <= previous);
            previous = current;
        }
    }

    #[test]
    fn daily_expiry_later_the_same_day() {
        let expiry = at(15, 30);
        let created = local(9, 0);
        let now = local(10, 0);

        // 15:30 is five and a half hours away from 10:00.
        assert_eq!(
            remaining(Some(&expiry), created, now),
            Duration::from_secs((5 * 60 + 30) * 60)
        );
    }

    #[test]
    fn daily_expiry_rolls_to_the_next_day() {
        // Created after 03:00, so expiry is the NEXT day's 03:00.
        let expiry = at(3, 0);
        let created = local(4, 0);
        let now = local(4, 30);

        // 22.5 hours from 04:30 to next 03:00.
        assert_eq!(
            remaining(Some(&expiry), created, now),
            Duration::from_secs(22 * 3600 + 1800)
        );
    }

    #[test]
    fn daily_expiry_at_exactly_the_created_instant_rolls_over() {
        let expiry = at(3, 0);
        let created = local(3, 0);

        assert_eq!(remaining(Some(&expiry), created, created), Duration::from_secs(24 * 3600));
    }

    #[test]
    fn daily_expiry_is_zero_once_passed() {
        let expiry = at(15, 0);
        let created = local(9, 0);

        assert_eq!(remaining(Some(&expiry), created, local(15, 0)), Duration::ZERO);
        assert_eq!(remaining(Some(&expiry), created, local(16, 0)), Duration::ZERO);
    }

    #[test]
    fn daily_expiry_is_zero_after_a_full_day() {
        let expiry = at(3, 0);
        let created = local(4, 0);
        let now = created + DAY + Duration::from_millis(1);

        assert_eq!(remaining(Some(&expiry), created, now), Duration::ZERO);
    }
}
