//! Quiet-hours evaluation with DST edge-case handling.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use gatewatch_core::QuietHours;

/// Largest plausible DST gap; bounds the minute-by-minute advance used to
/// resolve a nonexistent local time (spring-forward).
const MAX_SPRING_FORWARD_PROBE_MINUTES: i64 = 240;

/// Whether `now` falls within a profile's configured quiet-hours window.
/// An unparseable timezone or `HH:MM` field is treated as "not quiet"
/// rather than failing the caller — a malformed profile field should never
/// block delivery of everything else that profile watches.
#[must_use]
pub fn is_quiet(quiet_hours: &QuietHours, now: DateTime<Utc>) -> bool {
    if !quiet_hours.enabled {
        return false;
    }
    let Ok(tz): Result<Tz, _> = quiet_hours.timezone.parse() else {
        return false;
    };
    let Some(start) = parse_hhmm(&quiet_hours.start) else {
        return false;
    };
    let Some(end) = parse_hhmm(&quiet_hours.end) else {
        return false;
    };

    let local_now = now.with_timezone(&tz);
    let today = local_now.date_naive();
    let yesterday = today - Duration::days(1);

    // A window spanning midnight may be the one anchored at today's date
    // (if `now` is in the evening) or at yesterday's (if `now` is in the
    // small hours after midnight); check both anchors.
    window_contains(&tz, today, start, end, local_now) || window_contains(&tz, yesterday, start, end, local_now)
}

fn parse_hhmm(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M").ok()
}

fn window_contains(
    tz: &Tz,
    anchor_date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
    local_now: DateTime<Tz>,
) -> bool {
    let start_dt = resolve_local(tz, anchor_date.and_time(start));
    let spans_midnight = end <= start;
    let end_date = if spans_midnight { anchor_date + Duration::days(1) } else { anchor_date };
    let end_dt = resolve_local(tz, end_date.and_time(end));
    local_now >= start_dt && local_now < end_dt
}

/// Resolve a naive local date+time to a concrete zoned instant.
///
/// - Ambiguous (fall-back) times resolve to the earliest, pre-transition
///   occurrence.
/// - Nonexistent (spring-forward) times advance minute by minute until a
///   valid instant is found, bounded to `MAX_SPRING_FORWARD_PROBE_MINUTES`.
fn resolve_local(tz: &Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _latest) => earliest,
        LocalResult::None => {
            let mut probe = naive;
            for _ in 0..MAX_SPRING_FORWARD_PROBE_MINUTES {
                probe += Duration::minutes(1);
                match tz.from_local_datetime(&probe) {
                    LocalResult::Single(dt) => return dt,
                    LocalResult::Ambiguous(earliest, _latest) => return earliest,
                    LocalResult::None => {}
                }
            }
            // No real DST gap exceeds a few hours; this is unreachable in
            // practice for any IANA zone's published transition rules.
            tz.from_utc_datetime(&naive)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    fn window(start: &str, end: &str, tz: &str) -> QuietHours {
        QuietHours {
            enabled: true,
            start: start.to_owned(),
            end: end.to_owned(),
            timezone: tz.to_owned(),
        }
    }

    #[test]
    fn disabled_window_is_never_quiet() {
        let mut qh = window("22:00", "06:00", "UTC");
        qh.enabled = false;
        assert!(!is_quiet(&qh, Utc::now()));
    }

    #[test]
    fn spans_midnight_suppresses_evening_and_early_morning_not_midday() {
        let qh = window("22:00", "06:00", "UTC");
        let at = |h: u32, m: u32| Utc.with_ymd_and_hms(2026, 3, 10, h, m, 0).unwrap();
        assert!(is_quiet(&qh, at(23, 0)));
        assert!(is_quiet(&qh, at(3, 0)));
        assert!(!is_quiet(&qh, at(10, 0)));
        assert!(!is_quiet(&qh, at(21, 59)));
        assert!(is_quiet(&qh, at(22, 0)));
        assert!(!is_quiet(&qh, at(6, 0)));
    }

    #[test]
    fn non_spanning_window_is_simple_interval() {
        let qh = window("09:00", "17:00", "UTC");
        let at = |h: u32, m: u32| Utc.with_ymd_and_hms(2026, 3, 10, h, m, 0).unwrap();
        assert!(is_quiet(&qh, at(12, 0)));
        assert!(!is_quiet(&qh, at(8, 0)));
        assert!(!is_quiet(&qh, at(18, 0)));
    }

    #[test]
    fn invalid_timezone_is_not_quiet() {
        let qh = window("22:00", "06:00", "Not/AZone");
        assert!(!is_quiet(&qh, Utc::now()));
    }

    #[test]
    fn fall_back_ambiguous_time_uses_earliest_occurrence() {
        // America/New_York falls back at 2026-11-01 02:00 local (EDT->EST);
        // 01:30 local occurs twice. The earliest (still-EDT, UTC-4)
        // occurrence is 2026-11-01T05:30:00Z.
        let qh = window("01:15", "01:45", "America/New_York");
        let ambiguous_first = Utc.with_ymd_and_hms(2026, 11, 1, 5, 30, 0).unwrap();
        assert!(is_quiet(&qh, ambiguous_first));
    }

    #[test]
    fn spring_forward_nonexistent_time_resolves_to_next_valid_instant() {
        // America/New_York springs forward at 2026-03-08 02:00 local (clocks
        // jump to 03:00); a window starting at the nonexistent 02:30 should
        // resolve to the folded 03:00 instant, i.e. 2026-03-08T07:00:00Z.
        let qh = window("02:30", "04:00", "America/New_York");
        let folded_start = Utc.with_ymd_and_hms(2026, 3, 8, 7, 0, 0).unwrap();
        assert!(is_quiet(&qh, folded_start));
        let just_before = folded_start - Duration::minutes(1);
        assert!(!is_quiet(&qh, just_before));
    }
}
