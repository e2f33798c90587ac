//! Next-occurrence computation
//!
//! All arithmetic happens on the schedule's local wall clock (UTC shifted by
//! the fixed offset) and the result is converted back to UTC. A day of month
//! past the end of a short month clamps to that month's last day.

use crate::rule::{Frequency, ScheduleSpec};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use qs_core::{QsError, Result};

/// Earliest instant strictly after `after` that satisfies `spec`
pub fn compute_next_occurrence(spec: &ScheduleSpec, after: DateTime<Utc>) -> Result<DateTime<Utc>> {
    spec.validate()?;

    let offset = Duration::minutes(i64::from(spec.utc_offset_minutes));
    let local_after = shift(after.naive_utc(), offset)?;
    let time = spec.time_of_day.to_naive();

    let local_next = match spec.frequency {
        Frequency::Daily => next_daily(local_after, time)?,
        Frequency::Weekly => {
            let day = spec
                .day_of_week
                .ok_or_else(|| QsError::InvalidSpec("weekly schedule needs a day of week".to_string()))?;
            next_weekly(local_after, day.to_chrono().num_days_from_monday(), time)?
        }
        Frequency::Monthly => {
            let day = spec
                .day_of_month
                .ok_or_else(|| QsError::InvalidSpec("monthly schedule needs a day of month".to_string()))?;
            next_by_months(local_after, day, time, 1, local_after.month())?
        }
        Frequency::Quarterly => {
            let day = spec.day_of_month.unwrap_or(1);
            let anchor = spec.anchor_month.unwrap_or(1);
            next_by_months(local_after, day, time, 3, anchor)?
        }
    };

    Ok(Utc.from_utc_datetime(&shift(local_next, -offset)?))
}

/// The next `count` occurrences after `after`, in order
pub fn upcoming(spec: &ScheduleSpec, after: DateTime<Utc>, count: usize) -> Result<Vec<DateTime<Utc>>> {
    let mut instants = Vec::with_capacity(count);
    let mut cursor = after;
    for _ in 0..count {
        cursor = compute_next_occurrence(spec, cursor)?;
        instants.push(cursor);
    }
    Ok(instants)
}

/// `at + by`, or an error past the representable calendar
fn shift(at: NaiveDateTime, by: Duration) -> Result<NaiveDateTime> {
    at.checked_add_signed(by)
        .ok_or_else(|| QsError::InvalidSpec(format!("{} shifted by {} is out of range", at, by)))
}

fn next_daily(after: NaiveDateTime, time: NaiveTime) -> Result<NaiveDateTime> {
    let candidate = after.date().and_time(time);
    if candidate > after {
        Ok(candidate)
    } else {
        shift(candidate, Duration::days(1))
    }
}

fn next_weekly(after: NaiveDateTime, target: u32, time: NaiveTime) -> Result<NaiveDateTime> {
    let current = after.date().weekday().num_days_from_monday();
    let ahead = (target + 7 - current) % 7;
    let candidate = shift(after.date().and_time(time), Duration::days(i64::from(ahead)))?;
    if candidate > after {
        Ok(candidate)
    } else {
        shift(candidate, Duration::days(7))
    }
}

/// Step through months on a cycle of `step` months that contains `anchor`
fn next_by_months(
    after: NaiveDateTime,
    day: u32,
    time: NaiveTime,
    step: u32,
    anchor: u32,
) -> Result<NaiveDateTime> {
    let (mut year, mut month) = (after.year(), after.month());
    while (month + 12 - anchor) % step != 0 {
        (year, month) = add_months(year, month, 1);
    }

    loop {
        let candidate = clamped_date(year, month, day)?.and_time(time);
        if candidate > after {
            return Ok(candidate);
        }
        (year, month) = add_months(year, month, step);
    }
}

fn add_months(year: i32, month: u32, months: u32) -> (i32, u32) {
    let zero_based = month - 1 + months;
    (year + (zero_based / 12) as i32, zero_based % 12 + 1)
}

/// `day` in the given month, or the month's last day when it is shorter
fn clamped_date(year: i32, month: u32, day: u32) -> Result<NaiveDate> {
    let day = day.min(days_in_month(year, month)?);
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| QsError::InvalidSpec(format!("no date {}-{:02}-{:02}", year, month, day)))
}

pub fn days_in_month(year: i32, month: u32) -> Result<u32> {
    let (next_year, next_month) = add_months(year, month, 1);
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .ok_or_else(|| QsError::InvalidSpec(format!("month {}-{:02} out of range", year, month)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{DayOfWeek, TimeOfDay};

    fn at(ts: &str) -> DateTime<Utc> {
        ts.parse().unwrap()
    }

    fn time(hour: u32, minute: u32) -> TimeOfDay {
        TimeOfDay::new(hour, minute).unwrap()
    }

    #[test]
    fn test_daily_same_day_and_next_day() {
        let spec = ScheduleSpec::daily(time(8, 0));
        assert_eq!(
            compute_next_occurrence(&spec, at("2026-03-02T07:59:00Z")).unwrap(),
            at("2026-03-02T08:00:00Z")
        );
        assert_eq!(
            compute_next_occurrence(&spec, at("2026-03-02T08:00:00Z")).unwrap(),
            at("2026-03-03T08:00:00Z")
        );
    }

    #[test]
    fn test_weekly_monday_from_wednesday() {
        let spec = ScheduleSpec::weekly(DayOfWeek::Monday, time(8, 0));
        // 2026-10-14 is a Wednesday
        let next = compute_next_occurrence(&spec, at("2026-10-14T10:00:00Z")).unwrap();
        assert_eq!(next, at("2026-10-19T08:00:00Z"));
    }

    #[test]
    fn test_weekly_same_day_after_time_waits_a_week() {
        let spec = ScheduleSpec::weekly(DayOfWeek::Monday, time(8, 0));
        let next = compute_next_occurrence(&spec, at("2026-10-19T08:00:00Z")).unwrap();
        assert_eq!(next, at("2026-10-26T08:00:00Z"));
        let next = compute_next_occurrence(&spec, at("2026-10-19T07:00:00Z")).unwrap();
        assert_eq!(next, at("2026-10-19T08:00:00Z"));
    }

    #[test]
    fn test_monthly_clamps_to_short_month() {
        let spec = ScheduleSpec::monthly(31, time(8, 0));
        assert_eq!(
            compute_next_occurrence(&spec, at("2026-04-10T00:00:00Z")).unwrap(),
            at("2026-04-30T08:00:00Z")
        );
        assert_eq!(
            compute_next_occurrence(&spec, at("2026-04-30T09:00:00Z")).unwrap(),
            at("2026-05-31T08:00:00Z")
        );
        assert_eq!(
            compute_next_occurrence(&spec, at("2027-02-01T00:00:00Z")).unwrap(),
            at("2027-02-28T08:00:00Z")
        );
        assert_eq!(
            compute_next_occurrence(&spec, at("2028-02-01T00:00:00Z")).unwrap(),
            at("2028-02-29T08:00:00Z")
        );
    }

    #[test]
    fn test_monthly_rolls_over_year() {
        let spec = ScheduleSpec::monthly(5, time(6, 30));
        assert_eq!(
            compute_next_occurrence(&spec, at("2026-12-20T00:00:00Z")).unwrap(),
            at("2027-01-05T06:30:00Z")
        );
    }

    #[test]
    fn test_quarterly_follows_anchor() {
        let spec = ScheduleSpec::quarterly(1, time(8, 0));
        assert_eq!(
            compute_next_occurrence(&spec, at("2026-02-15T00:00:00Z")).unwrap(),
            at("2026-04-01T08:00:00Z")
        );
        assert_eq!(
            compute_next_occurrence(&spec, at("2026-11-02T00:00:00Z")).unwrap(),
            at("2027-01-01T08:00:00Z")
        );

        let spec = ScheduleSpec::quarterly(2, time(8, 0)).with_day_of_month(31);
        assert_eq!(
            compute_next_occurrence(&spec, at("2026-03-01T00:00:00Z")).unwrap(),
            at("2026-05-31T08:00:00Z")
        );
        // November has 30 days
        assert_eq!(
            compute_next_occurrence(&spec, at("2026-09-01T00:00:00Z")).unwrap(),
            at("2026-11-30T08:00:00Z")
        );
    }

    #[test]
    fn test_fixed_offset() {
        // 08:00 at UTC+2 is 06:00 UTC
        let spec = ScheduleSpec::daily(time(8, 0)).with_utc_offset(120);
        assert_eq!(
            compute_next_occurrence(&spec, at("2026-03-02T05:00:00Z")).unwrap(),
            at("2026-03-02T06:00:00Z")
        );
        // 23:30 UTC is already Tuesday 01:30 local
        assert_eq!(
            compute_next_occurrence(&spec, at("2026-03-02T23:30:00Z")).unwrap(),
            at("2026-03-03T06:00:00Z")
        );

        // 08:00 at UTC-5 is 13:00 UTC
        let spec = ScheduleSpec::weekly(DayOfWeek::Monday, time(8, 0)).with_utc_offset(-300);
        assert_eq!(
            compute_next_occurrence(&spec, at("2026-10-14T10:00:00Z")).unwrap(),
            at("2026-10-19T13:00:00Z")
        );
    }

    #[test]
    fn test_always_strictly_later() {
        let specs = [
            ScheduleSpec::daily(time(0, 0)),
            ScheduleSpec::weekly(DayOfWeek::Sunday, time(23, 59)),
            ScheduleSpec::monthly(29, time(12, 0)).with_utc_offset(-720),
            ScheduleSpec::quarterly(11, time(8, 0)).with_day_of_month(31),
        ];
        for spec in &specs {
            let mut cursor = at("2026-01-01T00:00:00Z");
            for _ in 0..40 {
                let next = compute_next_occurrence(spec, cursor).unwrap();
                assert!(next > cursor, "{} did not advance from {}", spec.describe(), cursor);
                cursor = next;
            }
        }
    }

    #[test]
    fn test_calendar_edge_is_error_not_panic() {
        let daily = ScheduleSpec::daily(time(8, 0));
        let err = compute_next_occurrence(&daily, DateTime::<Utc>::MAX_UTC).unwrap_err();
        assert!(matches!(err, QsError::InvalidSpec(_)));

        let ahead = ScheduleSpec::weekly(DayOfWeek::Monday, time(8, 0)).with_utc_offset(60);
        let err = compute_next_occurrence(&ahead, DateTime::<Utc>::MAX_UTC).unwrap_err();
        assert!(matches!(err, QsError::InvalidSpec(_)));

        let behind = ScheduleSpec::daily(time(8, 0)).with_utc_offset(-60);
        let err = compute_next_occurrence(&behind, DateTime::<Utc>::MIN_UTC).unwrap_err();
        assert!(matches!(err, QsError::InvalidSpec(_)));
    }

    #[test]
    fn test_upcoming() {
        let spec = ScheduleSpec::daily(time(8, 0));
        let next = upcoming(&spec, at("2026-03-02T09:00:00Z"), 3).unwrap();
        assert_eq!(
            next,
            vec![
                at("2026-03-03T08:00:00Z"),
                at("2026-03-04T08:00:00Z"),
                at("2026-03-05T08:00:00Z"),
            ]
        );
    }

    #[test]
    fn test_invalid_spec_rejected() {
        let mut spec = ScheduleSpec::weekly(DayOfWeek::Monday, time(8, 0));
        spec.day_of_week = None;
        assert!(matches!(
            compute_next_occurrence(&spec, at("2026-03-02T00:00:00Z")),
            Err(QsError::InvalidSpec(_))
        ));
    }
}
