use crate::model::leave::LeaveType;
use chrono::{Datelike, Duration, FixedOffset, NaiveDate, Offset, Utc, Weekday};
use std::collections::HashSet;

/// Today's date at the configured UTC offset.
pub fn local_today(utc_offset_minutes: i32) -> NaiveDate {
    let offset = FixedOffset::east_opt(utc_offset_minutes * 60)
        .unwrap_or_else(|| Utc.fix());
    Utc::now().with_timezone(&offset).date_naive()
}

/// First and last day of a month, or `None` for an invalid month/year.
pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((first, next - Duration::days(1)))
}

pub fn is_working_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Inclusive iterator over `start..=end`.
pub fn days(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |d| *d <= end)
}

/// Monday to Friday days of the month.
pub fn working_days_in_month(year: i32, month: u32) -> Option<u32> {
    let (first, last) = month_bounds(year, month)?;
    Some(days(first, last).filter(|d| is_working_day(*d)).count() as u32)
}

/// Approved-leave days that count towards pay in `[from, to]`.
///
/// Only paid leave types and working days are counted, each date once. Days
/// the employee was present are skipped so a day is never paid twice.
pub fn paid_leave_days(
    leaves: &[(LeaveType, NaiveDate, NaiveDate)],
    present: &HashSet<NaiveDate>,
    from: NaiveDate,
    to: NaiveDate,
) -> u32 {
    let mut counted = HashSet::new();
    for &(leave_type, start, end) in leaves {
        if !leave_type.is_paid() {
            continue;
        }
        let lo = start.max(from);
        let hi = end.min(to);
        if lo > hi {
            continue;
        }
        for day in days(lo, hi) {
            if is_working_day(day) && !present.contains(&day) {
                counted.insert(day);
            }
        }
    }
    counted.len() as u32
}
