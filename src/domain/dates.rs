use crate::infrastructure::error::CoreError;
use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

/// Inclusive day window for one calendar date.
///
/// `local_start`/`local_end` are the first and last instants of the day in the
/// configured calendar timezone, expressed in UTC. `utc_midnight` is the same
/// calendar date at 00:00 UTC; it is the storage form, so formatting it back
/// to a date-only string yields the same calendar date in any timezone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayWindow {
    pub date: NaiveDate,
    pub local_start: DateTime<Utc>,
    pub local_end: DateTime<Utc>,
    pub utc_midnight: DateTime<Utc>,
}

/// Parses a strict `YYYY-MM-DD` string into the day window for that date.
pub fn normalize(value: &str, tz: Tz) -> Result<DayWindow, CoreError> {
    let date = parse_calendar_date(value)?;
    Ok(window_for(date, tz))
}

/// Day window for today's calendar date in `tz`, shifted by `days` (negative = past).
pub fn offset(days: i64, tz: Tz) -> DayWindow {
    let today = Utc::now().with_timezone(&tz).date_naive();
    window_for(today + Duration::days(days), tz)
}

pub fn window_for(date: NaiveDate, tz: Tz) -> DayWindow {
    let day_start = NaiveTime::from_hms_opt(0, 0, 0).expect("valid midnight");
    let day_end = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).expect("valid end of day");

    // A DST transition at midnight can make the local day start unmappable;
    // fall back to the UTC reading of the same wall-clock instant.
    let local_start = local_instant(date, day_start, tz)
        .unwrap_or_else(|| Utc.from_utc_datetime(&date.and_time(day_start)));
    let local_end = local_instant(date, day_end, tz)
        .unwrap_or_else(|| Utc.from_utc_datetime(&date.and_time(day_end)));

    DayWindow {
        date,
        local_start,
        local_end,
        utc_midnight: utc_midnight(date),
    }
}

pub fn utc_midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).expect("valid midnight"))
}

/// The UTC instant of `hhmm` on `date` in `tz`. `None` for a malformed clock
/// time or a wall-clock time skipped by a DST transition.
pub fn at_time(date: NaiveDate, hhmm: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let time = parse_clock_time(hhmm)?;
    local_instant(date, time, tz)
}

fn local_instant(date: NaiveDate, time: NaiveTime, tz: Tz) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&date.and_time(time)) {
        LocalResult::Single(instant) => Some(instant.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => None,
    }
}

pub fn parse_calendar_date(value: &str) -> Result<NaiveDate, CoreError> {
    let invalid = || CoreError::Validation(format!("date must be YYYY-MM-DD: '{}'", value.trim()));

    let trimmed = value.trim();
    let mut parts = trimmed.split('-');
    let (Some(year), Some(month), Some(day), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid());
    };
    if year.len() != 4 || month.len() != 2 || day.len() != 2 {
        return Err(invalid());
    }

    let year = year.parse::<i32>().map_err(|_| invalid())?;
    let month = month.parse::<u32>().map_err(|_| invalid())?;
    let day = day.parse::<u32>().map_err(|_| invalid())?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)
}

/// Accepts `H:mm` or `HH:mm` with in-range components.
pub fn parse_clock_time(value: &str) -> Option<NaiveTime> {
    let mut split = value.trim().split(':');
    let hour_str = split.next()?;
    let minute_str = split.next()?;
    if split.next().is_some() {
        return None;
    }
    if hour_str.is_empty() || hour_str.len() > 2 || minute_str.len() != 2 {
        return None;
    }

    let hour = hour_str.parse::<u32>().ok()?;
    let minute = minute_str.parse::<u32>().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Lowercase weekday name, Sunday-first to match stored schedule entries.
pub fn weekday_name(date: NaiveDate) -> &'static str {
    match date.weekday() {
        Weekday::Sun => "sunday",
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
    }
}

pub fn parse_weekday(value: &str) -> Option<Weekday> {
    match value.trim().to_ascii_lowercase().as_str() {
        "monday" | "mon" => Some(Weekday::Mon),
        "tuesday" | "tue" => Some(Weekday::Tue),
        "wednesday" | "wed" => Some(Weekday::Wed),
        "thursday" | "thu" => Some(Weekday::Thu),
        "friday" | "fri" => Some(Weekday::Fri),
        "saturday" | "sat" => Some(Weekday::Sat),
        "sunday" | "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_york() -> Tz {
        "America/New_York".parse().expect("valid timezone")
    }

    #[test]
    fn parse_calendar_date_accepts_strict_format() {
        let date = parse_calendar_date("2025-03-10").expect("valid date");
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 3, 10).expect("valid date"));
    }

    #[test]
    fn parse_calendar_date_rejects_malformed_input() {
        for value in ["2025-3-10", "25-03-10", "2025-03-10T00:00", "2025-13-01", "not-a-date", ""] {
            let error = parse_calendar_date(value).expect_err("must reject");
            assert!(matches!(error, CoreError::Validation(_)), "{value}");
        }
    }

    #[test]
    fn utc_midnight_date_prefix_is_timezone_invariant() {
        for tz in [Tz::UTC, new_york(), "Asia/Tokyo".parse().expect("valid timezone")] {
            let window = normalize("2025-03-10", tz).expect("valid date");
            assert_eq!(window.utc_midnight.format("%Y-%m-%d").to_string(), "2025-03-10");
        }
    }

    #[test]
    fn window_covers_local_day_in_utc() {
        let window = normalize("2026-02-16", Tz::UTC).expect("valid date");
        assert_eq!(window.local_start.to_rfc3339(), "2026-02-16T00:00:00+00:00");
        assert_eq!(
            window.local_end.to_rfc3339(),
            "2026-02-16T23:59:59.999+00:00"
        );
    }

    #[test]
    fn window_shifts_with_timezone_offset() {
        let window = normalize("2026-02-16", new_york()).expect("valid date");
        // EST is UTC-5, so the local day starts at 05:00 UTC.
        assert_eq!(window.local_start.to_rfc3339(), "2026-02-16T05:00:00+00:00");
    }

    #[test]
    fn offset_moves_whole_days() {
        let today = offset(0, Tz::UTC);
        let tomorrow = offset(1, Tz::UTC);
        let yesterday = offset(-1, Tz::UTC);
        assert_eq!(tomorrow.date, today.date + Duration::days(1));
        assert_eq!(yesterday.date, today.date - Duration::days(1));
        assert_eq!(today.utc_midnight, utc_midnight(today.date));
    }

    #[test]
    fn parse_clock_time_accepts_short_hours() {
        assert_eq!(
            parse_clock_time("8:05"),
            NaiveTime::from_hms_opt(8, 5, 0)
        );
        assert_eq!(
            parse_clock_time("23:59"),
            NaiveTime::from_hms_opt(23, 59, 0)
        );
    }

    #[test]
    fn parse_clock_time_rejects_out_of_range() {
        for value in ["24:00", "12:60", "12", "12:5", "1:2:3", "ab:cd", ""] {
            assert_eq!(parse_clock_time(value), None, "{value}");
        }
    }

    #[test]
    fn at_time_resolves_local_wall_clock() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 16).expect("valid date");
        let instant = at_time(date, "10:00", new_york()).expect("resolvable time");
        assert_eq!(instant.to_rfc3339(), "2026-02-16T15:00:00+00:00");
    }

    #[test]
    fn weekday_name_is_sunday_first() {
        let sunday = NaiveDate::from_ymd_opt(2026, 2, 15).expect("valid date");
        let monday = NaiveDate::from_ymd_opt(2026, 2, 16).expect("valid date");
        assert_eq!(weekday_name(sunday), "sunday");
        assert_eq!(weekday_name(monday), "monday");
    }

    #[test]
    fn parse_weekday_accepts_names_and_abbreviations() {
        assert_eq!(parse_weekday("Monday"), Some(Weekday::Mon));
        assert_eq!(parse_weekday("SUN"), Some(Weekday::Sun));
        assert_eq!(parse_weekday("noday"), None);
    }
}
