//! Date parsing and formatting for the export and user files.
//!
//! Everything is UTC. Confluence writes `2012-05-01 12:34:56.789`, Crowd
//! writes `Sun Jan 15 16:20:13 +0000 2012`; both become Unix seconds.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimestampError {
    #[error("malformed date '{0}'")]
    Malformed(String),

    #[error("unknown month '{0}'")]
    UnknownMonth(String),

    #[error("date '{0}' is out of range")]
    OutOfRange(String),
}

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Upper bound for parsed years; keeps edit-log mtimes (microseconds) in `i64`.
const MAX_YEAR: i64 = 9999;

/// A calendar date and time of day, without zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DateTime {
    year: i64,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
}

impl DateTime {
    fn to_seconds(self) -> i64 {
        days_from_civil(self.year, self.month, self.day) * 86_400
            + i64::from(self.hour) * 3_600
            + i64::from(self.minute) * 60
            + i64::from(self.second)
    }

    fn from_seconds(seconds: i64) -> Self {
        let days = seconds.div_euclid(86_400);
        let rest = seconds.rem_euclid(86_400);
        let (year, month, day) = civil_from_days(days);
        // rem_euclid keeps `rest` in 0..86_400.
        let rest = rest as u32;
        Self {
            year,
            month,
            day,
            hour: rest / 3_600,
            minute: rest % 3_600 / 60,
            second: rest % 60,
        }
    }

    fn validate(self, source: &str) -> Result<Self, TimestampError> {
        let valid = (1..=MAX_YEAR).contains(&self.year)
            && (1..=12).contains(&self.month)
            && self.day >= 1
            && self.day <= days_in_month(self.year, self.month)
            && self.hour < 24
            && self.minute < 60
            && self.second < 61;
        if valid {
            Ok(self)
        } else {
            Err(TimestampError::OutOfRange(source.to_owned()))
        }
    }
}

/// Seconds since the epoch for a Confluence export date. Fractional seconds
/// are ignored.
pub fn confluence_date_to_seconds(date: &str) -> Result<i64, TimestampError> {
    let malformed = || TimestampError::Malformed(date.to_owned());

    let whole = date.split('.').next().unwrap_or_default().trim();
    let (day_part, time_part) = whole.split_once(' ').ok_or_else(malformed)?;

    let mut ymd = day_part.splitn(3, '-');
    let year = number(ymd.next(), date)?;
    let month = number(ymd.next(), date)?;
    let day = number(ymd.next(), date)?;
    let (hour, minute, second) = clock(time_part, date)?;

    let parsed = DateTime {
        year: i64::from(year),
        month,
        day,
        hour,
        minute,
        second,
    };
    Ok(parsed.validate(date)?.to_seconds())
}

/// Seconds since the epoch for a Crowd backup date such as
/// `Sun Jan 15 16:20:13 +0000 2012`. The zone offset is dropped and the
/// wall-clock time taken as UTC.
pub fn crowd_date_to_seconds(date: &str) -> Result<i64, TimestampError> {
    let malformed = || TimestampError::Malformed(date.to_owned());

    let fields: Vec<&str> = date
        .split_whitespace()
        .filter(|field| !is_zone_offset(field))
        .collect();
    let [_weekday, month, day, time, year] = fields.as_slice() else {
        return Err(malformed());
    };

    let month = MONTHS
        .iter()
        .position(|name| name.eq_ignore_ascii_case(month))
        .ok_or_else(|| TimestampError::UnknownMonth((*month).to_owned()))?;
    let (hour, minute, second) = clock(time, date)?;

    let parsed = DateTime {
        year: i64::from(number(Some(*year), date)?),
        month: month as u32 + 1,
        day: number(Some(*day), date)?,
        hour,
        minute,
        second,
    };
    Ok(parsed.validate(date)?.to_seconds())
}

/// `dd.mm.YYYY HH:MM:SS` in UTC.
pub fn format_utc(seconds: i64) -> String {
    let t = DateTime::from_seconds(seconds);
    format!(
        "{:02}.{:02}.{:04} {:02}:{:02}:{:02}",
        t.day, t.month, t.year, t.hour, t.minute, t.second
    )
}

/// A point in time with microsecond resolution, as MoinMoin writes it into
/// user file names and `last_saved`: whole seconds, a dot, then the
/// microseconds without padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp {
    pub seconds: i64,
    pub micros: u32,
}

impl Timestamp {
    pub fn now() -> Self {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            seconds: i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX),
            micros: elapsed.subsec_micros(),
        }
    }

    pub fn from_seconds(seconds: i64) -> Self {
        Self { seconds, micros: 0 }
    }

    /// `dd.mm.YYYY HH:MM:SS` in UTC.
    pub fn format_utc(&self) -> String {
        format_utc(self.seconds)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.seconds, self.micros)
    }
}

fn number(field: Option<&str>, source: &str) -> Result<u32, TimestampError> {
    field
        .and_then(|f| f.trim().parse().ok())
        .ok_or_else(|| TimestampError::Malformed(source.to_owned()))
}

fn clock(time: &str, source: &str) -> Result<(u32, u32, u32), TimestampError> {
    let mut parts = time.splitn(3, ':');
    Ok((
        number(parts.next(), source)?,
        number(parts.next(), source)?,
        number(parts.next(), source)?,
    ))
}

fn is_zone_offset(field: &str) -> bool {
    field
        .strip_prefix(['+', '-'])
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

fn is_leap_year(year: i64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: i64, month: u32) -> u32 {
    match month {
        2 if is_leap_year(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// Days since 1970-01-01 for a proleptic Gregorian date.
fn days_from_civil(year: i64, month: u32, day: u32) -> i64 {
    let year = if month <= 2 { year - 1 } else { year };
    let era = year.div_euclid(400);
    let year_of_era = year - era * 400;
    let month = i64::from(month);
    let day_of_year = (153 * (if month > 2 { month - 3 } else { month + 9 }) + 2) / 5
        + i64::from(day)
        - 1;
    let day_of_era = year_of_era * 365 + year_of_era / 4 - year_of_era / 100 + day_of_year;
    era * 146_097 + day_of_era - 719_468
}

fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let days = days + 719_468;
    let era = days.div_euclid(146_097);
    let day_of_era = days - era * 146_097;
    let year_of_era =
        (day_of_era - day_of_era / 1_460 + day_of_era / 36_524 - day_of_era / 146_096) / 365;
    let day_of_year = day_of_era - (365 * year_of_era + year_of_era / 4 - year_of_era / 100);
    let mp = (5 * day_of_year + 2) / 153;
    let day = (day_of_year - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = year_of_era + era * 400 + i64::from(month <= 2);
    (year, month, day)
}
