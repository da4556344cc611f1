//! Clock-string helpers and the lunar calendar date shown on the dashboard.

use chrono::{DateTime, Datelike, Duration, Local, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use hijri_date::HijriDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const MINUTES_PER_DAY: i64 = 24 * 60;

// Range covered by the Umm al-Qura tables.
const HIJRI_MIN_GREGORIAN_YEAR: i32 = 1938;
const HIJRI_MAX_GREGORIAN_YEAR: i32 = 2076;

const HIJRI_MONTH_NAMES: [&str; 12] = [
    "Muharram",
    "Safar",
    "Rabiʻ I",
    "Rabiʻ II",
    "Jumada I",
    "Jumada II",
    "Rajab",
    "Shaʻban",
    "Ramadan",
    "Shawwal",
    "Dhuʻl-Qiʻdah",
    "Dhuʻl-Hijjah",
];

/// A wall-clock time of day with minute precision, written as "HH:MM".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime {
    minute_of_day: u16,
}

impl ClockTime {
    pub fn from_hm(hour: u8, minute: u8) -> Option<Self> {
        if hour > 23 || minute > 59 {
            return None;
        }
        Some(Self {
            minute_of_day: u16::from(hour) * 60 + u16::from(minute),
        })
    }

    pub fn hour(self) -> u8 {
        (self.minute_of_day / 60) as u8
    }

    pub fn minute(self) -> u8 {
        (self.minute_of_day % 60) as u8
    }

    pub fn minute_of_day(self) -> u16 {
        self.minute_of_day
    }

    /// Adds a signed offset, wrapping around midnight.
    pub fn add_minutes(self, delta: i64) -> Self {
        let shifted = (i64::from(self.minute_of_day) + delta.rem_euclid(MINUTES_PER_DAY))
            .rem_euclid(MINUTES_PER_DAY);
        Self {
            minute_of_day: shifted as u16,
        }
    }

    pub fn to_12_hour(self) -> String {
        let hour = self.hour();
        let suffix = if hour >= 12 { "PM" } else { "AM" };
        let display_hour = match hour % 12 {
            0 => 12,
            other => other,
        };
        format!("{display_hour}:{:02} {suffix}", self.minute())
    }
}

impl FromStr for ClockTime {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("'{value}' must be HH:MM");
        let (hour, minute) = value.trim().split_once(':').ok_or_else(invalid)?;
        if hour.is_empty() || hour.len() > 2 || minute.len() != 2 {
            return Err(invalid());
        }
        let hour = hour.parse::<u8>().map_err(|_| invalid())?;
        let minute = minute.parse::<u8>().map_err(|_| invalid())?;
        Self::from_hm(hour, minute).ok_or_else(invalid)
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl Serialize for ClockTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClockTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// "17:05" -> "5:05 PM". Empty input stays empty; anything unparseable is
/// returned unchanged.
pub fn format_clock(time: &str) -> String {
    if time.trim().is_empty() {
        return String::new();
    }
    match time.parse::<ClockTime>() {
        Ok(clock) => clock.to_12_hour(),
        Err(_) => time.to_string(),
    }
}

/// "23:58" + 5 -> "00:03". Empty input stays empty.
pub fn add_minutes(time: &str, delta: i64) -> String {
    if time.trim().is_empty() {
        return String::new();
    }
    match time.parse::<ClockTime>() {
        Ok(clock) => clock.add_minutes(delta).to_string(),
        Err(_) => time.to_string(),
    }
}

/// Umm al-Qura date for `now`'s calendar day shifted by `adjustment_days`,
/// e.g. "Ramadan 1, 1447 AH".
pub fn calendar_date<Z: TimeZone>(now: &DateTime<Z>, adjustment_days: i32) -> Result<String, String> {
    let out_of_range = |date: &dyn fmt::Display| {
        format!(
            "{date} is outside the supported Umm al-Qura range ({HIJRI_MIN_GREGORIAN_YEAR}-{HIJRI_MAX_GREGORIAN_YEAR})"
        )
    };
    let date = now
        .date_naive()
        .checked_add_signed(Duration::days(i64::from(adjustment_days)))
        .ok_or_else(|| out_of_range(&format_args!("today {adjustment_days:+} days")))?;
    if !(HIJRI_MIN_GREGORIAN_YEAR..=HIJRI_MAX_GREGORIAN_YEAR).contains(&date.year()) {
        return Err(out_of_range(&date));
    }

    let hijri = HijriDate::from_gr(date.year() as usize, date.month() as usize, date.day() as usize)
        .map_err(|error| format!("hijri conversion failed for {date}: {error}"))?;
    let month_name = hijri
        .month()
        .checked_sub(1)
        .and_then(|index| HIJRI_MONTH_NAMES.get(index))
        .ok_or_else(|| format!("hijri conversion produced invalid month {}", hijri.month()))?;

    Ok(format!("{month_name} {}, {} AH", hijri.day(), hijri.year()))
}

/// Minute of the day at `now` as seen in `time_zone`.
///
/// An unknown zone name falls back to the host's local time.
pub fn minute_of_day_in_zone(now: DateTime<Utc>, time_zone: &str) -> u16 {
    match time_zone.trim().parse::<Tz>() {
        Ok(zone) => {
            let local = now.with_timezone(&zone);
            (local.hour() * 60 + local.minute()) as u16
        }
        Err(_) => {
            tracing::debug!(time_zone, "unknown time zone, using host local time");
            let local = now.with_timezone(&Local);
            (local.hour() * 60 + local.minute()) as u16
        }
    }
}

/// Live clock for the dashboard header, "hh:mm AM" in `time_zone`.
pub fn format_clock_in_zone(now: DateTime<Utc>, time_zone: &str) -> String {
    match time_zone.trim().parse::<Tz>() {
        Ok(zone) => now.with_timezone(&zone).format("%I:%M %p").to_string(),
        Err(_) => now.with_timezone(&Local).format("%I:%M %p").to_string(),
    }
}
