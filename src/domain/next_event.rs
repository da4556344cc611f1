use crate::domain::clock::{minute_of_day_in_zone, ClockTime};
use crate::domain::models::{PrayerName, TimingSet};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Events that can be "next". Sunrise and Imsak are informational only.
pub const NEXT_EVENT_CANDIDATES: [PrayerName; 5] = [
    PrayerName::Fajr,
    PrayerName::Dhuhr,
    PrayerName::Asr,
    PrayerName::Maghrib,
    PrayerName::Isha,
];

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct NextEvent {
    pub name: PrayerName,
    pub time: ClockTime,
    /// True when every candidate has passed and this is tomorrow's Fajr.
    pub wraps_to_tomorrow: bool,
}

/// First candidate strictly after `minute_of_day`, or Fajr after Isha.
pub fn next_event_at(timings: &TimingSet, minute_of_day: u16) -> NextEvent {
    NEXT_EVENT_CANDIDATES
        .iter()
        .map(|name| (*name, timings.get(*name)))
        .find(|(_, time)| time.minute_of_day() > minute_of_day)
        .map(|(name, time)| NextEvent {
            name,
            time,
            wraps_to_tomorrow: false,
        })
        .unwrap_or(NextEvent {
            name: PrayerName::Fajr,
            time: timings.fajr,
            wraps_to_tomorrow: true,
        })
}

/// Next event at `now`, with the current minute taken in `time_zone` rather
/// than the host's zone.
pub fn next_event(timings: Option<&TimingSet>, time_zone: &str, now: DateTime<Utc>) -> Option<NextEvent> {
    let timings = timings?;
    Some(next_event_at(timings, minute_of_day_in_zone(now, time_zone)))
}
