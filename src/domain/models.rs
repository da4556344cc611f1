use crate::domain::clock::ClockTime;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const SEVENTEEN_DEGREE_METHOD_ID: u16 = 991;
const SEVENTEEN_DEGREE_BASE_METHOD_ID: u16 = 1;
const SEVENTEEN_DEGREE_FAJR_MARGIN_MINUTES: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodInfo {
    pub id: u16,
    pub name: &'static str,
}

pub const CALCULATION_METHODS: &[MethodInfo] = &[
    MethodInfo { id: 2, name: "Islamic Society of North America (ISNA)" },
    MethodInfo { id: 3, name: "Muslim World League" },
    MethodInfo { id: 4, name: "Umm Al-Qura University, Makkah" },
    MethodInfo { id: 5, name: "Egyptian General Authority of Surveying" },
    MethodInfo { id: 1, name: "University of Islamic Sciences, Karachi" },
    MethodInfo { id: 0, name: "Shia Ithna-Ashari (Jafari)" },
    MethodInfo { id: 12, name: "France (UOIF)" },
    MethodInfo { id: 13, name: "Turkey (Diyanet)" },
    MethodInfo { id: 14, name: "Russia (Spiritual Administration)" },
    MethodInfo { id: 11, name: "Singapore (MUIS)" },
    MethodInfo { id: 8, name: "Gulf Region" },
    MethodInfo { id: SEVENTEEN_DEGREE_METHOD_ID, name: "University of Islamic Sciences (17 degree)" },
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LocationMode {
    Gps,
    City,
}

impl LocationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gps => "gps",
            Self::City => "city",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gps" => Some(Self::Gps),
            "city" => Some(Self::City),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SavedCity {
    pub city: String,
    pub country: String,
}

impl SavedCity {
    pub fn new(city: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            city: city.into().trim().to_string(),
            country: country.into().trim().to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.city, "saved_city.city")?;
        validate_non_empty(&self.country, "saved_city.country")
    }

    pub fn label(&self) -> String {
        format!("{}, {}", self.city, self.country)
    }
}

/// A calculation convention as the user picked it.
///
/// `SeventeenDegree` is not a provider method: it is sent as the Karachi
/// method and rewritten locally after the response arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CalculationMethod {
    Native(u16),
    #[default]
    SeventeenDegree,
}

impl CalculationMethod {
    pub fn from_id(id: i64) -> Option<Self> {
        if id == i64::from(SEVENTEEN_DEGREE_METHOD_ID) {
            return Some(Self::SeventeenDegree);
        }
        CALCULATION_METHODS
            .iter()
            .find(|method| i64::from(method.id) == id)
            .map(|method| Self::Native(method.id))
    }

    pub fn id(self) -> u16 {
        match self {
            Self::Native(id) => id,
            Self::SeventeenDegree => SEVENTEEN_DEGREE_METHOD_ID,
        }
    }

    pub fn name(self) -> &'static str {
        let id = self.id();
        CALCULATION_METHODS
            .iter()
            .find(|method| method.id == id)
            .map(|method| method.name)
            .unwrap_or("Custom method")
    }

    pub fn policy(self) -> MethodPolicy {
        match self {
            Self::Native(id) => MethodPolicy {
                provider_method_id: id,
                post_process: None,
            },
            Self::SeventeenDegree => MethodPolicy {
                provider_method_id: SEVENTEEN_DEGREE_BASE_METHOD_ID,
                post_process: Some(apply_seventeen_degree_margin),
            },
        }
    }
}

impl fmt::Display for CalculationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.id())
    }
}

impl Serialize for CalculationMethod {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u16(self.id())
    }
}

impl<'de> Deserialize<'de> for CalculationMethod {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let id = i64::deserialize(deserializer)?;
        Self::from_id(id)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown calculation method {id}")))
    }
}

/// The provider-facing side of a [`CalculationMethod`].
#[derive(Clone, Copy)]
pub struct MethodPolicy {
    pub provider_method_id: u16,
    post_process: Option<fn(TimingSet) -> TimingSet>,
}

impl MethodPolicy {
    pub fn apply(&self, timings: TimingSet) -> TimingSet {
        match self.post_process {
            Some(post_process) => post_process(timings),
            None => timings,
        }
    }

    pub fn rewrites_timings(&self) -> bool {
        self.post_process.is_some()
    }
}

impl fmt::Debug for MethodPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodPolicy")
            .field("provider_method_id", &self.provider_method_id)
            .field("rewrites_timings", &self.rewrites_timings())
            .finish()
    }
}

fn apply_seventeen_degree_margin(timings: TimingSet) -> TimingSet {
    let original_fajr = timings.fajr;
    TimingSet {
        imsak: original_fajr,
        fajr: original_fajr.add_minutes(SEVENTEEN_DEGREE_FAJR_MARGIN_MINUTES),
        ..timings
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JurisprudenceSchool {
    Standard,
    #[default]
    Hanafi,
}

impl JurisprudenceSchool {
    pub const ALL: [Self; 2] = [Self::Standard, Self::Hanafi];

    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            0 => Some(Self::Standard),
            1 => Some(Self::Hanafi),
            _ => None,
        }
    }

    pub fn id(self) -> u8 {
        match self {
            Self::Standard => 0,
            Self::Hanafi => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Standard => "Standard (Shafi, Maliki, Hanbali)",
            Self::Hanafi => "Hanafi",
        }
    }
}

impl Serialize for JurisprudenceSchool {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u8(self.id())
    }
}

impl<'de> Deserialize<'de> for JurisprudenceSchool {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let id = i64::deserialize(deserializer)?;
        Self::from_id(id)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown jurisprudence school {id}")))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Preferences {
    pub location_mode: LocationMode,
    pub saved_city: Option<SavedCity>,
    pub calculation_method: CalculationMethod,
    pub jurisprudence_school: JurisprudenceSchool,
    pub calendar_adjustment: i32,
    pub theme: Theme,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            location_mode: LocationMode::Gps,
            saved_city: None,
            calculation_method: CalculationMethod::SeventeenDegree,
            jurisprudence_school: JurisprudenceSchool::Hanafi,
            calendar_adjustment: 0,
            theme: Theme::Dark,
        }
    }
}

/// Method, school and calendar adjustment chosen together in settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionSettings {
    pub method: CalculationMethod,
    pub school: JurisprudenceSchool,
    pub calendar_adjustment: i32,
}

impl Preferences {
    pub fn settings(&self) -> ResolutionSettings {
        ResolutionSettings {
            method: self.calculation_method,
            school: self.jurisprudence_school,
            calendar_adjustment: self.calendar_adjustment,
        }
    }

    pub fn apply_settings(&mut self, settings: ResolutionSettings) {
        self.calculation_method = settings.method;
        self.jurisprudence_school = settings.school;
        self.calendar_adjustment = settings.calendar_adjustment;
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PrayerName {
    Imsak,
    Fajr,
    Sunrise,
    Dhuhr,
    Asr,
    Maghrib,
    Isha,
}

impl PrayerName {
    pub const DISPLAY_ORDER: [Self; 7] = [
        Self::Imsak,
        Self::Fajr,
        Self::Sunrise,
        Self::Dhuhr,
        Self::Asr,
        Self::Maghrib,
        Self::Isha,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Imsak => "Imsak",
            Self::Fajr => "Fajr",
            Self::Sunrise => "Sunrise",
            Self::Dhuhr => "Dhuhr",
            Self::Asr => "Asr",
            Self::Maghrib => "Maghrib",
            Self::Isha => "Isha",
        }
    }
}

impl fmt::Display for PrayerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct TimingSet {
    pub fajr: ClockTime,
    pub sunrise: ClockTime,
    pub dhuhr: ClockTime,
    pub asr: ClockTime,
    pub maghrib: ClockTime,
    pub isha: ClockTime,
    pub imsak: ClockTime,
}

impl TimingSet {
    pub fn get(&self, name: PrayerName) -> ClockTime {
        match name {
            PrayerName::Imsak => self.imsak,
            PrayerName::Fajr => self.fajr,
            PrayerName::Sunrise => self.sunrise,
            PrayerName::Dhuhr => self.dhuhr,
            PrayerName::Asr => self.asr,
            PrayerName::Maghrib => self.maghrib,
            PrayerName::Isha => self.isha,
        }
    }

    /// Checks the within-day ordering Imsak <= Fajr <= ... <= Isha.
    ///
    /// High-latitude locations can push Isha past midnight, so callers treat a
    /// violation as a warning rather than rejecting the set.
    pub fn validate(&self) -> Result<(), String> {
        let mut previous: Option<(PrayerName, ClockTime)> = None;
        for name in PrayerName::DISPLAY_ORDER {
            let time = self.get(name);
            if let Some((previous_name, previous_time)) = previous {
                if time < previous_time {
                    return Err(format!(
                        "timings.{name} ({time}) is earlier than timings.{previous_name} ({previous_time})"
                    ));
                }
            }
            previous = Some((name, time));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoCoordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoCoordinates {
    pub fn validate(&self) -> Result<(), String> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err("coordinates.latitude must be within [-90, 90]".to_string());
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err("coordinates.longitude must be within [-180, 180]".to_string());
        }
        Ok(())
    }

    pub fn label(&self) -> String {
        format!("{:.2}°N, {:.2}°E", self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LocationQuery {
    Coordinates(GeoCoordinates),
    City(SavedCity),
}

impl LocationQuery {
    pub fn mode(&self) -> LocationMode {
        match self {
            Self::Coordinates(_) => LocationMode::Gps,
            Self::City(_) => LocationMode::City,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResolvedLocationState {
    pub timing_set: Option<TimingSet>,
    pub time_zone: String,
    pub display_name: String,
    pub mode: LocationMode,
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}
