use crate::domain::models::{
    CalculationMethod, JurisprudenceSchool, LocationMode, Preferences, SavedCity, Theme,
};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::open_database;
use chrono::Utc;
use rusqlite::params;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const LOCATION_MODE_KEY: &str = "locationMode";
pub const SAVED_CITY_KEY: &str = "savedCity";
pub const CALCULATION_METHOD_KEY: &str = "calculationMethod";
pub const SCHOOL_KEY: &str = "fiqh";
pub const CALENDAR_ADJUSTMENT_KEY: &str = "hijriAdjustment";
pub const THEME_KEY: &str = "theme";

/// Durable home of the user's [`Preferences`].
///
/// `load` never fails on bad data: each field that is missing or unparseable
/// takes its default. `save` writes the whole record at once.
pub trait PreferenceStore: Send + Sync {
    fn load(&self) -> Result<Preferences, InfraError>;
    fn save(&self, preferences: &Preferences) -> Result<(), InfraError>;
}

pub fn preferences_from_entries(entries: &HashMap<String, String>) -> Preferences {
    let defaults = Preferences::default();
    let entry = |key: &str| entries.get(key).map(|value| value.trim());

    let location_mode = match entry(LOCATION_MODE_KEY) {
        Some("city") => LocationMode::City,
        _ => LocationMode::Gps,
    };
    let saved_city = entry(SAVED_CITY_KEY)
        .and_then(|raw| serde_json::from_str::<SavedCity>(raw).ok())
        .map(|city| SavedCity::new(city.city, city.country))
        .filter(|city| city.validate().is_ok());
    let calculation_method = entry(CALCULATION_METHOD_KEY)
        .and_then(|raw| raw.parse::<i64>().ok())
        .and_then(CalculationMethod::from_id)
        .unwrap_or(defaults.calculation_method);
    let jurisprudence_school = entry(SCHOOL_KEY)
        .and_then(|raw| raw.parse::<i64>().ok())
        .and_then(JurisprudenceSchool::from_id)
        .unwrap_or(defaults.jurisprudence_school);
    let calendar_adjustment = entry(CALENDAR_ADJUSTMENT_KEY)
        .and_then(|raw| raw.parse::<i32>().ok())
        .unwrap_or(defaults.calendar_adjustment);
    let theme = entry(THEME_KEY)
        .and_then(Theme::parse)
        .unwrap_or(defaults.theme);

    Preferences {
        location_mode,
        saved_city,
        calculation_method,
        jurisprudence_school,
        calendar_adjustment,
        theme,
    }
}

/// Key/value rows for a record. `None` means the key is removed.
pub fn preferences_to_entries(
    preferences: &Preferences,
) -> Result<Vec<(&'static str, Option<String>)>, InfraError> {
    let saved_city = preferences
        .saved_city
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    Ok(vec![
        (LOCATION_MODE_KEY, Some(preferences.location_mode.as_str().to_string())),
        (SAVED_CITY_KEY, saved_city),
        (
            CALCULATION_METHOD_KEY,
            Some(preferences.calculation_method.id().to_string()),
        ),
        (SCHOOL_KEY, Some(preferences.jurisprudence_school.id().to_string())),
        (
            CALENDAR_ADJUSTMENT_KEY,
            Some(preferences.calendar_adjustment.to_string()),
        ),
        (THEME_KEY, Some(preferences.theme.as_str().to_string())),
    ])
}

#[derive(Debug, Clone)]
pub struct SqlitePreferenceStore {
    db_path: PathBuf,
}

impl SqlitePreferenceStore {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }
}

impl PreferenceStore for SqlitePreferenceStore {
    fn load(&self) -> Result<Preferences, InfraError> {
        let connection = open_database(&self.db_path)?;
        let mut statement = connection.prepare("SELECT key, value FROM preferences")?;
        let rows = statement.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

        let mut entries = HashMap::new();
        for row in rows {
            let (key, value) = row?;
            entries.insert(key, value);
        }
        Ok(preferences_from_entries(&entries))
    }

    fn save(&self, preferences: &Preferences) -> Result<(), InfraError> {
        let entries = preferences_to_entries(preferences)?;
        let updated_at = Utc::now().to_rfc3339();

        let mut connection = open_database(&self.db_path)?;
        let transaction = connection.transaction()?;
        for (key, value) in entries {
            match value {
                Some(value) => {
                    transaction.execute(
                        "INSERT INTO preferences (key, value, updated_at)
                         VALUES (?1, ?2, ?3)
                         ON CONFLICT(key) DO UPDATE SET
                           value = excluded.value,
                           updated_at = excluded.updated_at",
                        params![key, value, updated_at],
                    )?;
                }
                None => {
                    transaction.execute("DELETE FROM preferences WHERE key = ?1", params![key])?;
                }
            }
        }
        transaction.commit()?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryPreferenceStore {
    entries: Mutex<HashMap<String, String>>,
    saves: Mutex<usize>,
}

impl InMemoryPreferenceStore {
    /// Seeds raw key/value rows, including deliberately malformed ones.
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: Mutex::new(
                entries
                    .into_iter()
                    .map(|(key, value)| (key.into(), value.into()))
                    .collect(),
            ),
            saves: Mutex::new(0),
        }
    }

    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|saves| *saves).unwrap_or_default()
    }

    pub fn raw_value(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(key).cloned())
    }
}

impl PreferenceStore for InMemoryPreferenceStore {
    fn load(&self) -> Result<Preferences, InfraError> {
        let entries = self
            .entries
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("preference store lock poisoned: {error}")))?;
        Ok(preferences_from_entries(&entries))
    }

    fn save(&self, preferences: &Preferences) -> Result<(), InfraError> {
        let rows = preferences_to_entries(preferences)?;
        let mut entries = self
            .entries
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("preference store lock poisoned: {error}")))?;
        for (key, value) in rows {
            match value {
                Some(value) => {
                    entries.insert(key.to_string(), value);
                }
                None => {
                    entries.remove(key);
                }
            }
        }
        let mut saves = self
            .saves
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("preference store lock poisoned: {error}")))?;
        *saves += 1;
        Ok(())
    }
}
