use crate::domain::models::GeoCoordinates;
use crate::infrastructure::error::InfraError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use url::Url;

const APP_JSON: &str = "app.json";
const SUPPORTED_SCHEMA: u64 = 1;
pub const DEFAULT_PROVIDER_BASE_URL: &str = "https://api.aladhan.com/v1";
const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 15;
const DEFAULT_TICK_INTERVAL_MILLIS: u64 = 1_000;

const PROVIDER_URL_KEYS: &[&str] = &["ALRUA_PROVIDER_URL", "PRAYER_PROVIDER_URL"];
const LATITUDE_KEYS: &[&str] = &["ALRUA_LATITUDE", "DEVICE_LATITUDE"];
const LONGITUDE_KEYS: &[&str] = &["ALRUA_LONGITUDE", "DEVICE_LONGITUDE"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub schema: u64,
    pub provider_base_url: String,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_tick_interval_millis")]
    pub tick_interval_millis: u64,
    #[serde(default)]
    pub device_location: Option<GeoCoordinates>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            schema: SUPPORTED_SCHEMA,
            provider_base_url: DEFAULT_PROVIDER_BASE_URL.to_string(),
            request_timeout_seconds: DEFAULT_REQUEST_TIMEOUT_SECONDS,
            tick_interval_millis: DEFAULT_TICK_INTERVAL_MILLIS,
            device_location: None,
        }
    }
}

impl AppConfig {
    pub fn provider_url(&self) -> Result<Url, InfraError> {
        Url::parse(self.provider_base_url.trim()).map_err(|error| {
            InfraError::InvalidConfig(format!(
                "invalid providerBaseUrl '{}': {error}",
                self.provider_base_url
            ))
        })
    }

    pub fn validate(&self) -> Result<(), InfraError> {
        self.provider_url()?;
        if self.request_timeout_seconds == 0 {
            return Err(InfraError::InvalidConfig(
                "requestTimeoutSeconds must be > 0".to_string(),
            ));
        }
        if self.tick_interval_millis == 0 {
            return Err(InfraError::InvalidConfig(
                "tickIntervalMillis must be > 0".to_string(),
            ));
        }
        if let Some(location) = &self.device_location {
            location.validate().map_err(InfraError::InvalidConfig)?;
        }
        Ok(())
    }

    /// Applies environment overrides on top of the file values.
    pub fn with_overrides_from_lookup<F>(mut self, lookup: F) -> Result<Self, InfraError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = optional_lookup_value(&lookup, PROVIDER_URL_KEYS) {
            self.provider_base_url = url;
        }

        let latitude = optional_lookup_value(&lookup, LATITUDE_KEYS);
        let longitude = optional_lookup_value(&lookup, LONGITUDE_KEYS);
        match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => {
                let location = GeoCoordinates {
                    latitude: parse_coordinate(&latitude, "latitude")?,
                    longitude: parse_coordinate(&longitude, "longitude")?,
                };
                location.validate().map_err(InfraError::InvalidConfig)?;
                self.device_location = Some(location);
            }
            (None, None) => {}
            _ => {
                return Err(InfraError::InvalidConfig(format!(
                    "device location needs both latitude ({}) and longitude ({})",
                    LATITUDE_KEYS.join(", "),
                    LONGITUDE_KEYS.join(", ")
                )));
            }
        }

        self.validate()?;
        Ok(self)
    }

    pub fn with_env_overrides(self) -> Result<Self, InfraError> {
        self.with_overrides_from_lookup(|key| std::env::var(key).ok())
    }
}

fn default_request_timeout_seconds() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECONDS
}

fn default_tick_interval_millis() -> u64 {
    DEFAULT_TICK_INTERVAL_MILLIS
}

fn parse_coordinate(raw: &str, field_name: &str) -> Result<f64, InfraError> {
    raw.trim().parse::<f64>().map_err(|error| {
        InfraError::InvalidConfig(format!("{field_name} must be a number: {error}"))
    })
}

fn optional_lookup_value<F>(lookup: &F, keys: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    for key in keys {
        if let Some(value) = lookup(key) {
            let normalized = value.trim();
            if !normalized.is_empty() {
                return Some(normalized.to_string());
            }
        }
    }
    None
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    let path = config_dir.join(APP_JSON);
    if !path.exists() {
        let formatted = serde_json::to_string_pretty(&AppConfig::default())?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != SUPPORTED_SCHEMA {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn load_app_config(config_dir: &Path) -> Result<AppConfig, InfraError> {
    let raw = read_config(&config_dir.join(APP_JSON))?;
    let config: AppConfig = serde_json::from_value(raw)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_ID: AtomicUsize = AtomicUsize::new(0);

    struct TempDir {
        path: PathBuf,
    }

    impl TempDir {
        fn new() -> Self {
            let sequence = NEXT_TEMP_ID.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "alrua-config-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp dir");
            Self { path }
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    #[test]
    fn default_config_is_written_and_loaded() {
        let dir = TempDir::new();
        ensure_default_configs(&dir.path).expect("write defaults");
        let config = load_app_config(&dir.path).expect("load config");

        assert_eq!(config, AppConfig::default());
        assert_eq!(
            config.provider_url().expect("valid url").as_str(),
            "https://api.aladhan.com/v1"
        );
    }

    #[test]
    fn existing_config_is_not_overwritten() {
        let dir = TempDir::new();
        let custom = serde_json::json!({
            "schema": 1,
            "providerBaseUrl": "http://127.0.0.1:9999/v1",
            "deviceLocation": { "latitude": 21.42, "longitude": 39.83 }
        });
        fs::write(dir.path.join(APP_JSON), custom.to_string()).expect("write config");

        ensure_default_configs(&dir.path).expect("ensure defaults");
        let config = load_app_config(&dir.path).expect("load config");

        assert_eq!(config.provider_base_url, "http://127.0.0.1:9999/v1");
        assert_eq!(config.request_timeout_seconds, 15);
        assert_eq!(
            config.device_location,
            Some(GeoCoordinates { latitude: 21.42, longitude: 39.83 })
        );
    }

    #[test]
    fn unsupported_schema_is_rejected() {
        let dir = TempDir::new();
        fs::write(
            dir.path.join(APP_JSON),
            r#"{"schema": 2, "providerBaseUrl": "https://api.aladhan.com/v1"}"#,
        )
        .expect("write config");

        match load_app_config(&dir.path) {
            Err(InfraError::InvalidConfig(message)) => assert!(message.contains("unsupported schema")),
            other => panic!("expected invalid config, got {other:?}"),
        }
    }

    #[test]
    fn env_overrides_replace_provider_and_location() {
        let config = AppConfig::default()
            .with_overrides_from_lookup(|key| match key {
                "ALRUA_PROVIDER_URL" => Some("http://localhost:8080/v1".to_string()),
                "DEVICE_LATITUDE" => Some(" 30.04 ".to_string()),
                "ALRUA_LONGITUDE" => Some("31.24".to_string()),
                _ => None,
            })
            .expect("apply overrides");

        assert_eq!(config.provider_base_url, "http://localhost:8080/v1");
        assert_eq!(
            config.device_location,
            Some(GeoCoordinates { latitude: 30.04, longitude: 31.24 })
        );
    }

    #[test]
    fn env_overrides_require_both_coordinates() {
        let result = AppConfig::default().with_overrides_from_lookup(|key| match key {
            "ALRUA_LATITUDE" => Some("30.04".to_string()),
            _ => None,
        });
        match result {
            Err(InfraError::InvalidConfig(message)) => assert!(message.contains("longitude")),
            other => panic!("expected invalid config, got {other:?}"),
        }
    }
}
