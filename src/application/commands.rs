use crate::application::bootstrap::bootstrap_workspace;
use crate::application::preference_engine::{
    EngineSnapshot, PreferenceEngine, ResolutionOutcome,
};
use crate::application::timing_resolver::{NowProvider, TimingResolver};
use crate::domain::clock::{calendar_date, format_clock, format_clock_in_zone};
use crate::domain::models::{
    CALCULATION_METHODS, CalculationMethod, JurisprudenceSchool, LocationMode, PrayerName,
    ResolutionSettings, Theme,
};
use crate::domain::next_event::NextEvent;
use crate::domain::verses::daily_verse;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::location_service::ConfiguredLocationService;
use crate::infrastructure::preference_store::SqlitePreferenceStore;
use crate::infrastructure::timing_provider_client::ReqwestTimingProviderClient;
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const NO_NEXT_EVENT_PLACEHOLDER: &str = "--:--";

type AppEngine =
    PreferenceEngine<ReqwestTimingProviderClient, ConfiguredLocationService, SqlitePreferenceStore>;

pub struct AppState {
    workspace_root: PathBuf,
    database_path: PathBuf,
    config: AppConfig,
    engine: AppEngine,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        Self::with_now_provider(workspace_root, Arc::new(Utc::now))
    }

    pub fn with_now_provider(
        workspace_root: PathBuf,
        now_provider: NowProvider,
    ) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let config = bootstrap.config;

        let provider_client = ReqwestTimingProviderClient::new(
            config.provider_url()?,
            Duration::from_secs(config.request_timeout_seconds),
        )?;
        let resolver = TimingResolver::new(Arc::new(provider_client))
            .with_now_provider(Arc::clone(&now_provider));
        let engine = PreferenceEngine::new(
            resolver,
            Arc::new(ConfiguredLocationService::new(config.device_location)),
            Arc::new(SqlitePreferenceStore::new(&bootstrap.database_path)),
        )?
        .with_now_provider(now_provider);

        Ok(Self {
            workspace_root,
            database_path: bootstrap.database_path,
            config,
            engine,
        })
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.config.tick_interval_millis)
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        tracing::info!(command, "{message}");
    }

    pub fn log_error(&self, command: &str, message: &str) {
        tracing::error!(command, "{message}");
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ResolutionResponse {
    pub status: String,
    pub location_name: String,
    pub time_zone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MethodResponse {
    pub id: u16,
    pub name: String,
    pub selected: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SchoolResponse {
    pub id: u8,
    pub name: String,
    pub selected: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TimingRow {
    pub name: String,
    pub time: String,
    pub display_time: String,
    pub is_next: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NextEventResponse {
    pub name: Option<String>,
    pub display_time: String,
    pub wraps_to_tomorrow: bool,
    pub clock: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct VerseResponse {
    pub arabic: String,
    pub translation: String,
    pub reference: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DashboardResponse {
    pub location_name: String,
    pub mode: String,
    pub time_zone: String,
    pub in_flight: bool,
    pub timings: Vec<TimingRow>,
    pub next_event: NextEventResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar_date: Option<String>,
    pub verse: VerseResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub theme: String,
    pub calculation_method: MethodResponse,
    pub school: SchoolResponse,
    pub calendar_adjustment: i32,
}

pub async fn start_impl(state: &AppState) -> Result<ResolutionResponse, InfraError> {
    let outcome = state.engine.start().await?;
    respond("start", state, outcome)
}

pub async fn switch_to_gps_impl(
    state: &AppState,
    method: Option<i64>,
    school: Option<i64>,
    calendar_adjustment: Option<i32>,
) -> Result<ResolutionResponse, InfraError> {
    let settings = merge_settings(state, method, school, calendar_adjustment)?;
    let outcome = state.engine.switch_to_gps(settings).await?;
    respond("switch_to_gps", state, outcome)
}

pub async fn switch_to_city_impl(
    state: &AppState,
    city: String,
    country: String,
    method: Option<i64>,
    school: Option<i64>,
    calendar_adjustment: Option<i32>,
) -> Result<ResolutionResponse, InfraError> {
    let settings = merge_settings(state, method, school, calendar_adjustment)?;
    let outcome = state
        .engine
        .switch_to_city(&city, &country, settings)
        .await?;
    respond("switch_to_city", state, outcome)
}

pub async fn refresh_impl(state: &AppState) -> Result<ResolutionResponse, InfraError> {
    let outcome = state.engine.refresh().await?;
    respond("refresh", state, outcome)
}

pub async fn set_location_mode_impl(
    state: &AppState,
    mode: String,
) -> Result<ResolutionResponse, InfraError> {
    let mode = LocationMode::parse(&mode).ok_or_else(|| {
        InfraError::InvalidConfig(format!("location mode must be gps or city: {mode}"))
    })?;
    let outcome = state.engine.set_location_mode(mode).await?;
    respond("set_location_mode", state, outcome)
}

pub fn set_theme_impl(state: &AppState, theme: String) -> Result<String, InfraError> {
    let theme = Theme::parse(&theme)
        .ok_or_else(|| InfraError::InvalidConfig(format!("theme must be light or dark: {theme}")))?;
    let theme = state.engine.set_theme(theme)?;
    state.log_info("set_theme", &format!("theme={}", theme.as_str()));
    Ok(theme.as_str().to_string())
}

pub fn toggle_theme_impl(state: &AppState) -> Result<String, InfraError> {
    let theme = state.engine.toggle_theme()?;
    state.log_info("toggle_theme", &format!("theme={}", theme.as_str()));
    Ok(theme.as_str().to_string())
}

pub fn set_calendar_adjustment_impl(state: &AppState, days: i32) -> Result<i32, InfraError> {
    let days = state.engine.set_calendar_adjustment(days)?;
    state.log_info("set_calendar_adjustment", &format!("days={days}"));
    Ok(days)
}

pub fn adjust_calendar_impl(state: &AppState, delta: i32) -> Result<i32, InfraError> {
    let days = state.engine.adjust_calendar(delta)?;
    state.log_info("adjust_calendar", &format!("delta={delta} days={days}"));
    Ok(days)
}

pub fn list_calculation_methods_impl(state: &AppState) -> Result<Vec<MethodResponse>, InfraError> {
    let selected = state.engine.snapshot()?.preferences.calculation_method;
    Ok(CALCULATION_METHODS
        .iter()
        .map(|method| MethodResponse {
            id: method.id,
            name: method.name.to_string(),
            selected: method.id == selected.id(),
        })
        .collect())
}

pub fn list_schools_impl(state: &AppState) -> Result<Vec<SchoolResponse>, InfraError> {
    let selected = state.engine.snapshot()?.preferences.jurisprudence_school;
    Ok(JurisprudenceSchool::ALL
        .iter()
        .map(|school| school_response(*school, selected))
        .collect())
}

/// Clock and next event only; cheap enough for every tick.
pub fn next_event_impl(state: &AppState) -> Result<NextEventResponse, InfraError> {
    let now = state.engine.now();
    let snapshot = state.engine.snapshot()?;
    let next = snapshot.next_event(now);
    Ok(next_event_response(next, &snapshot, now))
}

pub fn dashboard_impl(state: &AppState) -> Result<DashboardResponse, InfraError> {
    let now = state.engine.now();
    let snapshot = state.engine.snapshot()?;
    let next = snapshot.next_event(now);
    let preferences = &snapshot.preferences;

    let timings = snapshot
        .resolved
        .timing_set
        .map(|timings| {
            PrayerName::DISPLAY_ORDER
                .iter()
                .map(|name| {
                    let time = timings.get(*name).to_string();
                    TimingRow {
                        name: name.as_str().to_string(),
                        display_time: format_clock(&time),
                        time,
                        is_next: next.is_some_and(|event| event.name == *name),
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    let local_now = now.with_timezone(&Local);
    let calendar_date = match calendar_date(&local_now, preferences.calendar_adjustment) {
        Ok(date) => Some(date),
        Err(message) => {
            state.log_error("dashboard", &message);
            None
        }
    };
    let verse = daily_verse(local_now.date_naive());

    Ok(DashboardResponse {
        location_name: snapshot.resolved.display_name.clone(),
        mode: snapshot.resolved.mode.as_str().to_string(),
        time_zone: snapshot.resolved.time_zone.clone(),
        in_flight: snapshot.in_flight,
        timings,
        next_event: next_event_response(next, &snapshot, now),
        calendar_date,
        verse: VerseResponse {
            arabic: verse.arabic.to_string(),
            translation: verse.translation.to_string(),
            reference: verse.reference.to_string(),
        },
        error: snapshot.last_error.as_ref().map(ToString::to_string),
        theme: preferences.theme.as_str().to_string(),
        calculation_method: method_response(preferences.calculation_method),
        school: school_response(
            preferences.jurisprudence_school,
            preferences.jurisprudence_school,
        ),
        calendar_adjustment: preferences.calendar_adjustment,
    })
}

fn merge_settings(
    state: &AppState,
    method: Option<i64>,
    school: Option<i64>,
    calendar_adjustment: Option<i32>,
) -> Result<ResolutionSettings, InfraError> {
    let mut settings = state.engine.snapshot()?.preferences.settings();
    if let Some(id) = method {
        settings.method = CalculationMethod::from_id(id)
            .ok_or_else(|| InfraError::InvalidConfig(format!("unknown calculation method: {id}")))?;
    }
    if let Some(id) = school {
        settings.school = JurisprudenceSchool::from_id(id)
            .ok_or_else(|| InfraError::InvalidConfig(format!("unknown school: {id}")))?;
    }
    if let Some(days) = calendar_adjustment {
        settings.calendar_adjustment = days;
    }
    Ok(settings)
}

fn respond(
    command: &str,
    state: &AppState,
    outcome: ResolutionOutcome,
) -> Result<ResolutionResponse, InfraError> {
    let snapshot = state.engine.snapshot()?;
    let (status, error, error_kind) = match &outcome {
        ResolutionOutcome::Resolved(_) => ("resolved", None, None),
        ResolutionOutcome::Failed(error) => (
            "failed",
            Some(error.to_string()),
            Some(error.kind().to_string()),
        ),
        ResolutionOutcome::Superseded => ("superseded", None, None),
        ResolutionOutcome::Skipped => ("skipped", None, None),
    };

    match &error {
        Some(message) => state.log_error(command, message),
        None => state.log_info(
            command,
            &format!(
                "status={status} location={} time_zone={}",
                snapshot.resolved.display_name, snapshot.resolved.time_zone
            ),
        ),
    }

    Ok(ResolutionResponse {
        status: status.to_string(),
        location_name: snapshot.resolved.display_name,
        time_zone: snapshot.resolved.time_zone,
        error,
        error_kind,
    })
}

fn next_event_response(
    next: Option<NextEvent>,
    snapshot: &EngineSnapshot,
    now: DateTime<Utc>,
) -> NextEventResponse {
    NextEventResponse {
        name: next.map(|event| event.name.as_str().to_string()),
        display_time: next
            .map(|event| event.time.to_12_hour())
            .unwrap_or_else(|| NO_NEXT_EVENT_PLACEHOLDER.to_string()),
        wraps_to_tomorrow: next.is_some_and(|event| event.wraps_to_tomorrow),
        clock: format_clock_in_zone(now, &snapshot.resolved.time_zone),
    }
}

fn method_response(method: CalculationMethod) -> MethodResponse {
    MethodResponse {
        id: method.id(),
        name: method.name().to_string(),
        selected: true,
    }
}

fn school_response(school: JurisprudenceSchool, selected: JurisprudenceSchool) -> SchoolResponse {
    SchoolResponse {
        id: school.id(),
        name: school.name().to_string(),
        selected: school == selected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_WORKSPACE: AtomicUsize = AtomicUsize::new(0);

    // 2026-02-18T14:00:00Z, 16:00 in Cairo.
    const FIXED_TIMESTAMP: i64 = 1_771_423_200;

    struct TempWorkspace {
        path: PathBuf,
    }

    impl TempWorkspace {
        fn new(provider_base_url: &str, device_location: Option<(f64, f64)>) -> Self {
            let sequence = NEXT_TEMP_WORKSPACE.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "alrua-command-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(path.join("config")).expect("create temp workspace");

            let mut config = serde_json::json!({
                "schema": 1,
                "providerBaseUrl": provider_base_url,
                "requestTimeoutSeconds": 5,
            });
            if let Some((latitude, longitude)) = device_location {
                config["deviceLocation"] =
                    serde_json::json!({ "latitude": latitude, "longitude": longitude });
            }
            fs::write(path.join("config").join("app.json"), config.to_string())
                .expect("write app config");
            Self { path }
        }

        fn app_state(&self) -> AppState {
            AppState::with_now_provider(self.path.clone(), fixed_now()).expect("initialize app state")
        }
    }

    impl Drop for TempWorkspace {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    fn fixed_now() -> NowProvider {
        Arc::new(|| {
            DateTime::from_timestamp(FIXED_TIMESTAMP, 0).expect("valid timestamp")
        })
    }

    fn provider_body(time_zone: &str) -> serde_json::Value {
        serde_json::json!({
            "code": 200,
            "status": "OK",
            "data": {
                "timings": {
                    "Fajr": "05:00",
                    "Sunrise": "06:20",
                    "Dhuhr": "12:00",
                    "Asr": "15:30",
                    "Maghrib": "18:00",
                    "Isha": "19:30",
                    "Imsak": "04:50"
                },
                "meta": { "timezone": time_zone }
            }
        })
    }

    #[tokio::test]
    async fn switch_to_city_resolves_and_builds_dashboard() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path(format!("/v1/timingsByCity/{FIXED_TIMESTAMP}"))
                    .query_param("city", "Cairo")
                    .query_param("country", "Egypt")
                    .query_param("method", "1")
                    .query_param("school", "1");
                then.status(200).json_body(provider_body("Africa/Cairo"));
            })
            .await;
        let workspace = TempWorkspace::new(&server.url("/v1"), None);
        let state = workspace.app_state();

        let response = switch_to_city_impl(
            &state,
            "Cairo".to_string(),
            "Egypt".to_string(),
            None,
            None,
            Some(-1),
        )
        .await
        .expect("switch to city");
        let dashboard = dashboard_impl(&state).expect("dashboard");

        mock.assert_async().await;
        assert_eq!(response.status, "resolved");
        assert_eq!(response.location_name, "Cairo, Egypt");
        assert_eq!(dashboard.time_zone, "Africa/Cairo");
        assert_eq!(dashboard.calendar_adjustment, -1);
        assert_eq!(dashboard.calculation_method.id, 991);
        assert_eq!(dashboard.next_event.name.as_deref(), Some("Maghrib"));
        assert_eq!(dashboard.next_event.display_time, "6:00 PM");
        assert_eq!(dashboard.next_event.clock, "04:00 PM");

        let fajr = dashboard
            .timings
            .iter()
            .find(|row| row.name == "Fajr")
            .expect("fajr row");
        assert_eq!(fajr.time, "05:05");
        assert_eq!(fajr.display_time, "5:05 AM");
        let next_rows: Vec<&str> = dashboard
            .timings
            .iter()
            .filter(|row| row.is_next)
            .map(|row| row.name.as_str())
            .collect();
        assert_eq!(next_rows, vec!["Maghrib"]);
    }

    #[tokio::test]
    async fn preferences_survive_restart() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path(format!("/v1/timingsByCity/{FIXED_TIMESTAMP}"));
                then.status(200).json_body(provider_body("Africa/Cairo"));
            })
            .await;
        let workspace = TempWorkspace::new(&server.url("/v1"), None);

        {
            let state = workspace.app_state();
            switch_to_city_impl(
                &state,
                "Cairo".to_string(),
                "Egypt".to_string(),
                Some(991),
                Some(1),
                Some(-1),
            )
            .await
            .expect("switch to city");
        }

        let restarted = workspace.app_state();
        let response = start_impl(&restarted).await.expect("start");

        assert_eq!(response.status, "resolved");
        assert_eq!(response.location_name, "Cairo, Egypt");
        let dashboard = dashboard_impl(&restarted).expect("dashboard");
        assert_eq!(dashboard.mode, "city");
        assert_eq!(dashboard.calendar_adjustment, -1);
        assert_eq!(dashboard.school.id, 1);
    }

    #[tokio::test]
    async fn unknown_city_reports_location_not_found() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path(format!("/v1/timingsByCity/{FIXED_TIMESTAMP}"));
                then.status(400)
                    .json_body(serde_json::json!({ "code": 400, "data": "Unable to find city" }));
            })
            .await;
        let workspace = TempWorkspace::new(&server.url("/v1"), None);
        let state = workspace.app_state();

        let response = switch_to_city_impl(
            &state,
            "Atlantis".to_string(),
            "Nowhere".to_string(),
            None,
            None,
            None,
        )
        .await
        .expect("command completes");
        let dashboard = dashboard_impl(&state).expect("dashboard");

        assert_eq!(response.status, "failed");
        assert_eq!(response.error.as_deref(), Some("Location not found"));
        assert_eq!(response.error_kind.as_deref(), Some("provider_rejected"));
        assert!(dashboard.timings.is_empty());
        assert_eq!(dashboard.next_event.display_time, "--:--");
        assert_eq!(dashboard.error.as_deref(), Some("Location not found"));
    }

    #[tokio::test]
    async fn gps_without_device_location_is_unavailable() {
        let workspace = TempWorkspace::new("http://127.0.0.1:9/v1", None);
        let state = workspace.app_state();

        let response = switch_to_gps_impl(&state, Some(4), Some(0), None)
            .await
            .expect("command completes");

        assert_eq!(response.status, "failed");
        assert_eq!(response.error.as_deref(), Some("Geolocation not supported"));
        assert_eq!(response.error_kind.as_deref(), Some("location_unavailable"));
        let methods = list_calculation_methods_impl(&state).expect("methods");
        let selected: Vec<u16> = methods.iter().filter(|m| m.selected).map(|m| m.id).collect();
        assert_eq!(selected, vec![4]);
    }

    #[tokio::test]
    async fn gps_uses_configured_position_and_zone_label() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path(format!("/v1/timings/{FIXED_TIMESTAMP}"))
                    .query_param("latitude", "40.7128")
                    .query_param("longitude", "-74.006");
                then.status(200).json_body(provider_body("America/New_York"));
            })
            .await;
        let workspace = TempWorkspace::new(&server.url("/v1"), Some((40.7128, -74.006)));
        let state = workspace.app_state();

        let response = start_impl(&state).await.expect("start");

        assert_eq!(response.status, "resolved");
        assert_eq!(response.location_name, "New York");
        assert_eq!(response.time_zone, "America/New_York");
    }

    #[tokio::test]
    async fn unknown_method_is_rejected() {
        let workspace = TempWorkspace::new("http://127.0.0.1:9/v1", None);
        let state = workspace.app_state();

        let result = switch_to_gps_impl(&state, Some(99), None, None).await;

        match result {
            Err(InfraError::InvalidConfig(message)) => assert!(message.contains("99")),
            other => panic!("expected invalid config, got {other:?}"),
        }
    }

    #[test]
    fn theme_and_calendar_commands_persist_without_resolving() {
        let workspace = TempWorkspace::new("http://127.0.0.1:9/v1", None);
        let state = workspace.app_state();

        assert_eq!(toggle_theme_impl(&state).expect("toggle"), "light");
        assert_eq!(set_theme_impl(&state, "dark".to_string()).expect("set"), "dark");
        assert!(set_theme_impl(&state, "sepia".to_string()).is_err());
        assert_eq!(set_calendar_adjustment_impl(&state, 1).expect("set"), 1);
        assert_eq!(adjust_calendar_impl(&state, -2).expect("adjust"), -1);

        let restarted = workspace.app_state();
        let dashboard = dashboard_impl(&restarted).expect("dashboard");
        assert_eq!(dashboard.theme, "dark");
        assert_eq!(dashboard.calendar_adjustment, -1);
        assert!(dashboard.calendar_date.is_some_and(|date| date.ends_with("AH")));
    }

    #[test]
    fn schools_list_marks_default_hanafi() {
        let workspace = TempWorkspace::new("http://127.0.0.1:9/v1", None);
        let state = workspace.app_state();

        let schools = list_schools_impl(&state).expect("schools");

        assert_eq!(schools.len(), 2);
        assert!(schools.iter().any(|school| school.id == 1 && school.selected));
        assert!(schools.iter().any(|school| school.id == 0 && !school.selected));
    }

    #[tokio::test]
    async fn city_mode_without_saved_city_is_skipped() {
        let workspace = TempWorkspace::new("http://127.0.0.1:9/v1", None);
        let state = workspace.app_state();

        let response = set_location_mode_impl(&state, "city".to_string())
            .await
            .expect("set mode");
        let refreshed = refresh_impl(&state).await.expect("refresh");
        let next = next_event_impl(&state).expect("next event");

        assert_eq!(response.status, "skipped");
        assert_eq!(refreshed.status, "skipped");
        assert_eq!(next.name, None);
        assert_eq!(next.display_time, "--:--");
    }
}
