use crate::application::timing_resolver::{NowProvider, ResolvedTimings, TimingResolver};
use crate::domain::models::{
    GeoCoordinates, LocationMode, LocationQuery, Preferences, ResolutionSettings,
    ResolvedLocationState, SavedCity, Theme,
};
use crate::domain::next_event::{NextEvent, next_event};
use crate::infrastructure::error::{InfraError, ResolutionError};
use crate::infrastructure::location_service::LocationService;
use crate::infrastructure::preference_store::PreferenceStore;
use crate::infrastructure::timing_provider_client::TimingProviderClient;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

pub const LOCATING_PLACEHOLDER: &str = "Locating...";

#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionOutcome {
    Resolved(ResolvedLocationState),
    Failed(ResolutionError),
    /// A newer resolution was issued while this one was in flight.
    Superseded,
    /// Nothing to resolve (CITY mode without a saved city, or a repeated
    /// startup).
    Skipped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSnapshot {
    pub preferences: Preferences,
    pub resolved: ResolvedLocationState,
    pub last_error: Option<ResolutionError>,
    pub in_flight: bool,
}

impl EngineSnapshot {
    /// Next event for the timings and zone captured in this snapshot.
    pub fn next_event(&self, now: DateTime<Utc>) -> Option<NextEvent> {
        next_event(self.resolved.timing_set.as_ref(), &self.resolved.time_zone, now)
    }
}

#[derive(Debug)]
struct EngineState {
    preferences: Preferences,
    resolved: ResolvedLocationState,
    last_error: Option<ResolutionError>,
    latest_request: u64,
    in_flight: bool,
}

enum Target {
    Gps,
    City(SavedCity),
}

/// Owns the user's preferences and the last resolved timings.
///
/// Every mutation goes through the state mutex, which is never held across an
/// await or a preference save. Preference writers queue on a separate save
/// lock, so readers on the tick path never wait for storage. Resolutions are tagged with a sequence number taken when they are
/// issued; a result whose sequence is no longer the latest is dropped, so the
/// timing set, time zone and display name always come from the same response.
pub struct PreferenceEngine<C, L, S>
where
    C: TimingProviderClient,
    L: LocationService,
    S: PreferenceStore,
{
    resolver: TimingResolver<C>,
    location_service: Arc<L>,
    preference_store: Arc<S>,
    state: Mutex<EngineState>,
    save_lock: Mutex<()>,
    started: AtomicBool,
    now_provider: NowProvider,
}

impl<C, L, S> PreferenceEngine<C, L, S>
where
    C: TimingProviderClient,
    L: LocationService,
    S: PreferenceStore,
{
    pub fn new(
        resolver: TimingResolver<C>,
        location_service: Arc<L>,
        preference_store: Arc<S>,
    ) -> Result<Self, InfraError> {
        let preferences = preference_store.load()?;
        let resolved = ResolvedLocationState {
            timing_set: None,
            time_zone: String::new(),
            display_name: LOCATING_PLACEHOLDER.to_string(),
            mode: preferences.location_mode,
        };
        Ok(Self {
            resolver,
            location_service,
            preference_store,
            state: Mutex::new(EngineState {
                preferences,
                resolved,
                last_error: None,
                latest_request: 0,
                in_flight: false,
            }),
            save_lock: Mutex::new(()),
            started: AtomicBool::new(false),
            now_provider: Arc::new(Utc::now),
        })
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    /// Initial resolution. Runs once per engine; later calls are skipped.
    pub async fn start(&self) -> Result<ResolutionOutcome, InfraError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(ResolutionOutcome::Skipped);
        }

        let preferences = self.lock_state()?.preferences.clone();
        let target = match (preferences.location_mode, &preferences.saved_city) {
            (LocationMode::City, Some(city)) => Target::City(city.clone()),
            _ => Target::Gps,
        };
        let mode = target_mode(&target);
        let issue = |state: &mut EngineState| {
            (begin_request(state, mode), state.preferences.settings())
        };
        let (sequence, settings) = if mode != preferences.location_mode {
            self.commit(|preferences| preferences.location_mode = mode, issue)?
        } else {
            issue(&mut *self.lock_state()?)
        };

        tracing::info!(sequence, mode = mode.as_str(), "startup resolution");
        self.run(sequence, target, settings).await
    }

    pub async fn switch_to_gps(
        &self,
        settings: ResolutionSettings,
    ) -> Result<ResolutionOutcome, InfraError> {
        let sequence = self.commit(
            |preferences| {
                preferences.location_mode = LocationMode::Gps;
                preferences.apply_settings(settings);
            },
            |state| begin_request(state, LocationMode::Gps),
        )?;

        tracing::info!(sequence, method = settings.method.id(), "switching to gps");
        self.run(sequence, Target::Gps, settings).await
    }

    pub async fn switch_to_city(
        &self,
        city: &str,
        country: &str,
        settings: ResolutionSettings,
    ) -> Result<ResolutionOutcome, InfraError> {
        let saved_city = SavedCity::new(city, country);
        saved_city.validate().map_err(InfraError::InvalidConfig)?;

        let sequence = self.commit(
            |preferences| {
                preferences.location_mode = LocationMode::City;
                preferences.saved_city = Some(saved_city.clone());
                preferences.apply_settings(settings);
            },
            |state| begin_request(state, LocationMode::City),
        )?;

        tracing::info!(
            sequence,
            city = %saved_city.label(),
            method = settings.method.id(),
            "switching to city"
        );
        self.run(sequence, Target::City(saved_city), settings).await
    }

    /// Re-resolves the current mode without touching stored preferences.
    pub async fn refresh(&self) -> Result<ResolutionOutcome, InfraError> {
        let (sequence, target, settings) = {
            let mut state = self.lock_state()?;
            let Some(target) = current_target(&state.preferences) else {
                tracing::debug!("refresh skipped: city mode without a saved city");
                return Ok(ResolutionOutcome::Skipped);
            };
            let settings = state.preferences.settings();
            let sequence = begin_request(&mut state, target_mode(&target));
            (sequence, target, settings)
        };

        tracing::info!(sequence, mode = target_mode(&target).as_str(), "refreshing timings");
        self.run(sequence, target, settings).await
    }

    /// Persists `mode`, drops the current timings and resolves again.
    pub async fn set_location_mode(
        &self,
        mode: LocationMode,
    ) -> Result<ResolutionOutcome, InfraError> {
        let issued = self.commit(
            |preferences| preferences.location_mode = mode,
            |state| {
                let Some(target) = current_target(&state.preferences) else {
                    // Bump the sequence so a response still in flight for the
                    // previous mode cannot repopulate the timings.
                    state.latest_request += 1;
                    state.in_flight = false;
                    state.last_error = None;
                    state.resolved = ResolvedLocationState {
                        timing_set: None,
                        time_zone: String::new(),
                        display_name: String::new(),
                        mode,
                    };
                    return None;
                };
                Some((begin_request(state, mode), target, state.preferences.settings()))
            },
        )?;
        let Some((sequence, target, settings)) = issued else {
            return Ok(ResolutionOutcome::Skipped);
        };

        tracing::info!(sequence, mode = mode.as_str(), "location mode changed");
        self.run(sequence, target, settings).await
    }

    pub fn set_theme(&self, theme: Theme) -> Result<Theme, InfraError> {
        self.commit(
            |preferences| preferences.theme = theme,
            |state| state.preferences.theme,
        )
    }

    pub fn toggle_theme(&self) -> Result<Theme, InfraError> {
        self.commit(
            |preferences| preferences.theme = preferences.theme.toggled(),
            |state| state.preferences.theme,
        )
    }

    /// Only the lunar date depends on the adjustment, so no resolution runs.
    pub fn set_calendar_adjustment(&self, days: i32) -> Result<i32, InfraError> {
        self.commit(
            |preferences| preferences.calendar_adjustment = days,
            |state| state.preferences.calendar_adjustment,
        )
    }

    pub fn adjust_calendar(&self, delta: i32) -> Result<i32, InfraError> {
        self.commit(
            |preferences| {
                preferences.calendar_adjustment =
                    preferences.calendar_adjustment.saturating_add(delta);
            },
            |state| state.preferences.calendar_adjustment,
        )
    }

    pub fn snapshot(&self) -> Result<EngineSnapshot, InfraError> {
        let state = self.lock_state()?;
        Ok(EngineSnapshot {
            preferences: state.preferences.clone(),
            resolved: state.resolved.clone(),
            last_error: state.last_error.clone(),
            in_flight: state.in_flight,
        })
    }

    /// Pure derivation from the resolved state; safe to call on every tick.
    /// Callers that also render a snapshot should use
    /// [`EngineSnapshot::next_event`] so both come from the same state.
    pub fn next_event(&self, now: DateTime<Utc>) -> Result<Option<NextEvent>, InfraError> {
        let state = self.lock_state()?;
        Ok(next_event(
            state.resolved.timing_set.as_ref(),
            &state.resolved.time_zone,
            now,
        ))
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.now_provider)()
    }

    async fn run(
        &self,
        sequence: u64,
        target: Target,
        settings: ResolutionSettings,
    ) -> Result<ResolutionOutcome, InfraError> {
        let query = match target {
            Target::City(city) => LocationQuery::City(city),
            Target::Gps => match self.location_service.current_position().await {
                Ok(position) => {
                    self.show_coordinates(sequence, position)?;
                    LocationQuery::Coordinates(position)
                }
                Err(error) => return self.finish(sequence, Err(error)),
            },
        };

        let result = self
            .resolver
            .resolve(&query, settings.method, settings.school)
            .await;
        self.finish(sequence, result)
    }

    fn show_coordinates(&self, sequence: u64, position: GeoCoordinates) -> Result<(), InfraError> {
        let mut state = self.lock_state()?;
        if state.latest_request == sequence {
            state.resolved.display_name = position.label();
        }
        Ok(())
    }

    fn finish(
        &self,
        sequence: u64,
        result: Result<ResolvedTimings, ResolutionError>,
    ) -> Result<ResolutionOutcome, InfraError> {
        let mut state = self.lock_state()?;
        if state.latest_request != sequence {
            tracing::debug!(
                sequence,
                latest = state.latest_request,
                "discarding stale resolution"
            );
            return Ok(ResolutionOutcome::Superseded);
        }

        state.in_flight = false;
        match result {
            Ok(resolved) => {
                let mode = state.resolved.mode;
                state.resolved = ResolvedLocationState {
                    timing_set: Some(resolved.timings),
                    time_zone: resolved.time_zone,
                    display_name: resolved.location_label,
                    mode,
                };
                state.last_error = None;
                tracing::info!(
                    sequence,
                    time_zone = %state.resolved.time_zone,
                    location = %state.resolved.display_name,
                    "timings resolved"
                );
                Ok(ResolutionOutcome::Resolved(state.resolved.clone()))
            }
            Err(error) => {
                state.resolved.timing_set = None;
                state.last_error = Some(error.clone());
                tracing::warn!(sequence, kind = error.kind(), %error, "timing resolution failed");
                Ok(ResolutionOutcome::Failed(error))
            }
        }
    }

    /// Saves `edit` applied to the current preferences, then installs them and
    /// runs `apply` under one state lock. The save runs without the state lock;
    /// the save lock keeps concurrent writers from losing each other's edits.
    fn commit<R>(
        &self,
        edit: impl FnOnce(&mut Preferences),
        apply: impl FnOnce(&mut EngineState) -> R,
    ) -> Result<R, InfraError> {
        let _writer = self.save_lock.lock().map_err(|error| {
            InfraError::InvalidConfig(format!("preference save lock poisoned: {error}"))
        })?;

        let mut preferences = self.lock_state()?.preferences.clone();
        edit(&mut preferences);
        self.preference_store.save(&preferences)?;

        let mut state = self.lock_state()?;
        state.preferences = preferences;
        Ok(apply(&mut state))
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, EngineState>, InfraError> {
        self.state
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("engine state lock poisoned: {error}")))
    }
}

fn begin_request(state: &mut EngineState, mode: LocationMode) -> u64 {
    state.latest_request += 1;
    state.in_flight = true;
    state.last_error = None;
    state.resolved = ResolvedLocationState {
        timing_set: None,
        time_zone: String::new(),
        display_name: LOCATING_PLACEHOLDER.to_string(),
        mode,
    };
    state.latest_request
}

fn current_target(preferences: &Preferences) -> Option<Target> {
    match preferences.location_mode {
        LocationMode::Gps => Some(Target::Gps),
        LocationMode::City => preferences.saved_city.clone().map(Target::City),
    }
}

fn target_mode(target: &Target) -> LocationMode {
    match target {
        Target::Gps => LocationMode::Gps,
        Target::City(_) => LocationMode::City,
    }
}
