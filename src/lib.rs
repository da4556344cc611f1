pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::commands::{
    AppState, DashboardResponse, MethodResponse, NextEventResponse, ResolutionResponse,
    SchoolResponse, TimingRow,
};
pub use application::preference_engine::{PreferenceEngine, ResolutionOutcome};
pub use application::timing_resolver::{ResolvedTimings, TimingResolver};
pub use domain::clock::{add_minutes, calendar_date, format_clock};
pub use domain::models::{CalculationMethod, JurisprudenceSchool, LocationMode, Preferences, TimingSet};
pub use infrastructure::error::{InfraError, ResolutionError};
