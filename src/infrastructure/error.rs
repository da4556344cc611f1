use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

/// Why a single timing resolution attempt failed. None of these are retried
/// automatically; the user refreshes or changes location instead.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("{0}")]
    LocationUnavailable(String),
    #[error("{0}")]
    NetworkError(String),
    #[error("{message}")]
    ProviderRejected { code: u16, message: String },
}

impl ResolutionError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LocationUnavailable(_) => "location_unavailable",
            Self::NetworkError(_) => "network_error",
            Self::ProviderRejected { .. } => "provider_rejected",
        }
    }
}
