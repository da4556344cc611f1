use crate::infrastructure::config::{AppConfig, ensure_default_configs, load_app_config};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::initialize_database;
use std::fs;
use std::path::{Path, PathBuf};

pub const DATABASE_FILE_NAME: &str = "alrua.sqlite";

#[derive(Debug)]
pub struct BootstrapResult {
    pub workspace_root: PathBuf,
    pub database_path: PathBuf,
    pub config: AppConfig,
}

/// Creates `config/` and `state/` under `workspace_root`, writes a default
/// `app.json` when missing and initializes the preference database. Logs go
/// to stderr through the subscriber installed by the binary.
pub fn bootstrap_workspace(workspace_root: &Path) -> Result<BootstrapResult, InfraError> {
    let config_dir = workspace_root.join("config");
    let state_dir = workspace_root.join("state");
    let database_path = state_dir.join(DATABASE_FILE_NAME);

    fs::create_dir_all(&config_dir)?;
    fs::create_dir_all(&state_dir)?;

    ensure_default_configs(&config_dir)?;
    let config = load_app_config(&config_dir)?.with_env_overrides()?;
    initialize_database(&database_path)?;

    tracing::debug!(
        workspace = %workspace_root.display(),
        provider = %config.provider_base_url,
        "workspace bootstrapped"
    );

    Ok(BootstrapResult {
        workspace_root: workspace_root.to_path_buf(),
        database_path,
        config,
    })
}
