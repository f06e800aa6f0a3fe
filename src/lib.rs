pub mod accounts;
pub mod api;
pub mod authorization;
pub mod config;
pub mod core_state;
pub mod crypto;
pub mod db;
pub mod error;
pub mod models;
pub mod nurse_tasks;
pub mod patients;
pub mod records;
pub mod scheduling;
pub mod validation;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;
use crate::core_state::{CoreError, CoreState};

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Storage(#[from] CoreError),
    #[error("Cannot create bootstrap administrator: {0}")]
    Bootstrap(#[from] error::ServiceError),
    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Read configuration from the environment, prepare the database and serve
/// the API until Ctrl-C.
pub async fn run() -> Result<(), StartupError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = ServerConfig::from_env()?;
    let core = Arc::new(CoreState::from_config(&config));
    core.prepare_storage()?;
    tracing::info!(database = %core.db_path().display(), "database ready");

    if let Some(admin) = &config.bootstrap_admin {
        let conn = core.open_db()?;
        accounts::ensure_bootstrap_admin(&conn, admin, core.now())?;
    }

    api::serve_until_ctrl_c(core, config.bind_addr, config.cors_origin.as_deref()).await?;
    Ok(())
}
