use crate::cli::Cli;
use crate::config::{Config, resolve_data_dir};
use agaudit_runtime::JobController;
use agaudit_sessions::FsSessionStore;
use agaudit_store::Store;
use agaudit_validator::ValidatorFactory;
use anyhow::{Context, Result};
use std::sync::Arc;

/// Process-wide singletons: the store handle factory, the session store and
/// the validator factory. Built once from configuration and shared
/// read-only.
pub struct App {
    pub store: Store,
    pub sessions: Arc<FsSessionStore>,
    pub validators: Arc<ValidatorFactory>,
}

impl App {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let data_dir = resolve_data_dir(cli.data_dir.as_deref())?;
        let config = Config::load(&data_dir)?;

        let sessions_root = cli
            .sessions_root
            .clone()
            .or(config.sessions_root)
            .unwrap_or_else(|| data_dir.join("sessions"));

        let store = Store::open(data_dir.join("agaudit.db"))
            .with_context(|| format!("Failed to open store in {}", data_dir.display()))?;

        Ok(App {
            store,
            sessions: Arc::new(FsSessionStore::new(sessions_root)),
            validators: Arc::new(ValidatorFactory::new()),
        })
    }

    pub fn controller(&self) -> JobController {
        JobController::new(
            self.store.clone(),
            self.sessions.clone(),
            self.validators.clone(),
        )
    }
}
