//! Application state shared by the CLI commands.
//!
//! [`AppState`] wires the store, the REST client, the connectivity monitor
//! and the event bus together once, so each command only borrows what it
//! needs.

use std::sync::{Arc, Mutex};

use parley_store::Database;

use crate::api::{ChatApi, HttpApi};
use crate::auth::AuthService;
use crate::config::ClientConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::error::{ClientError, Result};
use crate::events::EventBus;
use crate::sync::SyncEngine;

/// The store handle, shared between services and background tasks.
pub type SharedDatabase = Arc<Mutex<Database>>;

/// Run `f` with the database locked. The guard never outlives the call.
pub fn with_db<T, F>(db: &SharedDatabase, f: F) -> Result<T>
where
    F: FnOnce(&mut Database) -> parley_store::Result<T>,
{
    let mut guard = db.lock().map_err(|_| ClientError::LockPoisoned)?;
    Ok(f(&mut guard)?)
}

pub struct AppState {
    pub config: ClientConfig,
    pub db: SharedDatabase,
    pub api: Arc<dyn ChatApi>,
    pub sync: Arc<SyncEngine>,
    pub auth: AuthService,
}

impl AppState {
    /// Open the store, build the HTTP client and restore a saved session.
    pub fn open(config: ClientConfig) -> Result<Self> {
        let database = match &config.db_path {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).map_err(parley_store::StoreError::from)?;
                }
                tracing::info!(path = %path.display(), "opening database");
                Database::open_at(path)?
            }
            None => Database::new()?,
        };
        let db: SharedDatabase = Arc::new(Mutex::new(database));

        let api: Arc<dyn ChatApi> =
            Arc::new(HttpApi::new(config.api_url.clone(), config.request_timeout)?);

        Self::with_parts(config, db, api)
    }

    /// Assemble the services around an existing store and API.
    pub fn with_parts(
        config: ClientConfig,
        db: SharedDatabase,
        api: Arc<dyn ChatApi>,
    ) -> Result<Self> {
        let sync = Arc::new(SyncEngine::new(
            db.clone(),
            api.clone(),
            ConnectivityMonitor::new(false),
            EventBus::new(),
        ));
        let auth = AuthService::new(db.clone(), api.clone());
        auth.restore_session()?;

        Ok(Self {
            config,
            db,
            api,
            sync,
            auth,
        })
    }

    /// Probe the backend once and record the result.
    pub async fn probe_now(&self) -> bool {
        let online = self.api.probe().await.is_ok();
        self.sync.connectivity().set_online(online);
        online
    }
}
