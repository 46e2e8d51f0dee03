//! HTTP surface of the daemon.
//!
//! Five JSON routes under `/api` expose the project store and the build
//! isolator to the editor UI. Every other path falls through to the static UI
//! directory when one is configured and present.

mod errors;
mod handlers;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::services::ServeDir;

use quire_config::Config;
use quire_sandbox::{BuildSettings, Isolator};
use quire_workspace::ProjectStore;

pub use self::errors::ApiError;
pub use self::handlers::{CompileRequest, CompileResponse, FileQuery, NewProjectResponse, SaveRequest};

/// State shared by every request handler.
#[derive(Debug, Clone)]
pub struct AppState {
    store: ProjectStore,
    isolator: Arc<Isolator>,
    ui_dir: Option<PathBuf>,
}

impl AppState {
    /// Assembles handler state from its collaborators.
    #[must_use]
    pub fn new(store: ProjectStore, isolator: Isolator, ui_dir: Option<PathBuf>) -> Self {
        Self {
            store,
            isolator: Arc::new(isolator),
            ui_dir,
        }
    }

    /// Builds handler state from the resolved configuration.
    ///
    /// The UI directory is only served when it exists at startup.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let store = ProjectStore::new(
            config.work_dir().as_std_path(),
            config.template_dir().as_std_path(),
        );
        let isolator = Isolator::new(BuildSettings::from(config));
        let ui_dir = Some(config.ui_dir().as_std_path().to_path_buf()).filter(|dir| dir.is_dir());
        Self::new(store, isolator, ui_dir)
    }

    /// Project store backing the file routes.
    #[must_use]
    pub const fn store(&self) -> &ProjectStore {
        &self.store
    }

    /// Static UI directory, when one is served.
    #[must_use]
    pub fn ui_dir(&self) -> Option<&Path> {
        self.ui_dir.as_deref()
    }

    /// Isolator backing the compile route.
    #[must_use]
    pub fn isolator(&self) -> &Isolator {
        &self.isolator
    }
}

/// Builds the daemon's router.
#[must_use]
pub fn router(state: AppState) -> Router {
    let ui_dir = state.ui_dir.clone();
    let api = Router::new()
        .route("/api/new-project", post(handlers::new_project))
        .route("/api/{id}/list", get(handlers::list))
        .route("/api/{id}/get", get(handlers::get_file))
        .route("/api/{id}/save", post(handlers::save))
        .route("/api/{id}/compile", post(handlers::compile))
        .with_state(state);

    match ui_dir {
        Some(dir) => api.fallback_service(ServeDir::new(dir)),
        None => api,
    }
}
