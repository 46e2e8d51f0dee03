//! Route handlers.

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tracing::info;

use quire_sandbox::BuildResult;
use quire_workspace::{Directory, ProjectId, TextFile};

use super::AppState;
use super::errors::ApiError;

const TARGET: &str = "quired::http";

/// Query string of the file read route.
#[derive(Debug, Default, Deserialize)]
pub struct FileQuery {
    /// Project-relative file path.
    #[serde(default)]
    pub path: String,
}

/// Body of the save route.
#[derive(Debug, Deserialize, Serialize)]
pub struct SaveRequest {
    /// Project-relative file path.
    pub path: String,
    /// File content, standard base64.
    pub data: String,
}

/// Body of the compile route.
#[derive(Debug, Deserialize, Serialize)]
pub struct CompileRequest {
    /// Document path relative to the project root.
    pub path: String,
}

/// Response of the project creation route.
#[derive(Debug, Deserialize, Serialize)]
pub struct NewProjectResponse {
    /// Identifier of the new project.
    pub id: ProjectId,
}

/// Response of the compile route.
#[derive(Debug, Deserialize, Serialize)]
pub struct CompileResponse {
    /// Artifact as standard base64; empty when none was produced.
    pub pdf: String,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// `produced`, `no_artifact` or `timed_out`.
    pub status: String,
    /// Exit code of the runtime client when it exited on its own.
    pub exit_code: Option<i32>,
}

impl From<BuildResult> for CompileResponse {
    fn from(result: BuildResult) -> Self {
        Self {
            pdf: result
                .artifact
                .as_deref()
                .map(|bytes| STANDARD.encode(bytes))
                .unwrap_or_default(),
            stdout: result.stdout,
            stderr: result.stderr,
            status: result.status.as_str().to_owned(),
            exit_code: result.exit_code,
        }
    }
}

fn project_id(raw: Result<Path<String>, PathRejection>) -> Result<ProjectId, ApiError> {
    let Path(raw) = raw?;
    ProjectId::parse(&raw).map_err(ApiError::from)
}

pub(super) async fn list(
    State(state): State<AppState>,
    raw_id: Result<Path<String>, PathRejection>,
) -> Result<Json<Directory>, ApiError> {
    let id = project_id(raw_id)?;
    Ok(Json(state.store().tree(&id).await?))
}

pub(super) async fn get_file(
    State(state): State<AppState>,
    raw_id: Result<Path<String>, PathRejection>,
    Query(query): Query<FileQuery>,
) -> Result<Json<TextFile>, ApiError> {
    let id = project_id(raw_id)?;
    Ok(Json(state.store().read_text(&id, &query.path).await?))
}

pub(super) async fn new_project(
    State(state): State<AppState>,
) -> Result<Json<NewProjectResponse>, ApiError> {
    let id = state.store().create_project().await?;
    Ok(Json(NewProjectResponse { id }))
}

pub(super) async fn save(
    State(state): State<AppState>,
    raw_id: Result<Path<String>, PathRejection>,
    body: Result<Json<SaveRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let id = project_id(raw_id)?;
    let Json(request) = body?;
    let data = STANDARD.decode(request.data.as_bytes())?;
    state.store().save(&id, &request.path, &data).await?;
    Ok(StatusCode::OK)
}

pub(super) async fn compile(
    State(state): State<AppState>,
    raw_id: Result<Path<String>, PathRejection>,
    body: Result<Json<CompileRequest>, JsonRejection>,
) -> Result<Json<CompileResponse>, ApiError> {
    let id = project_id(raw_id)?;
    let Json(request) = body?;
    let result = state
        .isolator()
        .compile_project(state.store(), &id, &request.path)
        .await?;
    info!(
        target: TARGET,
        project = %id,
        container = %result.container_name,
        status = result.status.as_str(),
        elapsed_ms = u64::try_from(result.elapsed.as_millis()).unwrap_or(u64::MAX),
        "compile request served"
    );
    Ok(Json(CompileResponse::from(result)))
}
