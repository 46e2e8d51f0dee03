//! Mapping of domain errors onto HTTP responses.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, warn};

use quire_sandbox::BuildError;
use quire_workspace::WorkspaceError;

const TARGET: &str = "quired::http";

/// Errors returned by request handlers. Bodies are plain text.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A workspace operation failed.
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    /// A build failed before producing a result.
    #[error(transparent)]
    Build(#[from] BuildError),

    /// The uploaded file content was not valid base64.
    #[error("invalid base64 data: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    /// The request body was not the expected JSON.
    #[error(transparent)]
    MalformedBody(#[from] JsonRejection),

    /// A path parameter could not be extracted.
    #[error(transparent)]
    MalformedPath(#[from] PathRejection),
}

impl ApiError {
    /// HTTP status code for the error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Workspace(inner) => workspace_status(inner),
            Self::Build(inner) => build_status(inner),
            Self::InvalidBase64(_) => StatusCode::BAD_REQUEST,
            Self::MalformedBody(rejection) => rejection.status(),
            Self::MalformedPath(rejection) => rejection.status(),
        }
    }
}

const fn workspace_status(error: &WorkspaceError) -> StatusCode {
    if error.is_validation() {
        StatusCode::BAD_REQUEST
    } else if error.is_not_found() {
        StatusCode::NOT_FOUND
    } else if matches!(error, WorkspaceError::NotText { .. }) {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

const fn build_status(error: &BuildError) -> StatusCode {
    match error {
        BuildError::InvalidTarget { .. } => StatusCode::BAD_REQUEST,
        BuildError::Workspace(inner) => workspace_status(inner),
        _ if error.is_runtime_unavailable() => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(target: TARGET, status = status.as_u16(), error = %self, "request failed");
        } else {
            warn!(target: TARGET, status = status.as_u16(), error = %self, "request rejected");
        }
        (status, self.to_string()).into_response()
    }
}
