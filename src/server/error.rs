//! HTTP mapping for core errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;

use crate::error::{ErrorKind, IfsError};

#[derive(Debug)]
pub enum ApiError {
    /// An error raised by the core.
    Core(IfsError),
    SessionNotFound(Uuid),
    /// A route segment that names nothing, e.g. an unknown workflow step.
    UnknownRoute(String),
    /// A request body that is present but does not parse.
    InvalidBody(String),
}

impl From<IfsError> for ApiError {
    fn from(e: IfsError) -> Self {
        ApiError::Core(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Core(e) => match e.kind() {
                ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::IllegalStateTransition
                | ErrorKind::PreconditionFailed
                | ErrorKind::PipelineAlreadyComplete => StatusCode::CONFLICT,
            },
            ApiError::SessionNotFound(_) | ApiError::UnknownRoute(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidBody(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Core(e) => serde_json::json!({
                "error": e.to_string(),
                "kind": e.kind(),
            }),
            ApiError::SessionNotFound(id) => serde_json::json!({
                "error": format!("Session not found: {}", id),
                "kind": ErrorKind::NotFound,
            }),
            ApiError::UnknownRoute(what) => serde_json::json!({
                "error": what,
                "kind": ErrorKind::NotFound,
            }),
            ApiError::InvalidBody(why) => serde_json::json!({
                "error": format!("Invalid request body: {}", why),
                "kind": ErrorKind::Validation,
            }),
        };
        if status == StatusCode::CONFLICT {
            log::warn!("Rejected call: {}", body["error"]);
        }
        (status, Json(body)).into_response()
    }
}
