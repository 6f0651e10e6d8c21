use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::repository::RepoError;

/// ApiError
///
/// The error surface of every JSON handler. Each variant carries the exact
/// client-facing Spanish message; `IntoResponse` picks the status and body
/// shape so handlers only ever `?` their way out.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or malformed input. Body: `{ "error": <message> }`.
    #[error("{0}")]
    Validation(String),

    /// Unique-violation on `usuarios.correo`.
    #[error("El correo ya está registrado")]
    DuplicateEmail,

    /// An admin tried to change their own role.
    #[error("No puedes cambiar tu propio rol")]
    SelfRoleChangeForbidden,

    /// An admin tried to delete their own account.
    #[error("No puedes eliminar tu propio usuario")]
    SelfDeletionForbidden,

    /// Role gate failure on admin-only surface. Plain-text body.
    #[error("Acceso denegado")]
    AccessDenied,

    /// Role-specific rule violation (e.g. assistants setting MANTENIMIENTO).
    /// JSON body, unlike `AccessDenied`.
    #[error("{0}")]
    Forbidden(String),

    /// Target row does not exist. Body: `{ "error": <message> }`.
    #[error("{0}")]
    NotFound(String),

    /// Persistence failure. Duplicate-key errors are remapped to
    /// `DuplicateEmail` before reaching the response; everything else
    /// surfaces as a 500 with the driver detail in `details`.
    #[error(transparent)]
    Repository(#[from] RepoError),

    /// Password hashing or verification failed.
    #[error("Error al procesar la contraseña")]
    PasswordHash,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::DuplicateEmail => StatusCode::BAD_REQUEST,
            ApiError::SelfRoleChangeForbidden | ApiError::SelfDeletionForbidden => {
                StatusCode::BAD_REQUEST
            }
            ApiError::AccessDenied | ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Repository(RepoError::Duplicate) => StatusCode::BAD_REQUEST,
            ApiError::Repository(RepoError::Database(_)) | ApiError::PasswordHash => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }

        match self {
            // The admin gate answers in plain text, matching the page-level
            // denial the frontend expects.
            ApiError::AccessDenied => (status, self.to_string()).into_response(),
            ApiError::Repository(RepoError::Duplicate) => (
                status,
                Json(json!({ "error": "El correo ya está registrado" })),
            )
                .into_response(),
            ApiError::Repository(RepoError::Database(err)) => (
                status,
                Json(json!({
                    "error": "Error en la base de datos",
                    "details": err.to_string(),
                })),
            )
                .into_response(),
            other => (status, Json(json!({ "error": other.to_string() }))).into_response(),
        }
    }
}
