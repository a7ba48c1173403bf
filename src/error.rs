use axum::http::{header, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Json, Redirect, Response};
use serde_json::json;

use crate::backend::BackendError;
use crate::extractors::clear_session_cookies;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found")]
    NotFound,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

impl AppError {
    /// The session is gone, either locally or according to the backend.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            AppError::Unauthorized | AppError::Backend(BackendError::Unauthorized)
        )
    }

    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
            AppError::Unauthorized | AppError::Backend(BackendError::Unauthorized) => {
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Backend(e) => {
                tracing::error!("Backend error: {}", e);
                (
                    StatusCode::BAD_GATEWAY,
                    "The server could not complete the request. Please try again.".to_string(),
                )
            }
            AppError::Template(e) => {
                tracing::error!("Template render error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        }
    }
}

/// Page routes: an expired session goes back to the login page.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_unauthorized() {
            tracing::info!("Session rejected, returning to login");
            return (
                AppendHeaders(clear_session_cookies().map(|c| (header::SET_COOKIE, c))),
                Redirect::to("/"),
            )
                .into_response();
        }

        let (status, message) = self.status_and_message();
        (status, message).into_response()
    }
}

/// JSON API flavor of [`AppError`]: same mapping, JSON body, 401 instead of a redirect.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl<E: Into<AppError>> From<E> for ApiError {
    fn from(e: E) -> Self {
        ApiError(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.0.status_and_message();
        let body = Json(json!({ "error": message }));

        if self.0.is_unauthorized() {
            return (
                status,
                AppendHeaders(clear_session_cookies().map(|c| (header::SET_COOKIE, c))),
                body,
            )
                .into_response();
        }
        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
pub type ApiResult<T> = Result<T, ApiError>;
