use askama::Template;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};

use crate::extractors::MaybeSession;

/// Login and sign-up page.
#[derive(Template)]
#[template(path = "pages/index.html")]
pub struct IndexTemplate {
    pub error: Option<String>,
    pub email: String,
    pub sign_up: bool,
}

impl IndexTemplate {
    pub fn blank() -> Self {
        Self {
            error: None,
            email: String::new(),
            sign_up: false,
        }
    }
}

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

pub async fn index(session: MaybeSession) -> Response {
    // Already signed in: straight to the map
    if session.0.is_some() {
        return Redirect::to("/home").into_response();
    }

    Html(IndexTemplate::blank()).into_response()
}
