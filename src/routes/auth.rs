use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use axum::routing::post;
use axum::{Form, Router};
use serde::Deserialize;

use crate::backend::{BackendError, SessionTokens};
use crate::extractors::{clear_session_cookies, session_cookies, MaybeSession};
use crate::routes::home::{Html, IndexTemplate};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CredentialsForm {
    pub email: String,
    pub password: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/sign-up", post(sign_up))
        .route("/auth/logout", post(logout))
}

/// POST /auth/login
async fn login(State(state): State<AppState>, Form(form): Form<CredentialsForm>) -> Response {
    if let Some(page) = missing_fields(&form, false) {
        return page;
    }
    let result = state.backend.login(form.email.trim(), &form.password).await;
    finish(&state, form, result, false)
}

/// POST /auth/sign-up
async fn sign_up(State(state): State<AppState>, Form(form): Form<CredentialsForm>) -> Response {
    if let Some(page) = missing_fields(&form, true) {
        return page;
    }
    let result = state.backend.sign_up(form.email.trim(), &form.password).await;
    finish(&state, form, result, true)
}

/// POST /auth/logout: Drop the view and the cookies
async fn logout(State(state): State<AppState>, session: MaybeSession) -> Response {
    if let Some(session) = session.0 {
        state.views.remove(session.user_id()).await;
        tracing::info!(user_id = %session.user_id(), "Signed out");
    }

    (
        AppendHeaders(clear_session_cookies().map(|c| (header::SET_COOKIE, c))),
        Redirect::to("/"),
    )
        .into_response()
}

fn missing_fields(form: &CredentialsForm, sign_up: bool) -> Option<Response> {
    if !form.email.trim().is_empty() && !form.password.is_empty() {
        return None;
    }
    Some(form_error(
        StatusCode::BAD_REQUEST,
        "Email and password are required.",
        &form.email,
        sign_up,
    ))
}

fn finish(
    state: &AppState,
    form: CredentialsForm,
    result: Result<SessionTokens, BackendError>,
    sign_up: bool,
) -> Response {
    match result {
        Ok(tokens) => {
            tracing::info!(user_id = %tokens.user_id, sign_up, "Signed in");
            let cookies = session_cookies(&tokens, &state.config.auth);
            (
                AppendHeaders(cookies.map(|c| (header::SET_COOKIE, c))),
                Redirect::to("/home"),
            )
                .into_response()
        }
        Err(BackendError::Unauthorized) => form_error(
            StatusCode::UNAUTHORIZED,
            if sign_up {
                "Sign-up was rejected."
            } else {
                "Incorrect email or password."
            },
            &form.email,
            sign_up,
        ),
        Err(e) => {
            tracing::error!("Authentication request failed: {}", e);
            form_error(
                StatusCode::BAD_GATEWAY,
                "Could not reach the server. Please try again.",
                &form.email,
                sign_up,
            )
        }
    }
}

fn form_error(status: StatusCode, message: &str, email: &str, sign_up: bool) -> Response {
    let page = IndexTemplate {
        error: Some(message.to_string()),
        email: email.trim().to_string(),
        sign_up,
    };
    (status, Html(page)).into_response()
}
