use askama::Template;
use axum::extract::State;
use axum::response::IntoResponse;

use crate::backend::BackendError;
use crate::error::{AppError, AppResult};
use crate::extractors::Session;
use crate::routes::home::Html;
use crate::state::AppState;
use crate::view::{HomeView, SharedView};

#[derive(Template)]
#[template(path = "pages/home.html")]
struct HomeTemplate {
    user_label: String,
    token_balance: i64,
    tile_url: String,
    zoom: f64,
    center_lat: f64,
    center_lng: f64,
    geolocation_timeout_ms: u64,
    geolocation_maximum_age_ms: u64,
    post_count: usize,
}

/// GET /home: The map page. Always starts a fresh view for the session.
pub async fn page(State(state): State<AppState>, session: Session) -> AppResult<impl IntoResponse> {
    let shared = load_view(&state, &session).await?;
    let view = shared.lock().await;

    let center = view.location().point;
    let options = view.geolocator().options();
    let template = HomeTemplate {
        user_label: view.user().label().to_string(),
        token_balance: view.user().token_balance,
        tile_url: state.config.map.tile_url.clone(),
        zoom: state.config.map.zoom,
        center_lat: center.lat,
        center_lng: center.lng,
        geolocation_timeout_ms: options.timeout_ms,
        geolocation_maximum_age_ms: options.maximum_age_ms,
        post_count: view.feed().len(),
    };
    Ok(Html(template))
}

/// Fetch the profile and posts and install a new view for this session.
pub async fn load_view(state: &AppState, session: &Session) -> AppResult<SharedView> {
    let user = state.backend.profile(session.tokens()).await?;

    let posts = match state.backend.posts(session.tokens()).await {
        Ok(posts) => posts,
        Err(BackendError::Unauthorized) => return Err(AppError::Unauthorized),
        Err(e) => {
            tracing::warn!(
                fallback = state.fallback_posts.len(),
                "Could not fetch posts, showing fixtures: {}",
                e
            );
            state.fallback_posts.as_ref().clone()
        }
    };

    tracing::info!(user_id = %user.id, posts = posts.len(), "Map view loaded");
    let view = HomeView::shared(user, posts, state.view_settings());
    Ok(state.views.replace(session.user_id(), view).await)
}

/// The session's current view, loading one if the server has none (e.g. after a restart).
pub async fn current_view(state: &AppState, session: &Session) -> AppResult<SharedView> {
    match state.views.get(session.user_id()).await {
        Some(view) => Ok(view),
        None => load_view(state, session).await,
    }
}
