pub mod api;
pub mod assets;
pub mod auth;
pub mod home;
pub mod map;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// The full application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(home::index))
        .route("/home", get(map::page))
        .route("/assets/{*path}", get(assets::serve))
        .merge(auth::router())
        .merge(api::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
