// JSON and fragment endpoints driven by the map page script.
use askama::Template;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::dto::Reaction;
use crate::backend::BackendError;
use crate::domain::news::filter_news;
use crate::domain::reward::{parse_ratio_input, parse_reward_input};
use crate::domain::{split_reward, CommentId, FeedSort, NewsItem, Post, PostDraft, PostId, RewardSplit, Tag};
use crate::error::{ApiResult, AppError};
use crate::extractors::{ApiSession, Session};
use crate::map::geolocation::{LocationReport, ResolvedLocation};
use crate::map::interaction::PointerWatch;
use crate::map::viewport::CameraMove;
use crate::map::{LatLng, ScreenPoint, Viewport};
use crate::routes::home::Html;
use crate::routes::map::current_view;
use crate::state::AppState;
use crate::view::{PostModeChange, SharedView, ViewSnapshot};

const MAX_ZOOM: f64 = 22.0;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/view", get(view_snapshot))
        .route("/api/camera", post(camera_moved))
        .route("/api/location", post(location))
        .route("/api/posts", get(list_posts).post(create_post))
        .route("/api/comments", post(create_comment))
        .route("/api/reactions/post/{id}", post(react_to_post))
        .route("/api/reactions/comment/{id}", post(react_to_comment))
        .route("/api/markers/{id}/enter", post(marker_enter))
        .route("/api/pointer", post(pointer))
        .route("/api/markers/{id}/click", post(marker_click))
        .route("/api/detail/close", post(detail_close))
        .route("/api/map/click", post(map_click))
        .route("/api/post-mode", post(post_mode))
        .route("/api/post-modal/close", post(post_modal_close))
        .route("/api/navigation/toggle", post(navigation_toggle))
        .route("/api/news/toggle", post(news_toggle))
        .route("/api/news", get(news_search))
        .route("/api/reward/split", get(reward_split))
}

// -- Fragments --

#[derive(Template)]
#[template(path = "components/hover_popup.html")]
struct HoverPopupTemplate<'a> {
    post: &'a Post,
    style: String,
}

#[derive(Template)]
#[template(path = "components/post_detail.html")]
struct PostDetailTemplate<'a> {
    post: &'a Post,
    main_tags: Vec<&'a Tag>,
    sub_tags: Vec<&'a Tag>,
}

impl<'a> PostDetailTemplate<'a> {
    fn new(post: &'a Post) -> Self {
        let (main_tags, sub_tags) = post.partition_tags();
        Self {
            post,
            main_tags,
            sub_tags,
        }
    }
}

#[derive(Template)]
#[template(path = "components/news_list.html")]
struct NewsListTemplate<'a> {
    items: Vec<&'a NewsItem>,
    query: &'a str,
}

// -- Request and response bodies --

#[derive(Deserialize)]
struct CameraBody {
    center: LatLng,
    zoom: f64,
}

#[derive(Serialize)]
struct LocationResponse {
    location: ResolvedLocation,
    /// False while a detail view owns the camera.
    recenter: bool,
    news_count: usize,
    /// The refreshed list when the news drawer is open.
    news_html: Option<String>,
}

#[derive(Deserialize)]
struct FeedQuery {
    q: Option<String>,
    #[serde(default)]
    sort: FeedSort,
    /// Refetch from the backend before answering.
    #[serde(default)]
    refresh: bool,
}

#[derive(Deserialize)]
struct TagInput {
    name: String,
    #[serde(default)]
    is_main: bool,
}

#[derive(Deserialize)]
struct CreatePostRequest {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    icon_url: String,
    image_url: Option<String>,
    #[serde(default)]
    tags: Vec<TagInput>,
    /// Raw form text; non-numeric or negative counts as 0.
    #[serde(default)]
    reward: String,
    #[serde(default)]
    ratio: String,
    deadline: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct CreateCommentRequest {
    post_id: String,
    body: String,
}

#[derive(Deserialize)]
struct MarkerEvent {
    marker: ScreenPoint,
    viewport: Viewport,
}

#[derive(Deserialize)]
struct PointerBody {
    over_marker: Option<String>,
    #[serde(default)]
    over_popup: bool,
}

#[derive(Deserialize)]
struct ClickBody {
    viewport: Option<Viewport>,
}

#[derive(Serialize)]
struct DetailResponse {
    opened: bool,
    camera: Option<CameraMove>,
    html: Option<String>,
}

#[derive(Serialize)]
struct CameraResponse {
    camera: Option<CameraMove>,
}

#[derive(Serialize)]
struct MapClickResponse {
    accepted: bool,
    clicked_point: Option<LatLng>,
}

#[derive(Deserialize)]
struct NewsQuery {
    #[serde(default)]
    q: String,
}

#[derive(Deserialize)]
struct RewardQuery {
    #[serde(default)]
    total: String,
    #[serde(default)]
    ratio: String,
}

// -- Helpers --

async fn view(state: &AppState, session: &Session) -> ApiResult<SharedView> {
    Ok(current_view(state, session).await?)
}

fn checked_point(raw: LatLng) -> Result<LatLng, AppError> {
    LatLng::new(raw.lat, raw.lng)
        .ok_or_else(|| AppError::BadRequest("Coordinates out of range".into()))
}

/// News degrades to an empty list when the backend is unavailable.
async fn fetch_news(state: &AppState, point: LatLng) -> Vec<NewsItem> {
    match state.backend.news_near(point).await {
        Ok(items) => items,
        Err(e) => {
            tracing::warn!(lat = point.lat, lng = point.lng, "News fetch failed: {}", e);
            Vec::new()
        }
    }
}

// -- View state --

async fn view_snapshot(
    State(state): State<AppState>,
    ApiSession(session): ApiSession,
) -> ApiResult<Json<ViewSnapshot>> {
    let shared = view(&state, &session).await?;
    let snapshot = shared.lock().await.snapshot();
    Ok(Json(snapshot))
}

async fn camera_moved(
    State(state): State<AppState>,
    ApiSession(session): ApiSession,
    Json(body): Json<CameraBody>,
) -> ApiResult<StatusCode> {
    let center = checked_point(body.center)?;
    if !body.zoom.is_finite() || !(0.0..=MAX_ZOOM).contains(&body.zoom) {
        return Err(AppError::BadRequest("Zoom out of range".into()).into());
    }
    let shared = view(&state, &session).await?;
    shared.lock().await.observe_camera(center, body.zoom);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/location: Resolve the page's geolocation result, then load news there.
async fn location(
    State(state): State<AppState>,
    ApiSession(session): ApiSession,
    Json(report): Json<LocationReport>,
) -> ApiResult<Json<LocationResponse>> {
    let shared = view(&state, &session).await?;
    let (resolved, recenter, ticket) = {
        let mut view = shared.lock().await;
        let recenter = view.interaction().detail().is_none();
        let resolved = view.locate(&report);
        let (ticket, _) = view.request_news();
        (resolved, recenter, ticket)
    };
    tracing::info!(
        lat = resolved.point.lat,
        lng = resolved.point.lng,
        source = ?resolved.source,
        "Map centered"
    );

    let items = fetch_news(&state, resolved.point).await;
    let mut view = shared.lock().await;
    // This fetch supersedes one the drawer may have in flight, so the drawer
    // gets its list from here.
    let news_html = if view.accept_news(ticket, items) && view.news_open() {
        Some(
            NewsListTemplate {
                items: view.news().iter().collect(),
                query: "",
            }
            .render()?,
        )
    } else {
        None
    };
    Ok(Json(LocationResponse {
        location: resolved,
        recenter,
        news_count: view.news().len(),
        news_html,
    }))
}

// -- Posts, comments, reactions --

async fn list_posts(
    State(state): State<AppState>,
    ApiSession(session): ApiSession,
    Query(query): Query<FeedQuery>,
) -> ApiResult<Json<Vec<Post>>> {
    let shared = view(&state, &session).await?;
    if query.refresh {
        match state.backend.posts(session.tokens()).await {
            Ok(posts) => {
                tracing::debug!(posts = posts.len(), "Feed refreshed");
                shared.lock().await.replace_posts(posts);
            }
            Err(BackendError::Unauthorized) => return Err(AppError::Unauthorized.into()),
            Err(e) => tracing::warn!("Feed refresh failed, keeping current posts: {}", e),
        }
    }
    let posts = shared
        .lock()
        .await
        .feed()
        .query(query.q.as_deref(), query.sort);
    Ok(Json(posts))
}

/// POST /api/posts: Create a post at the point picked in post mode.
async fn create_post(
    State(state): State<AppState>,
    ApiSession(session): ApiSession,
    Json(req): Json<CreatePostRequest>,
) -> ApiResult<Response> {
    let title = req.title.trim();
    if title.is_empty() {
        return Err(AppError::BadRequest("A title is required".into()).into());
    }

    let shared = view(&state, &session).await?;
    let location = shared
        .lock()
        .await
        .clicked_point()
        .ok_or_else(|| AppError::BadRequest("Pick a location on the map first".into()))?;

    let reward = split_reward(
        parse_reward_input(&req.reward),
        parse_ratio_input(&req.ratio),
    );
    let draft = PostDraft {
        title: title.to_string(),
        description: req.description.trim().to_string(),
        icon_url: req.icon_url.trim().to_string(),
        image_url: req
            .image_url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty()),
        tags: req
            .tags
            .into_iter()
            .filter_map(|t| {
                let name = t.name.trim();
                (!name.is_empty()).then(|| Tag {
                    name: name.to_string(),
                    is_main: t.is_main,
                })
            })
            .collect(),
        location,
        reward,
        deadline: req.deadline,
    };

    let post = state.backend.create_post(session.tokens(), &draft).await?;
    tracing::info!(post_id = %post.id, reward = reward.total(), "Post created");
    shared.lock().await.post_created(post.clone());
    Ok((StatusCode::CREATED, Json(post)).into_response())
}

async fn create_comment(
    State(state): State<AppState>,
    ApiSession(session): ApiSession,
    Json(req): Json<CreateCommentRequest>,
) -> ApiResult<Response> {
    let body = req.body.trim();
    if body.is_empty() {
        return Err(AppError::BadRequest("Comment is empty".into()).into());
    }
    let post_id = PostId::new(req.post_id);

    let shared = view(&state, &session).await?;
    if shared.lock().await.feed().get(&post_id).is_none() {
        return Err(AppError::NotFound.into());
    }

    let comment = state
        .backend
        .create_comment(session.tokens(), &post_id, body)
        .await?;
    if !shared.lock().await.comment_created(comment.clone()) {
        tracing::debug!(post_id = %post_id, "Comment's post left the feed meanwhile");
    }
    Ok((StatusCode::CREATED, Json(comment)).into_response())
}

async fn react_to_post(
    State(state): State<AppState>,
    ApiSession(session): ApiSession,
    Path(id): Path<String>,
) -> ApiResult<Json<Reaction>> {
    let id = PostId::new(id);
    let reaction = state.backend.react_to_post(session.tokens(), &id).await?;
    let shared = view(&state, &session).await?;
    shared
        .lock()
        .await
        .post_likes(&id, reaction.current_like_count);
    Ok(Json(reaction))
}

async fn react_to_comment(
    State(state): State<AppState>,
    ApiSession(session): ApiSession,
    Path(id): Path<String>,
) -> ApiResult<Json<Reaction>> {
    let id = CommentId::new(id);
    let reaction = state
        .backend
        .react_to_comment(session.tokens(), &id)
        .await?;
    let shared = view(&state, &session).await?;
    shared
        .lock()
        .await
        .comment_likes(&id, reaction.current_like_count);
    Ok(Json(reaction))
}

// -- Markers and detail --

/// Hover popup fragment, or 204 when the hover is suppressed.
async fn marker_enter(
    State(state): State<AppState>,
    ApiSession(session): ApiSession,
    Path(id): Path<String>,
    Json(event): Json<MarkerEvent>,
) -> ApiResult<Response> {
    let id = PostId::new(id);
    let shared = view(&state, &session).await?;
    let mut view = shared.lock().await;
    view.set_viewport(event.viewport);

    let post = view.feed().get(&id).cloned().ok_or(AppError::NotFound)?;
    let Some(placement) = view.hover(id, event.marker) else {
        return Ok(StatusCode::NO_CONTENT.into_response());
    };
    Ok(Html(HoverPopupTemplate {
        post: &post,
        style: placement.css(),
    })
    .into_response())
}

async fn pointer(
    State(state): State<AppState>,
    ApiSession(session): ApiSession,
    Json(body): Json<PointerBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let watch = PointerWatch {
        over_marker: body.over_marker.map(PostId::new),
        over_popup: body.over_popup,
    };
    let shared = view(&state, &session).await?;
    let ended = shared.lock().await.pointer(&watch);
    Ok(Json(serde_json::json!({ "hover_ended": ended })))
}

async fn marker_click(
    State(state): State<AppState>,
    ApiSession(session): ApiSession,
    Path(id): Path<String>,
    Json(body): Json<ClickBody>,
) -> ApiResult<Json<DetailResponse>> {
    let id = PostId::new(id);
    let shared = view(&state, &session).await?;
    let mut view = shared.lock().await;
    if let Some(viewport) = body.viewport {
        view.set_viewport(viewport);
    }

    let post = view.feed().get(&id).cloned().ok_or(AppError::NotFound)?;
    let Some(camera) = view.open_detail(&id) else {
        return Ok(Json(DetailResponse {
            opened: false,
            camera: None,
            html: None,
        }));
    };
    let html = PostDetailTemplate::new(&post).render()?;
    Ok(Json(DetailResponse {
        opened: true,
        camera: Some(camera),
        html: Some(html),
    }))
}

async fn detail_close(
    State(state): State<AppState>,
    ApiSession(session): ApiSession,
) -> ApiResult<Json<CameraResponse>> {
    let shared = view(&state, &session).await?;
    let camera = shared.lock().await.close_detail();
    Ok(Json(CameraResponse { camera }))
}

// -- Post mode --

async fn map_click(
    State(state): State<AppState>,
    ApiSession(session): ApiSession,
    Json(point): Json<LatLng>,
) -> ApiResult<Json<MapClickResponse>> {
    let point = checked_point(point)?;
    let shared = view(&state, &session).await?;
    let mut view = shared.lock().await;
    let accepted = view.map_click(point);
    Ok(Json(MapClickResponse {
        accepted,
        clicked_point: view.clicked_point(),
    }))
}

async fn post_mode(
    State(state): State<AppState>,
    ApiSession(session): ApiSession,
) -> ApiResult<Json<PostModeChange>> {
    let shared = view(&state, &session).await?;
    let change = shared.lock().await.toggle_post_mode();
    Ok(Json(change))
}

async fn post_modal_close(
    State(state): State<AppState>,
    ApiSession(session): ApiSession,
) -> ApiResult<StatusCode> {
    let shared = view(&state, &session).await?;
    shared.lock().await.close_post_modal();
    Ok(StatusCode::NO_CONTENT)
}

async fn navigation_toggle(
    State(state): State<AppState>,
    ApiSession(session): ApiSession,
) -> ApiResult<Json<serde_json::Value>> {
    let shared = view(&state, &session).await?;
    let expanded = shared.lock().await.toggle_navigation();
    Ok(Json(serde_json::json!({ "expanded": expanded })))
}

// -- News --

/// Opening returns the list fragment; closing, or a response that went stale, returns 204.
async fn news_toggle(
    State(state): State<AppState>,
    ApiSession(session): ApiSession,
) -> ApiResult<Response> {
    let shared = view(&state, &session).await?;
    let Some((ticket, point)) = shared.lock().await.toggle_news() else {
        return Ok(StatusCode::NO_CONTENT.into_response());
    };

    let items = fetch_news(&state, point).await;
    let mut view = shared.lock().await;
    if !view.accept_news(ticket, items) {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    Ok(Html(NewsListTemplate {
        items: view.news().iter().collect(),
        query: "",
    })
    .into_response())
}

async fn news_search(
    State(state): State<AppState>,
    ApiSession(session): ApiSession,
    Query(query): Query<NewsQuery>,
) -> ApiResult<Response> {
    let shared = view(&state, &session).await?;
    let view = shared.lock().await;
    Ok(Html(NewsListTemplate {
        items: filter_news(view.news(), &query.q),
        query: &query.q,
    })
    .into_response())
}

/// Live preview for the post form's reward slider.
async fn reward_split(Query(query): Query<RewardQuery>) -> Json<RewardSplit> {
    Json(split_reward(
        parse_reward_input(&query.total),
        parse_ratio_input(&query.ratio),
    ))
}
