// Per-session map page state.
//
// The browser reports discrete events; handlers lock the session's HomeView,
// advance the state machines, and release the lock before any backend await.
pub mod generation;

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::domain::{Comment, CommentId, NewsItem, Post, PostFeed, PostId, User};
use crate::map::geolocation::{Geolocator, LocationReport, ResolvedLocation};
use crate::map::interaction::{Interaction, InteractionMachine, PointerWatch, PopupPlacement};
use crate::map::viewport::{CameraController, CameraMove, ScreenFraction};
use crate::map::{LatLng, ScreenPoint, Viewport};
use crate::ui::{NavigationFlag, Panel, PanelSnapshot, PanelTiming};
pub use generation::{RequestGeneration, Ticket};

pub type SharedView = Arc<Mutex<HomeView>>;

const DEFAULT_VIEWPORT: Viewport = Viewport {
    width: 1280.0,
    height: 800.0,
};

/// Map and geolocation knobs a view needs, lifted out of [`Config`].
#[derive(Debug, Clone, Copy)]
pub struct ViewSettings {
    pub zoom: f64,
    pub detail_fraction: ScreenFraction,
    pub fallback: LatLng,
    pub geolocation_timeout: Duration,
    pub geolocation_maximum_age: Duration,
}

impl From<&Config> for ViewSettings {
    fn from(config: &Config) -> Self {
        Self {
            zoom: config.map.zoom,
            detail_fraction: ScreenFraction {
                x: config.map.detail_fraction_x,
                y: config.map.detail_fraction_y,
            },
            fallback: config.fallback_point(),
            geolocation_timeout: Duration::from_millis(config.geolocation.timeout_ms),
            geolocation_maximum_age: Duration::from_millis(config.geolocation.maximum_age_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PanelsSnapshot {
    pub news: PanelSnapshot,
    pub post_modal: PanelSnapshot,
    pub detail: PanelSnapshot,
    pub navigation: PanelSnapshot,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CameraSnapshot {
    pub center: LatLng,
    pub zoom: f64,
}

/// What `/api/view` reports.
#[derive(Debug, Clone, Serialize)]
pub struct ViewSnapshot {
    pub interaction: Interaction,
    pub camera: CameraSnapshot,
    pub location: ResolvedLocation,
    pub post_mode: bool,
    pub clicked_point: Option<LatLng>,
    pub navigation_expanded: bool,
    pub panels: PanelsSnapshot,
    pub token_balance: i64,
    pub post_count: usize,
    pub news_count: usize,
}

/// Result of flipping post mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PostModeChange {
    pub post_mode: bool,
    /// Camera restore when entering post mode closed an open detail view.
    pub camera: Option<CameraMove>,
}

/// The live state of one user's map page.
#[derive(Debug)]
pub struct HomeView {
    me: Weak<Mutex<HomeView>>,
    user: User,
    feed: PostFeed,
    interaction: InteractionMachine,
    camera: CameraController,
    viewport: Viewport,
    detail_fraction: ScreenFraction,
    geolocator: Geolocator,
    location: ResolvedLocation,
    post_mode: bool,
    clicked_point: Option<LatLng>,
    navigation: NavigationFlag,
    news_panel: Panel,
    post_modal: Panel,
    detail_panel: Panel,
    navigation_panel: Panel,
    news: Vec<NewsItem>,
    news_generation: RequestGeneration,
}

impl HomeView {
    /// Build a view behind a shared handle. The view keeps a weak handle to itself
    /// so panel completions can reach back in after their animation.
    pub fn shared(user: User, posts: Vec<Post>, settings: ViewSettings) -> SharedView {
        Arc::new_cyclic(|me| Mutex::new(Self::new(me.clone(), user, posts, settings)))
    }

    fn new(me: Weak<Mutex<HomeView>>, user: User, posts: Vec<Post>, settings: ViewSettings) -> Self {
        let geolocator = Geolocator::new(
            settings.fallback,
            settings.geolocation_timeout,
            settings.geolocation_maximum_age,
        );
        let location = geolocator.current(Instant::now());
        let navigation = NavigationFlag::new();
        let navigation_panel = Panel::new("navigation", PanelTiming::NAVIGATION);
        navigation.drive(navigation_panel.clone());

        Self {
            me,
            user,
            feed: PostFeed::new(posts),
            interaction: InteractionMachine::new(),
            camera: CameraController::new(location.point, settings.zoom),
            viewport: DEFAULT_VIEWPORT,
            detail_fraction: settings.detail_fraction,
            geolocator,
            location,
            post_mode: false,
            clicked_point: None,
            navigation,
            news_panel: Panel::new("news", PanelTiming::NEWS),
            post_modal: Panel::new("post_modal", PanelTiming::POST_MODAL),
            detail_panel: Panel::new("detail", PanelTiming::DETAIL),
            navigation_panel,
            news: Vec::new(),
            news_generation: RequestGeneration::new(),
        }
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn feed(&self) -> &PostFeed {
        &self.feed
    }

    pub fn interaction(&self) -> &InteractionMachine {
        &self.interaction
    }

    pub fn location(&self) -> ResolvedLocation {
        self.location
    }

    pub fn post_mode(&self) -> bool {
        self.post_mode
    }

    pub fn clicked_point(&self) -> Option<LatLng> {
        self.clicked_point
    }

    pub fn news(&self) -> &[NewsItem] {
        &self.news
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        ViewSnapshot {
            interaction: self.interaction.state().clone(),
            camera: CameraSnapshot {
                center: self.camera.center(),
                zoom: self.camera.zoom(),
            },
            location: self.location,
            post_mode: self.post_mode,
            clicked_point: self.clicked_point,
            navigation_expanded: self.navigation.is_expanded(),
            panels: PanelsSnapshot {
                news: self.news_panel.snapshot(),
                post_modal: self.post_modal.snapshot(),
                detail: self.detail_panel.snapshot(),
                navigation: self.navigation_panel.snapshot(),
            },
            token_balance: self.user.token_balance,
            post_count: self.feed.len(),
            news_count: self.news.len(),
        }
    }

    /// The page reports its size along with pointer events.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        if viewport.width > 0.0 && viewport.height > 0.0 {
            self.viewport = viewport;
        }
    }

    /// The user panned or zoomed.
    pub fn observe_camera(&mut self, center: LatLng, zoom: f64) {
        self.camera.observe(center, zoom);
    }

    // --- geolocation ---

    /// Resolve the page's geolocation report into a map center.
    pub fn locate(&mut self, report: &LocationReport) -> ResolvedLocation {
        let resolved = self.geolocator.resolve(report, Instant::now());
        self.location = resolved;
        // An open detail view owns the camera until it restores.
        if self.interaction.detail().is_none() {
            self.camera.observe(resolved.point, self.camera.zoom());
        }
        resolved
    }

    pub fn geolocator(&self) -> &Geolocator {
        &self.geolocator
    }

    // --- hover and detail ---

    pub fn hover(&mut self, post: PostId, marker: ScreenPoint) -> Option<PopupPlacement> {
        self.interaction
            .pointer_entered(post, marker, self.viewport)
    }

    /// Returns true when the hover ended.
    pub fn pointer(&mut self, watch: &PointerWatch) -> bool {
        self.interaction.pointer_moved(watch)
    }

    /// Open the detail view for `post` and recenter so the marker clears the panel.
    pub fn open_detail(&mut self, post: &PostId) -> Option<CameraMove> {
        let target = self.feed.get(post).map(|p| p.location)?;
        if !self.interaction.marker_clicked(post.clone()) {
            return None;
        }
        self.detail_panel.open();
        self.camera
            .focus(Some(target), self.viewport, self.detail_fraction)
    }

    /// Start closing the detail view. The interaction returns to idle once the
    /// panel teardown has finished.
    pub fn close_detail(&mut self) -> Option<CameraMove> {
        let post = self.interaction.close_requested()?;
        let me = self.me.clone();
        self.detail_panel.close(Some(Box::pin(async move {
            let Some(view) = me.upgrade() else {
                return;
            };
            let mut view = view.lock().await;
            if view.interaction.close_finished(&post) {
                tracing::debug!(post = %post, "Detail view closed");
            }
        })));
        self.camera.restore()
    }

    // --- post mode ---

    pub fn toggle_post_mode(&mut self) -> PostModeChange {
        self.set_post_mode(!self.post_mode)
    }

    pub fn set_post_mode(&mut self, on: bool) -> PostModeChange {
        let mut camera = None;
        if on && self.interaction.detail().is_some() {
            self.detail_panel.close(None);
            camera = self.camera.restore();
        }
        self.post_mode = on;
        self.interaction.set_creation_mode(on);
        if !on {
            self.close_post_modal();
        }
        PostModeChange {
            post_mode: on,
            camera,
        }
    }

    /// A map click only matters in post mode, where it picks the post location.
    pub fn map_click(&mut self, point: LatLng) -> bool {
        if !self.post_mode {
            return false;
        }
        self.clicked_point = Some(point);
        if !self.post_modal.is_open_or_opening() {
            self.post_modal.open();
        }
        true
    }

    pub fn close_post_modal(&mut self) {
        self.clicked_point = None;
        self.post_modal.close(None);
    }

    // --- navigation ---

    /// The navigation panel follows the flag on its own.
    pub fn toggle_navigation(&mut self) -> bool {
        self.navigation.toggle()
    }

    // --- news ---

    /// Flip the news drawer. Opening returns the ticket and point for the fetch.
    pub fn toggle_news(&mut self) -> Option<(Ticket, LatLng)> {
        if self.news_panel.is_open_or_opening() {
            self.news_panel.close(None);
            self.news_generation.invalidate();
            return None;
        }
        self.news_panel.open();
        Some(self.request_news())
    }

    pub fn news_open(&self) -> bool {
        self.news_panel.is_open_or_opening()
    }

    /// Issue a news fetch for the current location.
    pub fn request_news(&mut self) -> (Ticket, LatLng) {
        (self.news_generation.issue(), self.location.point)
    }

    /// Apply a news response. Returns false if the ticket went stale meanwhile.
    pub fn accept_news(&mut self, ticket: Ticket, items: Vec<NewsItem>) -> bool {
        if !self.news_generation.is_current(ticket) {
            tracing::debug!(dropped = items.len(), "Ignoring stale news response");
            return false;
        }
        self.news = items;
        true
    }

    /// Drop outstanding responses, e.g. when the page reloads.
    pub fn invalidate_requests(&mut self) {
        self.news_generation.invalidate();
    }

    // --- feed ---

    /// Swap in a freshly fetched post list.
    pub fn replace_posts(&mut self, posts: Vec<Post>) {
        self.feed.replace(posts);
    }

    /// A post the backend accepted: show it first, charge the reward, leave post mode.
    pub fn post_created(&mut self, post: Post) {
        self.user.spend_tokens(post.total_reward());
        self.feed.prepend_post(post);
        self.set_post_mode(false);
    }

    pub fn comment_created(&mut self, comment: Comment) -> bool {
        self.feed.prepend_comment(comment)
    }

    pub fn post_likes(&mut self, post: &PostId, like_count: u64) -> bool {
        self.feed.set_post_likes(post, like_count)
    }

    pub fn comment_likes(&mut self, comment: &CommentId, like_count: u64) -> bool {
        self.feed.set_comment_likes(comment, like_count)
    }
}

/// All open map pages, keyed by user id.
#[derive(Debug, Clone, Default)]
pub struct ViewStore {
    views: Arc<Mutex<HashMap<String, SharedView>>>,
}

impl ViewStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, user_id: &str) -> Option<SharedView> {
        self.views.lock().await.get(user_id).cloned()
    }

    /// Install a fresh view, e.g. on page load. Responses still in flight for
    /// the previous view are invalidated.
    pub async fn replace(&self, user_id: &str, view: SharedView) -> SharedView {
        let previous = self
            .views
            .lock()
            .await
            .insert(user_id.to_string(), Arc::clone(&view));
        if let Some(previous) = previous {
            previous.lock().await.invalidate_requests();
        }
        view
    }

    pub async fn remove(&self, user_id: &str) -> Option<SharedView> {
        self.views.lock().await.remove(user_id)
    }

    pub async fn len(&self) -> usize {
        self.views.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::post::fixtures::{comment, post};
    use crate::map::geolocation::LocationSource;
    use crate::map::interaction::PopupSide;
    use crate::ui::Stage;

    fn user() -> User {
        User {
            id: "u1".into(),
            display_name: Some("Tanaka".into()),
            token_balance: 1000,
            email: "tanaka@example.com".into(),
            created_at: None,
        }
    }

    fn settings() -> ViewSettings {
        ViewSettings::from(&Config::default())
    }

    fn view() -> SharedView {
        HomeView::shared(
            user(),
            vec![post("a", 35.68, 139.76), post("b", 35.69, 139.70)],
            settings(),
        )
    }

    fn item(title: &str) -> NewsItem {
        NewsItem {
            title: title.into(),
            description: String::new(),
            url: "https://news.example/a".into(),
            image: None,
            source: None,
            published_at: None,
        }
    }

    #[tokio::test]
    async fn starts_at_fallback_location() {
        let view = view();
        let view = view.lock().await;
        assert_eq!(view.location().point, LatLng::TOKYO_STATION);
        assert_eq!(view.location().source, LocationSource::Fallback);
        assert_eq!(view.snapshot().post_count, 2);
    }

    #[tokio::test]
    async fn hover_places_popup_against_viewport() {
        let view = view();
        let mut view = view.lock().await;
        view.set_viewport(Viewport {
            width: 1000.0,
            height: 600.0,
        });
        let placement = view
            .hover(PostId::new("a"), ScreenPoint { x: 800.0, y: 300.0 })
            .unwrap();
        assert_eq!(placement.side, PopupSide::Right);
        assert_eq!(placement.offset, 220.0);
    }

    #[tokio::test(start_paused = true)]
    async fn detail_close_returns_to_idle_after_teardown() {
        let shared = view();
        {
            let mut view = shared.lock().await;
            let camera = view.open_detail(&PostId::new("a"));
            assert!(camera.is_some());
            assert!(view.camera.pre_detail().is_some());

            let restore = view.close_detail().unwrap();
            assert_eq!(restore.center, LatLng::TOKYO_STATION);
            assert!(matches!(
                view.interaction().state(),
                Interaction::DetailOpen { closing: true, .. }
            ));
        }

        tokio::time::sleep(Duration::from_millis(600)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        let view = shared.lock().await;
        assert_eq!(view.interaction().state(), &Interaction::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn detail_content_mounts_after_frame_and_never_reports_closed_while_opening() {
        let shared = view();
        let mut view = shared.lock().await;
        view.open_detail(&PostId::new("a"));

        let first = view.snapshot().panels.detail;
        assert_eq!(first.stage, Stage::OpeningFrame);
        assert!(first.frame_visible);
        assert!(!first.content_visible);

        tokio::time::sleep(Duration::from_millis(5)).await;
        let early = view.snapshot().panels.detail;
        assert_eq!(early.stage, Stage::OpeningFrame);
        assert!(!early.content_visible);

        tokio::time::sleep(Duration::from_millis(10)).await;
        let mounted = view.snapshot().panels.detail;
        assert_eq!(mounted.stage, Stage::OpeningContent);
        assert!(mounted.content_visible && mounted.expanded);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(view.snapshot().panels.detail.stage, Stage::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_panel_follows_toggle() {
        let shared = view();
        let mut view = shared.lock().await;
        assert!(view.toggle_navigation());
        assert!(view.snapshot().navigation_expanded);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(view.snapshot().panels.navigation.stage, Stage::Open);

        assert!(!view.toggle_navigation());
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(view.snapshot().panels.navigation.stage, Stage::Closed);
    }

    #[tokio::test]
    async fn open_detail_for_unknown_post_is_ignored() {
        let view = view();
        let mut view = view.lock().await;
        assert!(view.open_detail(&PostId::new("missing")).is_none());
        assert_eq!(view.interaction().state(), &Interaction::Idle);
    }

    #[tokio::test]
    async fn map_click_only_counts_in_post_mode() {
        let view = view();
        let mut view = view.lock().await;
        let point = LatLng::new(35.0, 139.0).unwrap();

        assert!(!view.map_click(point));
        assert!(view.clicked_point().is_none());

        view.toggle_post_mode();
        assert!(view.map_click(point));
        assert_eq!(view.clicked_point(), Some(point));

        let change = view.toggle_post_mode();
        assert!(!change.post_mode);
        assert!(view.clicked_point().is_none());
    }

    #[tokio::test]
    async fn entering_post_mode_closes_detail_and_restores_camera() {
        let view = view();
        let mut view = view.lock().await;
        view.open_detail(&PostId::new("b"));

        let change = view.set_post_mode(true);
        assert!(change.camera.is_some());
        assert_eq!(view.interaction().state(), &Interaction::Idle);
        assert!(view
            .hover(PostId::new("a"), ScreenPoint { x: 1.0, y: 1.0 })
            .is_none());
    }

    #[tokio::test]
    async fn closing_news_drops_in_flight_response() {
        let view = view();
        let mut view = view.lock().await;

        let (ticket, point) = view.toggle_news().unwrap();
        assert_eq!(point, LatLng::TOKYO_STATION);
        assert!(view.toggle_news().is_none());

        assert!(!view.accept_news(ticket, vec![item("late")]));
        assert!(view.news().is_empty());
    }

    #[tokio::test]
    async fn newer_news_request_wins() {
        let view = view();
        let mut view = view.lock().await;
        let (old, _) = view.request_news();
        let (new, _) = view.request_news();

        assert!(view.accept_news(new, vec![item("fresh")]));
        assert!(!view.accept_news(old, vec![item("stale")]));
        assert_eq!(view.news()[0].title, "fresh");
    }

    #[tokio::test]
    async fn location_fetch_supersedes_drawer_fetch_while_open() {
        let view = view();
        let mut view = view.lock().await;
        let (drawer, _) = view.toggle_news().unwrap();

        view.locate(&LocationReport::Denied);
        let (located, _) = view.request_news();

        assert!(view.accept_news(located, vec![item("here")]));
        assert!(!view.accept_news(drawer, vec![item("there")]));
        assert!(view.news_open());
        assert_eq!(view.news()[0].title, "here");
    }

    #[tokio::test]
    async fn refetched_posts_replace_feed() {
        let view = view();
        let mut view = view.lock().await;
        view.replace_posts(vec![post("c", 35.0, 139.0)]);
        assert_eq!(view.snapshot().post_count, 1);
        assert!(view.feed().get(&PostId::new("a")).is_none());
    }

    #[tokio::test]
    async fn created_post_is_prepended_and_charged() {
        let view = view();
        let mut view = view.lock().await;
        view.set_post_mode(true);
        view.map_click(LatLng::new(35.0, 139.0).unwrap());

        view.post_created(post("new", 35.0, 139.0));

        assert_eq!(view.feed().snapshot()[0].id.as_str(), "new");
        assert_eq!(view.user().token_balance, 600);
        assert!(!view.post_mode());
        assert!(view.clicked_point().is_none());
    }

    #[tokio::test]
    async fn comment_is_prepended_on_owner() {
        let view = view();
        let mut view = view.lock().await;
        assert!(view.comment_created(comment("c1", "b")));
        assert!(!view.comment_created(comment("c2", "zzz")));
        let b = view.feed().get(&PostId::new("b")).unwrap();
        assert_eq!(b.comment_count(), 1);
    }

    #[tokio::test]
    async fn denied_location_centers_on_fallback() {
        let view = view();
        let mut view = view.lock().await;
        let resolved = view.locate(&LocationReport::Denied);
        assert_eq!(resolved.point, LatLng::TOKYO_STATION);
        assert_eq!(view.request_news().1, LatLng::TOKYO_STATION);
    }

    #[tokio::test]
    async fn store_replace_invalidates_previous_view() {
        let store = ViewStore::new();
        let first = store.replace("u1", view()).await;
        let ticket = first.lock().await.request_news();

        store.replace("u1", view()).await;
        assert_eq!(store.len().await, 1);
        assert!(!first.lock().await.accept_news(ticket.0, vec![item("x")]));
    }
}
