use std::sync::Arc;

use crate::backend::Backend;
use crate::config::Config;
use crate::domain::Post;
use crate::view::{ViewSettings, ViewStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub backend: Arc<dyn Backend>,
    pub views: ViewStore,
    /// Shown when the backend's post list cannot be fetched.
    pub fallback_posts: Arc<Vec<Post>>,
}

impl AppState {
    pub fn new(config: Config, backend: Arc<dyn Backend>, fallback_posts: Vec<Post>) -> Self {
        Self {
            config,
            backend,
            views: ViewStore::new(),
            fallback_posts: Arc::new(fallback_posts),
        }
    }

    pub fn view_settings(&self) -> ViewSettings {
        ViewSettings::from(&self.config)
    }
}
