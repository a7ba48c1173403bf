use std::path::Path;

use anyhow::Context;

use super::dto::PostsResponse;
use crate::domain::Post;

/// Read fallback posts from a JSON file in the backend's `{"posts": [...]}` shape.
pub fn load_posts(path: &Path) -> anyhow::Result<Vec<Post>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading fixtures from {}", path.display()))?;
    parse_posts(&content).with_context(|| format!("parsing fixtures in {}", path.display()))
}

pub fn parse_posts(json: &str) -> anyhow::Result<Vec<Post>> {
    let body: PostsResponse = serde_json::from_str(json)?;
    let posts = body
        .posts
        .into_iter()
        .map(Post::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(posts)
}
