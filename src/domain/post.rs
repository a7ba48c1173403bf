// Domain types - plain data, validated before they get here
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::reward::RewardSplit;
use crate::map::LatLng;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PostId(pub String);

impl PostId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommentId(pub String);

impl CommentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A post classification. Main tags are the primary category, sub tags are free-form labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub is_main: bool,
}

impl Tag {
    pub fn main(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_main: true,
        }
    }

    pub fn sub(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_main: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub author_name: Option<String>,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub post_id: PostId,
    pub like_count: u64,
}

/// A geotagged community project entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub author_name: Option<String>,
    pub prefecture: Option<String>,
    pub location: LatLng,
    pub title: String,
    pub icon_url: String,
    pub image_url: Option<String>,
    pub description: String,
    pub tags: Vec<Tag>,
    pub distribution_reward: u64,
    pub direct_reward: u64,
    pub created_at: DateTime<Utc>,
    pub deadline: Option<DateTime<Utc>>,
    pub achievement: Option<String>,
    pub like_count: u64,
    pub best_answer: Option<CommentId>,
    pub comments: Vec<Comment>,
}

impl Post {
    /// Total incentive shown on the hover popup.
    pub fn total_reward(&self) -> u64 {
        self.distribution_reward.saturating_add(self.direct_reward)
    }

    /// Split tags into (main, sub), each group keeping the original order.
    pub fn partition_tags(&self) -> (Vec<&Tag>, Vec<&Tag>) {
        self.tags.iter().partition(|t| t.is_main)
    }

    pub fn comment_count(&self) -> usize {
        self.comments.len()
    }

    pub fn best_answer_comment(&self) -> Option<&Comment> {
        let id = self.best_answer.as_ref()?;
        self.comments.iter().find(|c| &c.id == id)
    }

    pub fn has_tag(&self, needle_lower: &str) -> bool {
        self.tags
            .iter()
            .any(|t| t.name.to_lowercase().contains(needle_lower))
    }
}

/// A post as composed in the creation modal, before the backend assigns an id.
#[derive(Debug, Clone, PartialEq)]
pub struct PostDraft {
    pub title: String,
    pub description: String,
    pub icon_url: String,
    pub image_url: Option<String>,
    pub tags: Vec<Tag>,
    pub location: LatLng,
    pub reward: RewardSplit,
    pub deadline: Option<DateTime<Utc>>,
}

/// The signed-in user, loaded once at page entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub display_name: Option<String>,
    pub token_balance: i64,
    pub email: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.email)
    }

    /// Deduct a spent reward locally after the backend accepted it.
    pub fn spend_tokens(&mut self, amount: u64) {
        let amount = i64::try_from(amount).unwrap_or(i64::MAX);
        self.token_balance = self.token_balance.saturating_sub(amount);
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn post(id: &str, lat: f64, lng: f64) -> Post {
        Post {
            id: PostId::new(id),
            author_name: Some("Tanaka".to_string()),
            prefecture: Some("Osaka".to_string()),
            location: LatLng::new(lat, lng).unwrap(),
            title: format!("Post {id}"),
            icon_url: "https://img.example/icon.png".to_string(),
            image_url: None,
            description: "Clean up the park".to_string(),
            tags: vec![Tag::main("environment"), Tag::sub("local")],
            distribution_reward: 300,
            direct_reward: 100,
            created_at: "2025-09-19T10:30:00Z".parse().unwrap(),
            deadline: None,
            achievement: None,
            like_count: 0,
            best_answer: None,
            comments: Vec::new(),
        }
    }

    pub fn comment(id: &str, post_id: &str) -> Comment {
        Comment {
            id: CommentId::new(id),
            author_name: None,
            body: "Count me in".to_string(),
            created_at: "2025-09-19T11:00:00Z".parse().unwrap(),
            post_id: PostId::new(post_id),
            like_count: 0,
        }
    }
}
