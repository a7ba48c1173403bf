// Wire shapes for the REST backend.
//
// Everything that comes off the network lands in one of these structs first
// and is then checked into a domain type. Nothing loosely typed travels past
// this module.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BackendError, SessionTokens};
use crate::domain::news::{NewsItem, NewsSource};
use crate::domain::post::{Comment, CommentId, Post, PostDraft, PostId, Tag, User};
use crate::map::LatLng;

#[derive(Debug, Serialize)]
pub struct CredentialsBody<'a> {
    pub email: &'a str,
    pub password_hash: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user_id: Option<String>,
    #[serde(default)]
    pub is_authenticated: Option<bool>,
}

impl TryFrom<AuthResponse> for SessionTokens {
    type Error = BackendError;

    fn try_from(resp: AuthResponse) -> Result<Self, Self::Error> {
        if resp.is_authenticated == Some(false) {
            return Err(BackendError::Unauthorized);
        }
        let access_token = non_empty(resp.access_token, "access_token")?;
        let refresh_token = non_empty(resp.refresh_token, "refresh_token")?;
        let user_id = non_empty(resp.user_id, "user_id")?;
        Ok(SessionTokens {
            access_token,
            refresh_token,
            user_id,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ProfileDto {
    #[serde(alias = "uid", alias = "user_id")]
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(alias = "token", default)]
    pub token_balance: i64,
    pub email: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<ProfileDto> for User {
    fn from(p: ProfileDto) -> Self {
        User {
            id: p.id,
            display_name: p.display_name.filter(|n| !n.trim().is_empty()),
            token_balance: p.token_balance,
            email: p.email,
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TagDto {
    pub name: String,
    #[serde(alias = "attribute")]
    pub is_main: bool,
}

#[derive(Debug, Deserialize)]
pub struct CommentDto {
    #[serde(alias = "comment_id")]
    pub id: String,
    #[serde(alias = "name", default)]
    pub author_name: Option<String>,
    #[serde(alias = "context")]
    pub body: String,
    #[serde(alias = "comment_time")]
    pub created_at: DateTime<Utc>,
    pub post_id: String,
    #[serde(alias = "comment_good", default)]
    pub like_count: u64,
}

impl TryFrom<CommentDto> for Comment {
    type Error = BackendError;

    fn try_from(c: CommentDto) -> Result<Self, Self::Error> {
        if c.id.trim().is_empty() {
            return Err(BackendError::Malformed("comment without id".into()));
        }
        Ok(Comment {
            id: CommentId::new(c.id),
            author_name: c.author_name,
            body: c.body,
            created_at: c.created_at,
            post_id: PostId::new(c.post_id),
            like_count: c.like_count,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct PostDto {
    #[serde(alias = "post_id")]
    pub id: String,
    #[serde(alias = "user_name", default)]
    pub author_name: Option<String>,
    #[serde(alias = "prefectures", default)]
    pub prefecture: Option<String>,
    pub lat: f64,
    pub lng: f64,
    pub title: String,
    #[serde(alias = "IconURL", default)]
    pub icon_url: String,
    #[serde(alias = "ImageURL", default)]
    pub image_url: Option<String>,
    #[serde(alias = "discription", default)]
    pub description: String,
    #[serde(alias = "tag_list", default)]
    pub tags: Vec<TagDto>,
    #[serde(default)]
    pub distribution_reward: u64,
    #[serde(default)]
    pub direct_reward: u64,
    #[serde(alias = "post_time")]
    pub created_at: DateTime<Utc>,
    #[serde(alias = "post_limit", default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(alias = "achivement", default)]
    pub achievement: Option<String>,
    #[serde(alias = "post_good", default)]
    pub like_count: u64,
    #[serde(default)]
    pub best_answer: Option<String>,
    #[serde(alias = "comment", default)]
    pub comments: Vec<CommentDto>,
}

impl TryFrom<PostDto> for Post {
    type Error = BackendError;

    fn try_from(p: PostDto) -> Result<Self, Self::Error> {
        let location = LatLng::new(p.lat, p.lng).ok_or_else(|| {
            BackendError::Malformed(format!("post {} has invalid coordinates", p.id))
        })?;
        if p.id.trim().is_empty() {
            return Err(BackendError::Malformed("post without id".into()));
        }
        let comments = p
            .comments
            .into_iter()
            .map(Comment::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Post {
            id: PostId::new(p.id),
            author_name: p.author_name,
            prefecture: p.prefecture,
            location,
            title: p.title,
            icon_url: p.icon_url,
            image_url: p.image_url.filter(|u| !u.is_empty()),
            description: p.description,
            tags: p
                .tags
                .into_iter()
                .map(|t| Tag {
                    name: t.name,
                    is_main: t.is_main,
                })
                .collect(),
            distribution_reward: p.distribution_reward,
            direct_reward: p.direct_reward,
            created_at: p.created_at,
            deadline: p.deadline,
            achievement: p.achievement.filter(|a| !a.is_empty()),
            like_count: p.like_count,
            best_answer: p.best_answer.map(CommentId::new),
            comments,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct PostsResponse {
    pub posts: Vec<PostDto>,
}

/// Body for creating a post; field names follow the backend's schema.
#[derive(Debug, Serialize)]
pub struct CreatePostBody<'a> {
    pub title: &'a str,
    pub discription: &'a str,
    pub lat: f64,
    pub lng: f64,
    #[serde(rename = "IconURL")]
    pub icon_url: &'a str,
    #[serde(rename = "ImageURL", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<&'a str>,
    pub tag_list: Vec<WireTag<'a>>,
    pub distribution_reward: u64,
    pub direct_reward: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_limit: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct WireTag<'a> {
    pub name: &'a str,
    pub attribute: bool,
}

impl<'a> From<&'a PostDraft> for CreatePostBody<'a> {
    fn from(d: &'a PostDraft) -> Self {
        CreatePostBody {
            title: &d.title,
            discription: &d.description,
            lat: d.location.lat,
            lng: d.location.lng,
            icon_url: &d.icon_url,
            image_url: d.image_url.as_deref(),
            tag_list: d
                .tags
                .iter()
                .map(|t| WireTag {
                    name: &t.name,
                    attribute: t.is_main,
                })
                .collect(),
            distribution_reward: d.reward.contributor,
            direct_reward: d.reward.solver,
            post_limit: d.deadline,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateCommentBody<'a> {
    pub post_id: &'a str,
    pub context: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Reaction {
    pub result_code: i64,
    pub current_like_count: u64,
}

#[derive(Debug, Serialize)]
pub struct LocationBody {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Deserialize)]
pub struct NewsSourceDto {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewsArticleDto {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub url: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub source: Option<NewsSourceDto>,
    #[serde(alias = "publishedAt", default)]
    pub published_at: Option<DateTime<Utc>>,
}

impl TryFrom<NewsArticleDto> for NewsItem {
    type Error = BackendError;

    fn try_from(n: NewsArticleDto) -> Result<Self, Self::Error> {
        if n.title.trim().is_empty() {
            return Err(BackendError::Malformed("news item without title".into()));
        }
        let url = web_url(&n.url)
            .ok_or_else(|| BackendError::Malformed(format!("news url rejected: {}", n.url)))?;
        let image = n.image.as_deref().and_then(web_url);

        Ok(NewsItem {
            title: n.title,
            description: n.description.unwrap_or_default(),
            url,
            image,
            source: n.source.map(|s| NewsSource {
                name: s.name,
                url: s.url.as_deref().and_then(web_url),
            }),
            published_at: n.published_at,
        })
    }
}

/// Only absolute http(s) links make it into rendered pages.
fn web_url(raw: &str) -> Option<String> {
    let parsed = url::Url::parse(raw.trim()).ok()?;
    matches!(parsed.scheme(), "http" | "https").then(|| parsed.to_string())
}

fn non_empty(value: Option<String>, field: &str) -> Result<String, BackendError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| BackendError::Malformed(format!("missing {field}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_response_requires_all_tokens() {
        let full: AuthResponse = serde_json::from_str(
            r#"{"access_token":"a","refresh_token":"r","user_id":"u","is_authenticated":true}"#,
        )
        .unwrap();
        let tokens = SessionTokens::try_from(full).unwrap();
        assert_eq!(tokens.user_id, "u");

        let partial: AuthResponse =
            serde_json::from_str(r#"{"access_token":"a","refresh_token":null,"user_id":"u"}"#)
                .unwrap();
        assert!(matches!(
            SessionTokens::try_from(partial),
            Err(BackendError::Malformed(_))
        ));
    }

    #[test]
    fn post_parses_original_field_names() {
        let json = r#"{
            "post_id": "post001",
            "user_name": "Tanaka",
            "prefectures": "Osaka",
            "lat": 34.7024854,
            "lng": 135.4937621,
            "title": "Park cleanup",
            "IconURL": "https://img.example/i.png",
            "discription": "Trash everywhere",
            "tag_list": [{"name": "environment", "attribute": true}, {"name": "local", "attribute": false}],
            "distribution_reward": 300,
            "direct_reward": 100,
            "post_time": "2025-09-19T10:30:00Z",
            "post_limit": "2025-09-25T23:59:59Z",
            "achivement": "",
            "post_good": 15,
            "comment": [{
                "comment_id": "c1",
                "name": "Sato",
                "context": "Count me in",
                "comment_time": "2025-09-19T11:00:00Z",
                "post_id": "post001",
                "comment_good": 5
            }]
        }"#;
        let dto: PostDto = serde_json::from_str(json).unwrap();
        let post = Post::try_from(dto).unwrap();

        assert_eq!(post.id.as_str(), "post001");
        assert_eq!(post.total_reward(), 400);
        assert!(post.tags[0].is_main);
        assert!(post.achievement.is_none());
        assert_eq!(post.comments[0].like_count, 5);
    }

    #[test]
    fn post_with_bad_coordinates_is_rejected() {
        let json = r#"{"id":"p","lat":123.0,"lng":0.0,"title":"t","created_at":"2025-09-19T10:30:00Z"}"#;
        let dto: PostDto = serde_json::from_str(json).unwrap();
        assert!(matches!(Post::try_from(dto), Err(BackendError::Malformed(_))));
    }

    #[test]
    fn news_rejects_non_http_links() {
        let bad = NewsArticleDto {
            title: "t".into(),
            description: None,
            url: "javascript:alert(1)".into(),
            image: None,
            source: None,
            published_at: None,
        };
        assert!(NewsItem::try_from(bad).is_err());

        let good: NewsArticleDto = serde_json::from_str(
            r#"{"title":"Rain","url":"https://news.example/a","image":"not a url","source":{"name":"NHK"},"publishedAt":"2025-09-19T10:30:00Z"}"#,
        )
        .unwrap();
        let item = NewsItem::try_from(good).unwrap();
        assert!(item.image.is_none());
        assert_eq!(item.source_name(), "NHK");
        assert_eq!(item.description, "");
    }

    #[test]
    fn create_body_uses_backend_names() {
        let draft = PostDraft {
            title: "t".into(),
            description: "d".into(),
            icon_url: "i".into(),
            image_url: None,
            tags: vec![Tag::main("env")],
            location: LatLng::TOKYO_STATION,
            reward: crate::domain::split_reward(401, 0.5),
            deadline: None,
        };
        let v = serde_json::to_value(CreatePostBody::from(&draft)).unwrap();
        assert_eq!(v["discription"], "d");
        assert_eq!(v["IconURL"], "i");
        assert_eq!(v["distribution_reward"], 201);
        assert_eq!(v["direct_reward"], 200);
        assert_eq!(v["tag_list"][0]["attribute"], true);
        assert!(v.get("ImageURL").is_none());
    }
}
