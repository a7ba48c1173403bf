// REST backend access - isolates every network side effect
pub mod dto;
pub mod fixtures;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::domain::{Comment, CommentId, NewsItem, Post, PostDraft, PostId, User};
use crate::map::LatLng;
use dto::{
    AuthResponse, CreateCommentBody, CreatePostBody, CredentialsBody, LocationBody,
    NewsArticleDto, PostDto, PostsResponse, ProfileDto, Reaction,
};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Not authenticated")]
    Unauthorized,

    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus { status: StatusCode, body: String },

    #[error("Malformed payload: {0}")]
    Malformed(String),
}

/// Identifiers persisted for the signed-in session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: String,
}

/// Everything the front needs from the backend.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<SessionTokens, BackendError>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<SessionTokens, BackendError>;

    async fn profile(&self, session: &SessionTokens) -> Result<User, BackendError>;

    async fn posts(&self, session: &SessionTokens) -> Result<Vec<Post>, BackendError>;

    async fn create_post(
        &self,
        session: &SessionTokens,
        draft: &PostDraft,
    ) -> Result<Post, BackendError>;

    async fn create_comment(
        &self,
        session: &SessionTokens,
        post_id: &PostId,
        body: &str,
    ) -> Result<Comment, BackendError>;

    async fn react_to_post(
        &self,
        session: &SessionTokens,
        post_id: &PostId,
    ) -> Result<Reaction, BackendError>;

    async fn react_to_comment(
        &self,
        session: &SessionTokens,
        comment_id: &CommentId,
    ) -> Result<Reaction, BackendError>;

    async fn news_near(&self, point: LatLng) -> Result<Vec<NewsItem>, BackendError>;
}

/// HTTP implementation over reqwest.
#[derive(Debug, Clone)]
pub struct BackendClient {
    base_url: String,
    http: Client,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, builder: RequestBuilder, session: &SessionTokens) -> RequestBuilder {
        builder.bearer_auth(&session.access_token)
    }

    async fn credentials(
        &self,
        path: &str,
        email: &str,
        password: &str,
    ) -> Result<SessionTokens, BackendError> {
        let body = CredentialsBody {
            email,
            password_hash: password,
        };
        let response = self.http.post(self.url(path)).json(&body).send().await?;
        let auth: AuthResponse = read_json(response).await?;
        SessionTokens::try_from(auth)
    }
}

/// Map status codes, then decode. 401 is its own variant so callers can bounce to login.
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(BackendError::Unauthorized);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(BackendError::UnexpectedStatus { status, body });
    }
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| BackendError::Malformed(e.to_string()))
}

#[async_trait]
impl Backend for BackendClient {
    async fn login(&self, email: &str, password: &str) -> Result<SessionTokens, BackendError> {
        self.credentials("/auth/login", email, password).await
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SessionTokens, BackendError> {
        self.credentials("/auth/sign-up", email, password).await
    }

    async fn profile(&self, session: &SessionTokens) -> Result<User, BackendError> {
        let request = self.http.get(self.url(&format!("/profile/{}", session.user_id)));
        let response = self.authed(request, session).send().await?;
        let profile: ProfileDto = read_json(response).await?;
        Ok(profile.into())
    }

    async fn posts(&self, session: &SessionTokens) -> Result<Vec<Post>, BackendError> {
        let request = self.http.get(self.url("/posts"));
        let response = self.authed(request, session).send().await?;
        let body: PostsResponse = read_json(response).await?;

        // One bad post should not blank the whole map.
        let mut posts = Vec::with_capacity(body.posts.len());
        for dto in body.posts {
            match Post::try_from(dto) {
                Ok(post) => posts.push(post),
                Err(e) => tracing::warn!("Skipping post from backend: {}", e),
            }
        }
        Ok(posts)
    }

    async fn create_post(
        &self,
        session: &SessionTokens,
        draft: &PostDraft,
    ) -> Result<Post, BackendError> {
        let request = self
            .http
            .post(self.url("/posts"))
            .json(&CreatePostBody::from(draft));
        let response = self.authed(request, session).send().await?;
        let created: PostDto = read_json(response).await?;
        Post::try_from(created)
    }

    async fn create_comment(
        &self,
        session: &SessionTokens,
        post_id: &PostId,
        body: &str,
    ) -> Result<Comment, BackendError> {
        let request = self.http.post(self.url("/comment")).json(&CreateCommentBody {
            post_id: post_id.as_str(),
            context: body,
        });
        let response = self.authed(request, session).send().await?;
        let created: dto::CommentDto = read_json(response).await?;
        Comment::try_from(created)
    }

    async fn react_to_post(
        &self,
        session: &SessionTokens,
        post_id: &PostId,
    ) -> Result<Reaction, BackendError> {
        let request = self
            .http
            .post(self.url(&format!("/reaction/post/{}", post_id)));
        let response = self.authed(request, session).send().await?;
        read_json(response).await
    }

    async fn react_to_comment(
        &self,
        session: &SessionTokens,
        comment_id: &CommentId,
    ) -> Result<Reaction, BackendError> {
        let request = self
            .http
            .post(self.url(&format!("/reaction/comment/{}", comment_id)));
        let response = self.authed(request, session).send().await?;
        read_json(response).await
    }

    async fn news_near(&self, point: LatLng) -> Result<Vec<NewsItem>, BackendError> {
        let response = self
            .http
            .post(self.url("/news/get-news-by-location"))
            .json(&LocationBody {
                latitude: point.lat,
                longitude: point.lng,
            })
            .send()
            .await?;
        let articles: Vec<NewsArticleDto> = read_json(response).await?;

        let mut items = Vec::with_capacity(articles.len());
        for article in articles {
            match NewsItem::try_from(article) {
                Ok(item) => items.push(item),
                Err(e) => tracing::warn!("Dropping news item: {}", e),
            }
        }
        Ok(items)
    }
}
