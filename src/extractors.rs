use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use crate::backend::SessionTokens;
use crate::config::AuthConfig;
use crate::error::{ApiError, AppError};
use crate::state::AppState;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";
pub const USER_ID_COOKIE: &str = "user_id";

/// The signed-in session, read from cookies.
/// Missing or empty cookies reject with 401 (or a redirect on page routes).
#[derive(Debug, Clone)]
pub struct Session(pub SessionTokens);

impl Session {
    pub fn tokens(&self) -> &SessionTokens {
        &self.0
    }

    pub fn user_id(&self) -> &str {
        &self.0.user_id
    }
}

impl FromRequestParts<AppState> for Session {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        session_from_parts(parts).map(Session).ok_or(AppError::Unauthorized)
    }
}

/// Same as [`Session`] but rejects with a JSON 401 for the page script.
pub struct ApiSession(pub Session);

impl FromRequestParts<AppState> for ApiSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        session_from_parts(parts)
            .map(|tokens| ApiSession(Session(tokens)))
            .ok_or(ApiError(AppError::Unauthorized))
    }
}

/// Optional session extractor: `None` instead of a rejection.
pub struct MaybeSession(pub Option<Session>);

impl FromRequestParts<AppState> for MaybeSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeSession(session_from_parts(parts).map(Session)))
    }
}

fn session_from_parts(parts: &Parts) -> Option<SessionTokens> {
    let value = |name: &str| {
        get_cookie_value(parts, name)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    Some(SessionTokens {
        access_token: value(ACCESS_TOKEN_COOKIE)?,
        refresh_token: value(REFRESH_TOKEN_COOKIE)?,
        user_id: value(USER_ID_COOKIE)?,
    })
}

pub fn get_cookie_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == name {
                Some(val)
            } else {
                None
            }
        })
}

// -- Cookie writers --

fn cookie(name: &str, value: &str, max_age_secs: u64, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!("{name}={value}; HttpOnly; SameSite=Lax; Path=/; Max-Age={max_age_secs}{secure}")
}

/// `Set-Cookie` values that persist a fresh session.
pub fn session_cookies(tokens: &SessionTokens, auth: &AuthConfig) -> [String; 3] {
    let max_age = auth.cookie_max_age_hours * 3600;
    [
        cookie(ACCESS_TOKEN_COOKIE, &tokens.access_token, max_age, auth.secure_cookies),
        cookie(REFRESH_TOKEN_COOKIE, &tokens.refresh_token, max_age, auth.secure_cookies),
        cookie(USER_ID_COOKIE, &tokens.user_id, max_age, auth.secure_cookies),
    ]
}

pub fn clear_session_cookies() -> [String; 3] {
    [ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE, USER_ID_COOKIE]
        .map(|name| cookie(name, "", 0, false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(cookie: &str) -> Parts {
        let (parts, _) = Request::builder()
            .header(header::COOKIE, cookie)
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    #[test]
    fn session_needs_all_three_cookies() {
        let full = parts("access_token=a; refresh_token=r; user_id=u");
        let tokens = session_from_parts(&full).unwrap();
        assert_eq!(tokens.access_token, "a");
        assert_eq!(tokens.user_id, "u");

        assert!(session_from_parts(&parts("access_token=a; user_id=u")).is_none());
        assert!(session_from_parts(&parts("access_token=; refresh_token=r; user_id=u")).is_none());
    }

    #[test]
    fn session_cookies_are_http_only_with_max_age() {
        let tokens = SessionTokens {
            access_token: "a".into(),
            refresh_token: "r".into(),
            user_id: "u".into(),
        };
        let auth = AuthConfig {
            secure_cookies: true,
            cookie_max_age_hours: 1,
        };
        let cookies = session_cookies(&tokens, &auth);
        assert_eq!(
            cookies[0],
            "access_token=a; HttpOnly; SameSite=Lax; Path=/; Max-Age=3600; Secure"
        );
        assert!(cookies[2].starts_with("user_id=u;"));
    }
}
