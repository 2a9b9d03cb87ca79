use super::api_response::failure;
use super::state::ServerState;
use crate::music_store::{AccountId, AccountIdentity};

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{request::Parts, StatusCode},
    response::IntoResponse,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{debug, warn};

/// The authenticated caller of a request.
#[derive(Debug, Clone)]
pub struct Session {
    pub identity: AccountIdentity,
    pub token: String,
}

impl Session {
    pub fn account_id(&self) -> AccountId {
        self.identity.account_id
    }
}

pub const COOKIE_SESSION_TOKEN_KEY: &str = "session_token";
pub const HEADER_SESSION_TOKEN_KEY: &str = "Authorization";

#[derive(Debug)]
pub enum SessionExtractionError {
    MissingCredentials,
    InvalidCredentials(String),
}

impl IntoResponse for SessionExtractionError {
    fn into_response(self) -> axum::response::Response {
        let message = match self {
            SessionExtractionError::MissingCredentials => "Missing credentials".to_string(),
            SessionExtractionError::InvalidCredentials(reason) => reason,
        };
        failure(StatusCode::UNAUTHORIZED, "INVALID_IDENTITY", message)
    }
}

fn extract_session_token_from_cookies(parts: &Parts) -> Option<String> {
    CookieJar::from_headers(&parts.headers)
        .get(COOKIE_SESSION_TOKEN_KEY)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
}

/// Accepts both `Bearer <token>` and a bare token.
fn extract_session_token_from_headers(parts: &Parts) -> Option<String> {
    let value = parts.headers.get(HEADER_SESSION_TOKEN_KEY)?.to_str().ok()?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .unwrap_or(value)
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

fn extract_session_from_request_parts(
    parts: &Parts,
    ctx: &ServerState,
) -> Result<Session, SessionExtractionError> {
    let token = extract_session_token_from_headers(parts)
        .or_else(|| extract_session_token_from_cookies(parts))
        .ok_or_else(|| {
            debug!("No token in headers nor cookies.");
            SessionExtractionError::MissingCredentials
        })?;

    match ctx.identity.authenticate(&token) {
        Ok(identity) => {
            debug!("Authenticated account_id={}", identity.account_id);
            Ok(Session { identity, token })
        }
        Err(err) => Err(SessionExtractionError::InvalidCredentials(err.to_string())),
    }
}

impl FromRequestParts<ServerState> for Session {
    type Rejection = SessionExtractionError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        extract_session_from_request_parts(parts, ctx).inspect_err(|err| {
            if let SessionExtractionError::InvalidCredentials(reason) = err {
                warn!("Rejected credentials: {}", reason);
            }
        })
    }
}

/// Optional sessions never reject: bad credentials make the request anonymous.
impl OptionalFromRequestParts<ServerState> for Session {
    type Rejection = SessionExtractionError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &ServerState,
    ) -> Result<Option<Self>, Self::Rejection> {
        match extract_session_from_request_parts(parts, ctx) {
            Ok(session) => Ok(Some(session)),
            Err(SessionExtractionError::MissingCredentials) => Ok(None),
            Err(SessionExtractionError::InvalidCredentials(reason)) => {
                warn!("Ignoring invalid credentials, continuing anonymously: {}", reason);
                Ok(None)
            }
        }
    }
}
