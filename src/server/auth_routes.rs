//! Login callback and account profile routes.

use super::api_response::ok;
use super::metrics::record_login_attempt;
use super::session::{Session, COOKIE_SESSION_TOKEN_KEY};
use super::state::{GuardedMusicStore, ServerState};
use crate::music_store::{Account, AccountId, MusicError};
use axum::{
    extract::{Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

#[derive(Deserialize, Debug)]
pub struct CallbackParams {
    pub code: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginSuccessResponse {
    access_token: String,
    token_type: &'static str,
    expires_at: i64,
    account_id: AccountId,
    name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AccountProfile {
    id: AccountId,
    external_id: String,
    name: String,
    created_at: String,
}

impl From<Account> for AccountProfile {
    fn from(account: Account) -> Self {
        AccountProfile {
            id: account.id,
            external_id: account.external_id,
            name: account.display_name,
            created_at: chrono::DateTime::from_timestamp(account.created, 0)
                .map(|dt| dt.to_rfc3339())
                .unwrap_or_default(),
        }
    }
}

async fn oauth_callback(
    State(state): State<ServerState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    let code = params.code.unwrap_or_default();
    let outcome = match state.identity.login_with_code(&code).await {
        Ok(outcome) => outcome,
        Err(err) => {
            record_login_attempt("failure");
            return err.into_response();
        }
    };
    record_login_attempt("success");
    info!("Issued token for account {}", outcome.account.id);

    let max_age = state.config.token_ttl_hours.saturating_mul(3600);
    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        COOKIE_SESSION_TOKEN_KEY, outcome.token.access_token, max_age
    );
    let body = LoginSuccessResponse {
        access_token: outcome.token.access_token,
        token_type: outcome.token.token_type,
        expires_at: outcome.token.expires_at,
        account_id: outcome.account.id,
        name: outcome.account.display_name,
    };

    let mut response = ok(body);
    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            response.headers_mut().insert(header::SET_COOKIE, value);
        }
        Err(err) => error!("Could not build session cookie: {}", err),
    }
    response
}

async fn get_me(session: Session, State(store): State<GuardedMusicStore>) -> Response {
    let account_id = session.account_id();
    match store.get_account(account_id) {
        Ok(Some(account)) => ok(AccountProfile::from(account)),
        Ok(None) => MusicError::AccountNotFound(account_id).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn make_auth_routes(state: ServerState) -> Router {
    Router::new()
        .route("/callback", get(oauth_callback))
        .with_state(state)
}

pub fn make_account_routes(state: ServerState) -> Router {
    Router::new().route("/me", get(get_me)).with_state(state)
}
