//! OAuth2 authorization-code client for the external identity provider.

use crate::config::OAuthSettings;
use crate::music_store::{MusicError, MusicResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// The subset of the provider's user profile the catalog cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalProfile {
    pub external_id: String,
    pub display_name: String,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Exchanges an authorization code for the provider's access token.
    async fn exchange_code(&self, code: &str) -> MusicResult<String>;

    /// Fetches the profile of the user the access token was issued for.
    async fn fetch_profile(&self, access_token: &str) -> MusicResult<ExternalProfile>;
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct UserInfoResponse {
    id: Option<String>,
    sub: Option<String>,
    name: Option<String>,
    email: Option<String>,
}

fn external_error(context: &str, err: impl std::fmt::Display) -> MusicError {
    warn!("{}: {}", context, err);
    MusicError::ExternalServiceError(format!("{}: {}", context, err))
}

pub struct OAuthClient {
    client: reqwest::Client,
    settings: OAuthSettings,
}

impl OAuthClient {
    pub fn new(settings: OAuthSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_sec))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client, settings })
    }
}

#[async_trait]
impl IdentityProvider for OAuthClient {
    async fn exchange_code(&self, code: &str) -> MusicResult<String> {
        debug!("Exchanging authorization code at {}", self.settings.token_url);
        let response = self
            .client
            .post(&self.settings.token_url)
            .form(&[
                ("code", code),
                ("client_id", self.settings.client_id.as_str()),
                ("client_secret", self.settings.client_secret.as_str()),
                ("redirect_uri", self.settings.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| external_error("Token request failed", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(external_error(
                "Token exchange rejected",
                format!("status {}: {}", status, body),
            ));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| external_error("Invalid token response", e))?;
        Ok(token.access_token)
    }

    async fn fetch_profile(&self, access_token: &str) -> MusicResult<ExternalProfile> {
        let response = self
            .client
            .get(&self.settings.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| external_error("Profile request failed", e))?;

        if !response.status().is_success() {
            return Err(external_error(
                "Profile request rejected",
                format!("status {}", response.status()),
            ));
        }

        let info: UserInfoResponse = response
            .json()
            .await
            .map_err(|e| external_error("Invalid profile response", e))?;

        let external_id = info
            .id
            .or(info.sub)
            .ok_or_else(|| external_error("Invalid profile response", "no user id"))?;
        let display_name = info.name.or(info.email).unwrap_or_default();
        Ok(ExternalProfile {
            external_id,
            display_name,
        })
    }
}
