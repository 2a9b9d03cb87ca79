//! HTTP client for end-to-end tests
//!
//! Wraps reqwest and provides one method per server endpoint.
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::multipart::{Form, Part};
use reqwest::Response;
use serde_json::json;
use std::time::Duration;

/// HTTP test client with cookie-based session management
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
    /// Bearer token sent instead of relying on the session cookie
    bearer: Option<String>,
}

#[allow(dead_code)]
impl TestClient {
    /// Creates a new unauthenticated client
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self {
            client,
            base_url,
            bearer: None,
        }
    }

    /// Creates a client whose requests carry the given bearer token
    pub fn with_token(base_url: String, token: String) -> Self {
        let mut client = Self::new(base_url);
        client.bearer = Some(token);
        client
    }

    /// Creates a client logged in as the regular test user through the callback
    ///
    /// # Panics
    ///
    /// Panics if login fails (indicates test infrastructure problem).
    pub async fn authenticated(base_url: String) -> Self {
        Self::authenticated_with_code(base_url, TEST_USER_CODE).await
    }

    /// Creates a client logged in as the second test user
    pub async fn authenticated_other(base_url: String) -> Self {
        Self::authenticated_with_code(base_url, OTHER_USER_CODE).await
    }

    async fn authenticated_with_code(base_url: String, code: &str) -> Self {
        let client = Self::new(base_url);

        let response = client.login(code).await;
        assert_eq!(
            response.status(),
            reqwest::StatusCode::OK,
            "Test user authentication failed: {:?}",
            response.text().await
        );

        client
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.authorize(self.client.get(format!("{}{}", self.base_url, path)))
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.authorize(self.client.post(format!("{}{}", self.base_url, path)))
    }

    fn delete(&self, path: &str) -> reqwest::RequestBuilder {
        self.authorize(self.client.delete(format!("{}{}", self.base_url, path)))
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn limit_query(limit: Option<usize>) -> String {
        limit.map(|l| format!("?limit={}", l)).unwrap_or_default()
    }

    // ========================================================================
    // Authentication Endpoints
    // ========================================================================

    /// GET /v1/auth/callback?code=...
    pub async fn login(&self, code: &str) -> Response {
        self.get(&format!("/v1/auth/callback?code={}", code))
            .send()
            .await
            .expect("Login request failed")
    }

    /// GET /v1/auth/callback without a code
    pub async fn login_without_code(&self) -> Response {
        self.get("/v1/auth/callback")
            .send()
            .await
            .expect("Login request failed")
    }

    /// GET /v1/me
    pub async fn get_me(&self) -> Response {
        self.get("/v1/me").send().await.expect("Me request failed")
    }

    // ========================================================================
    // Generation Endpoints
    // ========================================================================

    /// POST /v1/generate-music
    pub async fn generate(&self, prompt1: &str, prompt2: Option<&str>) -> Response {
        self.post("/v1/generate-music")
            .json(&json!({ "prompt1": prompt1, "prompt2": prompt2 }))
            .send()
            .await
            .expect("Generate request failed")
    }

    /// POST /v1/generate-music/image
    pub async fn generate_from_image(&self, file_name: &str, bytes: Vec<u8>) -> Response {
        let part = Part::bytes(bytes).file_name(file_name.to_string());
        let form = Form::new().part("image", part);
        self.post("/v1/generate-music/image")
            .multipart(form)
            .send()
            .await
            .expect("Image generate request failed")
    }

    // ========================================================================
    // Listing Endpoints
    // ========================================================================

    /// GET /v1/playlist
    pub async fn get_recent(&self, limit: Option<usize>) -> Response {
        self.get(&format!("/v1/playlist{}", Self::limit_query(limit)))
            .send()
            .await
            .expect("Recent request failed")
    }

    /// GET /v1/popular-playlist
    pub async fn get_popular(&self, limit: Option<usize>) -> Response {
        self.get(&format!("/v1/popular-playlist{}", Self::limit_query(limit)))
            .send()
            .await
            .expect("Popular request failed")
    }

    /// GET /v1/myplaylist
    pub async fn get_my_playlist(&self) -> Response {
        self.get("/v1/myplaylist")
            .send()
            .await
            .expect("My playlist request failed")
    }

    /// GET /v1/music/{id}
    pub async fn get_music(&self, id: usize) -> Response {
        self.get(&format!("/v1/music/{}", id))
            .send()
            .await
            .expect("Music request failed")
    }

    /// DELETE /v1/music/{id}
    pub async fn remove_from_playlist(&self, id: usize) -> Response {
        self.delete(&format!("/v1/music/{}", id))
            .send()
            .await
            .expect("Remove request failed")
    }

    // ========================================================================
    // Like Endpoints
    // ========================================================================

    /// POST /v1/music/{id}/like
    pub async fn like(&self, id: usize) -> Response {
        self.post(&format!("/v1/music/{}/like", id))
            .send()
            .await
            .expect("Like request failed")
    }

    /// DELETE /v1/music/{id}/like
    pub async fn unlike(&self, id: usize) -> Response {
        self.delete(&format!("/v1/music/{}/like", id))
            .send()
            .await
            .expect("Unlike request failed")
    }

    // ========================================================================
    // System Endpoints
    // ========================================================================

    /// GET /status
    pub async fn get_status(&self) -> Response {
        self.get("/status").send().await.expect("Status request failed")
    }

    /// GET an arbitrary path relative to the server root
    pub async fn get_path(&self, path: &str) -> Response {
        self.get(path).send().await.expect("Request failed")
    }
}
