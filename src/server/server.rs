use anyhow::{Context, Result};
use std::time::Duration;

use tracing::{error, info};

use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;

use axum::{
    extract::State,
    http::HeaderValue,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;

#[cfg(feature = "slowdown")]
use super::slowdown_request;
use super::api_response::ok;
use super::auth_routes::{make_account_routes, make_auth_routes};
use super::metrics::{metrics_handler, set_catalog_counts};
use super::music_routes::make_music_routes;
use super::session::Session;
use super::{log_requests, state::*};

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_name: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ServerStatus {
    uptime: String,
    hash: String,
    synthesis_provider: String,
    accounts: usize,
    catalog_entries: usize,
}

#[derive(Serialize)]
struct HealthReport {
    status: &'static str,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(session: Option<Session>, State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
        account_name: session.map(|s| s.identity.display_name),
    };
    Json(stats)
}

async fn health(State(store): State<GuardedMusicStore>) -> Response {
    match store.count_entries() {
        Ok(_) => ok(HealthReport { status: "ok" }),
        Err(err) => err.into_response(),
    }
}

async fn status(State(state): State<ServerState>) -> Response {
    let counts = state
        .music_store
        .count_accounts()
        .and_then(|accounts| Ok((accounts, state.music_store.count_entries()?)));
    match counts {
        Ok((accounts, catalog_entries)) => {
            set_catalog_counts(accounts, catalog_entries);
            ok(ServerStatus {
                uptime: format_uptime(state.start_time.elapsed()),
                hash: state.hash.clone(),
                synthesis_provider: state.orchestrator.provider_name().to_string(),
                accounts,
                catalog_entries,
            })
        }
        Err(err) => err.into_response(),
    }
}

fn make_cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                error!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

pub fn make_app(state: ServerState) -> Result<Router> {
    let config = state.config.clone();

    let v1_routes: Router = Router::new()
        .merge(make_account_routes(state.clone()))
        .merge(make_music_routes(state.clone()))
        .nest("/auth", make_auth_routes(state.clone()));

    let home_router: Router = match &config.frontend_dir_path {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new()
            .route("/", get(home))
            .with_state(state.clone()),
    };

    let system_routes: Router = Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .with_state(state.clone());

    let mut app: Router = home_router.merge(system_routes).nest("/v1", v1_routes);

    if let Some(media_dir) = &config.media_dir {
        if config.media_base_url.starts_with('/') {
            app = app.nest_service(&config.media_base_url, ServeDir::new(media_dir));
        }
    }

    #[cfg(feature = "slowdown")]
    {
        app = app.layer(middleware::from_fn(slowdown_request));
    }
    app = app
        .layer(middleware::from_fn_with_state(state.clone(), log_requests))
        .layer(make_cors_layer(&config.cors_origins));

    Ok(app)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

pub async fn run_server(state: ServerState) -> Result<()> {
    let port = state.config.port;
    let metrics_port = state.config.metrics_port;
    let app = make_app(state)?;

    let metrics_app = Router::new().route("/metrics", get(metrics_handler));
    let metrics_listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", metrics_port))
        .await
        .with_context(|| format!("Failed to bind metrics port {}", metrics_port))?;
    tokio::spawn(async move {
        if let Err(err) = axum::serve(metrics_listener, metrics_app).await {
            error!("Metrics server stopped: {}", err);
        }
    });

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("Ready to serve at port {}!", port);
    info!("Metrics available at port {}!", metrics_port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::GenerationOrchestrator;
    use crate::identity::{IdentityResolver, TokenIssuer};
    use crate::listing::{ListingLimits, ListingService};
    use crate::music_store::{AccountStore, CatalogStore, SqliteMusicStore};
    use crate::providers::{LocalBlobStorage, PlaceholderSynthesisProvider};
    use crate::server::{RequestsLoggingLevel, ServerConfig};
    use axum::{body::Body, http::Request, http::StatusCode};
    use serde_json::Value;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt; // for `oneshot`

    const TEST_SECRET: &str = "server-test-secret";
    const PNG_BYTES: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

    struct TestApp {
        app: Router,
        store: Arc<SqliteMusicStore>,
        _temp_dir: TempDir,
    }

    impl TestApp {
        fn new() -> Self {
            let temp_dir = TempDir::new().unwrap();
            let store = Arc::new(SqliteMusicStore::new(temp_dir.path().join("music.db")).unwrap());
            let media_dir = temp_dir.path().join("media");
            let config = ServerConfig {
                requests_logging_level: RequestsLoggingLevel::None,
                media_dir: Some(media_dir.clone()),
                ..Default::default()
            };
            let identity = Arc::new(IdentityResolver::new(
                store.clone(),
                None,
                TokenIssuer::new(TEST_SECRET, 24),
            ));
            let orchestrator = Arc::new(GenerationOrchestrator::new(
                store.clone(),
                Arc::new(PlaceholderSynthesisProvider),
                Arc::new(LocalBlobStorage::new(media_dir, &config.media_base_url)),
            ));
            let listing = Arc::new(ListingService::new(store.clone(), ListingLimits::default()));
            let state = ServerState::new(config, store.clone(), identity, orchestrator, listing);
            TestApp {
                app: make_app(state).unwrap(),
                store,
                _temp_dir: temp_dir,
            }
        }

        fn token_for(&self, external_id: &str, name: &str) -> String {
            let account = self.store.resolve_account(external_id, name).unwrap();
            TokenIssuer::new(TEST_SECRET, 24)
                .issue(&account)
                .unwrap()
                .access_token
        }

        async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
            let response = self.app.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, json)
        }
    }

    fn request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    fn generate_request(token: Option<&str>, prompt1: &str, prompt2: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/v1/generate-music")
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let body = serde_json::json!({ "prompt1": prompt1, "prompt2": prompt2 });
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn image_request(token: Option<&str>, field: &str, bytes: &[u8]) -> Request<Body> {
        let boundary = "genmusic-test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{b}\r\nContent-Disposition: form-data; name=\"{f}\"; filename=\"sea.png\"\r\nContent-Type: image/png\r\n\r\n",
                b = boundary,
                f = field
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

        let mut builder = Request::builder()
            .method("POST")
            .uri("/v1/generate-music/image")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", boundary),
            );
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        builder.body(Body::from(body)).unwrap()
    }

    #[tokio::test]
    async fn responds_unauthorized_on_protected_routes() {
        let test_app = TestApp::new();

        let protected_routes = vec![
            ("GET", "/v1/me"),
            ("GET", "/v1/myplaylist"),
            ("DELETE", "/v1/music/1"),
            ("POST", "/v1/music/1/like"),
            ("DELETE", "/v1/music/1/like"),
        ];

        for (method, route) in protected_routes.into_iter() {
            let (status, body) = test_app.send(request(method, route, None)).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{} {}", method, route);
            assert_eq!(body["success"], false);

            let (status, _) = test_app
                .send(request(method, route, Some("garbage")))
                .await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{} {}", method, route);
        }
    }

    #[tokio::test]
    async fn optional_routes_ignore_invalid_credentials() {
        let test_app = TestApp::new();

        let (status, body) = test_app
            .send(request("GET", "/v1/playlist", Some("garbage")))
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["musicList"], Value::Array(vec![]));
    }

    #[tokio::test]
    async fn home_health_and_status() {
        let test_app = TestApp::new();
        let token = test_app.token_for("g-1", "Alice");

        let (status, body) = test_app.send(request("GET", "/", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["account_name"], "Alice");

        let (status, body) = test_app.send(request("GET", "/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "ok");

        let (status, body) = test_app.send(request("GET", "/status", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["accounts"], 1);
        assert_eq!(body["data"]["catalogEntries"], 0);
        assert_eq!(body["data"]["synthesisProvider"], "placeholder");
    }

    #[tokio::test]
    async fn authenticated_generation_lands_in_my_playlist() {
        let test_app = TestApp::new();
        let token = test_app.token_for("g-1", "Alice");

        let (status, body) = test_app
            .send(generate_request(Some(&token), "rainy night", None))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["title"], "rainy night");
        assert_eq!(body["data"]["savedToCollection"], true);
        assert_eq!(
            body["data"]["musicUrl"],
            "https://example.com/fake_music_rainy_night.mp3"
        );

        let (status, body) = test_app
            .send(request("GET", "/v1/myplaylist", Some(&token)))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "Alice");
        assert_eq!(body["data"]["musicList"][0]["title"], "rainy night");
    }

    #[tokio::test]
    async fn anonymous_generation_is_cataloged_without_owner() {
        let test_app = TestApp::new();

        let (status, body) = test_app
            .send(generate_request(None, "rainy night", Some("lofi beats")))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["title"], "lofi beats");
        assert_eq!(body["data"]["savedToCollection"], false);

        let (_, body) = test_app.send(request("GET", "/v1/playlist", None)).await;
        assert_eq!(body["data"]["musicList"].as_array().unwrap().len(), 1);
        assert!(body["data"]["musicList"][0].get("pressed").is_none());
    }

    #[tokio::test]
    async fn empty_prompt_is_bad_request() {
        let test_app = TestApp::new();

        let (status, body) = test_app.send(generate_request(None, " ", None)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errorCode"], "INVALID_ARTIFACT");
    }

    #[tokio::test]
    async fn malformed_requests_get_error_envelope() {
        let test_app = TestApp::new();
        let token = test_app.token_for("g-1", "Alice");

        let missing_prompt = Request::builder()
            .method("POST")
            .uri("/v1/generate-music")
            .header("content-type", "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let not_json = Request::builder()
            .method("POST")
            .uri("/v1/generate-music")
            .body(Body::from("prompt1=sea"))
            .unwrap();
        let requests = vec![
            missing_prompt,
            not_json,
            request("GET", "/v1/music/abc", None),
            request("POST", "/v1/music/abc/like", Some(&token)),
            request("GET", "/v1/playlist?limit=-1", None),
            request("GET", "/v1/popular-playlist?limit=many", None),
            request("GET", "/v1/myplaylist?limit=-1", Some(&token)),
        ];

        for request in requests.into_iter() {
            let uri = request.uri().to_string();
            let (status, body) = test_app.send(request).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
            assert_eq!(body["success"], false, "{}", uri);
            assert_eq!(body["status"], 400, "{}", uri);
            assert_eq!(body["errorCode"], "INVALID_ARTIFACT", "{}", uri);
        }
        assert_eq!(test_app.store.count_entries().unwrap(), 0);
    }

    #[tokio::test]
    async fn zero_limit_lists_nothing() {
        let test_app = TestApp::new();
        test_app.send(generate_request(None, "song", None)).await;

        let (status, body) = test_app
            .send(request("GET", "/v1/playlist?limit=0", None))
            .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["musicList"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn like_twice_is_conflict_and_unlike_is_idempotent() {
        let test_app = TestApp::new();
        let alice = test_app.token_for("g-1", "Alice");
        let bob = test_app.token_for("g-2", "Bob");
        let (_, body) = test_app.send(generate_request(None, "song", None)).await;
        let id = body["data"]["id"].as_u64().unwrap();
        let like_uri = format!("/v1/music/{}/like", id);

        let (status, body) = test_app.send(request("POST", &like_uri, Some(&alice))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["likeCount"], 1);
        let (status, body) = test_app.send(request("POST", &like_uri, Some(&bob))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["likeCount"], 2);

        let (status, body) = test_app.send(request("POST", &like_uri, Some(&alice))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["errorCode"], "DUPLICATE_LIKE");

        let (_, body) = test_app
            .send(request("GET", &format!("/v1/music/{}", id), Some(&alice)))
            .await;
        assert_eq!(body["data"]["likeCount"], 2);
        assert_eq!(body["data"]["pressed"], true);

        for _ in 0..2 {
            let (status, body) = test_app
                .send(request("DELETE", &like_uri, Some(&alice)))
                .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["data"]["likeCount"], 1);
        }
    }

    #[tokio::test]
    async fn liking_missing_entry_is_not_found() {
        let test_app = TestApp::new();
        let token = test_app.token_for("g-1", "Alice");

        let (status, body) = test_app
            .send(request("POST", "/v1/music/999/like", Some(&token)))
            .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["errorCode"], "ENTRY_NOT_FOUND");
    }

    #[tokio::test]
    async fn removing_from_playlist_keeps_catalog_entry() {
        let test_app = TestApp::new();
        let token = test_app.token_for("g-1", "Alice");
        let (_, body) = test_app
            .send(generate_request(Some(&token), "keep me", None))
            .await;
        let uri = format!("/v1/music/{}", body["data"]["id"]);

        let (status, _) = test_app.send(request("DELETE", &uri, Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = test_app.send(request("DELETE", &uri, Some(&token))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["errorCode"], "OWNERSHIP_NOT_FOUND");

        let (status, _) = test_app.send(request("GET", &uri, None)).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = test_app
            .send(request("GET", "/v1/myplaylist", Some(&token)))
            .await;
        assert_eq!(body["data"]["musicList"], Value::Array(vec![]));
    }

    #[tokio::test]
    async fn image_generation_stores_thumbnail() {
        let test_app = TestApp::new();
        let token = test_app.token_for("g-1", "Alice");

        let (status, body) = test_app
            .send(image_request(Some(&token), "image", PNG_BYTES))
            .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["title"], "Music generated from sea.png");
        let thumbnail = body["data"]["thumbnailUrl"].as_str().unwrap().to_string();
        assert!(thumbnail.starts_with("/media/images/"));

        let response = test_app
            .app
            .clone()
            .oneshot(request("GET", &thumbnail, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn image_generation_rejects_bad_uploads() {
        let test_app = TestApp::new();

        let (status, body) = test_app
            .send(image_request(None, "image", b"plain text, not an image"))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errorCode"], "INVALID_ARTIFACT");

        let (status, _) = test_app
            .send(image_request(None, "attachment", PNG_BYTES))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn login_callback_without_code_or_provider() {
        let test_app = TestApp::new();

        let (status, _) = test_app
            .send(request("GET", "/v1/auth/callback", None))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = test_app
            .send(request("GET", "/v1/auth/callback?code=abc", None))
            .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["errorCode"], "EXTERNAL_SERVICE_ERROR");
    }

    #[tokio::test]
    async fn me_reports_missing_account() {
        let test_app = TestApp::new();
        let ghost = crate::music_store::Account {
            id: 77,
            external_id: "ghost".to_string(),
            display_name: "Ghost".to_string(),
            created: 0,
        };
        let token = TokenIssuer::new(TEST_SECRET, 24)
            .issue(&ghost)
            .unwrap()
            .access_token;

        let (status, body) = test_app.send(request("GET", "/v1/me", Some(&token))).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["errorCode"], "ACCOUNT_NOT_FOUND");
    }

    #[test]
    fn formats_uptime() {
        assert_eq!(format_uptime(Duration::from_secs(0)), "0d 00:00:00");
        assert_eq!(
            format_uptime(Duration::from_secs(86_400 + 3600 + 61)),
            "1d 01:01:01"
        );
    }
}
