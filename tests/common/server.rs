//! Test server lifecycle management
//!
//! Each test gets an isolated server with its own database and media directory.

use super::constants::*;
use super::fixtures::FakeIdentityProvider;
use genmusic_server::generation::GenerationOrchestrator;
use genmusic_server::identity::{IdentityResolver, TokenIssuer};
use genmusic_server::listing::{ListingLimits, ListingService};
use genmusic_server::music_store::{AccountStore, MusicStore, SqliteMusicStore};
use genmusic_server::providers::{LocalBlobStorage, PlaceholderSynthesisProvider};
use genmusic_server::server::{
    server::make_app, RequestsLoggingLevel, ServerConfig, ServerState,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Test server instance with an isolated database
///
/// When dropped, the server gracefully shuts down and temp resources are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// Store for direct database access in tests
    pub store: Arc<dyn MusicStore>,

    _temp_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a new test server on a random port, backed by the placeholder
    /// synthesis provider and the fake identity provider.
    ///
    /// # Panics
    ///
    /// Panics if the database cannot be created, the port cannot be bound,
    /// or the server doesn't become ready within the timeout.
    pub async fn spawn() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let media_dir = temp_dir.path().join("media");
        std::fs::create_dir_all(&media_dir).expect("Failed to create media dir");

        let store: Arc<dyn MusicStore> = Arc::new(
            SqliteMusicStore::new(temp_dir.path().join("music.db"))
                .expect("Failed to open music store"),
        );

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            media_dir: Some(media_dir.clone()),
            ..Default::default()
        };
        let identity = Arc::new(IdentityResolver::new(
            store.clone(),
            Some(Arc::new(FakeIdentityProvider)),
            TokenIssuer::new(TEST_JWT_SECRET, config.token_ttl_hours),
        ));
        let orchestrator = Arc::new(GenerationOrchestrator::new(
            store.clone(),
            Arc::new(PlaceholderSynthesisProvider),
            Arc::new(LocalBlobStorage::new(&media_dir, &config.media_base_url)),
        ));
        let listing = Arc::new(ListingService::new(store.clone(), ListingLimits::default()));
        let state = ServerState::new(config, store.clone(), identity, orchestrator, listing);

        let app = make_app(state).expect("Failed to build app");

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            store,
            _temp_dir: temp_dir,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Mints a bearer token for an account created directly in the store,
    /// bypassing the login flow.
    pub fn token_for(&self, external_id: &str, display_name: &str) -> String {
        let account = self
            .store
            .resolve_account(external_id, display_name)
            .expect("Failed to create account");
        TokenIssuer::new(TEST_JWT_SECRET, 24)
            .issue(&account)
            .expect("Failed to issue token")
            .access_token
    }

    /// Waits for the server to become ready by polling the home endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
