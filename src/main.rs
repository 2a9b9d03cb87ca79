use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::{fmt::Debug, path::PathBuf};
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use genmusic_server::config;
use genmusic_server::generation::GenerationOrchestrator;
use genmusic_server::identity::{IdentityResolver, TokenIssuer};
use genmusic_server::listing::ListingService;
use genmusic_server::music_store::{AccountStore, CatalogStore, MusicStore, SqliteMusicStore};
use genmusic_server::providers::{
    HttpSynthesisClient, IdentityProvider, LocalBlobStorage, OAuthClient,
    PlaceholderSynthesisProvider, SynthesisProvider,
};
use genmusic_server::server::{metrics, run_server, RequestsLoggingLevel, ServerConfig, ServerState};

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

fn parse_dir(s: &str) -> Result<PathBuf, String> {
    let path = parse_path(s)?;
    if !path.exists() {
        return Err(format!("Directory does not exist: {}", s));
    }
    if !path.is_dir() {
        return Err(format!("Path is not a directory: {}", s));
    }
    Ok(path)
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory containing the music.db database file.
    /// Can also be specified in config file.
    #[clap(long, value_parser = parse_dir)]
    pub db_dir: Option<PathBuf>,

    /// Directory where uploaded images are stored. Defaults to <db-dir>/media.
    #[clap(long, value_parser = parse_path)]
    pub media_dir: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,

    /// Allowed CORS origin, may be repeated. Defaults to any origin.
    #[clap(long = "cors-origin")]
    pub cors_origins: Vec<String>,

    /// URL of the music synthesis service. Without it, placeholder audio locations are generated.
    #[clap(long, env = "SYNTHESIS_URL")]
    pub synthesis_url: Option<String>,

    /// Timeout in seconds for synthesis requests.
    #[clap(long, default_value_t = 30)]
    pub synthesis_timeout_sec: u64,

    /// Secret used to sign bearer tokens.
    #[clap(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Lifetime of issued bearer tokens, in hours.
    #[clap(long, default_value_t = 24)]
    pub token_ttl_hours: u64,

    /// OAuth client id of the identity provider.
    #[clap(long, env = "OAUTH_CLIENT_ID")]
    pub oauth_client_id: Option<String>,

    /// OAuth client secret of the identity provider.
    #[clap(long, env = "OAUTH_CLIENT_SECRET", hide_env_values = true)]
    pub oauth_client_secret: Option<String>,

    /// Redirect URI registered with the identity provider.
    #[clap(long, env = "OAUTH_REDIRECT_URI")]
    pub oauth_redirect_uri: Option<String>,
}

/// Convert CLI args to CliConfig for config resolution
impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            db_dir: args.db_dir.clone(),
            port: args.port,
            metrics_port: args.metrics_port,
            logging_level: args.logging_level.clone(),
            frontend_dir_path: args.frontend_dir_path.clone(),
            cors_origins: args.cors_origins.clone(),
            synthesis_url: args.synthesis_url.clone(),
            synthesis_timeout_sec: args.synthesis_timeout_sec,
            jwt_secret: args.jwt_secret.clone(),
            token_ttl_hours: args.token_ttl_hours,
            oauth_client_id: args.oauth_client_id.clone(),
            oauth_client_secret: args.oauth_client_secret.clone(),
            oauth_redirect_uri: args.oauth_redirect_uri.clone(),
            media_dir: args.media_dir.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    info!("  db_dir: {:?}", app_config.db_dir);
    info!("  media dir: {:?}", app_config.blob.root_dir);
    info!("  port: {}", app_config.port);

    if !app_config.music_db_path().exists() {
        info!(
            "Creating new music database at {:?}",
            app_config.music_db_path()
        );
    }
    let store = Arc::new(SqliteMusicStore::new(app_config.music_db_path())?);

    info!("Initializing metrics...");
    metrics::init_metrics();
    metrics::set_catalog_counts(store.count_accounts()?, store.count_entries()?);

    let synthesis: Arc<dyn SynthesisProvider> = match &app_config.synthesis_url {
        Some(url) => {
            info!("Synthesis service configured at {}", url);
            Arc::new(HttpSynthesisClient::new(
                url,
                app_config.synthesis_timeout_sec,
            )?)
        }
        None => {
            warn!("No synthesis service configured, generating placeholder audio locations");
            Arc::new(PlaceholderSynthesisProvider)
        }
    };

    let identity_provider: Option<Arc<dyn IdentityProvider>> = match &app_config.oauth {
        Some(oauth) => {
            info!("Identity provider configured, token endpoint {}", oauth.token_url);
            Some(Arc::new(OAuthClient::new(oauth.clone())?))
        }
        None => {
            warn!("No identity provider configured, logins are disabled");
            None
        }
    };

    std::fs::create_dir_all(&app_config.blob.root_dir).with_context(|| {
        format!(
            "Failed to create media directory {:?}",
            app_config.blob.root_dir
        )
    })?;
    let blobs = Arc::new(LocalBlobStorage::new(
        &app_config.blob.root_dir,
        &app_config.blob.public_base_url,
    ));

    let music_store: Arc<dyn MusicStore> = store;
    let identity = Arc::new(IdentityResolver::new(
        music_store.clone(),
        identity_provider,
        TokenIssuer::new(&app_config.jwt_secret, app_config.token_ttl_hours),
    ));
    let orchestrator = Arc::new(GenerationOrchestrator::new(
        music_store.clone(),
        synthesis,
        blobs,
    ));
    let listing = Arc::new(ListingService::new(
        music_store.clone(),
        app_config.listing,
    ));

    let server_config = ServerConfig {
        requests_logging_level: app_config.logging_level.clone(),
        port: app_config.port,
        metrics_port: app_config.metrics_port,
        frontend_dir_path: app_config.frontend_dir_path.clone(),
        cors_origins: app_config.cors_origins.clone(),
        media_dir: Some(app_config.blob.root_dir.clone()),
        media_base_url: app_config.blob.public_base_url.clone(),
        token_ttl_hours: app_config.token_ttl_hours,
    };
    let state = ServerState::new(server_config, music_store, identity, orchestrator, listing);

    run_server(state).await
}
