mod file_config;

pub use file_config::{BlobConfig, FileConfig, ListingConfig, OAuthConfig};

use crate::listing::ListingLimits;
use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;

pub const DEFAULT_OAUTH_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_OAUTH_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
pub const DEFAULT_MEDIA_BASE_URL: &str = "/media";

/// Values taken from the command line (and its env fallbacks), before the TOML
/// file is applied on top.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub cors_origins: Vec<String>,
    pub synthesis_url: Option<String>,
    pub synthesis_timeout_sec: u64,
    pub jwt_secret: Option<String>,
    pub token_ttl_hours: u64,
    pub oauth_client_id: Option<String>,
    pub oauth_client_secret: Option<String>,
    pub oauth_redirect_uri: Option<String>,
    pub media_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_dir: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub cors_origins: Vec<String>,
    /// None means generations use the placeholder provider.
    pub synthesis_url: Option<String>,
    pub synthesis_timeout_sec: u64,
    pub jwt_secret: String,
    pub token_ttl_hours: u64,

    /// None when no identity provider is configured; logins then fail.
    pub oauth: Option<OAuthSettings>,
    pub blob: BlobSettings,
    pub listing: ListingLimits,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthSettings {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub timeout_sec: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobSettings {
    pub root_dir: PathBuf,
    pub public_base_url: String,
}

impl AppConfig {
    /// Merges the command line with the optional TOML file. A value present in the
    /// file wins over the command line one.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = existing_dir(file.db_dir.map(PathBuf::from).or_else(|| cli.db_dir.clone()))?;
        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);
        let logging_level = match file.logging_level.as_deref() {
            Some(level) => logging_level_from(level)?,
            None => cli.logging_level.clone(),
        };
        let frontend_dir_path = file.frontend_dir_path.or(cli.frontend_dir_path.clone());

        let mut cors_origins = file
            .cors_origins
            .unwrap_or_else(|| cli.cors_origins.clone());
        if cors_origins.is_empty() {
            cors_origins.push("*".to_string());
        }

        let synthesis_url = file
            .synthesis_url
            .or_else(|| cli.synthesis_url.clone())
            .filter(|url| !url.trim().is_empty());
        let synthesis_timeout_sec = file
            .synthesis_timeout_sec
            .unwrap_or(cli.synthesis_timeout_sec);
        if synthesis_timeout_sec == 0 {
            bail!("synthesis_timeout_sec must be greater than zero");
        }

        let jwt_secret = file
            .jwt_secret
            .or_else(|| cli.jwt_secret.clone())
            .unwrap_or_default();
        if jwt_secret.trim().is_empty() {
            bail!("jwt_secret must be specified via --jwt-secret, JWT_SECRET or in config file");
        }
        let token_ttl_hours = file.token_ttl_hours.unwrap_or(cli.token_ttl_hours);
        if token_ttl_hours == 0 {
            bail!("token_ttl_hours must be greater than zero");
        }

        let oauth = resolve_oauth(cli, file.oauth.unwrap_or_default())?;

        let blob_file = file.blob.unwrap_or_default();
        let blob = BlobSettings {
            root_dir: blob_file
                .root_dir
                .map(PathBuf::from)
                .or_else(|| cli.media_dir.clone())
                .unwrap_or_else(|| db_dir.join("media")),
            public_base_url: blob_file
                .public_base_url
                .unwrap_or_else(|| DEFAULT_MEDIA_BASE_URL.to_string()),
        };

        let listing_file = file.listing.unwrap_or_default();
        let defaults = ListingLimits::default();
        let listing = ListingLimits {
            recent_default: listing_file.recent_limit.unwrap_or(defaults.recent_default),
            popular_default: listing_file
                .popular_limit
                .unwrap_or(defaults.popular_default),
            collection_default: listing_file
                .collection_limit
                .unwrap_or(defaults.collection_default),
            max_limit: listing_file.max_limit.unwrap_or(defaults.max_limit),
        };
        if listing.recent_default == 0
            || listing.popular_default == 0
            || listing.collection_default == 0
            || listing.max_limit == 0
        {
            bail!("Listing limits must be greater than zero");
        }

        Ok(Self {
            db_dir,
            port,
            metrics_port,
            logging_level,
            frontend_dir_path,
            cors_origins,
            synthesis_url,
            synthesis_timeout_sec,
            jwt_secret,
            token_ttl_hours,
            oauth,
            blob,
            listing,
        })
    }

    pub fn music_db_path(&self) -> PathBuf {
        self.db_dir.join("music.db")
    }
}

/// The client id, secret and redirect URI must all be present, or none of them.
fn resolve_oauth(cli: &CliConfig, file: OAuthConfig) -> Result<Option<OAuthSettings>> {
    let client_id = file.client_id.or_else(|| cli.oauth_client_id.clone());
    let client_secret = file
        .client_secret
        .or_else(|| cli.oauth_client_secret.clone());
    let redirect_uri = file
        .redirect_uri
        .or_else(|| cli.oauth_redirect_uri.clone());

    match (client_id, client_secret, redirect_uri) {
        (None, None, None) => Ok(None),
        (Some(client_id), Some(client_secret), Some(redirect_uri)) => {
            let timeout_sec = file.timeout_sec.unwrap_or(10);
            if timeout_sec == 0 {
                bail!("oauth timeout_sec must be greater than zero");
            }
            Ok(Some(OAuthSettings {
                client_id,
                client_secret,
                redirect_uri,
                token_url: file
                    .token_url
                    .unwrap_or_else(|| DEFAULT_OAUTH_TOKEN_URL.to_string()),
                userinfo_url: file
                    .userinfo_url
                    .unwrap_or_else(|| DEFAULT_OAUTH_USERINFO_URL.to_string()),
                timeout_sec,
            }))
        }
        _ => bail!("OAuth client id, client secret and redirect uri must be provided together"),
    }
}

fn existing_dir(db_dir: Option<PathBuf>) -> Result<PathBuf> {
    let Some(db_dir) = db_dir else {
        bail!("No database directory given, pass --db-dir or set db_dir in the config file");
    };
    match std::fs::metadata(&db_dir) {
        Ok(meta) if meta.is_dir() => Ok(db_dir),
        Ok(_) => bail!("Database path {:?} is not a directory", db_dir),
        Err(err) => bail!("Database directory {:?} is not accessible: {}", db_dir, err),
    }
}

/// Case-insensitive, using the same names the `--logging-level` flag accepts.
fn logging_level_from(value: &str) -> Result<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(value, true)
        .map_err(|_| anyhow::anyhow!("Unknown logging_level {:?} in config file", value))
}
