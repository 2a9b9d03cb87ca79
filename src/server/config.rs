use super::RequestsLoggingLevel;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub requests_logging_level: RequestsLoggingLevel,
    pub port: u16,
    pub metrics_port: u16,
    pub frontend_dir_path: Option<String>,
    /// `*` allows any origin.
    pub cors_origins: Vec<String>,
    /// Directory whose files are published under `media_base_url`, if any.
    pub media_dir: Option<PathBuf>,
    pub media_base_url: String,
    pub token_ttl_hours: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            requests_logging_level: RequestsLoggingLevel::Path,
            port: 3001,
            metrics_port: 9091,
            frontend_dir_path: None,
            cors_origins: vec!["*".to_string()],
            media_dir: None,
            media_base_url: "/media".to_string(),
            token_ttl_hours: 24,
        }
    }
}
