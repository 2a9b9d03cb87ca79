mod api_response;
mod auth_routes;
pub mod config;
mod http_layers;
pub mod metrics;
mod music_routes;
#[allow(clippy::module_inception)]
pub mod server;
mod session;
pub mod state;

pub use api_response::ApiResponse;
pub use config::ServerConfig;
pub use http_layers::*;
pub use music_routes::MAX_IMAGE_BYTES;
pub use server::{make_app, run_server};
pub use session::{Session, COOKIE_SESSION_TOKEN_KEY};
pub use state::ServerState;
