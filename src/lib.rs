//! Generated-music catalog server library
//!
//! This library exposes the internal modules for the binaries and the end-to-end tests.

pub mod config;
pub mod generation;
pub mod identity;
pub mod listing;
pub mod music_store;
pub mod providers;
pub mod server;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use generation::GenerationOrchestrator;
pub use identity::{IdentityResolver, TokenIssuer};
pub use listing::{ListingLimits, ListingService};
pub use music_store::{MusicError, MusicResult, MusicStore, SqliteMusicStore};
pub use server::{run_server, RequestsLoggingLevel};
