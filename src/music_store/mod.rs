//! Catalog, ownership and like persistence.

mod error;
mod models;
pub mod schema;
mod sqlite_music_store;
mod trait_def;

pub use error::{MusicError, MusicResult};
pub use models::*;
pub use sqlite_music_store::SqliteMusicStore;
pub use trait_def::{AccountStore, CatalogStore, LikeLedger, MusicStore, OwnershipIndex};
