use serde::Serialize;

use super::error::{MusicError, MusicResult};

pub type AccountId = usize;
pub type CatalogEntryId = usize;

/// An internal account, created on first successful external login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: AccountId,
    pub external_id: String,
    pub display_name: String,
    /// Unix timestamp, seconds.
    pub created: i64,
}

/// The authenticated caller, carried explicitly through every operation that needs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountIdentity {
    pub account_id: AccountId,
    pub external_id: String,
    pub display_name: String,
}

impl From<&Account> for AccountIdentity {
    fn from(account: &Account) -> Self {
        AccountIdentity {
            account_id: account.id,
            external_id: account.external_id.clone(),
            display_name: account.display_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub id: CatalogEntryId,
    pub audio_location: String,
    pub title: String,
    pub duration_seconds: Option<u32>,
    pub thumbnail_location: Option<String>,
    pub created: i64,
}

/// A generated artifact that has not been cataloged yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewArtifact {
    pub audio_location: String,
    pub title: String,
    pub duration_seconds: Option<u32>,
    pub thumbnail_location: Option<String>,
}

impl NewArtifact {
    pub fn new<A: Into<String>, T: Into<String>>(audio_location: A, title: T) -> Self {
        NewArtifact {
            audio_location: audio_location.into(),
            title: title.into(),
            duration_seconds: None,
            thumbnail_location: None,
        }
    }

    pub fn with_thumbnail(mut self, thumbnail_location: Option<String>) -> Self {
        self.thumbnail_location = thumbnail_location;
        self
    }

    pub fn with_duration(mut self, duration_seconds: Option<u32>) -> Self {
        self.duration_seconds = duration_seconds;
        self
    }

    pub fn validate(&self) -> MusicResult<()> {
        if self.audio_location.trim().is_empty() {
            return Err(MusicError::InvalidArtifact(
                "audio location cannot be empty".to_string(),
            ));
        }
        if self.title.trim().is_empty() {
            return Err(MusicError::InvalidArtifact(
                "title cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ownership {
    pub id: usize,
    pub account_id: AccountId,
    pub catalog_entry_id: CatalogEntryId,
    pub created: i64,
}

/// An ownership row resolved to the catalog entry it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedEntry {
    pub ownership: Ownership,
    pub entry: CatalogEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Like {
    pub account_id: AccountId,
    pub catalog_entry_id: CatalogEntryId,
    pub created: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedEntry {
    pub entry: CatalogEntry,
    pub like_count: usize,
}

/// Result of persisting a generated artifact, with the ownership link when an owner was given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedArtifact {
    pub entry: CatalogEntry,
    pub ownership: Option<Ownership>,
}

/// What a cascading catalog delete removed along with the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeletedEntry {
    pub ownerships_removed: usize,
    pub likes_removed: usize,
}
