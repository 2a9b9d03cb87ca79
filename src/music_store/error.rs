use thiserror::Error;

use super::models::{AccountId, CatalogEntryId};

/// Failure kinds surfaced by every catalog, ownership, like and generation operation.
#[derive(Debug, Error)]
pub enum MusicError {
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("Invalid artifact: {0}")]
    InvalidArtifact(String),

    #[error("Catalog entry {0} not found")]
    EntryNotFound(CatalogEntryId),

    #[error("Account {0} not found")]
    AccountNotFound(AccountId),

    #[error("Account {account_id} has no ownership of catalog entry {catalog_entry_id}")]
    OwnershipNotFound {
        account_id: AccountId,
        catalog_entry_id: CatalogEntryId,
    },

    #[error("Account {account_id} already liked catalog entry {catalog_entry_id}")]
    DuplicateLike {
        account_id: AccountId,
        catalog_entry_id: CatalogEntryId,
    },

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Synthesis failed: {0}")]
    SynthesisFailed(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

impl MusicError {
    /// Stable machine-readable code, used in API error payloads.
    pub fn code(&self) -> &'static str {
        match self {
            MusicError::InvalidIdentity(_) => "INVALID_IDENTITY",
            MusicError::InvalidArtifact(_) => "INVALID_ARTIFACT",
            MusicError::EntryNotFound(_) => "ENTRY_NOT_FOUND",
            MusicError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            MusicError::OwnershipNotFound { .. } => "OWNERSHIP_NOT_FOUND",
            MusicError::DuplicateLike { .. } => "DUPLICATE_LIKE",
            MusicError::GenerationFailed(_) => "GENERATION_FAILED",
            MusicError::SynthesisFailed(_) => "SYNTHESIS_FAILED",
            MusicError::ExternalServiceError(_) => "EXTERNAL_SERVICE_ERROR",
            MusicError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
        }
    }
}

impl From<rusqlite::Error> for MusicError {
    fn from(err: rusqlite::Error) -> Self {
        MusicError::StoreUnavailable(err.to_string())
    }
}

pub type MusicResult<T> = Result<T, MusicError>;
