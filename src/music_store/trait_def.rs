use super::error::MusicResult;
use super::models::{
    Account, AccountId, CatalogEntry, CatalogEntryId, DeletedEntry, Like, NewArtifact, OwnedEntry,
    Ownership, PersistedArtifact, RankedEntry,
};

pub trait AccountStore: Send + Sync {
    /// Returns the account bound to `external_id`, creating it on first sight.
    /// An existing account is returned unchanged, its display name is never updated.
    /// Fails with InvalidIdentity if either argument is empty.
    fn resolve_account(&self, external_id: &str, display_name: &str) -> MusicResult<Account>;

    /// Returns Ok(None) if the account does not exist.
    fn get_account(&self, account_id: AccountId) -> MusicResult<Option<Account>>;

    fn count_accounts(&self) -> MusicResult<usize>;
}

pub trait CatalogStore: Send + Sync {
    /// Persists a new catalog entry and, when `owner` is given, links it into that
    /// account's collection. Both writes commit together or not at all.
    /// Fails with AccountNotFound (and persists nothing) if the owner does not exist.
    fn persist_artifact(
        &self,
        artifact: &NewArtifact,
        owner: Option<AccountId>,
    ) -> MusicResult<PersistedArtifact>;

    fn create_entry(&self, artifact: &NewArtifact) -> MusicResult<CatalogEntry> {
        Ok(self.persist_artifact(artifact, None)?.entry)
    }

    /// Returns Ok(None) if the entry does not exist.
    fn get_entry(&self, id: CatalogEntryId) -> MusicResult<Option<CatalogEntry>>;

    /// Newest first.
    fn list_recent(&self, limit: usize) -> MusicResult<Vec<CatalogEntry>>;

    /// Removes every ownership and like row referencing the entry, then the entry itself.
    /// Fails with EntryNotFound if there is no such entry.
    fn delete_entry(&self, id: CatalogEntryId) -> MusicResult<DeletedEntry>;

    fn count_entries(&self) -> MusicResult<usize>;
}

pub trait OwnershipIndex: Send + Sync {
    /// Links the entry into the account's collection. If the link already exists the
    /// existing row is returned and nothing is written.
    fn add_ownership(
        &self,
        account_id: AccountId,
        catalog_entry_id: CatalogEntryId,
    ) -> MusicResult<Ownership>;

    /// Fails with OwnershipNotFound if there is no such link.
    fn remove_ownership(
        &self,
        account_id: AccountId,
        catalog_entry_id: CatalogEntryId,
    ) -> MusicResult<()>;

    /// Most recently linked first.
    fn list_owned(&self, account_id: AccountId, limit: usize) -> MusicResult<Vec<OwnedEntry>>;
}

pub trait LikeLedger: Send + Sync {
    /// Fails with EntryNotFound if the entry does not exist and with DuplicateLike
    /// if the account already liked it.
    fn like(&self, account_id: AccountId, catalog_entry_id: CatalogEntryId) -> MusicResult<Like>;

    /// Succeeds whether or not a like existed. Returns true if a row was removed.
    fn unlike(&self, account_id: AccountId, catalog_entry_id: CatalogEntryId)
        -> MusicResult<bool>;

    fn count_for(&self, catalog_entry_id: CatalogEntryId) -> MusicResult<usize>;

    fn has_liked(&self, account_id: AccountId, catalog_entry_id: CatalogEntryId)
        -> MusicResult<bool>;

    /// Entries ordered by like count, then newest first. Entries without likes are included.
    fn list_popular(&self, limit: usize) -> MusicResult<Vec<RankedEntry>>;
}

/// Convenience trait bundling every store capability behind one trait object.
pub trait MusicStore: AccountStore + CatalogStore + OwnershipIndex + LikeLedger {}

impl<T: AccountStore + CatalogStore + OwnershipIndex + LikeLedger> MusicStore for T {}
