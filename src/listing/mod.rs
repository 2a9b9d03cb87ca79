//! Ordered views over the catalog: recent, popular and a single account's collection.

use crate::music_store::{
    AccountId, AccountIdentity, CatalogEntry, CatalogEntryId, MusicError, MusicResult, MusicStore,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingLimits {
    pub recent_default: usize,
    pub popular_default: usize,
    pub collection_default: usize,
    pub max_limit: usize,
}

impl Default for ListingLimits {
    fn default() -> Self {
        ListingLimits {
            recent_default: 5,
            popular_default: 5,
            collection_default: 10,
            max_limit: 100,
        }
    }
}

impl ListingLimits {
    /// An explicit zero lists nothing.
    fn clamp(&self, requested: Option<usize>, default: usize) -> usize {
        requested.unwrap_or(default).min(self.max_limit)
    }
}

fn format_created(created: i64) -> String {
    chrono::DateTime::from_timestamp(created, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default()
}

/// A catalog entry as presented to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedEntry {
    pub id: CatalogEntryId,
    pub title: String,
    pub music_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    pub created_at: String,
    pub like_count: usize,
    /// Only present when the listing was requested by an authenticated viewer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pressed: Option<bool>,
}

impl ListedEntry {
    fn new(entry: CatalogEntry, like_count: usize, pressed: Option<bool>) -> Self {
        ListedEntry {
            id: entry.id,
            title: entry.title,
            music_url: entry.audio_location,
            duration_seconds: entry.duration_seconds,
            thumbnail_url: entry.thumbnail_location,
            created_at: format_created(entry.created),
            like_count,
            pressed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MusicList {
    pub music_list: Vec<ListedEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub name: String,
    pub music_list: Vec<ListedEntry>,
}

pub struct ListingService {
    store: Arc<dyn MusicStore>,
    limits: ListingLimits,
}

impl ListingService {
    pub fn new(store: Arc<dyn MusicStore>, limits: ListingLimits) -> Self {
        ListingService { store, limits }
    }

    fn pressed_by(
        &self,
        viewer: Option<&AccountIdentity>,
        entry_id: CatalogEntryId,
    ) -> MusicResult<Option<bool>> {
        match viewer {
            Some(viewer) => Ok(Some(self.store.has_liked(viewer.account_id, entry_id)?)),
            None => Ok(None),
        }
    }

    /// Newest entries first.
    pub fn recent(
        &self,
        limit: Option<usize>,
        viewer: Option<&AccountIdentity>,
    ) -> MusicResult<MusicList> {
        let limit = self.limits.clamp(limit, self.limits.recent_default);
        let entries = self.store.list_recent(limit)?;
        debug!("Listing {} recent entries", entries.len());

        let mut music_list = Vec::with_capacity(entries.len());
        for entry in entries {
            let like_count = self.store.count_for(entry.id)?;
            let pressed = self.pressed_by(viewer, entry.id)?;
            music_list.push(ListedEntry::new(entry, like_count, pressed));
        }
        Ok(MusicList { music_list })
    }

    /// Most liked first. Unliked entries still rank, so only an empty catalog or a zero limit lists nothing.
    pub fn popular(
        &self,
        limit: Option<usize>,
        viewer: Option<&AccountIdentity>,
    ) -> MusicResult<MusicList> {
        let limit = self.limits.clamp(limit, self.limits.popular_default);
        let ranked = self.store.list_popular(limit)?;
        debug!("Listing {} popular entries", ranked.len());

        let mut music_list = Vec::with_capacity(ranked.len());
        for ranked_entry in ranked {
            let pressed = self.pressed_by(viewer, ranked_entry.entry.id)?;
            music_list.push(ListedEntry::new(
                ranked_entry.entry,
                ranked_entry.like_count,
                pressed,
            ));
        }
        Ok(MusicList { music_list })
    }

    pub fn my_collection(
        &self,
        account_id: AccountId,
        limit: Option<usize>,
    ) -> MusicResult<Collection> {
        let account = self
            .store
            .get_account(account_id)?
            .ok_or(MusicError::AccountNotFound(account_id))?;
        let limit = self.limits.clamp(limit, self.limits.collection_default);
        let owned = self.store.list_owned(account_id, limit)?;

        let mut music_list = Vec::with_capacity(owned.len());
        for owned_entry in owned {
            let entry = owned_entry.entry;
            let like_count = self.store.count_for(entry.id)?;
            let pressed = self.store.has_liked(account_id, entry.id)?;
            music_list.push(ListedEntry::new(entry, like_count, Some(pressed)));
        }
        Ok(Collection {
            name: account.display_name,
            music_list,
        })
    }

    /// A single entry with its like count.
    pub fn entry(
        &self,
        entry_id: CatalogEntryId,
        viewer: Option<&AccountIdentity>,
    ) -> MusicResult<ListedEntry> {
        let entry = self
            .store
            .get_entry(entry_id)?
            .ok_or(MusicError::EntryNotFound(entry_id))?;
        let like_count = self.store.count_for(entry_id)?;
        let pressed = self.pressed_by(viewer, entry_id)?;
        Ok(ListedEntry::new(entry, like_count, pressed))
    }
}
