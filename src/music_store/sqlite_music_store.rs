use super::error::{MusicError, MusicResult};
use super::models::*;
use super::schema::{
    ACCOUNT_TABLE, CATALOG_ENTRY_TABLE, ENTRY_LIKE_TABLE, OWNERSHIP_TABLE, VERSIONED_SCHEMAS,
};
use super::trait_def::{AccountStore, CatalogStore, LikeLedger, OwnershipIndex};
use crate::sqlite_persistence::open_versioned;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// Columns of `catalog_entry` in the order `entry_from_row` reads them.
const ENTRY_COLUMNS: &str = "e.id, e.audio_location, e.title, e.duration_seconds, e.thumbnail_location, e.created";

fn entry_from_row(row: &Row, offset: usize) -> rusqlite::Result<CatalogEntry> {
    Ok(CatalogEntry {
        id: row.get(offset)?,
        audio_location: row.get(offset + 1)?,
        title: row.get(offset + 2)?,
        duration_seconds: row.get(offset + 3)?,
        thumbnail_location: row.get(offset + 4)?,
        created: row.get(offset + 5)?,
    })
}

fn account_from_row(row: &Row) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        external_id: row.get(1)?,
        display_name: row.get(2)?,
        created: row.get(3)?,
    })
}

fn ownership_from_row(row: &Row) -> rusqlite::Result<Ownership> {
    Ok(Ownership {
        id: row.get(0)?,
        account_id: row.get(1)?,
        catalog_entry_id: row.get(2)?,
        created: row.get(3)?,
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn account_exists(conn: &Connection, account_id: AccountId) -> rusqlite::Result<bool> {
    conn.query_row(
        &format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1)", ACCOUNT_TABLE),
        params![account_id],
        |row| row.get(0),
    )
}

fn entry_exists(conn: &Connection, entry_id: CatalogEntryId) -> rusqlite::Result<bool> {
    conn.query_row(
        &format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1)",
            CATALOG_ENTRY_TABLE
        ),
        params![entry_id],
        |row| row.get(0),
    )
}

fn query_entry(conn: &Connection, entry_id: CatalogEntryId) -> rusqlite::Result<Option<CatalogEntry>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM {} e WHERE e.id = ?1",
            ENTRY_COLUMNS, CATALOG_ENTRY_TABLE
        ),
        params![entry_id],
        |row| entry_from_row(row, 0),
    )
    .optional()
}

/// Inserts the ownership link unless it already exists, then returns the stored row.
fn link_ownership(
    conn: &Connection,
    account_id: AccountId,
    entry_id: CatalogEntryId,
) -> rusqlite::Result<Ownership> {
    let inserted = conn.execute(
        &format!(
            "INSERT INTO {} (account_id, catalog_entry_id) VALUES (?1, ?2)
             ON CONFLICT(account_id, catalog_entry_id) DO NOTHING",
            OWNERSHIP_TABLE
        ),
        params![account_id, entry_id],
    )?;
    if inserted == 0 {
        debug!(
            "Ownership of entry {} by account {} already present",
            entry_id, account_id
        );
    }
    conn.query_row(
        &format!(
            "SELECT id, account_id, catalog_entry_id, created FROM {}
             WHERE account_id = ?1 AND catalog_entry_id = ?2",
            OWNERSHIP_TABLE
        ),
        params![account_id, entry_id],
        ownership_from_row,
    )
}

#[derive(Clone)]
pub struct SqliteMusicStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteMusicStore {
    pub fn new<T: AsRef<Path>>(db_path: T) -> Result<Self> {
        let conn = open_versioned(db_path, VERSIONED_SCHEMAS)?;
        Ok(SqliteMusicStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> MusicResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| MusicError::StoreUnavailable("database connection lock poisoned".into()))
    }
}

impl AccountStore for SqliteMusicStore {
    fn resolve_account(&self, external_id: &str, display_name: &str) -> MusicResult<Account> {
        if external_id.trim().is_empty() {
            return Err(MusicError::InvalidIdentity(
                "external id cannot be empty".to_string(),
            ));
        }
        if display_name.trim().is_empty() {
            return Err(MusicError::InvalidIdentity(
                "display name cannot be empty".to_string(),
            ));
        }

        let conn = self.lock()?;
        let created = conn.execute(
            &format!(
                "INSERT INTO {} (external_id, display_name) VALUES (?1, ?2)
                 ON CONFLICT(external_id) DO NOTHING",
                ACCOUNT_TABLE
            ),
            params![external_id, display_name],
        )?;
        let account = conn.query_row(
            &format!(
                "SELECT id, external_id, display_name, created FROM {} WHERE external_id = ?1",
                ACCOUNT_TABLE
            ),
            params![external_id],
            account_from_row,
        )?;
        if created > 0 {
            info!(
                "Created account {} for external id {}",
                account.id, external_id
            );
        }
        Ok(account)
    }

    fn get_account(&self, account_id: AccountId) -> MusicResult<Option<Account>> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                &format!(
                    "SELECT id, external_id, display_name, created FROM {} WHERE id = ?1",
                    ACCOUNT_TABLE
                ),
                params![account_id],
                account_from_row,
            )
            .optional()?)
    }

    fn count_accounts(&self) -> MusicResult<usize> {
        let conn = self.lock()?;
        Ok(conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", ACCOUNT_TABLE),
            [],
            |row| row.get(0),
        )?)
    }
}

impl CatalogStore for SqliteMusicStore {
    fn persist_artifact(
        &self,
        artifact: &NewArtifact,
        owner: Option<AccountId>,
    ) -> MusicResult<PersistedArtifact> {
        artifact.validate()?;

        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(
            &format!(
                "INSERT INTO {} (audio_location, title, duration_seconds, thumbnail_location)
                 VALUES (?1, ?2, ?3, ?4)",
                CATALOG_ENTRY_TABLE
            ),
            params![
                artifact.audio_location,
                artifact.title,
                artifact.duration_seconds,
                artifact.thumbnail_location
            ],
        )?;
        let entry_id = tx.last_insert_rowid() as CatalogEntryId;

        // Returning early drops the transaction, which rolls the entry back.
        let ownership = match owner {
            Some(account_id) => {
                if !account_exists(&tx, account_id)? {
                    return Err(MusicError::AccountNotFound(account_id));
                }
                Some(link_ownership(&tx, account_id, entry_id)?)
            }
            None => None,
        };

        let entry = query_entry(&tx, entry_id)?.ok_or_else(|| {
            MusicError::StoreUnavailable(format!("entry {} vanished before commit", entry_id))
        })?;
        tx.commit()?;

        info!(
            "Cataloged entry {} \"{}\" (owner: {:?})",
            entry.id, entry.title, owner
        );
        Ok(PersistedArtifact { entry, ownership })
    }

    fn get_entry(&self, id: CatalogEntryId) -> MusicResult<Option<CatalogEntry>> {
        let conn = self.lock()?;
        Ok(query_entry(&conn, id)?)
    }

    fn list_recent(&self, limit: usize) -> MusicResult<Vec<CatalogEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM {} e ORDER BY e.created DESC, e.id DESC LIMIT ?1",
            ENTRY_COLUMNS, CATALOG_ENTRY_TABLE
        ))?;
        let entries = stmt
            .query_map(params![limit], |row| entry_from_row(row, 0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn delete_entry(&self, id: CatalogEntryId) -> MusicResult<DeletedEntry> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if !entry_exists(&tx, id)? {
            return Err(MusicError::EntryNotFound(id));
        }
        let ownerships_removed = tx.execute(
            &format!("DELETE FROM {} WHERE catalog_entry_id = ?1", OWNERSHIP_TABLE),
            params![id],
        )?;
        let likes_removed = tx.execute(
            &format!("DELETE FROM {} WHERE catalog_entry_id = ?1", ENTRY_LIKE_TABLE),
            params![id],
        )?;
        tx.execute(
            &format!("DELETE FROM {} WHERE id = ?1", CATALOG_ENTRY_TABLE),
            params![id],
        )?;
        tx.commit()?;

        info!(
            "Deleted entry {} with {} ownerships and {} likes",
            id, ownerships_removed, likes_removed
        );
        Ok(DeletedEntry {
            ownerships_removed,
            likes_removed,
        })
    }

    fn count_entries(&self) -> MusicResult<usize> {
        let conn = self.lock()?;
        Ok(conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", CATALOG_ENTRY_TABLE),
            [],
            |row| row.get(0),
        )?)
    }
}

impl OwnershipIndex for SqliteMusicStore {
    fn add_ownership(
        &self,
        account_id: AccountId,
        catalog_entry_id: CatalogEntryId,
    ) -> MusicResult<Ownership> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if !entry_exists(&tx, catalog_entry_id)? {
            return Err(MusicError::EntryNotFound(catalog_entry_id));
        }
        if !account_exists(&tx, account_id)? {
            return Err(MusicError::AccountNotFound(account_id));
        }
        let ownership = link_ownership(&tx, account_id, catalog_entry_id)?;
        tx.commit()?;
        Ok(ownership)
    }

    fn remove_ownership(
        &self,
        account_id: AccountId,
        catalog_entry_id: CatalogEntryId,
    ) -> MusicResult<()> {
        let conn = self.lock()?;
        let removed = conn.execute(
            &format!(
                "DELETE FROM {} WHERE account_id = ?1 AND catalog_entry_id = ?2",
                OWNERSHIP_TABLE
            ),
            params![account_id, catalog_entry_id],
        )?;
        if removed == 0 {
            return Err(MusicError::OwnershipNotFound {
                account_id,
                catalog_entry_id,
            });
        }
        debug!(
            "Removed entry {} from collection of account {}",
            catalog_entry_id, account_id
        );
        Ok(())
    }

    fn list_owned(&self, account_id: AccountId, limit: usize) -> MusicResult<Vec<OwnedEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT o.id, o.account_id, o.catalog_entry_id, o.created, {}
             FROM {} o JOIN {} e ON e.id = o.catalog_entry_id
             WHERE o.account_id = ?1
             ORDER BY o.created DESC, o.id DESC
             LIMIT ?2",
            ENTRY_COLUMNS, OWNERSHIP_TABLE, CATALOG_ENTRY_TABLE
        ))?;
        let owned = stmt
            .query_map(params![account_id, limit], |row| {
                Ok(OwnedEntry {
                    ownership: ownership_from_row(row)?,
                    entry: entry_from_row(row, 4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(owned)
    }
}

impl LikeLedger for SqliteMusicStore {
    fn like(&self, account_id: AccountId, catalog_entry_id: CatalogEntryId) -> MusicResult<Like> {
        let conn = self.lock()?;
        if !entry_exists(&conn, catalog_entry_id)? {
            return Err(MusicError::EntryNotFound(catalog_entry_id));
        }
        if !account_exists(&conn, account_id)? {
            return Err(MusicError::AccountNotFound(account_id));
        }

        match conn.execute(
            &format!(
                "INSERT INTO {} (account_id, catalog_entry_id) VALUES (?1, ?2)",
                ENTRY_LIKE_TABLE
            ),
            params![account_id, catalog_entry_id],
        ) {
            Ok(_) => {}
            Err(err) if is_unique_violation(&err) => {
                return Err(MusicError::DuplicateLike {
                    account_id,
                    catalog_entry_id,
                })
            }
            Err(err) => return Err(err.into()),
        }

        let created = conn.query_row(
            &format!("SELECT created FROM {} WHERE id = ?1", ENTRY_LIKE_TABLE),
            params![conn.last_insert_rowid()],
            |row| row.get(0),
        )?;
        Ok(Like {
            account_id,
            catalog_entry_id,
            created,
        })
    }

    fn unlike(
        &self,
        account_id: AccountId,
        catalog_entry_id: CatalogEntryId,
    ) -> MusicResult<bool> {
        let conn = self.lock()?;
        let removed = conn.execute(
            &format!(
                "DELETE FROM {} WHERE account_id = ?1 AND catalog_entry_id = ?2",
                ENTRY_LIKE_TABLE
            ),
            params![account_id, catalog_entry_id],
        )?;
        Ok(removed > 0)
    }

    fn count_for(&self, catalog_entry_id: CatalogEntryId) -> MusicResult<usize> {
        let conn = self.lock()?;
        Ok(conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {} WHERE catalog_entry_id = ?1",
                ENTRY_LIKE_TABLE
            ),
            params![catalog_entry_id],
            |row| row.get(0),
        )?)
    }

    fn has_liked(
        &self,
        account_id: AccountId,
        catalog_entry_id: CatalogEntryId,
    ) -> MusicResult<bool> {
        let conn = self.lock()?;
        Ok(conn.query_row(
            &format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE account_id = ?1 AND catalog_entry_id = ?2)",
                ENTRY_LIKE_TABLE
            ),
            params![account_id, catalog_entry_id],
            |row| row.get(0),
        )?)
    }

    fn list_popular(&self, limit: usize) -> MusicResult<Vec<RankedEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {}, COUNT(l.id) AS like_count
             FROM {} e LEFT JOIN {} l ON l.catalog_entry_id = e.id
             GROUP BY e.id
             ORDER BY like_count DESC, e.created DESC, e.id DESC
             LIMIT ?1",
            ENTRY_COLUMNS, CATALOG_ENTRY_TABLE, ENTRY_LIKE_TABLE
        ))?;
        let ranked = stmt
            .query_map(params![limit], |row| {
                Ok(RankedEntry {
                    entry: entry_from_row(row, 0)?,
                    like_count: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ranked)
    }
}
