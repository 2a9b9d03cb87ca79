use crate::sqlite_column;
use crate::sqlite_persistence::{
    ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP,
};
use rusqlite::Connection;

const ACCOUNT_FK: ForeignKey = ForeignKey {
    foreign_table: "account",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

// Catalog entries can only go away through the explicit cascade in `delete_entry`,
// the database refuses a delete that would leave references behind.
const CATALOG_ENTRY_FK: ForeignKey = ForeignKey {
    foreign_table: "catalog_entry",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Restrict,
};

/// V 0
pub const ACCOUNT_TABLE_V_0: Table = Table {
    name: "account",
    columns: &[
        sqlite_column!("id", SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "external_id",
            SqlType::Text,
            non_null = true,
            is_unique = true
        ),
        sqlite_column!("display_name", SqlType::Text, non_null = true),
        sqlite_column!(
            "created",
            SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[],
    unique_constraints: &[],
};

const CATALOG_ENTRY_TABLE_V_0: Table = Table {
    name: "catalog_entry",
    columns: &[
        sqlite_column!("id", SqlType::Integer, is_primary_key = true),
        sqlite_column!("audio_location", SqlType::Text, non_null = true),
        sqlite_column!("title", SqlType::Text, non_null = true),
        sqlite_column!(
            "created",
            SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_catalog_entry_created", "created")],
    unique_constraints: &[],
};

pub const OWNERSHIP_TABLE_V_0: Table = Table {
    name: "ownership",
    columns: &[
        sqlite_column!("id", SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "account_id",
            SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ACCOUNT_FK)
        ),
        sqlite_column!(
            "catalog_entry_id",
            SqlType::Integer,
            non_null = true,
            foreign_key = Some(&CATALOG_ENTRY_FK)
        ),
        sqlite_column!(
            "created",
            SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_ownership_catalog_entry", "catalog_entry_id")],
    unique_constraints: &[&["account_id", "catalog_entry_id"]],
};

pub const ENTRY_LIKE_TABLE_V_0: Table = Table {
    name: "entry_like",
    columns: &[
        sqlite_column!("id", SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "account_id",
            SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ACCOUNT_FK)
        ),
        sqlite_column!(
            "catalog_entry_id",
            SqlType::Integer,
            non_null = true,
            foreign_key = Some(&CATALOG_ENTRY_FK)
        ),
        sqlite_column!(
            "created",
            SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_entry_like_catalog_entry", "catalog_entry_id")],
    unique_constraints: &[&["account_id", "catalog_entry_id"]],
};

/// V 1: optional duration and thumbnail on catalog entries.
pub const CATALOG_ENTRY_TABLE_V_1: Table = Table {
    name: "catalog_entry",
    columns: &[
        sqlite_column!("id", SqlType::Integer, is_primary_key = true),
        sqlite_column!("audio_location", SqlType::Text, non_null = true),
        sqlite_column!("title", SqlType::Text, non_null = true),
        sqlite_column!(
            "created",
            SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!("duration_seconds", SqlType::Integer),
        sqlite_column!("thumbnail_location", SqlType::Text),
    ],
    indices: &[("idx_catalog_entry_created", "created")],
    unique_constraints: &[],
};

pub const VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 0,
        tables: &[
            ACCOUNT_TABLE_V_0,
            CATALOG_ENTRY_TABLE_V_0,
            OWNERSHIP_TABLE_V_0,
            ENTRY_LIKE_TABLE_V_0,
        ],
        migration: None,
    },
    VersionedSchema {
        version: 1,
        tables: &[
            ACCOUNT_TABLE_V_0,
            CATALOG_ENTRY_TABLE_V_1,
            OWNERSHIP_TABLE_V_0,
            ENTRY_LIKE_TABLE_V_0,
        ],
        migration: Some(|conn: &Connection| {
            CATALOG_ENTRY_TABLE_V_1.add_column(conn, "duration_seconds")?;
            CATALOG_ENTRY_TABLE_V_1.add_column(conn, "thumbnail_location")?;
            Ok(())
        }),
    },
];

pub const ACCOUNT_TABLE: &str = ACCOUNT_TABLE_V_0.name;
pub const CATALOG_ENTRY_TABLE: &str = CATALOG_ENTRY_TABLE_V_1.name;
pub const OWNERSHIP_TABLE: &str = OWNERSHIP_TABLE_V_0.name;
pub const ENTRY_LIKE_TABLE: &str = ENTRY_LIKE_TABLE_V_0.name;
