//! Versioned SQLite schema migrations for the manifest and router-meta
//! databases.
//!
//! Each migration is a SQL batch that transforms the schema from version N
//! to N+1. Applying is idempotent.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current manifest schema version.
pub const MANIFEST_VERSION: u32 = 1;

/// Current router-meta schema version.
pub const ROUTER_VERSION: u32 = 1;

fn migrate(conn: &mut Connection, target: u32, apply: fn(&Connection, u32) -> Result<()>) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current < target {
        let tx = conn.transaction()?;
        for version in (current + 1)..=target {
            apply(&tx, version)?;
            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, chrono::Utc::now().to_rfc3339()],
            )?;
        }
        tx.commit()?;
    }
    Ok(())
}

/// Initialize or migrate the manifest database.
pub fn migrate_manifest(conn: &mut Connection) -> Result<()> {
    migrate(conn, MANIFEST_VERSION, apply_manifest)
}

fn apply_manifest(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => {
            conn.execute_batch(
                r#"
                -- One row per sealed lattice, in creation order.
                CREATE TABLE manifest (
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    group_id TEXT NOT NULL,
                    lattice_id TEXT NOT NULL UNIQUE,
                    edge_hash TEXT NOT NULL,          -- hex SHA-256
                    delta_h_total TEXT NOT NULL,      -- canonical decimal
                    created_at TEXT NOT NULL,         -- ISO 8601
                    source_file TEXT NOT NULL,
                    chunk_count INTEGER NOT NULL,
                    file_bytes INTEGER NOT NULL,
                    file_sha256 TEXT NOT NULL,        -- hex SHA-256
                    state_sig TEXT NOT NULL,          -- hex SHA-256, derived cache
                    acl TEXT,                         -- JSON AclEntry overlay
                    display_name TEXT                 -- overlay, not attested
                );

                -- Monotonic counters for auto-assigned ids.
                CREATE TABLE counters (
                    name TEXT PRIMARY KEY,
                    value INTEGER NOT NULL
                );

                CREATE INDEX idx_manifest_group ON manifest(group_id);
                "#,
            )?;
            Ok(())
        }
        _ => Err(StoreError::Migration(format!(
            "unknown manifest migration version: {version}"
        ))),
    }
}

/// Initialize or migrate the router-meta database.
pub fn migrate_router(conn: &mut Connection) -> Result<()> {
    migrate(conn, ROUTER_VERSION, apply_router)
}

fn apply_router(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => {
            conn.execute_batch(
                r#"
                -- Row r describes row r of centroids.f32; order is creation
                -- order and must never be rewritten.
                CREATE TABLE router_meta (
                    row_idx INTEGER PRIMARY KEY,
                    lattice_id TEXT NOT NULL UNIQUE,
                    group_id TEXT NOT NULL,
                    acl TEXT                          -- JSON AclEntry overlay
                );
                "#,
            )?;
            Ok(())
        }
        _ => Err(StoreError::Migration(format!(
            "unknown router migration version: {version}"
        ))),
    }
}
