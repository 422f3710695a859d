//! Manifest and router-meta rows and their SQLite accessors.

use rusqlite::{params, Connection, OptionalExtension, Row};

use latticedb_acl::AclEntry;
use latticedb_core::{Decimal17, GroupId, LatticeId, Sha256Hash};

use crate::error::{Result, StoreError};

/// One manifest row: the queryable summary of a sealed lattice.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestRow {
    /// Creation-order sequence number (1-based).
    pub seq: u64,
    /// Group the lattice belongs to.
    pub group_id: GroupId,
    /// The sealed lattice.
    pub lattice_id: LatticeId,
    /// SHA-256 over the packed edge buffer.
    pub edge_hash: Sha256Hash,
    /// Energy drop recorded at build time.
    pub delta_h_total: Decimal17,
    /// Seal timestamp, ISO 8601.
    pub created_at: String,
    /// Source file path or name.
    pub source_file: String,
    /// Number of chunks in the lattice.
    pub chunk_count: u64,
    /// Source file size in bytes.
    pub file_bytes: u64,
    /// SHA-256 of the source file.
    pub file_sha256: Sha256Hash,
    /// Cached copy of the receipt's state signature.
    pub state_sig: Sha256Hash,
    /// Optional ACL overlay.
    pub acl: Option<AclEntry>,
    /// Optional display name overlay.
    pub display_name: Option<String>,
}

/// Sort order for manifest queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ManifestSort {
    /// Oldest first (creation order).
    #[default]
    CreatedAsc,
    /// Newest first.
    CreatedDesc,
}

/// Filters and paging for manifest queries.
#[derive(Debug, Clone, Default)]
pub struct ManifestQuery {
    /// Restrict to one group.
    pub group: Option<GroupId>,
    /// Sort order.
    pub sort: ManifestSort,
    /// Rows to skip.
    pub offset: u64,
    /// Maximum rows to return (None for all).
    pub limit: Option<u64>,
}

/// One router-meta row, parallel to a row of `centroids.f32`.
#[derive(Debug, Clone, PartialEq)]
pub struct RouterRow {
    /// Row index into the centroid table (0-based, creation order).
    pub row_idx: u64,
    /// The lattice this centroid routes to.
    pub lattice_id: LatticeId,
    /// Its group.
    pub group_id: GroupId,
    /// Optional ACL overlay.
    pub acl: Option<AclEntry>,
}

fn acl_from_column(value: Option<String>) -> Result<Option<AclEntry>> {
    match value {
        None => Ok(None),
        Some(s) => AclEntry::from_json(&s)
            .map(Some)
            .map_err(|e| StoreError::InvalidData(e.to_string())),
    }
}

fn column_error(col: &str) -> rusqlite::Error {
    rusqlite::Error::InvalidColumnType(0, col.to_string(), rusqlite::types::Type::Text)
}

fn row_to_manifest(row: &Row<'_>) -> rusqlite::Result<(ManifestRow, Option<String>)> {
    let acl_text: Option<String> = row.get("acl")?;

    let group_text: String = row.get("group_id")?;
    let lattice_text: String = row.get("lattice_id")?;
    let edge_hash_text: String = row.get("edge_hash")?;
    let delta_text: String = row.get("delta_h_total")?;
    let file_sha_text: String = row.get("file_sha256")?;
    let state_sig_text: String = row.get("state_sig")?;

    let manifest = ManifestRow {
        seq: row.get("seq")?,
        group_id: GroupId::parse(&group_text).map_err(|_| column_error("group_id"))?,
        lattice_id: LatticeId::parse(&lattice_text).map_err(|_| column_error("lattice_id"))?,
        edge_hash: Sha256Hash::from_hex(&edge_hash_text).map_err(|_| column_error("edge_hash"))?,
        delta_h_total: Decimal17::parse(&delta_text).map_err(|_| column_error("delta_h_total"))?,
        created_at: row.get("created_at")?,
        source_file: row.get("source_file")?,
        chunk_count: row.get("chunk_count")?,
        file_bytes: row.get("file_bytes")?,
        file_sha256: Sha256Hash::from_hex(&file_sha_text)
            .map_err(|_| column_error("file_sha256"))?,
        state_sig: Sha256Hash::from_hex(&state_sig_text)
            .map_err(|_| column_error("state_sig"))?,
        acl: None,
        display_name: row.get("display_name")?,
    };
    Ok((manifest, acl_text))
}

/// Append a manifest row. The caller holds the writer lock.
pub fn insert_manifest_row(conn: &Connection, row: &ManifestRow) -> Result<()> {
    conn.execute(
        "INSERT INTO manifest (
            group_id, lattice_id, edge_hash, delta_h_total, created_at,
            source_file, chunk_count, file_bytes, file_sha256, state_sig,
            acl, display_name
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            row.group_id.as_str(),
            row.lattice_id.as_str(),
            row.edge_hash.to_hex(),
            row.delta_h_total.canonical(),
            row.created_at,
            row.source_file,
            row.chunk_count,
            row.file_bytes,
            row.file_sha256.to_hex(),
            row.state_sig.to_hex(),
            row.acl.as_ref().map(|a| a.to_json()),
            row.display_name,
        ],
    )?;
    Ok(())
}

/// Query manifest rows with filters, sort, and paging.
pub fn query_manifest(conn: &Connection, query: &ManifestQuery) -> Result<Vec<ManifestRow>> {
    let order = match query.sort {
        ManifestSort::CreatedAsc => "ASC",
        ManifestSort::CreatedDesc => "DESC",
    };
    let sql = format!(
        "SELECT * FROM manifest {} ORDER BY seq {order} LIMIT ?1 OFFSET ?2",
        if query.group.is_some() {
            "WHERE group_id = ?3"
        } else {
            ""
        }
    );
    let limit = query.limit.map(|l| l as i64).unwrap_or(-1);

    let mut stmt = conn.prepare(&sql)?;
    match &query.group {
        Some(group) => {
            let rows = stmt.query(params![limit, query.offset, group.as_str()])?;
            collect_manifest_rows(rows)
        }
        None => {
            let rows = stmt.query(params![limit, query.offset])?;
            collect_manifest_rows(rows)
        }
    }
}

fn collect_manifest_rows(mut rows: rusqlite::Rows<'_>) -> Result<Vec<ManifestRow>> {
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let (mut manifest, acl_text) = row_to_manifest(row)?;
        manifest.acl = acl_from_column(acl_text)?;
        out.push(manifest);
    }
    Ok(out)
}

/// Look up one manifest row by lattice id.
pub fn get_manifest_row(conn: &Connection, lattice: &LatticeId) -> Result<Option<ManifestRow>> {
    let mut stmt = conn.prepare("SELECT * FROM manifest WHERE lattice_id = ?1")?;
    let found = stmt
        .query_row(params![lattice.as_str()], row_to_manifest)
        .optional()?;
    match found {
        Some((mut manifest, acl_text)) => {
            manifest.acl = acl_from_column(acl_text)?;
            Ok(Some(manifest))
        }
        None => Ok(None),
    }
}

/// Number of sealed lattices.
pub fn manifest_count(conn: &Connection) -> Result<u64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM manifest", [], |row| row.get(0))?)
}

/// Total chunks across sealed lattices.
pub fn manifest_chunk_total(conn: &Connection) -> Result<u64> {
    Ok(conn.query_row(
        "SELECT COALESCE(SUM(chunk_count), 0) FROM manifest",
        [],
        |row| row.get(0),
    )?)
}

/// All cached state signatures.
pub fn manifest_state_sigs(conn: &Connection) -> Result<Vec<Sha256Hash>> {
    let mut stmt = conn.prepare("SELECT state_sig FROM manifest ORDER BY seq ASC")?;
    let sigs = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    sigs.into_iter()
        .map(|s| {
            Sha256Hash::from_hex(&s).map_err(|_| StoreError::InvalidData(format!("bad state_sig {s}")))
        })
        .collect()
}

/// Update the display-name overlay column. Returns false if the lattice is
/// unknown.
pub fn update_display_name(
    conn: &Connection,
    lattice: &LatticeId,
    name: Option<&str>,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE manifest SET display_name = ?1 WHERE lattice_id = ?2",
        params![name, lattice.as_str()],
    )?;
    Ok(changed == 1)
}

/// Bump and return a named monotonic counter (used for auto-assigned ids).
pub fn next_counter(conn: &Connection, name: &str) -> Result<u64> {
    conn.execute(
        "INSERT INTO counters (name, value) VALUES (?1, 1)
         ON CONFLICT(name) DO UPDATE SET value = value + 1",
        params![name],
    )?;
    let value: u64 =
        conn.query_row("SELECT value FROM counters WHERE name = ?1", params![name], |row| {
            row.get(0)
        })?;
    Ok(value)
}

/// Append a router-meta row at the next row index.
pub fn insert_router_row(conn: &Connection, row: &RouterRow) -> Result<()> {
    conn.execute(
        "INSERT INTO router_meta (row_idx, lattice_id, group_id, acl)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            row.row_idx,
            row.lattice_id.as_str(),
            row.group_id.as_str(),
            row.acl.as_ref().map(|a| a.to_json()),
        ],
    )?;
    Ok(())
}

/// All router rows in row-index order.
pub fn router_rows(conn: &Connection) -> Result<Vec<RouterRow>> {
    let mut stmt =
        conn.prepare("SELECT row_idx, lattice_id, group_id, acl FROM router_meta ORDER BY row_idx ASC")?;
    let raw = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, u64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    raw.into_iter()
        .map(|(row_idx, lattice, group, acl_text)| {
            Ok(RouterRow {
                row_idx,
                lattice_id: LatticeId::parse(&lattice)?,
                group_id: GroupId::parse(&group)?,
                acl: acl_from_column(acl_text)?,
            })
        })
        .collect()
}

/// Number of router rows.
pub fn router_count(conn: &Connection) -> Result<u64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM router_meta", [], |row| row.get(0))?)
}

/// Delete all router rows (used only when regenerating derived state).
pub fn clear_router(conn: &Connection) -> Result<()> {
    conn.execute("DELETE FROM router_meta", [])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::{migrate_manifest, migrate_router};

    fn manifest_conn() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate_manifest(&mut conn).unwrap();
        conn
    }

    fn sample_row(n: u64) -> ManifestRow {
        ManifestRow {
            seq: 0,
            group_id: GroupId::from_index(1),
            lattice_id: LatticeId::from_index(n),
            edge_hash: Sha256Hash::hash(b"edges"),
            delta_h_total: Decimal17::new(0.25).unwrap(),
            created_at: "2026-08-01T00:00:00Z".into(),
            source_file: format!("doc-{n}.pdf"),
            chunk_count: 6,
            file_bytes: 1024,
            file_sha256: Sha256Hash::hash(b"file"),
            state_sig: Sha256Hash::hash(&n.to_le_bytes()),
            acl: None,
            display_name: None,
        }
    }

    #[test]
    fn test_insert_and_query_roundtrip() {
        let conn = manifest_conn();
        insert_manifest_row(&conn, &sample_row(1)).unwrap();
        insert_manifest_row(&conn, &sample_row(2)).unwrap();

        let rows = query_manifest(&conn, &ManifestQuery::default()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].seq, 1);
        assert_eq!(rows[0].lattice_id, LatticeId::from_index(1));
        assert_eq!(rows[1].lattice_id, LatticeId::from_index(2));
        assert_eq!(rows[0].delta_h_total.value(), 0.25);
    }

    #[test]
    fn test_query_sort_and_paging() {
        let conn = manifest_conn();
        for n in 1..=5 {
            insert_manifest_row(&conn, &sample_row(n)).unwrap();
        }

        let rows = query_manifest(
            &conn,
            &ManifestQuery {
                sort: ManifestSort::CreatedDesc,
                offset: 1,
                limit: Some(2),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].lattice_id, LatticeId::from_index(4));
        assert_eq!(rows[1].lattice_id, LatticeId::from_index(3));
    }

    #[test]
    fn test_query_group_filter() {
        let conn = manifest_conn();
        insert_manifest_row(&conn, &sample_row(1)).unwrap();
        let mut other = sample_row(2);
        other.group_id = GroupId::from_index(9);
        insert_manifest_row(&conn, &other).unwrap();

        let rows = query_manifest(
            &conn,
            &ManifestQuery {
                group: Some(GroupId::from_index(9)),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].lattice_id, LatticeId::from_index(2));
    }

    #[test]
    fn test_duplicate_lattice_id_rejected() {
        let conn = manifest_conn();
        insert_manifest_row(&conn, &sample_row(1)).unwrap();
        assert!(insert_manifest_row(&conn, &sample_row(1)).is_err());
    }

    #[test]
    fn test_display_name_update() {
        let conn = manifest_conn();
        insert_manifest_row(&conn, &sample_row(1)).unwrap();

        assert!(update_display_name(&conn, &LatticeId::from_index(1), Some("Q3 Report")).unwrap());
        let row = get_manifest_row(&conn, &LatticeId::from_index(1))
            .unwrap()
            .unwrap();
        assert_eq!(row.display_name.as_deref(), Some("Q3 Report"));

        assert!(!update_display_name(&conn, &LatticeId::from_index(99), Some("x")).unwrap());
    }

    #[test]
    fn test_acl_column_roundtrip() {
        let conn = manifest_conn();
        let mut row = sample_row(1);
        let mut acl = AclEntry::default();
        acl.tenants.insert("acme".into());
        row.acl = Some(acl.clone());
        insert_manifest_row(&conn, &row).unwrap();

        let back = get_manifest_row(&conn, &row.lattice_id).unwrap().unwrap();
        assert_eq!(back.acl, Some(acl));
    }

    #[test]
    fn test_counters_are_monotonic() {
        let conn = manifest_conn();
        assert_eq!(next_counter(&conn, "group").unwrap(), 1);
        assert_eq!(next_counter(&conn, "group").unwrap(), 2);
        assert_eq!(next_counter(&conn, "lattice").unwrap(), 1);
    }

    #[test]
    fn test_state_sigs_in_creation_order() {
        let conn = manifest_conn();
        for n in [3u64, 1, 2] {
            insert_manifest_row(&conn, &sample_row(n)).unwrap();
        }
        let sigs = manifest_state_sigs(&conn).unwrap();
        assert_eq!(sigs.len(), 3);
        assert_eq!(sigs[0], Sha256Hash::hash(&3u64.to_le_bytes()));
    }

    #[test]
    fn test_router_rows_roundtrip() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate_router(&mut conn).unwrap();

        for idx in 0..3u64 {
            insert_router_row(
                &conn,
                &RouterRow {
                    row_idx: idx,
                    lattice_id: LatticeId::from_index(idx + 1),
                    group_id: GroupId::from_index(1),
                    acl: None,
                },
            )
            .unwrap();
        }

        assert_eq!(router_count(&conn).unwrap(), 3);
        let rows = router_rows(&conn).unwrap();
        assert_eq!(rows[2].row_idx, 2);
        assert_eq!(rows[2].lattice_id, LatticeId::from_index(3));

        clear_router(&conn).unwrap();
        assert_eq!(router_count(&conn).unwrap(), 0);
    }
}
