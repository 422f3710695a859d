//! Identifiers and chunk records.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;
use crate::hash::Sha256Hash;

/// Maximum identifier length in bytes.
const MAX_ID_LEN: usize = 64;

fn validate_id(s: &str, what: &str) -> Result<(), CoreError> {
    if s.is_empty() || s.len() > MAX_ID_LEN {
        return Err(CoreError::InvalidId(format!(
            "{what} must be 1..={MAX_ID_LEN} bytes: {s:?}"
        )));
    }
    if !s
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    {
        return Err(CoreError::InvalidId(format!(
            "{what} must match [A-Za-z0-9_-]+: {s:?}"
        )));
    }
    Ok(())
}

/// Identifier for a group of lattices.
///
/// Path-safe ASCII; auto-assigned groups format as `G-XXXXXX` (uppercase
/// hex of the creation counter).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(String);

impl GroupId {
    /// Parse and validate a caller-supplied group id.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        validate_id(s, "group id")?;
        Ok(Self(s.to_string()))
    }

    /// The auto-assigned id for the n-th created group.
    pub fn from_index(n: u64) -> Self {
        Self(format!("G-{n:06X}"))
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier for a single sealed micro-lattice.
///
/// Assigned at seal time in creation order, formatted as `L-XXXXXX`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LatticeId(String);

impl LatticeId {
    /// Parse and validate a lattice id.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        validate_id(s, "lattice id")?;
        Ok(Self(s.to_string()))
    }

    /// The id for the n-th created lattice.
    pub fn from_index(n: u64) -> Self {
        Self(format!("L-{n:06X}"))
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LatticeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Provenance of the source file a lattice was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMeta {
    /// Display path or name of the source file.
    pub source_file: String,
    /// Size of the source file in bytes.
    pub file_bytes: u64,
    /// SHA-256 of the source file content.
    pub file_sha256: Sha256Hash,
}

/// A text chunk as supplied by the external chunking collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// The chunk text.
    pub text: String,
    /// Byte offset of the chunk start in the source file.
    pub byte_start: u64,
    /// Byte offset one past the chunk end.
    pub byte_end: u64,
}

/// A chunk as persisted inside a sealed lattice.
///
/// Immutable once the lattice is sealed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Group the lattice belongs to.
    pub group_id: GroupId,
    /// The sealed lattice.
    pub lattice_id: LatticeId,
    /// Local index within the lattice (row of the embedding block).
    pub index: u32,
    /// The chunk text.
    pub text: String,
    /// Source file path or name.
    pub source_file: String,
    /// SHA-256 of the source file.
    pub file_sha256: Sha256Hash,
    /// Byte offset of the chunk start in the source file.
    pub byte_start: u64,
    /// Byte offset one past the chunk end.
    pub byte_end: u64,
}
