//! Binary block files: little-endian f32 arrays and durable writes.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

use memmap2::Mmap;

use crate::error::{Result, StoreError};

/// Encode f32 values as a little-endian byte buffer.
pub fn encode_f32(values: &[f32]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(values.len() * 4);
    for v in values {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    buf
}

/// Decode a little-endian f32 buffer.
pub fn decode_f32(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(StoreError::InvalidData(
            "f32 buffer length must be a multiple of 4".into(),
        ));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes(c.try_into().unwrap()))
        .collect())
}

/// Write a file and fsync it.
pub fn write_file_fsync(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

/// Fsync a directory so a rename inside it is durable.
pub fn fsync_dir(path: &Path) -> Result<()> {
    let dir = OpenOptions::new().read(true).open(path)?;
    dir.sync_all()?;
    Ok(())
}

/// Atomically replace `path` with `bytes`: write to a temp sibling, fsync,
/// rename over the target, fsync the parent.
pub fn write_file_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| StoreError::InvalidData(format!("no parent for {}", path.display())))?;
    let file_name = path
        .file_name()
        .ok_or_else(|| StoreError::InvalidData(format!("no file name in {}", path.display())))?;
    let tmp = parent.join(format!(".tmp-{}", file_name.to_string_lossy()));

    write_file_fsync(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    fsync_dir(parent)?;
    Ok(())
}

/// A read-only memory-mapped row-major f32 table.
///
/// The mapping is page-aligned, and rows are read through explicit
/// little-endian decoding, so the format is identical on every platform.
#[derive(Debug)]
pub struct MappedF32 {
    /// None only for the zero-row table; an empty file cannot be mapped.
    mmap: Option<Mmap>,
    rows: usize,
    dim: usize,
}

impl MappedF32 {
    /// Map a file expected to hold `rows` x `dim` f32 values.
    pub fn open(path: &Path, rows: usize, dim: usize) -> Result<Self> {
        let file = File::open(path)?;
        let expected = rows as u64 * dim as u64 * 4;
        let actual = file.metadata()?.len();
        if actual != expected {
            return Err(StoreError::Integrity(format!(
                "{}: expected {expected} bytes ({rows}x{dim} f32), found {actual}",
                path.display()
            )));
        }
        if expected == 0 {
            return Ok(Self {
                mmap: None,
                rows,
                dim,
            });
        }
        // Safety: the file is sealed state; writers replace it only via
        // atomic rename, never in place.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self {
            mmap: Some(mmap),
            rows,
            dim,
        })
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Row dimension.
    pub fn dim(&self) -> usize {
        self.dim
    }

    fn row_bytes(&self, i: usize) -> &[u8] {
        let mmap = self.mmap.as_ref().expect("row index out of range");
        let start = i * self.dim * 4;
        &mmap[start..start + self.dim * 4]
    }

    /// Copy row `i` into `out`.
    pub fn read_row(&self, i: usize, out: &mut [f32]) {
        debug_assert!(i < self.rows);
        debug_assert_eq!(out.len(), self.dim);
        for (slot, chunk) in out.iter_mut().zip(self.row_bytes(i).chunks_exact(4)) {
            *slot = f32::from_le_bytes(chunk.try_into().unwrap());
        }
    }

    /// Dot product of row `i` with `q`, accumulated in f64 in index order.
    pub fn dot_row(&self, i: usize, q: &[f32]) -> f64 {
        debug_assert!(i < self.rows);
        debug_assert_eq!(q.len(), self.dim);
        let mut acc = 0.0f64;
        for (j, chunk) in self.row_bytes(i).chunks_exact(4).enumerate() {
            let v = f32::from_le_bytes(chunk.try_into().unwrap());
            acc += v as f64 * q[j] as f64;
        }
        acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f32_codec_roundtrip() {
        let values = vec![0.0f32, 1.5, -2.25, f32::MIN_POSITIVE];
        let bytes = encode_f32(&values);
        assert_eq!(bytes.len(), 16);
        assert_eq!(decode_f32(&bytes).unwrap(), values);
    }

    #[test]
    fn test_decode_rejects_ragged_buffer() {
        assert!(decode_f32(&[0u8; 6]).is_err());
    }

    #[test]
    fn test_encode_is_little_endian() {
        let bytes = encode_f32(&[1.0]);
        assert_eq!(bytes, 1.0f32.to_le_bytes().to_vec());
    }

    #[test]
    fn test_atomic_write_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.f32");

        write_file_atomic(&path, &encode_f32(&[1.0, 2.0])).unwrap();
        write_file_atomic(&path, &encode_f32(&[3.0, 4.0, 5.0])).unwrap();

        let bytes = fs::read(&path).unwrap();
        assert_eq!(decode_f32(&bytes).unwrap(), vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_mapped_table_reads_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.f32");
        write_file_atomic(&path, &encode_f32(&[1.0, 0.0, 0.0, 1.0, 0.5, 0.5])).unwrap();

        let table = MappedF32::open(&path, 3, 2).unwrap();
        let mut row = [0.0f32; 2];
        table.read_row(2, &mut row);
        assert_eq!(row, [0.5, 0.5]);

        let score = table.dot_row(0, &[2.0, 3.0]);
        assert!((score - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_mapped_table_handles_zero_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.f32");
        write_file_atomic(&path, &[]).unwrap();

        let table = MappedF32::open(&path, 0, 4).unwrap();
        assert_eq!(table.rows(), 0);
        assert_eq!(table.dim(), 4);
    }

    #[test]
    fn test_mapped_table_rejects_size_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.f32");
        write_file_atomic(&path, &encode_f32(&[1.0, 2.0, 3.0])).unwrap();
        assert!(matches!(
            MappedF32::open(&path, 2, 2),
            Err(StoreError::Integrity(_))
        ));
    }
}
