//! File index table (`FTABLE.DAT`)
//!
//! The index file is a flat array of little-endian u16 records. Record `n`
//! holds the [`PackedId`] of the file assigned to file id `n`, so the table
//! maps a packed id back to its record ordinal.

use byteorder::{LittleEndian, ReadBytesExt};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Cursor, ErrorKind, Read};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::archive::{ArchiveId, PackedId};
use crate::error::Result;

/// File id returned for packed ids missing from the table
pub const FALLBACK_FILE_ID: u32 = 0;

/// Conventional name of the index record file
pub const FTABLE_NAME: &str = "FTABLE.DAT";

/// In-memory index table, immutable once loaded
#[derive(Debug, Clone, Default)]
pub struct IndexTable {
    /// Packed id stored at each record ordinal
    records: Vec<PackedId>,
    /// Packed id to record ordinal
    ids: HashMap<PackedId, u32>,
}

impl IndexTable {
    /// Load an index table from a record file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::read_from(BufReader::new(file))
    }

    /// Build an index table from raw record bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        // Reading from memory only fails at end of input, which read_from handles
        Self::read_from(Cursor::new(data)).unwrap_or_default()
    }

    fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut table = Self::default();
        loop {
            let packed = match reader.read_u16::<LittleEndian>() {
                Ok(value) => value,
                // A trailing odd byte is not a record
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            };
            let ordinal = table.records.len() as u32;
            table.records.push(packed);
            table.ids.insert(packed, ordinal);
        }
        Ok(table)
    }

    /// Number of records in the table
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Get the file id of a packed id, if listed
    pub fn get(&self, packed: PackedId) -> Option<u32> {
        self.ids.get(&packed).copied()
    }

    /// Get the file id of a packed id, falling back to [`FALLBACK_FILE_ID`]
    pub fn lookup(&self, packed: PackedId) -> u32 {
        self.get(packed).unwrap_or_else(|| {
            debug!(
                "Packed id 0x{:04X} ({}) is not in the index table",
                packed,
                ArchiveId::from_packed(packed)
            );
            FALLBACK_FILE_ID
        })
    }

    /// Get the packed id stored at a file id
    pub fn reverse_lookup(&self, file_id: u32) -> Option<PackedId> {
        self.records.get(file_id as usize).copied()
    }

    /// Get the DAT path of a file id below a ROM directory
    pub fn path_of(&self, file_id: u32, rom_dir: &Path) -> Option<PathBuf> {
        let id = ArchiveId::from_packed(self.reverse_lookup(file_id)?);
        Some(
            rom_dir
                .join(id.group.to_string())
                .join(format!("{}.DAT", id.slot)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn records(values: &[u16]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn test_lookup_ordinals() {
        let table = IndexTable::from_bytes(&records(&[0x0001, 0x0A05, 0x1234]));
        assert_eq!(table.len(), 3);
        assert_eq!(table.lookup(0x0001), 0);
        assert_eq!(table.lookup(0x0A05), 1);
        assert_eq!(table.lookup(0x1234), 2);
    }

    #[test]
    fn test_missing_id_falls_back() {
        let table = IndexTable::from_bytes(&records(&[0x0010, 0x0020]));
        assert_eq!(table.get(0x0030), None);
        assert_eq!(table.lookup(0x0030), FALLBACK_FILE_ID);
    }

    #[test]
    fn test_round_trip() {
        let values = [0x0100, 0x0003, 0x7FFF, 0x0042, 0x2080];
        let table = IndexTable::from_bytes(&records(&values));
        for file_id in 0..values.len() as u32 {
            let packed = table.reverse_lookup(file_id).unwrap();
            assert_eq!(table.lookup(packed), file_id);
        }
        assert_eq!(table.reverse_lookup(values.len() as u32), None);
    }

    #[test]
    fn test_duplicate_value_keeps_last_ordinal() {
        let table = IndexTable::from_bytes(&records(&[0x0005, 0x0006, 0x0005]));
        assert_eq!(table.lookup(0x0005), 2);
    }

    #[test]
    fn test_trailing_odd_byte_ignored() {
        let mut data = records(&[0x0102]);
        data.push(0xFF);
        let table = IndexTable::from_bytes(&data);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_path_of() {
        let packed = ArchiveId::new(118, 108).unwrap().packed();
        let table = IndexTable::from_bytes(&records(&[0, packed]));
        let path = table.path_of(1, Path::new("ROM")).unwrap();
        assert_eq!(path, Path::new("ROM").join("118").join("108.DAT"));
        assert_eq!(table.path_of(2, Path::new("ROM")), None);
    }

    #[test]
    fn test_open_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&records(&[0x0201, 0x0302])).unwrap();
        let table = IndexTable::open(file.path()).unwrap();
        assert_eq!(table.lookup(0x0302), 1);
    }
}
