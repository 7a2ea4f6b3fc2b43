//! Archive layout: file identifiers and DAT path conventions
//!
//! Files live at `<root>/<rom group>/<group>/<slot>.DAT`. The canonical
//! identifier of a file is the `(group, slot)` pair taken from the two
//! trailing numeric components of its path, and the packed 16-bit form of
//! that pair is the key into the index table.

use regex::Regex;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

/// 16-bit archive identifier, `group << 7 | slot`
pub type PackedId = u16;

/// Highest group number representable in a [`PackedId`]
pub const MAX_GROUP: u16 = 0x1FF;

/// Highest slot number representable in a [`PackedId`]
pub const MAX_SLOT: u16 = 0x7F;

static NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());
static DAT_NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+\.DAT$").unwrap());

/// Canonical `(group, slot)` identifier of an archive file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArchiveId {
    pub group: u16,
    pub slot: u16,
}

impl ArchiveId {
    /// Create an identifier, rejecting values that do not fit a packed id
    pub fn new(group: u16, slot: u16) -> Option<Self> {
        (group <= MAX_GROUP && slot <= MAX_SLOT).then_some(Self { group, slot })
    }

    /// Unpack a 16-bit packed identifier
    pub fn from_packed(packed: PackedId) -> Self {
        Self {
            group: packed >> 7,
            slot: packed & MAX_SLOT,
        }
    }

    /// Pack into the 16-bit form used by the index table
    pub fn packed(&self) -> PackedId {
        (self.group << 7) | self.slot
    }

    /// Extract the identifier from any text holding at least two numbers.
    ///
    /// The last two numeric tokens are used, so `ROM/12/34.DAT`,
    /// `C:\Game\ROM2\12\34.DAT` and `12/34` all resolve to `12/34`.
    pub fn parse(text: &str) -> Option<Self> {
        let mut last = None;
        let mut previous = None;
        for token in NUMBER.find_iter(text) {
            previous = last.replace(token.as_str());
        }
        let group = previous?.parse().ok()?;
        let slot = last?.parse().ok()?;
        Self::new(group, slot)
    }

    /// Extract the identifier from a filesystem path
    pub fn from_path(path: &Path) -> Option<Self> {
        Self::parse(&path.to_string_lossy())
    }
}

impl fmt::Display for ArchiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.slot)
    }
}

/// Check whether a file name is a numeric DAT file (`<digits>.DAT`)
pub fn is_dat_name(name: &str) -> bool {
    DAT_NAME.is_match(name)
}

/// Check whether a top-level directory holds archive groups
///
/// ROM directories (`ROM`, `ROM2`, ...) and the numeric legacy group (`0`)
/// qualify.
pub fn is_rom_dir(name: &str) -> bool {
    name.starts_with("ROM") || (!name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_trailing_numbers() {
        let id = ArchiveId::parse("ROM/12/34.DAT").unwrap();
        assert_eq!(id, ArchiveId { group: 12, slot: 34 });

        let id = ArchiveId::parse("/games/ff11/ROM3/5/127.DAT").unwrap();
        assert_eq!(id, ArchiveId { group: 5, slot: 127 });

        assert_eq!(ArchiveId::parse("12/34"), ArchiveId::new(12, 34));
        assert_eq!(ArchiveId::parse("ROM/34.DAT"), None);
        assert_eq!(ArchiveId::parse("no numbers"), None);
    }

    #[test]
    fn test_parse_rejects_out_of_range() {
        assert_eq!(ArchiveId::parse("ROM/12/128.DAT"), None);
        assert_eq!(ArchiveId::parse("ROM/512/0.DAT"), None);
    }

    #[test]
    fn test_packed_round_trip() {
        let id = ArchiveId::new(0x1A3, 0x55).unwrap();
        assert_eq!(id.packed(), (0x1A3 << 7) | 0x55);
        assert_eq!(ArchiveId::from_packed(id.packed()), id);
    }

    #[test]
    fn test_from_path() {
        let path: PathBuf = ["ROM", "118", "108.DAT"].iter().collect();
        assert_eq!(ArchiveId::from_path(&path), ArchiveId::new(118, 108));
    }

    #[test]
    fn test_ordering_is_numeric() {
        let mut ids = vec![
            ArchiveId::new(10, 2).unwrap(),
            ArchiveId::new(2, 30).unwrap(),
            ArchiveId::new(2, 4).unwrap(),
        ];
        ids.sort();
        let rendered: Vec<String> = ids.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, ["2/4", "2/30", "10/2"]);
    }

    #[test]
    fn test_dat_names() {
        assert!(is_dat_name("0.DAT"));
        assert!(is_dat_name("127.DAT"));
        assert!(!is_dat_name("FTABLE.DAT"));
        assert!(!is_dat_name("12.dat"));
        assert!(!is_dat_name("12.DAT.bak"));
    }

    #[test]
    fn test_rom_dirs() {
        assert!(is_rom_dir("ROM"));
        assert!(is_rom_dir("ROM9"));
        assert!(is_rom_dir("0"));
        assert!(!is_rom_dir("DEC"));
        assert!(!is_rom_dir(""));
    }
}
