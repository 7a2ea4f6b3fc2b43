//! Scan configuration

use std::path::{Path, PathBuf};

use crate::catalog::CATALOG_NAME;
use crate::index::FTABLE_NAME;

/// Name of the primary ROM directory
pub const PRIMARY_GROUP: &str = "ROM";

/// Name of the decoded output directory below the archive root
pub const DECODED_DIR: &str = "DEC";

/// Separator used when joining search terms into a catalog label
pub const LABEL_SEPARATOR: &str = " + ";

/// Options for searching and decoding an archive
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Archive root holding `ROM`, `FTABLE.DAT` and friends
    pub root: PathBuf,
    /// Search every ROM directory, not only the primary one
    pub scan_all: bool,
    /// Decode and catalog every match
    pub auto_decode: bool,
    /// Log every directory visited
    pub verbose: bool,
    /// Primary ROM directory name (default `ROM`)
    pub primary_group: String,
    /// Index record file (default `<root>/FTABLE.DAT`)
    pub index_path: Option<PathBuf>,
    /// Decoded output root (default `<root>/DEC`)
    pub output_dir: Option<PathBuf>,
    /// Catalog file (default `<output_dir>/decoded.txt`)
    pub catalog_path: Option<PathBuf>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            scan_all: false,
            auto_decode: true,
            verbose: false,
            primary_group: PRIMARY_GROUP.to_string(),
            index_path: None,
            output_dir: None,
            catalog_path: None,
        }
    }
}

impl ScanOptions {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn with_scan_all(mut self, scan_all: bool) -> Self {
        self.scan_all = scan_all;
        self
    }

    pub fn with_auto_decode(mut self, auto_decode: bool) -> Self {
        self.auto_decode = auto_decode;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_index_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.index_path = Some(path.into());
        self
    }

    pub fn with_output_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    pub fn with_catalog_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.catalog_path = Some(path.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Primary ROM directory below the root
    pub fn primary_dir(&self) -> PathBuf {
        self.root.join(&self.primary_group)
    }

    pub fn index_path(&self) -> PathBuf {
        self.index_path
            .clone()
            .unwrap_or_else(|| self.root.join(FTABLE_NAME))
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| self.root.join(DECODED_DIR))
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.catalog_path
            .clone()
            .unwrap_or_else(|| self.output_dir().join(CATALOG_NAME))
    }
}

/// Catalog label for a set of search terms
pub fn group_label<S: AsRef<str>>(terms: &[S]) -> String {
    terms
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(LABEL_SEPARATOR)
}
