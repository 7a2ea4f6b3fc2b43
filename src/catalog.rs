//! Persistent catalog of search results
//!
//! The catalog is a plain text file grouping discovered archive ids under the
//! search that found them:
//!
//! ```text
//! Fire + Ice:
//!     12/34
//!     118/108
//!
//! TestWord:
//!     1/2
//!
//! ```
//!
//! Lines end with CRLF. The whole file is rewritten on every merge with
//! labels sorted lexicographically and ids sorted numerically, so merging the
//! same discoveries again leaves it unchanged.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::warn;

use crate::archive::ArchiveId;
use crate::decoder::ensure_dir;
use crate::error::Result;

/// Conventional catalog file name inside the decoded output tree
pub const CATALOG_NAME: &str = "decoded.txt";

const INDENT: &str = "    ";
const LINE_END: &str = "\r\n";

/// One line of a catalog file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogLine<'a> {
    /// Group label, written as `label:`
    Label(&'a str),
    /// Indented archive identifier
    Member(ArchiveId),
    Blank,
    /// Line that fits none of the above
    Malformed(&'a str),
}

impl<'a> CatalogLine<'a> {
    /// Classify a single line, without its line terminator
    pub fn parse(line: &'a str) -> Self {
        if line.trim().is_empty() {
            return CatalogLine::Blank;
        }
        // Member lines never end in a colon, so a label may start with spaces
        if let Some(label) = line.trim_end().strip_suffix(':') {
            return CatalogLine::Label(label);
        }
        if line.starts_with([' ', '\t']) {
            // Older catalogs hold full paths like `ROM/12/34.DAT`
            if let Some(id) = ArchiveId::parse(line.trim()) {
                return CatalogLine::Member(id);
            }
        }
        CatalogLine::Malformed(line)
    }
}

/// Search labels mapped to the archive ids found under them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    groups: BTreeMap<String, BTreeSet<ArchiveId>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse catalog text, skipping lines that cannot be understood
    pub fn parse(text: &str) -> Self {
        let mut catalog = Self::new();
        let mut current: Option<&str> = None;

        for (number, line) in text.lines().enumerate() {
            match CatalogLine::parse(line) {
                CatalogLine::Blank => {}
                CatalogLine::Label(label) => {
                    catalog.groups.entry(label.to_string()).or_default();
                    current = Some(label);
                }
                CatalogLine::Member(id) => match current {
                    Some(label) => catalog.insert(label, [id]),
                    None => warn!("Catalog line {}: entry before any label", number + 1),
                },
                CatalogLine::Malformed(bad) => {
                    warn!("Catalog line {}: skipping {:?}", number + 1, bad)
                }
            }
        }

        catalog
    }

    /// Load a catalog file; a missing file yields an empty catalog
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        match fs::read(path.as_ref()) {
            Ok(data) => Ok(Self::parse(&String::from_utf8_lossy(&data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Add ids under a label, creating the label if needed
    pub fn insert<I>(&mut self, label: &str, ids: I)
    where
        I: IntoIterator<Item = ArchiveId>,
    {
        self.groups.entry(label.to_string()).or_default().extend(ids);
    }

    /// Ids recorded under a label
    pub fn get(&self, label: &str) -> Option<&BTreeSet<ArchiveId>> {
        self.groups.get(label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Render the catalog in its on-disk form
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (label, ids) in &self.groups {
            out.push_str(label);
            out.push(':');
            out.push_str(LINE_END);
            for id in ids {
                out.push_str(INDENT);
                out.push_str(&id.to_string());
                out.push_str(LINE_END);
            }
            out.push_str(LINE_END);
        }
        out
    }

    /// Rewrite the catalog file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_dir(parent)?;
        }
        fs::write(path, self.render())?;
        Ok(())
    }
}

/// Merge discovered files into the catalog at `catalog_path`
///
/// Paths are reduced to their [`ArchiveId`]; paths without one are skipped.
/// Returns the merged catalog.
pub fn merge<I, P>(label: &str, paths: I, catalog_path: &Path) -> Result<Catalog>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let ids: Vec<ArchiveId> = paths
        .into_iter()
        .filter_map(|p| {
            let p = p.as_ref();
            let id = ArchiveId::from_path(p);
            if id.is_none() {
                warn!("No archive id in {}, not cataloged", p.display());
            }
            id
        })
        .collect();

    let mut catalog = Catalog::load(catalog_path)?;
    catalog.insert(label, ids);
    catalog.save(catalog_path)?;
    Ok(catalog)
}
