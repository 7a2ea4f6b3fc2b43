//! Archive search
//!
//! Walks the ROM directories below an archive root, classifies every
//! `<digits>.DAT` file and tests the undecoded payload against the keyed
//! needles of every search term. A file is reported only when all terms
//! occur in it.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::archive::{is_dat_name, is_rom_dir, ArchiveId, PackedId};
use crate::catalog;
use crate::decoder::Decoder;
use crate::encoding::{classify, Encoding};
use crate::error::{Error, Result};
use crate::index::FALLBACK_FILE_ID;
use crate::needle::NeedleSet;
use crate::options::{group_label, ScanOptions};

/// A file whose payload contains every search term
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRecord {
    /// 1-based discovery order within one search
    pub sequence: usize,
    pub path: PathBuf,
    pub id: Option<ArchiveId>,
    pub encoding: Encoding,
}

/// A file or directory that could not be processed
#[derive(Debug)]
pub struct ScanFailure {
    pub path: PathBuf,
    pub error: Error,
}

/// A match together with what the search did with it
#[derive(Debug)]
pub struct Discovery {
    pub record: MatchRecord,
    /// Index table id, or [`FALLBACK_FILE_ID`] when unlisted
    pub file_id: u32,
    /// Decoded output file, when decoding was requested and succeeded
    pub decoded: Option<PathBuf>,
}

/// Outcome of a full search run
#[derive(Debug, Default)]
pub struct SearchReport {
    pub discoveries: Vec<Discovery>,
    pub failures: Vec<ScanFailure>,
    /// Catalog file rewritten by this run, if any
    pub catalog: Option<PathBuf>,
}

impl SearchReport {
    pub fn decoded(&self) -> impl Iterator<Item = &Path> {
        self.discoveries.iter().filter_map(|d| d.decoded.as_deref())
    }
}

/// Multi-term search over an archive tree
pub struct SearchEngine {
    options: ScanOptions,
    needles: NeedleSet,
}

impl SearchEngine {
    /// Prepare a search; fails if a term cannot be encoded
    pub fn new<S: AsRef<str>>(options: ScanOptions, terms: &[S]) -> Result<Self> {
        Ok(Self {
            needles: NeedleSet::new(terms)?,
            options,
        })
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Catalog label of this search
    pub fn label(&self) -> String {
        let terms: Vec<&str> = self.needles.terms().iter().map(|t| t.term()).collect();
        group_label(&terms)
    }

    /// ROM directories to walk, sorted by name
    pub fn group_dirs(&self) -> Result<Vec<PathBuf>> {
        let root = self.options.root();
        let entries = fs::read_dir(root).map_err(|source| Error::RootUnavailable {
            path: root.to_path_buf(),
            source,
        })?;

        let mut dirs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| Error::RootUnavailable {
                path: root.to_path_buf(),
                source,
            })?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let wanted = if self.options.scan_all {
                name == self.options.primary_group || is_rom_dir(&name)
            } else {
                name == self.options.primary_group
            };
            if wanted && entry.path().is_dir() {
                dirs.push(entry.path());
            }
        }

        if dirs.is_empty() {
            warn!("No ROM directories found in {}", root.display());
        }
        dirs.sort();
        Ok(dirs)
    }

    /// Check a single file, returning its encoding if every term occurs in it
    pub fn scan_file(&self, path: &Path) -> Result<Option<Encoding>> {
        Ok(self.read_match(path)?.map(|(encoding, _)| encoding))
    }

    /// Like [`scan_file`](Self::scan_file), keeping the bytes of a match
    fn read_match(&self, path: &Path) -> Result<Option<(Encoding, Vec<u8>)>> {
        let data = fs::read(path)?;
        let classification = classify(&data, data.len() as u64);
        let payload = &data[classification.payload_offset as usize..];
        let found = self.needles.matches(payload, classification.encoding);
        Ok(found.then_some((classification.encoding, data)))
    }

    /// Lazily walk the archive and yield matching files
    ///
    /// Without search terms nothing is walked.
    pub fn matches(&self) -> Result<Matches<'_>> {
        let groups = if self.needles.is_empty() {
            Vec::new()
        } else {
            self.group_dirs()?
        };

        Ok(Matches {
            engine: self,
            groups: groups.into_iter(),
            walker: None,
            sequence: 0,
            failures: Vec::new(),
        })
    }

    /// Search, decode and catalog in one pass
    ///
    /// `file_id` resolves packed ids to index table ids for display. The
    /// catalog is rewritten once, after the walk.
    pub fn run<F>(&self, mut file_id: F) -> Result<SearchReport>
    where
        F: FnMut(PackedId) -> u32,
    {
        let mut report = SearchReport::default();
        if self.needles.is_empty() {
            info!("No search terms given, nothing to search");
            return Ok(report);
        }

        let decoder = Decoder::new(self.options.output_dir());
        let mut matches = self.matches()?;

        while let Some((record, data)) = matches.next_found() {
            let id = record
                .id
                .map(|id| file_id(id.packed()))
                .unwrap_or(FALLBACK_FILE_ID);
            info!("    Found ID 0x{:04X}: {}", id, record.path.display());

            let decoded = if self.options.auto_decode {
                match decoder.decode_data(&record.path, &data) {
                    Ok(path) => Some(path),
                    Err(error) => {
                        warn!("Failed to decode {}: {}", record.path.display(), error);
                        report.failures.push(ScanFailure {
                            path: record.path.clone(),
                            error,
                        });
                        None
                    }
                }
            } else {
                None
            };

            report.discoveries.push(Discovery {
                record,
                file_id: id,
                decoded,
            });
        }
        report.failures.extend(matches.into_failures());

        let decoded: Vec<&Path> = report.decoded().collect();
        if !decoded.is_empty() {
            let catalog_path = self.options.catalog_path();
            match catalog::merge(&self.label(), decoded, &catalog_path) {
                Ok(_) => report.catalog = Some(catalog_path),
                Err(error) => {
                    warn!("Failed to update {}: {}", catalog_path.display(), error);
                    report.failures.push(ScanFailure {
                        path: catalog_path,
                        error,
                    });
                }
            }
        }

        Ok(report)
    }
}

/// Lazy sequence of matches produced by [`SearchEngine::matches`]
pub struct Matches<'a> {
    engine: &'a SearchEngine,
    groups: std::vec::IntoIter<PathBuf>,
    walker: Option<walkdir::IntoIter>,
    sequence: usize,
    failures: Vec<ScanFailure>,
}

impl Matches<'_> {
    /// Files and directories skipped so far because of errors
    pub fn failures(&self) -> &[ScanFailure] {
        &self.failures
    }

    pub fn into_failures(self) -> Vec<ScanFailure> {
        self.failures
    }

    fn fail(&mut self, path: PathBuf, error: Error) {
        warn!("Skipping {}: {}", path.display(), error);
        self.failures.push(ScanFailure { path, error });
    }

    /// Next match together with the file contents that were searched
    fn next_found(&mut self) -> Option<(MatchRecord, Vec<u8>)> {
        loop {
            let Some(walker) = self.walker.as_mut() else {
                let dir = self.groups.next()?;
                info!("Searching in {}...", dir.display());
                self.walker = Some(WalkDir::new(dir).sort_by_file_name().into_iter());
                continue;
            };

            let entry = match walker.next() {
                None => {
                    self.walker = None;
                    continue;
                }
                Some(Err(e)) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                    self.fail(path, e.into());
                    continue;
                }
                Some(Ok(entry)) => entry,
            };

            if entry.file_type().is_dir() {
                if self.engine.options.verbose && entry.depth() > 0 {
                    info!("Searching in {}...", entry.path().display());
                }
                continue;
            }

            if !is_dat_name(&entry.file_name().to_string_lossy()) {
                continue;
            }

            match self.engine.read_match(entry.path()) {
                Ok(Some((encoding, data))) => {
                    self.sequence += 1;
                    let record = MatchRecord {
                        sequence: self.sequence,
                        path: entry.path().to_path_buf(),
                        id: ArchiveId::from_path(entry.path()),
                        encoding,
                    };
                    return Some((record, data));
                }
                Ok(None) => {}
                Err(e) => self.fail(entry.into_path(), e),
            }
        }
    }
}

impl Iterator for Matches<'_> {
    type Item = MatchRecord;

    fn next(&mut self) -> Option<MatchRecord> {
        self.next_found().map(|(record, _)| record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::xor_payload;
    use crate::encoding::DMSG_SIGNATURE;

    fn write_dat(root: &Path, rom: &str, group: u16, slot: u16, data: &[u8]) -> PathBuf {
        let dir = root.join(rom).join(group.to_string());
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(format!("{}.DAT", slot));
        fs::write(&path, data).unwrap();
        path
    }

    fn plain_file(payload: &[u8]) -> Vec<u8> {
        let mut data = b"\x01\x02\x03\x04\x05\x06\x07\x08".to_vec();
        data.extend_from_slice(payload);
        data
    }

    fn dmsg_file(payload: &[u8]) -> Vec<u8> {
        let mut data = vec![0u8; 0x40];
        data[..8].copy_from_slice(&DMSG_SIGNATURE);
        data[0x0A] = 1;
        let mut encoded = payload.to_vec();
        xor_payload(&mut encoded, 0xFF);
        data.extend_from_slice(&encoded);
        data
    }

    fn checksum_file(payload: &[u8]) -> Vec<u8> {
        let mut data = (0x1000_0000u32 + payload.len() as u32).to_le_bytes().to_vec();
        let mut encoded = payload.to_vec();
        xor_payload(&mut encoded, 0x80);
        data.extend_from_slice(&encoded);
        data
    }

    fn engine(root: &Path, terms: &[&str]) -> SearchEngine {
        SearchEngine::new(ScanOptions::new(root), terms).unwrap()
    }

    #[test]
    fn test_all_terms_required() {
        let dir = tempfile::tempdir().unwrap();
        write_dat(dir.path(), "ROM", 1, 1, &plain_file(b"Fire only"));
        write_dat(dir.path(), "ROM", 1, 2, &plain_file(b"Fire and Ice"));

        let both: Vec<_> = engine(dir.path(), &["Fire", "Ice"]).matches().unwrap().collect();
        assert_eq!(both.len(), 1);
        assert_eq!(both[0].id, ArchiveId::new(1, 2));

        let one: Vec<_> = engine(dir.path(), &["Fire"]).matches().unwrap().collect();
        assert_eq!(one.len(), 2);
        assert_eq!(one[0].sequence, 1);
        assert_eq!(one[1].sequence, 2);
    }

    #[test]
    fn test_encoded_payloads() {
        let dir = tempfile::tempdir().unwrap();
        write_dat(dir.path(), "ROM", 2, 1, &dmsg_file(b"..Blizzard.."));
        write_dat(dir.path(), "ROM", 2, 2, &checksum_file(b"Blizzard"));
        write_dat(dir.path(), "ROM", 2, 3, &plain_file(b"Blizzard"));
        write_dat(dir.path(), "ROM", 2, 4, &plain_file(b"Blizzaga"));

        let found: Vec<_> = engine(dir.path(), &["Blizzard"]).matches().unwrap().collect();
        let encodings: Vec<_> = found.iter().map(|m| m.encoding).collect();
        assert_eq!(
            encodings,
            [Encoding::Inverted, Encoding::ChecksumSigned, Encoding::Plain]
        );
    }

    #[test]
    fn test_header_bytes_are_not_searched() {
        let dir = tempfile::tempdir().unwrap();
        // "XISTRING" itself lives in the header
        let mut data = vec![0u8; 0x48];
        data[..8].copy_from_slice(b"XISTRING");
        write_dat(dir.path(), "ROM", 3, 3, &data);

        assert_eq!(engine(dir.path(), &["XISTRING"]).matches().unwrap().count(), 0);
    }

    #[test]
    fn test_only_numeric_dat_files() {
        let dir = tempfile::tempdir().unwrap();
        let rom = dir.path().join("ROM").join("1");
        fs::create_dir_all(&rom).unwrap();
        fs::write(rom.join("VTABLE.DAT"), plain_file(b"Stone")).unwrap();
        fs::write(rom.join("4.dat"), plain_file(b"Stone")).unwrap();
        fs::write(rom.join("5.DAT"), plain_file(b"Stone")).unwrap();

        let found: Vec<_> = engine(dir.path(), &["Stone"]).matches().unwrap().collect();
        assert_eq!(found.len(), 1);
        assert!(found[0].path.ends_with("5.DAT"));
    }

    #[test]
    fn test_scan_all_groups() {
        let dir = tempfile::tempdir().unwrap();
        write_dat(dir.path(), "ROM", 1, 1, &plain_file(b"Aero"));
        write_dat(dir.path(), "ROM2", 1, 1, &plain_file(b"Aero"));
        write_dat(dir.path(), "0", 1, 1, &plain_file(b"Aero"));
        write_dat(dir.path(), "DEC", 1, 1, &plain_file(b"Aero"));

        assert_eq!(engine(dir.path(), &["Aero"]).matches().unwrap().count(), 1);

        let options = ScanOptions::new(dir.path()).with_scan_all(true);
        let all = SearchEngine::new(options, &["Aero"]).unwrap();
        assert_eq!(all.matches().unwrap().count(), 3);
    }

    #[test]
    fn test_no_terms_no_scan() {
        let missing = Path::new("/nonexistent/datscan/root");
        let engine = engine(missing, &[]);
        assert_eq!(engine.matches().unwrap().count(), 0);
        let report = engine.run(|_| unreachable!()).unwrap();
        assert!(report.discoveries.is_empty());
        assert!(report.catalog.is_none());
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let missing = Path::new("/nonexistent/datscan/root");
        let engine = engine(missing, &["Fire"]);
        let result = engine.matches();
        assert!(matches!(result, Err(Error::RootUnavailable { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_file_does_not_stop_scan() {
        let dir = tempfile::tempdir().unwrap();
        write_dat(dir.path(), "ROM", 1, 2, &plain_file(b"Quake"));
        let broken = dir.path().join("ROM").join("1").join("1.DAT");
        std::os::unix::fs::symlink(dir.path().join("absent"), &broken).unwrap();

        let engine = engine(dir.path(), &["Quake"]);
        let mut matches = engine.matches().unwrap();
        let found: Vec<_> = matches.by_ref().collect();
        assert_eq!(found.len(), 1);
        assert_eq!(matches.failures().len(), 1);
        assert_eq!(matches.failures()[0].path, broken);
    }

    #[test]
    fn test_run_without_decode() {
        let dir = tempfile::tempdir().unwrap();
        write_dat(dir.path(), "ROM", 1, 1, &plain_file(b"Flood"));

        let options = ScanOptions::new(dir.path()).with_auto_decode(false);
        let report = SearchEngine::new(options, &["Flood"])
            .unwrap()
            .run(|_| 7)
            .unwrap();
        assert_eq!(report.discoveries.len(), 1);
        assert_eq!(report.discoveries[0].file_id, 7);
        assert!(report.discoveries[0].decoded.is_none());
        assert!(report.catalog.is_none());
        assert!(!dir.path().join("DEC").exists());
    }

    #[test]
    fn test_run_output_dir_blocked() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_dat(dir.path(), "ROM", 1, 1, &plain_file(b"Tornado"));
        let blocker = dir.path().join("blocked");
        fs::write(&blocker, b"").unwrap();

        let options = ScanOptions::new(dir.path()).with_output_dir(&blocker);
        let report = SearchEngine::new(options, &["Tornado"])
            .unwrap()
            .run(|_| 1)
            .unwrap();

        assert_eq!(report.discoveries.len(), 1);
        assert_eq!(report.discoveries[0].record.path, source);
        assert!(report.discoveries[0].decoded.is_none());
        assert!(report.failures.iter().any(|f| f.path == source));
        assert!(report.catalog.is_none());
    }

    #[test]
    fn test_run_catalog_blocked() {
        let dir = tempfile::tempdir().unwrap();
        write_dat(dir.path(), "ROM", 1, 1, &plain_file(b"Tornado"));
        let blocker = dir.path().join("blocked");
        fs::write(&blocker, b"").unwrap();
        let catalog_path = blocker.join(crate::catalog::CATALOG_NAME);

        let options = ScanOptions::new(dir.path()).with_catalog_path(&catalog_path);
        let report = SearchEngine::new(options, &["Tornado"])
            .unwrap()
            .run(|_| 1)
            .unwrap();

        assert_eq!(report.discoveries.len(), 1);
        let decoded = report.discoveries[0].decoded.as_deref().unwrap();
        assert_eq!(&fs::read(decoded).unwrap()[8..], b"Tornado");
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, catalog_path);
        assert!(report.catalog.is_none());
    }

    #[test]
    fn test_end_to_end_dialogue_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_dat(dir.path(), "ROM", 12, 34, &dmsg_file(b"TestWord\x00\x01"));
        let packed = ArchiveId::new(12, 34).unwrap().packed();

        let report = engine(dir.path(), &["TestWord"])
            .run(|p| if p == packed { 0x42 } else { 0 })
            .unwrap();

        assert!(report.failures.is_empty());
        assert_eq!(report.discoveries.len(), 1);
        let discovery = &report.discoveries[0];
        assert_eq!(discovery.record.sequence, 1);
        assert_eq!(discovery.record.path, source);
        assert_eq!(discovery.file_id, 0x42);

        let decoded_path = dir.path().join("DEC").join("ROM").join("12").join("34.DAT");
        assert_eq!(discovery.decoded.as_deref(), Some(decoded_path.as_path()));
        let decoded = fs::read(&decoded_path).unwrap();
        assert_eq!(&decoded[..0x40], &fs::read(&source).unwrap()[..0x40]);
        assert_eq!(&decoded[0x40..], b"TestWord\x00\x01");

        let catalog_path = dir.path().join("DEC").join("decoded.txt");
        assert_eq!(report.catalog.as_deref(), Some(catalog_path.as_path()));
        assert_eq!(
            fs::read_to_string(&catalog_path).unwrap(),
            "TestWord:\r\n    12/34\r\n\r\n"
        );
    }
}
