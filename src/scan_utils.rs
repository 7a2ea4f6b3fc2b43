//! Archive scan utility functions
//!
//! This module contains the operations behind the command line tool:
//! searching, decoding files by path or id, and translating between DAT
//! paths and index table ids.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::cell::OnceCell;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::{
    archive::ArchiveId, catalog, Decoder, IndexTable, ScanOptions, SearchEngine, SearchReport,
};

/// Load the index table, degrading to an empty table when it is unreadable
///
/// Every lookup against the empty table falls back to file id 0.
pub fn load_index(path: &Path) -> IndexTable {
    match IndexTable::open(path) {
        Ok(table) => table,
        Err(e) => {
            warn!("Could not read index table {}: {}", path.display(), e);
            IndexTable::default()
        }
    }
}

/// Search the archive for files containing every term
pub fn search_archive(options: &ScanOptions, terms: &[String]) -> Result<SearchReport> {
    if terms.is_empty() {
        println!("No search terms given");
        return Ok(SearchReport::default());
    }

    let engine = SearchEngine::new(options.clone(), terms).context("Invalid search term")?;

    println!();
    println!("Searching for \"{}\"", engine.label());
    println!("----------------");

    // Only built once the first match needs a display id
    let index = OnceCell::new();
    let index_path = options.index_path();
    let report = engine
        .run(|packed| {
            index
                .get_or_init(|| load_index(&index_path))
                .lookup(packed)
        })
        .with_context(|| format!("Failed to search {}", engine.options().root().display()))?;

    println!();
    println!("Found: {} files", report.discoveries.len());
    let decoded = report.decoded().count();
    if decoded > 0 {
        println!("Decoded: {} files into {}", decoded, options.output_dir().display());
    }
    if let Some(catalog) = &report.catalog {
        println!("Catalog: {}", catalog.display());
    }
    if !report.failures.is_empty() {
        println!("Failed: {} files", report.failures.len());
        for failure in &report.failures {
            println!("  {}: {}", failure.path.display(), failure.error);
        }
    }

    Ok(report)
}

/// Parse a file id given in decimal or `0x` hexadecimal
pub fn parse_file_id(text: &str) -> Option<u32> {
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

/// Resolve a decode target: an existing path, or a file id from the index table
pub fn resolve_target(
    options: &ScanOptions,
    index: &OnceCell<IndexTable>,
    target: &str,
) -> Result<PathBuf> {
    let path = PathBuf::from(target);
    if path.exists() {
        return Ok(path);
    }

    let file_id = parse_file_id(target)
        .with_context(|| format!("{} is neither a file nor a file id", target))?;
    index
        .get_or_init(|| load_index(&options.index_path()))
        .path_of(file_id, &options.primary_dir())
        .with_context(|| format!("File id {} is not in the index table", file_id))
}

/// Decode files given by path or file id, optionally cataloging them under
/// `label`
pub fn decode_files(
    options: &ScanOptions,
    targets: &[String],
    label: Option<&str>,
) -> Result<Vec<PathBuf>> {
    let decoder = Decoder::new(options.output_dir());
    let index = OnceCell::new();

    let pb = ProgressBar::new(targets.len() as u64);
    pb.set_style(ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
    )?);

    let mut decoded = Vec::new();
    let mut failed = 0u64;

    for target in targets {
        pb.set_message(target.clone());

        match resolve_target(options, &index, target)
            .and_then(|path| decoder.decode(&path).map_err(Into::into))
        {
            Ok(out) => decoded.push(out),
            Err(e) => {
                pb.println(format!("Error decoding {}: {:#}", target, e));
                failed += 1;
            }
        }

        pb.inc(1);
    }

    pb.finish_with_message("Done");

    println!();
    println!("Decoded: {} files into {}", decoded.len(), decoder.dest_root().display());
    if failed > 0 {
        println!("Failed: {} files", failed);
    }

    if let Some(label) = label.filter(|_| !decoded.is_empty()) {
        let catalog_path = options.catalog_path();
        catalog::merge(label, &decoded, &catalog_path)
            .with_context(|| format!("Failed to update {}", catalog_path.display()))?;
        println!("Catalog: {}", catalog_path.display());
    }

    Ok(decoded)
}

/// Print the index table id of each DAT path
pub fn show_ids(options: &ScanOptions, paths: &[PathBuf]) -> Result<()> {
    let index = IndexTable::open(options.index_path())
        .with_context(|| format!("Failed to open {}", options.index_path().display()))?;

    for path in paths {
        match ArchiveId::from_path(path) {
            Some(id) => println!(
                "0x{:04X} ({}) {}",
                index.lookup(id.packed()),
                id,
                path.display()
            ),
            None => println!("{}: not an archive path", path.display()),
        }
    }

    Ok(())
}

/// Print the DAT path of each index table id
pub fn show_paths(options: &ScanOptions, ids: &[String]) -> Result<()> {
    let index = IndexTable::open(options.index_path())
        .with_context(|| format!("Failed to open {}", options.index_path().display()))?;

    for text in ids {
        let path = parse_file_id(text)
            .and_then(|id| index.path_of(id, &options.primary_dir()));
        match path {
            Some(path) => println!("{}: {}", text, path.display()),
            None => println!("{}: not in the index table", text),
        }
    }

    Ok(())
}
