//! # datscan
//!
//! A Rust library for searching and decoding FINAL FANTASY XI style `.DAT`
//! resource archives.
//!
//! ## Overview
//!
//! The game stores its resources as numbered `ROM/<group>/<slot>.DAT` files,
//! indexed by `FTABLE.DAT`. Text payloads are lightly obfuscated with a
//! single-byte XOR key chosen per file. This library provides:
//!
//! - Loading the `FTABLE.DAT` index and translating between paths and file ids
//! - Classifying a file's obfuscation from its header and length
//! - Decoding payloads into a mirrored output tree
//! - Multi-term searching of raw payloads without decoding them first
//! - A persistent catalog of search results
//!
//! ## Example - Searching
//!
//! ```rust,no_run
//! use datscan::{IndexTable, ScanOptions, SearchEngine};
//!
//! fn main() -> anyhow::Result<()> {
//!     let options = ScanOptions::new("C:/Games/FINAL FANTASY XI");
//!     let index = IndexTable::open(options.index_path())?;
//!
//!     let engine = SearchEngine::new(options, &["Fire", "Ice"])?;
//!     let report = engine.run(|packed| index.lookup(packed))?;
//!
//!     for found in &report.discoveries {
//!         println!("0x{:04X} {}", found.file_id, found.record.path.display());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Example - Decoding
//!
//! ```rust,no_run
//! use datscan::Decoder;
//!
//! fn main() -> anyhow::Result<()> {
//!     let decoder = Decoder::new("DEC");
//!     let out = decoder.decode("ROM/118/108.DAT")?;
//!     println!("Decoded to {}", out.display());
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod catalog;
pub mod decoder;
pub mod encoding;
pub mod error;
pub mod index;
pub mod needle;
pub mod options;
pub mod scan_utils;
pub mod search;

pub use archive::{ArchiveId, PackedId};
pub use catalog::Catalog;
pub use decoder::Decoder;
pub use encoding::{classify, Classification, Encoding};
pub use error::{Error, Result};
pub use index::IndexTable;
pub use options::ScanOptions;
pub use search::{Discovery, MatchRecord, Matches, SearchEngine, SearchReport};
