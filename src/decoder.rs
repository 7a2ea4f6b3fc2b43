//! DAT payload decoding
//!
//! Decoding copies the header verbatim and XORs the payload with the key of
//! the classified [`Encoding`]. XOR is its own inverse, so decoding twice with
//! the same key restores the original bytes.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::encoding::{classify, Classification};
use crate::error::Result;

/// Number of trailing source path components mirrored below the output root
pub const MIRRORED_COMPONENTS: usize = 3;

/// XOR every byte with `key` in place
pub fn xor_payload(data: &mut [u8], key: u8) {
    if key == 0 {
        return;
    }
    for byte in data {
        *byte ^= key;
    }
}

/// Decode a whole file held in memory
pub fn decode_bytes(data: &[u8]) -> (Classification, Vec<u8>) {
    let classification = classify(data, data.len() as u64);
    let mut out = data.to_vec();
    let start = classification.payload_offset as usize;
    xor_payload(&mut out[start..], classification.encoding.key());
    (classification, out)
}

/// Output location of a decoded file: `dest_root` plus the last three
/// components of `source` (`ROM/<group>/<slot>.DAT`)
pub fn output_path(source: &Path, dest_root: &Path) -> PathBuf {
    let components: Vec<_> = source.components().collect();
    let skip = components.len().saturating_sub(MIRRORED_COMPONENTS);
    let mut path = dest_root.to_path_buf();
    for component in &components[skip..] {
        path.push(component);
    }
    path
}

/// Create a directory tree, treating an existing directory as success
pub fn ensure_dir(dir: &Path) -> Result<()> {
    match fs::create_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Writes decoded copies of DAT files into a mirrored output tree
#[derive(Debug, Clone)]
pub struct Decoder {
    dest_root: PathBuf,
}

impl Decoder {
    /// Create a decoder writing below `dest_root`
    pub fn new<P: Into<PathBuf>>(dest_root: P) -> Self {
        Self {
            dest_root: dest_root.into(),
        }
    }

    /// Root of the decoded output tree
    pub fn dest_root(&self) -> &Path {
        &self.dest_root
    }

    /// Decode `source` and return the path of the written file
    pub fn decode<P: AsRef<Path>>(&self, source: P) -> Result<PathBuf> {
        let source = source.as_ref();
        let data = fs::read(source)?;
        self.decode_data(source, &data)
    }

    /// Decode contents already read from `source`
    pub fn decode_data(&self, source: &Path, data: &[u8]) -> Result<PathBuf> {
        let out_path = output_path(source, &self.dest_root);
        if let Some(parent) = out_path.parent() {
            ensure_dir(parent)?;
        }

        let (classification, decoded) = decode_bytes(data);
        info!(
            "    Saving decoded file to {} ({:?})",
            out_path.display(),
            classification.encoding
        );

        let mut file = File::create(&out_path)?;
        file.write_all(&decoded)?;

        Ok(out_path)
    }
}
