//! Payload encoding classification
//!
//! Every DAT file carries one of a few XOR obfuscation states, recognisable
//! from its first bytes and its total length:
//!
//! - Dialog tables whose first word is `0x10000000 + len - 4` are XORed with 0x80
//! - `XISTRING` and `d_msg` string tables flag inversion (XOR 0xFF) at offset 0x0A
//! - Everything else is stored plain

use byteorder::{ByteOrder, LittleEndian};
use std::io::{Read, Seek, SeekFrom};

use crate::error::Result;

/// Number of leading bytes classification may inspect
pub const HEADER_PROBE_LEN: usize = 0x40;

/// Bit set in the size word of checksum-signed files
pub const CHECKSUM_FLAG: u64 = 0x1000_0000;

/// Signature of string table files
pub const XISTRING_SIGNATURE: [u8; 8] = *b"XISTRING";

/// Signature of dialogue message files
pub const DMSG_SIGNATURE: [u8; 8] = *b"d_msg\0\0\0";

/// Offset of the inversion flag in string table headers
const INVERTED_FLAG_OFFSET: usize = 0x0A;

/// Payload start of string table files
const TEXT_PAYLOAD_OFFSET: u64 = 0x40;

/// Payload start of files without a recognised header
const GENERIC_PAYLOAD_OFFSET: u64 = 0x08;

/// Payload start of checksum-signed files
const CHECKSUM_PAYLOAD_OFFSET: u64 = 0x04;

/// Obfuscation state of a DAT payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// Stored as-is
    Plain,
    /// Text XORed with 0x80
    Shifted,
    /// Text XORed with 0xFF
    Inverted,
    /// File whose header word encodes its own size; payload XORed with 0x80
    ChecksumSigned,
}

impl Encoding {
    /// XOR key applied to the payload
    pub fn key(self) -> u8 {
        match self {
            Encoding::Plain => 0x00,
            Encoding::Shifted | Encoding::ChecksumSigned => 0x80,
            Encoding::Inverted => 0xFF,
        }
    }

    /// Encoding whose search needles apply to this payload
    pub fn needle_key(self) -> Encoding {
        match self {
            Encoding::ChecksumSigned => Encoding::Shifted,
            other => other,
        }
    }
}

/// Result of classifying a file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub encoding: Encoding,
    /// Offset where the payload starts; bytes before it are header
    pub payload_offset: u64,
}

/// Classify a file from its leading bytes and total length
///
/// `header` may be the whole file; only the first [`HEADER_PROBE_LEN`] bytes
/// are considered.
pub fn classify(header: &[u8], file_len: u64) -> Classification {
    let header = &header[..header.len().min(HEADER_PROBE_LEN)];

    let (encoding, payload_offset) = if is_checksum_signed(header, file_len) {
        (Encoding::ChecksumSigned, CHECKSUM_PAYLOAD_OFFSET)
    } else if is_text_table(header) {
        let inverted = header.get(INVERTED_FLAG_OFFSET) == Some(&1);
        let encoding = if inverted {
            Encoding::Inverted
        } else {
            Encoding::Plain
        };
        (encoding, TEXT_PAYLOAD_OFFSET)
    } else {
        (Encoding::Plain, GENERIC_PAYLOAD_OFFSET)
    };

    Classification {
        encoding,
        payload_offset: payload_offset.min(file_len),
    }
}

/// Classify a seekable stream, leaving its cursor at the payload start
pub fn classify_reader<R: Read + Seek>(reader: &mut R) -> Result<Classification> {
    let file_len = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(0))?;

    let mut header = Vec::with_capacity(HEADER_PROBE_LEN);
    reader
        .by_ref()
        .take(HEADER_PROBE_LEN as u64)
        .read_to_end(&mut header)?;

    let classification = classify(&header, file_len);
    reader.seek(SeekFrom::Start(classification.payload_offset))?;
    Ok(classification)
}

fn is_checksum_signed(header: &[u8], file_len: u64) -> bool {
    if header.len() < 4 || file_len < 4 {
        return false;
    }
    let format = LittleEndian::read_u32(&header[..4]) as u64;
    format == CHECKSUM_FLAG + file_len - 4
}

fn is_text_table(header: &[u8]) -> bool {
    header.len() >= 8 && (header[..8] == XISTRING_SIGNATURE || header[..8] == DMSG_SIGNATURE)
}
