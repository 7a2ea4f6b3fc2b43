//! Search terms and their encoded byte needles
//!
//! Terms are matched against raw, undecoded payloads, so each term is
//! converted to Shift-JIS once and pre-XORed with every key a payload can
//! carry.

use encoding_rs::SHIFT_JIS;
use memchr::memmem::Finder;

use crate::decoder::xor_payload;
use crate::encoding::Encoding;
use crate::error::{Error, Result};

/// Decode `\xHH` escapes and encode the rest of `term` to Shift-JIS
pub fn term_bytes(term: &str) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(term.len());
    let mut rest = term;

    while let Some(pos) = rest.find("\\x") {
        encode_text(&rest[..pos], term, &mut bytes)?;
        let hex = rest
            .get(pos + 2..pos + 4)
            .filter(|h| h.bytes().all(|b| b.is_ascii_hexdigit()))
            .ok_or_else(|| Error::InvalidTerm(format!("bad \\x escape in {:?}", term)))?;
        // Two validated hex digits always fit a byte
        bytes.push(u8::from_str_radix(hex, 16).map_err(|e| Error::InvalidTerm(e.to_string()))?);
        rest = &rest[pos + 4..];
    }
    encode_text(rest, term, &mut bytes)?;

    if bytes.is_empty() {
        return Err(Error::InvalidTerm("empty search term".into()));
    }
    Ok(bytes)
}

fn encode_text(text: &str, term: &str, out: &mut Vec<u8>) -> Result<()> {
    if text.is_empty() {
        return Ok(());
    }
    let (encoded, _, had_errors) = SHIFT_JIS.encode(text);
    if had_errors {
        return Err(Error::InvalidTerm(format!(
            "{:?} cannot be represented in Shift-JIS",
            term
        )));
    }
    out.extend_from_slice(&encoded);
    Ok(())
}

/// One search term with a needle per payload key
pub struct TermNeedles {
    term: String,
    plain: Finder<'static>,
    shifted: Finder<'static>,
    inverted: Finder<'static>,
}

impl TermNeedles {
    /// Build the needles for a term
    pub fn new(term: &str) -> Result<Self> {
        let bytes = term_bytes(term)?;
        let keyed = |key: u8| {
            let mut needle = bytes.clone();
            xor_payload(&mut needle, key);
            Finder::new(&needle).into_owned()
        };

        Ok(Self {
            term: term.to_string(),
            plain: keyed(Encoding::Plain.key()),
            shifted: keyed(Encoding::Shifted.key()),
            inverted: keyed(Encoding::Inverted.key()),
        })
    }

    /// The term as supplied by the operator
    pub fn term(&self) -> &str {
        &self.term
    }

    fn finder(&self, encoding: Encoding) -> &Finder<'static> {
        match encoding.needle_key() {
            Encoding::Plain => &self.plain,
            Encoding::Shifted | Encoding::ChecksumSigned => &self.shifted,
            Encoding::Inverted => &self.inverted,
        }
    }

    /// Needle bytes searched for in payloads of the given encoding
    pub fn needle(&self, encoding: Encoding) -> &[u8] {
        self.finder(encoding).needle()
    }

    /// Check whether this term occurs in a raw payload
    pub fn is_in(&self, data: &[u8], encoding: Encoding) -> bool {
        self.finder(encoding).find(data).is_some()
    }
}

/// Needles for every term of one search
pub struct NeedleSet {
    terms: Vec<TermNeedles>,
}

impl NeedleSet {
    /// Build needles for all terms
    pub fn new<S: AsRef<str>>(terms: &[S]) -> Result<Self> {
        let terms = terms
            .iter()
            .map(|t| TermNeedles::new(t.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { terms })
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn terms(&self) -> &[TermNeedles] {
        &self.terms
    }

    /// A payload matches when every term occurs in it
    pub fn matches(&self, data: &[u8], encoding: Encoding) -> bool {
        !self.terms.is_empty() && self.terms.iter().all(|t| t.is_in(data, encoding))
    }
}
