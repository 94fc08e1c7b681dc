//! ICY in-band metadata decoding
//!
//! Shoutcast/Icecast servers interleave a metadata block every `icy-metaint`
//! audio bytes. A block is announced by one length byte (`len * 16` bytes
//! follow) and carries text such as:
//!
//! ```text
//! StreamTitle='Artist - Song';StreamUrl='';
//! ```
//!
//! padded with NUL bytes up to the announced length.

use crate::error::{Error, Result};

/// Size unit of the metadata length byte
pub const ICY_BLOCK_UNIT: usize = 16;

/// Prefix of the response headers describing an ICY stream
pub const ICY_HEADER_PREFIX: &str = "icy-";

/// Header carrying the number of audio bytes between two metadata blocks
pub const ICY_METAINT_HEADER: &str = "icy-metaint";

/// One decoded metadata block
///
/// Keys keep the order in which they appeared on the wire. A repeated key keeps
/// its first position and takes the last value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IcyMetadataFrame {
    fields: Vec<(String, String)>,
}

impl IcyMetadataFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a field
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// `StreamTitle`, the field players display as "now playing"
    pub fn stream_title(&self) -> Option<&str> {
        self.get("StreamTitle")
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Remove the NUL padding from a raw metadata block
pub fn strip_padding(block: &[u8]) -> Vec<u8> {
    block.iter().copied().filter(|&b| b != 0).collect()
}

/// Decode one metadata block (padding already stripped)
///
/// Fields are separated by `;`, empty fields are ignored. Each field is split
/// on its first `=`. The value is trimmed and then loses its first and last
/// character, whatever they are: servers wrap values in single quotes, and
/// the quotes are removed by position. A value shorter than two characters
/// decodes to the empty string.
///
/// # Errors
///
/// [`Error::MalformedMetadata`] if the block is not UTF-8 or a field has no `=`.
pub fn parse_icy(block: &[u8]) -> Result<IcyMetadataFrame> {
    let text = std::str::from_utf8(block)
        .map_err(|e| Error::malformed(format!("invalid UTF-8: {}", e)))?;

    let mut frame = IcyMetadataFrame::new();
    for field in text.split(';').filter(|f| !f.is_empty()) {
        let (key, raw_value) = field
            .split_once('=')
            .ok_or_else(|| Error::malformed(format!("field without '=': {:?}", field)))?;
        frame.insert(key, strip_delimiters(raw_value.trim()));
    }

    Ok(frame)
}

fn strip_delimiters(value: &str) -> &str {
    let mut chars = value.char_indices();
    match (chars.next(), chars.next_back()) {
        (Some((_, first)), Some((last, _))) => &value[first.len_utf8()..last],
        _ => "",
    }
}
