//! Mapping of the stream `Content-Type` to an output file extension

use crate::error::{Error, Result};

/// Audio container recorded to disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamFormat {
    /// MPEG audio (MP3)
    Mp3,
    /// AAC / AAC+ ADTS
    Aac,
    /// Ogg (Vorbis/Opus)
    Ogg,
}

impl StreamFormat {
    /// File extension including the leading dot
    pub fn extension(&self) -> &'static str {
        match self {
            StreamFormat::Mp3 => ".mp3",
            StreamFormat::Aac => ".aac",
            StreamFormat::Ogg => ".ogg",
        }
    }
}

/// Content types that announce a playlist rather than audio
const UNSUPPORTED: &[&str] = &["audio/x-mpegurl"];

/// Known audio content types, matched after normalization
const FORMATS: &[(&str, StreamFormat)] = &[
    ("audio/mpeg", StreamFormat::Mp3),
    ("application/aacp", StreamFormat::Aac),
    ("audio/aacp", StreamFormat::Aac),
    ("audio/aac", StreamFormat::Aac),
    ("application/ogg", StreamFormat::Ogg),
    ("audio/ogg", StreamFormat::Ogg),
];

/// Used for anything not in the table, including a missing header
const FALLBACK: StreamFormat = StreamFormat::Mp3;

/// Outcome of resolving a content type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFormat {
    pub format: StreamFormat,
    /// Header value as received, if any
    pub declared: Option<String>,
    /// True when the fallback was used; callers should warn
    pub fallback: bool,
}

impl ResolvedFormat {
    pub fn extension(&self) -> &'static str {
        self.format.extension()
    }

    /// Warning text for a fallback resolution
    pub fn warning(&self) -> Option<String> {
        if !self.fallback {
            return None;
        }
        Some(match &self.declared {
            Some(ct) => format!(
                "Unknown content type \"{}\". Assuming {}.",
                ct,
                &FALLBACK.extension()[1..]
            ),
            None => format!(
                "No content type. Assuming {}.",
                &FALLBACK.extension()[1..]
            ),
        })
    }
}

/// Lower-cases, drops parameters (`; charset=...`) and trims
fn normalize(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Resolve a `Content-Type` header value
///
/// # Errors
///
/// [`Error::UnsupportedFormat`] for M3U playlists (`audio/x-mpegurl`).
pub fn resolve_content_type(content_type: Option<&str>) -> Result<ResolvedFormat> {
    let declared = content_type.map(str::to_string);
    let Some(raw) = content_type else {
        return Ok(ResolvedFormat {
            format: FALLBACK,
            declared,
            fallback: true,
        });
    };

    let key = normalize(raw);
    if UNSUPPORTED.contains(&key.as_str()) {
        return Err(Error::UnsupportedFormat(format!(
            "{} (M3U playlists are not supported as stream)",
            raw
        )));
    }

    let (format, fallback) = FORMATS
        .iter()
        .find(|(ct, _)| *ct == key)
        .map(|(_, format)| (*format, false))
        .unwrap_or((FALLBACK, true));

    Ok(ResolvedFormat {
        format,
        declared,
        fallback,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table() {
        let cases = [
            ("audio/mpeg", ".mp3"),
            ("application/aacp", ".aac"),
            ("audio/aacp", ".aac"),
            ("audio/aac", ".aac"),
            ("application/ogg", ".ogg"),
            ("audio/ogg", ".ogg"),
        ];
        for (ct, ext) in cases {
            let resolved = resolve_content_type(Some(ct)).unwrap();
            assert_eq!(resolved.extension(), ext, "{}", ct);
            assert!(!resolved.fallback);
            assert!(resolved.warning().is_none());
        }
    }

    #[test]
    fn test_unknown_falls_back_to_mp3() {
        let resolved = resolve_content_type(Some("video/x-flv")).unwrap();
        assert_eq!(resolved.format, StreamFormat::Mp3);
        assert!(resolved.fallback);
        assert_eq!(
            resolved.warning().unwrap(),
            "Unknown content type \"video/x-flv\". Assuming mp3."
        );
    }

    #[test]
    fn test_missing_header_falls_back() {
        let resolved = resolve_content_type(None).unwrap();
        assert_eq!(resolved.extension(), ".mp3");
        assert!(resolved.fallback);
        assert!(resolved.declared.is_none());
        assert!(resolved.warning().is_some());
    }

    #[test]
    fn test_playlist_is_unsupported() {
        let err = resolve_content_type(Some("audio/x-mpegurl")).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));

        let err = resolve_content_type(Some("Audio/X-MpegURL; charset=utf-8")).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }

    #[test]
    fn test_normalization() {
        let resolved = resolve_content_type(Some(" Audio/MPEG ; charset=binary")).unwrap();
        assert_eq!(resolved.format, StreamFormat::Mp3);
        assert!(!resolved.fallback);
        assert_eq!(
            resolved.declared.as_deref(),
            Some(" Audio/MPEG ; charset=binary")
        );
    }
}
