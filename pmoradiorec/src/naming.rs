//! Output file naming
//!
//! `<output_dir>/<YYYY-MM-DDTHH_MM_SS>_<station>[_<name>].<ext>` for the audio
//! and `<same base>.meta` for the metadata sidecar.

use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};

/// strftime pattern of the timestamp prefix
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H_%M_%S";

/// Extension of the metadata sidecar
pub const METADATA_EXTENSION: &str = ".meta";

/// Paths of the files produced by one capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureNames {
    pub audio: PathBuf,
    pub metadata: PathBuf,
}

impl CaptureNames {
    /// Compute both names
    ///
    /// `extension` includes its leading dot, as returned by
    /// [`StreamFormat::extension`](crate::StreamFormat::extension).
    pub fn new(
        output_dir: &Path,
        timestamp: NaiveDateTime,
        station: &str,
        name: Option<&str>,
        extension: &str,
    ) -> Self {
        let base = base_name(timestamp, station, name);
        Self {
            audio: output_dir.join(format!("{}{}", base, extension)),
            metadata: output_dir.join(format!("{}{}", base, METADATA_EXTENSION)),
        }
    }
}

fn base_name(timestamp: NaiveDateTime, station: &str, name: Option<&str>) -> String {
    let mut base = format!("{}_{}", timestamp.format(TIMESTAMP_FORMAT), station);
    if let Some(name) = name.filter(|n| !n.is_empty()) {
        base.push('_');
        base.push_str(name);
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2024-03-01T10_00_00", TIMESTAMP_FORMAT).unwrap()
    }

    #[test]
    fn test_station_only() {
        let names = CaptureNames::new(Path::new("/rec"), ts(), "jazz", None, ".mp3");
        assert_eq!(names.audio, Path::new("/rec/2024-03-01T10_00_00_jazz.mp3"));
        assert_eq!(names.metadata, Path::new("/rec/2024-03-01T10_00_00_jazz.meta"));
    }

    #[test]
    fn test_with_name() {
        let names = CaptureNames::new(Path::new("/rec"), ts(), "fip", Some("morning"), ".aac");
        assert_eq!(
            names.audio.file_name().unwrap(),
            "2024-03-01T10_00_00_fip_morning.aac"
        );
        assert_eq!(
            names.metadata.file_name().unwrap(),
            "2024-03-01T10_00_00_fip_morning.meta"
        );
    }

    #[test]
    fn test_empty_name_is_ignored() {
        let names = CaptureNames::new(Path::new("."), ts(), "jazz", Some(""), ".ogg");
        assert_eq!(names.audio.file_name().unwrap(), "2024-03-01T10_00_00_jazz.ogg");
    }
}
