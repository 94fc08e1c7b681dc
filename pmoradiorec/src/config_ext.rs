//! pmoconfig integration
//!
//! Adds the station table and the recording directory to `pmoconfig::Config`.
//!
//! ```yaml
//! global:
//!   target_dir: $HOME/Music/radio
//! stations:
//!   jazz: http://jazz.example.org:8000/stream
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use pmoconfig::Config;
//! use pmoradiorec::RadioRecConfigExt;
//!
//! let config = Config::load_config(None)?;
//! let url = config.get_station_url("jazz")?;
//! let target = config.get_target_dir()?;
//! ```

use crate::error::{Error, Result};
use pmoconfig::Config;
use std::path::PathBuf;

/// Default recording directory, relative to the settings directory
const DEFAULT_TARGET_DIR: &str = "recordings";

/// RadioRec settings on top of `pmoconfig::Config`
pub trait RadioRecConfigExt {
    /// Recording directory (`global.target_dir`), created if missing
    ///
    /// Environment variables are expanded; a relative path is resolved
    /// against the settings directory.
    fn get_target_dir(&self) -> Result<PathBuf>;

    /// Configured stations, sorted by name
    fn get_stations(&self) -> Result<Vec<(String, String)>>;

    /// URL of one station; names are case-insensitive
    ///
    /// # Errors
    ///
    /// [`Error::UnknownStation`] if the station is not configured.
    fn get_station_url(&self, station: &str) -> Result<String>;
}

impl RadioRecConfigExt for Config {
    fn get_target_dir(&self) -> Result<PathBuf> {
        Ok(self.get_managed_dir(&["global", "target_dir"], DEFAULT_TARGET_DIR)?)
    }

    fn get_stations(&self) -> Result<Vec<(String, String)>> {
        Ok(self.get_string_map(&["stations"])?.into_iter().collect())
    }

    fn get_station_url(&self, station: &str) -> Result<String> {
        self.get_string_map(&["stations"])?
            .remove(&station.to_lowercase())
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| Error::UnknownStation(station.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::from_yaml_str(
            "/tmp/radiorec",
            "stations:\n  Zulu: http://z\n  alpha: http://a\n  empty: ''\n",
        )
        .unwrap()
    }

    #[test]
    fn test_stations_sorted() {
        let names: Vec<_> = config()
            .get_stations()
            .unwrap()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["alpha", "empty", "zulu"]);
    }

    #[test]
    fn test_station_lookup_is_case_insensitive() {
        assert_eq!(config().get_station_url("ZULU").unwrap(), "http://z");
    }

    #[test]
    fn test_unknown_station() {
        let err = config().get_station_url("rock").unwrap_err();
        assert!(matches!(err, Error::UnknownStation(ref s) if s == "rock"));

        let err = config().get_station_url("empty").unwrap_err();
        assert!(matches!(err, Error::UnknownStation(_)));
    }

    #[test]
    fn test_target_dir_relative_to_settings() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_yaml_str(dir.path(), "global:\n  target_dir: rec\n").unwrap();
        let target = config.get_target_dir().unwrap();
        assert_eq!(target, dir.path().join("rec"));
        assert!(target.is_dir());
    }
}
