//! Capture request

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Everything one capture needs, fixed before it starts
///
/// # Example
///
/// ```
/// use pmoradiorec::CaptureRequest;
///
/// let request = CaptureRequest::new("http://radio.example.org/jazz", "/tmp", "jazz", 30)?
///     .with_name("evening")
///     .with_icy_metadata(true);
/// assert_eq!(request.budget().as_secs(), 1800);
/// # Ok::<(), pmoradiorec::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    stream_url: String,
    output_dir: PathBuf,
    station: String,
    name: Option<String>,
    duration_minutes: u32,
    icy_metadata: bool,
    public_permissions: bool,
    verbose: bool,
}

impl CaptureRequest {
    /// Create a request with every option off
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRequest`] if `duration_minutes` is 0 or the station
    /// label or URL is empty.
    pub fn new(
        stream_url: impl Into<String>,
        output_dir: impl Into<PathBuf>,
        station: impl Into<String>,
        duration_minutes: u32,
    ) -> Result<Self> {
        let stream_url = stream_url.into();
        let station = station.into();

        if duration_minutes < 1 {
            return Err(Error::invalid_request(
                "Duration must be a positive integer.",
            ));
        }
        if station.trim().is_empty() {
            return Err(Error::invalid_request("Station label is empty"));
        }
        if stream_url.trim().is_empty() {
            return Err(Error::invalid_request("Stream URL is empty"));
        }

        Ok(Self {
            stream_url,
            output_dir: output_dir.into(),
            station,
            name: None,
            duration_minutes,
            icy_metadata: false,
            public_permissions: false,
            verbose: false,
        })
    }

    /// Optional name appended to the file name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.name = (!name.is_empty()).then_some(name);
        self
    }

    /// Ask for ICY metadata and write the `.meta` sidecar
    pub fn with_icy_metadata(mut self, enabled: bool) -> Self {
        self.icy_metadata = enabled;
        self
    }

    /// Make the audio file world readable and writable
    pub fn with_public_permissions(mut self, enabled: bool) -> Self {
        self.public_permissions = enabled;
        self
    }

    /// Forward progress lines to the reporter
    pub fn with_verbose(mut self, enabled: bool) -> Self {
        self.verbose = enabled;
        self
    }

    pub fn stream_url(&self) -> &str {
        &self.stream_url
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn station(&self) -> &str {
        &self.station
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    pub fn icy_metadata(&self) -> bool {
        self.icy_metadata
    }

    pub fn public_permissions(&self) -> bool {
        self.public_permissions
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Wall-clock budget of the capture
    pub fn budget(&self) -> Duration {
        Duration::from_secs(u64::from(self.duration_minutes) * 60)
    }
}
