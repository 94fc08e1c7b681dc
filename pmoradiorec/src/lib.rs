//! Internet radio recorder for RadioRec
//!
//! This crate records a live HTTP audio stream to a file for a bounded time
//! and, on request, logs the ICY "now playing" metadata embedded in the stream
//! to a `.meta` sidecar.
//!
//! # Features
//!
//! - **Capture engine**: one long-lived GET, audio and metadata demultiplexed
//!   by the `icy-metaint` interval, files closed on every exit path
//! - **Supervisor**: wall-clock budget enforced by cooperative cancellation
//! - **ICY codec**: `StreamTitle='...';` blocks decoded to ordered key/values
//! - **Content-type mapping**: `.mp3`, `.aac` or `.ogg`, M3U rejected
//! - **Playlist resolution**: `.m3u` station URLs resolved to their first entry
//! - **Configuration extension**: station table and target directory from
//!   `pmoconfig`
//!
//! # Example
//!
//! ```no_run
//! use pmoradiorec::{CaptureEngine, CaptureRequest, CaptureSupervisor, StdoutReporter};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = CaptureEngine::builder()
//!         .reporter(Arc::new(StdoutReporter))
//!         .build()?;
//!     let supervisor = CaptureSupervisor::new(engine);
//!
//!     let request = CaptureRequest::new("http://radio.example.org/jazz", "/tmp", "jazz", 30)?
//!         .with_icy_metadata(true)
//!         .with_verbose(true);
//!
//!     let outcome = supervisor.run(request).await;
//!     if let Some(Ok(summary)) = outcome.settle(Duration::from_secs(5)).await {
//!         println!("Saved {}", summary.audio_path.display());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Limitations
//!
//! No timeout is applied to individual reads: a server that stops sending
//! without closing the connection keeps the engine waiting. The supervisor
//! still returns at the deadline; only the engine task stays blocked.

pub mod capture;
pub mod content_type;
pub mod error;
pub mod icy;
pub mod naming;
pub mod playlist;
pub mod reporter;
pub mod request;
pub mod supervisor;

#[cfg(feature = "pmoconfig")]
pub mod config_ext;

// Re-exports
pub use capture::{
    CaptureEngine, CaptureState, CaptureSummary, EngineBuilder, StreamHeaders,
    DEFAULT_READ_LENGTH, DEFAULT_USER_AGENT,
};
pub use content_type::{resolve_content_type, ResolvedFormat, StreamFormat};
pub use error::{Error, Result};
pub use icy::{parse_icy, IcyMetadataFrame};
pub use naming::CaptureNames;
pub use playlist::resolve_stream_url;
pub use reporter::{reporter_for, MemoryReporter, Reporter, SilentReporter, StdoutReporter};
pub use request::CaptureRequest;
pub use supervisor::{CaptureSupervisor, SupervisorOutcome};

#[cfg(feature = "pmoconfig")]
pub use config_ext::RadioRecConfigExt;
