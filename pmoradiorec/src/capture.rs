//! Stream capture engine
//!
//! Opens the HTTP stream, demultiplexes audio and ICY metadata, and writes the
//! audio file and the optional `.meta` sidecar.
//!
//! A session goes through
//! `Connecting → HeadersReceived → Streaming → {Completed | Aborted | Cancelled}`.
//! `Completed` and `Cancelled` are reported in the [`CaptureSummary`], an
//! aborted session is an `Err`.
//!
//! # Example
//!
//! ```no_run
//! use pmoradiorec::{CaptureEngine, CaptureRequest};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = CaptureEngine::new()?;
//!     let request = CaptureRequest::new("http://radio.example.org/jazz", "/tmp", "jazz", 1)?
//!         .with_icy_metadata(true);
//!
//!     let token = CancellationToken::new();
//!     let summary = engine.capture(&request, token).await?;
//!     println!("{} bytes in {}", summary.audio_bytes, summary.audio_path.display());
//!     Ok(())
//! }
//! ```

use crate::content_type::{resolve_content_type, ResolvedFormat};
use crate::error::{Error, Result};
use crate::icy::{parse_icy, strip_padding, ICY_BLOCK_UNIT, ICY_HEADER_PREFIX, ICY_METAINT_HEADER};
use crate::naming::CaptureNames;
use crate::reporter::{Reporter, SilentReporter};
use crate::request::CaptureRequest;
use futures::TryStreamExt;
use reqwest::header::{HeaderMap, CONTENT_TYPE, USER_AGENT};
use reqwest::Client;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// User-Agent sent with every stream request
pub const DEFAULT_USER_AGENT: &str = "RadioRec";

/// Audio read size when the stream carries no metadata
pub const DEFAULT_READ_LENGTH: usize = 1024;

/// Request header asking the server to interleave metadata
pub const ICY_METADATA_REQUEST_HEADER: &str = "Icy-MetaData";

#[cfg(windows)]
const LINE_ENDING: &str = "\r\n";
#[cfg(not(windows))]
const LINE_ENDING: &str = "\n";

/// Lifecycle of one capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Connecting,
    HeadersReceived,
    Streaming,
    /// Server closed the stream
    Completed,
    /// Fatal error, the session returned `Err`
    Aborted,
    /// Cancellation was observed
    Cancelled,
}

/// `icy-*` response headers, captured once when the connection opens
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamHeaders {
    entries: Vec<(String, String)>,
}

impl StreamHeaders {
    /// Keep the headers whose name starts with `icy-` (any case)
    pub fn from_header_map(headers: &HeaderMap) -> Self {
        let entries = headers
            .iter()
            .filter(|(name, _)| {
                name.as_str()
                    .get(..ICY_HEADER_PREFIX.len())
                    .is_some_and(|p| p.eq_ignore_ascii_case(ICY_HEADER_PREFIX))
            })
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Metadata interval, if advertised as a positive integer
    pub fn metaint(&self) -> Option<usize> {
        self.get(ICY_METAINT_HEADER)
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|&n| n > 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Result of a session that was not aborted
#[derive(Debug, Clone)]
pub struct CaptureSummary {
    pub audio_path: PathBuf,
    /// Present only when metadata mode was active
    pub metadata_path: Option<PathBuf>,
    pub format: ResolvedFormat,
    pub headers: StreamHeaders,
    pub audio_bytes: u64,
    pub metadata_frames: u64,
    pub malformed_frames: u64,
    /// Recovered problems (content-type fallback, permissions)
    pub warnings: Vec<String>,
    /// `Completed` or `Cancelled`
    pub final_state: CaptureState,
}

/// Records HTTP audio streams
///
/// Cheap to clone: the HTTP connection pool and the reporter are shared.
#[derive(Debug, Clone)]
pub struct CaptureEngine {
    client: Client,
    user_agent: String,
    reporter: Arc<dyn Reporter>,
}

impl CaptureEngine {
    /// Create an engine with default settings and no verbose output
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Create a builder for configuring the engine
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Get the internal HTTP client
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    /// Sink for verbose output
    pub fn reporter(&self) -> &Arc<dyn Reporter> {
        &self.reporter
    }

    /// Record `request.stream_url()` until the server closes the stream or
    /// `cancel` fires
    ///
    /// Cancellation is checked once per audio chunk, before the next read.
    /// A read that is already waiting for data is not interrupted.
    ///
    /// # Errors
    ///
    /// - [`Error::Http`] / [`Error::HttpStatus`]: the connection could not be opened
    /// - [`Error::UnsupportedFormat`]: playlist content type, no file created
    /// - [`Error::StreamInterrupted`]: the connection failed mid-stream; the
    ///   partial audio file is kept
    /// - [`Error::Io`]: an output file could not be created or written
    /// - [`Error::Cancelled`]: `cancel` fired before the output files were
    ///   created; nothing is written
    pub async fn capture(
        &self,
        request: &CaptureRequest,
        cancel: CancellationToken,
    ) -> Result<CaptureSummary> {
        let reporter = request.verbose().then(|| self.reporter.clone());

        debug!(url = request.stream_url(), state = ?CaptureState::Connecting, "Opening stream");
        let mut http_request = self
            .client
            .get(request.stream_url())
            .header(USER_AGENT, &self.user_agent);
        if request.icy_metadata() {
            http_request = http_request.header(ICY_METADATA_REQUEST_HEADER, "1");
        }

        let response = http_request.send().await?;
        if !response.status().is_success() {
            return Err(Error::HttpStatus {
                status: response.status(),
                url: request.stream_url().to_string(),
            });
        }

        debug!(state = ?CaptureState::HeadersReceived, status = %response.status(), "Stream opened");
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());
        let format = resolve_content_type(content_type.as_deref())?;

        let mut warnings = Vec::new();
        if let Some(warning) = format.warning() {
            warn!("{}", warning);
            warnings.push(warning);
        }

        let headers = StreamHeaders::from_header_map(response.headers());
        let metaint = if request.icy_metadata() {
            headers.metaint()
        } else {
            None
        };
        if request.icy_metadata() && metaint.is_none() {
            debug!("Server did not advertise icy-metaint, metadata disabled");
        }

        let names = CaptureNames::new(
            request.output_dir(),
            chrono::Local::now().naive_local(),
            request.station(),
            request.name(),
            format.extension(),
        );

        if cancel.is_cancelled() {
            debug!(state = ?CaptureState::Cancelled, "Cancelled before any file was created");
            return Err(Error::Cancelled);
        }

        let audio = AudioFile::create(&names.audio).await?;
        if request.public_permissions() {
            report(&reporter, "Apply public write permissions (Linux only)");
            match widen_permissions(&names.audio).await {
                Ok(()) => {}
                Err(e) if e.is_recoverable() => {
                    warn!(path = %names.audio.display(), "{}", e);
                    warnings.push(e.to_string());
                }
                Err(e) => return Err(e),
            }
        }

        let sidecar = match metaint {
            Some(_) => {
                let mut log = MetadataLog::create(&names.metadata).await?;
                for (name, value) in headers.iter() {
                    let line = format!("{}: {}", name, value);
                    report(&reporter, &line);
                    log.write_line(&line).await?;
                }
                Some(log)
            }
            None => None,
        };

        report(&reporter, &format!("Recording {}...", request.station()));
        info!(
            station = request.station(),
            path = %names.audio.display(),
            metaint = metaint.unwrap_or(0),
            "Recording started"
        );

        let body = response.bytes_stream().map_err(io::Error::other);
        let reader = StreamReader::new(Box::pin(body));

        let session = CaptureSession::new(reader, audio, sidecar, metaint, reporter);
        let outcome = session.run(cancel).await;

        match &outcome {
            Ok(stats) => info!(
                state = ?stats.final_state,
                bytes = stats.audio_bytes,
                frames = stats.metadata_frames,
                "Recording finished"
            ),
            Err(e) => warn!(
                state = ?CaptureState::Aborted,
                path = %names.audio.display(),
                "Recording aborted, partial file kept: {}",
                e
            ),
        }

        let stats = outcome?;
        Ok(CaptureSummary {
            audio_path: names.audio,
            metadata_path: metaint.map(|_| names.metadata),
            format,
            headers,
            audio_bytes: stats.audio_bytes,
            metadata_frames: stats.metadata_frames,
            malformed_frames: stats.malformed_frames,
            warnings,
            final_state: stats.final_state,
        })
    }
}

fn report(reporter: &Option<Arc<dyn Reporter>>, line: &str) {
    if let Some(reporter) = reporter {
        reporter.report(line);
    }
}

/// Builder for configuring a [`CaptureEngine`]
#[derive(Debug)]
pub struct EngineBuilder {
    client: Option<Client>,
    user_agent: String,
    connect_timeout: Option<Duration>,
    proxy: Option<String>,
    reporter: Arc<dyn Reporter>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            client: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            connect_timeout: None,
            proxy: None,
            reporter: Arc::new(SilentReporter),
        }
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a custom HTTP client
    ///
    /// The User-Agent is still sent per request.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set a custom User-Agent header
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Bound the connection phase only; reads are never timed out
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set a proxy URL
    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Sink for verbose output
    pub fn reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Build the engine
    pub fn build(self) -> Result<CaptureEngine> {
        let client = if let Some(client) = self.client {
            client
        } else {
            let mut builder = Client::builder().user_agent(&self.user_agent);

            if let Some(timeout) = self.connect_timeout {
                builder = builder.connect_timeout(timeout);
            }

            if let Some(proxy_url) = &self.proxy {
                let proxy = reqwest::Proxy::all(proxy_url)
                    .map_err(|e| Error::other(format!("Invalid proxy: {}", e)))?;
                builder = builder.proxy(proxy);
            }

            builder.build()?
        };

        Ok(CaptureEngine {
            client,
            user_agent: self.user_agent,
            reporter: self.reporter,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Session
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy)]
struct SessionStats {
    audio_bytes: u64,
    metadata_frames: u64,
    malformed_frames: u64,
    final_state: CaptureState,
}

/// Runtime state of one capture: connection, output files, audio interval
///
/// `read_length` is the number of audio bytes between metadata blocks (or
/// one default read without metadata). It is copied through a buffer of at
/// most [`DEFAULT_READ_LENGTH`] bytes.
///
/// Both files are owned here. `run` closes them on every return path; if the
/// future is dropped instead, dropping the handles releases them.
struct CaptureSession<R> {
    reader: R,
    audio: AudioFile,
    sidecar: Option<MetadataLog>,
    read_length: usize,
    metaint: Option<usize>,
    started: Instant,
    reporter: Option<Arc<dyn Reporter>>,
    stats: SessionStats,
}

impl<R: AsyncRead + Unpin> CaptureSession<R> {
    fn new(
        reader: R,
        audio: AudioFile,
        sidecar: Option<MetadataLog>,
        metaint: Option<usize>,
        reporter: Option<Arc<dyn Reporter>>,
    ) -> Self {
        // Metadata mode requires both the interval and somewhere to log
        let metaint = metaint.filter(|_| sidecar.is_some());
        Self {
            reader,
            audio,
            sidecar,
            read_length: metaint.unwrap_or(DEFAULT_READ_LENGTH),
            metaint,
            started: Instant::now(),
            reporter,
            stats: SessionStats {
                audio_bytes: 0,
                metadata_frames: 0,
                malformed_frames: 0,
                final_state: CaptureState::Streaming,
            },
        }
    }

    async fn run(mut self, cancel: CancellationToken) -> Result<SessionStats> {
        debug!(state = ?CaptureState::Streaming, read_length = self.read_length, "Demux loop");
        let outcome = self.demux(&cancel).await;

        // Close both files whatever the outcome; a loop error wins over a close error
        let audio_closed = self.audio.close().await;
        let sidecar_closed = match self.sidecar.take() {
            Some(log) => log.close().await,
            None => Ok(()),
        };

        let final_state = outcome?;
        audio_closed?;
        sidecar_closed?;

        self.stats.final_state = final_state;
        Ok(self.stats)
    }

    async fn demux(&mut self, cancel: &CancellationToken) -> Result<CaptureState> {
        // The interval is server-controlled; the buffer never exceeds one default read
        let mut chunk = vec![0u8; self.read_length.min(DEFAULT_READ_LENGTH)];

        loop {
            let mut remaining = self.read_length;
            while remaining > 0 {
                if cancel.is_cancelled() {
                    debug!(state = ?CaptureState::Cancelled, "Cancellation observed");
                    return Ok(CaptureState::Cancelled);
                }

                let wanted = remaining.min(chunk.len());
                let n = read_up_to(&mut self.reader, &mut chunk[..wanted])
                    .await
                    .map_err(Error::StreamInterrupted)?;
                if n > 0 {
                    self.audio.write(&chunk[..n]).await?;
                    self.stats.audio_bytes += n as u64;
                }
                if n < wanted {
                    return Ok(CaptureState::Completed);
                }
                remaining -= n;
            }

            if self.metaint.is_some() && !self.read_metadata().await? {
                return Ok(CaptureState::Completed);
            }
        }
    }

    /// Read one length-prefixed metadata block; `false` at end of stream
    async fn read_metadata(&mut self) -> Result<bool> {
        let mut length = [0u8; 1];
        let n = read_up_to(&mut self.reader, &mut length)
            .await
            .map_err(Error::StreamInterrupted)?;
        if n == 0 {
            return Ok(false);
        }

        let block_len = usize::from(length[0]) * ICY_BLOCK_UNIT;
        if block_len == 0 {
            return Ok(true);
        }

        let mut block = vec![0u8; block_len];
        let n = read_up_to(&mut self.reader, &mut block)
            .await
            .map_err(Error::StreamInterrupted)?;

        let payload = strip_padding(&block[..n]);
        if !payload.is_empty() {
            self.log_metadata(&payload).await?;
        }

        Ok(n == block_len)
    }

    async fn log_metadata(&mut self, payload: &[u8]) -> Result<()> {
        let frame = match parse_icy(payload) {
            Ok(frame) => frame,
            Err(e) if e.is_recoverable() => {
                warn!("Skipping metadata frame: {}", e);
                self.stats.malformed_frames += 1;
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        self.stats.metadata_frames += 1;

        let minutes = self.started.elapsed().as_secs_f64() / 60.0;
        for (key, value) in frame.iter() {
            let line = format!("[{:.2}] {}: {}", minutes, key, value);
            report(&self.reporter, &line);
            if let Some(log) = self.sidecar.as_mut() {
                log.write_line(&line).await?;
                log.flush().await?;
            }
        }
        Ok(())
    }
}

/// Fill `buf` unless the stream ends first; returns the byte count
async fn read_up_to<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]).await? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

// ═══════════════════════════════════════════════════════════════════════════
// Output files
// ═══════════════════════════════════════════════════════════════════════════

/// Audio output, written as received
struct AudioFile {
    file: File,
}

impl AudioFile {
    async fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).await?;
        debug!(path = %path.display(), "Audio file created");
        Ok(Self { file })
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.file.write_all(bytes).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.file.flush().await?;
        Ok(())
    }
}

/// The `.meta` sidecar
struct MetadataLog {
    file: File,
}

impl MetadataLog {
    async fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).await?;
        debug!(path = %path.display(), "Metadata sidecar created");
        Ok(Self { file })
    }

    async fn write_line(&mut self, line: &str) -> Result<()> {
        self.file.write_all(line.as_bytes()).await?;
        self.file.write_all(LINE_ENDING.as_bytes()).await?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        self.file.flush().await?;
        Ok(())
    }

    async fn close(mut self) -> Result<()> {
        self.flush().await
    }
}

/// `rw-rw-rw-` on the audio file
#[cfg(unix)]
async fn widen_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o666))
        .await
        .map_err(Error::Permission)
}

#[cfg(not(unix))]
async fn widen_permissions(_path: &Path) -> Result<()> {
    Err(Error::Permission(io::Error::new(
        io::ErrorKind::Unsupported,
        "public permissions are only supported on Unix",
    )))
}
