//! Time-bounded execution of a capture
//!
//! The supervisor spawns the engine as its own task, waits at most the
//! request's budget, then cancels the shared token and returns without
//! waiting for the engine to wind down. The engine notices the token before
//! its next chunk read, so a file may run past the budget by one chunk plus
//! network latency.

use crate::capture::{CaptureEngine, CaptureSummary};
use crate::error::{Error, Result};
use crate::request::CaptureRequest;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// How a supervised capture ended, from the caller's point of view
#[derive(Debug)]
pub enum SupervisorOutcome {
    /// The engine returned before the budget elapsed
    Finished(Result<CaptureSummary>),
    /// The budget elapsed; cancellation was signalled
    DeadlineReached {
        teardown: JoinHandle<Result<CaptureSummary>>,
    },
    /// The caller's token was cancelled before the budget elapsed
    Interrupted {
        teardown: JoinHandle<Result<CaptureSummary>>,
    },
}

impl SupervisorOutcome {
    /// True unless the engine finished by itself
    pub fn was_cancelled(&self) -> bool {
        !matches!(self, SupervisorOutcome::Finished(_))
    }

    /// Give the engine up to `grace` to close its files
    ///
    /// Returns the engine result if it is available in time. For
    /// [`SupervisorOutcome::Finished`] this returns immediately.
    pub async fn settle(self, grace: Duration) -> Option<Result<CaptureSummary>> {
        match self {
            SupervisorOutcome::Finished(result) => Some(result),
            SupervisorOutcome::DeadlineReached { teardown }
            | SupervisorOutcome::Interrupted { teardown } => {
                match tokio::time::timeout(grace, teardown).await {
                    Ok(joined) => Some(flatten(joined)),
                    Err(_) => {
                        debug!(?grace, "Engine still busy after grace period");
                        None
                    }
                }
            }
        }
    }
}

fn flatten(
    joined: std::result::Result<Result<CaptureSummary>, tokio::task::JoinError>,
) -> Result<CaptureSummary> {
    joined.unwrap_or_else(|e| Err(Error::other(format!("Capture task failed: {}", e))))
}

/// Runs a [`CaptureEngine`] under a wall-clock budget
///
/// # Example
///
/// ```no_run
/// use pmoradiorec::{CaptureEngine, CaptureRequest, CaptureSupervisor};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let supervisor = CaptureSupervisor::new(CaptureEngine::new()?);
///     let request = CaptureRequest::new("http://radio.example.org/jazz", "/tmp", "jazz", 60)?;
///
///     let outcome = supervisor.run(request).await;
///     println!("cancelled: {}", outcome.was_cancelled());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CaptureSupervisor {
    engine: CaptureEngine,
}

impl CaptureSupervisor {
    pub fn new(engine: CaptureEngine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &CaptureEngine {
        &self.engine
    }

    /// Record for `request.duration_minutes()`
    pub async fn run(&self, request: CaptureRequest) -> SupervisorOutcome {
        let budget = request.budget();
        self.run_for(request, budget, CancellationToken::new()).await
    }

    /// Record for `request.duration_minutes()`, stopping early if `cancel` fires
    pub async fn run_with_token(
        &self,
        request: CaptureRequest,
        cancel: CancellationToken,
    ) -> SupervisorOutcome {
        let budget = request.budget();
        self.run_for(request, budget, cancel).await
    }

    /// Record for an explicit budget
    ///
    /// `cancel` is handed to the engine. It is cancelled here when the budget
    /// elapses; cancelling it from outside ends the capture early.
    pub async fn run_for(
        &self,
        request: CaptureRequest,
        budget: Duration,
        cancel: CancellationToken,
    ) -> SupervisorOutcome {
        let engine = self.engine.clone();
        let station = request.station().to_string();
        let verbose = request.verbose();
        let engine_token = cancel.clone();

        let mut handle =
            tokio::spawn(async move { engine.capture(&request, engine_token).await });

        info!(station = %station, ?budget, "Capture supervised");

        tokio::select! {
            joined = &mut handle => {
                debug!(station = %station, "Capture ended before its budget");
                SupervisorOutcome::Finished(flatten(joined))
            }
            _ = tokio::time::sleep(budget) => {
                if verbose {
                    self.engine
                        .reporter()
                        .report(&format!("Recording time for {} elapsed", station));
                }
                info!(station = %station, "Budget elapsed, cancelling capture");
                cancel.cancel();
                SupervisorOutcome::DeadlineReached { teardown: handle }
            }
            _ = cancel.cancelled() => {
                info!(station = %station, "Capture interrupted");
                SupervisorOutcome::Interrupted { teardown: handle }
            }
        }
    }
}
