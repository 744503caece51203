//! Batch orchestrator - drives one batch end to end
//!
//! Enumerate identifiers, fan the lookups out under the shared limiter,
//! stream records into the local artifact, hand the artifact to the uploader
//! and remove it. Per-identifier lookup failures are data; only plumbing
//! failures (source, sink, upload) fail the batch.

use crate::output::{BatchOutcome, JsonLinesSink, ResultSink};
use crate::pipeline::fetcher::LookupClient;
use crate::pipeline::limiter::{submit_all, ConcurrencyLimiter};
use crate::state::BatchState;
use crate::storage::{IdentifierSource, Uploader};
use crate::GeoError;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// A named partition of identifiers processed as one unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Position of the batch in the planned range
    pub index: usize,

    /// Batch (sheet) name
    pub name: String,

    /// Object the identifier source reads identifiers from
    pub input_object: String,

    /// Local artifact owned by the orchestrator while the batch runs
    pub local_artifact_path: PathBuf,

    /// Object name the artifact is uploaded to
    pub destination: String,
}

/// Runs batches one at a time against shared collaborators
///
/// Cheap to share behind an `Arc`; it holds no per-batch state.
pub struct BatchOrchestrator {
    client: Arc<dyn LookupClient>,
    source: Arc<dyn IdentifierSource>,
    uploader: Arc<dyn Uploader>,
    limiter: ConcurrencyLimiter,
    call_timeout: Duration,
}

impl BatchOrchestrator {
    /// Creates an orchestrator
    ///
    /// # Arguments
    ///
    /// * `client` - Lookup client shared by every batch
    /// * `source` - Where identifiers come from
    /// * `uploader` - Where finished artifacts go
    /// * `limiter` - Process-wide admission slots
    /// * `call_timeout` - Hard limit for a single lookup
    pub fn new(
        client: Arc<dyn LookupClient>,
        source: Arc<dyn IdentifierSource>,
        uploader: Arc<dyn Uploader>,
        limiter: ConcurrencyLimiter,
        call_timeout: Duration,
    ) -> Self {
        Self {
            client,
            source,
            uploader,
            limiter,
            call_timeout,
        }
    }

    /// The limiter shared by batches run through this orchestrator
    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    /// Runs one batch to `Done` or `Failed`
    ///
    /// Never returns an error: structural failures are reported in the
    /// outcome. The local artifact does not exist when this returns.
    pub async fn run(&self, batch: Batch) -> BatchOutcome {
        let started_at = Utc::now();
        let mut tracker = StateTracker::new(&batch.name);
        let mut artifact = StagingArtifact::new(&batch.local_artifact_path);
        let mut progress = Progress::default();

        tracing::info!(batch = %batch.name, "Starting batch");

        let driven = self.drive(&batch, &mut tracker, &mut progress).await;

        let mut failure = match driven {
            Ok(()) => None,
            Err(e) => {
                tracing::error!(
                    batch = %batch.name,
                    state = %tracker.state(),
                    "Batch failed: {}",
                    e
                );
                Some((tracker.state(), e.to_string()))
            }
        };

        // Cleanup runs on every path, and only after handoff has returned
        if let Err(e) = tracker.advance(BatchState::Cleanup) {
            failure.get_or_insert((tracker.state(), e.to_string()));
        }
        if let Err(e) = artifact.remove().await {
            tracing::error!(
                batch = %batch.name,
                "Failed to remove {}: {}",
                batch.local_artifact_path.display(),
                e
            );
            failure.get_or_insert((
                BatchState::Cleanup,
                format!(
                    "failed to remove {}: {}",
                    batch.local_artifact_path.display(),
                    e
                ),
            ));
        }

        let terminal = if failure.is_some() {
            BatchState::Failed
        } else {
            BatchState::Done
        };
        if let Err(e) = tracker.advance(terminal) {
            tracing::error!(batch = %batch.name, "{}", e);
        }

        let outcome = BatchOutcome {
            index: batch.index,
            name: batch.name.clone(),
            success: failure.is_none(),
            failed_in: failure.as_ref().map(|(state, _)| *state),
            failure_detail: failure.map(|(_, detail)| detail),
            identifiers: progress.identifiers,
            records_written: progress.records_written,
            lookup_errors: progress.lookup_errors,
            started_at,
            finished_at: Utc::now(),
        };

        if outcome.success {
            tracing::info!(
                batch = %outcome.name,
                records = outcome.records_written,
                lookup_errors = outcome.lookup_errors,
                "Batch done in {:.1}s",
                outcome.duration_seconds()
            );
        }

        outcome
    }

    /// Enumerating through Handoff; returns at the first structural failure
    async fn drive(
        &self,
        batch: &Batch,
        tracker: &mut StateTracker,
        progress: &mut Progress,
    ) -> Result<(), GeoError> {
        // Enumerating
        let identifiers = self.source.list_identifiers(batch).await?;
        progress.identifiers = identifiers.len();
        tracing::info!(
            batch = %batch.name,
            identifiers = identifiers.len(),
            "Enumerated identifiers"
        );

        // Fetching
        tracker.advance(BatchState::Fetching)?;
        let sink = JsonLinesSink::create(&batch.local_artifact_path).await?;
        let in_flight = submit_all(
            &batch.name,
            Arc::clone(&self.client),
            &self.limiter,
            identifiers,
            self.call_timeout,
            sink,
        )
        .await?;

        // Draining
        tracker.advance(BatchState::Draining)?;
        let drained = in_flight.drain().await?;
        progress.records_written = drained.written;
        progress.lookup_errors = drained.lookup_errors;

        if drained.written != progress.identifiers as u64 {
            return Err(GeoError::RecordCountMismatch {
                batch: batch.name.clone(),
                expected: progress.identifiers,
                written: drained.written,
            });
        }

        // Handoff
        tracker.advance(BatchState::Handoff)?;
        let mut sink = drained.sink;
        sink.close().await?;

        tracing::info!(
            batch = %batch.name,
            "Uploading {} -> {}",
            batch.local_artifact_path.display(),
            batch.destination
        );
        self.uploader
            .upload(&batch.local_artifact_path, &batch.destination)
            .await?;

        Ok(())
    }
}

/// Counters gathered while a batch runs
#[derive(Debug, Default)]
struct Progress {
    identifiers: usize,
    records_written: u64,
    lookup_errors: u64,
}

/// Tracks the current state and rejects illegal transitions
struct StateTracker {
    batch: String,
    state: BatchState,
}

impl StateTracker {
    fn new(batch: &str) -> Self {
        Self {
            batch: batch.to_string(),
            state: BatchState::Enumerating,
        }
    }

    fn state(&self) -> BatchState {
        self.state
    }

    fn advance(&mut self, next: BatchState) -> Result<(), GeoError> {
        if !self.state.can_transition_to(next) {
            return Err(GeoError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::debug!(batch = %self.batch, "{} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }
}

/// Local artifact that is removed when the batch ends
///
/// `remove` is the normal cleanup step. If the batch future is dropped or
/// unwinds before that, `Drop` removes the file instead.
struct StagingArtifact {
    path: PathBuf,
    armed: bool,
}

impl StagingArtifact {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            armed: true,
        }
    }

    async fn remove(&mut self) -> std::io::Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        self.armed = false;
        Ok(())
    }
}

impl Drop for StagingArtifact {
    fn drop(&mut self) {
        if self.armed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}
