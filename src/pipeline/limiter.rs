//! Concurrency limiter and fan-out
//!
//! This module handles:
//! - Admission slots shared by every batch in the process
//! - Submitting one lookup task per identifier, in order, under the cap
//! - Funnelling results through a channel to a single writer task
//! - The completion barrier that precedes closing the sink

use crate::output::{LookupResult, OutputError, ResultSink};
use crate::pipeline::fetcher::LookupClient;
use crate::GeoError;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, AcquireError, OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinHandle, JoinSet};

/// Records between progress log lines
pub const PROGRESS_INTERVAL: u64 = 1000;

/// Caps the number of lookups in flight
///
/// Clones share the same slots, so a single limiter handed to every batch
/// bounds the whole process even when batches run side by side.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    max_workers: usize,
}

impl ConcurrencyLimiter {
    /// Creates a limiter with `max_workers` admission slots (at least one)
    pub fn new(max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_workers)),
            max_workers,
        }
    }

    /// Total number of admission slots
    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Slots not currently held by a lookup
    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Waits for a free slot; the slot is released when the permit drops
    pub async fn admit(&self) -> Result<OwnedSemaphorePermit, AcquireError> {
        Arc::clone(&self.semaphore).acquire_owned().await
    }
}

/// Counts reported once every submitted lookup has been written
#[derive(Debug)]
pub struct Drained<S> {
    /// The sink, still open
    pub sink: S,

    /// Identifiers admitted and submitted
    pub submitted: usize,

    /// Records written to the sink
    pub written: u64,

    /// Written records that carry an error
    pub lookup_errors: u64,
}

type WriterOutput<S> = Result<(S, u64, u64), OutputError>;

/// Lookups that have all been admitted but may still be running
///
/// Returned by [`submit_all`]; [`InFlight::drain`] is the completion barrier.
pub struct InFlight<S> {
    batch: String,
    tasks: JoinSet<()>,
    writer: JoinHandle<WriterOutput<S>>,
    submitted: usize,
}

impl<S: ResultSink + 'static> InFlight<S> {
    /// Waits for every lookup to finish and every record to be written
    ///
    /// Only after this returns is it safe to close the sink.
    pub async fn drain(mut self) -> Result<Drained<S>, GeoError> {
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(batch = %self.batch, "Lookup task did not complete: {}", e);
            }
        }

        let (sink, written, lookup_errors) = self
            .writer
            .await
            .map_err(|e| GeoError::WriterTask {
                batch: self.batch.clone(),
                message: e.to_string(),
            })??;

        Ok(Drained {
            sink,
            submitted: self.submitted,
            written,
            lookup_errors,
        })
    }
}

/// Submits a lookup for every identifier under the limiter's cap
///
/// Identifiers are admitted in order; admission waits for a free slot and
/// never skips an identifier. Each task holds its slot until its record has
/// been handed to the writer task, which owns `sink` and writes records in
/// completion order. A slow writer therefore throttles admission instead of
/// letting finished lookups pile up.
///
/// Finished tasks are reaped as submission goes, so the set of live tasks
/// stays around `max_workers` however long the input is.
///
/// Submission stops early only if the writer has already failed.
pub async fn submit_all<C, S>(
    batch: &str,
    client: Arc<C>,
    limiter: &ConcurrencyLimiter,
    identifiers: Vec<String>,
    call_timeout: Duration,
    sink: S,
) -> Result<InFlight<S>, GeoError>
where
    C: LookupClient + ?Sized + 'static,
    S: ResultSink + 'static,
{
    let (tx, rx) = mpsc::channel::<LookupResult>(limiter.max_workers());
    let writer = tokio::spawn(write_results(batch.to_string(), rx, sink));

    let mut tasks = JoinSet::new();
    let mut submitted = 0;

    for identifier in identifiers {
        if tx.is_closed() {
            tracing::warn!(batch = %batch, submitted, "Writer stopped, halting submission");
            break;
        }

        let permit = limiter
            .admit()
            .await
            .map_err(|_| GeoError::AdmissionClosed {
                batch: batch.to_string(),
            })?;

        reap_finished(batch, &mut tasks);

        let client = Arc::clone(&client);
        let tx = tx.clone();
        tasks.spawn(async move {
            let result = guarded_lookup(client.as_ref(), &identifier, call_timeout).await;
            // Only fails if the writer is gone; the writer's error is reported by drain
            let _ = tx.send(result).await;
            drop(permit);
        });
        submitted += 1;
    }

    reap_finished(batch, &mut tasks);
    tracing::debug!(batch = %batch, submitted, "All lookups submitted");

    Ok(InFlight {
        batch: batch.to_string(),
        tasks,
        writer,
        submitted,
    })
}

/// Drops finished tasks from the set without waiting
fn reap_finished(batch: &str, tasks: &mut JoinSet<()>) {
    while let Some(joined) = tasks.try_join_next() {
        if let Err(e) = joined {
            tracing::error!(batch = %batch, "Lookup task did not complete: {}", e);
        }
    }
}

/// Submits every identifier and waits for all records to be written
pub async fn fan_out<C, S>(
    batch: &str,
    client: Arc<C>,
    limiter: &ConcurrencyLimiter,
    identifiers: Vec<String>,
    call_timeout: Duration,
    sink: S,
) -> Result<Drained<S>, GeoError>
where
    C: LookupClient + ?Sized + 'static,
    S: ResultSink + 'static,
{
    submit_all(batch, client, limiter, identifiers, call_timeout, sink)
        .await?
        .drain()
        .await
}

/// Runs one lookup with a hard time limit, converting panics into records
async fn guarded_lookup<C>(client: &C, identifier: &str, call_timeout: Duration) -> LookupResult
where
    C: LookupClient + ?Sized,
{
    let call = AssertUnwindSafe(client.fetch(identifier)).catch_unwind();

    match tokio::time::timeout(call_timeout, call).await {
        Ok(Ok(result)) => result,
        Ok(Err(payload)) => {
            let target = client.target(identifier);
            let detail = format!(
                "lookup of {} at {} panicked: {}",
                identifier,
                target,
                panic_message(&*payload)
            );
            tracing::error!(ip = %identifier, "{}", detail);
            LookupResult::error(identifier, target, detail)
        }
        Err(_) => {
            let target = client.target(identifier);
            let detail = format!(
                "lookup of {} at {} timed out after {:.1}s",
                identifier,
                target,
                call_timeout.as_secs_f64()
            );
            LookupResult::error(identifier, target, detail)
        }
    }
}

/// Text carried by a panic payload, if it is a string
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Single writer: drains the channel into the sink until every sender is gone
async fn write_results<S: ResultSink>(
    batch: String,
    mut rx: mpsc::Receiver<LookupResult>,
    mut sink: S,
) -> WriterOutput<S> {
    let mut written = 0u64;
    let mut lookup_errors = 0u64;

    while let Some(result) = rx.recv().await {
        sink.write(&result).await?;
        written += 1;
        if result.is_error() {
            lookup_errors += 1;
        }

        if written % PROGRESS_INTERVAL == 0 {
            tracing::info!(
                batch = %batch,
                written,
                lookup_errors,
                "Progress"
            );
        }
    }

    Ok((sink, written, lookup_errors))
}
