//! Pipeline module for batch enrichment
//!
//! This module contains the core enrichment logic, including:
//! - Remote lookups that never fail past their own boundary
//! - The process-wide concurrency limiter and per-batch fan-out
//! - The per-batch state machine
//! - Running a range of batches

mod fetcher;
mod limiter;
mod orchestrator;
mod supervisor;

pub use fetcher::{build_http_client, lookup_target, HttpLookupClient, LookupClient, DEFAULT_USER_AGENT};
pub use limiter::{fan_out, submit_all, ConcurrencyLimiter, Drained, InFlight, PROGRESS_INTERVAL};
pub use orchestrator::{Batch, BatchOrchestrator};
pub use supervisor::{plan_batches, FleetSupervisor};

use crate::config::Config;
use crate::output::FleetReport;
use crate::storage::{Bucket, IdentifierSource, Uploader};
use crate::GeoError;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

/// Wires a supervisor from configuration and explicit collaborators
///
/// The HTTP client and the limiter are created once here and shared by
/// every batch the supervisor runs.
pub fn build_supervisor(
    config: &Config,
    source: Arc<dyn IdentifierSource>,
    uploader: Arc<dyn Uploader>,
) -> Result<FleetSupervisor, GeoError> {
    let client = HttpLookupClient::from_config(&config.lookup)?;
    let limiter = ConcurrencyLimiter::new(config.lookup.max_workers as usize);

    let orchestrator = BatchOrchestrator::new(
        Arc::new(client),
        source,
        uploader,
        limiter,
        Duration::from_secs(config.lookup.request_timeout_secs),
    );

    Ok(FleetSupervisor::new(
        orchestrator,
        config.batches.batch_parallelism as usize,
    ))
}

/// Runs the batches with indices in `range`
///
/// This is the main entry point. It will:
/// 1. Open the configured bucket
/// 2. Build the lookup client and limiter
/// 3. Plan the batches from the naming templates
/// 4. Run every batch and collect outcomes
///
/// # Example
///
/// ```no_run
/// use geocrawl::config::load_config;
/// use geocrawl::pipeline::run_batches;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("geocrawl.toml"))?;
/// let report = run_batches(&config, 1..5).await?;
/// println!("{} batches succeeded", report.succeeded());
/// # Ok(())
/// # }
/// ```
pub async fn run_batches(config: &Config, range: Range<usize>) -> Result<FleetReport, GeoError> {
    let bucket = Arc::new(Bucket::open(&config.storage, &config.batches).await?);
    let supervisor = build_supervisor(config, bucket.clone(), bucket)?;
    let batches = plan_batches(range, &config.batches);
    Ok(supervisor.run(batches).await)
}
