//! Fleet supervisor - plans and runs a range of batches
//!
//! Batches run sequentially by default, or a few at a time when
//! `batch-parallelism` is raised. Either way every batch shares the
//! orchestrator's limiter, and one batch's failure never stops the others.

use crate::config::template::render;
use crate::config::BatchConfig;
use crate::output::{BatchOutcome, FleetReport};
use crate::pipeline::limiter::panic_message;
use crate::pipeline::orchestrator::{Batch, BatchOrchestrator};
use chrono::Utc;
use futures::{FutureExt, StreamExt};
use std::ops::Range;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Builds the batches for indices in `range` from the naming templates
///
/// # Example
///
/// ```
/// use geocrawl::config::BatchConfig;
/// use geocrawl::pipeline::plan_batches;
/// use std::path::PathBuf;
///
/// let config = BatchConfig {
///     batch_name_template: "Sheet{}".to_string(),
///     input_object_name_template: "input/sheet_{}.csv".to_string(),
///     output_file_name_template: "{}.jsonl".to_string(),
///     output_object_name_template: "output/{}.jsonl".to_string(),
///     staging_dir: PathBuf::from("data"),
///     batch_parallelism: 1,
///     skip_header: true,
/// };
///
/// let batches = plan_batches(1..3, &config);
/// assert_eq!(batches[0].name, "Sheet1");
/// assert_eq!(batches[1].destination, "output/Sheet2.jsonl");
/// ```
pub fn plan_batches(range: Range<usize>, config: &BatchConfig) -> Vec<Batch> {
    range
        .map(|index| {
            let index_str = index.to_string();
            let name = render(&config.batch_name_template, "index", &index_str);
            let file_name = render(&config.output_file_name_template, "name", &name);

            Batch {
                index,
                input_object: render(&config.input_object_name_template, "index", &index_str),
                local_artifact_path: config.staging_dir.join(file_name),
                destination: render(&config.output_object_name_template, "name", &name),
                name,
            }
        })
        .collect()
}

/// Runs batches and collects their outcomes
pub struct FleetSupervisor {
    orchestrator: Arc<BatchOrchestrator>,
    batch_parallelism: usize,
}

impl FleetSupervisor {
    /// Creates a supervisor running up to `batch_parallelism` batches at once
    pub fn new(orchestrator: BatchOrchestrator, batch_parallelism: usize) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            batch_parallelism: batch_parallelism.max(1),
        }
    }

    /// Runs every batch and reports one outcome per batch
    ///
    /// Outcomes are ordered by batch index regardless of completion order.
    pub async fn run(&self, batches: Vec<Batch>) -> FleetReport {
        let total = batches.len();
        tracing::info!(
            batches = total,
            parallelism = self.batch_parallelism,
            max_workers = self.orchestrator.limiter().max_workers(),
            "Starting fleet"
        );

        let outcomes: Vec<BatchOutcome> = futures::stream::iter(batches)
            .map(|batch| run_isolated(Arc::clone(&self.orchestrator), batch))
            .buffer_unordered(self.batch_parallelism)
            .collect()
            .await;

        let report = FleetReport::new(outcomes);
        for failed in report.failed() {
            tracing::error!(
                batch = %failed.name,
                "Batch failed: {}",
                failed.failure_detail.as_deref().unwrap_or("unknown error")
            );
        }
        tracing::info!(
            "Fleet finished: {} / {} batches succeeded",
            report.succeeded(),
            total
        );

        report
    }
}

/// Runs one batch, turning a panic into a failed outcome
async fn run_isolated(orchestrator: Arc<BatchOrchestrator>, batch: Batch) -> BatchOutcome {
    let index = batch.index;
    let name = batch.name.clone();
    let started_at = Utc::now();

    match AssertUnwindSafe(orchestrator.run(batch)).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(payload) => {
            let detail = format!("batch panicked: {}", panic_message(&*payload));
            tracing::error!(batch = %name, "{}", detail);
            BatchOutcome {
                index,
                name,
                success: false,
                failure_detail: Some(detail),
                failed_in: None,
                identifiers: 0,
                records_written: 0,
                lookup_errors: 0,
                started_at,
                finished_at: Utc::now(),
            }
        }
    }
}
