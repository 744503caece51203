//! Per-batch outcomes and the fleet summary
//!
//! The supervisor collects one `BatchOutcome` per batch into a `FleetReport`,
//! which the CLI prints and uses to pick the exit status.

use crate::state::BatchState;
use chrono::{DateTime, Utc};

/// Result of running one batch through the orchestrator
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// Position of the batch in the planned range
    pub index: usize,

    /// Batch name
    pub name: String,

    /// True when the batch reached `Done`
    pub success: bool,

    /// Diagnostic text for a structural failure
    pub failure_detail: Option<String>,

    /// State in which the structural failure happened
    pub failed_in: Option<BatchState>,

    /// Number of identifiers pulled from the source
    pub identifiers: usize,

    /// Number of records written to the sink
    pub records_written: u64,

    /// Number of records carrying an `error` field
    pub lookup_errors: u64,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchOutcome {
    /// Wall-clock duration of the batch in seconds
    pub fn duration_seconds(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

/// Outcomes for every batch the supervisor attempted
#[derive(Debug, Clone, Default)]
pub struct FleetReport {
    pub outcomes: Vec<BatchOutcome>,
}

impl FleetReport {
    /// Creates a report, ordering outcomes by batch index
    pub fn new(mut outcomes: Vec<BatchOutcome>) -> Self {
        outcomes.sort_by_key(|o| o.index);
        Self { outcomes }
    }

    /// Number of batches that reached `Done`
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    /// Batches that hit a structural failure
    pub fn failed(&self) -> Vec<&BatchOutcome> {
        self.outcomes.iter().filter(|o| !o.success).collect()
    }

    /// True when no batch failed
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.success)
    }

    /// Total records written across all batches
    pub fn total_records(&self) -> u64 {
        self.outcomes.iter().map(|o| o.records_written).sum()
    }

    /// Total per-identifier lookup errors across all batches
    pub fn total_lookup_errors(&self) -> u64 {
        self.outcomes.iter().map(|o| o.lookup_errors).sum()
    }
}

/// Prints the fleet report to stdout
pub fn print_report(report: &FleetReport) {
    println!("=== Geocrawl Summary ===\n");

    println!("Batches:");
    for outcome in &report.outcomes {
        let status = if outcome.success { "ok" } else { "FAILED" };
        println!(
            "  [{}] {} - {} identifiers, {} records, {} lookup errors, {:.1}s",
            status,
            outcome.name,
            outcome.identifiers,
            outcome.records_written,
            outcome.lookup_errors,
            outcome.duration_seconds()
        );
        if let Some(detail) = &outcome.failure_detail {
            let state = outcome
                .failed_in
                .map(|s| s.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            println!("       failed in {}: {}", state, detail);
        }
    }
    println!();

    println!(
        "Succeeded: {} / {} batches",
        report.succeeded(),
        report.outcomes.len()
    );
    println!(
        "Records: {} ({} lookup errors)",
        report.total_records(),
        report.total_lookup_errors()
    );
}
