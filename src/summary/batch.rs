//! Batch summary: counts, status and exit code of one batch operation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

use super::failure::{ExitCode, ExitCodeAggregator, FailureKind, Status};

/// Schema version for serialized summaries
pub const BATCH_SUMMARY_SCHEMA_VERSION: u32 = 1;

/// Outcome of one unit of work, for aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitStatus {
    Succeeded,
    Skipped,
    Failed(FailureKind),
}

/// Summary of one batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Schema version
    pub schema_version: u32,

    /// Batch identifier
    pub batch_id: String,

    /// Operation name (`delete:keep-active`, `backup`, `restore`, ...)
    pub operation: String,

    /// When the summary was created
    pub created_at: DateTime<Utc>,

    /// Aggregated status
    pub status: Status,

    /// Aggregated exit code
    pub exit_code: i32,

    /// Units that finished (any outcome)
    pub unit_count: usize,

    pub succeeded: usize,

    pub skipped: usize,

    pub failed: usize,

    /// Units never started because the batch was cancelled
    pub not_started: usize,

    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,

    /// Human-readable summary
    pub human_summary: String,
}

impl BatchSummary {
    /// Aggregate unit outcomes
    pub fn from_units(
        batch_id: impl Into<String>,
        operation: impl Into<String>,
        units: &[UnitStatus],
        not_started: usize,
        cancelled: bool,
        duration_ms: u64,
    ) -> Self {
        let mut aggregator = ExitCodeAggregator::new();
        let (mut succeeded, mut skipped, mut failed) = (0, 0, 0);

        for unit in units {
            match unit {
                UnitStatus::Succeeded => succeeded += 1,
                UnitStatus::Skipped => skipped += 1,
                UnitStatus::Failed(kind) => {
                    failed += 1;
                    aggregator.add(Status::Failed, kind.exit_code());
                }
            }
        }
        if cancelled {
            aggregator.add(Status::Cancelled, ExitCode::Cancelled);
        }

        let status = aggregator.status();
        let operation = operation.into();
        let human_summary =
            Self::generate_human_summary(&operation, status, succeeded, skipped, failed, not_started);

        Self {
            schema_version: BATCH_SUMMARY_SCHEMA_VERSION,
            batch_id: batch_id.into(),
            operation,
            created_at: Utc::now(),
            status,
            exit_code: aggregator.exit_code().as_i32(),
            unit_count: units.len(),
            succeeded,
            skipped,
            failed,
            not_started,
            duration_ms,
            human_summary,
        }
    }

    fn generate_human_summary(
        operation: &str,
        status: Status,
        succeeded: usize,
        skipped: usize,
        failed: usize,
        not_started: usize,
    ) -> String {
        let counts = format!("{} succeeded, {} skipped, {} failed", succeeded, skipped, failed);
        match status {
            Status::Success => format!("{} completed: {}", operation, counts),
            Status::Failed => format!("{} finished with failures: {}", operation, counts),
            Status::Cancelled => format!(
                "{} cancelled: {}, {} not started",
                operation, counts, not_started
            ),
        }
    }

    pub fn exit_code_enum(&self) -> Option<ExitCode> {
        ExitCode::from_i32(self.exit_code)
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write to file
    pub fn write_to_file(&self, path: &Path) -> io::Result<()> {
        let json = self.to_json().map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, format!("JSON error: {}", e))
        })?;
        fs::write(path, json)
    }
}
