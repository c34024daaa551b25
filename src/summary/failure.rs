//! Failure taxonomy and stable exit codes

use serde::{Deserialize, Serialize};

/// Batch status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Every unit succeeded or was skipped
    Success,
    /// At least one unit failed
    Failed,
    /// The batch was cancelled before every unit ran
    Cancelled,
}

impl Status {
    pub fn is_failure(&self) -> bool {
        matches!(self, Status::Failed | Status::Cancelled)
    }
}

/// Failure kind - categorizes the cause of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    /// A remote call failed for one unit of work
    Transport,
    /// The service could not be reached at all
    Unreachable,
    /// Configuration missing or invalid
    Config,
    /// A bundle file could not be read or parsed
    Format,
    /// The batch was cancelled
    Cancelled,
}

impl FailureKind {
    /// Get the stable exit code for this failure kind
    pub fn exit_code(&self) -> ExitCode {
        match self {
            FailureKind::Transport => ExitCode::UnitFailures,
            FailureKind::Unreachable => ExitCode::Unreachable,
            FailureKind::Config => ExitCode::Config,
            FailureKind::Format => ExitCode::Format,
            FailureKind::Cancelled => ExitCode::Cancelled,
        }
    }

    /// Human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            FailureKind::Transport => "Remote call failed",
            FailureKind::Unreachable => "Metadata service unreachable",
            FailureKind::Config => "Configuration error",
            FailureKind::Format => "Bundle format error",
            FailureKind::Cancelled => "Batch cancelled",
        }
    }
}

/// Stable process exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(i32)]
pub enum ExitCode {
    /// Everything succeeded or was skipped
    #[default]
    Success = 0,
    /// One or more units failed
    UnitFailures = 10,
    /// Service unreachable or the batch could not begin
    Unreachable = 20,
    /// Configuration error
    Config = 30,
    /// Bundle format error
    Format = 40,
    /// Cancelled
    Cancelled = 80,
}

impl ExitCode {
    /// Get the integer value of the exit code
    pub fn as_i32(&self) -> i32 {
        *self as i32
    }

    /// Create from integer value
    pub fn from_i32(code: i32) -> Option<Self> {
        match code {
            0 => Some(ExitCode::Success),
            10 => Some(ExitCode::UnitFailures),
            20 => Some(ExitCode::Unreachable),
            30 => Some(ExitCode::Config),
            40 => Some(ExitCode::Format),
            80 => Some(ExitCode::Cancelled),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExitCode::Success)
    }
}

/// Aggregates unit outcomes into one status and exit code.
///
/// Cancellation takes priority, then the first failure seen.
#[derive(Debug, Default)]
pub struct ExitCodeAggregator {
    has_cancelled: bool,
    first_failure_code: Option<ExitCode>,
}

impl ExitCodeAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one unit's status and exit code
    pub fn add(&mut self, status: Status, exit_code: ExitCode) {
        match status {
            Status::Cancelled => self.has_cancelled = true,
            Status::Failed => {
                if self.first_failure_code.is_none() {
                    self.first_failure_code = Some(exit_code);
                }
            }
            Status::Success => {}
        }
    }

    pub fn status(&self) -> Status {
        if self.has_cancelled {
            Status::Cancelled
        } else if self.first_failure_code.is_some() {
            Status::Failed
        } else {
            Status::Success
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        if self.has_cancelled {
            ExitCode::Cancelled
        } else {
            self.first_failure_code.unwrap_or(ExitCode::Success)
        }
    }
}
