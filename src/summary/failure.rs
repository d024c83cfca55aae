//! Failure taxonomy and monitoring-plugin exit codes

use serde::{Deserialize, Serialize};

/// Failure kind - categorizes the cause of a non-OK result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    /// Ping did not answer `1`
    Unavailable,
    /// Service answered with a permanent fault
    RemoteFault,
    /// HTTP exchange failed
    Transport,
    /// Response was not what the protocol promises
    Protocol,
    /// Transient faults outlasted the retry budget
    RetriesExhausted,
    /// Job reported aborted
    JobAborted,
    /// Job reported cancelled
    JobCancelled,
    /// Service no longer knows the ticket
    UnknownTicket,
    /// Job did not finish within the poll budget
    Timeout,
    /// Optional capability (algorithm, layers) missing
    MissingCapability,
    /// Invalid arguments or configuration
    Config,
}

impl FailureKind {
    /// Get the exit code for this failure kind
    pub fn exit_code(&self) -> ExitCode {
        match self {
            FailureKind::MissingCapability => ExitCode::Warning,
            FailureKind::Config => ExitCode::Unknown,
            _ => ExitCode::Critical,
        }
    }

    /// Human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            FailureKind::Unavailable => "Service unavailable",
            FailureKind::RemoteFault => "Service returned a fault",
            FailureKind::Transport => "Service call failed",
            FailureKind::Protocol => "Unexpected service response",
            FailureKind::RetriesExhausted => "Retries exhausted",
            FailureKind::JobAborted => "Job aborted",
            FailureKind::JobCancelled => "Job cancelled",
            FailureKind::UnknownTicket => "Job reported as unknown",
            FailureKind::Timeout => "Job timed out",
            FailureKind::MissingCapability => "Capability missing",
            FailureKind::Config => "Configuration error",
        }
    }
}

/// Monitoring-plugin exit codes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(i32)]
pub enum ExitCode {
    /// Everything checked out
    #[default]
    Ok = 0,
    /// Degraded: an optional capability is missing
    Warning = 1,
    /// A fault, failed job or timeout
    Critical = 2,
    /// Usage or internal error; the service state is not known
    Unknown = 3,
}

impl ExitCode {
    /// Get the integer value of the exit code
    pub fn as_i32(&self) -> i32 {
        *self as i32
    }


    pub fn label(&self) -> &'static str {
        match self {
            ExitCode::Ok => "OK",
            ExitCode::Warning => "WARNING",
            ExitCode::Critical => "CRITICAL",
            ExitCode::Unknown => "UNKNOWN",
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ExitCode::Ok)
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Helper for aggregating exit codes across multiple steps
///
/// The most severe code wins; the first message recorded at that
/// severity is kept.
#[derive(Debug, Default)]
pub struct ExitCodeAggregator {
    worst: ExitCode,
    message: Option<String>,
}

impl ExitCodeAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a step's exit code (and message, for non-OK steps)
    pub fn add(&mut self, code: ExitCode, message: Option<&str>) {
        if code > self.worst {
            self.worst = code;
            self.message = message.map(String::from);
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        self.worst
    }

    /// Message of the most severe step; "OK" when all passed
    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or("OK")
    }
}
