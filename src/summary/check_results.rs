//! Check results accumulator
//!
//! Records each step of a service check and the terminating status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::failure::{ExitCode, ExitCodeAggregator};

/// One finished step
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepRecord {
    /// Step label, e.g. "Ping" or "CreateModel"
    pub step: String,
    pub status: ExitCode,
    /// Ticket, counts or the failure message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Explicit accumulator for one check run
#[derive(Debug, Serialize)]
pub struct CheckResults {
    pub endpoint: String,
    pub started_at: DateTime<Utc>,
    pub steps: Vec<StepRecord>,
    #[serde(skip)]
    aggregator: ExitCodeAggregator,
}

impl CheckResults {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            started_at: Utc::now(),
            steps: Vec::new(),
            aggregator: ExitCodeAggregator::new(),
        }
    }

    /// Record a passed step
    pub fn pass(&mut self, step: impl Into<String>, detail: Option<String>) {
        self.steps.push(StepRecord {
            step: step.into(),
            status: ExitCode::Ok,
            detail,
        });
        self.aggregator.add(ExitCode::Ok, None);
    }

    /// Record a non-OK step and its message
    pub fn fail(&mut self, step: impl Into<String>, code: ExitCode, message: impl Into<String>) {
        let message = message.into();
        self.aggregator.add(code, Some(&message));
        self.steps.push(StepRecord {
            step: step.into(),
            status: code,
            detail: Some(message),
        });
    }

    pub fn passed(&self) -> usize {
        self.steps.iter().filter(|s| s.status.is_ok()).count()
    }

    pub fn exit_code(&self) -> ExitCode {
        self.aggregator.exit_code()
    }

    /// "OK" or the terminating message
    pub fn message(&self) -> &str {
        self.aggregator.message()
    }

    /// One-line report, e.g. "OK" or "CRITICAL: createModel aborted"
    pub fn status_line(&self) -> String {
        match self.exit_code() {
            ExitCode::Ok => "OK".to_string(),
            code => format!("{}: {}", code, self.message()),
        }
    }

    /// JSON view of the run, with the aggregated status
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "endpoint": self.endpoint,
            "started_at": self.started_at.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            "status": self.exit_code(),
            "exit_code": self.exit_code().as_i32(),
            "message": self.message(),
            "steps_passed": self.passed(),
            "steps": self.steps,
        })
    }
}
