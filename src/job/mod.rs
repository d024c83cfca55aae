//! Job kinds and the generic submit / track / fetch runner
//!
//! Every job kind names its submit operation, its result operation and the
//! result fields a healthy service always returns.

mod runner;

use omws_protocol::{Operation, Ticket};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::host::InvokeError;
use crate::summary::{ExitCode, FailureKind};
use crate::tracker::{invoke_failure_kind, TrackError};

pub use runner::{lookup_path, JobRunner};

/// Remote job kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    CreateModel,
    TestModel,
    ProjectModel,
    EvaluateModel,
    SamplePoints,
    /// Composite experiment; one ticket per contained job
    Experiment,
}

impl JobKind {
    /// All kinds, in service check order
    pub const ALL: [JobKind; 6] = [
        JobKind::CreateModel,
        JobKind::TestModel,
        JobKind::ProjectModel,
        JobKind::EvaluateModel,
        JobKind::SamplePoints,
        JobKind::Experiment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::CreateModel => "create_model",
            JobKind::TestModel => "test_model",
            JobKind::ProjectModel => "project_model",
            JobKind::EvaluateModel => "evaluate_model",
            JobKind::SamplePoints => "sample_points",
            JobKind::Experiment => "experiment",
        }
    }

    pub fn submit_operation(&self) -> Operation {
        match self {
            JobKind::CreateModel => Operation::CreateModel,
            JobKind::TestModel => Operation::TestModel,
            JobKind::ProjectModel => Operation::ProjectModel,
            JobKind::EvaluateModel => Operation::EvaluateModel,
            JobKind::SamplePoints => Operation::SamplePoints,
            JobKind::Experiment => Operation::RunExperiment,
        }
    }

    pub fn result_operation(&self) -> Operation {
        match self {
            JobKind::CreateModel => Operation::GetModel,
            JobKind::TestModel => Operation::GetTestResult,
            JobKind::ProjectModel => Operation::GetProjectionMetadata,
            JobKind::EvaluateModel => Operation::GetModelEvaluation,
            JobKind::SamplePoints => Operation::GetSamplingResult,
            JobKind::Experiment => Operation::GetResults,
        }
    }

    /// Dotted paths that must be present in the result payload
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            JobKind::CreateModel => &["SerializedModel.Algorithm"],
            JobKind::TestModel => &["Statistics.ConfusionMatrix"],
            JobKind::ProjectModel => &["ProjectionEnvelope.AreaStatistics"],
            JobKind::EvaluateModel => &["Values.V"],
            JobKind::SamplePoints => &[
                "Environment.Map",
                "Environment.Mask",
                "Absence.CoordinateSystem",
                "Absence.Point",
            ],
            JobKind::Experiment => &["Job"],
        }
    }

    /// Jobs that consume the serialized model of a previous `CreateModel`
    pub fn needs_model(&self) -> bool {
        matches!(
            self,
            JobKind::TestModel | JobKind::ProjectModel | JobKind::EvaluateModel
        )
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobKind {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| JobError::InvalidKind(s.to_string()))
    }
}

/// Sections a result must carry for a declared experiment job type;
/// `None` for types the runner does not know
pub fn experiment_job_fields(job_type: &str) -> Option<&'static [&'static str]> {
    let fields: &'static [&'static str] = match job_type {
        "SamplingJob" => &[
            "Sampler.Environment.Map",
            "Sampler.Environment.Mask",
            "Sampler.Absence.CoordinateSystem",
            "Sampler.Absence.Point",
        ],
        "CreateModelJob" => &["ModelEnvelope.SerializedModel.Algorithm"],
        "TestModelJob" => &["TestResultEnvelope.Statistics.ConfusionMatrix.Threshold"],
        "ProjectModelJob" => &[
            "ProjectionEnvelope.url",
            "ProjectionEnvelope.Statistics.AreaStatistics",
        ],
        "EvaluateModelJob" => &["Values.V"],
        _ => return None,
    };
    Some(fields)
}

/// One job to run
#[derive(Debug, Clone, PartialEq)]
pub struct JobRequest {
    pub kind: JobKind,
    /// Submission payload
    pub params: Value,
}

impl JobRequest {
    pub fn new(kind: JobKind, params: Value) -> Self {
        Self { kind, params }
    }
}

/// A finished and validated job
#[derive(Debug, Clone, PartialEq)]
pub struct JobResult {
    pub kind: JobKind,
    /// Tickets in submission order
    pub tickets: Vec<Ticket>,
    /// Validated result payload
    pub result: Value,
    /// Progress queries issued across all tickets
    pub polls: u32,
}

/// Job errors
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Invalid job kind: {0}")]
    InvalidKind(String),

    #[error(transparent)]
    Submit(InvokeError),

    #[error(transparent)]
    Track(#[from] TrackError),

    #[error(transparent)]
    Fetch(InvokeError),

    #[error("No {element} element in {operation} response")]
    MissingField {
        operation: Operation,
        /// Path with `/` separators, as reported
        element: String,
    },

    #[error("Missing ticket for job in {operation} response")]
    MissingTicket { operation: Operation },

    #[error("Unknown ticket ({ticket}) in {operation} response")]
    UnexpectedTicket { operation: Operation, ticket: String },

    #[error("No result for ticket ({ticket}) in {operation} response")]
    MissingResult { operation: Operation, ticket: String },

    #[error("Ticket ({ticket}) has no known job type in {operation} response")]
    UndeclaredJob { operation: Operation, ticket: String },
}

impl JobError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            JobError::InvalidKind(_) => FailureKind::Config,
            JobError::Submit(e) | JobError::Fetch(e) => invoke_failure_kind(e),
            JobError::Track(e) => e.failure_kind(),
            JobError::MissingField { .. }
            | JobError::MissingTicket { .. }
            | JobError::UnexpectedTicket { .. }
            | JobError::MissingResult { .. }
            | JobError::UndeclaredJob { .. } => FailureKind::Protocol,
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        self.failure_kind().exit_code()
    }

    /// One-line report; invoker detail follows the verbosity rule
    pub fn report(&self, verbose: bool) -> String {
        match self {
            JobError::Submit(e) | JobError::Fetch(e) => e.report(verbose),
            JobError::Track(e) => e.report(verbose),
            other => other.to_string(),
        }
    }
}
