//! Remote operation names.

use serde::{Deserialize, Serialize};

/// Operations exposed by the modeling web service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    /// Liveness check, returns `1` when the service is up
    Ping,
    /// Lists available algorithms
    GetAlgorithms,
    /// Returns the layer-group tree
    GetLayers,
    /// Submits a model creation job
    CreateModel,
    /// Fetches the serialized model of a finished creation job
    GetModel,
    /// Fetches the log of a finished job
    GetLog,
    /// Submits a model test job
    TestModel,
    /// Fetches statistics of a finished test job
    GetTestResult,
    /// Submits a model projection job
    ProjectModel,
    /// Fetches area statistics of a finished projection job
    GetProjectionMetadata,
    /// Returns a download URL for a projected layer
    GetLayerAsUrl,
    /// Submits a model evaluation job
    EvaluateModel,
    /// Fetches values of a finished evaluation job
    GetModelEvaluation,
    /// Submits a point sampling job
    SamplePoints,
    /// Fetches the sampled points of a finished sampling job
    GetSamplingResult,
    /// Submits a composite experiment, returns one ticket per job
    RunExperiment,
    /// Fetches results for a comma-separated ticket list
    GetResults,
    /// Returns the progress code for a ticket
    GetProgress,
}

impl Operation {
    /// Wire name of the operation
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Ping => "ping",
            Operation::GetAlgorithms => "getAlgorithms",
            Operation::GetLayers => "getLayers",
            Operation::CreateModel => "createModel",
            Operation::GetModel => "getModel",
            Operation::GetLog => "getLog",
            Operation::TestModel => "testModel",
            Operation::GetTestResult => "getTestResult",
            Operation::ProjectModel => "projectModel",
            Operation::GetProjectionMetadata => "getProjectionMetadata",
            Operation::GetLayerAsUrl => "getLayerAsUrl",
            Operation::EvaluateModel => "evaluateModel",
            Operation::GetModelEvaluation => "getModelEvaluation",
            Operation::SamplePoints => "samplePoints",
            Operation::GetSamplingResult => "getSamplingResult",
            Operation::RunExperiment => "runExperiment",
            Operation::GetResults => "getResults",
            Operation::GetProgress => "getProgress",
        }
    }

    /// Returns true for operations that start an asynchronous job
    pub fn is_submission(&self) -> bool {
        matches!(
            self,
            Operation::CreateModel
                | Operation::TestModel
                | Operation::ProjectModel
                | Operation::EvaluateModel
                | Operation::SamplePoints
                | Operation::RunExperiment
        )
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
