//! Mock Service State
//!
//! Canned catalogue data, scripted tickets and per-operation result
//! overrides held by the mock service.

use std::collections::{HashMap, VecDeque};

use omws_protocol::{progress, Operation};
use serde_json::{json, Value};

use crate::config::DEFAULT_LAYERS;

/// A ticket whose progress answers follow a script
#[derive(Debug, Clone)]
pub struct ScriptedJob {
    /// Progress codes still to be returned, in order
    pub remaining: VecDeque<i64>,
    /// Last code returned; repeated once the script runs out
    pub last: i64,
    /// Number of progress queries seen
    pub polls: u32,
    /// Declared element type for jobs issued by `runExperiment`
    pub experiment_type: Option<String>,
}

impl ScriptedJob {
    pub fn new(progression: Vec<i64>) -> Self {
        Self {
            remaining: progression.into(),
            last: progress::PENDING,
            polls: 0,
            experiment_type: None,
        }
    }

    /// Answer one progress query
    pub fn poll(&mut self) -> i64 {
        self.polls += 1;
        if let Some(code) = self.remaining.pop_front() {
            self.last = code;
        }
        self.last
    }
}

/// Mutable state behind the mock service
#[derive(Debug)]
pub struct MockState {
    pub ping_value: Value,
    pub algorithms: Value,
    pub layers: Value,
    /// Payload overrides; take precedence over the built-in handlers
    pub overrides: HashMap<Operation, Value>,
    /// Tickets handed out by the next submissions, in order
    pub queued: VecDeque<(String, Vec<i64>)>,
    pub jobs: HashMap<String, ScriptedJob>,
    /// Status answered for projected layer URLs (default 200)
    pub url_statuses: HashMap<String, u16>,
    /// Request counts per operation
    pub call_counts: HashMap<Operation, u32>,
    /// Ticket counter for unscripted submissions
    pub counter: u64,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            ping_value: json!(1),
            algorithms: default_algorithms(),
            layers: default_layers(),
            overrides: HashMap::new(),
            queued: VecDeque::new(),
            jobs: HashMap::new(),
            url_statuses: HashMap::new(),
            call_counts: HashMap::new(),
            counter: 0,
        }
    }
}

impl MockState {
    /// Issue the next ticket, scripted or generated (completes on first poll)
    pub fn issue_ticket(&mut self) -> String {
        let (ticket, progression) = match self.queued.pop_front() {
            Some(entry) => entry,
            None => {
                self.counter += 1;
                (format!("mock-{:06}", self.counter), vec![progress::COMPLETE])
            }
        };
        self.jobs.insert(ticket.clone(), ScriptedJob::new(progression));
        ticket
    }
}

pub fn default_algorithms() -> Value {
    json!({
        "Algorithms": {
            "Algorithm": [
                {"Id": "BIOCLIM", "Version": "0.2", "Name": "Bioclim"},
                {"Id": "ENVDIST", "Version": "0.5", "Name": "Environmental Distance"}
            ]
        }
    })
}

pub fn default_layers() -> Value {
    json!({
        "Label": "layers",
        "LayersGroup": {
            "Label": "worldclim",
            "LayersGroup": [
                {
                    "Label": "bioclim",
                    "Layer": [
                        {"Id": DEFAULT_LAYERS[0], "Label": "Annual Mean Temperature"},
                        {"Id": DEFAULT_LAYERS[1], "Label": "Annual Precipitation"}
                    ]
                },
                {
                    "Label": "altitude",
                    "Layer": {"Id": "/layers/worldclim/alt/10arc-minutes/alt", "Label": "Altitude"}
                }
            ]
        }
    })
}

/// Section a healthy service returns for one experiment job
pub fn experiment_section(job_type: &str) -> Value {
    match job_type {
        "SamplingJob" => json!({
            "Sampler": default_result(Operation::GetSamplingResult)
        }),
        "CreateModelJob" => json!({
            "ModelEnvelope": default_result(Operation::GetModel)
        }),
        "TestModelJob" => json!({
            "TestResultEnvelope": {
                "Statistics": {"ConfusionMatrix": {"Threshold": 0.64038, "Accuracy": 100.0}}
            }
        }),
        "ProjectModelJob" => json!({
            "ProjectionEnvelope": {
                "url": "http://mock.omws/layers/experiment.img",
                "Statistics": {"AreaStatistics": {"TotalCells": 2592}}
            }
        }),
        "EvaluateModelJob" => json!({
            "Values": {"V": [1.0, 0.5]}
        }),
        _ => json!({}),
    }
}

/// Result payload a healthy service returns for a finished job
pub fn default_result(operation: Operation) -> Option<Value> {
    let result = match operation {
        Operation::GetModel => json!({
            "SerializedModel": {
                "Algorithm": {"Id": "BIOCLIM", "Version": "0.2", "Model": {"Mean": "0.5"}}
            }
        }),
        Operation::GetTestResult => json!({
            "Statistics": {
                "ConfusionMatrix": {"Threshold": 0.5, "Accuracy": 100.0}
            }
        }),
        Operation::GetProjectionMetadata => json!({
            "ProjectionEnvelope": {
                "AreaStatistics": {"TotalCells": 2592, "CellsPredicted": 1024}
            }
        }),
        Operation::GetModelEvaluation => json!({
            "Values": {"V": [1.0, 0.5]}
        }),
        Operation::GetSamplingResult => json!({
            "Environment": {
                "Map": [{"Id": DEFAULT_LAYERS[0]}, {"Id": DEFAULT_LAYERS[1]}],
                "Mask": {"Id": DEFAULT_LAYERS[0]}
            },
            "Absence": {
                "CoordinateSystem": "WGS84",
                "Point": [{"Id": "1", "X": -68.85, "Y": -11.15}]
            }
        }),
        _ => return None,
    };
    Some(result)
}
