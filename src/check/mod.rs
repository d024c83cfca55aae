//! Service check
//!
//! Drives a service through ping, catalogue queries and the enabled jobs,
//! stopping at the first step that is not OK. Every step lands in a
//! [`CheckResults`] accumulator which also carries the final exit code.

mod params;

use omws_protocol::{Operation, Ticket};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::host::client::one_or_many;
use crate::host::{InvokeError, ServiceClient, TransportError};
use crate::job::{lookup_path, JobError, JobKind, JobRequest, JobResult, JobRunner};
use crate::summary::{CheckResults, ExitCode, FailureKind};
use crate::timeout::Clock;
use crate::tracker::invoke_failure_kind;

pub use params::{job_params, WGS84_WKT};

/// Step label for an operation, e.g. "GetAlgorithms"
pub fn step_label(operation: Operation) -> String {
    let name = operation.as_str();
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Reasons a check stops
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("Service unavailable")]
    Unavailable,

    #[error("{source}")]
    Invoke {
        step: String,
        #[source]
        source: InvokeError,
    },

    #[error("No algorithms available")]
    NoAlgorithms,

    #[error("{0} algorithm not available")]
    MissingAlgorithm(String),

    #[error("No layers available on server")]
    NoLayers,

    #[error("Layer {index} used by the test not found on server")]
    MissingLayer { index: usize, id: String },

    #[error("{source}")]
    Job {
        step: String,
        #[source]
        source: JobError,
    },

    #[error("Remote projection file does not exist (HTTP status code {0})")]
    ProjectionUrlStatus(u16),

    #[error("Projection URL unreachable: {0}")]
    ProjectionUrlUnreachable(TransportError),

    #[error("{0} needs the model from create_model")]
    MissingModel(JobKind),
}

impl CheckError {
    /// Label of the step that failed
    pub fn step(&self) -> String {
        match self {
            CheckError::Unavailable => step_label(Operation::Ping),
            CheckError::Invoke { step, .. } | CheckError::Job { step, .. } => step.clone(),
            CheckError::NoAlgorithms | CheckError::MissingAlgorithm(_) => {
                step_label(Operation::GetAlgorithms)
            }
            CheckError::NoLayers | CheckError::MissingLayer { .. } => {
                step_label(Operation::GetLayers)
            }
            CheckError::ProjectionUrlStatus(_) | CheckError::ProjectionUrlUnreachable(_) => {
                "ProjectionUrl".to_string()
            }
            CheckError::MissingModel(kind) => step_label(kind.submit_operation()),
        }
    }

    pub fn failure_kind(&self) -> FailureKind {
        match self {
            CheckError::Unavailable | CheckError::NoAlgorithms => FailureKind::Unavailable,
            CheckError::Invoke { source, .. } => invoke_failure_kind(source),
            CheckError::MissingAlgorithm(_)
            | CheckError::NoLayers
            | CheckError::MissingLayer { .. } => FailureKind::MissingCapability,
            CheckError::Job { source, .. } => source.failure_kind(),
            CheckError::ProjectionUrlStatus(_) | CheckError::ProjectionUrlUnreachable(_) => {
                FailureKind::Transport
            }
            CheckError::MissingModel(_) => FailureKind::Config,
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        self.failure_kind().exit_code()
    }

    /// One-line report; detail is appended only when `verbose`
    pub fn report(&self, verbose: bool) -> String {
        match self {
            CheckError::Invoke { source, .. } => source.report(verbose),
            CheckError::Job { source, .. } => source.report(verbose),
            CheckError::ProjectionUrlUnreachable(_) if !verbose => {
                "Projection URL unreachable".to_string()
            }
            other => other.to_string(),
        }
    }
}

fn invoke_step(operation: Operation) -> impl FnOnce(InvokeError) -> CheckError {
    move |source| CheckError::Invoke {
        step: step_label(operation),
        source,
    }
}

fn job_step(kind: JobKind) -> impl FnOnce(JobError) -> CheckError {
    move |source| {
        let operation = match &source {
            JobError::Track(_) => Operation::GetProgress,
            JobError::Submit(_) | JobError::InvalidKind(_) => kind.submit_operation(),
            _ => kind.result_operation(),
        };
        CheckError::Job {
            step: step_label(operation),
            source,
        }
    }
}

/// One run of the service check
pub struct ServiceCheck<'a> {
    client: &'a ServiceClient,
    clock: &'a dyn Clock,
    config: &'a ClientConfig,
}

impl<'a> ServiceCheck<'a> {
    pub fn new(client: &'a ServiceClient, clock: &'a dyn Clock, config: &'a ClientConfig) -> Self {
        Self {
            client,
            clock,
            config,
        }
    }

    fn verbose(&self) -> bool {
        self.config.verbosity > 1
    }

    /// Run every step; the first non-OK step terminates the check
    pub fn run(&self) -> CheckResults {
        let mut results = CheckResults::new(self.config.endpoint.clone().unwrap_or_default());

        if let Err(err) = self.run_steps(&mut results) {
            let message = err.report(self.verbose());
            warn!(
                step = %err.step(),
                status = %err.exit_code(),
                cause = err.failure_kind().description(),
                "{}",
                message
            );
            results.fail(err.step(), err.exit_code(), message);
        } else {
            info!(steps = results.passed(), "service check passed");
        }
        results
    }

    fn run_steps(&self, results: &mut CheckResults) -> Result<(), CheckError> {
        self.check_ping()?;
        results.pass(step_label(Operation::Ping), None);

        let algorithms = self.check_algorithms()?;
        results.pass(
            step_label(Operation::GetAlgorithms),
            Some(format!("Found {} algorithms", algorithms)),
        );

        let layers = self.check_layers()?;
        results.pass(
            step_label(Operation::GetLayers),
            Some(format!("Found {} layers", layers)),
        );

        let mut model = None;
        for kind in JobKind::ALL {
            if self.config.check.runs(kind) {
                self.run_job(kind, &mut model, results)?;
            }
        }
        Ok(())
    }

    fn check_ping(&self) -> Result<(), CheckError> {
        let alive = self
            .client
            .ping()
            .map_err(invoke_step(Operation::Ping))?;
        if !alive {
            return Err(CheckError::Unavailable);
        }
        Ok(())
    }

    fn check_algorithms(&self) -> Result<usize, CheckError> {
        let algorithms = self
            .client
            .get_algorithms()
            .map_err(invoke_step(Operation::GetAlgorithms))?;
        debug!(count = algorithms.len(), "algorithms listed");

        if algorithms.is_empty() {
            return Err(CheckError::NoAlgorithms);
        }
        let required = &self.config.check.required_algorithm;
        if !algorithms.iter().any(|a| &a.id == required) {
            return Err(CheckError::MissingAlgorithm(required.clone()));
        }
        Ok(algorithms.len())
    }

    fn check_layers(&self) -> Result<usize, CheckError> {
        let catalog = self
            .client
            .get_layers()
            .map_err(invoke_step(Operation::GetLayers))?;
        debug!(count = catalog.len(), groups = catalog.groups, "layers listed");

        if catalog.is_empty() {
            return Err(CheckError::NoLayers);
        }
        if self.config.check.verify_layers {
            for (index, id) in self.config.check.layers.iter().enumerate() {
                if !catalog.contains(id) {
                    return Err(CheckError::MissingLayer {
                        index: index + 1,
                        id: id.clone(),
                    });
                }
            }
        }
        Ok(catalog.len())
    }

    fn run_job(
        &self,
        kind: JobKind,
        model: &mut Option<Value>,
        results: &mut CheckResults,
    ) -> Result<(), CheckError> {
        if kind.needs_model() && model.is_none() {
            return Err(CheckError::MissingModel(kind));
        }

        let request = JobRequest::new(kind, job_params(kind, &self.config.check, model.as_ref()));
        let runner = JobRunner::new(self.client, self.clock, self.config.poll);
        let job = runner.run(&request).map_err(job_step(kind))?;

        results.pass(
            step_label(kind.submit_operation()),
            Some(format!("tickets: {}", Ticket::join(&job.tickets))),
        );
        results.pass(
            step_label(Operation::GetProgress),
            Some(format!("{} polls", job.polls)),
        );
        results.pass(step_label(kind.result_operation()), None);

        match kind {
            JobKind::CreateModel => {
                *model = lookup_path(&job.result, "SerializedModel.Algorithm").cloned();
                if let Some(ticket) = job.tickets.first() {
                    let log = self
                        .client
                        .get_log(ticket)
                        .map_err(invoke_step(Operation::GetLog))?;
                    debug!(%ticket, bytes = log.len(), "log fetched");
                    results.pass(step_label(Operation::GetLog), None);
                }
            }
            JobKind::ProjectModel => {
                if let Some(ticket) = job.tickets.first() {
                    let url = self
                        .client
                        .get_layer_as_url(ticket)
                        .map_err(invoke_step(Operation::GetLayerAsUrl))?;
                    results.pass(step_label(Operation::GetLayerAsUrl), None);
                    self.check_projection_url(&url)?;
                    results.pass("ProjectionUrl", Some(url));
                }
            }
            JobKind::Experiment => {
                for url in projection_urls(&job) {
                    self.check_projection_url(&url)?;
                    results.pass("ProjectionUrl", Some(url));
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn check_projection_url(&self, url: &str) -> Result<(), CheckError> {
        let status = self
            .client
            .invoker()
            .transport()
            .url_status(url)
            .map_err(CheckError::ProjectionUrlUnreachable)?;
        debug!(url, status, "projection url checked");
        if status != 200 {
            return Err(CheckError::ProjectionUrlStatus(status));
        }
        Ok(())
    }
}

/// Projection URLs announced in an experiment's result sections
fn projection_urls(job: &JobResult) -> Vec<String> {
    job.result
        .get("Job")
        .map(one_or_many)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|section| lookup_path(section, "ProjectionEnvelope.url"))
        .filter_map(Value::as_str)
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{MockTransport, OperationInvoker, RetryPolicy};
    use crate::mock::FailureConfig;
    use crate::timeout::ManualClock;
    use serde_json::json;
    use std::sync::Arc;

    struct Fixture {
        transport: Arc<MockTransport>,
        clock: Arc<ManualClock>,
        client: ServiceClient,
        config: ClientConfig,
    }

    impl Fixture {
        fn new(jobs: Vec<JobKind>) -> Self {
            let transport = Arc::new(MockTransport::new());
            let clock = Arc::new(ManualClock::new());
            let invoker = OperationInvoker::with_policy(
                transport.clone(),
                RetryPolicy::default(),
                clock.clone(),
            )
            .unwrap();
            let mut config = ClientConfig {
                endpoint: Some("http://mock.omws".to_string()),
                ..ClientConfig::default()
            };
            config.check.jobs = jobs;
            Self {
                transport,
                clock,
                client: ServiceClient::new(invoker),
                config,
            }
        }

        fn run(&self) -> CheckResults {
            ServiceCheck::new(&self.client, self.clock.as_ref(), &self.config).run()
        }
    }

    #[test]
    fn test_step_label() {
        assert_eq!(step_label(Operation::GetAlgorithms), "GetAlgorithms");
        assert_eq!(step_label(Operation::Ping), "Ping");
    }

    #[test]
    fn test_default_check_passes() {
        let fixture = Fixture::new(vec![JobKind::Experiment]);
        let results = fixture.run();

        assert_eq!(results.exit_code(), ExitCode::Ok, "{}", results.status_line());
        let steps: Vec<&str> = results.steps.iter().map(|s| s.step.as_str()).collect();
        assert_eq!(
            steps,
            vec![
                "Ping",
                "GetAlgorithms",
                "GetLayers",
                "RunExperiment",
                "GetProgress",
                "GetResults",
                "ProjectionUrl"
            ]
        );
    }

    #[test]
    fn test_ping_zero_is_critical() {
        let fixture = Fixture::new(vec![]);
        fixture.transport.service().set_ping_value(json!(0));

        let results = fixture.run();
        assert_eq!(results.exit_code(), ExitCode::Critical);
        assert_eq!(results.message(), "Service unavailable");
        assert_eq!(fixture.transport.service().call_count(Operation::GetAlgorithms), 0);
    }

    #[test]
    fn test_missing_algorithm_is_warning() {
        let fixture = Fixture::new(vec![]);
        fixture
            .transport
            .service()
            .set_algorithms(json!({"Algorithms": {"Algorithm": [{"Id": "GARP"}]}}));

        let results = fixture.run();
        assert_eq!(results.exit_code(), ExitCode::Warning);
        assert_eq!(results.message(), "BIOCLIM algorithm not available");
    }

    #[test]
    fn test_empty_algorithm_list_is_critical() {
        let fixture = Fixture::new(vec![]);
        fixture
            .transport
            .service()
            .set_algorithms(json!({"Algorithms": {"Algorithm": []}}));

        let results = fixture.run();
        assert_eq!(results.exit_code(), ExitCode::Critical);
        assert_eq!(results.message(), "No algorithms available");
    }

    #[test]
    fn test_verify_layers() {
        let mut fixture = Fixture::new(vec![]);
        fixture.config.check.verify_layers = true;
        fixture
            .transport
            .service()
            .set_layers(json!({"Label": "root", "Layer": {"Id": DEFAULT_LAYER_A}}));

        let results = fixture.run();
        assert_eq!(results.exit_code(), ExitCode::Warning);
        assert_eq!(results.message(), "Layer 2 used by the test not found on server");
    }

    const DEFAULT_LAYER_A: &str = crate::config::DEFAULT_LAYERS[0];

    #[test]
    fn test_no_layers_is_warning() {
        let fixture = Fixture::new(vec![]);
        fixture.transport.service().set_layers(json!({"Label": "root"}));

        let results = fixture.run();
        assert_eq!(results.exit_code(), ExitCode::Warning);
        assert_eq!(results.message(), "No layers available on server");
    }

    #[test]
    fn test_model_chain() {
        let fixture = Fixture::new(vec![
            JobKind::CreateModel,
            JobKind::TestModel,
            JobKind::ProjectModel,
        ]);

        let results = fixture.run();
        assert_eq!(results.exit_code(), ExitCode::Ok, "{}", results.status_line());
        let service = fixture.transport.service();
        assert_eq!(service.call_count(Operation::GetLog), 1);
        assert_eq!(service.call_count(Operation::GetLayerAsUrl), 1);
        assert_eq!(service.call_count(Operation::EvaluateModel), 0);
    }

    #[test]
    fn test_aborted_job_is_critical() {
        let fixture = Fixture::new(vec![JobKind::SamplePoints]);
        fixture.transport.service().queue_job("S1", vec![10, -2]);

        let results = fixture.run();
        assert_eq!(results.exit_code(), ExitCode::Critical);
        assert_eq!(results.steps.last().unwrap().step, "GetProgress");
        assert_eq!(fixture.transport.service().progress_polls("S1"), 2);
    }

    #[test]
    fn test_projection_url_status() {
        let fixture = Fixture::new(vec![JobKind::CreateModel, JobKind::ProjectModel]);
        fixture.transport.service().queue_job("M1", vec![100]);
        fixture.transport.service().queue_job("P1", vec![100]);
        fixture
            .transport
            .service()
            .set_url_status("http://mock.omws/layers/P1.img", 404);

        let results = fixture.run();
        assert_eq!(results.exit_code(), ExitCode::Critical);
        assert_eq!(
            results.message(),
            "Remote projection file does not exist (HTTP status code 404)"
        );
    }

    #[test]
    fn test_fault_detail_follows_verbosity() {
        let mut fixture = Fixture::new(vec![]);
        fixture.transport.service().inject_failure(
            Operation::GetLayers,
            FailureConfig::fault("Invalid layer group"),
        );

        let results = fixture.run();
        assert_eq!(results.exit_code(), ExitCode::Critical);
        assert_eq!(results.message(), "getLayers web fault");

        fixture.transport.service().clear_failures();
        fixture.transport.service().inject_failure(
            Operation::GetLayers,
            FailureConfig::fault("Invalid layer group"),
        );
        fixture.config.verbosity = 2;
        let results = fixture.run();
        assert!(results.message().contains("Invalid layer group"));
    }

    #[test]
    fn test_unreachable_projection_url_report() {
        let err = CheckError::ProjectionUrlUnreachable(TransportError::ConnectionTimeout);
        assert_eq!(err.report(false), "Projection URL unreachable");
        assert!(err.report(true).starts_with("Projection URL unreachable: "));
        assert_eq!(err.exit_code(), ExitCode::Critical);
    }
}
