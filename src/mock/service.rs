//! Mock Service Implementation
//!
//! Answers request envelopes in-process the way a healthy endpoint would,
//! unless a failure has been injected for the operation.

use std::sync::{Mutex, MutexGuard};

use omws_protocol::{progress, FaultCode, FaultPayload, Operation, ServiceRequest, ServiceResponse};
use serde_json::{json, Value};
use tracing::trace;

use super::failure::{FailureConfig, FailureInjector};
use super::state::{default_result, experiment_section, MockState};
use crate::host::transport::TransportError;

/// In-process mock of the modeling web service
#[derive(Debug, Default)]
pub struct MockService {
    state: Mutex<MockState>,
    failures: Mutex<FailureInjector>,
}

impl MockService {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_failures(&self) -> MutexGuard<'_, FailureInjector> {
        self.failures.lock().unwrap_or_else(|e| e.into_inner())
    }

    // === Test configuration ===

    pub fn inject_failure(&self, op: Operation, config: FailureConfig) {
        self.lock_failures().inject(op, config);
    }

    pub fn clear_failure(&self, op: Operation) {
        self.lock_failures().clear_op(op);
    }

    pub fn clear_failures(&self) {
        self.lock_failures().clear();
    }

    /// Script the ticket handed out by the next submission and the
    /// progress codes it will report
    pub fn queue_job(&self, ticket: impl Into<String>, progression: Vec<i64>) {
        self.lock_state()
            .queued
            .push_back((ticket.into(), progression));
    }

    /// Override the payload returned for an operation
    pub fn set_result(&self, op: Operation, payload: Value) {
        self.lock_state().overrides.insert(op, payload);
    }

    pub fn set_ping_value(&self, value: Value) {
        self.lock_state().ping_value = value;
    }

    pub fn set_algorithms(&self, payload: Value) {
        self.lock_state().algorithms = payload;
    }

    pub fn set_layers(&self, payload: Value) {
        self.lock_state().layers = payload;
    }

    pub fn set_url_status(&self, url: impl Into<String>, status: u16) {
        self.lock_state().url_statuses.insert(url.into(), status);
    }

    // === Inspection ===

    /// Requests received for an operation, failed attempts included
    pub fn call_count(&self, op: Operation) -> u32 {
        self.lock_state().call_counts.get(&op).copied().unwrap_or(0)
    }

    /// Progress queries received for a ticket
    pub fn progress_polls(&self, ticket: &str) -> u32 {
        self.lock_state().jobs.get(ticket).map_or(0, |job| job.polls)
    }

    /// Tickets issued so far
    pub fn issued_tickets(&self) -> Vec<String> {
        let mut tickets: Vec<String> = self.lock_state().jobs.keys().cloned().collect();
        tickets.sort();
        tickets
    }

    // === Request handling ===

    /// Handle one request envelope
    pub fn dispatch(&self, request: &ServiceRequest) -> Result<ServiceResponse, TransportError> {
        *self
            .lock_state()
            .call_counts
            .entry(request.op)
            .or_insert(0) += 1;

        let injected = self.lock_failures().check(request.op).cloned();
        if let Some(failure) = injected {
            trace!(op = %request.op, mode = ?failure.mode, "injecting failure");
            let fault = failure.outcome()?;
            return Ok(ServiceResponse::fault(request.request_id.clone(), fault));
        }

        let mut state = self.lock_state();
        if let Some(payload) = state.overrides.get(&request.op) {
            return Ok(ServiceResponse::success(request.request_id.clone(), payload.clone()));
        }

        let answer = match request.op {
            Operation::Ping => Ok(state.ping_value.clone()),
            Operation::GetAlgorithms => Ok(state.algorithms.clone()),
            Operation::GetLayers => Ok(state.layers.clone()),
            Operation::RunExperiment => Ok(handle_run_experiment(&mut state, &request.payload)),
            op if op.is_submission() => Ok(json!(state.issue_ticket())),
            Operation::GetProgress => Ok(handle_get_progress(&mut state, &request.payload)),
            Operation::GetResults => Ok(handle_get_results(&state, &request.payload)),
            Operation::GetLog => known_ticket(&state, &request.payload)
                .map(|ticket| json!(format!("[mock] job {} finished\n", ticket))),
            Operation::GetLayerAsUrl => known_ticket(&state, &request.payload)
                .map(|ticket| json!(format!("http://mock.omws/layers/{}.img", ticket))),
            op => known_ticket(&state, &request.payload).and_then(|_| {
                default_result(op).ok_or_else(|| {
                    FaultPayload::new(format!("operation {} not supported", op))
                        .with_code(FaultCode::InvalidParameters.as_str())
                })
            }),
        };

        Ok(match answer {
            Ok(payload) => ServiceResponse::success(request.request_id.clone(), payload),
            Err(fault) => ServiceResponse::fault(request.request_id.clone(), fault),
        })
    }

    /// Status a GET on a service-issued URL would answer
    pub fn url_status(&self, url: &str) -> Result<u16, TransportError> {
        Ok(self.lock_state().url_statuses.get(url).copied().unwrap_or(200))
    }
}

fn handle_run_experiment(state: &mut MockState, params: &Value) -> Value {
    let declared: Vec<Option<String>> = match params.get("Jobs").and_then(Value::as_array) {
        Some(jobs) if !jobs.is_empty() => jobs
            .iter()
            .map(|job| job.get("Type").and_then(Value::as_str).map(String::from))
            .collect(),
        _ => vec![None; state.queued.len().max(1)],
    };

    let jobs: Vec<Value> = declared
        .into_iter()
        .enumerate()
        .map(|(i, job_type)| {
            let ticket = state.issue_ticket();
            if let Some(job) = state.jobs.get_mut(&ticket) {
                job.experiment_type = job_type;
            }
            json!({"id": format!("job{}", i + 1), "Ticket": ticket})
        })
        .collect();
    json!({ "Job": jobs })
}

fn handle_get_progress(state: &mut MockState, payload: &Value) -> Value {
    let code = payload
        .as_str()
        .and_then(|ticket| state.jobs.get_mut(ticket))
        .map_or(progress::UNKNOWN_TICKET, |job| job.poll());
    json!(code)
}

fn handle_get_results(state: &MockState, payload: &Value) -> Value {
    let jobs: Vec<Value> = payload
        .as_str()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|ticket| {
            let job_type = state
                .jobs
                .get(ticket)
                .and_then(|job| job.experiment_type.as_deref())
                .unwrap_or_default();
            let mut entry = experiment_section(job_type);
            entry["Ticket"] = json!(ticket);
            entry
        })
        .collect();
    json!({ "Job": jobs })
}

fn known_ticket(state: &MockState, payload: &Value) -> Result<String, FaultPayload> {
    let ticket = payload.as_str().unwrap_or_default();
    if state.jobs.contains_key(ticket) {
        Ok(ticket.to_string())
    } else {
        Err(FaultPayload::new(format!("Unknown ticket: {}", ticket))
            .with_code(FaultCode::UnknownTicket.as_str()))
    }
}
