//! Generic job runner: submit, track every ticket, fetch, validate

use omws_protocol::{Operation, Ticket};
use serde_json::Value;
use tracing::{debug, info};

use super::{experiment_job_fields, JobError, JobKind, JobRequest, JobResult};
use crate::host::client::one_or_many;
use crate::host::ServiceClient;
use crate::timeout::{Clock, PollConfig};
use crate::tracker::ProgressTracker;

/// Runs one job to a validated result
pub struct JobRunner<'a> {
    client: &'a ServiceClient,
    clock: &'a dyn Clock,
    poll: PollConfig,
}

impl<'a> JobRunner<'a> {
    pub fn new(client: &'a ServiceClient, clock: &'a dyn Clock, poll: PollConfig) -> Self {
        Self {
            client,
            clock,
            poll,
        }
    }

    /// Submit, poll each ticket to completion in order, then fetch and
    /// validate the result
    pub fn run(&self, request: &JobRequest) -> Result<JobResult, JobError> {
        let kind = request.kind;
        let submit_op = kind.submit_operation();

        let mut tickets = self
            .client
            .submit(submit_op, request.params.clone())
            .map_err(JobError::Submit)?;
        if kind != JobKind::Experiment {
            tickets.truncate(1);
        }
        info!(%kind, tickets = %Ticket::join(&tickets), "job submitted");

        let tracker = ProgressTracker::new(self.client, self.clock, self.poll);
        let mut polls = 0;
        for ticket in &tickets {
            let report = tracker.track(ticket, submit_op.as_str())?;
            polls += report.polls;
        }

        let result_op = kind.result_operation();
        let result = self
            .client
            .get_result(result_op, &tickets)
            .map_err(JobError::Fetch)?;
        debug!(%kind, operation = %result_op, "result fetched");

        validate_fields(result_op, &result, kind.required_fields())?;
        if kind == JobKind::Experiment {
            validate_experiment(&result, &tickets, &request.params)?;
        }

        Ok(JobResult {
            kind,
            tickets,
            result,
            polls,
        })
    }
}

/// Follow a dotted path; arrays are entered at their first element
pub fn lookup_path<'v>(value: &'v Value, path: &str) -> Option<&'v Value> {
    let mut current = value;
    for segment in path.split('.') {
        let node = match current {
            Value::Array(items) => items.first()?,
            other => other,
        };
        current = node.get(segment)?;
    }
    (!current.is_null()).then_some(current)
}

fn validate_fields(operation: Operation, value: &Value, paths: &[&str]) -> Result<(), JobError> {
    for path in paths {
        if lookup_path(value, path).is_none() {
            return Err(JobError::MissingField {
                operation,
                element: path.replace('.', "/"),
            });
        }
    }
    Ok(())
}

/// Every issued ticket must come back exactly as declared: each returned
/// job carries an issued ticket and the sections its declared job type
/// produces
fn validate_experiment(result: &Value, tickets: &[Ticket], params: &Value) -> Result<(), JobError> {
    let operation = Operation::GetResults;
    let jobs = result.get("Job").map(one_or_many).unwrap_or_default();
    if jobs.is_empty() {
        return Err(JobError::MissingField {
            operation,
            element: "Job".to_string(),
        });
    }

    let mut answered = vec![false; tickets.len()];
    for job in jobs {
        let ticket = job
            .get("Ticket")
            .and_then(Value::as_str)
            .ok_or(JobError::MissingTicket { operation })?;

        let position = tickets
            .iter()
            .position(|t| t.as_str() == ticket)
            .ok_or_else(|| JobError::UnexpectedTicket {
                operation,
                ticket: ticket.to_string(),
            })?;
        answered[position] = true;

        let fields = params
            .get("Jobs")
            .and_then(|declared| declared.get(position))
            .and_then(|declared| declared.get("Type"))
            .and_then(Value::as_str)
            .and_then(experiment_job_fields)
            .ok_or_else(|| JobError::UndeclaredJob {
                operation,
                ticket: ticket.to_string(),
            })?;
        validate_fields(operation, job, fields)?;
    }

    match answered.iter().position(|seen| !seen) {
        Some(missing) => Err(JobError::MissingResult {
            operation,
            ticket: tickets[missing].to_string(),
        }),
        None => Ok(()),
    }
}
