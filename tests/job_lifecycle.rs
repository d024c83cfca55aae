//! Job lifecycle: submit, poll to a terminal state, fetch and validate
//!
//! Runs the generic job runner and the progress tracker over the mock
//! service with scripted progress sequences.

mod fixtures;

use std::time::Duration;

use fixtures::{config, Harness};
use omws_client::check::job_params;
use omws_client::host::InvokeError;
use omws_client::job::{JobError, JobKind, JobRequest, JobRunner};
use omws_client::mock::FailureConfig;
use omws_client::summary::ExitCode;
use omws_client::timeout::PollConfig;
use omws_client::tracker::{JobState, ProgressTracker, TrackError};
use omws_protocol::{Operation, Ticket};
use serde_json::json;

fn request(kind: JobKind) -> JobRequest {
    JobRequest::new(kind, job_params(kind, &config().check, None))
}

fn new_tracker(harness: &Harness, poll: PollConfig) -> ProgressTracker<'_> {
    ProgressTracker::new(&harness.client, harness.clock.as_ref(), poll)
}

fn new_runner(harness: &Harness) -> JobRunner<'_> {
    JobRunner::new(&harness.client, harness.clock.as_ref(), PollConfig::default())
}

// =============================================================================
// Progress tracking
// =============================================================================

#[test]
fn test_ticket_completes_after_two_polls() {
    let harness = Harness::new();
    harness.service().queue_job("T1", vec![40, 100]);
    let tickets = harness.client.submit(Operation::CreateModel, json!({})).unwrap();

    let tracker = new_tracker(&harness, PollConfig::default());
    let report = tracker.track(&tickets[0], "createModel").unwrap();

    assert_eq!(report.polls, 2);
    assert_eq!(harness.service().progress_polls("T1"), 2);
    assert_eq!(harness.clock.sleeps(), vec![Duration::from_secs(5); 2]);
}

#[test]
fn test_abort_stops_polling() {
    let harness = Harness::new();
    harness.service().queue_job("T2", vec![10, -2, 100]);
    let tickets = harness.client.submit(Operation::TestModel, json!({})).unwrap();

    let tracker = new_tracker(&harness, PollConfig::default());
    let err = tracker.track(&tickets[0], "testModel").unwrap_err();

    assert_eq!(err.state(), JobState::Aborted);
    assert_eq!(harness.service().call_count(Operation::GetProgress), 2);
}

#[test]
fn test_stuck_progress_times_out() {
    let harness = Harness::new();
    harness.service().queue_job("T3", vec![50]);
    let tickets = harness.client.submit(Operation::ProjectModel, json!({})).unwrap();

    let poll = PollConfig {
        interval_seconds: 5,
        timeout_seconds: 20,
    };
    let tracker = new_tracker(&harness, poll);
    let err = tracker.track(&tickets[0], "projectModel").unwrap_err();

    assert!(matches!(err, TrackError::TimedOut { .. }));
    assert_eq!(err.exit_code(), ExitCode::Critical);
    // Polls at t=5,10,15,20,25; t=25 is past the 20 s budget
    assert_eq!(harness.service().progress_polls("T3"), 5);
}

#[test]
fn test_unknown_ticket() {
    let harness = Harness::new();
    let tracker = new_tracker(&harness, PollConfig::default());

    let err = tracker
        .track(&Ticket::new("never-issued").unwrap(), "getProgress")
        .unwrap_err();
    assert_eq!(err.state(), JobState::Unknown);
    assert_eq!(err.polls(), 1);
}

#[test]
fn test_progress_transport_failure() {
    let harness = Harness::new();
    harness.service().queue_job("T4", vec![20, 100]);
    let tickets = harness.client.submit(Operation::SamplePoints, json!({})).unwrap();
    harness
        .service()
        .inject_failure(Operation::GetProgress, FailureConfig::http_status(503));

    let tracker = new_tracker(&harness, PollConfig::default());
    let err = tracker.track(&tickets[0], "samplePoints").unwrap_err();

    assert_eq!(err.state(), JobState::TransportFailed);
    assert_eq!(err.report(false), "getProgress call failure (HTTP status code 503)");
}

// =============================================================================
// Job runner
// =============================================================================

#[test]
fn test_every_single_job_kind_runs() {
    let model = json!({"Id": "BIOCLIM", "Model": {}});
    for kind in JobKind::ALL.into_iter().filter(|k| *k != JobKind::Experiment) {
        let harness = Harness::new();
        let params = job_params(kind, &config().check, Some(&model));
        let runner = new_runner(&harness);

        let result = runner.run(&JobRequest::new(kind, params)).unwrap();
        assert_eq!(result.kind, kind);
        assert_eq!(result.tickets.len(), 1);
        assert_eq!(
            harness.service().call_count(kind.result_operation()),
            1,
            "{}",
            kind
        );
    }
}

#[test]
fn test_experiment_tracks_every_ticket() {
    let harness = Harness::new();
    let runner = new_runner(&harness);

    let result = runner.run(&request(JobKind::Experiment)).unwrap();

    assert_eq!(result.tickets.len(), 5);
    assert_eq!(result.polls, 5);
    assert_eq!(result.result["Job"].as_array().unwrap().len(), 5);
    assert_eq!(harness.service().call_count(Operation::GetResults), 1);
}

#[test]
fn test_experiment_stops_at_first_failed_ticket() {
    let harness = Harness::new();
    for (ticket, progression) in [
        ("E1", vec![100]),
        ("E2", vec![30, -3]),
        ("E3", vec![100]),
        ("E4", vec![100]),
        ("E5", vec![100]),
    ] {
        harness.service().queue_job(ticket, progression);
    }
    let runner = new_runner(&harness);

    let err = runner.run(&request(JobKind::Experiment)).unwrap_err();

    assert!(matches!(err, JobError::Track(TrackError::Cancelled { .. })));
    assert_eq!(err.to_string(), "runExperiment cancelled");
    assert_eq!(harness.service().progress_polls("E3"), 0);
    assert_eq!(harness.service().call_count(Operation::GetResults), 0);
}

#[test]
fn test_missing_result_field_is_protocol_violation() {
    let harness = Harness::new();
    harness
        .service()
        .set_result(Operation::GetModel, json!({"SerializedModel": {"Other": 1}}));
    let runner = new_runner(&harness);

    let err = runner.run(&request(JobKind::CreateModel)).unwrap_err();
    assert_eq!(
        err.to_string(),
        "No SerializedModel/Algorithm element in getModel response"
    );
    assert_eq!(err.exit_code(), ExitCode::Critical);
}

#[test]
fn test_submit_fault_is_reported() {
    let harness = Harness::new();
    harness.service().inject_failure(
        Operation::SamplePoints,
        FailureConfig::fault("Missing environment"),
    );
    let runner = new_runner(&harness);

    let err = runner.run(&request(JobKind::SamplePoints)).unwrap_err();
    assert!(matches!(err, JobError::Submit(InvokeError::Fault { .. })));
    assert_eq!(err.report(false), "samplePoints web fault");
    assert_eq!(harness.service().call_count(Operation::GetProgress), 0);
}

// =============================================================================
// Malformed experiment responses
// =============================================================================

#[test]
fn test_experiment_job_without_ticket_stops_at_submit() {
    let harness = Harness::new();
    harness.service().set_result(
        Operation::RunExperiment,
        json!({"Job": [{"Ticket": "E1"}, {"id": "job2"}, {"Ticket": "E3"}]}),
    );
    let runner = new_runner(&harness);

    let err = runner.run(&request(JobKind::Experiment)).unwrap_err();
    assert!(matches!(err, JobError::Submit(InvokeError::Protocol { .. })));
    assert_eq!(err.exit_code(), ExitCode::Critical);
    assert_eq!(harness.service().call_count(Operation::GetProgress), 0);
}

#[test]
fn test_experiment_with_no_job_results() {
    let harness = Harness::new();
    harness
        .service()
        .set_result(Operation::GetResults, json!({"Job": []}));
    let runner = new_runner(&harness);

    let err = runner.run(&request(JobKind::Experiment)).unwrap_err();
    assert_eq!(err.to_string(), "No Job element in getResults response");
    assert_eq!(err.exit_code(), ExitCode::Critical);
    assert_eq!(harness.service().call_count(Operation::GetProgress), 5);
}

#[test]
fn test_experiment_results_missing_a_ticket() {
    let harness = Harness::new();
    for ticket in ["E1", "E2", "E3", "E4", "E5"] {
        harness.service().queue_job(ticket, vec![100]);
    }
    harness.service().set_result(
        Operation::GetResults,
        json!({"Job": [{
            "Ticket": "E1",
            "Sampler": {
                "Environment": {"Map": [{"Id": "a"}], "Mask": {"Id": "a"}},
                "Absence": {"CoordinateSystem": "WGS84", "Point": [{"X": 1, "Y": 2}]}
            }
        }]}),
    );
    let runner = new_runner(&harness);

    let err = runner.run(&request(JobKind::Experiment)).unwrap_err();
    assert!(matches!(err, JobError::MissingResult { .. }));
    assert_eq!(err.to_string(), "No result for ticket (E2) in getResults response");
}
