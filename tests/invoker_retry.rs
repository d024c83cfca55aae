//! Operation invoker retry behaviour against the mock service
//!
//! Transient faults are re-sent unchanged until the attempt budget is
//! spent; anything else escalates on the first attempt.

mod fixtures;

use std::time::Duration;

use fixtures::Harness;
use omws_client::host::{InvokeError, RetryPolicy, TransportError};
use omws_client::mock::FailureConfig;
use omws_protocol::{FaultCode, Operation};
use serde_json::{json, Value};

const COMPRESSION: &str = "Server raised fault: 'Zlib/gzip error'";
const RESOLVER: &str = "<urlopen error [Errno -2] Name or service not known>";

// =============================================================================
// Transient faults
// =============================================================================

#[test]
fn test_transient_faults_then_success() {
    for faults in 0..=2 {
        let harness = Harness::new();
        harness.service().inject_failure(
            Operation::GetAlgorithms,
            FailureConfig::fault(COMPRESSION).with_fail_count(faults),
        );

        let payload = harness
            .client
            .call(Operation::GetAlgorithms, Value::Null)
            .unwrap();
        assert!(payload.get("Algorithms").is_some());
        assert_eq!(
            harness.service().call_count(Operation::GetAlgorithms),
            faults + 1,
            "{} faults",
            faults
        );
    }
}

#[test]
fn test_three_transient_faults_exhaust_budget() {
    let harness = Harness::new();
    harness
        .service()
        .inject_failure(Operation::GetLayers, FailureConfig::fault(RESOLVER));

    let err = harness.client.get_layers().unwrap_err();
    match err {
        InvokeError::RetriesExhausted { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("expected retries exhausted, got {:?}", other),
    }
    assert_eq!(harness.service().call_count(Operation::GetLayers), 3);
}

#[test]
fn test_connection_failure_with_resolver_message_is_retried() {
    let harness = Harness::new();
    harness.service().inject_failure(
        Operation::Ping,
        FailureConfig::connection(RESOLVER).with_fail_count(1),
    );

    assert!(harness.client.ping().unwrap());
    assert_eq!(harness.service().call_count(Operation::Ping), 2);
}

#[test]
fn test_structured_code_marks_fault_transient() {
    let harness = Harness::new();
    harness.service().inject_failure(
        Operation::Ping,
        FailureConfig::fault_with_code(FaultCode::CompressionError, "stream corrupted")
            .with_fail_count(2),
    );

    assert!(harness.client.ping().unwrap());
    assert_eq!(harness.service().call_count(Operation::Ping), 3);
}

// =============================================================================
// Permanent faults
// =============================================================================

#[test]
fn test_permanent_fault_is_not_retried() {
    let harness = Harness::new();
    harness
        .service()
        .inject_failure(Operation::CreateModel, FailureConfig::fault("Invalid algorithm id"));

    let err = harness
        .client
        .submit(Operation::CreateModel, json!({}))
        .unwrap_err();
    assert!(matches!(err, InvokeError::Fault { .. }));
    assert_eq!(err.report(false), "createModel web fault");
    assert!(err.report(true).contains("Invalid algorithm id"));
    assert_eq!(harness.service().call_count(Operation::CreateModel), 1);
}

#[test]
fn test_structured_code_overrides_transient_text() {
    let harness = Harness::new();
    harness.service().inject_failure(
        Operation::Ping,
        FailureConfig::fault_with_code(FaultCode::InvalidParameters, "Zlib/gzip error in request"),
    );

    assert!(matches!(
        harness.client.ping().unwrap_err(),
        InvokeError::Fault { .. }
    ));
    assert_eq!(harness.service().call_count(Operation::Ping), 1);
}

#[test]
fn test_http_status_is_not_retried() {
    let harness = Harness::new();
    harness
        .service()
        .inject_failure(Operation::GetAlgorithms, FailureConfig::http_status(500));

    let err = harness.client.get_algorithms().unwrap_err();
    assert!(matches!(
        err,
        InvokeError::Transport {
            source: TransportError::HttpStatus { status: 500 },
            ..
        }
    ));
    assert_eq!(
        err.report(false),
        "getAlgorithms call failure (HTTP status code 500)"
    );
    assert_eq!(harness.service().call_count(Operation::GetAlgorithms), 1);
}

#[test]
fn test_malformed_and_empty_responses() {
    let harness = Harness::new();
    harness
        .service()
        .inject_failure(Operation::GetLayers, FailureConfig::malformed());
    let err = harness.client.get_layers().unwrap_err();
    assert!(err.report(false).contains("could not parse response"));

    harness
        .service()
        .inject_failure(Operation::GetLayers, FailureConfig::empty());
    let err = harness.client.get_layers().unwrap_err();
    assert_eq!(err.report(false), "No response returned by getLayers");
    assert_eq!(harness.service().call_count(Operation::GetLayers), 2);
}

// =============================================================================
// Policy knobs
// =============================================================================

#[test]
fn test_backoff_keeps_attempt_count() {
    let policy = RetryPolicy {
        backoff_initial_ms: 100,
        backoff_max_ms: 150,
        ..RetryPolicy::default()
    };
    let harness = Harness::with_policy(policy);
    harness
        .service()
        .inject_failure(Operation::Ping, FailureConfig::fault(COMPRESSION));

    assert!(harness.client.ping().is_err());
    assert_eq!(harness.service().call_count(Operation::Ping), 3);
    assert_eq!(
        harness.clock.sleeps(),
        vec![Duration::from_millis(100), Duration::from_millis(150)]
    );
}

#[test]
fn test_no_backoff_by_default() {
    let harness = Harness::new();
    harness.service().inject_failure(
        Operation::Ping,
        FailureConfig::fault(COMPRESSION).with_fail_count(2),
    );

    assert!(harness.client.ping().unwrap());
    assert!(harness.clock.sleeps().is_empty());
}

#[test]
fn test_configured_pattern_marks_fault_transient() {
    let policy = RetryPolicy {
        extra_transient_patterns: vec!["(?i)temporarily overloaded".to_string()],
        ..RetryPolicy::default()
    };
    let harness = Harness::with_policy(policy);
    harness.service().inject_failure(
        Operation::Ping,
        FailureConfig::fault("Service Temporarily Overloaded").with_fail_count(1),
    );

    assert!(harness.client.ping().unwrap());
    assert_eq!(harness.service().call_count(Operation::Ping), 2);
}
