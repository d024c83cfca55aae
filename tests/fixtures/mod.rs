//! Shared harness for integration tests
//!
//! Wires a [`ServiceClient`] to the in-process mock service and a manual
//! clock so poll loops finish instantly and sleeps can be inspected.

#![allow(dead_code)]

use std::sync::Arc;

use omws_client::config::ClientConfig;
use omws_client::host::{MockTransport, OperationInvoker, RetryPolicy, ServiceClient};
use omws_client::mock::MockService;
use omws_client::timeout::ManualClock;

pub const ENDPOINT: &str = "http://mock.omws/omws2";

pub struct Harness {
    pub transport: Arc<MockTransport>,
    pub clock: Arc<ManualClock>,
    pub client: ServiceClient,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_policy(RetryPolicy::default())
    }

    pub fn with_policy(policy: RetryPolicy) -> Self {
        let transport = Arc::new(MockTransport::new());
        let clock = Arc::new(ManualClock::new());
        let invoker = OperationInvoker::with_policy(transport.clone(), policy, clock.clone())
            .expect("valid retry policy");
        Self {
            transport,
            clock,
            client: ServiceClient::new(invoker),
        }
    }

    pub fn service(&self) -> &MockService {
        self.transport.service()
    }
}

/// Built-in configuration pointed at the mock endpoint
pub fn config() -> ClientConfig {
    ClientConfig {
        endpoint: Some(ENDPOINT.to_string()),
        ..ClientConfig::default()
    }
}
