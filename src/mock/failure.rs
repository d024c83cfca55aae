//! Failure Injection for the Mock Service
//!
//! Lets tests script remote faults and transport breakage per operation.

use std::collections::HashMap;

use omws_protocol::{FaultCode, FaultPayload, Operation};

use crate::host::transport::TransportError;

/// How an injected failure surfaces to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureMode {
    /// Fault envelope returned by the service
    Fault {
        code: Option<FaultCode>,
        message: String,
    },
    /// Connection-level failure carrying the given message
    Connection(String),
    /// Request timed out
    Timeout,
    /// Non-success HTTP status
    HttpStatus(u16),
    /// Body that is not a response envelope
    Malformed,
    /// Empty body
    Empty,
}

/// Failure configuration for an operation
#[derive(Debug, Clone)]
pub struct FailureConfig {
    pub mode: FailureMode,
    /// Number of times to fail before succeeding (None = always fail)
    pub fail_count: Option<u32>,
}

impl FailureConfig {
    fn with_mode(mode: FailureMode) -> Self {
        Self {
            mode,
            fail_count: None,
        }
    }

    /// Fault with a message only; classified by its text
    pub fn fault(message: impl Into<String>) -> Self {
        Self::with_mode(FailureMode::Fault {
            code: None,
            message: message.into(),
        })
    }

    /// Fault carrying a structured code
    pub fn fault_with_code(code: FaultCode, message: impl Into<String>) -> Self {
        Self::with_mode(FailureMode::Fault {
            code: Some(code),
            message: message.into(),
        })
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::with_mode(FailureMode::Connection(message.into()))
    }

    pub fn timeout() -> Self {
        Self::with_mode(FailureMode::Timeout)
    }

    pub fn http_status(status: u16) -> Self {
        Self::with_mode(FailureMode::HttpStatus(status))
    }

    /// HTML error page instead of the envelope
    pub fn malformed() -> Self {
        Self::with_mode(FailureMode::Malformed)
    }

    pub fn empty() -> Self {
        Self::with_mode(FailureMode::Empty)
    }

    /// Set the number of times to fail before succeeding
    pub fn with_fail_count(mut self, count: u32) -> Self {
        self.fail_count = Some(count);
        self
    }

    /// What the client observes for this failure
    pub(crate) fn outcome(&self) -> Result<FaultPayload, TransportError> {
        match &self.mode {
            FailureMode::Fault { code, message } => {
                let payload = FaultPayload::new(message.clone());
                Ok(match code {
                    Some(code) => payload.with_code(code.as_str()),
                    None => payload,
                })
            }
            FailureMode::Connection(message) => {
                Err(TransportError::ConnectionFailed(message.clone()))
            }
            FailureMode::Timeout => Err(TransportError::ConnectionTimeout),
            FailureMode::HttpStatus(status) => Err(TransportError::HttpStatus { status: *status }),
            FailureMode::Malformed => Err(TransportError::Malformed(format!(
                "expected value at line 1 column 1 (body starts with {:?})",
                "<html><head><title>500 Internal Server Error"
            ))),
            FailureMode::Empty => Err(TransportError::EmptyResponse),
        }
    }
}

/// Failure injector for the mock service
#[derive(Debug, Default)]
pub struct FailureInjector {
    /// Per-operation failure configs
    configs: HashMap<Operation, FailureConfig>,
    /// Calls seen since injection (for fail_count tracking)
    call_counts: HashMap<Operation, u32>,
}

impl FailureInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject a failure for an operation, replacing any previous one
    pub fn inject(&mut self, op: Operation, config: FailureConfig) {
        self.configs.insert(op, config);
        self.call_counts.insert(op, 0);
    }

    pub fn clear(&mut self) {
        self.configs.clear();
        self.call_counts.clear();
    }

    pub fn clear_op(&mut self, op: Operation) {
        self.configs.remove(&op);
        self.call_counts.remove(&op);
    }

    /// Returns the failure to apply to this call, if any
    pub fn check(&mut self, op: Operation) -> Option<&FailureConfig> {
        let config = self.configs.get(&op)?;
        let count = self.call_counts.entry(op).or_insert(0);
        *count += 1;

        match config.fail_count {
            Some(limit) if *count > limit => None,
            _ => Some(config),
        }
    }
}
