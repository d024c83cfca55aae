//! Operation Invoker
//!
//! Performs one remote operation with bounded retry. Every attempt is
//! classified into an [`OperationOutcome`]:
//! - `Success`: the response payload is returned
//! - `TransientFault`: the identical request is re-sent until the attempt
//!   budget is spent
//! - `PermanentFault`: escalated at once, never retried

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use omws_protocol::{Fault, Operation, ServiceRequest, ServiceResponse, TransientKind};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace, warn};

use super::transport::{Transport, TransportError};
use crate::summary::ExitCode;
use crate::timeout::{Clock, SystemClock};

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per call, first one included (default: 3)
    pub max_attempts: u32,
    /// Initial backoff delay in milliseconds; 0 retries immediately
    pub backoff_initial_ms: u64,
    /// Maximum backoff delay in milliseconds
    pub backoff_max_ms: u64,
    /// Extra regular expressions whose match marks a fault transient
    pub extra_transient_patterns: Vec<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_initial_ms: 0,
            backoff_max_ms: 30000,
            extra_transient_patterns: Vec::new(),
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry that follows failed attempt number `attempt`
    pub fn backoff(&self, attempt: u32) -> Duration {
        if self.backoff_initial_ms == 0 || attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 2u64.saturating_pow(attempt - 1);
        let delay = self.backoff_initial_ms.saturating_mul(factor);
        Duration::from_millis(delay.min(self.backoff_max_ms))
    }
}

/// Classification of one call attempt
#[derive(Debug)]
pub enum OperationOutcome {
    Success(Value),
    TransientFault { kind: TransientKind, fault: Fault },
    PermanentFault(PermanentFault),
}

/// Non-retryable failure of one attempt
#[derive(Debug)]
pub enum PermanentFault {
    /// The service answered with a fault
    Remote(Fault),
    /// The exchange failed below the envelope
    Transport(TransportError),
    /// The answer was not the expected envelope or lacked its payload
    Protocol(String),
}

impl PermanentFault {
    fn into_error(self, operation: Operation) -> InvokeError {
        match self {
            PermanentFault::Remote(fault) => InvokeError::Fault { operation, fault },
            PermanentFault::Transport(source) => InvokeError::Transport { operation, source },
            PermanentFault::Protocol(detail) => InvokeError::Protocol { operation, detail },
        }
    }
}

/// Invoker errors
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error("{operation} web fault: {fault}")]
    Fault { operation: Operation, fault: Fault },

    #[error("{operation} call failure: {source}")]
    Transport {
        operation: Operation,
        #[source]
        source: TransportError,
    },

    #[error("{operation} protocol violation: {detail}")]
    Protocol { operation: Operation, detail: String },

    #[error("Exceeded number of retries for {operation} ({attempts} attempts). Last fault: {last}")]
    RetriesExhausted {
        operation: Operation,
        attempts: u32,
        last: Fault,
    },
}

impl InvokeError {
    pub fn operation(&self) -> Operation {
        match self {
            InvokeError::Fault { operation, .. }
            | InvokeError::Transport { operation, .. }
            | InvokeError::Protocol { operation, .. }
            | InvokeError::RetriesExhausted { operation, .. } => *operation,
        }
    }

    /// One-line report; fault detail is appended only when `verbose`
    pub fn report(&self, verbose: bool) -> String {
        if verbose {
            return self.to_string();
        }
        match self {
            InvokeError::Fault { operation, .. } => format!("{} web fault", operation),
            InvokeError::Transport { operation, source } => match source {
                TransportError::HttpStatus { status } => {
                    format!("{} call failure (HTTP status code {})", operation, status)
                }
                TransportError::EmptyResponse => format!("No response returned by {}", operation),
                TransportError::Malformed(_) => format!(
                    "{} call failure: could not parse response (premature end of script headers?)",
                    operation
                ),
                TransportError::ConnectionFailed(_) | TransportError::ConnectionTimeout => {
                    format!("{} URL error", operation)
                }
                _ => format!("{} call failure", operation),
            },
            InvokeError::Protocol { operation, detail } => format!("{} {}", operation, detail),
            InvokeError::RetriesExhausted { operation, .. } => {
                format!("Exceeded number of retries for {}", operation)
            }
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::Critical
    }
}

/// Result type for invoker operations
pub type InvokeResult<T> = Result<T, InvokeError>;

/// Issues remote calls with transient-fault retry
pub struct OperationInvoker {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
    extra_patterns: Vec<Regex>,
    clock: Arc<dyn Clock>,
    /// Request ID counter
    request_counter: AtomicU64,
}

impl OperationInvoker {
    /// Create an invoker with the default policy and the system clock
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            policy: RetryPolicy::default(),
            extra_patterns: Vec::new(),
            clock: Arc::new(SystemClock),
            request_counter: AtomicU64::new(0),
        }
    }

    /// Create an invoker with a custom policy and clock
    pub fn with_policy(
        transport: Arc<dyn Transport>,
        policy: RetryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, regex_lite::Error> {
        let extra_patterns = policy
            .extra_transient_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            transport,
            policy,
            extra_patterns,
            clock,
            request_counter: AtomicU64::new(0),
        })
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Generate a unique request ID
    fn next_request_id(&self) -> String {
        let counter = self.request_counter.fetch_add(1, Ordering::SeqCst);
        format!("req-{}-{:04x}", uuid::Uuid::new_v4().simple(), counter)
    }

    /// Call `operation` with `payload`, retrying transient faults
    pub fn invoke(&self, operation: Operation, payload: Value) -> InvokeResult<Value> {
        let request = ServiceRequest::new(operation, self.next_request_id(), payload);
        let budget = self.policy.max_attempts.max(1);
        let mut remaining = budget;
        let mut attempt = 0;

        loop {
            attempt += 1;
            trace!(
                request = %serde_json::to_string(&request).unwrap_or_default(),
                attempt,
                "sending request"
            );

            let result = self.transport.execute(&request);
            if let Ok(ref response) = result {
                trace!(
                    response = %serde_json::to_string(response).unwrap_or_default(),
                    "received response"
                );
            }

            match self.classify(result) {
                OperationOutcome::Success(payload) => {
                    debug!(%operation, attempt, "call succeeded");
                    return Ok(payload);
                }
                OperationOutcome::TransientFault { kind, fault } => {
                    remaining -= 1;
                    if remaining == 0 {
                        warn!(%operation, attempts = attempt, last = %fault, "retries exhausted");
                        return Err(InvokeError::RetriesExhausted {
                            operation,
                            attempts: attempt,
                            last: fault,
                        });
                    }
                    debug!(
                        %operation,
                        attempt,
                        kind = kind.as_str(),
                        fault = %fault,
                        "transient fault, retrying"
                    );
                    let delay = self.policy.backoff(attempt);
                    if !delay.is_zero() {
                        self.clock.sleep(delay);
                    }
                }
                OperationOutcome::PermanentFault(fault) => {
                    debug!(%operation, attempt, ?fault, "permanent fault");
                    return Err(fault.into_error(operation));
                }
            }
        }
    }

    /// Classify the result of one exchange
    pub fn classify(&self, result: Result<ServiceResponse, TransportError>) -> OperationOutcome {
        match result {
            Ok(response) if response.ok => match response.payload {
                Some(payload) if !payload.is_null() => OperationOutcome::Success(payload),
                _ => OperationOutcome::PermanentFault(PermanentFault::Protocol(
                    "response carried no payload".to_string(),
                )),
            },
            Ok(response) => {
                let fault = response
                    .fault
                    .map(Fault::from)
                    .unwrap_or_else(|| Fault::new("fault response without details"));
                match self.transient_kind(&fault) {
                    Some(kind) => OperationOutcome::TransientFault { kind, fault },
                    None => OperationOutcome::PermanentFault(PermanentFault::Remote(fault)),
                }
            }
            Err(error @ TransportError::ConnectionFailed(_)) => {
                let fault = Fault::new(error.to_string());
                match self.transient_kind(&fault) {
                    Some(kind) => OperationOutcome::TransientFault { kind, fault },
                    None => OperationOutcome::PermanentFault(PermanentFault::Transport(error)),
                }
            }
            Err(error) => OperationOutcome::PermanentFault(PermanentFault::Transport(error)),
        }
    }

    fn transient_kind(&self, fault: &Fault) -> Option<TransientKind> {
        fault.transient_kind().or_else(|| {
            // Configured patterns never override a structured code
            let configured = self
                .extra_patterns
                .iter()
                .any(|re| re.is_match(&fault.message));
            (fault.code.is_none() && configured).then_some(TransientKind::Configured)
        })
    }
}
