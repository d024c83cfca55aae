//! Request/Response Envelope
//!
//! Protocol: single JSON request POSTed to the endpoint → single JSON
//! response body.

use serde::{Deserialize, Serialize};

use crate::fault::Fault;
use crate::ops::Operation;

/// Request envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRequest {
    /// Operation to perform
    pub op: Operation,

    /// Caller-chosen request ID for correlation in server logs.
    /// Retries of the same call reuse the same ID.
    pub request_id: String,

    /// Operation-specific payload (`null` for parameterless queries)
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl ServiceRequest {
    /// Create a request for an operation
    pub fn new(op: Operation, request_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            op,
            request_id: request_id.into(),
            payload,
        }
    }
}

/// Response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceResponse {
    /// Whether the operation succeeded
    pub ok: bool,

    /// Echoed request ID
    #[serde(default)]
    pub request_id: Option<String>,

    /// Operation-specific payload (present when ok=true)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,

    /// Fault details (present when ok=false)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault: Option<FaultPayload>,
}

impl ServiceResponse {
    /// Create a successful response
    pub fn success(request_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            ok: true,
            request_id: Some(request_id.into()),
            payload: Some(payload),
            fault: None,
        }
    }

    /// Create a fault response
    pub fn fault(request_id: impl Into<String>, fault: FaultPayload) -> Self {
        Self {
            ok: false,
            request_id: Some(request_id.into()),
            payload: None,
            fault: Some(fault),
        }
    }
}

/// Fault payload as carried on the wire
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FaultPayload {
    /// Optional machine-readable code (see [`crate::FaultCode`])
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Human-readable fault string
    pub message: String,
}

impl FaultPayload {
    /// Fault with a message only
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    /// Attach a machine-readable code
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl From<FaultPayload> for Fault {
    fn from(payload: FaultPayload) -> Self {
        Fault::from_wire(payload.code.as_deref(), payload.message)
    }
}
