//! Transport Layer for the Service Client
//!
//! Abstracts the HTTP connection for testability. Provides:
//! - Transport trait: interface for one request/response exchange
//! - MockTransport: in-process mock service for unit tests
//! - HttpTransport: real HTTP connection for production

use std::time::Duration;

use omws_protocol::{ServiceRequest, ServiceResponse};

use crate::mock::MockService;

/// Transport trait for service communication
pub trait Transport: Send + Sync {
    /// Send one request and return the decoded response envelope
    fn execute(&self, request: &ServiceRequest) -> Result<ServiceResponse, TransportError>;

    /// Issue a plain GET against a URL handed out by the service and
    /// return the HTTP status code
    fn url_status(&self, url: &str) -> Result<u16, TransportError>;
}

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection timeout")]
    ConnectionTimeout,

    #[error("HTTP status code {status}")]
    HttpStatus { status: u16 },

    #[error("No response body returned")]
    EmptyResponse,

    #[error("Could not parse response: {0}")]
    Malformed(String),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Client(String),
}

impl TransportError {
    /// Returns true when the response could not be understood at all
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            TransportError::EmptyResponse | TransportError::Malformed(_)
        )
    }
}

/// Mock transport for testing - connects directly to MockService in-process
pub struct MockTransport {
    service: MockService,
}

impl MockTransport {
    /// Create a new mock transport with a fresh mock service
    pub fn new() -> Self {
        Self {
            service: MockService::new(),
        }
    }

    /// Create a mock transport with a pre-configured service
    pub fn with_service(service: MockService) -> Self {
        Self { service }
    }

    /// Get a reference to the underlying mock service for test configuration
    pub fn service(&self) -> &MockService {
        &self.service
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn execute(&self, request: &ServiceRequest) -> Result<ServiceResponse, TransportError> {
        self.service.dispatch(request)
    }

    fn url_status(&self, url: &str) -> Result<u16, TransportError> {
        self.service.url_status(url)
    }
}

/// HTTP transport configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Service endpoint URL
    pub endpoint: String,
    /// Connection timeout in seconds
    pub connect_timeout_seconds: u64,
    /// Whole-request timeout in seconds
    pub request_timeout_seconds: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            connect_timeout_seconds: 30,
            request_timeout_seconds: 120,
        }
    }
}

/// HTTP transport for production use
///
/// POSTs the JSON request envelope to the endpoint and decodes the JSON
/// response body.
pub struct HttpTransport {
    config: HttpConfig,
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Create a new HTTP transport with the given configuration
    pub fn new(config: HttpConfig) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .user_agent(concat!("omws-check/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Client(error_chain(&e)))?;

        Ok(Self { config, client })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }
}

impl Transport for HttpTransport {
    fn execute(&self, request: &ServiceRequest) -> Result<ServiceResponse, TransportError> {
        let body = serde_json::to_vec(request)?;

        let response = self
            .client
            .post(&self.config.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        let bytes = response.bytes().map_err(map_reqwest_error)?;
        decode_response(status, &bytes)
    }

    fn url_status(&self, url: &str) -> Result<u16, TransportError> {
        let response = self.client.get(url).send().map_err(map_reqwest_error)?;
        Ok(response.status().as_u16())
    }
}

/// Decode a response by status
///
/// Faults may arrive with an error status; a fault envelope in the body
/// wins over the status, anything else non-2xx is `HttpStatus`.
fn decode_response(status: u16, bytes: &[u8]) -> Result<ServiceResponse, TransportError> {
    if (200..300).contains(&status) {
        return decode_body(bytes);
    }
    serde_json::from_slice::<ServiceResponse>(bytes)
        .ok()
        .filter(|response| !response.ok && response.fault.is_some())
        .ok_or(TransportError::HttpStatus { status })
}

/// Decode a response body, distinguishing "nothing" from "not our envelope"
fn decode_body(bytes: &[u8]) -> Result<ServiceResponse, TransportError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(TransportError::EmptyResponse);
    }

    serde_json::from_slice(bytes).map_err(|e| {
        let preview: String = String::from_utf8_lossy(bytes).chars().take(120).collect();
        TransportError::Malformed(format!("{} (body starts with {:?})", e, preview))
    })
}

fn map_reqwest_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::ConnectionTimeout
    } else {
        // The resolver's message sits at the bottom of the source chain
        TransportError::ConnectionFailed(error_chain(&error))
    }
}

/// Flatten an error and its sources into one line
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
