//! Host-Side Components
//!
//! Implements the client side of the service protocol: transports, the
//! retrying operation invoker and typed service accessors.

pub mod client;
pub mod invoker;
pub mod transport;

pub use client::{AlgorithmInfo, LayerCatalog, ServiceClient};
pub use invoker::{InvokeError, InvokeResult, OperationInvoker, OperationOutcome, RetryPolicy};
pub use transport::{HttpConfig, HttpTransport, MockTransport, Transport, TransportError};
