//! OMWS Protocol Types
//!
//! Defines the JSON envelope, operation names, progress code space and
//! fault codes used between the job client and a modeling web service.

pub mod envelope;
pub mod fault;
pub mod ops;
pub mod progress;
pub mod ticket;

pub use envelope::{FaultPayload, ServiceRequest, ServiceResponse};
pub use fault::{Fault, FaultCode, TransientKind};
pub use ops::Operation;
pub use progress::{Progress, ProgressError};
pub use ticket::Ticket;

/// Value returned by `ping` when the service is available.
pub const PING_OK: i64 = 1;
