//! Fault Code Registry
//!
//! Faults carry an optional machine code and a free-text message. The
//! machine code decides retryability when present; older servers only send
//! text, in which case two known message signatures are matched instead.

/// Message fragment emitted by the SOAP layer on a corrupted compressed body.
pub const COMPRESSION_SIGNATURE: &str = "Zlib/gzip error";

/// Message fragment emitted by the resolver when the host cannot be looked up.
pub const NAME_RESOLUTION_SIGNATURE: &str = "Name or service not known";

/// Structured fault codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultCode {
    /// Compressed message body could not be decoded
    CompressionError,
    /// Endpoint host name could not be resolved
    NameResolution,
    /// Request payload rejected by the service
    InvalidParameters,
    /// Ticket not known to the service
    UnknownTicket,
    /// Service temporarily refusing work
    ServiceUnavailable,
    /// Unexpected server-side failure
    Internal,
}

impl FaultCode {
    /// Returns the string representation of the code
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultCode::CompressionError => "COMPRESSION_ERROR",
            FaultCode::NameResolution => "NAME_RESOLUTION",
            FaultCode::InvalidParameters => "INVALID_PARAMETERS",
            FaultCode::UnknownTicket => "UNKNOWN_TICKET",
            FaultCode::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            FaultCode::Internal => "INTERNAL",
        }
    }

    /// Parse a wire code; unknown codes yield `None`
    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "COMPRESSION_ERROR" => Some(FaultCode::CompressionError),
            "NAME_RESOLUTION" => Some(FaultCode::NameResolution),
            "INVALID_PARAMETERS" => Some(FaultCode::InvalidParameters),
            "UNKNOWN_TICKET" => Some(FaultCode::UnknownTicket),
            "SERVICE_UNAVAILABLE" => Some(FaultCode::ServiceUnavailable),
            "INTERNAL" => Some(FaultCode::Internal),
            _ => None,
        }
    }

    /// Transient kind for codes that are worth an unmodified retry
    pub fn transient_kind(&self) -> Option<TransientKind> {
        match self {
            FaultCode::CompressionError => Some(TransientKind::Compression),
            FaultCode::NameResolution => Some(TransientKind::NameResolution),
            _ => None,
        }
    }
}

impl std::fmt::Display for FaultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two fault families that an unmodified retry is expected to clear
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientKind {
    /// Compression/transport corruption
    Compression,
    /// DNS/name resolution failure
    NameResolution,
    /// Matched an operator-configured pattern
    Configured,
}

impl TransientKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransientKind::Compression => "compression",
            TransientKind::NameResolution => "name-resolution",
            TransientKind::Configured => "configured",
        }
    }
}

/// A fault reported by the service or synthesised from a transport failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct Fault {
    /// Structured code, when one was supplied and recognised
    pub code: Option<FaultCode>,
    /// Human-readable message
    pub message: String,
}

impl Fault {
    /// Fault with a message only
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    /// Fault with a structured code
    pub fn with_code(code: FaultCode, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }

    /// Build from wire fields, dropping unrecognised codes
    pub fn from_wire(code: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            code: code.and_then(FaultCode::parse),
            message: message.into(),
        }
    }

    /// Built-in transient classification.
    ///
    /// A structured code is authoritative. Without one, the message is
    /// searched for the two known signatures.
    pub fn transient_kind(&self) -> Option<TransientKind> {
        if let Some(code) = self.code {
            return code.transient_kind();
        }
        if self.message.contains(COMPRESSION_SIGNATURE) {
            Some(TransientKind::Compression)
        } else if self.message.contains(NAME_RESOLUTION_SIGNATURE) {
            Some(TransientKind::NameResolution)
        } else {
            None
        }
    }
}
