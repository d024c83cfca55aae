//! Job progress code space.
//!
//! `0..=100` is percent complete, `-1` is pending, `-2` aborted,
//! `-3` cancelled, `-4` unknown ticket. Anything else is rejected.

use serde::{Deserialize, Serialize};

/// Raw code for a pending (queued) job; also the pre-poll sentinel.
pub const PENDING: i64 = -1;
/// Raw code for an aborted job.
pub const ABORTED: i64 = -2;
/// Raw code for a cancelled job.
pub const CANCELLED: i64 = -3;
/// Raw code for a ticket the service does not know.
pub const UNKNOWN_TICKET: i64 = -4;
/// Raw code for a finished job.
pub const COMPLETE: i64 = 100;

/// Decoded progress value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Progress {
    /// Queued, not started
    Pending,
    /// Running, percent complete in `0..=99`
    Running(u8),
    /// Finished successfully
    Complete,
    /// Aborted by the service
    Aborted,
    /// Cancelled
    Cancelled,
    /// Service lost the job record
    UnknownTicket,
}

/// Progress decode errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProgressError {
    #[error("progress code {0} outside the known code space")]
    OutOfRange(i64),
}

impl Progress {
    /// Decode a raw progress code
    pub fn from_code(code: i64) -> Result<Self, ProgressError> {
        match code {
            COMPLETE => Ok(Progress::Complete),
            0..=99 => Ok(Progress::Running(code as u8)),
            PENDING => Ok(Progress::Pending),
            ABORTED => Ok(Progress::Aborted),
            CANCELLED => Ok(Progress::Cancelled),
            UNKNOWN_TICKET => Ok(Progress::UnknownTicket),
            other => Err(ProgressError::OutOfRange(other)),
        }
    }

    /// Raw wire code
    pub fn code(&self) -> i64 {
        match self {
            Progress::Pending => PENDING,
            Progress::Running(pct) => i64::from(*pct),
            Progress::Complete => COMPLETE,
            Progress::Aborted => ABORTED,
            Progress::Cancelled => CANCELLED,
            Progress::UnknownTicket => UNKNOWN_TICKET,
        }
    }

    /// Returns true once no further polling is meaningful
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Progress::Complete | Progress::Aborted | Progress::Cancelled | Progress::UnknownTicket
        )
    }

}

impl TryFrom<i64> for Progress {
    type Error = ProgressError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        Progress::from_code(code)
    }
}

impl From<Progress> for i64 {
    fn from(progress: Progress) -> Self {
        progress.code()
    }
}

impl std::fmt::Display for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Progress::Pending => f.write_str("pending"),
            Progress::Running(pct) => write!(f, "{}%", pct),
            Progress::Complete => f.write_str("100%"),
            Progress::Aborted => f.write_str("aborted"),
            Progress::Cancelled => f.write_str("cancelled"),
            Progress::UnknownTicket => f.write_str("unknown ticket"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_code_space() {
        assert_eq!(Progress::from_code(-1), Ok(Progress::Pending));
        assert_eq!(Progress::from_code(0), Ok(Progress::Running(0)));
        assert_eq!(Progress::from_code(40), Ok(Progress::Running(40)));
        assert_eq!(Progress::from_code(100), Ok(Progress::Complete));
        assert_eq!(Progress::from_code(-2), Ok(Progress::Aborted));
        assert_eq!(Progress::from_code(-3), Ok(Progress::Cancelled));
        assert_eq!(Progress::from_code(-4), Ok(Progress::UnknownTicket));
    }

    #[test]
    fn test_reject_out_of_range() {
        assert_eq!(Progress::from_code(101), Err(ProgressError::OutOfRange(101)));
        assert_eq!(Progress::from_code(-5), Err(ProgressError::OutOfRange(-5)));
    }

    #[test]
    fn test_terminal_states() {
        assert!(!Progress::Pending.is_terminal());
        assert!(!Progress::Running(99).is_terminal());
        assert!(Progress::Complete.is_terminal());
        assert!(Progress::Aborted.is_terminal());
        assert!(Progress::Cancelled.is_terminal());
        assert!(Progress::UnknownTicket.is_terminal());
    }

    #[test]
    fn test_serde_uses_raw_code() {
        assert_eq!(serde_json::to_string(&Progress::Running(40)).unwrap(), "40");
        let p: Progress = serde_json::from_str("-3").unwrap();
        assert_eq!(p, Progress::Cancelled);
        assert!(serde_json::from_str::<Progress>("250").is_err());
    }
}
