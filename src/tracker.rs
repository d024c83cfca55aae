//! Progress Tracker
//!
//! Drives the poll loop for one ticket until a terminal state:
//!
//! `SUBMITTED → POLLING → {SUCCEEDED | ABORTED | CANCELLED | UNKNOWN |
//! TIMED_OUT | TRANSPORT_FAILED}`
//!
//! Progress starts at the pending sentinel. Each iteration checks for a
//! terminal code, then the wall-clock budget, then sleeps one interval and
//! queries progress through the invoker.

use std::time::Duration;

use omws_protocol::{Progress, Ticket};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::host::{InvokeError, InvokeResult, ServiceClient};
use crate::summary::{ExitCode, FailureKind};
use crate::timeout::{Clock, PollConfig, TimeoutEnforcer};

/// Source of progress values for a ticket
pub trait ProgressSource {
    fn progress(&self, ticket: &Ticket) -> InvokeResult<Progress>;
}

impl ProgressSource for ServiceClient {
    fn progress(&self, ticket: &Ticket) -> InvokeResult<Progress> {
        self.get_progress(ticket)
    }
}

/// Tracked job state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    /// Ticket received, no poll issued yet
    Submitted,
    /// At least one progress query issued
    Polling,
    Succeeded,
    Aborted,
    Cancelled,
    /// Service reported the ticket as unknown
    Unknown,
    TimedOut,
    /// A progress query failed past the invoker's retries
    TransportFailed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::Submitted | JobState::Polling)
    }

    /// Check if transition from this state to target is valid
    pub fn can_transition_to(&self, target: JobState) -> bool {
        match (self, target) {
            (JobState::Submitted, JobState::Polling) => true,
            // Timeout can fire before the first poll when the budget is spent
            (JobState::Submitted, JobState::TimedOut) => true,
            (JobState::Submitted, JobState::TransportFailed) => true,
            (JobState::Polling, JobState::Polling) => true,
            (JobState::Polling, target) => target.is_terminal(),
            _ => false,
        }
    }

    /// Terminal state a progress value leads to, if any
    pub fn from_progress(progress: Progress) -> Option<JobState> {
        match progress {
            Progress::Complete => Some(JobState::Succeeded),
            Progress::Aborted => Some(JobState::Aborted),
            Progress::Cancelled => Some(JobState::Cancelled),
            Progress::UnknownTicket => Some(JobState::Unknown),
            Progress::Pending | Progress::Running(_) => None,
        }
    }
}

/// Outcome of a successful poll loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackReport {
    pub ticket: Ticket,
    /// Progress queries issued
    pub polls: u32,
    pub elapsed: Duration,
}

/// Poll loop failures
#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    #[error("{label} aborted")]
    Aborted { label: String, polls: u32 },

    #[error("{label} cancelled")]
    Cancelled { label: String, polls: u32 },

    #[error("{label} job reported as unknown")]
    UnknownTicket { label: String, polls: u32 },

    #[error("{label} is taking too long to finish (server overload?)")]
    TimedOut {
        label: String,
        polls: u32,
        elapsed: Duration,
    },

    #[error("{label} progress query failed: {source}")]
    Transport {
        label: String,
        polls: u32,
        #[source]
        source: InvokeError,
    },
}

impl TrackError {
    pub fn state(&self) -> JobState {
        match self {
            TrackError::Aborted { .. } => JobState::Aborted,
            TrackError::Cancelled { .. } => JobState::Cancelled,
            TrackError::UnknownTicket { .. } => JobState::Unknown,
            TrackError::TimedOut { .. } => JobState::TimedOut,
            TrackError::Transport { .. } => JobState::TransportFailed,
        }
    }

    /// Progress queries issued before the loop stopped
    pub fn polls(&self) -> u32 {
        match self {
            TrackError::Aborted { polls, .. }
            | TrackError::Cancelled { polls, .. }
            | TrackError::UnknownTicket { polls, .. }
            | TrackError::TimedOut { polls, .. }
            | TrackError::Transport { polls, .. } => *polls,
        }
    }

    pub fn failure_kind(&self) -> FailureKind {
        match self {
            TrackError::Aborted { .. } => FailureKind::JobAborted,
            TrackError::Cancelled { .. } => FailureKind::JobCancelled,
            TrackError::UnknownTicket { .. } => FailureKind::UnknownTicket,
            TrackError::TimedOut { .. } => FailureKind::Timeout,
            TrackError::Transport { source, .. } => invoke_failure_kind(source),
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        self.failure_kind().exit_code()
    }

    /// One-line report; invoker detail follows the verbosity rule
    pub fn report(&self, verbose: bool) -> String {
        match self {
            TrackError::Transport { source, .. } => source.report(verbose),
            other => other.to_string(),
        }
    }
}

pub(crate) fn invoke_failure_kind(error: &InvokeError) -> FailureKind {
    match error {
        InvokeError::Fault { .. } => FailureKind::RemoteFault,
        InvokeError::Transport { .. } => FailureKind::Transport,
        InvokeError::Protocol { .. } => FailureKind::Protocol,
        InvokeError::RetriesExhausted { .. } => FailureKind::RetriesExhausted,
    }
}

/// Poll loop driver for one ticket at a time
pub struct ProgressTracker<'a> {
    source: &'a dyn ProgressSource,
    clock: &'a dyn Clock,
    config: PollConfig,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(source: &'a dyn ProgressSource, clock: &'a dyn Clock, config: PollConfig) -> Self {
        Self {
            source,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Poll `ticket` until a terminal state; `label` names the submitting
    /// operation in reports
    pub fn track(&self, ticket: &Ticket, label: &str) -> Result<TrackReport, TrackError> {
        let enforcer = TimeoutEnforcer::start(self.clock, self.config.timeout());
        let mut state = JobState::Submitted;
        let mut progress = Progress::Pending;
        let mut polls = 0u32;
        let label = label.to_string();

        loop {
            if let Some(terminal) = JobState::from_progress(progress) {
                debug_assert!(state.can_transition_to(terminal));
                return match terminal {
                    JobState::Succeeded => {
                        let elapsed = enforcer.elapsed();
                        info!(%ticket, %label, polls, ?elapsed, "job finished");
                        Ok(TrackReport {
                            ticket: ticket.clone(),
                            polls,
                            elapsed,
                        })
                    }
                    JobState::Aborted => Err(TrackError::Aborted { label, polls }),
                    JobState::Cancelled => Err(TrackError::Cancelled { label, polls }),
                    _ => Err(TrackError::UnknownTicket { label, polls }),
                };
            }

            if enforcer.check().is_timeout() {
                let elapsed = enforcer.elapsed();
                info!(%ticket, %label, polls, ?elapsed, "poll budget exceeded");
                return Err(TrackError::TimedOut {
                    label,
                    polls,
                    elapsed,
                });
            }

            self.clock.sleep(self.config.interval());

            polls += 1;
            progress = match self.source.progress(ticket) {
                Ok(progress) => progress,
                Err(source) => {
                    return Err(TrackError::Transport {
                        label,
                        polls,
                        source,
                    })
                }
            };
            state = JobState::Polling;
            debug!(%ticket, poll = polls, %progress, "progress");
        }
    }
}
