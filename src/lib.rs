//! OMWS client - job-ticket polling client for a remote modeling service
//!
//! Submits asynchronous modeling jobs, polls their tickets to a terminal
//! state with transient-fault retry, validates the results and reports a
//! monitoring-plugin style exit code.

pub mod check;
pub mod config;
pub mod host;
pub mod job;
pub mod mock;
pub mod summary;
pub mod timeout;
pub mod tracker;

pub use check::{CheckError, ServiceCheck};
pub use config::{ClientConfig, ConfigError, EffectiveConfig};
pub use host::{
    HttpTransport, InvokeError, MockTransport, OperationInvoker, RetryPolicy, ServiceClient,
    Transport,
};
pub use job::{JobError, JobKind, JobRequest, JobResult, JobRunner};
pub use summary::{CheckResults, ExitCode, FailureKind};
pub use timeout::{Clock, ManualClock, PollConfig, SystemClock};
pub use tracker::{JobState, ProgressTracker, TrackError, TrackReport};
