//! Exit codes, failure taxonomy and check result accumulation

mod check_results;
mod failure;

pub use check_results::{CheckResults, StepRecord};
pub use failure::{ExitCode, ExitCodeAggregator, FailureKind};
