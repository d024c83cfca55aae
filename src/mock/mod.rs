//! Mock Service Implementation
//!
//! In-process stand-in for the modeling web service, used by unit and
//! integration tests.
//!
//! # Behavior
//!
//! - `ping`: answers `1` (configurable)
//! - `getAlgorithms` / `getLayers`: canned catalogue
//! - submissions: hand out scripted or generated tickets
//! - `getProgress`: replays the ticket's progress script, `-4` for
//!   unknown tickets
//! - result operations: canned results carrying every required field
//! - failure injection per operation, including transport breakage

mod failure;
mod service;
mod state;

pub use failure::{FailureConfig, FailureInjector, FailureMode};
pub use service::MockService;
pub use state::{MockState, ScriptedJob};
