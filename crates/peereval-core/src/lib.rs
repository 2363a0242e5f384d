//! # Peereval Core Library
//!
//! This library provides the core logic for peer evaluation: each student
//! splits exactly 100 points among classmates while an evaluation window is
//! open, and the professor reviews the results or forms groups from them.
//! Every operation is available through the standalone CLI binary.
//!
//! ## Architecture
//!
//! - **Allocation Engine**: Row-based point allocation with the growth rule
//!   and the submit gate
//! - **Form**: Window-first mounting, stale-load protection, submission
//! - **Storage**: SQLite-backed local backend and TOML-based configuration
//! - **Integrations**: PostgREST-style HTTP backend
//! - **Results / Grouping**: Professor-side aggregation and group formation
//!
//! ## Key Components
//!
//! - [`AllocationEngine`]: Allocation rows, totals, validation and submission
//! - [`FormHost`]: Mounts the form for one user
//! - [`Database`]: Local roster, window and preference storage
//! - [`RestBackend`]: Remote roster, window and preference storage
//! - [`Config`]: Application configuration management

pub mod allocation;
pub mod error;
pub mod form;
pub mod grouping;
pub mod integrations;
pub mod providers;
pub mod records;
pub mod results;
pub mod roster;
pub mod storage;
pub mod window;

#[cfg(test)]
mod test_support;

pub use allocation::{Allocation, AllocationEngine, AllocationPhase, AllocationRow, Blocker};
pub use error::{
    ConfigError, CoreError, DatabaseError, FetchError, GroupingError, SinkError, SubmitError,
    ValidationError,
};
pub use form::{load_form, FormHost, FormOutcome, FormSession, MountState};
pub use grouping::{form_groups, GroupingOptions, GroupingOutcome};
pub use integrations::RestBackend;
pub use providers::{RosterProvider, SubmissionSink, WindowProvider};
pub use records::{Preference, StudentRecord};
pub use roster::{PeerRef, Roster};
pub use storage::{Config, Database};
pub use window::{ClosedReason, EvaluationWindow, GateDecision};
