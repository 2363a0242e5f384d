//! Collaborators the allocation form depends on.
//!
//! Every backend (the local SQLite store, the REST backend, test fakes)
//! implements these traits and is passed in explicitly. Calls are one-shot:
//! no retry, no timeout.

use std::future::Future;

use crate::allocation::Allocation;
use crate::error::{FetchError, SinkError};
use crate::roster::PeerRef;
use crate::window::EvaluationWindow;

/// Supplies the peers the current user may award points to.
pub trait RosterProvider {
    /// Peers for `current_user_id`. Implementations should exclude the user,
    /// the form drops them again regardless.
    fn fetch_peers(
        &self,
        current_user_id: &str,
    ) -> impl Future<Output = Result<Vec<PeerRef>, FetchError>>;
}

/// Supplies the evaluation window settings record.
pub trait WindowProvider {
    fn fetch_window(&self) -> impl Future<Output = Result<EvaluationWindow, FetchError>>;
}

/// Persists a finalized allocation.
pub trait SubmissionSink {
    fn submit_allocation(
        &self,
        current_user_id: &str,
        allocation: &Allocation,
    ) -> impl Future<Output = Result<(), SinkError>>;
}
