//! In-memory collaborators for tests.

use std::cell::{Cell, RefCell};

use chrono::{DateTime, Duration, Utc};

use crate::allocation::Allocation;
use crate::error::{FetchError, SinkError};
use crate::providers::{RosterProvider, SubmissionSink, WindowProvider};
use crate::roster::PeerRef;
use crate::window::EvaluationWindow;

/// Backend double implementing all three collaborator traits.
///
/// Counts every call so tests can assert which collaborators were touched.
pub struct FakeBackend {
    pub peers: Result<Vec<PeerRef>, FetchError>,
    pub window: Result<EvaluationWindow, FetchError>,
    pub sink_failure: RefCell<Option<SinkError>>,
    pub roster_calls: Cell<usize>,
    pub window_calls: Cell<usize>,
    pub submissions: RefCell<Vec<(String, Allocation)>>,
}

impl FakeBackend {
    /// Open window closing an hour after `now`, with the given peers.
    pub fn open(now: DateTime<Utc>, peers: Vec<PeerRef>) -> Self {
        Self::with_window(EvaluationWindow::new(now + Duration::hours(1), true, false), peers)
    }

    pub fn with_window(window: EvaluationWindow, peers: Vec<PeerRef>) -> Self {
        Self {
            peers: Ok(peers),
            window: Ok(window),
            sink_failure: RefCell::new(None),
            roster_calls: Cell::new(0),
            window_calls: Cell::new(0),
            submissions: RefCell::new(Vec::new()),
        }
    }

    /// Make the next submissions fail with `error` until cleared.
    pub fn fail_submissions(&self, error: Option<SinkError>) {
        *self.sink_failure.borrow_mut() = error;
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.borrow().len()
    }
}

impl RosterProvider for FakeBackend {
    async fn fetch_peers(&self, _current_user_id: &str) -> Result<Vec<PeerRef>, FetchError> {
        self.roster_calls.set(self.roster_calls.get() + 1);
        self.peers.clone()
    }
}

impl WindowProvider for FakeBackend {
    async fn fetch_window(&self) -> Result<EvaluationWindow, FetchError> {
        self.window_calls.set(self.window_calls.get() + 1);
        self.window.clone()
    }
}

impl SubmissionSink for FakeBackend {
    async fn submit_allocation(
        &self,
        current_user_id: &str,
        allocation: &Allocation,
    ) -> Result<(), SinkError> {
        if let Some(err) = self.sink_failure.borrow().clone() {
            return Err(err);
        }
        self.submissions
            .borrow_mut()
            .push((current_user_id.to_string(), allocation.clone()));
        Ok(())
    }
}

pub fn alice_and_bob() -> Vec<PeerRef> {
    vec![PeerRef::new("1", "Alice"), PeerRef::new("2", "Bob")]
}
