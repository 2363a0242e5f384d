//! Mounting the allocation form.
//!
//! Loading happens in a fixed order: the window is fetched and the gate
//! evaluated first, and the roster is only requested once the gate admits
//! the form. A [`FormHost`] tracks which mount is current so a load that
//! resolves after the host was torn down (or remounted) is discarded instead
//! of replacing live state.

use chrono::{DateTime, Utc};

use crate::allocation::{Allocation, AllocationEngine};
use crate::error::{FetchError, SubmitError, ValidationError};
use crate::providers::{RosterProvider, SubmissionSink, WindowProvider};
use crate::roster::Roster;
use crate::window::{ClosedReason, EvaluationWindow, GateDecision};

/// Result of loading the form for one user.
#[derive(Debug)]
pub enum FormOutcome {
    /// The gate refused; the roster was never requested.
    Hidden(ClosedReason),
    Ready(FormSession),
}

/// Fetch the window, evaluate the gate, then fetch the roster.
///
/// # Errors
/// Any collaborator failure is returned as-is. An empty roster is only
/// produced when the roster provider really returns no peers.
pub async fn load_form<W, R>(
    window_provider: &W,
    roster_provider: &R,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<FormOutcome, FetchError>
where
    W: WindowProvider,
    R: RosterProvider,
{
    let window = window_provider.fetch_window().await?;
    if let GateDecision::Closed(reason) = window.gate(now) {
        tracing::info!(user = user_id, reason = reason.as_str(), "allocation form hidden");
        return Ok(FormOutcome::Hidden(reason));
    }

    let peers = roster_provider.fetch_peers(user_id).await?;
    let roster = Roster::for_user(peers, user_id);
    tracing::info!(user = user_id, peers = roster.len(), "allocation form ready");
    Ok(FormOutcome::Ready(FormSession::new(user_id, window, roster)))
}

/// A mounted, editable form for one user.
#[derive(Debug)]
pub struct FormSession {
    user_id: String,
    window: EvaluationWindow,
    engine: AllocationEngine,
    notice: Option<String>,
}

impl FormSession {
    pub fn new(user_id: impl Into<String>, window: EvaluationWindow, roster: Roster) -> Self {
        // Only constructed after the gate admitted the form.
        let open = !window.is_locked && window.is_open;
        Self {
            user_id: user_id.into(),
            window,
            engine: AllocationEngine::new(roster, open),
            notice: None,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn window(&self) -> &EvaluationWindow {
        &self.window
    }

    pub fn engine(&self) -> &AllocationEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut AllocationEngine {
        &mut self.engine
    }

    /// Last user-facing message, set when a submission failed.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Whether the submit control should be enabled at `now`.
    pub fn can_submit(&mut self, now: DateTime<Utc>) -> bool {
        self.refresh_window(now);
        self.engine.can_submit()
    }

    /// Submit the allocation through `sink`.
    ///
    /// The window is re-checked against `now` first. On a sink failure the
    /// rows stay as they are and the error is recorded as the notice.
    pub async fn submit<S: SubmissionSink>(
        &mut self,
        sink: &S,
        now: DateTime<Utc>,
    ) -> Result<Allocation, SubmitError> {
        self.refresh_window(now);
        match self.engine.submit(&self.user_id, sink).await {
            Ok(allocation) => {
                self.notice = None;
                Ok(allocation)
            }
            Err(SubmitError::Sink(e)) => {
                self.notice = Some(e.to_string());
                Err(SubmitError::Sink(e))
            }
            Err(e) => Err(e),
        }
    }

    fn refresh_window(&mut self, now: DateTime<Utc>) {
        self.engine
            .set_submissions_open(self.window.accepts_submissions(now));
    }
}

/// Ticket identifying one mount attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MountTicket(u64);

/// What the host currently shows.
#[derive(Debug, Default)]
pub enum MountState {
    #[default]
    Idle,
    Loading,
    Hidden(ClosedReason),
    Failed(FetchError),
    Ready(FormSession),
}

/// Owner of the current form. Each mount gets a fresh generation; only the
/// current generation may replace the state.
#[derive(Debug, Default)]
pub struct FormHost {
    generation: u64,
    state: MountState,
}

impl FormHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &MountState {
        &self.state
    }

    pub fn session(&self) -> Option<&FormSession> {
        match &self.state {
            MountState::Ready(session) => Some(session),
            _ => None,
        }
    }

    pub fn session_mut(&mut self) -> Option<&mut FormSession> {
        match &mut self.state {
            MountState::Ready(session) => Some(session),
            _ => None,
        }
    }

    /// Start a mount. Any earlier ticket becomes stale.
    pub fn begin_mount(&mut self) -> MountTicket {
        self.generation += 1;
        self.state = MountState::Loading;
        MountTicket(self.generation)
    }

    /// Discard the current form. Pending loads resolve into nothing.
    pub fn teardown(&mut self) {
        self.generation += 1;
        self.state = MountState::Idle;
    }

    /// Apply a finished load. Returns `false`, leaving the state untouched,
    /// when `ticket` is no longer current.
    pub fn resolve(
        &mut self,
        ticket: MountTicket,
        outcome: Result<FormOutcome, FetchError>,
    ) -> bool {
        if ticket.0 != self.generation {
            tracing::debug!(
                ticket = ticket.0,
                current = self.generation,
                "discarding stale form load"
            );
            return false;
        }
        self.state = match outcome {
            Ok(FormOutcome::Hidden(reason)) => MountState::Hidden(reason),
            Ok(FormOutcome::Ready(session)) => MountState::Ready(session),
            Err(e) => {
                tracing::warn!(error = %e, "allocation form failed to load");
                MountState::Failed(e)
            }
        };
        true
    }

    /// Begin a mount, load the form and resolve it.
    pub async fn mount<W, R>(
        &mut self,
        window_provider: &W,
        roster_provider: &R,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> &MountState
    where
        W: WindowProvider,
        R: RosterProvider,
    {
        let ticket = self.begin_mount();
        let outcome = load_form(window_provider, roster_provider, user_id, now).await;
        self.resolve(ticket, outcome);
        &self.state
    }

    /// Submit the mounted form.
    ///
    /// # Errors
    /// `NotSubmittable` when no form is mounted.
    pub async fn submit<S: SubmissionSink>(
        &mut self,
        sink: &S,
        now: DateTime<Utc>,
    ) -> Result<Allocation, SubmitError> {
        match &mut self.state {
            MountState::Ready(session) => session.submit(sink, now).await,
            _ => Err(ValidationError::NotSubmittable("no form is mounted".into()).into()),
        }
    }
}
