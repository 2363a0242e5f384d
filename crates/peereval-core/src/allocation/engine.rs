//! Point allocation engine.
//!
//! Owns the ordered list of rows a student fills in while distributing
//! [`TOTAL_POINTS`] among peers. Totals and completeness are derived from the
//! rows on every read; nothing derived is cached.
//!
//! ## Phases
//!
//! ```text
//! Empty ⇄ Partial ⇄ Complete ──submit──▶ Submitted
//! ```
//!
//! Field edits move between the first three phases in either direction.
//! Only a successful [`AllocationEngine::submit`] reaches `Submitted`, after
//! which every edit is refused.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use super::points::{is_below_budget, is_full_budget, validate_points, TOTAL_POINTS};
use crate::error::{SubmitError, ValidationError};
use crate::providers::SubmissionSink;
use crate::roster::Roster;

/// Final mapping from peer id to awarded points.
pub type Allocation = BTreeMap<String, f64>;

/// One entry slot of the form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllocationRow {
    pub peer_id: Option<String>,
    pub points: Option<f64>,
}

impl AllocationRow {
    pub fn is_blank(&self) -> bool {
        self.peer_id.is_none() && self.points.is_none()
    }

    /// A peer is chosen and a positive amount is entered.
    pub fn is_filled(&self) -> bool {
        self.peer_id.is_some() && self.points.is_some_and(|p| p > 0.0)
    }
}

/// Where the form stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationPhase {
    /// Every row is blank
    Empty,
    /// Something is entered but the allocation is not valid yet
    Partial,
    /// Total is exactly the budget and every selected row has points
    Complete,
    /// Handed to the submission sink (terminal)
    Submitted,
}

/// Reason the current rows cannot be submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Blocker {
    TotalMismatch { total: f64 },
    MissingPoints { row: usize },
    DuplicatePeer { peer_id: String },
    PointsWithoutPeer { row: usize },
    WindowClosed,
    AlreadySubmitted,
}

impl std::fmt::Display for Blocker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TotalMismatch { total } => {
                write!(f, "total is {total}, expected {TOTAL_POINTS}")
            }
            Self::MissingPoints { row } => write!(f, "row {row} has a peer but no points"),
            Self::DuplicatePeer { peer_id } => {
                write!(f, "peer '{peer_id}' is selected more than once")
            }
            Self::PointsWithoutPeer { row } => write!(f, "row {row} has points but no peer"),
            Self::WindowClosed => f.write_str("evaluation window is closed"),
            Self::AlreadySubmitted => f.write_str("allocation was already submitted"),
        }
    }
}

/// Rows, roster and submission gate for a single mounted form.
#[derive(Debug, Clone)]
pub struct AllocationEngine {
    roster: Roster,
    rows: Vec<AllocationRow>,
    submissions_open: bool,
    submitted: bool,
}

impl AllocationEngine {
    /// Engine with one blank row. `submissions_open` is the window status
    /// at mount time.
    pub fn new(roster: Roster, submissions_open: bool) -> Self {
        Self {
            roster,
            rows: vec![AllocationRow::default()],
            submissions_open,
            submitted: false,
        }
    }

    /// Reset to exactly one blank row for a new roster.
    ///
    /// # Errors
    /// `AlreadySubmitted` once the form is terminal; the engine is left as is.
    pub fn initialize(&mut self, roster: Roster) -> Result<(), ValidationError> {
        self.ensure_editable()?;
        self.roster = roster;
        self.rows = vec![AllocationRow::default()];
        tracing::debug!(peers = self.roster.len(), "allocation engine initialized");
        Ok(())
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn rows(&self) -> &[AllocationRow] {
        &self.rows
    }

    /// Window status as last reported by the caller.
    pub fn submissions_open(&self) -> bool {
        self.submissions_open
    }

    pub fn set_submissions_open(&mut self, open: bool) {
        self.submissions_open = open;
    }

    /// Choose (or clear) the peer of a row.
    ///
    /// # Errors
    /// `OutOfBounds` for a missing row, `UnknownPeer` for an id outside the
    /// roster, `AlreadySubmitted` once the form is terminal.
    pub fn set_row_peer(
        &mut self,
        index: usize,
        peer_id: Option<&str>,
    ) -> Result<(), ValidationError> {
        self.ensure_editable()?;
        self.ensure_row(index)?;
        if let Some(id) = peer_id {
            if !self.roster.contains(id) {
                return Err(ValidationError::UnknownPeer(id.to_string()));
            }
        }
        self.rows[index].peer_id = peer_id.map(str::to_string);
        self.after_edit(index);
        Ok(())
    }

    /// Enter (or clear) the points of a row.
    ///
    /// # Errors
    /// `InvalidPoints` for negative or non-finite values, otherwise as
    /// [`set_row_peer`](Self::set_row_peer).
    pub fn set_row_points(
        &mut self,
        index: usize,
        points: Option<f64>,
    ) -> Result<(), ValidationError> {
        self.ensure_editable()?;
        self.ensure_row(index)?;
        let points = points.map(validate_points).transpose()?;
        self.rows[index].points = points;
        self.after_edit(index);
        Ok(())
    }

    /// Append a blank row when the last row is filled and budget remains.
    ///
    /// Returns whether a row was appended. Calling it again without an
    /// intervening edit never appends twice: the new last row is blank.
    pub fn apply_growth_rule(&mut self) -> bool {
        let last_filled = self.rows.last().is_some_and(AllocationRow::is_filled);
        if last_filled && is_below_budget(self.total()) {
            self.rows.push(AllocationRow::default());
            tracing::debug!(rows = self.rows.len(), "appended allocation row");
            true
        } else {
            false
        }
    }

    /// Sum of every entered amount, selected peer or not.
    pub fn total(&self) -> f64 {
        self.rows.iter().filter_map(|r| r.points).sum()
    }

    /// Budget still unassigned. Negative when over-allocated.
    pub fn remaining(&self) -> f64 {
        TOTAL_POINTS - self.total()
    }

    /// Peer ids chosen in more than one row, in first-seen order.
    pub fn duplicate_peers(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        for id in self.rows.iter().filter_map(|r| r.peer_id.as_deref()) {
            if !seen.insert(id) && !duplicates.iter().any(|d: &String| d == id) {
                duplicates.push(id.to_string());
            }
        }
        duplicates
    }

    /// Peers not selected in any row.
    pub fn available_peers(&self) -> Vec<&str> {
        self.roster
            .peers()
            .iter()
            .map(|p| p.id.as_str())
            .filter(|id| !self.rows.iter().any(|r| r.peer_id.as_deref() == Some(*id)))
            .collect()
    }

    /// Everything preventing the rows themselves from forming a valid
    /// allocation, ignoring the window and submission state.
    pub fn row_blockers(&self) -> Vec<Blocker> {
        let mut blockers = Vec::new();
        let total = self.total();
        if !is_full_budget(total) {
            blockers.push(Blocker::TotalMismatch { total });
        }
        for (row, r) in self.rows.iter().enumerate() {
            match (&r.peer_id, r.points) {
                (Some(_), None) => blockers.push(Blocker::MissingPoints { row }),
                (None, Some(p)) if p > 0.0 => blockers.push(Blocker::PointsWithoutPeer { row }),
                _ => {}
            }
        }
        blockers.extend(
            self.duplicate_peers()
                .into_iter()
                .map(|peer_id| Blocker::DuplicatePeer { peer_id }),
        );
        blockers
    }

    /// Every reason [`can_submit`](Self::can_submit) is false.
    pub fn blockers(&self) -> Vec<Blocker> {
        let mut blockers = Vec::new();
        if self.submitted {
            blockers.push(Blocker::AlreadySubmitted);
        }
        if !self.submissions_open {
            blockers.push(Blocker::WindowClosed);
        }
        blockers.extend(self.row_blockers());
        blockers
    }

    /// Total is the full budget, every selected row carries points and no
    /// peer is picked twice.
    pub fn is_complete(&self) -> bool {
        self.row_blockers().is_empty()
    }

    pub fn can_submit(&self) -> bool {
        !self.submitted && self.submissions_open && self.is_complete()
    }

    pub fn phase(&self) -> AllocationPhase {
        if self.submitted {
            AllocationPhase::Submitted
        } else if self.rows.iter().all(AllocationRow::is_blank) {
            AllocationPhase::Empty
        } else if self.is_complete() {
            AllocationPhase::Complete
        } else {
            AllocationPhase::Partial
        }
    }

    /// Mapping built from rows that have a peer. Rows without a peer are
    /// left out.
    pub fn draft_allocation(&self) -> Allocation {
        self.rows
            .iter()
            .filter_map(|r| {
                r.peer_id
                    .as_ref()
                    .map(|id| (id.clone(), r.points.unwrap_or(0.0)))
            })
            .collect()
    }

    /// Hand the allocation to `sink`.
    ///
    /// The sink is only called when [`can_submit`](Self::can_submit) holds.
    /// A sink failure leaves every row untouched so the caller can retry.
    ///
    /// # Errors
    /// `SubmitError::Validation` when the form is not submittable,
    /// `SubmitError::Sink` when the sink rejects the payload.
    pub async fn submit<S: SubmissionSink>(
        &mut self,
        user_id: &str,
        sink: &S,
    ) -> Result<Allocation, SubmitError> {
        if self.submitted {
            return Err(ValidationError::AlreadySubmitted.into());
        }
        let blockers = self.blockers();
        if !blockers.is_empty() {
            let reasons: Vec<String> = blockers.iter().map(ToString::to_string).collect();
            tracing::warn!(user = user_id, reasons = ?reasons, "refused submission of invalid allocation");
            return Err(ValidationError::NotSubmittable(reasons.join("; ")).into());
        }

        let allocation = self.draft_allocation();
        if let Err(e) = sink.submit_allocation(user_id, &allocation).await {
            tracing::warn!(user = user_id, error = %e, "submission sink rejected allocation");
            return Err(e.into());
        }

        self.submitted = true;
        tracing::info!(user = user_id, peers = allocation.len(), "allocation submitted");
        Ok(allocation)
    }

    fn ensure_editable(&self) -> Result<(), ValidationError> {
        if self.submitted {
            Err(ValidationError::AlreadySubmitted)
        } else {
            Ok(())
        }
    }

    fn ensure_row(&self, index: usize) -> Result<(), ValidationError> {
        if index < self.rows.len() {
            Ok(())
        } else {
            Err(ValidationError::OutOfBounds {
                collection: "allocation rows".into(),
                index,
                len: self.rows.len(),
            })
        }
    }

    // Growth is scoped to edits of the last row; editing an earlier row
    // never appends.
    fn after_edit(&mut self, index: usize) {
        if index + 1 == self.rows.len() {
            self.apply_growth_rule();
        }
    }
}
