//! Evaluation window and the gate deciding whether the form may render.
//!
//! The settings record carries a single timestamp. peereval reads it as the
//! CLOSING time of the window: the form is available while the window is
//! flagged open, not locked, and the current time is strictly before
//! `closes_at`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Settings record supplied by the window provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationWindow {
    /// Submissions are refused from this instant on
    #[serde(alias = "date")]
    pub closes_at: DateTime<Utc>,
    #[serde(alias = "isopen")]
    pub is_open: bool,
    #[serde(alias = "islocked", default)]
    pub is_locked: bool,
}

/// Why the gate refused to render the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosedReason {
    /// Professor has not opened the evaluation
    NotOpen,
    /// Evaluation is locked
    Locked,
    /// Closing time has passed
    Expired,
}

impl ClosedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotOpen => "evaluation is not open",
            Self::Locked => "evaluation is locked",
            Self::Expired => "evaluation window has closed",
        }
    }
}

/// Outcome of evaluating the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Open,
    Closed(ClosedReason),
}

impl GateDecision {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

impl EvaluationWindow {
    pub fn new(closes_at: DateTime<Utc>, is_open: bool, is_locked: bool) -> Self {
        Self {
            closes_at,
            is_open,
            is_locked,
        }
    }

    /// Decide whether the form may be shown at `now`.
    ///
    /// Locking takes precedence over the open flag, which takes precedence
    /// over the clock.
    pub fn gate(&self, now: DateTime<Utc>) -> GateDecision {
        if self.is_locked {
            GateDecision::Closed(ClosedReason::Locked)
        } else if !self.is_open {
            GateDecision::Closed(ClosedReason::NotOpen)
        } else if now >= self.closes_at {
            GateDecision::Closed(ClosedReason::Expired)
        } else {
            GateDecision::Open
        }
    }

    /// Same predicate as [`gate`](Self::gate), used again right before a
    /// submission leaves the form.
    pub fn accepts_submissions(&self, now: DateTime<Utc>) -> bool {
        self.gate(now).is_open()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn open_before_closing_time() {
        let now = Utc::now();
        let window = EvaluationWindow::new(now + Duration::minutes(5), true, false);
        assert_eq!(window.gate(now), GateDecision::Open);
        assert!(window.accepts_submissions(now));
    }

    #[test]
    fn closed_at_and_after_closing_time() {
        let now = Utc::now();
        let window = EvaluationWindow::new(now, true, false);
        assert_eq!(window.gate(now), GateDecision::Closed(ClosedReason::Expired));
        assert_eq!(
            window.gate(now + Duration::seconds(1)),
            GateDecision::Closed(ClosedReason::Expired)
        );
    }

    #[test]
    fn flags_override_the_clock() {
        let now = Utc::now();
        let later = now + Duration::hours(1);
        assert_eq!(
            EvaluationWindow::new(later, false, false).gate(now),
            GateDecision::Closed(ClosedReason::NotOpen)
        );
        assert_eq!(
            EvaluationWindow::new(later, true, true).gate(now),
            GateDecision::Closed(ClosedReason::Locked)
        );
    }

    #[test]
    fn deserializes_settings_column_names() {
        let window: EvaluationWindow = serde_json::from_str(
            r#"{"date":"2030-01-01T12:00:00Z","isopen":true,"islocked":false}"#,
        )
        .unwrap();
        assert!(window.is_open);
        assert!(!window.is_locked);
        assert_eq!(window.closes_at.to_rfc3339(), "2030-01-01T12:00:00+00:00");
    }
}
