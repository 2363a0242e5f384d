//! Stored student and preference records shared by results and grouping.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::allocation::Allocation;
use crate::roster::PeerRef;

/// A student as kept by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub id: String,
    pub full_name: String,
    /// Grade average, used to balance groups
    #[serde(default)]
    pub mean: f64,
    /// Work-study student
    #[serde(default)]
    pub alt: bool,
    #[serde(default = "default_present")]
    pub present: bool,
}

fn default_present() -> bool {
    true
}

impl StudentRecord {
    pub fn new(id: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            full_name: full_name.into(),
            mean: 0.0,
            alt: false,
            present: true,
        }
    }

    pub fn with_mean(mut self, mean: f64) -> Self {
        self.mean = mean;
        self
    }

    pub fn with_alt(mut self, alt: bool) -> Self {
        self.alt = alt;
        self
    }

    pub fn with_present(mut self, present: bool) -> Self {
        self.present = present;
        self
    }

    pub fn peer_ref(&self) -> PeerRef {
        PeerRef::new(self.id.clone(), self.full_name.clone())
    }
}

/// One line of a submitted allocation: `student_id` gave `points` to
/// `preferred_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preference {
    pub student_id: String,
    pub preferred_id: String,
    pub points: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
}

impl Preference {
    pub fn new(student_id: impl Into<String>, preferred_id: impl Into<String>, points: f64) -> Self {
        Self {
            student_id: student_id.into(),
            preferred_id: preferred_id.into(),
            points,
            submitted_at: None,
        }
    }
}

/// Flatten an allocation into preference lines for `student_id`.
pub fn preferences_from_allocation(student_id: &str, allocation: &Allocation) -> Vec<Preference> {
    allocation
        .iter()
        .map(|(peer, points)| Preference::new(student_id, peer.clone(), *points))
        .collect()
}

/// One line per `(student_id, preferred_id)` pair, the last one winning.
///
/// Lines keep their relative order.
pub fn latest_preferences(preferences: &[Preference]) -> Vec<&Preference> {
    let last: HashMap<(&str, &str), usize> = preferences
        .iter()
        .enumerate()
        .map(|(i, p)| ((p.student_id.as_str(), p.preferred_id.as_str()), i))
        .collect();
    preferences
        .iter()
        .enumerate()
        .filter(|(i, p)| last.get(&(p.student_id.as_str(), p.preferred_id.as_str())) == Some(i))
        .map(|(_, p)| p)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_flattens_in_peer_order() {
        let mut allocation = Allocation::new();
        allocation.insert("2".into(), 70.0);
        allocation.insert("1".into(), 30.0);
        let prefs = preferences_from_allocation("me", &allocation);
        assert_eq!(
            prefs,
            vec![Preference::new("me", "1", 30.0), Preference::new("me", "2", 70.0)]
        );
    }

    #[test]
    fn student_defaults_to_present() {
        let s: StudentRecord = serde_json::from_str(r#"{"id":"1","full_name":"Alice"}"#).unwrap();
        assert!(s.present);
        assert!(!s.alt);
        assert_eq!(s.mean, 0.0);
    }

    #[test]
    fn latest_preferences_keeps_last_line_per_pair() {
        let prefs = vec![
            Preference::new("1", "2", 100.0),
            Preference::new("1", "3", 0.0),
            Preference::new("2", "1", 50.0),
            Preference::new("1", "2", 40.0),
        ];
        let latest = latest_preferences(&prefs);
        assert_eq!(
            latest,
            vec![
                &Preference::new("1", "3", 0.0),
                &Preference::new("2", "1", 50.0),
                &Preference::new("1", "2", 40.0),
            ]
        );
    }
}
