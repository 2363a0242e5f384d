//! Aggregated evaluation results for the professor view.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::records::{latest_preferences, Preference, StudentRecord};

/// Points one student received from classmates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentResult {
    pub id: String,
    pub name: String,
    pub received_points: f64,
    /// Classmates who gave this student more than zero points
    pub evaluator_count: usize,
    /// Received points averaged over every classmate who submitted
    pub average_points: f64,
    pub has_submitted: bool,
}

/// How many students have submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub submitted: usize,
    pub pending: usize,
    pub total: usize,
}

/// Aggregate received points per student.
///
/// Lines naming a student outside `students` are ignored, as are
/// self-awarded points. A pair submitted more than once counts with its
/// last line only. Sorted by received points (highest first), then by
/// name.
pub fn aggregate(students: &[StudentRecord], preferences: &[Preference]) -> Vec<StudentResult> {
    let known: HashSet<&str> = students.iter().map(|s| s.id.as_str()).collect();
    let submitters = submitters(&known, preferences);

    let mut received: HashMap<&str, (f64, usize)> = HashMap::new();
    for pref in latest_preferences(preferences) {
        let (from, to) = (pref.student_id.as_str(), pref.preferred_id.as_str());
        if from == to || !known.contains(from) || !known.contains(to) {
            continue;
        }
        let entry = received.entry(to).or_insert((0.0, 0));
        entry.0 += pref.points;
        if pref.points > 0.0 {
            entry.1 += 1;
        }
    }

    let mut results: Vec<StudentResult> = students
        .iter()
        .map(|s| {
            let (points, evaluators) = received.get(s.id.as_str()).copied().unwrap_or((0.0, 0));
            // Classmates who submitted, excluding the student themselves
            let possible = submitters.len() - usize::from(submitters.contains(s.id.as_str()));
            StudentResult {
                id: s.id.clone(),
                name: s.full_name.clone(),
                received_points: points,
                evaluator_count: evaluators,
                average_points: if possible == 0 { 0.0 } else { points / possible as f64 },
                has_submitted: submitters.contains(s.id.as_str()),
            }
        })
        .collect();

    results.sort_by(|a, b| {
        b.received_points
            .total_cmp(&a.received_points)
            .then_with(|| a.name.cmp(&b.name))
    });
    results
}

/// Submission progress over `students`.
pub fn progress(students: &[StudentRecord], preferences: &[Preference]) -> Progress {
    let known: HashSet<&str> = students.iter().map(|s| s.id.as_str()).collect();
    let submitted = submitters(&known, preferences).len();
    Progress {
        submitted,
        pending: students.len() - submitted,
        total: students.len(),
    }
}

fn submitters<'a>(known: &HashSet<&str>, preferences: &'a [Preference]) -> HashSet<&'a str> {
    preferences
        .iter()
        .map(|p| p.student_id.as_str())
        .filter(|id| known.contains(*id))
        .collect()
}
