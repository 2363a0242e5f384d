//! Group formation from submitted allocations.
//!
//! Splits the present students into groups of `size` (the first
//! `present % size` groups take one extra member) so that as many awarded
//! points as possible land between students sharing a group.
//!
//! The search starts from a snake draft ordered by grade average, adds a
//! few seeded random starts, and improves each start by swapping pairs of
//! students across groups until no swap helps. The best assignment wins.

use std::collections::HashMap;

use rand::prelude::*;
use rand_pcg::Mcg128Xsl64;
use serde::{Deserialize, Serialize};

use crate::error::GroupingError;
use crate::records::{latest_preferences, Preference, StudentRecord};

const MAX_PASSES: usize = 200;
const EPSILON: f64 = 1e-9;

/// Academic level derived from the grade average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Low,    // below 10
    Medium, // 10 to below 14
    High,   // 14 and above
}

impl Level {
    pub fn from_mean(mean: f64) -> Self {
        if mean < 10.0 {
            Self::Low
        } else if mean < 14.0 {
            Self::Medium
        } else {
            Self::High
        }
    }
}

/// Search parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupingOptions {
    /// Random starts tried besides the snake draft
    pub restarts: usize,
    pub seed: u64,
}

impl Default for GroupingOptions {
    fn default() -> Self {
        Self {
            restarts: 8,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMember {
    pub id: String,
    pub full_name: String,
    pub mean: f64,
    pub alt: bool,
    pub level: Level,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub group_number: usize,
    pub members: Vec<GroupMember>,
    pub average_mean: f64,
    pub alternant_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupingOutcome {
    pub groups: Vec<Group>,
    /// Share of awarded points kept inside groups, in percent (one decimal)
    pub satisfaction_score: f64,
    pub total_students: usize,
    pub num_groups: usize,
    pub matched_points: f64,
    pub possible_points: f64,
}

/// Sizes of each group for `present` students and a target `size`.
///
/// # Errors
/// See [`GroupingError`].
pub fn group_sizes(present: usize, size: usize) -> Result<Vec<usize>, GroupingError> {
    if size == 0 {
        return Err(GroupingError::InvalidGroupSize);
    }
    if present < size {
        return Err(GroupingError::NotEnoughStudents { present, size });
    }
    let num_groups = present / size;
    let remainder = present % size;
    if remainder > num_groups {
        return Err(GroupingError::Infeasible { present, size });
    }
    Ok((0..num_groups)
        .map(|g| if g < remainder { size + 1 } else { size })
        .collect())
}

/// Form groups from the present students in `students`.
///
/// Preference lines naming an absent or unknown student, or the student
/// themselves, are ignored. A pair listed twice keeps its last line.
pub fn form_groups(
    students: &[StudentRecord],
    preferences: &[Preference],
    size: usize,
    options: GroupingOptions,
) -> Result<GroupingOutcome, GroupingError> {
    let present: Vec<&StudentRecord> = students.iter().filter(|s| s.present).collect();
    let sizes = group_sizes(present.len(), size)?;
    let index: HashMap<&str, usize> = present
        .iter()
        .enumerate()
        .map(|(i, s)| (s.id.as_str(), i))
        .collect();

    let n = present.len();
    let mut affinity = vec![vec![0.0_f64; n]; n];
    let mut possible = 0.0;
    for pref in latest_preferences(preferences) {
        let (Some(&from), Some(&to)) = (
            index.get(pref.student_id.as_str()),
            index.get(pref.preferred_id.as_str()),
        ) else {
            continue;
        };
        if from == to || pref.points <= 0.0 {
            continue;
        }
        affinity[from][to] += pref.points;
        affinity[to][from] += pref.points;
        possible += pref.points;
    }

    let slots = slot_sequence(&sizes);
    let mut best = {
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            present[b]
                .mean
                .total_cmp(&present[a].mean)
                .then_with(|| present[a].id.cmp(&present[b].id))
        });
        let mut assignment = assign(&order, &slots, n);
        let score = improve(&mut assignment, &affinity);
        (assignment, score)
    };

    let mut rng = Mcg128Xsl64::seed_from_u64(options.seed);
    for _ in 0..options.restarts {
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut rng);
        let mut assignment = assign(&order, &slots, n);
        let score = improve(&mut assignment, &affinity);
        if score > best.1 + EPSILON {
            best = (assignment, score);
        }
    }

    let (assignment, matched) = best;
    let groups = build_groups(&present, &assignment, sizes.len());
    let satisfaction_score = if possible > 0.0 {
        (matched / possible * 1000.0).round() / 10.0
    } else {
        0.0
    };

    tracing::info!(
        students = n,
        groups = groups.len(),
        satisfaction = satisfaction_score,
        "formed groups"
    );

    Ok(GroupingOutcome {
        num_groups: groups.len(),
        groups,
        satisfaction_score,
        total_students: n,
        matched_points: matched,
        possible_points: possible,
    })
}

/// Group index for each seat, dealt in snake order so every group
/// receives one student per round.
fn slot_sequence(sizes: &[usize]) -> Vec<usize> {
    let rounds = sizes.iter().copied().max().unwrap_or(0);
    let mut slots = Vec::with_capacity(sizes.iter().sum());
    for round in 0..rounds {
        let groups: Box<dyn Iterator<Item = usize>> = if round % 2 == 0 {
            Box::new(0..sizes.len())
        } else {
            Box::new((0..sizes.len()).rev())
        };
        slots.extend(groups.filter(|&g| sizes[g] > round));
    }
    slots
}

fn assign(order: &[usize], slots: &[usize], n: usize) -> Vec<usize> {
    let mut assignment = vec![0; n];
    for (&student, &group) in order.iter().zip(slots) {
        assignment[student] = group;
    }
    assignment
}

/// Affinity `student` has with the members of `group`, not counting
/// `skip` (the swap partner or the student themselves).
fn affinity_with(
    student: usize,
    group: usize,
    skip: usize,
    assignment: &[usize],
    affinity: &[Vec<f64>],
) -> f64 {
    assignment
        .iter()
        .enumerate()
        .filter(|&(k, &g)| g == group && k != student && k != skip)
        .map(|(k, _)| affinity[student][k])
        .sum()
}

fn score(assignment: &[usize], affinity: &[Vec<f64>]) -> f64 {
    let mut total = 0.0;
    for i in 0..assignment.len() {
        for j in (i + 1)..assignment.len() {
            if assignment[i] == assignment[j] {
                total += affinity[i][j];
            }
        }
    }
    total
}

/// Swap students across groups while any swap raises the score. Returns
/// the final score.
fn improve(assignment: &mut [usize], affinity: &[Vec<f64>]) -> f64 {
    let n = assignment.len();
    for _ in 0..MAX_PASSES {
        let mut improved = false;
        for i in 0..n {
            for j in (i + 1)..n {
                let (gi, gj) = (assignment[i], assignment[j]);
                if gi == gj {
                    continue;
                }
                let delta = affinity_with(i, gj, j, assignment, affinity)
                    - affinity_with(i, gi, i, assignment, affinity)
                    + affinity_with(j, gi, i, assignment, affinity)
                    - affinity_with(j, gj, j, assignment, affinity);
                if delta > EPSILON {
                    assignment.swap(i, j);
                    improved = true;
                }
            }
        }
        if !improved {
            break;
        }
    }
    score(assignment, affinity)
}

fn build_groups(present: &[&StudentRecord], assignment: &[usize], num_groups: usize) -> Vec<Group> {
    (0..num_groups)
        .map(|g| {
            let members: Vec<GroupMember> = present
                .iter()
                .zip(assignment)
                .filter(|(_, group)| **group == g)
                .map(|(s, _)| GroupMember {
                    id: s.id.clone(),
                    full_name: s.full_name.clone(),
                    mean: s.mean,
                    alt: s.alt,
                    level: Level::from_mean(s.mean),
                })
                .collect();
            let average_mean = if members.is_empty() {
                0.0
            } else {
                members.iter().map(|m| m.mean).sum::<f64>() / members.len() as f64
            };
            Group {
                group_number: g + 1,
                alternant_count: members.iter().filter(|m| m.alt).count(),
                average_mean,
                members,
            }
        })
        .collect()
}
