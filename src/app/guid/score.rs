use crate::app::models::{GuidCandidate, ScoredGuid};

/// Proximity band that earns a bonus: matches this close to their marker are
/// empirically the real identifier.
const TIGHT_PROXIMITY: i64 = 100;

const OCCURRENCE_WEIGHT: i64 = 10;
const PROXIMITY_BONUS: i64 = 5;
const BEFORE_MARKER_BONUS: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn from_score(score: i64) -> Self {
        if score >= 30 {
            Confidence::High
        } else if score >= 15 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }

    /// Medium and low bands require explicit confirmation before acceptance.
    pub fn needs_confirmation(self) -> bool {
        !matches!(self, Confidence::High)
    }
}

/// Ranks candidates by recurrence and marker proximity. Returns `None` for an
/// empty input. The ranking is deterministic and independent of discovery
/// order: grouping preserves first-seen order and the descending sort is
/// stable, so ties keep that order.
pub fn score(candidates: &[GuidCandidate]) -> Option<Vec<ScoredGuid>> {
    if candidates.is_empty() {
        return None;
    }

    let mut groups: Vec<(String, Vec<i64>)> = Vec::new();
    for candidate in candidates {
        match groups.iter_mut().find(|(value, _)| *value == candidate.value) {
            Some((_, positions)) => positions.push(candidate.position),
            None => groups.push((candidate.value.clone(), vec![candidate.position])),
        }
    }

    let mut scored: Vec<ScoredGuid> = groups
        .into_iter()
        .map(|(value, positions)| {
            let occurrences = positions.len();
            let mut total = occurrences as i64 * OCCURRENCE_WEIGHT;
            total += positions
                .iter()
                .filter(|p| p.abs() < TIGHT_PROXIMITY)
                .count() as i64
                * PROXIMITY_BONUS;
            total += positions.iter().filter(|p| **p < 0).count() as i64 * BEFORE_MARKER_BONUS;
            ScoredGuid {
                value,
                score: total,
                occurrences,
            }
        })
        .collect();
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    Some(scored)
}
