//! Answer evaluation. Everything here is pure so it can be unit tested
//! without a database.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::domain::MatchSide;
use crate::entities::answers;

/// The parts of a stored answer that decide correctness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerKey {
    pub id: i32,
    pub is_correct: bool,
    pub match_side: Option<MatchSide>,
    pub match_group: Option<i32>,
}

impl From<&answers::Model> for AnswerKey {
    fn from(model: &answers::Model) -> Self {
        Self {
            id: model.id,
            is_correct: model.is_correct,
            match_side: model.match_side.as_deref().and_then(|s| s.parse().ok()),
            match_group: model.match_group,
        }
    }
}

/// One left item assigned to one right item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPair {
    pub left_id: i32,
    pub right_id: i32,
}

/// Lowercases, drops punctuation and symbols, and collapses whitespace.
#[must_use]
pub fn normalize_text(input: &str) -> String {
    let cleaned: String = input
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// True when `submitted` equals any accepted value after normalization.
/// Blank input never matches.
pub fn text_matches<'a>(submitted: &str, accepted: impl IntoIterator<Item = &'a str>) -> bool {
    let submitted = normalize_text(submitted);
    if submitted.is_empty() {
        return false;
    }

    accepted
        .into_iter()
        .any(|candidate| normalize_text(candidate) == submitted)
}

#[must_use]
pub fn evaluate_choice(answer_id: Option<i32>, answers: &[AnswerKey]) -> bool {
    answer_id.is_some_and(|chosen| {
        answers
            .iter()
            .any(|answer| answer.id == chosen && answer.is_correct)
    })
}

/// A matching submission is correct only when every left answer is paired
/// exactly once, each right answer is used at most once, and every pair
/// shares a match group.
#[must_use]
pub fn evaluate_matching(pairs: &[MatchPair], answers: &[AnswerKey]) -> bool {
    let side_groups = |side: MatchSide| -> HashMap<i32, Option<i32>> {
        answers
            .iter()
            .filter(|a| a.match_side == Some(side))
            .map(|a| (a.id, a.match_group))
            .collect()
    };

    let lefts = side_groups(MatchSide::Left);
    let rights = side_groups(MatchSide::Right);

    if lefts.is_empty() || pairs.len() != lefts.len() {
        return false;
    }

    let mut used_left = HashSet::with_capacity(pairs.len());
    let mut used_right = HashSet::with_capacity(pairs.len());

    pairs.iter().all(|pair| {
        let (Some(left_group), Some(right_group)) =
            (lefts.get(&pair.left_id), rights.get(&pair.right_id))
        else {
            return false;
        };

        used_left.insert(pair.left_id)
            && used_right.insert(pair.right_id)
            && left_group.is_some()
            && left_group == right_group
    })
}

/// Percentage of correct answers rounded to two decimals.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn score_percent(correct: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }

    let raw = correct as f64 / total as f64 * 100.0;
    (raw * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choice(id: i32, is_correct: bool) -> AnswerKey {
        AnswerKey {
            id,
            is_correct,
            match_side: None,
            match_group: None,
        }
    }

    fn side(id: i32, side: MatchSide, group: i32) -> AnswerKey {
        AnswerKey {
            id,
            is_correct: true,
            match_side: Some(side),
            match_group: Some(group),
        }
    }

    /// Two pairs: 1-3 in group 1, 2-4 in group 2.
    fn matching_set() -> Vec<AnswerKey> {
        vec![
            side(1, MatchSide::Left, 1),
            side(2, MatchSide::Left, 2),
            side(3, MatchSide::Right, 1),
            side(4, MatchSide::Right, 2),
        ]
    }

    fn pair(left_id: i32, right_id: i32) -> MatchPair {
        MatchPair { left_id, right_id }
    }

    #[test]
    fn test_normalize_text_variants_agree() {
        assert_eq!(normalize_text("Paris."), "paris");
        assert_eq!(normalize_text("paris"), "paris");
        assert_eq!(normalize_text("  PARIS  "), "paris");
        assert_eq!(normalize_text("New   York,\tcity!"), "new york city");
        assert_eq!(normalize_text("Łódź"), "łódź");
        assert_eq!(normalize_text("?!"), "");
    }

    #[test]
    fn test_text_matches() {
        assert!(text_matches("  PARIS  ", ["Paris."]));
        assert!(text_matches("la paz", ["Sucre", "La Paz"]));
        assert!(!text_matches("Lyon", ["Paris"]));
        assert!(!text_matches("...", ["..."]));
        assert!(!text_matches("", [""]));
    }

    #[test]
    fn test_evaluate_choice() {
        let answers = [choice(1, false), choice(2, true)];
        assert!(evaluate_choice(Some(2), &answers));
        assert!(!evaluate_choice(Some(1), &answers));
        assert!(!evaluate_choice(Some(99), &answers));
        assert!(!evaluate_choice(None, &answers));
    }

    #[test]
    fn test_matching_requires_complete_same_group_assignment() {
        let answers = matching_set();

        assert!(evaluate_matching(&[pair(1, 3), pair(2, 4)], &answers));
        assert!(evaluate_matching(&[pair(2, 4), pair(1, 3)], &answers));

        // swapped groups
        assert!(!evaluate_matching(&[pair(1, 4), pair(2, 3)], &answers));
        // incomplete
        assert!(!evaluate_matching(&[pair(1, 3)], &answers));
        assert!(!evaluate_matching(&[], &answers));
    }

    #[test]
    fn test_matching_rejects_reused_or_unknown_items() {
        let answers = matching_set();

        // same right item twice
        assert!(!evaluate_matching(&[pair(1, 3), pair(2, 3)], &answers));
        // same left item twice
        assert!(!evaluate_matching(&[pair(1, 3), pair(1, 3)], &answers));
        // right id used on the left side
        assert!(!evaluate_matching(&[pair(3, 1), pair(2, 4)], &answers));
        // unknown ids and extra pairs
        assert!(!evaluate_matching(&[pair(1, 3), pair(2, 99)], &answers));
        assert!(!evaluate_matching(
            &[pair(1, 3), pair(2, 4), pair(5, 6)],
            &answers
        ));
    }

    #[test]
    fn test_score_percent() {
        assert!((score_percent(0, 0) - 0.0).abs() < f64::EPSILON);
        assert!((score_percent(1, 3) - 33.33).abs() < f64::EPSILON);
        assert!((score_percent(2, 3) - 66.67).abs() < f64::EPSILON);
        assert!((score_percent(4, 4) - 100.0).abs() < f64::EPSILON);
    }
}
