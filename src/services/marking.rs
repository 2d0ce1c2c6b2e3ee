//! Set-based marking of multiple-choice answers with proportional partial credit.
//!
//! Labels reaching this module are already canonical (see `services::options`);
//! they are compared as opaque, case-sensitive tokens.

use std::collections::BTreeSet;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct MarkingResult {
    #[serde(rename = "marks")]
    pub(crate) marks_awarded: f64,
    pub(crate) is_fully_correct: bool,
    pub(crate) is_partially_correct: bool,
    pub(crate) has_wrong_options: bool,
    #[serde(rename = "marking_explanation")]
    pub(crate) explanation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum AnswerStatus {
    Correct,
    Partial,
    Incorrect,
    NotAnswered,
}

impl MarkingResult {
    fn zero(has_wrong_options: bool, explanation: String) -> Self {
        Self {
            marks_awarded: 0.0,
            is_fully_correct: false,
            is_partially_correct: false,
            has_wrong_options,
            explanation,
        }
    }

    pub(crate) fn status(&self) -> AnswerStatus {
        if self.is_fully_correct {
            AnswerStatus::Correct
        } else if self.is_partially_correct {
            AnswerStatus::Partial
        } else if self.has_wrong_options {
            AnswerStatus::Incorrect
        } else {
            AnswerStatus::NotAnswered
        }
    }
}

/// Rounds half away from zero to two decimals.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn join_labels<'a>(labels: impl IntoIterator<Item = &'a String>) -> String {
    labels.into_iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

/// Scores one response against one key entry.
///
/// Any selected label outside `correct` zeroes the question. A strict subset
/// earns `marks * |selected| / |correct|`, rounded to two decimals. An empty
/// `correct` set marks a malformed key and scores zero.
pub(crate) fn reconcile(
    selected: &BTreeSet<String>,
    correct: &BTreeSet<String>,
    marks: f64,
) -> MarkingResult {
    let marks = marks.max(0.0);

    if selected.is_empty() {
        return MarkingResult::zero(false, "No options selected.".to_string());
    }

    if correct.is_empty() {
        return MarkingResult::zero(true, "No correct options defined.".to_string());
    }

    let wrong: Vec<&String> = selected.difference(correct).collect();
    if !wrong.is_empty() {
        return MarkingResult::zero(
            true,
            format!("Selected wrong option(s): {}.", join_labels(wrong)),
        );
    }

    if selected == correct {
        return MarkingResult {
            marks_awarded: marks,
            is_fully_correct: true,
            is_partially_correct: false,
            has_wrong_options: false,
            explanation: "All correct options selected.".to_string(),
        };
    }

    let hit = selected.len();
    let total = correct.len();
    let missing: Vec<&String> = correct.difference(selected).collect();

    MarkingResult {
        marks_awarded: round2(marks * hit as f64 / total as f64).min(marks),
        is_fully_correct: false,
        is_partially_correct: true,
        has_wrong_options: false,
        explanation: format!(
            "Partial marks: {hit}/{total} correct options. Missing: {}.",
            join_labels(missing)
        ),
    }
}

/// One answer-key entry paired with the student's response, if any.
#[derive(Debug, Clone)]
pub(crate) struct QuestionPair {
    pub(crate) question_number: i32,
    pub(crate) correct: BTreeSet<String>,
    pub(crate) marks: f64,
    pub(crate) selected: Option<BTreeSet<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct QuestionScore {
    pub(crate) question_number: i32,
    pub(crate) max_marks: f64,
    pub(crate) result: MarkingResult,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub(crate) struct StatusCounts {
    pub(crate) correct: i32,
    pub(crate) partial: i32,
    pub(crate) incorrect: i32,
    pub(crate) not_answered: i32,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ScoreSheet {
    pub(crate) questions: Vec<QuestionScore>,
    pub(crate) total_marks: f64,
    pub(crate) max_marks: f64,
    pub(crate) percentage: f64,
    pub(crate) counts: StatusCounts,
}

pub(crate) fn percentage(total: f64, max: f64) -> f64 {
    if max <= 0.0 {
        return 0.0;
    }
    round2(100.0 * total / max)
}

/// Scores a whole submission in key order. Missing responses count as unanswered.
pub(crate) fn score_submission(pairs: impl IntoIterator<Item = QuestionPair>) -> ScoreSheet {
    let empty = BTreeSet::new();
    let mut questions = Vec::new();
    let mut counts = StatusCounts::default();
    let mut total_marks = 0.0;
    let mut max_marks = 0.0;

    for pair in pairs {
        let selected = pair.selected.as_ref().unwrap_or(&empty);
        let result = reconcile(selected, &pair.correct, pair.marks);

        match result.status() {
            AnswerStatus::Correct => counts.correct += 1,
            AnswerStatus::Partial => counts.partial += 1,
            AnswerStatus::Incorrect => counts.incorrect += 1,
            AnswerStatus::NotAnswered => counts.not_answered += 1,
        }

        total_marks += result.marks_awarded;
        max_marks += pair.marks.max(0.0);
        questions.push(QuestionScore {
            question_number: pair.question_number,
            max_marks: pair.marks,
            result,
        });
    }

    let total_marks = round2(total_marks);
    let max_marks = round2(max_marks);

    ScoreSheet {
        questions,
        total_marks,
        max_marks,
        percentage: percentage(total_marks, max_marks),
        counts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::collection::btree_set;
    use proptest::prelude::*;

    fn set(labels: &[&str]) -> BTreeSet<String> {
        labels.iter().map(|label| label.to_string()).collect()
    }

    #[test]
    fn half_of_two_options_earns_half_marks() {
        let result = reconcile(&set(&["A"]), &set(&["A", "B"]), 2.0);
        assert_eq!(result.marks_awarded, 1.0);
        assert!(result.is_partially_correct);
        assert!(!result.is_fully_correct);
        assert!(!result.has_wrong_options);
        assert_eq!(result.explanation, "Partial marks: 1/2 correct options. Missing: B.");
    }

    #[test]
    fn two_of_three_options_earns_two_thirds() {
        let result = reconcile(&set(&["A", "B"]), &set(&["A", "B", "C"]), 3.0);
        assert_eq!(result.marks_awarded, 2.0);
        assert!(result.is_partially_correct);
    }

    #[test]
    fn extra_option_zeroes_question() {
        let result = reconcile(&set(&["A", "B", "C"]), &set(&["A", "B"]), 2.0);
        assert_eq!(result.marks_awarded, 0.0);
        assert!(result.has_wrong_options);
        assert!(!result.is_partially_correct);
        assert_eq!(result.explanation, "Selected wrong option(s): C.");
    }

    #[test]
    fn partial_credit_rounds_to_two_decimals() {
        let result = reconcile(&set(&["A"]), &set(&["A", "B", "C"]), 2.0);
        assert_eq!(result.marks_awarded, 0.67);
        assert_eq!(result.explanation, "Partial marks: 1/3 correct options. Missing: B, C.");
    }

    #[test]
    fn empty_selection_is_not_answered() {
        let result = reconcile(&BTreeSet::new(), &set(&["A"]), 1.0);
        assert_eq!(result.marks_awarded, 0.0);
        assert_eq!(result.status(), AnswerStatus::NotAnswered);
        assert_eq!(result.explanation, "No options selected.");
    }

    #[test]
    fn empty_key_scores_zero_with_flag() {
        let result = reconcile(&set(&["A"]), &BTreeSet::new(), 1.0);
        assert_eq!(result.marks_awarded, 0.0);
        assert!(result.has_wrong_options);
        assert_eq!(result.explanation, "No correct options defined.");
    }

    #[test]
    fn wrong_labels_are_listed_sorted() {
        let result = reconcile(&set(&["D", "A", "C"]), &set(&["A"]), 1.0);
        assert_eq!(result.explanation, "Selected wrong option(s): C, D.");
    }

    #[test]
    fn score_submission_totals_and_counts() {
        let sheet = score_submission(vec![
            QuestionPair {
                question_number: 1,
                correct: set(&["A"]),
                marks: 1.0,
                selected: Some(set(&["A"])),
            },
            QuestionPair {
                question_number: 2,
                correct: set(&["A", "B"]),
                marks: 2.0,
                selected: Some(set(&["B"])),
            },
            QuestionPair {
                question_number: 3,
                correct: set(&["C"]),
                marks: 1.0,
                selected: Some(set(&["D"])),
            },
            QuestionPair { question_number: 4, correct: set(&["B"]), marks: 1.0, selected: None },
        ]);

        assert_eq!(sheet.total_marks, 2.0);
        assert_eq!(sheet.max_marks, 5.0);
        assert_eq!(sheet.percentage, 40.0);
        assert_eq!(
            sheet.counts,
            StatusCounts { correct: 1, partial: 1, incorrect: 1, not_answered: 1 }
        );
        assert_eq!(sheet.questions.len(), 4);
        assert_eq!(sheet.questions[1].result.status(), AnswerStatus::Partial);
    }

    #[test]
    fn empty_key_has_zero_percentage() {
        let sheet = score_submission(Vec::new());
        assert_eq!(sheet.max_marks, 0.0);
        assert_eq!(sheet.percentage, 0.0);
    }

    #[test]
    fn marking_result_serializes_with_wire_names() {
        let result = reconcile(&set(&["A"]), &set(&["A"]), 1.5);
        let json = serde_json::to_value(&result).expect("json");
        assert_eq!(json["marks"], 1.5);
        assert_eq!(json["marking_explanation"], "All correct options selected.");
        assert_eq!(json["is_fully_correct"], true);
    }

    fn labels() -> impl Strategy<Value = BTreeSet<String>> {
        btree_set(prop_oneof![Just("A"), Just("B"), Just("C"), Just("D"), Just("E")], 1..=5)
            .prop_map(|items| items.into_iter().map(str::to_string).collect())
    }

    proptest! {
        #[test]
        fn exact_match_earns_full_marks(correct in labels(), marks in 0.0f64..100.0) {
            let result = reconcile(&correct, &correct, marks);
            prop_assert_eq!(result.marks_awarded, marks);
            prop_assert!(result.is_fully_correct);
        }

        #[test]
        fn any_wrong_label_zeroes(correct in labels(), extra in labels(), marks in 0.0f64..100.0) {
            let selected: BTreeSet<String> = correct.union(&extra).cloned().collect();
            prop_assume!(!selected.is_subset(&correct));
            let result = reconcile(&selected, &correct, marks);
            prop_assert_eq!(result.marks_awarded, 0.0);
            prop_assert!(result.has_wrong_options);
            prop_assert!(!result.is_fully_correct && !result.is_partially_correct);
        }

        #[test]
        fn awarded_marks_stay_in_range(
            correct in labels(),
            selected in labels(),
            marks in 0.0f64..100.0,
        ) {
            let result = reconcile(&selected, &correct, marks);
            prop_assert!(result.marks_awarded >= 0.0);
            prop_assert!(result.marks_awarded <= marks);
            let flags =
                [result.is_fully_correct, result.is_partially_correct, result.has_wrong_options];
            prop_assert_eq!(flags.iter().filter(|flag| **flag).count(), 1);
        }

        #[test]
        fn partial_credit_is_monotonic(
            correct in labels(),
            mask_small in any::<u8>(),
            mask_extra in any::<u8>(),
            marks in 0.0f64..100.0,
        ) {
            let ordered: Vec<&String> = correct.iter().collect();
            let pick = |mask: u8| -> BTreeSet<String> {
                ordered
                    .iter()
                    .enumerate()
                    .filter(|(index, _)| mask & (1 << index) != 0)
                    .map(|(_, label)| (*label).clone())
                    .collect()
            };
            let small = pick(mask_small);
            let large = pick(mask_small | mask_extra);
            let small_marks = reconcile(&small, &correct, marks).marks_awarded;
            let large_marks = reconcile(&large, &correct, marks).marks_awarded;
            prop_assert!(small_marks <= large_marks);
        }

        #[test]
        fn single_label_full_credit_is_exact(marks in 0.0f64..1000.0) {
            let key = set(&["B"]);
            prop_assert_eq!(reconcile(&key, &key, marks).marks_awarded, marks);
        }
    }
}
