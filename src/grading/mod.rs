//! Assessment grader
//!
//! Scores a submitted set of responses against a question bank. The bank is
//! one `Question` shape regardless of source: stored assessment questions
//! and the built-in fallback bank both convert into it.

pub mod fallback;

use serde::Deserialize;

use crate::db::schemas::AssessmentQuestionDoc;
use crate::types::{ApiError, Result};

/// A gradable question, independent of where it came from
#[derive(Debug, Clone)]
pub struct Question {
    pub id: i64,
    pub prompt: String,
    pub options: Vec<String>,
    /// Canonical answer, compared with case-sensitive equality
    pub answer: String,
}

impl From<&AssessmentQuestionDoc> for Question {
    fn from(doc: &AssessmentQuestionDoc) -> Self {
        Self {
            id: doc.id,
            prompt: doc.prompt.clone(),
            options: doc.options.clone(),
            answer: doc.answer.clone(),
        }
    }
}

/// One submitted answer
#[derive(Debug, Clone, Deserialize)]
pub struct SubmittedResponse {
    pub id: i64,
    #[serde(default)]
    pub answer: Option<String>,
}

/// Grading outcome
#[derive(Debug, Clone, PartialEq)]
pub struct GradeResult {
    pub correct: i64,
    pub total: i64,
    pub percentage: f64,
    pub passed: bool,
}

/// Grade responses against a question bank.
///
/// The percentage is computed against the full bank, not the number of
/// submitted responses: a partial submission is scored as if the missing
/// answers were wrong. Responses referencing unknown question IDs are
/// ignored. An empty bank is a service error, not a zero score.
pub fn grade(
    bank: &[Question],
    responses: &[SubmittedResponse],
    threshold_percent: f64,
) -> Result<GradeResult> {
    let total = bank.len() as i64;
    if total == 0 {
        return Err(ApiError::ServiceUnavailable(
            "Assessment is not ready. Please try later.".to_string(),
        ));
    }

    let mut correct = 0i64;
    for response in responses {
        let Some(question) = bank.iter().find(|q| q.id == response.id) else {
            continue;
        };
        if response.answer.as_deref() == Some(question.answer.as_str()) {
            correct += 1;
        }
    }

    let percentage = (correct as f64 / total as f64) * 100.0;
    let passed = percentage >= threshold_percent;

    Ok(GradeResult {
        correct,
        total,
        percentage,
        passed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank(n: i64) -> Vec<Question> {
        (1..=n)
            .map(|i| Question {
                id: i,
                prompt: format!("Question {}", i),
                options: vec!["A".to_string(), "B".to_string()],
                answer: "A".to_string(),
            })
            .collect()
    }

    fn answer(id: i64, value: &str) -> SubmittedResponse {
        SubmittedResponse {
            id,
            answer: Some(value.to_string()),
        }
    }

    #[test]
    fn test_empty_bank_is_service_error() {
        let result = grade(&[], &[answer(1, "A")], 40.0);
        assert!(matches!(result, Err(ApiError::ServiceUnavailable(_))));
    }

    #[test]
    fn test_full_marks_pass_any_threshold() {
        let bank = bank(4);
        let responses: Vec<_> = (1..=4).map(|i| answer(i, "A")).collect();

        for threshold in [0.0, 40.0, 99.9, 100.0] {
            let result = grade(&bank, &responses, threshold).unwrap();
            assert_eq!(result.percentage, 100.0);
            assert!(result.passed, "threshold {} should pass", threshold);
        }
    }

    #[test]
    fn test_two_of_five_at_forty_percent_passes() {
        let bank = bank(5);
        let responses = vec![
            answer(1, "A"),
            answer(2, "A"),
            answer(3, "B"),
            answer(4, "B"),
            answer(5, "B"),
        ];

        let result = grade(&bank, &responses, 40.0).unwrap();
        assert_eq!(result.correct, 2);
        assert_eq!(result.total, 5);
        assert_eq!(result.percentage, 40.0);
        assert!(result.passed);
    }

    #[test]
    fn test_partial_submission_scored_against_full_bank() {
        let bank = bank(5);
        let result = grade(&bank, &[answer(1, "A")], 40.0).unwrap();
        assert_eq!(result.correct, 1);
        assert_eq!(result.total, 5);
        assert_eq!(result.percentage, 20.0);
        assert!(!result.passed);
    }

    #[test]
    fn test_unknown_question_ids_are_ignored() {
        let bank = bank(2);
        let responses = vec![answer(1, "A"), answer(99, "A"), answer(98, "A")];

        let result = grade(&bank, &responses, 50.0).unwrap();
        assert_eq!(result.correct, 1);
        assert_eq!(result.total, 2);
    }

    #[test]
    fn test_answers_compared_case_sensitively() {
        let bank = bank(1);
        let result = grade(&bank, &[answer(1, "a")], 50.0).unwrap();
        assert_eq!(result.correct, 0);
    }

    #[test]
    fn test_missing_answer_is_wrong() {
        let bank = bank(1);
        let responses = vec![SubmittedResponse { id: 1, answer: None }];
        let result = grade(&bank, &responses, 50.0).unwrap();
        assert_eq!(result.correct, 0);
    }
}
