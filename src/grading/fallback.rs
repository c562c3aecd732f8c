//! Built-in fallback question bank
//!
//! Served when no stored assessment matches the request. Submissions
//! against this bank are graded but never persisted as attempts.

use super::Question;

/// Pass threshold for the fallback bank, as a percentage
pub const FALLBACK_PASS_THRESHOLD: f64 = 40.0;

/// Time limit for the fallback bank, in minutes
pub const FALLBACK_DURATION_MINUTES: i64 = 15;

/// The demo question bank
pub fn fallback_questions() -> Vec<Question> {
    vec![
        Question {
            id: 1,
            prompt: "Which library is primarily used for data manipulation in Python?"
                .to_string(),
            options: vec![
                "React".to_string(),
                "Pandas".to_string(),
                "Vue".to_string(),
                "Laravel".to_string(),
            ],
            answer: "Pandas".to_string(),
        },
        Question {
            id: 2,
            prompt: "What does CSV stand for?".to_string(),
            options: vec![
                "Computer Style View".to_string(),
                "Comma Separated Values".to_string(),
                "Code Syntax Variable".to_string(),
                "None".to_string(),
            ],
            answer: "Comma Separated Values".to_string(),
        },
        Question {
            id: 3,
            prompt: "Which metric is commonly used to evaluate a classification model?"
                .to_string(),
            options: vec![
                "Mean Squared Error".to_string(),
                "R-Squared".to_string(),
                "Accuracy".to_string(),
                "Variance".to_string(),
            ],
            answer: "Accuracy".to_string(),
        },
        Question {
            id: 4,
            prompt: "What is the purpose of the 'head()' function in Pandas?".to_string(),
            options: vec![
                "Delete the first row".to_string(),
                "Return the last 5 rows".to_string(),
                "Return the first n rows".to_string(),
                "Calculate the mean".to_string(),
            ],
            answer: "Return the first n rows".to_string(),
        },
        Question {
            id: 5,
            prompt: "Which of the following is a supervised learning algorithm?".to_string(),
            options: vec![
                "K-Means Clustering".to_string(),
                "Linear Regression".to_string(),
                "Apriori".to_string(),
                "DBSCAN".to_string(),
            ],
            answer: "Linear Regression".to_string(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_bank_has_five_questions() {
        let questions = fallback_questions();
        assert_eq!(questions.len(), 5);
        // Every answer must be one of the offered options
        for question in &questions {
            assert!(
                question.options.contains(&question.answer),
                "answer for question {} not in options",
                question.id
            );
        }
    }
}
