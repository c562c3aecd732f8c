//! Assessment, question, and attempt document schemas

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for assessments
pub const ASSESSMENT_COLLECTION: &str = "assessments";

/// Collection name for assessment attempts
pub const ATTEMPT_COLLECTION: &str = "assessment_attempts";

/// A question embedded in an assessment document
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct AssessmentQuestionDoc {
    /// Stable question identifier, referenced by submitted responses
    pub id: i64,
    pub prompt: String,
    #[serde(default)]
    pub options: Vec<String>,
    /// Canonical answer, compared with case-sensitive equality
    pub answer: String,
    #[serde(default)]
    pub order: i64,
}

/// Assessment document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct AssessmentDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    pub slug: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_slug: Option<String>,

    pub title: String,

    #[serde(default = "default_duration_minutes")]
    pub duration_minutes: i64,

    /// Pass threshold as a percentage
    #[serde(default = "default_pass_threshold")]
    pub pass_threshold: f64,

    #[serde(default)]
    pub instructions: String,

    #[serde(default = "default_true")]
    pub is_active: bool,

    /// Ordered question bank
    #[serde(default)]
    pub questions: Vec<AssessmentQuestionDoc>,
}

fn default_duration_minutes() -> i64 {
    15
}

fn default_pass_threshold() -> f64 {
    40.0
}

fn default_true() -> bool {
    true
}

impl AssessmentDoc {
    /// Questions in display order
    pub fn ordered_questions(&self) -> Vec<&AssessmentQuestionDoc> {
        let mut questions: Vec<&AssessmentQuestionDoc> = self.questions.iter().collect();
        questions.sort_by_key(|q| (q.order, q.id));
        questions
    }
}

impl IntoIndexes for AssessmentDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "slug": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("assessment_slug_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "course_slug": 1 },
                Some(
                    IndexOptions::builder()
                        .name("assessment_course_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for AssessmentDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

/// A single submitted response as stored on an attempt
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct AttemptResponse {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

/// Assessment attempt document stored in MongoDB
///
/// Immutable once created: one row per submission.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct AssessmentAttemptDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    pub assessment_slug: String,

    #[serde(default)]
    pub email: String,

    pub score_percent: f64,
    pub passed: bool,

    /// Raw submitted responses
    #[serde(default)]
    pub responses: Vec<AttemptResponse>,

    pub correct_count: i64,
    pub total_questions: i64,
}

impl IntoIndexes for AssessmentAttemptDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "assessment_slug": 1, "metadata.created_at": -1 },
            Some(
                IndexOptions::builder()
                    .name("attempt_assessment_index".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for AssessmentAttemptDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
