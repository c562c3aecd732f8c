//! Course document schema

use bson::{doc, oid::ObjectId, Bson, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for courses
pub const COURSE_COLLECTION: &str = "courses";

/// Course document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct CourseDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub color: String,

    #[serde(default)]
    pub students: i64,
    #[serde(default)]
    pub duration_hours: i64,

    /// Month-by-month syllabus blocks
    #[serde(default)]
    pub syllabus: Vec<Bson>,
    #[serde(default)]
    pub competencies: Vec<Bson>,
    #[serde(default)]
    pub plan_highlights: Document,
    #[serde(default)]
    pub project_title_suggestions: Vec<String>,
}

impl IntoIndexes for CourseDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "slug": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("course_slug_unique".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for CourseDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
