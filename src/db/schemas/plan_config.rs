//! Plan configuration overrides
//!
//! Operators can override the static plan table (price, label, currency)
//! without a redeploy. Merged at read time; see `plans::resolve_policy`.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::payment::PlanType;
use crate::db::schemas::Metadata;

/// Collection name for plan configuration overrides
pub const PLAN_CONFIG_COLLECTION: &str = "plan_configs";

/// Plan configuration document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct PlanConfigDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    pub plan_type: PlanType,

    pub price: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_price: Option<f64>,

    #[serde(default)]
    pub currency: String,

    #[serde(default)]
    pub label_override: String,

    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl IntoIndexes for PlanConfigDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "plan_type": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("plan_type_unique".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for PlanConfigDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
