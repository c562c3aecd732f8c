//! Payment document schema
//!
//! The payment is the root entity of the issuance flow: one row per
//! checkout attempt, mutated on gateway callback and on fulfillment.

use bson::{doc, oid::ObjectId, Document};
use chrono::NaiveDate;
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for payments
pub const PAYMENT_COLLECTION: &str = "payments";

/// Certification plan tier
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    #[default]
    Basic,
    Industrial,
    Mastery,
}

impl PlanType {
    /// Parse from the wire form ("basic", "industrial", "mastery")
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "basic" => Some(Self::Basic),
            "industrial" => Some(Self::Industrial),
            "mastery" => Some(Self::Mastery),
            _ => None,
        }
    }

    /// Wire form of the plan key
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Industrial => "industrial",
            Self::Mastery => "mastery",
        }
    }
}

impl std::fmt::Display for PlanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment lifecycle state
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Initiated,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initiated => "initiated",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }
}

/// Certificate layout chosen by the purchaser
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Horizontal,
    Vertical,
}

impl Orientation {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "horizontal" => Some(Self::Horizontal),
            "vertical" => Some(Self::Vertical),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Horizontal => "horizontal",
            Self::Vertical => "vertical",
        }
    }
}

/// Payment document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct PaymentDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Merchant transaction identifier (TXN-...)
    pub transaction_id: String,

    /// Course this payment is for, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_slug: Option<String>,

    /// Assessment the purchaser sat, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessment_slug: Option<String>,

    pub plan_type: PlanType,

    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,

    pub amount: f64,
    #[serde(default = "default_currency")]
    pub currency: String,

    #[serde(default)]
    pub college_name: String,
    #[serde(default)]
    pub semester: String,
    #[serde(default)]
    pub project_link: String,
    #[serde(default)]
    pub repository_link: String,

    #[serde(default)]
    pub certificate_orientation: Orientation,

    /// Plan validity window, derived from plan duration (never user-supplied)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,

    #[serde(default)]
    pub status: PaymentStatus,

    /// Free-form context: project info, certificate preview, gateway state
    #[serde(default)]
    pub extra: Document,
}

fn default_currency() -> String {
    "INR".to_string()
}

impl IntoIndexes for PaymentDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "transaction_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("transaction_id_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "email": 1 },
                Some(
                    IndexOptions::builder()
                        .name("payment_email_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for PaymentDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_type_parse() {
        assert_eq!(PlanType::parse("basic"), Some(PlanType::Basic));
        assert_eq!(PlanType::parse("INDUSTRIAL"), Some(PlanType::Industrial));
        assert_eq!(PlanType::parse("Mastery"), Some(PlanType::Mastery));
        assert_eq!(PlanType::parse("platinum"), None);
    }

    #[test]
    fn test_orientation_parse() {
        assert_eq!(Orientation::parse("vertical"), Some(Orientation::Vertical));
        assert_eq!(Orientation::parse("diagonal"), None);
    }

    #[test]
    fn test_plan_type_round_trips_through_serde() {
        let json = serde_json::to_string(&PlanType::Industrial).unwrap();
        assert_eq!(json, "\"industrial\"");
    }
}
