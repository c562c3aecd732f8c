//! Certificate and delivery-log document schemas
//!
//! A certificate is issued at most once per (payment, plan type); delivery
//! logs are an append-only audit trail of outbound attempts.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::payment::{Orientation, PlanType};
use crate::db::schemas::Metadata;

/// Collection name for certificates
pub const CERTIFICATE_COLLECTION: &str = "certificates";

/// Collection name for delivery logs
pub const DELIVERY_LOG_COLLECTION: &str = "certificate_delivery_logs";

/// Certificate lifecycle state
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CertificateStatus {
    #[default]
    Pending,
    Issued,
    Revoked,
}

impl CertificateStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "issued" => Some(Self::Issued),
            "revoked" => Some(Self::Revoked),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Issued => "issued",
            Self::Revoked => "revoked",
        }
    }
}

/// Delivery attempt outcome
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    #[default]
    Pending,
    Sent,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

/// Certificate document stored in MongoDB
///
/// Certificate IDs are stored uppercase; lookups normalize their input,
/// which gives case-insensitive matching.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct CertificateDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Public certificate identifier (CERT-...)
    pub certificate_id: String,

    pub email: String,
    pub plan_type: PlanType,

    /// Course reference, denormalized for verification responses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_title: Option<String>,

    #[serde(default)]
    pub orientation: Orientation,

    #[serde(default)]
    pub status: CertificateStatus,

    /// Owning payment, when issued through a checkout
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_transaction_id: Option<String>,
}

impl IntoIndexes for CertificateDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "certificate_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("certificate_id_unique".to_string())
                        .build(),
                ),
            ),
            // Backstop for the at-most-one-per-(payment, plan) invariant
            (
                doc! { "payment_transaction_id": 1, "plan_type": 1 },
                Some(
                    IndexOptions::builder()
                        .name("payment_plan_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "email": 1 },
                Some(
                    IndexOptions::builder()
                        .name("certificate_email_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for CertificateDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

/// Delivery log document stored in MongoDB
///
/// Never mutated, only appended.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct DeliveryLogDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Certificate this attempt belongs to
    pub certificate_id: String,

    /// Delivery channel
    #[serde(default = "default_channel")]
    pub channel: String,

    #[serde(default)]
    pub status: DeliveryStatus,

    /// Free-form detail: note, trigger source, failure reason, recipient
    #[serde(default)]
    pub detail: Document,
}

fn default_channel() -> String {
    "email".to_string()
}

impl DeliveryLogDoc {
    /// Create a log entry for a certificate
    pub fn new(certificate_id: &str, status: DeliveryStatus, detail: Document) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            certificate_id: certificate_id.to_string(),
            channel: default_channel(),
            status,
            detail,
        }
    }
}

impl IntoIndexes for DeliveryLogDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "certificate_id": 1 },
            Some(
                IndexOptions::builder()
                    .name("delivery_certificate_index".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for DeliveryLogDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
