//! Contact message and email OTP document schemas

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for contact messages
pub const CONTACT_COLLECTION: &str = "contact_messages";

/// Collection name for email OTPs
pub const EMAIL_OTP_COLLECTION: &str = "email_otps";

/// Contact form message stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ContactMessageDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub subject: String,
    pub message: String,
}

impl IntoIndexes for ContactMessageDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![]
    }
}

impl MutMetadata for ContactMessageDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

/// Email ownership verification code
///
/// Codes are valid for 30 minutes from creation; `verified_at` is stamped
/// on first successful verification.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct EmailOtpDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Stored lowercase for case-insensitive lookup
    pub email: String,

    pub code: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime>,
}

impl IntoIndexes for EmailOtpDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "email": 1, "metadata.created_at": -1 },
            Some(
                IndexOptions::builder()
                    .name("otp_email_index".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for EmailOtpDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
