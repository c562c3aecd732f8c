//! Certificate record storage
//!
//! The ledger talks to storage through the `LedgerStore` trait. Production
//! uses MongoDB; development mode without MongoDB and the test suite use
//! the in-memory implementation.

use async_trait::async_trait;
use bson::doc;
use mongodb::options::{Collation, CollationStrength, FindOneOptions};
use tokio::sync::Mutex;

use crate::db::schemas::{
    CertificateDoc, CertificateStatus, DeliveryLogDoc, Metadata, PlanType,
    CERTIFICATE_COLLECTION, DELIVERY_LOG_COLLECTION,
};
use crate::db::{MongoClient, MongoCollection};
use crate::ledger::id::normalize_certificate_id;
use crate::types::{ApiError, Result};

/// Storage operations required by the certificate ledger
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Find the certificate for a (payment, plan type) pair
    async fn find_for_payment(
        &self,
        transaction_id: &str,
        plan_type: PlanType,
    ) -> Result<Option<CertificateDoc>>;

    /// Find a certificate by ID, case-insensitively
    async fn find_certificate(&self, certificate_id: &str) -> Result<Option<CertificateDoc>>;

    /// Insert a new certificate record
    async fn insert_certificate(&self, certificate: CertificateDoc) -> Result<CertificateDoc>;

    /// Rename a certificate in place
    async fn rename_certificate(&self, current_id: &str, new_id: &str) -> Result<()>;

    /// Apply admin edits (email and/or status)
    async fn update_certificate(
        &self,
        certificate_id: &str,
        email: Option<&str>,
        status: Option<CertificateStatus>,
    ) -> Result<()>;

    /// Most recently issued certificate for an email address
    async fn latest_issued_for_email(&self, email: &str) -> Result<Option<CertificateDoc>>;

    /// Most recent certificates, newest first
    async fn list_recent(&self, limit: i64) -> Result<Vec<CertificateDoc>>;

    /// Append a delivery audit entry
    async fn append_delivery_log(&self, log: DeliveryLogDoc) -> Result<()>;

    /// Delivery audit trail for a certificate, oldest first
    async fn delivery_logs(&self, certificate_id: &str) -> Result<Vec<DeliveryLogDoc>>;
}

// =============================================================================
// MongoDB implementation
// =============================================================================

/// MongoDB-backed ledger store
pub struct MongoLedgerStore {
    certificates: MongoCollection<CertificateDoc>,
    logs: MongoCollection<DeliveryLogDoc>,
}

impl MongoLedgerStore {
    /// Create the store and apply collection indexes
    pub async fn new(mongo: &MongoClient) -> Result<Self> {
        Ok(Self {
            certificates: mongo.collection(CERTIFICATE_COLLECTION).await?,
            logs: mongo.collection(DELIVERY_LOG_COLLECTION).await?,
        })
    }

    fn case_insensitive_collation() -> Collation {
        Collation::builder()
            .locale("en")
            .strength(CollationStrength::Secondary)
            .build()
    }
}

#[async_trait]
impl LedgerStore for MongoLedgerStore {
    async fn find_for_payment(
        &self,
        transaction_id: &str,
        plan_type: PlanType,
    ) -> Result<Option<CertificateDoc>> {
        self.certificates
            .find_one(doc! {
                "payment_transaction_id": transaction_id,
                "plan_type": plan_type.as_str(),
            })
            .await
    }

    async fn find_certificate(&self, certificate_id: &str) -> Result<Option<CertificateDoc>> {
        // IDs are stored uppercase, so normalizing the input gives a
        // case-insensitive exact match on the unique index
        self.certificates
            .find_one(doc! { "certificate_id": normalize_certificate_id(certificate_id) })
            .await
    }

    async fn insert_certificate(&self, mut certificate: CertificateDoc) -> Result<CertificateDoc> {
        certificate.metadata = Metadata::new();
        let returned = certificate.clone();
        self.certificates.insert_one(certificate).await?;
        Ok(returned)
    }

    async fn rename_certificate(&self, current_id: &str, new_id: &str) -> Result<()> {
        self.certificates
            .update_one(
                doc! { "certificate_id": current_id },
                doc! {
                    "$set": {
                        "certificate_id": new_id,
                        "metadata.updated_at": bson::DateTime::now(),
                    }
                },
            )
            .await?;
        Ok(())
    }

    async fn update_certificate(
        &self,
        certificate_id: &str,
        email: Option<&str>,
        status: Option<CertificateStatus>,
    ) -> Result<()> {
        let mut set = doc! { "metadata.updated_at": bson::DateTime::now() };
        if let Some(email) = email {
            set.insert("email", email);
        }
        if let Some(status) = status {
            set.insert("status", status.as_str());
        }

        self.certificates
            .update_one(
                doc! { "certificate_id": normalize_certificate_id(certificate_id) },
                doc! { "$set": set },
            )
            .await?;
        Ok(())
    }

    async fn latest_issued_for_email(&self, email: &str) -> Result<Option<CertificateDoc>> {
        let options = FindOneOptions::builder()
            .sort(doc! { "metadata.created_at": -1 })
            .collation(Self::case_insensitive_collation())
            .build();

        self.certificates
            .inner()
            .find_one(doc! {
                "email": email,
                "status": "issued",
                "metadata.is_deleted": { "$ne": true },
            })
            .with_options(options)
            .await
            .map_err(|e| ApiError::Database(format!("Find failed: {}", e)))
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<CertificateDoc>> {
        self.certificates
            .find_many_with(doc! {}, Some(doc! { "metadata.created_at": -1 }), Some(limit))
            .await
    }

    async fn append_delivery_log(&self, log: DeliveryLogDoc) -> Result<()> {
        self.logs.insert_one(log).await?;
        Ok(())
    }

    async fn delivery_logs(&self, certificate_id: &str) -> Result<Vec<DeliveryLogDoc>> {
        self.logs
            .find_many_with(
                doc! { "certificate_id": normalize_certificate_id(certificate_id) },
                Some(doc! { "metadata.created_at": 1 }),
                None,
            )
            .await
    }
}

// =============================================================================
// In-memory implementation
// =============================================================================

/// In-memory ledger store
///
/// Backs development mode when MongoDB is unreachable, and the test suite.
#[derive(Default)]
pub struct MemoryLedgerStore {
    certificates: Mutex<Vec<CertificateDoc>>,
    logs: Mutex<Vec<DeliveryLogDoc>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn find_for_payment(
        &self,
        transaction_id: &str,
        plan_type: PlanType,
    ) -> Result<Option<CertificateDoc>> {
        let certificates = self.certificates.lock().await;
        Ok(certificates
            .iter()
            .find(|c| {
                c.payment_transaction_id.as_deref() == Some(transaction_id)
                    && c.plan_type == plan_type
            })
            .cloned())
    }

    async fn find_certificate(&self, certificate_id: &str) -> Result<Option<CertificateDoc>> {
        let certificates = self.certificates.lock().await;
        Ok(certificates
            .iter()
            .find(|c| c.certificate_id.eq_ignore_ascii_case(certificate_id.trim()))
            .cloned())
    }

    async fn insert_certificate(&self, mut certificate: CertificateDoc) -> Result<CertificateDoc> {
        certificate.metadata = Metadata::new();
        let mut certificates = self.certificates.lock().await;
        certificates.push(certificate.clone());
        Ok(certificate)
    }

    async fn rename_certificate(&self, current_id: &str, new_id: &str) -> Result<()> {
        let mut certificates = self.certificates.lock().await;
        if let Some(certificate) = certificates
            .iter_mut()
            .find(|c| c.certificate_id.eq_ignore_ascii_case(current_id))
        {
            certificate.certificate_id = new_id.to_string();
            certificate.metadata.updated_at = Some(bson::DateTime::now());
        }
        Ok(())
    }

    async fn update_certificate(
        &self,
        certificate_id: &str,
        email: Option<&str>,
        status: Option<CertificateStatus>,
    ) -> Result<()> {
        let mut certificates = self.certificates.lock().await;
        if let Some(certificate) = certificates
            .iter_mut()
            .find(|c| c.certificate_id.eq_ignore_ascii_case(certificate_id.trim()))
        {
            if let Some(email) = email {
                certificate.email = email.to_string();
            }
            if let Some(status) = status {
                certificate.status = status;
            }
            certificate.metadata.updated_at = Some(bson::DateTime::now());
        }
        Ok(())
    }

    async fn latest_issued_for_email(&self, email: &str) -> Result<Option<CertificateDoc>> {
        let certificates = self.certificates.lock().await;
        Ok(certificates
            .iter()
            .filter(|c| {
                c.email.eq_ignore_ascii_case(email) && c.status == CertificateStatus::Issued
            })
            .max_by_key(|c| c.metadata.created_at)
            .cloned())
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<CertificateDoc>> {
        let certificates = self.certificates.lock().await;
        let mut recent: Vec<CertificateDoc> = certificates.clone();
        recent.sort_by(|a, b| b.metadata.created_at.cmp(&a.metadata.created_at));
        recent.truncate(limit.max(0) as usize);
        Ok(recent)
    }

    async fn append_delivery_log(&self, mut log: DeliveryLogDoc) -> Result<()> {
        log.metadata = Metadata::new();
        let mut logs = self.logs.lock().await;
        logs.push(log);
        Ok(())
    }

    async fn delivery_logs(&self, certificate_id: &str) -> Result<Vec<DeliveryLogDoc>> {
        let logs = self.logs.lock().await;
        Ok(logs
            .iter()
            .filter(|l| l.certificate_id.eq_ignore_ascii_case(certificate_id.trim()))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::DeliveryStatus;

    fn certificate(id: &str, email: &str) -> CertificateDoc {
        CertificateDoc {
            certificate_id: id.to_string(),
            email: email.to_string(),
            status: CertificateStatus::Issued,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_memory_store_case_insensitive_lookup() {
        let store = MemoryLedgerStore::new();
        store
            .insert_certificate(certificate("CERT-AB12CD34EF", "a@example.com"))
            .await
            .unwrap();

        let found = store.find_certificate("cert-ab12cd34ef").await.unwrap();
        assert!(found.is_some());
        assert!(store.find_certificate("CERT-MISSING00").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_latest_issued_for_email() {
        let store = MemoryLedgerStore::new();
        store
            .insert_certificate(certificate("CERT-0000000001", "Holder@Example.com"))
            .await
            .unwrap();
        store
            .insert_certificate(certificate("CERT-0000000002", "holder@example.com"))
            .await
            .unwrap();

        let latest = store
            .latest_issued_for_email("HOLDER@EXAMPLE.COM")
            .await
            .unwrap()
            .expect("certificate expected");
        // Both match; newest wins
        assert_eq!(latest.certificate_id, "CERT-0000000002");
    }

    #[tokio::test]
    async fn test_memory_store_logs_are_append_only() {
        let store = MemoryLedgerStore::new();
        store
            .append_delivery_log(DeliveryLogDoc::new(
                "CERT-AB12CD34EF",
                DeliveryStatus::Pending,
                doc! { "note": "first" },
            ))
            .await
            .unwrap();
        store
            .append_delivery_log(DeliveryLogDoc::new(
                "CERT-AB12CD34EF",
                DeliveryStatus::Sent,
                doc! { "trigger": "test" },
            ))
            .await
            .unwrap();

        let logs = store.delivery_logs("cert-ab12cd34ef").await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].status, DeliveryStatus::Pending);
        assert_eq!(logs[1].status, DeliveryStatus::Sent);
    }
}
