//! Certificate ledger
//!
//! Maps a payment to at most one issued certificate per plan type. All
//! creation paths go through `ensure_certificate`, the one idempotent
//! contract; the fulfillment path layers an audit note on top of it.

pub mod id;
pub mod store;

use std::sync::Arc;

use bson::doc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::info;

use crate::db::schemas::{
    CertificateDoc, CertificateStatus, DeliveryLogDoc, DeliveryStatus, PaymentDoc,
};
use crate::types::{ApiError, Result};

pub use id::{generate_certificate_id, normalize_certificate_id};
pub use store::{LedgerStore, MemoryLedgerStore, MongoLedgerStore};

/// The certificate ledger
///
/// Holds a per-payment async lock across the lookup-and-create sequence so
/// concurrent fulfillment calls cannot double-issue. The store's unique
/// certificate-ID index is the backstop underneath.
pub struct CertificateLedger {
    store: Arc<dyn LedgerStore>,
    payment_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl CertificateLedger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            payment_locks: DashMap::new(),
        }
    }

    /// The underlying store (shared with the delivery scheduler and routes)
    pub fn store(&self) -> Arc<dyn LedgerStore> {
        Arc::clone(&self.store)
    }

    /// Idempotently resolve the certificate for a payment.
    ///
    /// Returns the existing certificate for `(payment, plan_type)` when one
    /// exists. A differing `desired_id` renames the existing record after
    /// checking no other certificate holds that ID (case-insensitive);
    /// a collision is a `Conflict` and leaves the original unchanged.
    /// Otherwise a new certificate is created with status `issued`, using
    /// the normalized desired ID if free, else a generated one (regenerated
    /// once if the first candidate is taken).
    pub async fn ensure_certificate(
        &self,
        payment: &PaymentDoc,
        desired_id: Option<&str>,
        course_title: Option<String>,
    ) -> Result<CertificateDoc> {
        let lock = self.payment_lock(&payment.transaction_id);
        let _guard = lock.lock().await;

        let normalized = desired_id
            .map(normalize_certificate_id)
            .filter(|id| !id.is_empty());

        if let Some(existing) = self
            .store
            .find_for_payment(&payment.transaction_id, payment.plan_type)
            .await?
        {
            if let Some(wanted) = normalized {
                if existing.certificate_id != wanted {
                    if let Some(other) = self.store.find_certificate(&wanted).await? {
                        if other.certificate_id != existing.certificate_id {
                            return Err(ApiError::Conflict(
                                "Certificate ID already in use.".to_string(),
                            ));
                        }
                    }
                    self.store
                        .rename_certificate(&existing.certificate_id, &wanted)
                        .await?;
                    info!(
                        from = %existing.certificate_id,
                        to = %wanted,
                        "Certificate renamed"
                    );
                    let mut renamed = existing;
                    renamed.certificate_id = wanted;
                    return Ok(renamed);
                }
            }
            return Ok(existing);
        }

        let mut certificate_id = normalized.unwrap_or_else(generate_certificate_id);
        if self
            .store
            .find_certificate(&certificate_id)
            .await?
            .is_some()
        {
            certificate_id = generate_certificate_id();
        }

        let certificate = CertificateDoc {
            _id: None,
            metadata: Default::default(),
            certificate_id,
            email: payment.email.clone(),
            plan_type: payment.plan_type,
            course_slug: payment.course_slug.clone(),
            course_title,
            orientation: payment.certificate_orientation,
            status: CertificateStatus::Issued,
            payment_transaction_id: Some(payment.transaction_id.clone()),
        };

        let certificate = self.store.insert_certificate(certificate).await?;
        info!(
            certificate_id = %certificate.certificate_id,
            transaction_id = %payment.transaction_id,
            plan = payment.plan_type.as_str(),
            "Certificate issued"
        );
        Ok(certificate)
    }

    /// Fulfillment path: ensure the certificate and record an audit note.
    ///
    /// The certificate side is idempotent; the pending log entry is appended
    /// on every call, preserving the full audit trail of fulfillment runs.
    pub async fn issue_for_fulfillment(
        &self,
        payment: &PaymentDoc,
        course_title: Option<String>,
        note: &str,
    ) -> Result<CertificateDoc> {
        let certificate = self
            .ensure_certificate(payment, None, course_title)
            .await?;

        self.store
            .append_delivery_log(DeliveryLogDoc::new(
                &certificate.certificate_id,
                DeliveryStatus::Pending,
                doc! { "note": note },
            ))
            .await?;

        Ok(certificate)
    }

    fn payment_lock(&self, transaction_id: &str) -> Arc<Mutex<()>> {
        self.payment_locks
            .entry(transaction_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::PlanType;

    fn payment(transaction_id: &str, plan: PlanType) -> PaymentDoc {
        PaymentDoc {
            transaction_id: transaction_id.to_string(),
            plan_type: plan,
            name: "Aarav Kapoor".to_string(),
            email: "aarav@example.com".to_string(),
            ..Default::default()
        }
    }

    fn ledger() -> CertificateLedger {
        CertificateLedger::new(Arc::new(MemoryLedgerStore::new()))
    }

    #[tokio::test]
    async fn test_ensure_twice_is_idempotent() {
        let ledger = ledger();
        let payment = payment("TXN-1", PlanType::Basic);

        let first = ledger
            .ensure_certificate(&payment, None, None)
            .await
            .unwrap();
        let second = ledger
            .ensure_certificate(&payment, None, None)
            .await
            .unwrap();

        assert_eq!(first.certificate_id, second.certificate_id);
        assert_eq!(first.status, CertificateStatus::Issued);
    }

    #[tokio::test]
    async fn test_desired_id_is_normalized() {
        let ledger = ledger();
        let payment = payment("TXN-1", PlanType::Basic);

        let certificate = ledger
            .ensure_certificate(&payment, Some("cert-abc123"), None)
            .await
            .unwrap();

        assert_eq!(certificate.certificate_id, "CERT-ABC123");
    }

    #[tokio::test]
    async fn test_rename_to_taken_id_is_a_conflict() {
        let ledger = ledger();
        let first = payment("TXN-1", PlanType::Basic);
        let second = payment("TXN-2", PlanType::Basic);

        ledger
            .ensure_certificate(&first, Some("CERT-TAKEN01"), None)
            .await
            .unwrap();
        let original = ledger
            .ensure_certificate(&second, Some("CERT-MINE0001"), None)
            .await
            .unwrap();

        // Renaming the second certificate onto the first one's ID must fail
        let result = ledger
            .ensure_certificate(&second, Some("cert-taken01"), None)
            .await;
        assert!(matches!(result, Err(ApiError::Conflict(_))));

        // The original record is unchanged
        let unchanged = ledger
            .store()
            .find_certificate("CERT-MINE0001")
            .await
            .unwrap()
            .expect("certificate expected");
        assert_eq!(unchanged.certificate_id, original.certificate_id);
    }

    #[tokio::test]
    async fn test_rename_in_place_with_free_id() {
        let ledger = ledger();
        let payment = payment("TXN-1", PlanType::Industrial);

        ledger
            .ensure_certificate(&payment, None, None)
            .await
            .unwrap();
        let renamed = ledger
            .ensure_certificate(&payment, Some(" cert-new42 "), None)
            .await
            .unwrap();

        assert_eq!(renamed.certificate_id, "CERT-NEW42");
        assert!(ledger
            .store()
            .find_certificate("CERT-NEW42")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_desired_id_taken_on_create_falls_back_to_generated() {
        let ledger = ledger();
        let first = payment("TXN-1", PlanType::Basic);
        let second = payment("TXN-2", PlanType::Basic);

        ledger
            .ensure_certificate(&first, Some("CERT-SHARED01"), None)
            .await
            .unwrap();
        let certificate = ledger
            .ensure_certificate(&second, Some("CERT-SHARED01"), None)
            .await
            .unwrap();

        assert_ne!(certificate.certificate_id, "CERT-SHARED01");
        assert!(certificate.certificate_id.starts_with("CERT-"));
    }

    #[tokio::test]
    async fn test_same_payment_different_plan_gets_own_certificate() {
        let ledger = ledger();
        let basic = payment("TXN-1", PlanType::Basic);
        let mastery = payment("TXN-1", PlanType::Mastery);

        let a = ledger.ensure_certificate(&basic, None, None).await.unwrap();
        let b = ledger
            .ensure_certificate(&mastery, None, None)
            .await
            .unwrap();

        assert_ne!(a.certificate_id, b.certificate_id);
    }

    #[tokio::test]
    async fn test_concurrent_ensure_issues_one_certificate() {
        let ledger = Arc::new(ledger());
        let payment = payment("TXN-RACE", PlanType::Basic);

        let (a, b) = tokio::join!(
            ledger.ensure_certificate(&payment, None, None),
            ledger.ensure_certificate(&payment, None, None),
        );

        assert_eq!(a.unwrap().certificate_id, b.unwrap().certificate_id);
    }

    #[tokio::test]
    async fn test_fulfillment_appends_audit_note() {
        let ledger = ledger();
        let payment = payment("TXN-1", PlanType::Industrial);

        let certificate = ledger
            .issue_for_fulfillment(&payment, None, "Issued via fulfillment handler")
            .await
            .unwrap();

        let logs = ledger
            .store()
            .delivery_logs(&certificate.certificate_id)
            .await
            .unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, DeliveryStatus::Pending);
        assert_eq!(
            logs[0].detail.get_str("note").unwrap(),
            "Issued via fulfillment handler"
        );

        // Re-running fulfillment reuses the certificate but appends audit
        let again = ledger
            .issue_for_fulfillment(&payment, None, "Issued via fulfillment handler")
            .await
            .unwrap();
        assert_eq!(again.certificate_id, certificate.certificate_id);
        let logs = ledger
            .store()
            .delivery_logs(&certificate.certificate_id)
            .await
            .unwrap();
        assert_eq!(logs.len(), 2);
    }
}
