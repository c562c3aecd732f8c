//! Delivery scheduler
//!
//! Defers the certificate email by a fixed delay on a background task,
//! decoupled from the request that scheduled it. Jobs flow over an mpsc
//! channel into a long-lived dispatcher; each job sleeps out its delay on
//! its own task so a long delay never holds up the queue. Every outcome is
//! recorded as exactly one delivery-log entry; nothing here ever surfaces
//! to the scheduling request.

use std::sync::Arc;
use std::time::Duration;

use bson::doc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::db::schemas::{CertificateStatus, DeliveryLogDoc, DeliveryStatus};
use crate::ledger::LedgerStore;
use crate::mail::MailSender;
use crate::types::Result;

/// Trigger tag recorded on scheduled-delivery log entries
const TRIGGER: &str = "auto-issue-delayed";

/// A scheduled certificate email
#[derive(Debug, Clone)]
pub struct DeliveryJob {
    pub certificate_id: String,
    pub recipient: String,
    pub student_name: String,
    pub course_title: String,
    pub plan_label: String,
    pub verify_url: String,
    pub download_url: String,
    pub support_phone: String,
    pub delay: Duration,
}

/// Handle for enqueueing deferred deliveries
#[derive(Clone)]
pub struct DeliveryScheduler {
    tx: mpsc::Sender<DeliveryJob>,
    store: Arc<dyn LedgerStore>,
}

impl DeliveryScheduler {
    /// Spawn the dispatcher task and return the scheduling handle
    pub fn spawn(
        store: Arc<dyn LedgerStore>,
        mailer: Arc<dyn MailSender>,
        queue_size: usize,
    ) -> Self {
        let (tx, mut rx) = mpsc::channel::<DeliveryJob>(queue_size);

        let dispatcher_store = Arc::clone(&store);
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let store = Arc::clone(&dispatcher_store);
                let mailer = Arc::clone(&mailer);
                tokio::spawn(async move {
                    process_job(store, mailer, job).await;
                });
            }
            info!("Delivery dispatcher shutting down (channel closed)");
        });

        Self { tx, store }
    }

    /// Enqueue a job; returns once it is queued, never waits for the send.
    ///
    /// A full queue is recorded as a failed delivery so the audit trail
    /// still gets exactly one entry for the job.
    pub async fn schedule(&self, job: DeliveryJob) -> Result<()> {
        let certificate_id = job.certificate_id.clone();
        if let Err(e) = self.tx.try_send(job) {
            warn!(
                certificate_id = %certificate_id,
                "Delivery queue rejected job: {}",
                e
            );
            self.store
                .append_delivery_log(DeliveryLogDoc::new(
                    &certificate_id,
                    DeliveryStatus::Failed,
                    doc! { "trigger": TRIGGER, "reason": "delivery queue full" },
                ))
                .await?;
        }
        Ok(())
    }
}

/// Run a single delivery job to completion
///
/// All failures are recovered locally as `failed` log entries.
async fn process_job(store: Arc<dyn LedgerStore>, mailer: Arc<dyn MailSender>, job: DeliveryJob) {
    tokio::time::sleep(job.delay).await;

    // Re-read the certificate at fire time: a certificate revoked while the
    // job was pending must not be emailed out
    let certificate = match store.find_certificate(&job.certificate_id).await {
        Ok(c) => c,
        Err(e) => {
            error!(
                certificate_id = %job.certificate_id,
                "Delivery lookup failed: {}",
                e
            );
            append_log(
                &store,
                &job.certificate_id,
                DeliveryStatus::Failed,
                doc! { "trigger": TRIGGER, "reason": format!("certificate lookup failed: {}", e) },
            )
            .await;
            return;
        }
    };

    let reason = match certificate {
        None => Some("certificate not found".to_string()),
        Some(ref c) if c.status != CertificateStatus::Issued => {
            Some("certificate no longer issued".to_string())
        }
        Some(_) => None,
    };

    if let Some(reason) = reason {
        warn!(
            certificate_id = %job.certificate_id,
            reason = %reason,
            "Scheduled delivery suppressed"
        );
        append_log(
            &store,
            &job.certificate_id,
            DeliveryStatus::Failed,
            doc! { "trigger": TRIGGER, "reason": reason },
        )
        .await;
        return;
    }

    let subject = "Your Laurea Certificate";
    let body = compose_certificate_email(&job);

    match mailer.send(&job.recipient, subject, &body).await {
        Ok(()) => {
            info!(
                certificate_id = %job.certificate_id,
                recipient = %job.recipient,
                "Certificate email sent"
            );
            append_log(
                &store,
                &job.certificate_id,
                DeliveryStatus::Sent,
                doc! { "trigger": TRIGGER },
            )
            .await;
        }
        Err(e) => {
            warn!(
                certificate_id = %job.certificate_id,
                recipient = %job.recipient,
                "Certificate email failed: {}",
                e
            );
            append_log(
                &store,
                &job.certificate_id,
                DeliveryStatus::Failed,
                doc! { "trigger": TRIGGER, "reason": e.to_string() },
            )
            .await;
        }
    }
}

async fn append_log(
    store: &Arc<dyn LedgerStore>,
    certificate_id: &str,
    status: DeliveryStatus,
    detail: bson::Document,
) {
    if let Err(e) = store
        .append_delivery_log(DeliveryLogDoc::new(certificate_id, status, detail))
        .await
    {
        error!(
            certificate_id = %certificate_id,
            "Failed to record delivery log: {}",
            e
        );
    }
}

/// Compose the certificate email body
fn compose_certificate_email(job: &DeliveryJob) -> String {
    format!(
        "Dear {name},\n\n\
         Congratulations! Your Laurea credential has been issued.\n\n\
         Certificate ID: {certificate_id}\n\
         Course: {course}\n\
         Plan: {plan}\n\n\
         You can verify your certificate at:\n{verify}\n\n\
         You can download your certificate PDF from:\n{download}\n\n\
         If you need any support help, call us at {phone}.\n\n\
         If you did not request this credential, please contact support immediately.\n\n\
         Regards,\nLaurea Certification Desk",
        name = job.student_name,
        certificate_id = job.certificate_id,
        course = job.course_title,
        plan = job.plan_label,
        verify = job.verify_url,
        download = job.download_url,
        phone = job.support_phone,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::{CertificateDoc, PlanType};
    use crate::ledger::MemoryLedgerStore;
    use crate::mail::{MailError, MailSender};
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    struct MockMailer {
        sent: Mutex<Vec<(String, String)>>,
        fail_with: Option<String>,
    }

    impl MockMailer {
        fn working() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail_with: None,
            }
        }

        fn failing(reason: &str) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail_with: Some(reason.to_string()),
            }
        }
    }

    #[async_trait]
    impl MailSender for MockMailer {
        async fn send(
            &self,
            recipient: &str,
            subject: &str,
            _body: &str,
        ) -> std::result::Result<(), MailError> {
            if let Some(ref reason) = self.fail_with {
                return Err(MailError::Transport(reason.clone()));
            }
            let mut sent = self.sent.lock().await;
            sent.push((recipient.to_string(), subject.to_string()));
            Ok(())
        }
    }

    fn issued_certificate(id: &str) -> CertificateDoc {
        CertificateDoc {
            certificate_id: id.to_string(),
            email: "holder@example.com".to_string(),
            plan_type: PlanType::Basic,
            status: CertificateStatus::Issued,
            ..Default::default()
        }
    }

    fn job(id: &str, delay_ms: u64) -> DeliveryJob {
        DeliveryJob {
            certificate_id: id.to_string(),
            recipient: "holder@example.com".to_string(),
            student_name: "Aarav Kapoor".to_string(),
            course_title: "Data Science & AI".to_string(),
            plan_label: "Basic".to_string(),
            verify_url: "https://certs.example.com/verify?certificateId=X".to_string(),
            download_url: "https://certs.example.com/certificate/pdf?certificateId=X".to_string(),
            support_phone: "+91-9113750231".to_string(),
            delay: Duration::from_millis(delay_ms),
        }
    }

    async fn wait_for_logs(
        store: &Arc<dyn LedgerStore>,
        certificate_id: &str,
        expected: usize,
    ) -> Vec<DeliveryLogDoc> {
        for _ in 0..100 {
            let logs = store.delivery_logs(certificate_id).await.unwrap();
            if logs.len() >= expected {
                return logs;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        store.delivery_logs(certificate_id).await.unwrap()
    }

    #[tokio::test]
    async fn test_zero_delay_delivery_appends_exactly_one_sent_log() {
        let store: Arc<dyn LedgerStore> = Arc::new(MemoryLedgerStore::new());
        store
            .insert_certificate(issued_certificate("CERT-AB12CD34EF"))
            .await
            .unwrap();

        let scheduler = DeliveryScheduler::spawn(
            Arc::clone(&store),
            Arc::new(MockMailer::working()),
            16,
        );
        scheduler.schedule(job("CERT-AB12CD34EF", 0)).await.unwrap();

        let logs = wait_for_logs(&store, "CERT-AB12CD34EF", 1).await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, DeliveryStatus::Sent);
        assert_eq!(logs[0].detail.get_str("trigger").unwrap(), TRIGGER);

        // Never duplicated
        tokio::time::sleep(Duration::from_millis(50)).await;
        let logs = store.delivery_logs("CERT-AB12CD34EF").await.unwrap();
        assert_eq!(logs.len(), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_is_recorded_with_reason() {
        let store: Arc<dyn LedgerStore> = Arc::new(MemoryLedgerStore::new());
        store
            .insert_certificate(issued_certificate("CERT-AB12CD34EF"))
            .await
            .unwrap();

        let scheduler = DeliveryScheduler::spawn(
            Arc::clone(&store),
            Arc::new(MockMailer::failing("relay unreachable")),
            16,
        );
        scheduler.schedule(job("CERT-AB12CD34EF", 0)).await.unwrap();

        let logs = wait_for_logs(&store, "CERT-AB12CD34EF", 1).await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, DeliveryStatus::Failed);
        assert_eq!(logs[0].detail.get_str("reason").unwrap(), "relay unreachable");
    }

    #[tokio::test]
    async fn test_revocation_while_pending_suppresses_the_send() {
        let store: Arc<dyn LedgerStore> = Arc::new(MemoryLedgerStore::new());
        store
            .insert_certificate(issued_certificate("CERT-AB12CD34EF"))
            .await
            .unwrap();

        let scheduler = DeliveryScheduler::spawn(
            Arc::clone(&store),
            Arc::new(MockMailer::working()),
            16,
        );
        scheduler.schedule(job("CERT-AB12CD34EF", 100)).await.unwrap();

        // Revoke before the delay elapses
        store
            .update_certificate("CERT-AB12CD34EF", None, Some(CertificateStatus::Revoked))
            .await
            .unwrap();

        let logs = wait_for_logs(&store, "CERT-AB12CD34EF", 1).await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, DeliveryStatus::Failed);
        assert_eq!(
            logs[0].detail.get_str("reason").unwrap(),
            "certificate no longer issued"
        );
    }

    #[test]
    fn test_email_body_carries_the_essentials() {
        let body = compose_certificate_email(&job("CERT-AB12CD34EF", 0));
        assert!(body.contains("CERT-AB12CD34EF"));
        assert!(body.contains("Data Science & AI"));
        assert!(body.contains("Basic"));
        assert!(body.contains("https://certs.example.com/verify?certificateId=X"));
        assert!(body.contains("https://certs.example.com/certificate/pdf?certificateId=X"));
        assert!(body.contains("+91-9113750231"));
    }
}
