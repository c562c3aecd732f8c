//! Certificate verification
//!
//! Resolves a certificate ID to public-safe holder details. The endpoint is
//! intentionally unauthenticated; the certificate ID is the capability
//! token. Building the result is pure; the route supplies the records.

use chrono::Duration;
use serde::Serialize;

use crate::db::schemas::{CertificateDoc, CertificateStatus, PaymentDoc, PlanType};

/// Width of the display window shown next to the award date
const DISPLAY_WINDOW_DAYS: i64 = 90;

/// Public verification response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub certificate_id: String,
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holder: Option<HolderDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orientation: Option<&'static str>,
}

/// Public-safe holder block
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HolderDetails {
    pub name: Option<String>,
    pub email: String,
    pub plan_type: &'static str,
    pub course: Option<String>,
    pub awarded_on: String,
    pub college: Option<String>,
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_period: Option<&'static str>,
    /// Display approximation, not the payment's actual validity window
    pub start_date: String,
    pub end_date: String,
}

/// Derived program length string per plan tier
pub fn time_period(plan: PlanType) -> Option<&'static str> {
    match plan {
        PlanType::Industrial => Some("3 months (120 hours)"),
        PlanType::Mastery => Some("6 months (240 hours)"),
        PlanType::Basic => None,
    }
}

/// Build the verification result for a lookup.
///
/// `certificate` is the (case-insensitive) match for the submitted ID,
/// `payment` its linked payment when one exists. Holder details prefer the
/// payment's records and fall back to the certificate's own email.
pub fn build_verification(
    submitted_id: &str,
    certificate: Option<&CertificateDoc>,
    payment: Option<&PaymentDoc>,
) -> VerificationResult {
    let Some(certificate) = certificate else {
        return VerificationResult {
            certificate_id: submitted_id.to_string(),
            verified: false,
            message: Some("Certificate not found.".to_string()),
            holder: None,
            orientation: None,
        };
    };

    let awarded_date = certificate.metadata.created_date();
    let window_start = awarded_date - Duration::days(DISPLAY_WINDOW_DAYS);

    let holder = HolderDetails {
        name: payment.map(|p| p.name.clone()),
        email: payment
            .map(|p| p.email.clone())
            .unwrap_or_else(|| certificate.email.clone()),
        plan_type: certificate.plan_type.as_str(),
        course: certificate.course_title.clone(),
        awarded_on: awarded_date.to_string(),
        college: payment.map(|p| p.college_name.clone()),
        transaction_id: payment.map(|p| p.transaction_id.clone()),
        time_period: time_period(certificate.plan_type),
        start_date: window_start.to_string(),
        end_date: awarded_date.to_string(),
    };

    VerificationResult {
        certificate_id: certificate.certificate_id.clone(),
        verified: certificate.status == CertificateStatus::Issued,
        message: None,
        holder: Some(holder),
        orientation: Some(certificate.orientation.as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::{Metadata, Orientation};

    fn certificate(plan: PlanType, status: CertificateStatus) -> CertificateDoc {
        CertificateDoc {
            certificate_id: "CERT-AB12CD34EF".to_string(),
            email: "holder@example.com".to_string(),
            plan_type: plan,
            course_title: Some("Data Science & AI".to_string()),
            orientation: Orientation::Horizontal,
            status,
            payment_transaction_id: Some("TXN-1".to_string()),
            metadata: Metadata::new(),
            ..Default::default()
        }
    }

    fn payment() -> PaymentDoc {
        PaymentDoc {
            transaction_id: "TXN-1".to_string(),
            name: "Aarav Kapoor".to_string(),
            email: "aarav@example.com".to_string(),
            college_name: "NIT Surat".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_unknown_id_is_not_verified_and_has_no_holder() {
        let result = build_verification("CERT-MISSING00", None, None);
        assert!(!result.verified);
        assert_eq!(result.message.as_deref(), Some("Certificate not found."));
        assert!(result.holder.is_none());
        assert!(result.orientation.is_none());
        assert_eq!(result.certificate_id, "CERT-MISSING00");
    }

    #[test]
    fn test_issued_certificate_verifies_with_payment_details() {
        let cert = certificate(PlanType::Industrial, CertificateStatus::Issued);
        let payment = payment();
        let result = build_verification("cert-ab12cd34ef", Some(&cert), Some(&payment));

        assert!(result.verified);
        let holder = result.holder.unwrap();
        assert_eq!(holder.name.as_deref(), Some("Aarav Kapoor"));
        assert_eq!(holder.email, "aarav@example.com");
        assert_eq!(holder.college.as_deref(), Some("NIT Surat"));
        assert_eq!(holder.transaction_id.as_deref(), Some("TXN-1"));
        assert_eq!(holder.time_period, Some("3 months (120 hours)"));
        assert_eq!(result.orientation, Some("horizontal"));
    }

    #[test]
    fn test_revoked_certificate_is_not_verified_but_resolves() {
        let cert = certificate(PlanType::Basic, CertificateStatus::Revoked);
        let result = build_verification("CERT-AB12CD34EF", Some(&cert), None);

        assert!(!result.verified);
        assert!(result.holder.is_some());
    }

    #[test]
    fn test_holder_email_falls_back_to_certificate() {
        let cert = certificate(PlanType::Basic, CertificateStatus::Issued);
        let result = build_verification("CERT-AB12CD34EF", Some(&cert), None);

        let holder = result.holder.unwrap();
        assert_eq!(holder.email, "holder@example.com");
        assert!(holder.name.is_none());
        assert!(holder.time_period.is_none());
    }

    #[test]
    fn test_display_window_is_ninety_days_ending_on_award() {
        let cert = certificate(PlanType::Mastery, CertificateStatus::Issued);
        let awarded = cert.metadata.created_date();
        let result = build_verification("CERT-AB12CD34EF", Some(&cert), None);

        let holder = result.holder.unwrap();
        assert_eq!(holder.end_date, awarded.to_string());
        assert_eq!(
            holder.start_date,
            (awarded - Duration::days(90)).to_string()
        );
        assert_eq!(holder.awarded_on, awarded.to_string());
    }

    #[test]
    fn test_time_period_mapping() {
        assert_eq!(time_period(PlanType::Basic), None);
        assert_eq!(time_period(PlanType::Industrial), Some("3 months (120 hours)"));
        assert_eq!(time_period(PlanType::Mastery), Some("6 months (240 hours)"));
    }
}
