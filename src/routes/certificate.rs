//! Certificate issuance, fulfillment, rendering, verification, and recovery

use bson::doc;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::db::schemas::{
    CourseDoc, DeliveryLogDoc, DeliveryStatus, PaymentDoc, PaymentStatus, PlanType,
    COURSE_COLLECTION, PAYMENT_COLLECTION,
};
use crate::delivery::DeliveryJob;
use crate::plans;
use crate::server::AppState;
use crate::types::{ApiError, Result};
use crate::verification;

use super::{read_json, respond};

/// Course title used when a payment has no linked course
const DEFAULT_COURSE_TITLE: &str = "Certified Track";

/// Force an https scheme onto bare URLs
fn ensure_scheme(url: &str) -> String {
    let lowered = url.to_lowercase();
    if lowered.starts_with("http://") || lowered.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{}", url.trim_start_matches('/'))
    }
}

fn parse_iso_date(value: &str) -> Option<chrono::NaiveDate> {
    chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

async fn find_payment(state: &AppState, transaction_id: &str) -> Result<PaymentDoc> {
    let mongo = state.mongo()?;
    mongo
        .collection::<PaymentDoc>(PAYMENT_COLLECTION)
        .await?
        .find_one(doc! { "transaction_id": transaction_id })
        .await?
        .ok_or_else(|| ApiError::NotFound("Payment not found.".to_string()))
}

async fn course_title_for(state: &AppState, payment: &PaymentDoc) -> Result<Option<String>> {
    let Some(slug) = payment.course_slug.as_deref() else {
        return Ok(None);
    };
    let Some(ref mongo) = state.mongo else {
        return Ok(None);
    };

    Ok(mongo
        .collection::<CourseDoc>(COURSE_COLLECTION)
        .await?
        .find_one(doc! { "slug": slug })
        .await?
        .map(|c| c.title))
}

async fn mark_paid(state: &AppState, payment: &PaymentDoc) -> Result<()> {
    if payment.status == PaymentStatus::Paid {
        return Ok(());
    }
    let mongo = state.mongo()?;
    mongo
        .collection::<PaymentDoc>(PAYMENT_COLLECTION)
        .await?
        .update_one(
            doc! { "transaction_id": &payment.transaction_id },
            doc! {
                "$set": {
                    "status": PaymentStatus::Paid.as_str(),
                    "metadata.updated_at": bson::DateTime::now(),
                }
            },
        )
        .await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueRequest {
    #[serde(default)]
    transaction_id: String,
}

/// Handle POST /api/certificate/issue
///
/// Marks the payment paid, idempotently resolves its certificate, and
/// schedules the delayed certificate email. The certificate is ensured
/// before the paid status becomes visible, so a reader never observes a
/// paid payment without its certificate.
pub async fn issue_certificate(state: Arc<AppState>, req: Request<Incoming>) -> Response<Full<Bytes>> {
    respond(issue_certificate_inner(state, req).await)
}

async fn issue_certificate_inner(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Result<serde_json::Value> {
    let payload: IssueRequest = read_json(req).await?;
    if payload.transaction_id.is_empty() {
        return Err(ApiError::Validation("transactionId is required.".to_string()));
    }

    let payment = find_payment(&state, &payload.transaction_id).await?;
    let course_title = course_title_for(&state, &payment).await?;
    let display_title = course_title
        .clone()
        .unwrap_or_else(|| DEFAULT_COURSE_TITLE.to_string());

    let certificate = state
        .ledger
        .ensure_certificate(&payment, None, course_title)
        .await?;
    mark_paid(&state, &payment).await?;

    let verify_url = ensure_scheme(&format!(
        "{}?certificateId={}",
        state.args.verify_page_url(),
        certificate.certificate_id
    ));
    let download_url = ensure_scheme(&format!(
        "{}?certificateId={}",
        state.args.download_page_url(),
        certificate.certificate_id
    ));

    let award_date = payment
        .start_date
        .unwrap_or_else(|| chrono::Utc::now().date_naive());

    let policy = plans::resolve_policy(state.mongo.as_ref(), payment.plan_type).await;

    // Delivery is off the critical path: a scheduling hiccup is logged,
    // never surfaced to the issuing request
    if let Err(e) = state
        .scheduler
        .schedule(DeliveryJob {
            certificate_id: certificate.certificate_id.clone(),
            recipient: payment.email.clone(),
            student_name: payment.name.clone(),
            course_title: display_title.clone(),
            plan_label: policy.label.clone(),
            verify_url: verify_url.clone(),
            download_url,
            support_phone: state.args.support_phone.clone(),
            delay: Duration::from_secs(state.args.delivery_delay_secs),
        })
        .await
    {
        warn!(
            certificate_id = %certificate.certificate_id,
            "Failed to schedule certificate delivery: {}",
            e
        );
    }

    let project_title = payment
        .extra
        .get_str("projectTitle")
        .ok()
        .filter(|s| !s.is_empty());

    Ok(json!({
        "certificateId": certificate.certificate_id,
        "studentName": payment.name,
        "courseTitle": display_title,
        "projectTitle": project_title,
        "awardDate": award_date.to_string(),
        "qrPayload": verify_url,
        "planType": payment.plan_type.as_str(),
        "orientation": payment.certificate_orientation.as_str(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FulfillmentRequest {
    #[serde(default)]
    transaction_id: String,
    #[serde(default)]
    project_description: String,
}

/// Handle POST /api/fulfillment/progress
///
/// Converts a project-verified payment into an issued certificate.
pub async fn fulfillment_progress(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    respond(fulfillment_progress_inner(state, req).await)
}

async fn fulfillment_progress_inner(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Result<serde_json::Value> {
    let payload: FulfillmentRequest = read_json(req).await?;
    if payload.transaction_id.is_empty() {
        return Err(ApiError::Validation("transactionId is required.".to_string()));
    }

    let payment = find_payment(&state, &payload.transaction_id).await?;
    let policy = plans::resolve_policy(state.mongo.as_ref(), payment.plan_type).await;

    let project_description = payload.project_description.trim().to_string();
    if policy.requires_project && project_description.len() < 20 {
        return Err(ApiError::Validation(
            "Project description must be at least 20 characters.".to_string(),
        ));
    }

    let course_title = course_title_for(&state, &payment).await?;
    let certificate = state
        .ledger
        .issue_for_fulfillment(&payment, course_title, "Issued via fulfillment handler")
        .await?;

    let mongo = state.mongo()?;
    mongo
        .collection::<PaymentDoc>(PAYMENT_COLLECTION)
        .await?
        .update_one(
            doc! { "transaction_id": &payment.transaction_id },
            doc! {
                "$set": {
                    "status": PaymentStatus::Paid.as_str(),
                    "extra.projectDescription": &project_description,
                    "metadata.updated_at": bson::DateTime::now(),
                }
            },
        )
        .await?;

    let message = if policy.requires_project {
        "Project verified. Download unlocked."
    } else {
        "Certificate ready for download."
    };

    Ok(json!({
        "planType": payment.plan_type.as_str(),
        "downloadAvailable": true,
        "message": message,
        "certificateId": certificate.certificate_id,
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenderOverrides {
    #[serde(default)]
    student_name: Option<String>,
    #[serde(default)]
    course_title: Option<String>,
    #[serde(default)]
    award_date: Option<String>,
    #[serde(default)]
    qr_payload: Option<String>,
    #[serde(default)]
    certificate_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenderRequest {
    #[serde(default)]
    transaction_id: String,
    #[serde(default)]
    overrides: Option<RenderOverrides>,
}

/// Handle POST /api/certificate/basic/render
///
/// Returns the field payload the frontend renders a basic certificate
/// from, persisting any operator overrides on the payment.
pub async fn render_basic_certificate(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    respond(render_basic_certificate_inner(state, req).await)
}

async fn render_basic_certificate_inner(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Result<serde_json::Value> {
    let payload: RenderRequest = read_json(req).await?;
    let transaction_id = payload.transaction_id.trim().to_string();
    if transaction_id.is_empty() {
        return Err(ApiError::Validation("transactionId is required.".to_string()));
    }

    let mut payment = find_payment(&state, &transaction_id).await?;
    if payment.plan_type != PlanType::Basic {
        return Err(ApiError::Validation(
            "Only basic plan certificates can be rendered with this endpoint.".to_string(),
        ));
    }

    let overrides = payload.overrides.unwrap_or_default();

    let mut dirty = doc! {};

    if let Some(name) = overrides
        .student_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        payment.name = name.to_string();
        dirty.insert("name", name);
    }

    // basicCertificate block inside the payment's free-form context
    let mut cert_meta = payment
        .extra
        .get_document("basicCertificate")
        .map(|d| d.clone())
        .unwrap_or_default();

    if let Some(title) = overrides.course_title.as_deref().filter(|s| !s.is_empty()) {
        cert_meta.insert("courseTitle", title.trim());
    }

    if let Some(raw) = overrides.award_date.as_deref().filter(|s| !s.is_empty()) {
        let parsed = parse_iso_date(raw).ok_or_else(|| {
            ApiError::Validation("awardDate must be provided in YYYY-MM-DD format.".to_string())
        })?;
        cert_meta.insert("awardDate", parsed.to_string());
    }

    if let Some(qr) = overrides.qr_payload.as_deref().filter(|s| !s.is_empty()) {
        cert_meta.insert("qrPayload", qr.trim());
    }

    if cert_meta.get_str("courseTitle").is_err() {
        let default_title = course_title_for(&state, &payment)
            .await?
            .unwrap_or_else(|| DEFAULT_COURSE_TITLE.to_string());
        cert_meta.insert("courseTitle", default_title);
    }
    let course_title = cert_meta.get_str("courseTitle").unwrap_or_default().to_string();

    if cert_meta.get_str("awardDate").is_err() {
        cert_meta.insert("awardDate", chrono::Utc::now().date_naive().to_string());
    }
    let award_date = cert_meta.get_str("awardDate").unwrap_or_default().to_string();

    let certificate = state
        .ledger
        .ensure_certificate(
            &payment,
            overrides.certificate_id.as_deref(),
            Some(course_title.clone()),
        )
        .await?;

    if cert_meta.get_str("qrPayload").is_err() {
        cert_meta.insert(
            "qrPayload",
            format!(
                "{}?certificateId={}",
                state.args.verify_page_url(),
                certificate.certificate_id
            ),
        );
    }
    let qr_payload = cert_meta.get_str("qrPayload").unwrap_or_default().to_string();

    dirty.insert("extra.basicCertificate", cert_meta);
    dirty.insert("metadata.updated_at", bson::DateTime::now());

    let mongo = state.mongo()?;
    mongo
        .collection::<PaymentDoc>(PAYMENT_COLLECTION)
        .await?
        .update_one(
            doc! { "transaction_id": &transaction_id },
            doc! { "$set": dirty },
        )
        .await?;

    let size = plans::plan_size(payment.plan_type);

    Ok(json!({
        "status": "ready",
        "transactionId": payment.transaction_id,
        "planType": payment.plan_type.as_str(),
        "planSize": size.size,
        "planDisplay": size.display,
        "certificate": {
            "studentName": payment.name,
            "courseTitle": course_title,
            "certificateId": certificate.certificate_id,
            "awardDate": award_date,
            "qrPayload": qr_payload,
            "orientation": payment.certificate_orientation.as_str(),
        },
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyRequest {
    #[serde(default)]
    certificate_id: String,
}

/// Handle POST /api/verify
///
/// Public, unauthenticated; the certificate ID is the capability token.
pub async fn verify_certificate(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    respond(verify_certificate_inner(state, req).await)
}

async fn verify_certificate_inner(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Result<verification::VerificationResult> {
    let payload: VerifyRequest = read_json(req).await?;
    let submitted = payload.certificate_id.trim().to_string();
    if submitted.is_empty() {
        return Err(ApiError::Validation("certificateId is required.".to_string()));
    }

    let certificate = state.ledger.store().find_certificate(&submitted).await?;

    let payment = match certificate
        .as_ref()
        .and_then(|c| c.payment_transaction_id.as_deref())
    {
        Some(transaction_id) => match state.mongo.as_ref() {
            Some(mongo) => {
                mongo
                    .collection::<PaymentDoc>(PAYMENT_COLLECTION)
                    .await?
                    .find_one(doc! { "transaction_id": transaction_id })
                    .await?
            }
            None => None,
        },
        None => None,
    };

    Ok(verification::build_verification(
        &submitted,
        certificate.as_ref(),
        payment.as_ref(),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecoverRequest {
    #[serde(default)]
    email: String,
}

/// Handle POST /api/recover
///
/// Emails the latest issued certificate reference for an address. The
/// response never reveals whether a certificate exists.
pub async fn recover_certificate(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    respond(recover_certificate_inner(state, req).await)
}

async fn recover_certificate_inner(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Result<serde_json::Value> {
    let payload: RecoverRequest = read_json(req).await?;
    let email = payload.email.trim().to_string();
    if email.is_empty() {
        return Err(ApiError::Validation("Email is required.".to_string()));
    }

    let Some(certificate) = state.ledger.store().latest_issued_for_email(&email).await? else {
        return Ok(json!({
            "status": "queued",
            "message": "If a certificate exists for this email, it will be sent shortly.",
            "email": email,
        }));
    };

    let body = format!(
        "Dear learner,\n\nHere is the reference for certificate {}.\n\n\
         For changes or help, call us at {}.",
        certificate.certificate_id, state.args.support_phone
    );

    let store = state.ledger.store();
    let (status, message) = match state
        .mailer
        .send(&email, "Your Fast-Track Certificate", &body)
        .await
    {
        Ok(()) => {
            info!(
                certificate_id = %certificate.certificate_id,
                "Recovery email dispatched"
            );
            store
                .append_delivery_log(DeliveryLogDoc::new(
                    &certificate.certificate_id,
                    DeliveryStatus::Sent,
                    doc! { "trigger": "self-recovery" },
                ))
                .await?;
            (
                "dispatched",
                "Certificate emailed to the requested address.".to_string(),
            )
        }
        Err(e) => {
            store
                .append_delivery_log(DeliveryLogDoc::new(
                    &certificate.certificate_id,
                    DeliveryStatus::Failed,
                    doc! { "trigger": "self-recovery", "reason": e.to_string() },
                ))
                .await?;
            ("queued", format!("Email queued: {}", e))
        }
    };

    Ok(json!({
        "status": status,
        "message": message,
        "email": email,
        "certificateId": certificate.certificate_id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_scheme() {
        assert_eq!(
            ensure_scheme("https://certs.example.com/verify"),
            "https://certs.example.com/verify"
        );
        assert_eq!(
            ensure_scheme("http://localhost:5173/verify"),
            "http://localhost:5173/verify"
        );
        assert_eq!(
            ensure_scheme("certs.example.com/verify"),
            "https://certs.example.com/verify"
        );
        assert_eq!(
            ensure_scheme("/verify?certificateId=X"),
            "https://verify?certificateId=X"
        );
    }

    #[test]
    fn test_parse_iso_date() {
        assert!(parse_iso_date("2025-06-30").is_some());
        assert!(parse_iso_date("30/06/2025").is_none());
        assert!(parse_iso_date("not-a-date").is_none());
    }
}
