//! Admin panel routes
//!
//! Password login issues a short-lived token; every other admin endpoint
//! requires it in the `X-Admin-Auth` header.

use bson::doc;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{header::HeaderMap, Method, Request, Response};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth;
use crate::db::schemas::{
    CertificateStatus, DeliveryLogDoc, DeliveryStatus, PaymentDoc, PAYMENT_COLLECTION,
};
use crate::server::AppState;
use crate::types::{ApiError, Result};

use super::{read_json, respond};

/// Most recent records returned by the list endpoints
const LIST_LIMIT: i64 = 200;

fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<()> {
    let token = headers
        .get("X-Admin-Auth")
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;

    auth::validate_admin_token(&state.args.admin_secret(), token)
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    #[serde(default)]
    password: String,
}

/// Handle POST /api/admin/login
pub async fn admin_login(state: Arc<AppState>, req: Request<Incoming>) -> Response<Full<Bytes>> {
    respond(admin_login_inner(state, req).await)
}

async fn admin_login_inner(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Result<serde_json::Value> {
    let payload: LoginRequest = read_json(req).await?;

    let expected = state
        .args
        .admin_panel_password
        .as_deref()
        .ok_or(ApiError::Unauthorized)?;
    if payload.password.is_empty() || payload.password != expected {
        warn!("Admin login rejected");
        return Err(ApiError::Unauthorized);
    }

    let token = auth::issue_admin_token(
        &state.args.admin_secret(),
        state.args.admin_token_ttl_seconds,
    )?;
    info!("Admin session issued");

    Ok(json!({
        "token": token,
        "expiresIn": state.args.admin_token_ttl_seconds,
    }))
}

/// Handle GET/PATCH /api/admin/payments
pub async fn admin_payments(state: Arc<AppState>, req: Request<Incoming>) -> Response<Full<Bytes>> {
    respond(admin_payments_inner(state, req).await)
}

async fn admin_payments_inner(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Result<serde_json::Value> {
    require_admin(&state, req.headers())?;

    let mongo = state.mongo()?;
    let payments = mongo.collection::<PaymentDoc>(PAYMENT_COLLECTION).await?;

    if req.method() == Method::GET {
        let docs = payments
            .find_many_with(
                doc! {},
                Some(doc! { "metadata.created_at": -1 }),
                Some(LIST_LIMIT),
            )
            .await?;

        let rows: Vec<serde_json::Value> = docs
            .iter()
            .map(|p| {
                json!({
                    "transactionId": p.transaction_id,
                    "planType": p.plan_type.as_str(),
                    "email": p.email,
                    "name": p.name,
                    "phone": p.phone,
                    "course": p.course_slug,
                    "status": p.status.as_str(),
                    "amount": p.amount,
                    "orientation": p.certificate_orientation.as_str(),
                    "startDate": p.start_date.map(|d| d.to_string()),
                    "endDate": p.end_date.map(|d| d.to_string()),
                })
            })
            .collect();

        return Ok(json!({ "payments": rows }));
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct PatchRequest {
        #[serde(default)]
        transaction_id: String,
        #[serde(default)]
        email: Option<String>,
        #[serde(default)]
        phone: Option<String>,
        #[serde(default)]
        college_name: Option<String>,
        #[serde(default)]
        semester: Option<String>,
        #[serde(default)]
        certificate_orientation: Option<String>,
    }

    let payload: PatchRequest = read_json(req).await?;
    if payload.transaction_id.is_empty() {
        return Err(ApiError::Validation("transactionId is required.".to_string()));
    }

    payments
        .find_one(doc! { "transaction_id": &payload.transaction_id })
        .await?
        .ok_or_else(|| ApiError::NotFound("Payment not found.".to_string()))?;

    let mut set = doc! {};
    if let Some(ref email) = payload.email {
        set.insert("email", email);
    }
    if let Some(ref phone) = payload.phone {
        set.insert("phone", phone);
    }
    if let Some(ref college) = payload.college_name {
        set.insert("college_name", college);
    }
    if let Some(ref semester) = payload.semester {
        set.insert("semester", semester);
    }
    if let Some(ref orientation) = payload.certificate_orientation {
        let parsed = crate::db::schemas::Orientation::parse(orientation)
            .ok_or_else(|| ApiError::Validation("Invalid certificate orientation.".to_string()))?;
        set.insert("certificate_orientation", parsed.as_str());
    }

    if !set.is_empty() {
        set.insert("metadata.updated_at", bson::DateTime::now());
        payments
            .update_one(
                doc! { "transaction_id": &payload.transaction_id },
                doc! { "$set": set },
            )
            .await?;
    }

    Ok(json!({ "status": "updated" }))
}

/// Handle GET/PATCH /api/admin/certificates
pub async fn admin_certificates(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    respond(admin_certificates_inner(state, req).await)
}

async fn admin_certificates_inner(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Result<serde_json::Value> {
    require_admin(&state, req.headers())?;

    let store = state.ledger.store();

    if req.method() == Method::GET {
        let certificates = store.list_recent(LIST_LIMIT).await?;
        let rows: Vec<serde_json::Value> = certificates
            .iter()
            .map(|c| {
                json!({
                    "certificateId": c.certificate_id,
                    "email": c.email,
                    "planType": c.plan_type.as_str(),
                    "course": c.course_title,
                    "status": c.status.as_str(),
                    "orientation": c.orientation.as_str(),
                    "transactionId": c.payment_transaction_id,
                })
            })
            .collect();

        return Ok(json!({ "certificates": rows }));
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct PatchRequest {
        #[serde(default)]
        certificate_id: String,
        #[serde(default)]
        email: Option<String>,
        #[serde(default)]
        status: Option<String>,
    }

    let payload: PatchRequest = read_json(req).await?;
    if payload.certificate_id.is_empty() {
        return Err(ApiError::Validation("certificateId is required.".to_string()));
    }

    store
        .find_certificate(&payload.certificate_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Certificate not found.".to_string()))?;

    let status = match payload.status.as_deref() {
        Some(raw) => Some(
            CertificateStatus::parse(raw)
                .ok_or_else(|| ApiError::Validation("Invalid certificate status.".to_string()))?,
        ),
        None => None,
    };

    if payload.email.is_some() || status.is_some() {
        store
            .update_certificate(&payload.certificate_id, payload.email.as_deref(), status)
            .await?;
        if let Some(status) = status {
            info!(
                certificate_id = %payload.certificate_id,
                status = status.as_str(),
                "Certificate status updated"
            );
        }
    }

    Ok(json!({ "status": "updated" }))
}

#[derive(Debug, Deserialize)]
struct SendRequest {
    #[serde(default)]
    email: Option<String>,
}

/// Handle POST /api/admin/certificates/{certificate_id}/send
///
/// Synchronous send: a transport failure is both logged and surfaced.
pub async fn admin_send_certificate(
    state: Arc<AppState>,
    req: Request<Incoming>,
    certificate_id: &str,
) -> Response<Full<Bytes>> {
    respond(admin_send_certificate_inner(state, req, certificate_id).await)
}

async fn admin_send_certificate_inner(
    state: Arc<AppState>,
    req: Request<Incoming>,
    certificate_id: &str,
) -> Result<serde_json::Value> {
    require_admin(&state, req.headers())?;

    let store = state.ledger.store();
    let certificate = store
        .find_certificate(certificate_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Certificate not found.".to_string()))?;

    let payload: SendRequest = read_json(req).await?;
    let recipient = payload
        .email
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| certificate.email.clone());
    if recipient.is_empty() {
        return Err(ApiError::Validation("Recipient email is required.".to_string()));
    }

    let body = format!(
        "Hi,\n\nPlease find the confirmation for certificate {} ({}).\n\n\
         If you need any changes or help, call us at {}.",
        certificate.certificate_id,
        certificate.plan_type.as_str(),
        state.args.support_phone
    );
    let subject = format!("Certificate {}", certificate.certificate_id);

    match state.mailer.send(&recipient, &subject, &body).await {
        Ok(()) => {
            store
                .append_delivery_log(DeliveryLogDoc::new(
                    &certificate.certificate_id,
                    DeliveryStatus::Sent,
                    doc! { "trigger": "admin-panel", "recipient": &recipient },
                ))
                .await?;
            Ok(json!({ "status": "sent", "recipient": recipient }))
        }
        Err(e) => {
            store
                .append_delivery_log(DeliveryLogDoc::new(
                    &certificate.certificate_id,
                    DeliveryStatus::Failed,
                    doc! {
                        "trigger": "admin-panel",
                        "recipient": &recipient,
                        "reason": e.to_string(),
                    },
                ))
                .await?;
            Err(ApiError::Transport(e.to_string()))
        }
    }
}
