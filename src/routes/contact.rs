//! Contact form and email OTP routes

use bson::doc;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response};
use rand::Rng;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::schemas::{ContactMessageDoc, EmailOtpDoc, CONTACT_COLLECTION, EMAIL_OTP_COLLECTION};
use crate::server::AppState;
use crate::types::{ApiError, Result};

use super::{read_json, respond};

/// How long a code stays valid, in minutes
const OTP_VALIDITY_MINUTES: i64 = 30;

#[derive(Debug, Deserialize)]
struct ContactRequest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    phone: String,
    #[serde(default)]
    subject: String,
    #[serde(default)]
    message: String,
}

/// Handle POST /api/contact
pub async fn submit_contact_message(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    respond(submit_contact_message_inner(state, req).await)
}

async fn submit_contact_message_inner(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Result<serde_json::Value> {
    let payload: ContactRequest = read_json(req).await?;

    let name = payload.name.trim().to_string();
    let email = payload.email.trim().to_string();
    let subject = payload.subject.trim().to_string();
    let message = payload.message.trim().to_string();

    if name.is_empty() || email.is_empty() || subject.is_empty() || message.is_empty() {
        return Err(ApiError::Validation(
            "Name, email, subject, and message are required.".to_string(),
        ));
    }

    let mongo = state.mongo()?;
    mongo
        .collection::<ContactMessageDoc>(CONTACT_COLLECTION)
        .await?
        .insert_one(ContactMessageDoc {
            name,
            email,
            phone: payload.phone.trim().to_string(),
            subject,
            message,
            ..Default::default()
        })
        .await?;

    Ok(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct OtpStartRequest {
    #[serde(default)]
    email: String,
}

/// Handle POST /api/auth/email/otp/start
///
/// OTP dispatch is synchronous: a transport failure surfaces as an error
/// response instead of a delivery log.
pub async fn start_email_otp(state: Arc<AppState>, req: Request<Incoming>) -> Response<Full<Bytes>> {
    respond(start_email_otp_inner(state, req).await)
}

async fn start_email_otp_inner(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Result<serde_json::Value> {
    let payload: OtpStartRequest = read_json(req).await?;
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() {
        return Err(ApiError::Validation("Email is required.".to_string()));
    }

    let code = format!("{}", rand::thread_rng().gen_range(100000..=999999));

    let mongo = state.mongo()?;
    mongo
        .collection::<EmailOtpDoc>(EMAIL_OTP_COLLECTION)
        .await?
        .insert_one(EmailOtpDoc {
            email: email.clone(),
            code: code.clone(),
            verified_at: None,
            ..Default::default()
        })
        .await?;

    let body = format!(
        "Your Laurea email verification code is {}. This code is valid for {} minutes. \
         If you did not request this, you can ignore this email.",
        code, OTP_VALIDITY_MINUTES
    );

    if let Err(e) = state
        .mailer
        .send(&email, "Laurea Email Verification Code", &body)
        .await
    {
        warn!(email = %email, "Failed to send OTP email: {}", e);
        return Err(ApiError::Transport(
            "Unable to send verification code. Please try again.".to_string(),
        ));
    }

    Ok(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct OtpVerifyRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    code: String,
}

/// Handle POST /api/auth/email/otp/verify
pub async fn verify_email_otp(state: Arc<AppState>, req: Request<Incoming>) -> Response<Full<Bytes>> {
    respond(verify_email_otp_inner(state, req).await)
}

async fn verify_email_otp_inner(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Result<serde_json::Value> {
    let payload: OtpVerifyRequest = read_json(req).await?;
    let email = payload.email.trim().to_lowercase();
    let code = payload.code.trim().to_string();
    if email.is_empty() || code.is_empty() {
        return Err(ApiError::Validation("Email and code are required.".to_string()));
    }

    let cutoff = chrono::Utc::now() - chrono::Duration::minutes(OTP_VALIDITY_MINUTES);
    let cutoff = bson::DateTime::from_chrono(cutoff);

    let mongo = state.mongo()?;
    let otps = mongo
        .collection::<EmailOtpDoc>(EMAIL_OTP_COLLECTION)
        .await?;
    let otp = otps
        .find_many_with(
            doc! {
                "email": &email,
                "code": &code,
                "metadata.created_at": { "$gte": cutoff },
            },
            Some(doc! { "metadata.created_at": -1 }),
            Some(1),
        )
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::Validation("Invalid or expired code.".to_string()))?;

    if otp.verified_at.is_none() {
        otps.update_one(
            doc! { "email": &email, "code": &code },
            doc! {
                "$set": {
                    "verified_at": bson::DateTime::now(),
                    "metadata.updated_at": bson::DateTime::now(),
                }
            },
        )
        .await?;
        info!(email = %email, "Email ownership verified");
    }

    Ok(json!({ "status": "ok" }))
}
