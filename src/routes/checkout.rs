//! Checkout and payment gateway callback routes

use bson::{doc, Bson};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::schemas::{
    CourseDoc, Orientation, PaymentDoc, PaymentStatus, PlanType, COURSE_COLLECTION,
    PAYMENT_COLLECTION,
};
use crate::gateway::ChargeContext;
use crate::plans;
use crate::server::AppState;
use crate::types::{ApiError, Result};

use super::{read_json, respond};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutRequest {
    #[serde(default)]
    plan_type: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    phone: String,
    #[serde(default)]
    college_name: String,
    #[serde(default)]
    semester: String,
    #[serde(default)]
    declaration_accepted: Option<bool>,
    #[serde(default)]
    course_slug: Option<String>,
    #[serde(default)]
    assessment_slug: Option<String>,
    #[serde(default)]
    project_link: String,
    #[serde(default)]
    repository_link: String,
    #[serde(default)]
    project_description: String,
    #[serde(default)]
    project_title: String,
    #[serde(default)]
    project_archive_name: Option<String>,
    #[serde(default)]
    project_archive_data: Option<String>,
    #[serde(default)]
    orientation: Option<String>,
}

/// Handle POST /api/payment/checkout
pub async fn checkout_plan(state: Arc<AppState>, req: Request<Incoming>) -> Response<Full<Bytes>> {
    respond(checkout_plan_inner(state, req).await)
}

async fn checkout_plan_inner(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Result<serde_json::Value> {
    let payload: CheckoutRequest = read_json(req).await?;

    let plan = PlanType::parse(&payload.plan_type)
        .ok_or_else(|| ApiError::Validation("Invalid plan selected.".to_string()))?;
    let policy = plans::resolve_policy(state.mongo.as_ref(), plan).await;

    let missing: Vec<&str> = [
        ("name", payload.name.is_empty()),
        ("email", payload.email.is_empty()),
        ("phone", payload.phone.is_empty()),
        ("collegeName", payload.college_name.is_empty()),
        ("semester", payload.semester.is_empty()),
    ]
    .iter()
    .filter(|(_, empty)| *empty)
    .map(|(field, _)| *field)
    .collect();
    if !missing.is_empty() {
        return Err(ApiError::Validation(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )));
    }

    if payload.declaration_accepted != Some(true) {
        return Err(ApiError::Validation(
            "Self-declaration must be accepted.".to_string(),
        ));
    }

    let project_link = if !payload.project_link.is_empty() {
        payload.project_link.clone()
    } else {
        payload.repository_link.clone()
    };
    if policy.requires_project && project_link.is_empty() {
        return Err(ApiError::Validation(
            "Project or repository link is required for this plan.".to_string(),
        ));
    }

    let orientation = match payload.orientation.as_deref() {
        None | Some("") => Orientation::Horizontal,
        Some(raw) => Orientation::parse(raw)
            .ok_or_else(|| ApiError::Validation("Invalid certificate orientation.".to_string()))?,
    };

    let mongo = state.mongo()?;

    let course = match payload.course_slug.as_deref().filter(|s| !s.is_empty()) {
        Some(slug) => {
            mongo
                .collection::<CourseDoc>(COURSE_COLLECTION)
                .await?
                .find_one(doc! { "slug": slug })
                .await?
        }
        None => None,
    };

    // Plan validity windows are assigned automatically, never user-supplied
    let today = chrono::Utc::now().date_naive();
    let window = policy.duration_window(today);
    let (start_date, end_date) = match window {
        Some((start, end)) => (Some(start), Some(end)),
        None => (None, None),
    };

    let email = payload.email.trim().to_string();
    let transaction_id = format!("TXN-{}", chrono::Utc::now().format("%Y%m%d%H%M%S"));

    let mut extra = doc! {
        "courseSlug": payload.course_slug.clone().unwrap_or_default(),
        "assessmentSlug": payload.assessment_slug.clone().unwrap_or_default(),
        "certificatePreview": plans::certificate_preview(orientation),
        "projectDescription": payload.project_description.clone(),
        "projectTitle": payload.project_title.clone(),
    };
    if payload.project_archive_name.is_some() || payload.project_archive_data.is_some() {
        extra.insert(
            "projectArchive",
            doc! {
                "name": payload.project_archive_name.clone().unwrap_or_default(),
                "size": payload
                    .project_archive_data
                    .as_ref()
                    .map(|d| d.len() as i64)
                    .unwrap_or(0),
                "data": payload.project_archive_data.clone().unwrap_or_default(),
            },
        );
    }

    let payment = PaymentDoc {
        transaction_id: transaction_id.clone(),
        course_slug: course.as_ref().map(|c| c.slug.clone()),
        assessment_slug: payload.assessment_slug.clone().filter(|s| !s.is_empty()),
        plan_type: plan,
        name: payload.name.clone(),
        email: email.clone(),
        phone: payload.phone.clone(),
        amount: policy.price,
        currency: policy.currency.clone(),
        college_name: payload.college_name.clone(),
        semester: payload.semester.clone(),
        project_link: payload.project_link.clone(),
        repository_link: payload.repository_link.clone(),
        certificate_orientation: orientation,
        start_date,
        end_date,
        status: PaymentStatus::Initiated,
        extra,
        ..Default::default()
    };

    let payments = mongo
        .collection::<PaymentDoc>(PAYMENT_COLLECTION)
        .await?;
    payments.insert_one(payment).await?;
    info!(
        transaction_id = %transaction_id,
        plan = plan.as_str(),
        "Checkout created"
    );

    // PhonePe Standard Checkout via REST
    let amount_paise = (policy.price as i64) * 100;
    let redirect_url = format!(
        "{}/payment-success",
        state.args.frontend_base_url.trim_end_matches('/')
    );

    let mut phonepe_block = None;
    if state.gateway.is_configured() {
        let charge = state
            .gateway
            .create_charge(
                amount_paise,
                &transaction_id,
                &redirect_url,
                ChargeContext {
                    course_slug: payload.course_slug.clone().unwrap_or_default(),
                    plan_key: plan.as_str().to_string(),
                    email: email.clone(),
                },
            )
            .await?;

        payments
            .update_one(
                doc! { "transaction_id": &transaction_id },
                doc! {
                    "$set": {
                        "extra.phonepe": {
                            "merchant_order_id": &transaction_id,
                            "amount": amount_paise,
                            "currency": &policy.currency,
                            "redirect_url": &redirect_url,
                            "redirect_url_phonepe": &charge.redirect_url,
                            "order_id": charge.order_id.clone().map(Bson::String).unwrap_or(Bson::Null),
                            "state": charge.state.clone().map(Bson::String).unwrap_or(Bson::Null),
                        },
                        "metadata.updated_at": bson::DateTime::now(),
                    }
                },
            )
            .await?;

        phonepe_block = Some(json!({
            "merchantId": transaction_id.clone(),
            "merchantTransactionId": transaction_id.clone(),
            "amount": amount_paise,
            "currency": policy.currency.clone(),
            "redirectUrl": charge.redirect_url,
        }));
    } else {
        warn!("PhonePe credentials not configured; skipping live payment flow");
    }

    let mut response = json!({
        "transactionId": transaction_id,
        "paymentStatus": PaymentStatus::Initiated.as_str(),
        "plan": {
            "key": plan.as_str(),
            "label": policy.label,
            "price": policy.price,
            "currency": policy.currency,
            "requiresProject": policy.requires_project,
            "description": policy.description,
        },
        "planType": plan.as_str(),
        "email": email,
        "amount": policy.price,
        "redirectRoute": "/fulfillment",
        "processingTimeMs": 2000,
        "certificatePreview": plans::certificate_preview(orientation),
        "startDate": start_date.map(|d| d.to_string()),
        "endDate": end_date.map(|d| d.to_string()),
    });
    if let Some(block) = phonepe_block {
        response["phonepe"] = block;
    }

    Ok(response)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallbackRequest {
    #[serde(default)]
    merchant_transaction_id: Option<String>,
    #[serde(default)]
    transaction_id: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    success: Option<bool>,
    #[serde(flatten)]
    rest: serde_json::Map<String, serde_json::Value>,
}

/// Handle POST /api/payment/callback
///
/// PhonePe webhook after payment completion. The raw payload is kept on
/// the payment for audit.
pub async fn payment_callback(state: Arc<AppState>, req: Request<Incoming>) -> Response<Full<Bytes>> {
    respond(payment_callback_inner(state, req).await)
}

async fn payment_callback_inner(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Result<serde_json::Value> {
    let payload: CallbackRequest = read_json(req).await?;

    let transaction_id = payload
        .merchant_transaction_id
        .clone()
        .or_else(|| payload.transaction_id.clone())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::Validation("Missing transaction ID".to_string()))?;

    let mongo = state.mongo()?;
    let payments = mongo.collection::<PaymentDoc>(PAYMENT_COLLECTION).await?;
    let payment = payments
        .find_one(doc! { "transaction_id": &transaction_id })
        .await?
        .ok_or_else(|| ApiError::NotFound("Payment not found.".to_string()))?;

    let gateway_status = payload
        .code
        .clone()
        .or_else(|| payload.status.clone())
        .unwrap_or_default()
        .to_uppercase();

    let new_status = if gateway_status == "PAYMENT_SUCCESS" || payload.success == Some(true) {
        Some(PaymentStatus::Paid)
    } else if gateway_status == "PAYMENT_ERROR" || gateway_status == "FAILED" {
        Some(PaymentStatus::Failed)
    } else {
        None
    };

    let mut set = doc! {
        "extra.phonepe_callback": {
            "payload": bson::to_bson(&payload.rest).unwrap_or(Bson::Null),
            "received_at": chrono::Utc::now().to_rfc3339(),
        },
        "metadata.updated_at": bson::DateTime::now(),
    };

    if let Some(status) = new_status {
        if payment.status != status {
            set.insert("status", status.as_str());
            info!(
                transaction_id = %transaction_id,
                status = status.as_str(),
                "Payment status updated from gateway callback"
            );
        }
    }

    payments
        .update_one(doc! { "transaction_id": &transaction_id }, doc! { "$set": set })
        .await?;

    Ok(json!({ "success": true, "message": "Callback processed" }))
}
