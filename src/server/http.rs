//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling; one spawned task per
//! connection and manual method/path routing.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::config::Args;
use crate::db::MongoClient;
use crate::delivery::DeliveryScheduler;
use crate::gateway::PhonePeClient;
use crate::ledger::CertificateLedger;
use crate::mail::MailSender;
use crate::routes;
use crate::types::ApiError;

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// MongoDB client; absent only in dev mode when unreachable
    pub mongo: Option<MongoClient>,
    /// Certificate ledger (idempotent issuance, delivery audit trail)
    pub ledger: Arc<CertificateLedger>,
    /// Deferred certificate email scheduler
    pub scheduler: DeliveryScheduler,
    /// Outbound mail transport (synchronous paths)
    pub mailer: Arc<dyn MailSender>,
    /// Payment gateway client with cached bearer token
    pub gateway: Arc<PhonePeClient>,
}

impl AppState {
    pub fn new(
        args: Args,
        mongo: Option<MongoClient>,
        ledger: Arc<CertificateLedger>,
        scheduler: DeliveryScheduler,
        mailer: Arc<dyn MailSender>,
        gateway: Arc<PhonePeClient>,
    ) -> Self {
        Self {
            args,
            mongo,
            ledger,
            scheduler,
            mailer,
            gateway,
        }
    }

    /// MongoDB handle, as an error for routes that require it
    pub fn mongo(&self) -> crate::types::Result<&MongoClient> {
        self.mongo
            .as_ref()
            .ok_or_else(|| ApiError::Database("MongoDB is not available".to_string()))
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<(), ApiError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Laurea listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - relaxed secrets, MongoDB optional");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(|q| q.to_string());

    debug!("[{}] {} {}", addr, method, path);

    let response = match (method, path.as_str()) {
        // Liveness probe
        (Method::GET, "/health") | (Method::GET, "/healthz") => {
            routes::health_check(Arc::clone(&state))
        }

        // Readiness probe
        (Method::GET, "/ready") | (Method::GET, "/readyz") => {
            routes::readiness_check(Arc::clone(&state))
        }

        // Version info for deployment verification
        (Method::GET, "/version") => routes::version_info(),

        // CORS preflight
        (Method::OPTIONS, _) => preflight_response(),

        // ====================================================================
        // Catalog
        // ====================================================================
        (Method::GET, "/api/courses") => routes::catalog::list_courses(state).await,
        (Method::GET, "/api/syllabus") => routes::catalog::get_syllabus(),
        (Method::GET, "/api/plans") => routes::catalog::list_plans(state).await,

        // ====================================================================
        // Assessments
        // ====================================================================
        (Method::GET, "/api/assessments") => {
            routes::assessment::list_assessments(state, query.as_deref()).await
        }
        (Method::GET, "/api/assessment/questions") => {
            routes::assessment::list_questions(state, query.as_deref()).await
        }
        (Method::POST, "/api/assessment/submit") => {
            routes::assessment::submit_assessment(state, req).await
        }

        // ====================================================================
        // Checkout and gateway callback
        // ====================================================================
        (Method::POST, "/api/payment/checkout") => {
            routes::checkout::checkout_plan(state, req).await
        }
        (Method::POST, "/api/payment/callback") => {
            routes::checkout::payment_callback(state, req).await
        }

        // ====================================================================
        // Certificates
        // ====================================================================
        (Method::POST, "/api/certificate/basic/render") => {
            routes::certificate::render_basic_certificate(state, req).await
        }
        (Method::POST, "/api/certificate/issue") => {
            routes::certificate::issue_certificate(state, req).await
        }
        (Method::POST, "/api/fulfillment/progress") => {
            routes::certificate::fulfillment_progress(state, req).await
        }
        (Method::POST, "/api/verify") => {
            routes::certificate::verify_certificate(state, req).await
        }
        (Method::POST, "/api/recover") => {
            routes::certificate::recover_certificate(state, req).await
        }

        // ====================================================================
        // Contact and email verification
        // ====================================================================
        (Method::POST, "/api/contact") => {
            routes::contact::submit_contact_message(state, req).await
        }
        (Method::POST, "/api/auth/email/otp/start") => {
            routes::contact::start_email_otp(state, req).await
        }
        (Method::POST, "/api/auth/email/otp/verify") => {
            routes::contact::verify_email_otp(state, req).await
        }

        // ====================================================================
        // Admin panel
        // ====================================================================
        (Method::POST, "/api/admin/login") => routes::admin::admin_login(state, req).await,
        (Method::GET, "/api/admin/payments") | (Method::PATCH, "/api/admin/payments") => {
            routes::admin::admin_payments(state, req).await
        }
        (Method::GET, "/api/admin/certificates")
        | (Method::PATCH, "/api/admin/certificates") => {
            routes::admin::admin_certificates(state, req).await
        }
        (Method::POST, p) if parse_admin_send_path(p).is_some() => {
            let certificate_id = parse_admin_send_path(p).unwrap_or_default();
            routes::admin::admin_send_certificate(state, req, &certificate_id).await
        }

        // Not found
        _ => not_found_response(&path),
    };

    Ok(response)
}

/// Extract the certificate ID from /api/admin/certificates/{id}/send
fn parse_admin_send_path(path: &str) -> Option<String> {
    let rest = path.strip_prefix("/api/admin/certificates/")?;
    let certificate_id = rest.strip_suffix("/send")?;
    if certificate_id.is_empty() || certificate_id.contains('/') {
        return None;
    }
    Some(certificate_id.to_string())
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Headers", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, PATCH, OPTIONS")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Not found response
fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Not Found",
        "path": path,
    });

    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_admin_send_path() {
        assert_eq!(
            parse_admin_send_path("/api/admin/certificates/CERT-AB12CD34EF/send"),
            Some("CERT-AB12CD34EF".to_string())
        );
        assert_eq!(parse_admin_send_path("/api/admin/certificates//send"), None);
        assert_eq!(
            parse_admin_send_path("/api/admin/certificates/CERT-X/extra/send"),
            None
        );
        assert_eq!(parse_admin_send_path("/api/admin/certificates"), None);
    }

    #[test]
    fn test_not_found_response_status() {
        let resp = not_found_response("/nope");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
