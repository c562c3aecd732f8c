//! HTTP routes for Laurea

pub mod admin;
pub mod assessment;
pub mod catalog;
pub mod certificate;
pub mod checkout;
pub mod contact;
pub mod health;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{error, warn};

use crate::types::{ApiError, Result};

pub use health::{health_check, readiness_check, version_info};

/// Build a successful JSON response
pub(crate) fn json_response<T: Serialize>(value: &T) -> Response<Full<Bytes>> {
    let body = match serde_json::to_vec(value) {
        Ok(body) => body,
        Err(e) => {
            error!("Response serialization failed: {}", e);
            return error_response(&ApiError::Internal(
                "Internal serialization error".to_string(),
            ));
        }
    };

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

/// Build a JSON error response from an API error
pub(crate) fn error_response(err: &ApiError) -> Response<Full<Bytes>> {
    let status = err.status_code();
    if status.is_server_error() {
        warn!("Request failed: {}", err);
    }

    let body = serde_json::json!({ "error": err.to_string() });

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

/// Collapse a handler result into a response
pub(crate) fn respond<T: Serialize>(result: Result<T>) -> Response<Full<Bytes>> {
    match result {
        Ok(value) => json_response(&value),
        Err(err) => error_response(&err),
    }
}

/// Read and parse a JSON request body.
///
/// An empty body parses as an empty object, matching clients that POST
/// without a payload.
pub(crate) async fn read_json<T: DeserializeOwned>(req: Request<Incoming>) -> Result<T> {
    let body = req
        .collect()
        .await
        .map_err(|_| ApiError::Validation("Failed to read request body".to_string()))?
        .to_bytes();

    let raw: &[u8] = if body.is_empty() { b"{}" } else { &body };
    serde_json::from_slice(raw)
        .map_err(|_| ApiError::Validation("Invalid JSON payload".to_string()))
}

/// Parse a query string into key-value pairs
pub(crate) fn parse_query_params(query: &str) -> std::collections::HashMap<String, String> {
    if query.is_empty() {
        return std::collections::HashMap::new();
    }

    query
        .split('&')
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?;
            let value = parts.next().unwrap_or("");
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_params() {
        let params = parse_query_params("course=data-science&assessment=ds-final");
        assert_eq!(params.get("course"), Some(&"data-science".to_string()));
        assert_eq!(params.get("assessment"), Some(&"ds-final".to_string()));
    }

    #[test]
    fn test_parse_query_params_empty() {
        assert!(parse_query_params("").is_empty());
    }

    #[test]
    fn test_error_response_status() {
        let resp = error_response(&ApiError::NotFound("Payment not found.".to_string()));
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
