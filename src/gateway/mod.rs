//! PhonePe payment gateway client
//!
//! Standard Checkout via REST: an OAuth client-credentials token exchange
//! (cached, see `token`) followed by a checkout pay call. The core only
//! depends on the token/charge contract; everything else about the gateway
//! protocol stays behind this module.

pub mod token;

use serde::Deserialize;
use std::time::Duration;
use tracing::{error, info};

use crate::config::PhonePeArgs;
use crate::types::{ApiError, Result};

pub use token::TokenCache;

/// Gateway call timeout
const GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);

/// A created charge, as returned to the checkout flow
#[derive(Debug, Clone)]
pub struct Charge {
    /// Hosted checkout page the purchaser is redirected to
    pub redirect_url: String,
    pub order_id: Option<String>,
    pub state: Option<String>,
}

/// Free-form fields forwarded to the gateway with a charge
#[derive(Debug, Clone, Default)]
pub struct ChargeContext {
    pub course_slug: String,
    pub plan_key: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_at: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PayResponse {
    redirect_url: Option<String>,
    order_id: Option<String>,
    state: Option<String>,
    message: Option<String>,
}

/// PhonePe REST client with an injected token cache
pub struct PhonePeClient {
    http: reqwest::Client,
    args: PhonePeArgs,
    tokens: TokenCache,
}

impl PhonePeClient {
    pub fn new(args: PhonePeArgs) -> Self {
        let http = reqwest::Client::builder()
            .timeout(GATEWAY_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http,
            args,
            tokens: TokenCache::new(),
        }
    }

    /// Whether credentials are configured (live flow skipped otherwise)
    pub fn is_configured(&self) -> bool {
        self.args.is_configured()
    }

    /// Fetch a bearer token, reusing the cached one while fresh
    pub async fn fetch_token(&self) -> Result<String> {
        if let Some(token) = self.tokens.get() {
            return Ok(token);
        }

        let client_id = self
            .args
            .phonepe_client_id
            .as_deref()
            .ok_or_else(|| ApiError::Config("PhonePe client id not configured".to_string()))?;
        let client_secret = self
            .args
            .phonepe_client_secret
            .as_deref()
            .ok_or_else(|| ApiError::Config("PhonePe client secret not configured".to_string()))?;

        let token_url = format!("{}/v1/oauth/token", self.args.auth_base_url());
        let client_version = self.args.phonepe_client_version.to_string();
        let form = [
            ("client_id", client_id),
            ("client_version", client_version.as_str()),
            ("client_secret", client_secret),
            ("grant_type", "client_credentials"),
        ];

        let response = self
            .http
            .post(&token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                error!("PhonePe auth token fetch failed ({}): {}", token_url, e);
                ApiError::Transport("Unable to initiate payment. Please try again.".to_string())
            })?;

        let status = response.status();
        let body: TokenResponse = response.json().await.map_err(|e| {
            error!("PhonePe auth token response unreadable: {}", e);
            ApiError::Transport("Unable to initiate payment. Please try again.".to_string())
        })?;

        let Some(token) = body.access_token.filter(|t| !t.is_empty()) else {
            error!("PhonePe auth token missing in response (HTTP {})", status);
            return Err(ApiError::Transport(
                "Unable to initiate payment. Please try again.".to_string(),
            ));
        };

        self.tokens.store(token.clone(), body.expires_at.unwrap_or(0));
        Ok(token)
    }

    /// Create a hosted-checkout charge
    pub async fn create_charge(
        &self,
        amount_paise: i64,
        merchant_order_id: &str,
        redirect_url: &str,
        context: ChargeContext,
    ) -> Result<Charge> {
        let token = self.fetch_token().await?;

        let pay_url = format!("{}/checkout/v2/pay", self.args.pg_base_url());
        let payload = serde_json::json!({
            "merchantOrderId": merchant_order_id,
            "amount": amount_paise,
            "paymentFlow": {
                "type": "PG_CHECKOUT",
                "merchantUrls": {
                    "redirectUrl": redirect_url,
                },
            },
            "metaInfo": {
                "udf1": context.course_slug,
                "udf2": context.plan_key,
                "udf3": context.email,
            },
        });

        let response = self
            .http
            .post(&pay_url)
            .header("Authorization", format!("O-Bearer {}", token))
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!("PhonePe pay call failed for {}: {}", merchant_order_id, e);
                ApiError::Transport(
                    "Unable to initiate payment. Please try again in a moment.".to_string(),
                )
            })?;

        let status = response.status();
        let body: PayResponse = response.json().await.unwrap_or(PayResponse {
            redirect_url: None,
            order_id: None,
            state: None,
            message: None,
        });

        if status.as_u16() >= 400 {
            error!(
                "PhonePe pay HTTP {} for {}: {:?}",
                status, merchant_order_id, body.message
            );
            let message = body
                .message
                .unwrap_or_else(|| "Unable to initiate payment. Please try again.".to_string());
            return Err(ApiError::Transport(message));
        }

        let Some(redirect) = body.redirect_url else {
            error!("PhonePe pay missing redirectUrl for {}", merchant_order_id);
            return Err(ApiError::Transport(
                "Unable to initiate payment. Please try again.".to_string(),
            ));
        };

        info!(
            order = merchant_order_id,
            state = body.state.as_deref().unwrap_or("unknown"),
            "Gateway charge created"
        );

        Ok(Charge {
            redirect_url: redirect,
            order_id: body.order_id,
            state: body.state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn gateway_args(configured: bool) -> PhonePeArgs {
        let mut args =
            crate::config::Args::parse_from(["laurea", "--dev-mode"]).phonepe;
        if configured {
            args.phonepe_client_id = Some("client".to_string());
            args.phonepe_client_secret = Some("secret".to_string());
        }
        args
    }

    #[test]
    fn test_unconfigured_client_reports_so() {
        let client = PhonePeClient::new(gateway_args(false));
        assert!(!client.is_configured());
    }

    #[tokio::test]
    async fn test_fetch_token_without_credentials_is_config_error() {
        let client = PhonePeClient::new(gateway_args(false));
        let result = client.fetch_token().await;
        assert!(matches!(result, Err(ApiError::Config(_))));
    }

    #[tokio::test]
    async fn test_cached_token_short_circuits_fetch() {
        let client = PhonePeClient::new(gateway_args(false));
        // Seed the cache; fetch_token must return it without hitting the wire
        let far_future = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs()
            + 3600;
        client.tokens.store("cached-token".to_string(), far_future);

        let token = client.fetch_token().await.unwrap();
        assert_eq!(token, "cached-token");
    }
}
