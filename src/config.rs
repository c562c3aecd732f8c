//! Configuration for Laurea
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use uuid::Uuid;

/// Laurea - certification issuance and verification platform API
#[derive(Parser, Debug, Clone)]
#[command(name = "laurea")]
#[command(about = "Certification issuance and verification platform API")]
pub struct Args {
    /// Unique node identifier for this instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Enable development mode (MongoDB optional, relaxed secrets)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "laurea")]
    pub mongodb_db: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Public base URL of the frontend (verify pages, payment redirects)
    #[arg(long, env = "FRONTEND_BASE_URL", default_value = "http://localhost:5173")]
    pub frontend_base_url: String,

    /// Support phone number included in outbound mail
    #[arg(long, env = "SUPPORT_PHONE", default_value = "+91-9113750231")]
    pub support_phone: String,

    /// Delay before the certificate email is sent, in seconds
    #[arg(long, env = "DELIVERY_DELAY_SECS", default_value = "240")]
    pub delivery_delay_secs: u64,

    /// Maximum queued delivery jobs
    #[arg(long, env = "DELIVERY_QUEUE_SIZE", default_value = "1000")]
    pub delivery_queue_size: usize,

    /// Mail relay configuration
    #[command(flatten)]
    pub mail: MailArgs,

    /// PhonePe gateway configuration
    #[command(flatten)]
    pub phonepe: PhonePeArgs,

    /// Admin panel password (admin endpoints disabled when unset)
    #[arg(long, env = "ADMIN_PANEL_PASSWORD")]
    pub admin_panel_password: Option<String>,

    /// Secret for signing admin session tokens (required in production)
    #[arg(long, env = "ADMIN_SECRET")]
    pub admin_secret: Option<String>,

    /// Admin token TTL in seconds
    #[arg(long, env = "ADMIN_TOKEN_TTL_SECONDS", default_value = "43200")]
    pub admin_token_ttl_seconds: u64,
}

/// HTTP mail relay configuration
#[derive(Parser, Debug, Clone)]
pub struct MailArgs {
    /// Mail relay endpoint URL (outbound mail disabled when unset)
    #[arg(long, env = "MAIL_API_URL")]
    pub mail_api_url: Option<String>,

    /// Bearer token for the mail relay
    #[arg(long, env = "MAIL_API_KEY")]
    pub mail_api_key: Option<String>,

    /// Sender address for outbound mail
    #[arg(long, env = "MAIL_SENDER")]
    pub mail_sender: Option<String>,

    /// Timeout for mail relay calls in seconds
    #[arg(long, env = "MAIL_TIMEOUT_SECS", default_value = "10")]
    pub mail_timeout_secs: u64,
}

/// PhonePe Standard Checkout configuration
#[derive(Parser, Debug, Clone)]
pub struct PhonePeArgs {
    /// Gateway environment (SANDBOX or PRODUCTION)
    #[arg(long, env = "PHONEPE_ENVIRONMENT", default_value = "SANDBOX")]
    pub phonepe_environment: String,

    /// OAuth client id (live payment flow skipped when unset)
    #[arg(long, env = "PHONEPE_CLIENT_ID")]
    pub phonepe_client_id: Option<String>,

    /// OAuth client secret
    #[arg(long, env = "PHONEPE_CLIENT_SECRET")]
    pub phonepe_client_secret: Option<String>,

    /// OAuth client version
    #[arg(long, env = "PHONEPE_CLIENT_VERSION", default_value = "1")]
    pub phonepe_client_version: i64,

    /// Override for the auth (token) base URL
    #[arg(long, env = "PHONEPE_AUTH_BASE_URL")]
    pub phonepe_auth_base_url: Option<String>,

    /// Override for the payments base URL
    #[arg(long, env = "PHONEPE_PG_BASE_URL")]
    pub phonepe_pg_base_url: Option<String>,
}

impl Args {
    /// Frontend verify page URL (QR payloads point here)
    pub fn verify_page_url(&self) -> String {
        format!("{}/verify", self.frontend_base_url.trim_end_matches('/'))
    }

    /// Frontend certificate download URL base
    pub fn download_page_url(&self) -> String {
        format!(
            "{}/certificate/pdf",
            self.frontend_base_url.trim_end_matches('/')
        )
    }

    /// Get effective admin token secret (uses default in dev mode)
    pub fn admin_secret(&self) -> String {
        if self.dev_mode {
            self.admin_secret
                .clone()
                .unwrap_or_else(|| "dev-only-insecure-secret".to_string())
        } else {
            self.admin_secret
                .clone()
                .expect("ADMIN_SECRET is required in production mode")
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode && self.admin_secret.is_none() {
            return Err("ADMIN_SECRET is required in production mode".to_string());
        }

        if self.mail.mail_api_url.is_some() && self.mail.mail_sender.is_none() {
            return Err("MAIL_SENDER is required when MAIL_API_URL is set".to_string());
        }

        let env = self.phonepe.phonepe_environment.to_uppercase();
        if env != "SANDBOX" && env != "PRODUCTION" {
            return Err("PHONEPE_ENVIRONMENT must be SANDBOX or PRODUCTION".to_string());
        }

        Ok(())
    }
}

impl PhonePeArgs {
    /// Whether the live payment flow is configured
    pub fn is_configured(&self) -> bool {
        self.phonepe_client_id.is_some() && self.phonepe_client_secret.is_some()
    }

    /// Base URL for the OAuth token endpoint
    pub fn auth_base_url(&self) -> String {
        if let Some(ref url) = self.phonepe_auth_base_url {
            return url.clone();
        }
        if self.is_production() {
            "https://api.phonepe.com/apis/identity-manager".to_string()
        } else {
            "https://api-preprod.phonepe.com/apis/pg-sandbox".to_string()
        }
    }

    /// Base URL for the payments endpoint
    pub fn pg_base_url(&self) -> String {
        if let Some(ref url) = self.phonepe_pg_base_url {
            return url.clone();
        }
        if self.is_production() {
            "https://api.phonepe.com/apis/pg".to_string()
        } else {
            "https://api-preprod.phonepe.com/apis/pg-sandbox".to_string()
        }
    }

    fn is_production(&self) -> bool {
        self.phonepe_environment.eq_ignore_ascii_case("PRODUCTION")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_args() -> Args {
        Args::parse_from(["laurea", "--dev-mode"])
    }

    #[test]
    fn test_verify_page_url_strips_trailing_slash() {
        let mut args = test_args();
        args.frontend_base_url = "https://certs.example.com/".to_string();
        assert_eq!(args.verify_page_url(), "https://certs.example.com/verify");
    }

    #[test]
    fn test_validate_requires_admin_secret_in_production() {
        let mut args = test_args();
        args.dev_mode = false;
        assert!(args.validate().is_err());

        args.admin_secret = Some("secret".to_string());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_phonepe_sandbox_defaults() {
        let args = test_args();
        assert!(!args.phonepe.is_configured());
        assert!(args.phonepe.auth_base_url().contains("preprod"));
        assert!(args.phonepe.pg_base_url().contains("preprod"));
    }
}
