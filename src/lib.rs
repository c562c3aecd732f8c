//! Laurea - certification issuance and verification platform API
//!
//! Laurea ties a payment to a unique, idempotent certificate record,
//! delivers it by deferred email, and answers public verification lookups.
//!
//! ## Services
//!
//! - **Ledger**: idempotent certificate issuance with an append-only
//!   delivery audit trail
//! - **Delivery**: deferred certificate email on a background worker
//! - **Verification**: public certificate lookup by ID
//! - **Grading**: timed MCQ assessment scoring with attempt persistence
//! - **Gateway**: PhonePe Standard Checkout with a cached bearer token
//! - **Catalog**: courses, syllabus, and plan policies

pub mod auth;
pub mod config;
pub mod db;
pub mod delivery;
pub mod gateway;
pub mod grading;
pub mod ledger;
pub mod mail;
pub mod plans;
pub mod routes;
pub mod server;
pub mod types;
pub mod verification;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{ApiError, Result};
