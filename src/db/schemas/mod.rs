//! Database schemas for Laurea
//!
//! Defines MongoDB document structures for payments, certificates,
//! assessments, courses, and the supporting collections.

mod assessment;
mod certificate;
mod contact;
mod course;
mod metadata;
mod payment;
mod plan_config;

pub use assessment::{
    AssessmentAttemptDoc, AssessmentDoc, AssessmentQuestionDoc, AttemptResponse,
    ASSESSMENT_COLLECTION, ATTEMPT_COLLECTION,
};
pub use certificate::{
    CertificateDoc, CertificateStatus, DeliveryLogDoc, DeliveryStatus, CERTIFICATE_COLLECTION,
    DELIVERY_LOG_COLLECTION,
};
pub use contact::{ContactMessageDoc, EmailOtpDoc, CONTACT_COLLECTION, EMAIL_OTP_COLLECTION};
pub use course::{CourseDoc, COURSE_COLLECTION};
pub use metadata::Metadata;
pub use payment::{
    Orientation, PaymentDoc, PaymentStatus, PlanType, PAYMENT_COLLECTION,
};
pub use plan_config::{PlanConfigDoc, PLAN_CONFIG_COLLECTION};
