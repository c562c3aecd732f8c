//! Plan policies
//!
//! The static plan table (price, project requirement, validity window) with
//! operator overrides merged in from the `plan_configs` collection.

use bson::doc;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::warn;

use crate::db::schemas::{Orientation, PlanConfigDoc, PlanType, PLAN_CONFIG_COLLECTION};
use crate::db::MongoClient;

/// Effective policy for one plan tier
#[derive(Debug, Clone)]
pub struct PlanPolicy {
    pub key: PlanType,
    pub label: String,
    pub price: f64,
    pub original_price: Option<f64>,
    pub currency: String,
    pub requires_project: bool,
    pub description: String,
    pub duration_days: Option<i64>,
    pub max_duration_days: Option<i64>,
}

impl PlanPolicy {
    /// Discount percentage from original price, when discounted
    pub fn discount_percent(&self) -> Option<i64> {
        let original = self.original_price?;
        if original <= self.price {
            return None;
        }
        Some((100.0 - (self.price / original * 100.0)).round() as i64)
    }

    /// Validity window starting today, for plans with a duration
    pub fn duration_window(&self, today: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
        let days = self.duration_days.or(self.max_duration_days)?;
        if days == 0 {
            return None;
        }
        Some((today, today + chrono::Duration::days(days)))
    }
}

/// Base policy table. Overrides from `plan_configs` are merged on top.
pub fn base_policy(plan: PlanType) -> PlanPolicy {
    match plan {
        PlanType::Basic => PlanPolicy {
            key: plan,
            label: "Basic".to_string(),
            price: 499.0,
            original_price: Some(799.0),
            currency: "INR".to_string(),
            requires_project: false,
            description: "Skill Validation - PDF only".to_string(),
            duration_days: Some(0),
            max_duration_days: None,
        },
        PlanType::Industrial => PlanPolicy {
            key: plan,
            label: "Industrial Training".to_string(),
            price: 999.0,
            original_price: Some(1499.0),
            currency: "INR".to_string(),
            requires_project: true,
            description: "Industrial Training (3 Months)".to_string(),
            duration_days: Some(90),
            max_duration_days: None,
        },
        PlanType::Mastery => PlanPolicy {
            key: plan,
            label: "Mastery Certification".to_string(),
            price: 1499.0,
            original_price: Some(2199.0),
            currency: "INR".to_string(),
            requires_project: true,
            description: "Mastery Diploma (6 Months)".to_string(),
            duration_days: None,
            max_duration_days: Some(180),
        },
    }
}

/// Resolve the effective policy for a plan, merging any active override
pub async fn resolve_policy(mongo: Option<&MongoClient>, plan: PlanType) -> PlanPolicy {
    let mut policy = base_policy(plan);

    let Some(mongo) = mongo else {
        return policy;
    };

    let config = match mongo
        .collection::<PlanConfigDoc>(PLAN_CONFIG_COLLECTION)
        .await
    {
        Ok(collection) => collection
            .find_one(doc! { "plan_type": plan.as_str(), "is_active": true })
            .await
            .unwrap_or_else(|e| {
                warn!(plan = plan.as_str(), "Plan config lookup failed: {}", e);
                None
            }),
        Err(e) => {
            warn!(plan = plan.as_str(), "Plan config collection unavailable: {}", e);
            None
        }
    };

    if let Some(config) = config {
        policy.price = config.price;
        if config.original_price.is_some() {
            policy.original_price = config.original_price;
        }
        if !config.label_override.is_empty() {
            policy.label = config.label_override;
        }
        if !config.currency.is_empty() {
            policy.currency = config.currency;
        }
    }

    policy
}

/// Display metadata keyed by plan size (basic render endpoint)
#[derive(Debug, Clone, Serialize)]
pub struct PlanSize {
    pub size: &'static str,
    pub display: &'static str,
}

pub fn plan_size(plan: PlanType) -> PlanSize {
    match plan {
        PlanType::Basic => PlanSize {
            size: "small",
            display: "Small Certificate (₹499)",
        },
        PlanType::Industrial => PlanSize {
            size: "medium",
            display: "Medium Certificate (₹999)",
        },
        PlanType::Mastery => PlanSize {
            size: "large",
            display: "Large Diploma (₹1,499)",
        },
    }
}

/// Placeholder certificate preview per orientation
pub fn certificate_preview(orientation: Orientation) -> &'static str {
    match orientation {
        Orientation::Horizontal => {
            "https://dummyimage.com/600x400/0f172a/ffffff.png&text=Horizontal+Preview"
        }
        Orientation::Vertical => {
            "https://dummyimage.com/480x640/0f172a/ffffff.png&text=Vertical+Preview"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_policies() {
        let basic = base_policy(PlanType::Basic);
        assert!(!basic.requires_project);
        assert_eq!(basic.price, 499.0);

        let industrial = base_policy(PlanType::Industrial);
        assert!(industrial.requires_project);
        assert_eq!(industrial.duration_days, Some(90));

        let mastery = base_policy(PlanType::Mastery);
        assert!(mastery.requires_project);
        assert_eq!(mastery.max_duration_days, Some(180));
    }

    #[test]
    fn test_discount_percent() {
        let basic = base_policy(PlanType::Basic);
        // 100 - 499/799*100 = 37.5... rounds to 38
        assert_eq!(basic.discount_percent(), Some(38));

        let mut no_discount = base_policy(PlanType::Basic);
        no_discount.original_price = Some(499.0);
        assert_eq!(no_discount.discount_percent(), None);
    }

    #[test]
    fn test_duration_window() {
        let today = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();

        let industrial = base_policy(PlanType::Industrial);
        let (start, end) = industrial.duration_window(today).unwrap();
        assert_eq!(start, today);
        assert_eq!(end, NaiveDate::from_ymd_opt(2025, 4, 1).unwrap());

        let mastery = base_policy(PlanType::Mastery);
        let (_, end) = mastery.duration_window(today).unwrap();
        assert_eq!(end, today + chrono::Duration::days(180));

        // Basic has no validity window
        assert!(base_policy(PlanType::Basic).duration_window(today).is_none());
    }
}
