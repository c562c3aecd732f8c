//! Course catalog, syllabus, and plan routes

use bson::doc;
use bytes::Bytes;
use http_body_util::Full;
use hyper::Response;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use crate::db::schemas::{
    AssessmentDoc, CourseDoc, PlanType, ASSESSMENT_COLLECTION, COURSE_COLLECTION,
};
use crate::plans;
use crate::server::AppState;
use crate::types::Result;

use super::respond;

/// Handle GET /api/courses
pub async fn list_courses(state: Arc<AppState>) -> Response<Full<Bytes>> {
    respond(list_courses_inner(state).await)
}

async fn list_courses_inner(state: Arc<AppState>) -> Result<serde_json::Value> {
    let mut courses: Vec<serde_json::Value> = Vec::new();

    if let Some(ref mongo) = state.mongo {
        let collection = mongo.collection::<CourseDoc>(COURSE_COLLECTION).await?;
        let docs = collection
            .find_many_with(doc! {}, Some(doc! { "title": 1 }), None)
            .await?;

        // Map course slug -> active assessment slug in one pass
        let assessments = mongo
            .collection::<AssessmentDoc>(ASSESSMENT_COLLECTION)
            .await?
            .find_many(doc! { "is_active": true })
            .await?;
        let assessment_by_course: HashMap<&str, &str> = assessments
            .iter()
            .filter_map(|a| {
                a.course_slug
                    .as_deref()
                    .map(|slug| (slug, a.slug.as_str()))
            })
            .collect();

        for course in &docs {
            courses.push(serialize_course(
                course,
                assessment_by_course.get(course.slug.as_str()).copied(),
            ));
        }
    }

    if courses.is_empty() {
        courses.push(json!({
            "slug": "data-science",
            "title": "Data Science & AI",
            "description": "Comprehensive curriculum covering Statistics, Python, Deep Learning, and Industrial Analytics.",
        }));
    }

    Ok(json!({ "courses": courses }))
}

fn serialize_course(course: &CourseDoc, assessment_slug: Option<&str>) -> serde_json::Value {
    json!({
        "slug": course.slug,
        "title": course.title,
        "description": course.description,
        "subject": course.subject,
        "icon": course.icon,
        "color": course.color,
        "students": course.students,
        "durationHours": course.duration_hours,
        "syllabus": course.syllabus,
        "competencies": course.competencies,
        "planHighlights": course.plan_highlights,
        "projectTitleSuggestions": course.project_title_suggestions,
        "assessmentSlug": assessment_slug,
    })
}

/// Handle GET /api/syllabus
pub fn get_syllabus() -> Response<Full<Bytes>> {
    let syllabus = json!({
        "syllabus": [
            {
                "title": "Month 1: Fundamentals",
                "source": "Harvard CS50 Adaptation",
                "topics": ["Python Basics", "Statistics", "Algorithms"],
            },
            {
                "title": "Month 2: Analysis",
                "source": "Microsoft Excel & PowerBI",
                "topics": ["Pivot Tables", "Dashboards", "Data Cleaning"],
            },
            {
                "title": "Month 3: AI Implementation",
                "source": "Google TensorFlow",
                "topics": ["Neural Networks", "Deep Learning", "Model Deployment"],
            },
        ]
    });

    super::json_response(&syllabus)
}

/// Handle GET /api/plans
pub async fn list_plans(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let mongo = state.mongo.as_ref();
    let mut plans_out = Vec::new();

    for plan in [PlanType::Basic, PlanType::Industrial, PlanType::Mastery] {
        let policy = plans::resolve_policy(mongo, plan).await;
        plans_out.push(serialize_plan(&policy));
    }

    super::json_response(&json!({ "plans": plans_out }))
}

fn serialize_plan(policy: &plans::PlanPolicy) -> serde_json::Value {
    json!({
        "key": policy.key.as_str(),
        "label": policy.label,
        "price": policy.price,
        "originalPrice": policy.original_price,
        "discountPercent": policy.discount_percent(),
        "currency": policy.currency,
        "requiresProject": policy.requires_project,
        "description": policy.description,
        "durationDays": policy.duration_days,
        "maxDurationDays": policy.max_duration_days,
        "defaultPreview": plans::certificate_preview(Default::default()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_plan_carries_discount() {
        let policy = plans::base_policy(PlanType::Basic);
        let value = serialize_plan(&policy);
        assert_eq!(value["key"], "basic");
        assert_eq!(value["discountPercent"], 38);
        assert_eq!(value["requiresProject"], false);
    }

    #[test]
    fn test_serialize_course_defaults() {
        let course = CourseDoc {
            slug: "data-science".to_string(),
            title: "Data Science & AI".to_string(),
            ..Default::default()
        };
        let value = serialize_course(&course, Some("ds-final"));
        assert_eq!(value["slug"], "data-science");
        assert_eq!(value["assessmentSlug"], "ds-final");
        assert_eq!(value["students"], 0);
    }
}
