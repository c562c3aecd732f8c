//! Assessment routes: listing, question delivery, and submission grading

use bson::doc;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use crate::db::schemas::{
    AssessmentAttemptDoc, AssessmentDoc, AttemptResponse, CourseDoc, ASSESSMENT_COLLECTION,
    ATTEMPT_COLLECTION, COURSE_COLLECTION,
};
use crate::grading::{self, fallback, Question, SubmittedResponse};
use crate::server::AppState;
use crate::types::{ApiError, Result};

use super::{parse_query_params, read_json, respond};

/// Pick the assessment for a request: explicit slug first, then course,
/// then the first active one.
async fn get_assessment(
    state: &AppState,
    course_slug: Option<&str>,
    assessment_slug: Option<&str>,
) -> Result<Option<AssessmentDoc>> {
    let Some(ref mongo) = state.mongo else {
        return Ok(None);
    };

    let collection = mongo
        .collection::<AssessmentDoc>(ASSESSMENT_COLLECTION)
        .await?;

    let mut filter = doc! { "is_active": true };
    if let Some(slug) = assessment_slug.filter(|s| !s.is_empty()) {
        filter.insert("slug", slug);
    } else if let Some(course) = course_slug.filter(|s| !s.is_empty()) {
        filter.insert("course_slug", course);
    }

    collection.find_one(filter).await
}

/// Handle GET /api/assessments
pub async fn list_assessments(state: Arc<AppState>, query: Option<&str>) -> Response<Full<Bytes>> {
    respond(list_assessments_inner(state, query).await)
}

async fn list_assessments_inner(
    state: Arc<AppState>,
    query: Option<&str>,
) -> Result<serde_json::Value> {
    let params = parse_query_params(query.unwrap_or(""));
    let course_filter = params.get("course").filter(|s| !s.is_empty());

    let mut assessments_out = Vec::new();

    if let Some(ref mongo) = state.mongo {
        let mut filter = doc! { "is_active": true };
        if let Some(course) = course_filter {
            filter.insert("course_slug", course.as_str());
        }

        let assessments = mongo
            .collection::<AssessmentDoc>(ASSESSMENT_COLLECTION)
            .await?
            .find_many_with(filter, Some(doc! { "title": 1 }), None)
            .await?;

        let courses = mongo
            .collection::<CourseDoc>(COURSE_COLLECTION)
            .await?
            .find_many(doc! {})
            .await?;
        let titles: HashMap<&str, &str> = courses
            .iter()
            .map(|c| (c.slug.as_str(), c.title.as_str()))
            .collect();

        for assessment in &assessments {
            let course_title = assessment
                .course_slug
                .as_deref()
                .and_then(|slug| titles.get(slug).copied());
            assessments_out.push(json!({
                "slug": assessment.slug,
                "courseSlug": assessment.course_slug,
                "courseTitle": course_title,
                "title": assessment.title,
                "durationMinutes": assessment.duration_minutes,
                "passThreshold": assessment.pass_threshold,
                "instructions": assessment.instructions,
                "questionCount": assessment.questions.len(),
            }));
        }
    }

    Ok(json!({ "assessments": assessments_out }))
}

/// Handle GET /api/assessment/questions
///
/// Answers are stripped before questions leave the server.
pub async fn list_questions(state: Arc<AppState>, query: Option<&str>) -> Response<Full<Bytes>> {
    respond(list_questions_inner(state, query).await)
}

async fn list_questions_inner(
    state: Arc<AppState>,
    query: Option<&str>,
) -> Result<serde_json::Value> {
    let params = parse_query_params(query.unwrap_or(""));
    let course_slug = params.get("course").map(String::as_str);
    let assessment_slug = params.get("assessment").map(String::as_str);

    let assessment = get_assessment(&state, course_slug, assessment_slug).await?;

    let (questions, duration, pass_score, out_course, out_assessment) = match assessment {
        Some(ref a) if !a.questions.is_empty() => {
            let questions: Vec<Question> =
                a.ordered_questions().into_iter().map(Question::from).collect();
            (
                questions,
                a.duration_minutes,
                a.pass_threshold,
                a.course_slug.clone(),
                Some(a.slug.clone()),
            )
        }
        _ => (
            fallback::fallback_questions(),
            fallback::FALLBACK_DURATION_MINUTES,
            fallback::FALLBACK_PASS_THRESHOLD,
            course_slug.map(str::to_string),
            assessment_slug.map(str::to_string),
        ),
    };

    let sanitized: Vec<serde_json::Value> = questions
        .iter()
        .map(|q| {
            json!({
                "id": q.id,
                "question": q.prompt,
                "options": q.options,
            })
        })
        .collect();

    Ok(json!({
        "questions": sanitized,
        "timeLimitMinutes": duration,
        "passingScorePercent": pass_score,
        "courseSlug": out_course,
        "assessmentSlug": out_assessment,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitRequest {
    #[serde(default)]
    responses: Vec<SubmittedResponse>,
    #[serde(default)]
    course_slug: Option<String>,
    #[serde(default)]
    assessment_slug: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

/// Handle POST /api/assessment/submit
pub async fn submit_assessment(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    respond(submit_assessment_inner(state, req).await)
}

async fn submit_assessment_inner(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Result<serde_json::Value> {
    let payload: SubmitRequest = read_json(req).await?;

    if payload.responses.is_empty() {
        return Err(ApiError::Validation("Responses list is required.".to_string()));
    }

    let assessment = get_assessment(
        &state,
        payload.course_slug.as_deref(),
        payload.assessment_slug.as_deref(),
    )
    .await?;

    let (bank, threshold) = match assessment {
        Some(ref a) if !a.questions.is_empty() => {
            let bank: Vec<Question> = a.questions.iter().map(Question::from).collect();
            (bank, a.pass_threshold)
        }
        _ => (
            fallback::fallback_questions(),
            fallback::FALLBACK_PASS_THRESHOLD,
        ),
    };

    let result = grading::grade(&bank, &payload.responses, threshold)?;

    // Submissions against a real assessment are persisted; fallback-bank
    // submissions are not
    if let (Some(a), Some(mongo)) = (assessment.as_ref(), state.mongo.as_ref()) {
        let attempt = AssessmentAttemptDoc {
            assessment_slug: a.slug.clone(),
            email: payload.email.clone().unwrap_or_default(),
            score_percent: result.percentage,
            passed: result.passed,
            responses: payload
                .responses
                .iter()
                .map(|r| AttemptResponse {
                    id: r.id,
                    answer: r.answer.clone(),
                })
                .collect(),
            correct_count: result.correct,
            total_questions: result.total,
            ..Default::default()
        };
        mongo
            .collection::<AssessmentAttemptDoc>(ATTEMPT_COLLECTION)
            .await?
            .insert_one(attempt)
            .await?;
    }

    let rounded = (result.percentage * 100.0).round() / 100.0;
    let next_route = if result.passed { "/results" } else { "/assessment" };

    Ok(json!({
        "correct": result.correct,
        "total": result.total,
        "percentage": rounded,
        "passed": result.passed,
        "nextRoute": next_route,
        "courseSlug": payload
            .course_slug
            .or_else(|| assessment.as_ref().and_then(|a| a.course_slug.clone())),
        "assessmentSlug": assessment.as_ref().map(|a| a.slug.clone()),
    }))
}
