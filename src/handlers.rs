use std::collections::BTreeMap;
use std::str::FromStr;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::{Json, response::IntoResponse};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;
use utoipa::ToSchema;

use crate::backend::DashboardView;
use crate::calendar::MonthGrid;
use crate::error::{ApiError, ErrorBody};
use crate::filter;
use crate::inflight::MutationTicket;
use crate::lesson_form::{FormMode, FormView, LessonForm, LessonKind, resolve_date};
use crate::models::{
    ExamPeriod, ExamScore, Lesson, LoginRequest, LoginUser, ReferenceTables, StatusChange,
};
use crate::records::{
    self, Application, Approval, Car, Classroom, Collection, Exam, Group, Instructor, Resource,
    Student, Teacher,
};
use crate::session::Session;
use crate::{AppState, auth::Authorized, de, validation};

const LESSONS: &str = "lessons";
const LECTURES: &str = "lectures";

type RawQuery = BTreeMap<String, String>;

#[derive(Debug, Deserialize)]
pub struct FormQuery {
    pub date: Option<String>,
    pub lesson_id: Option<i64>,
}

/// A new lesson: the form plus the calendar day it was opened from.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LessonSubmission {
    #[serde(flatten)]
    pub form: LessonForm,
    #[schema(example = "2024-05-10")]
    pub date: Option<String>,
}

fn parse_param<T: FromStr>(query: &RawQuery, key: &str) -> Result<Option<T>, ApiError> {
    match query.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ApiError::BadRequest(format!("Invalid {key}: {raw}"))),
    }
}

fn parse_clicked_date(raw: Option<&str>) -> Result<Option<NaiveDate>, ApiError> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => de::parse_date(raw)
            .map(Some)
            .ok_or_else(|| ApiError::BadRequest(format!("Invalid date: {raw}"))),
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn begin_mutation(state: &AppState, collection: &str, key: &str) -> Result<MutationTicket, ApiError> {
    state.guard.acquire(collection, key).ok_or_else(|| {
        ApiError::Conflict(format!(
            "Another change to {collection}/{key} is still in progress"
        ))
    })
}

async fn lessons_and_references(
    state: &AppState,
    session: &Session,
) -> Result<(Vec<Lesson>, ReferenceTables), ApiError> {
    let (lessons, refs) = futures::join!(
        state.backend.lessons(session),
        state.backend.reference_tables(session)
    );
    Ok((lessons?, refs))
}

async fn find_lesson(
    state: &AppState,
    session: &Session,
    lesson_id: i64,
) -> Result<(Lesson, ReferenceTables), ApiError> {
    let (lessons, refs) = lessons_and_references(state, session).await?;
    let lesson = lessons
        .into_iter()
        .find(|lesson| lesson.lesson_id == lesson_id)
        .ok_or_else(|| ApiError::NotFound(format!("Lesson {lesson_id} not found")))?;
    Ok((lesson, refs))
}

#[utoipa::path(get, path = "/", tag = "console")]
pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "Driving School Console API",
        "endpoints": {
            "/lessons": "Lessons visible to the caller, filtered by query parameters",
            "/lessons/calendar": "Month calendar of lessons",
            "/lessons/form": "Lesson form defaults or an existing lesson for editing",
            "/lessons.ical": "Download lessons as iCal file",
            "/records/{collection}": "Filtered admin records",
            "/applications/{id}/approve": "Approve an application and enroll the student",
            "/me/{view}": "Instructor and teacher dashboard lists",
            "/lectures": "Lecture files",
            "/references": "Lesson types, statuses and topics"
        }
    }))
}

#[utoipa::path(get, path = "/healthz/live", tag = "console")]
pub async fn healthz_live() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

#[utoipa::path(get, path = "/healthz/ready", tag = "console")]
pub async fn healthz_ready() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated user", body = LoginUser),
        (status = 403, description = "Access denied", body = ErrorBody),
        (status = 502, description = "Backend unreachable", body = ErrorBody)
    ),
    tag = "session"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(credentials): Json<LoginRequest>,
) -> Result<Json<LoginUser>, ApiError> {
    let user = state.backend.login(&credentials).await?;
    info!(username = %user.username, role = %user.role, "user logged in");
    Ok(Json(user))
}

#[utoipa::path(
    get,
    path = "/references",
    responses(
        (status = 200, description = "Reference tables", body = ReferenceTables),
        (status = 401, description = "Invalid authentication token", body = ErrorBody)
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "lessons"
)]
pub async fn get_references(
    State(state): State<AppState>,
    Authorized(session): Authorized,
) -> Json<ReferenceTables> {
    Json(state.backend.reference_tables(&session).await)
}

#[utoipa::path(
    get,
    path = "/lessons",
    params(
        ("startDate" = Option<String>, Query, description = "Lesson day or prefix of it (YYYY-MM-DD, YYYY-MM)"),
        ("groupId" = Option<i64>, Query, description = "Group id"),
        ("type" = Option<String>, Query, description = "theory or practice"),
        ("instructorId" = Option<i64>, Query, description = "Instructor id"),
        ("status" = Option<String>, Query, description = "Lesson status label"),
        ("classroom" = Option<String>, Query, description = "Classroom name"),
        ("token" = Option<String>, Query, description = "Authentication token (alternative to Bearer header)")
    ),
    responses(
        (status = 200, description = "Lessons matching every filter", body = [Lesson]),
        (status = 401, description = "Invalid authentication token", body = ErrorBody),
        (status = 403, description = "Access denied", body = ErrorBody)
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "lessons"
)]
pub async fn list_lessons(
    State(state): State<AppState>,
    Authorized(session): Authorized,
    Query(query): Query<RawQuery>,
) -> Result<Json<Vec<Lesson>>, ApiError> {
    let lessons = state.backend.lessons(&session).await?;
    let criteria = filter::criteria_for::<Lesson>(&query);
    Ok(Json(filter::apply(&lessons, &criteria)))
}

#[utoipa::path(
    get,
    path = "/lessons/calendar",
    params(
        ("year" = Option<i32>, Query, description = "Year, defaults to the current year"),
        ("month" = Option<u32>, Query, description = "Month (1-12), defaults to the current month"),
        ("token" = Option<String>, Query, description = "Authentication token (alternative to Bearer header)")
    ),
    responses(
        (status = 200, description = "Month grid with lessons", body = MonthGrid),
        (status = 400, description = "Invalid year or month", body = ErrorBody),
        (status = 401, description = "Invalid authentication token", body = ErrorBody)
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "lessons"
)]
pub async fn get_calendar(
    State(state): State<AppState>,
    Authorized(session): Authorized,
    Query(query): Query<RawQuery>,
) -> Result<Json<MonthGrid>, ApiError> {
    let today = today();
    let (year, month) = validation::calendar_month(
        parse_param(&query, "year")?,
        parse_param(&query, "month")?,
        today,
    )?;

    let lessons = state.backend.lessons(&session).await?;
    let criteria = filter::criteria_for::<Lesson>(&query);
    let lessons = filter::apply(&lessons, &criteria);
    Ok(Json(MonthGrid::build(year, month, today, &lessons)?))
}

#[utoipa::path(
    get,
    path = "/lessons/form",
    params(
        ("date" = Option<String>, Query, description = "Calendar day the form was opened from"),
        ("lesson_id" = Option<i64>, Query, description = "Lesson to edit"),
        ("token" = Option<String>, Query, description = "Authentication token (alternative to Bearer header)")
    ),
    responses(
        (status = 200, description = "Form state", body = FormView),
        (status = 404, description = "Lesson not found", body = ErrorBody)
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "lessons"
)]
pub async fn get_lesson_form(
    State(state): State<AppState>,
    Authorized(session): Authorized,
    Query(query): Query<FormQuery>,
) -> Result<Json<FormView>, ApiError> {
    let clicked = parse_clicked_date(query.date.as_deref())?;
    let view = match query.lesson_id {
        Some(lesson_id) => {
            let (lesson, refs) = find_lesson(&state, &session, lesson_id).await?;
            let date = resolve_date(Some(&lesson), clicked, today());
            FormView::new(
                FormMode::Edit,
                Some(lesson_id),
                date,
                LessonForm::from_lesson(&lesson),
                &refs,
            )
        }
        None => {
            let refs = state.backend.reference_tables(&session).await;
            let now = Local::now();
            let date = resolve_date(None, clicked, now.date_naive());
            FormView::new(
                FormMode::Add,
                None,
                date,
                LessonForm::blank(&refs, now.time()),
                &refs,
            )
        }
    };
    Ok(Json(view))
}

#[utoipa::path(
    post,
    path = "/lessons",
    request_body = LessonSubmission,
    responses(
        (status = 201, description = "Lesson created"),
        (status = 400, description = "Form rejected before reaching the backend", body = ErrorBody),
        (status = 403, description = "Access denied", body = ErrorBody)
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "lessons"
)]
pub async fn create_lesson(
    State(state): State<AppState>,
    Authorized(session): Authorized,
    Json(submission): Json<LessonSubmission>,
) -> Result<impl IntoResponse, ApiError> {
    let clicked = parse_clicked_date(submission.date.as_deref())?;
    let refs = state.backend.reference_tables(&session).await;
    let date = resolve_date(None, clicked, today());
    let payload = submission.form.submission(&refs, date)?;

    let created = state.backend.create_lesson(&session, &payload).await?;
    info!(start = %payload.start_time, "lesson created");
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    put,
    path = "/lessons/{id}",
    params(("id" = i64, Path, description = "Lesson id")),
    request_body = LessonForm,
    responses(
        (status = 200, description = "Lesson updated"),
        (status = 400, description = "Form rejected before reaching the backend", body = ErrorBody),
        (status = 404, description = "Lesson not found", body = ErrorBody),
        (status = 409, description = "Lesson is already being changed", body = ErrorBody)
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "lessons"
)]
pub async fn update_lesson(
    State(state): State<AppState>,
    Authorized(session): Authorized,
    Path(lesson_id): Path<i64>,
    Json(form): Json<LessonForm>,
) -> Result<Json<Value>, ApiError> {
    let _ticket = begin_mutation(&state, LESSONS, &lesson_id.to_string())?;
    let (lesson, refs) = find_lesson(&state, &session, lesson_id).await?;
    let date = resolve_date(Some(&lesson), None, today());
    let payload = form.submission(&refs, date)?;

    let updated = state
        .backend
        .update_lesson(&session, lesson_id, &payload)
        .await?;
    info!(lesson_id, "lesson updated");
    Ok(Json(updated))
}

#[utoipa::path(
    delete,
    path = "/lessons/{id}",
    params(("id" = i64, Path, description = "Lesson id")),
    responses(
        (status = 204, description = "Lesson deleted"),
        (status = 409, description = "Lesson is already being changed", body = ErrorBody)
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "lessons"
)]
pub async fn delete_lesson(
    State(state): State<AppState>,
    Authorized(session): Authorized,
    Path(lesson_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let _ticket = begin_mutation(&state, LESSONS, &lesson_id.to_string())?;
    state.backend.delete_lesson(&session, lesson_id).await?;
    info!(lesson_id, "lesson deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    put,
    path = "/lessons/{id}/status",
    params(("id" = i64, Path, description = "Lesson id")),
    request_body = StatusChange,
    responses(
        (status = 200, description = "Status changed"),
        (status = 409, description = "Lesson is already being changed", body = ErrorBody)
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "lessons"
)]
pub async fn update_lesson_status(
    State(state): State<AppState>,
    Authorized(session): Authorized,
    Path(lesson_id): Path<i64>,
    Json(change): Json<StatusChange>,
) -> Result<Json<Value>, ApiError> {
    let _ticket = begin_mutation(&state, LESSONS, &lesson_id.to_string())?;
    let updated = state
        .backend
        .update_lesson_status(&session, lesson_id, change.status_id)
        .await?;
    info!(lesson_id, status_id = change.status_id, "lesson status changed");
    Ok(Json(updated))
}

#[utoipa::path(
    get,
    path = "/lessons.ical",
    params(
        ("token" = Option<String>, Query, description = "Authentication token (alternative to Bearer header)")
    ),
    responses(
        (status = 200, description = "iCal file", content_type = "text/calendar"),
        (status = 401, description = "Invalid authentication token", body = ErrorBody),
        (status = 404, description = "No lessons found", body = ErrorBody)
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "lessons"
)]
pub async fn get_ical(
    State(state): State<AppState>,
    Authorized(session): Authorized,
) -> Result<impl IntoResponse, ApiError> {
    let (lessons, refs) = lessons_and_references(&state, &session).await?;
    let body = state.exporter.generate(&lessons, &refs);
    if body.is_empty() {
        return Err(ApiError::NotFound("No lessons found".into()));
    }

    Ok((
        StatusCode::OK,
        [
            ("content-type", "text/calendar"),
            (
                "content-disposition",
                "attachment; filename=driving_school_lessons.ics",
            ),
        ],
        body,
    ))
}

async fn list_filtered<R: Resource>(
    state: &AppState,
    session: &Session,
    query: &RawQuery,
) -> Result<Value, ApiError> {
    let rows = state.backend.list_rows::<R>(session).await?;
    let rows = records::filter_rows::<R>(rows, &filter::criteria_for::<R>(query))
        .map_err(|err| ApiError::BadGateway(format!("Unexpected backend response: {err}")))?;
    Ok(Value::Array(rows))
}

async fn create_record<R: Resource>(
    state: &AppState,
    session: &Session,
    body: &Value,
) -> Result<Value, ApiError> {
    Ok(state.backend.create::<R, _>(session, body).await?)
}

async fn update_record<R: Resource>(
    state: &AppState,
    session: &Session,
    key: &str,
    body: &Value,
) -> Result<Value, ApiError> {
    Ok(state.backend.update::<R, _>(session, key, body).await?)
}

async fn delete_record<R: Resource>(
    state: &AppState,
    session: &Session,
    key: &str,
) -> Result<(), ApiError> {
    Ok(state.backend.delete::<R>(session, key).await?)
}

/// Runs a generic record operation for the record type behind `$collection`.
macro_rules! for_collection {
    ($collection:expr, $op:ident($($arg:expr),*)) => {
        match $collection {
            Collection::Applications => $op::<Application>($($arg),*).await,
            Collection::Students => $op::<Student>($($arg),*).await,
            Collection::Instructors => $op::<Instructor>($($arg),*).await,
            Collection::Teachers => $op::<Teacher>($($arg),*).await,
            Collection::Groups => $op::<Group>($($arg),*).await,
            Collection::Classrooms => $op::<Classroom>($($arg),*).await,
            Collection::Exams => $op::<Exam>($($arg),*).await,
            Collection::Cars => $op::<Car>($($arg),*).await,
        }
    };
}

#[utoipa::path(
    get,
    path = "/records/{collection}",
    params(
        ("collection" = String, Path, description = "applications, students, instructors, teachers, groups, classrooms, exams or cars"),
        ("token" = Option<String>, Query, description = "Authentication token (alternative to Bearer header)")
    ),
    responses(
        (status = 200, description = "Records matching every filter"),
        (status = 404, description = "Unknown collection", body = ErrorBody)
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "records"
)]
pub async fn list_records(
    State(state): State<AppState>,
    Authorized(session): Authorized,
    Path(collection): Path<String>,
    Query(query): Query<RawQuery>,
) -> Result<Json<Value>, ApiError> {
    let collection = validation::validate_collection(&collection)?;
    let records = for_collection!(collection, list_filtered(&state, &session, &query))?;
    Ok(Json(records))
}

#[utoipa::path(
    post,
    path = "/records/{collection}",
    params(("collection" = String, Path, description = "Record collection")),
    responses(
        (status = 201, description = "Record created"),
        (status = 404, description = "Unknown collection", body = ErrorBody),
        (status = 405, description = "Applications are approved, not created", body = ErrorBody)
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "records"
)]
pub async fn create_record_handler(
    State(state): State<AppState>,
    Authorized(session): Authorized,
    Path(collection): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let collection = validation::validate_collection(&collection)?;
    if collection == Collection::Applications {
        return Err(ApiError::MethodNotAllowed(
            "Applications cannot be created by the console; approve them with POST /applications/{id}/approve".into(),
        ));
    }
    let created = for_collection!(collection, create_record(&state, &session, &body))?;
    info!(collection = collection.name(), "record created");
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    put,
    path = "/records/{collection}/{key}",
    params(
        ("collection" = String, Path, description = "Record collection"),
        ("key" = String, Path, description = "Record key (TIN for students and instructors)")
    ),
    responses(
        (status = 200, description = "Record updated"),
        (status = 409, description = "Record is already being changed", body = ErrorBody)
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "records"
)]
pub async fn update_record_handler(
    State(state): State<AppState>,
    Authorized(session): Authorized,
    Path((collection, key)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let collection = validation::validate_collection(&collection)?;
    let _ticket = begin_mutation(&state, collection.name(), &key)?;
    let updated = for_collection!(collection, update_record(&state, &session, &key, &body))?;
    info!(collection = collection.name(), %key, "record updated");
    Ok(Json(updated))
}

#[utoipa::path(
    delete,
    path = "/records/{collection}/{key}",
    params(
        ("collection" = String, Path, description = "Record collection"),
        ("key" = String, Path, description = "Record key")
    ),
    responses(
        (status = 204, description = "Record deleted"),
        (status = 409, description = "Record is already being changed", body = ErrorBody)
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "records"
)]
pub async fn delete_record_handler(
    State(state): State<AppState>,
    Authorized(session): Authorized,
    Path((collection, key)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let collection = validation::validate_collection(&collection)?;
    let _ticket = begin_mutation(&state, collection.name(), &key)?;
    for_collection!(collection, delete_record(&state, &session, &key))?;
    info!(collection = collection.name(), %key, "record deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/me/{view}",
    params(("view" = DashboardView, Path, description = "students, exams, groups or car")),
    responses(
        (status = 200, description = "Dashboard list for the caller"),
        (status = 404, description = "View not available for the caller's role", body = ErrorBody)
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "dashboard"
)]
pub async fn get_dashboard(
    State(state): State<AppState>,
    Authorized(session): Authorized,
    Path(view): Path<DashboardView>,
) -> Result<Json<Value>, ApiError> {
    state
        .backend
        .dashboard(&session, view)
        .await?
        .map(Json)
        .ok_or_else(|| {
            ApiError::NotFound(format!("No {view} view for role {}", session.role))
        })
}

#[utoipa::path(
    get,
    path = "/lectures",
    responses((status = 200, description = "Lecture files")),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "dashboard"
)]
pub async fn get_lectures(
    State(state): State<AppState>,
    Authorized(session): Authorized,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.backend.lectures(&session).await?))
}

#[utoipa::path(
    get,
    path = "/analytics",
    responses((status = 200, description = "Analytics dashboard")),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "dashboard"
)]
pub async fn get_analytics(
    State(state): State<AppState>,
    Authorized(session): Authorized,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.backend.analytics(&session).await?))
}

#[utoipa::path(
    post,
    path = "/applications/{id}/approve",
    params(("id" = String, Path, description = "Application id")),
    request_body = Approval,
    responses(
        (status = 200, description = "Application approved and student record created"),
        (status = 400, description = "Missing group or instructor", body = ErrorBody),
        (status = 404, description = "Application not found", body = ErrorBody),
        (status = 409, description = "Already approved or being changed", body = ErrorBody)
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "records"
)]
pub async fn approve_application(
    State(state): State<AppState>,
    Authorized(session): Authorized,
    Path(application_id): Path<String>,
    Json(approval): Json<Approval>,
) -> Result<Json<Value>, ApiError> {
    let _ticket = begin_mutation(&state, Application::NAME, &application_id)?;
    let applications = state.backend.list::<Application>(&session).await?;
    let application = applications
        .iter()
        .find(|a| a.key().as_deref() == Some(application_id.as_str()))
        .ok_or_else(|| ApiError::NotFound(format!("Application {application_id} not found")))?;
    let enrollment = application.enrollment(&approval)?;

    let approved = state
        .backend
        .approve_application(&session, &enrollment)
        .await?;
    info!(%application_id, theory = application.is_theory(), "application approved");
    Ok(Json(approved))
}

#[utoipa::path(
    put,
    path = "/me/students/{student_id}/exam-score",
    params(("student_id" = i64, Path, description = "Student on the caller's roster")),
    request_body = ExamScore,
    responses(
        (status = 200, description = "Score saved"),
        (status = 400, description = "Score outside 0-100", body = ErrorBody),
        (status = 404, description = "Role keeps no student roster", body = ErrorBody),
        (status = 409, description = "Score is already being changed", body = ErrorBody)
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "dashboard"
)]
pub async fn update_exam_score(
    State(state): State<AppState>,
    Authorized(session): Authorized,
    Path(student_id): Path<i64>,
    Json(score): Json<ExamScore>,
) -> Result<Json<Value>, ApiError> {
    if !score.is_valid() {
        return Err(ApiError::BadRequest(format!(
            "Exam score must be a number between 0 and {}",
            ExamScore::MAX
        )));
    }
    let _ticket = begin_mutation(&state, Student::NAME, &student_id.to_string())?;
    let updated = state
        .backend
        .update_exam_score(&session, student_id, &score)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No student roster for role {}", session.role)))?;
    info!(student_id, score = ?score.exam_score, "exam score updated");
    Ok(Json(updated))
}

#[utoipa::path(
    get,
    path = "/me/exams/stats",
    responses(
        (status = 200, description = "Exam counters for the instructor"),
        (status = 404, description = "Only instructors have exam stats", body = ErrorBody)
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "dashboard"
)]
pub async fn get_exam_stats(
    State(state): State<AppState>,
    Authorized(session): Authorized,
) -> Result<Json<Value>, ApiError> {
    state
        .backend
        .exam_stats(&session)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No exam stats for role {}", session.role)))
}

#[utoipa::path(
    get,
    path = "/me/exams/period",
    params(
        ("start_date" = Option<String>, Query, description = "First exam day (YYYY-MM-DD)"),
        ("end_date" = Option<String>, Query, description = "Last exam day (YYYY-MM-DD)"),
        ("type" = Option<String>, Query, description = "theory or practice")
    ),
    responses(
        (status = 200, description = "Instructor exams in the period"),
        (status = 400, description = "Invalid period", body = ErrorBody),
        (status = 404, description = "Only instructors have an exam list", body = ErrorBody)
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "dashboard"
)]
pub async fn get_exams_in_period(
    State(state): State<AppState>,
    Authorized(session): Authorized,
    Query(query): Query<RawQuery>,
) -> Result<Json<Value>, ApiError> {
    let kind = match query.get("type").map(|v| v.trim()).filter(|v| !v.is_empty()) {
        None => None,
        Some(raw) => Some(
            LessonKind::from_label(raw)
                .ok_or_else(|| ApiError::BadRequest(format!("Invalid type: {raw}")))?,
        ),
    };
    let period = ExamPeriod {
        start_date: parse_clicked_date(query.get("start_date").map(String::as_str))?,
        end_date: parse_clicked_date(query.get("end_date").map(String::as_str))?,
        kind,
    };
    if !period.is_ordered() {
        return Err(ApiError::BadRequest(
            "start_date must not be after end_date".into(),
        ));
    }

    state
        .backend
        .exams_in_period(&session, &period)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No exam list for role {}", session.role)))
}

#[utoipa::path(
    get,
    path = "/lectures/{id}",
    params(("id" = i64, Path, description = "Lecture file id")),
    responses(
        (status = 200, description = "Lecture PDF", content_type = "application/pdf"),
        (status = 404, description = "Lecture not found", body = ErrorBody)
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "dashboard"
)]
pub async fn get_lecture_file(
    State(state): State<AppState>,
    Authorized(session): Authorized,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let file = state.backend.lecture_file(&session, id).await?;
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, file.content_type);
    if let Some(disposition) = file.content_disposition {
        headers.insert(header::CONTENT_DISPOSITION, disposition);
    }
    Ok((StatusCode::OK, headers, file.bytes))
}

#[utoipa::path(
    get,
    path = "/lectures/{id}/info",
    params(("id" = i64, Path, description = "Lecture file id")),
    responses(
        (status = 200, description = "Lecture file metadata"),
        (status = 404, description = "Lecture not found", body = ErrorBody)
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "dashboard"
)]
pub async fn get_lecture_info(
    State(state): State<AppState>,
    Authorized(session): Authorized,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.backend.lecture_info(&session, id).await?))
}

#[utoipa::path(
    delete,
    path = "/lectures/{id}",
    params(("id" = i64, Path, description = "Lecture file id")),
    responses(
        (status = 204, description = "Lecture deleted"),
        (status = 404, description = "Lecture not found", body = ErrorBody),
        (status = 409, description = "Lecture is already being deleted", body = ErrorBody)
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "dashboard"
)]
pub async fn delete_lecture(
    State(state): State<AppState>,
    Authorized(session): Authorized,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let _ticket = begin_mutation(&state, LECTURES, &id.to_string())?;
    state.backend.delete_lecture(&session, id).await?;
    info!(lecture_id = id, "lecture deleted");
    Ok(StatusCode::NO_CONTENT)
}
