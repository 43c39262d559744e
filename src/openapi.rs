use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::backend::DashboardView;
use crate::calendar::{DayCell, MonthGrid, MonthRef};
use crate::error::ErrorBody;
use crate::handlers::LessonSubmission;
use crate::lesson_form::{FormMode, FormView, LessonForm, LessonKind, LessonPayload};
use crate::models::{
    ExamScore, Lesson, LessonStatus, LessonTopic, LessonType, LoginRequest, LoginUser,
    ReferenceTables, StatusChange,
};
use crate::records::Approval;
use crate::session::Role;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
        components.add_security_scheme(
            "query_token",
            SecurityScheme::ApiKey(ApiKey::Query(ApiKeyValue::new("token"))),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::healthz_live,
        crate::handlers::healthz_ready,
        crate::handlers::login,
        crate::handlers::get_references,
        crate::handlers::list_lessons,
        crate::handlers::get_calendar,
        crate::handlers::get_lesson_form,
        crate::handlers::create_lesson,
        crate::handlers::update_lesson,
        crate::handlers::delete_lesson,
        crate::handlers::update_lesson_status,
        crate::handlers::get_ical,
        crate::handlers::list_records,
        crate::handlers::create_record_handler,
        crate::handlers::update_record_handler,
        crate::handlers::delete_record_handler,
        crate::handlers::get_dashboard,
        crate::handlers::get_lectures,
        crate::handlers::get_analytics,
        crate::handlers::approve_application,
        crate::handlers::update_exam_score,
        crate::handlers::get_exam_stats,
        crate::handlers::get_exams_in_period,
        crate::handlers::get_lecture_file,
        crate::handlers::get_lecture_info,
        crate::handlers::delete_lecture
    ),
    components(schemas(
        Lesson,
        LessonKind,
        LessonType,
        LessonStatus,
        LessonTopic,
        ReferenceTables,
        MonthGrid,
        MonthRef,
        DayCell,
        LessonForm,
        LessonPayload,
        LessonSubmission,
        FormView,
        FormMode,
        StatusChange,
        LoginRequest,
        LoginUser,
        Role,
        DashboardView,
        Approval,
        ExamScore,
        ErrorBody
    )),
    tags(
        (name = "console", description = "Service information"),
        (name = "session", description = "Login against the school backend"),
        (name = "lessons", description = "Lesson calendar, filters and scheduling"),
        (name = "records", description = "Filtered admin record lists"),
        (name = "dashboard", description = "Instructor and teacher dashboards")
    ),
    modifiers(&SecurityAddon),
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_console_routes() {
        let doc = ApiDoc::openapi();
        for path in [
            "/lessons",
            "/lessons/calendar",
            "/records/{collection}",
            "/me/{view}",
            "/applications/{id}/approve",
            "/me/students/{student_id}/exam-score",
            "/lectures/{id}/info",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(components.schemas.contains_key("MonthGrid"));
    }
}
