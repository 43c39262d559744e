pub mod auth;
pub mod backend;
pub mod calendar;
pub mod de;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod ical;
pub mod inflight;
pub mod lesson_form;
pub mod models;
pub mod openapi;
pub mod records;
pub mod session;
pub mod settings;
pub mod validation;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
};
use handlers::{
    approve_application, create_lesson, create_record_handler, delete_lecture, delete_lesson,
    delete_record_handler, get_analytics, get_calendar, get_dashboard, get_exam_stats,
    get_exams_in_period, get_ical, get_lecture_file, get_lecture_info, get_lectures,
    get_lesson_form, get_references, healthz_live, healthz_ready, list_lessons, list_records,
    login, root, update_exam_score, update_lesson, update_lesson_status, update_record_handler,
};
use tower_http::LatencyUnit;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, info};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::backend::BackendClient;
use crate::ical::ScheduleExporter;
use crate::inflight::MutationGuard;
use crate::openapi::ApiDoc;
use crate::settings::Settings;

#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub backend: Arc<BackendClient>,
    pub exporter: Arc<ScheduleExporter>,
    pub guard: MutationGuard,
}

impl AppState {
    pub fn new(settings: Settings) -> Result<Self, backend::BackendError> {
        let backend = BackendClient::new(settings.backend_base_url.clone())?;
        let exporter = ScheduleExporter::new(settings.calendar_name.clone());
        Ok(Self {
            settings,
            backend: Arc::new(backend),
            exporter: Arc::new(exporter),
            guard: MutationGuard::new(),
        })
    }
}

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;

    let env_filter = if settings.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .without_time()
        .init();

    let state = AppState::new(settings)?;
    info!(backend = %state.backend.base_url(), "using school backend");

    let app = build_router(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], state.settings.port));
    info!("Starting Driving School Console API on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(LatencyUnit::Millis),
        );

    let mut router = Router::new()
        .route("/", get(root))
        .route("/healthz/live", get(healthz_live))
        .route("/healthz/ready", get(healthz_ready))
        .route("/login", post(login))
        .route("/references", get(get_references))
        .route("/lessons", get(list_lessons).post(create_lesson))
        .route("/lessons/calendar", get(get_calendar))
        .route("/lessons/form", get(get_lesson_form))
        .route("/lessons/{id}", put(update_lesson).delete(delete_lesson))
        .route("/lessons/{id}/status", put(update_lesson_status))
        .route("/lessons.ical", get(get_ical))
        .route(
            "/records/{collection}",
            get(list_records).post(create_record_handler),
        )
        .route(
            "/records/{collection}/{key}",
            put(update_record_handler).delete(delete_record_handler),
        )
        .route("/applications/{id}/approve", post(approve_application))
        .route("/me/{view}", get(get_dashboard))
        .route("/me/exams/stats", get(get_exam_stats))
        .route("/me/exams/period", get(get_exams_in_period))
        .route(
            "/me/students/{student_id}/exam-score",
            put(update_exam_score),
        )
        .route("/lectures", get(get_lectures))
        .route("/lectures/{id}", get(get_lecture_file).delete(delete_lecture))
        .route("/lectures/{id}/info", get(get_lecture_info))
        .route("/analytics", get(get_analytics))
        .with_state(state.clone());

    if state.settings.enable_swagger {
        let openapi = ApiDoc::openapi();
        let swagger = SwaggerUi::new("/docs").url("/openapi.json", openapi);
        router = router.merge(swagger);
    }

    router.layer(trace_layer).layer(CorsLayer::permissive())
}
