use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Session, navigation and the remote API.
pub mod backend;
pub mod config;
pub mod guard;
pub mod session;

// Screen logic that runs locally.
pub mod exam;
pub mod fanout;
pub mod recorder;
pub mod transcript;

pub mod handlers;
pub mod models;

// Route groups, one per guard.
pub mod routes;
use routes::{admin, authenticated, professor, public};

// --- Public Re-exports ---

pub use backend::{BackendState, HttpBackend};
pub use config::AppConfig;
pub use exam::ExamRoom;
pub use session::{FileSessionStore, MemorySessionStore, SessionState};

/// ApiDoc
///
/// OpenAPI description of every screen endpoint, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::login_page, handlers::login, handlers::logout,
        handlers::get_me, handlers::dashboard, handlers::materia_detail,
        handlers::request_enrollment, handlers::open_exam, handlers::answer_question,
        handlers::start_recording, handlers::push_recording_chunk, handlers::stop_recording,
        handlers::submit_exam, handlers::libreta, handlers::print_libreta,
        handlers::list_exams, handlers::create_exam, handlers::delete_exam,
        handlers::list_submissions, handlers::grade_submission, handlers::upload_file,
        handlers::delete_file, handlers::add_video, handlers::delete_video,
        handlers::write_libreta,
        handlers::list_users, handlers::create_user, handlers::change_role,
        handlers::delete_user, handlers::create_materia, handlers::update_materia,
        handlers::delete_materia, handlers::pending_enrollments, handlers::approve_enrollment,
        handlers::reject_enrollment, handlers::all_libretas
    ),
    components(
        schemas(
            session::Role, models::User, models::NewUser, models::RoleChange,
            models::LoginRequest, models::Materia, models::MateriaInput, models::Archivo,
            models::Video, models::NewVideo, models::EstadoInscripcion, models::Inscripcion,
            models::QuestionKind, models::Pregunta, models::Examen, models::ExamenResumen,
            models::NewPregunta, models::NewExamen, models::Entrega, models::EntregaRespuesta,
            models::PuntajePregunta, models::Correccion, models::LibretaRow, models::LibretaEntry,
            models::ErrorView, models::LoginPageView, models::LoginView, models::MateriaCard,
            models::DashboardView, models::VideoView, models::MateriaView,
            models::TranscriptView, models::AnswerForm, models::SubmitView,
            exam::ExamDraftForm, exam::AttemptMode, exam::QuestionView, exam::AttemptView,
            recorder::RecorderStatus,
        )
    ),
    tags(
        (name = "aula-portal", description = "Virtual classroom front-end server")
    )
)]
struct ApiDoc;

/// AppState
///
/// Everything a screen handler can reach: the remote API, the stored session, the open
/// exam and the configuration.
#[derive(Clone)]
pub struct AppState {
    pub backend: BackendState,
    pub session: SessionState,
    pub exam_room: Arc<ExamRoom>,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// Lets the `PageContext` extractor read the session from the shared state.
impl FromRef<AppState> for SessionState {
    fn from_ref(app_state: &AppState) -> SessionState {
        app_state.session.clone()
    }
}

/// create_router
///
/// Assembles the screen routes, puts each group behind its guard and adds the
/// observability layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");
    let session = state.session.clone();

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                session.clone(),
                guard::require_authenticated,
            )),
        )
        .nest(
            "/profesor",
            professor::professor_routes().route_layer(middleware::from_fn_with_state(
                session.clone(),
                guard::require_professor,
            )),
        )
        .nest(
            "/admin",
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                session,
                guard::require_admin,
            )),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Tags every log line of a request with its `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
