use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Authenticated Router Module
///
/// Screens any logged-in user may open. The student-only parts (enrollment status,
/// taking exams) are still reachable by other roles; the remote API decides what they
/// are allowed to see.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /me
        .route("/me", get(handlers::get_me))
        // GET /dashboard
        // Course cards; for students each card carries its enrollment state.
        .route("/dashboard", get(handlers::dashboard))
        // --- Courses ---
        .route("/materias/{id}", get(handlers::materia_detail))
        .route(
            "/materias/{id}/inscripcion",
            post(handlers::request_enrollment),
        )
        // --- Exam Taking ---
        // GET /examenes/{id}?modo=primera|rehacer
        // Opens (or resumes) the attempt.
        .route("/examenes/{id}", get(handlers::open_exam))
        .route(
            "/examenes/{id}/respuestas/{pregunta}",
            put(handlers::answer_question),
        )
        .route(
            "/examenes/{id}/grabacion/{pregunta}/iniciar",
            post(handlers::start_recording),
        )
        .route(
            "/examenes/{id}/grabacion/{pregunta}/fragmento",
            post(handlers::push_recording_chunk),
        )
        .route(
            "/examenes/{id}/grabacion/{pregunta}/detener",
            post(handlers::stop_recording),
        )
        // POST /examenes/{id}/enviar
        // One multipart submission with every answer and clip.
        .route("/examenes/{id}/enviar", post(handlers::submit_exam))
        // --- Transcript ---
        // GET /libreta?buscar=...&orden=...
        .route("/libreta", get(handlers::libreta))
        .route("/libreta/imprimir", get(handlers::print_libreta))
}
