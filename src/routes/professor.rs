use crate::{AppState, handlers};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
};

/// Largest course file accepted for upload.
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Professor Router Module
///
/// Exam authoring and grading, course material and transcript entries. Wrapped in the
/// professor guard; anyone else is sent back to the dashboard.
pub fn professor_routes() -> Router<AppState> {
    Router::new()
        // --- Exams ---
        .route(
            "/materias/{id}/examenes",
            get(handlers::list_exams).post(handlers::create_exam),
        )
        .route("/examenes/{id}", delete(handlers::delete_exam))
        .route("/examenes/{id}/entregas", get(handlers::list_submissions))
        .route(
            "/examenes/{id}/entregas/{entrega}/correccion",
            post(handlers::grade_submission),
        )
        // --- Material ---
        // POST /profesor/materias/{id}/archivos?nombre=...
        // Raw file body; the default body limit is too small for slides and PDFs.
        .route(
            "/materias/{id}/archivos",
            post(handlers::upload_file).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/archivos/{id}", delete(handlers::delete_file))
        .route("/materias/{id}/videos", post(handlers::add_video))
        .route("/videos/{id}", delete(handlers::delete_video))
        // --- Transcript ---
        .route("/libreta", put(handlers::write_libreta))
}
