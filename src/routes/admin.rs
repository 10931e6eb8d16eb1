use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Admin Router Module
///
/// Platform administration. Wrapped in the admin guard; a professor or student landing
/// here is redirected to the dashboard instead.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // --- Users ---
        .route(
            "/usuarios",
            get(handlers::list_users).post(handlers::create_user),
        )
        .route("/usuarios/{id}", axum::routing::delete(handlers::delete_user))
        .route("/usuarios/{id}/rol", put(handlers::change_role))
        // --- Courses ---
        .route("/materias", post(handlers::create_materia))
        .route(
            "/materias/{id}",
            put(handlers::update_materia).delete(handlers::delete_materia),
        )
        // --- Enrollment queue ---
        .route("/inscripciones", get(handlers::pending_enrollments))
        .route(
            "/inscripciones/{id}/aprobar",
            post(handlers::approve_enrollment),
        )
        .route(
            "/inscripciones/{id}/rechazar",
            post(handlers::reject_enrollment),
        )
        // GET /admin/libretas?buscar=...&orden=...
        .route("/libretas", get(handlers::all_libretas))
}
