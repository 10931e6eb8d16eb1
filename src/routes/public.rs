use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Reachable without a session. The login screen reports whether a session already
/// exists so the client can skip straight to the dashboard.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe.
        .route("/health", get(|| async { "ok" }))
        // GET/POST /login
        // Login screen state, and the credential exchange itself.
        .route("/login", get(handlers::login_page).post(handlers::login))
        // POST /logout
        // Forgets the credential and closes any open exam.
        .route("/logout", post(handlers::logout))
}
