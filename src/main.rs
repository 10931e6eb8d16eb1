use aula_portal::{
    AppState,
    backend::{BackendState, HttpBackend},
    config::{AppConfig, Env},
    create_router,
    exam::ExamRoom,
    session::{FileSessionStore, SessionState},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, sets up logging, restores the stored session and serves the
/// screens.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast in production)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: pretty locally, JSON in production.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "aula_portal=debug,tower_http=info,axum=trace".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Remote API client
    let backend = HttpBackend::new(&config.api_base_url, config.request_timeout)
        .expect("FATAL: Failed to build the HTTP client for API_BASE_URL.");
    let backend = Arc::new(backend) as BackendState;
    tracing::info!("Remote API at {}", config.api_base_url);

    // 4. Session restored from the previous run, if any.
    let session = Arc::new(FileSessionStore::open(&config.session_file)) as SessionState;
    if session.get().is_some() {
        tracing::info!("Resuming stored session from {}", config.session_file.display());
    }

    let exam_room = Arc::new(ExamRoom::new(&config.audio_mime));
    let bind_addr = config.bind_addr.clone();

    let app_state = AppState {
        backend,
        session,
        exam_room,
        config,
    };

    // 5. Router and server
    let app = create_router(app_state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind BIND_ADDR.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://{}/swagger-ui", bind_addr);

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server stopped: {}", e);
    }
}
