use std::{env, path::PathBuf, time::Duration};

/// AppConfig
///
/// Holds the front-end server's entire configuration state. It is loaded once at startup,
/// never mutated afterwards, and pulled into handlers via FromRef on the shared AppState.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Base URL of the remote platform API (no trailing slash).
    pub api_base_url: String,
    // Where the session credential is persisted between restarts.
    pub session_file: PathBuf,
    // Address the front-end server listens on.
    pub bind_addr: String,
    // Maximum number of concurrent per-row lookups issued by list screens.
    pub fanout_limit: usize,
    // Upper bound for a single backend call.
    pub request_timeout: Duration,
    // MIME type announced for recorded audio answers.
    pub audio_mime: String,
    // Runtime environment marker. Controls log format and fail-fast rules.
    pub env: Env,
}

/// Env
///
/// Defines the runtime context: pretty logs and local defaults versus JSON logs and
/// mandatory settings.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

const DEFAULT_API_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_SESSION_FILE: &str = ".aula-session.json";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_FANOUT_LIMIT: usize = 4;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_AUDIO_MIME: &str = "audio/webm";

impl Default for AppConfig {
    /// default
    ///
    /// Safe, non-panicking values for test state scaffolding.
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            session_file: PathBuf::from(DEFAULT_SESSION_FILE),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            fanout_limit: DEFAULT_FANOUT_LIMIT,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            audio_mime: DEFAULT_AUDIO_MIME.to_string(),
            env: Env::Local,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads every parameter from environment variables.
    ///
    /// # Panics
    /// Panics in production when `API_BASE_URL` is not set, so the server never starts
    /// talking to a guessed backend.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let api_base_url = match env {
            Env::Production => {
                env::var("API_BASE_URL").expect("FATAL: API_BASE_URL must be set in production.")
            }
            Env::Local => {
                env::var("API_BASE_URL").unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string())
            }
        };

        let fanout_limit = env::var("FANOUT_LIMIT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(DEFAULT_FANOUT_LIMIT)
            .max(1);

        let timeout_secs = env::var("REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
            .max(1);

        Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            session_file: env::var("SESSION_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_SESSION_FILE)),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            fanout_limit,
            request_timeout: Duration::from_secs(timeout_secs),
            audio_mime: env::var("AUDIO_MIME").unwrap_or_else(|_| DEFAULT_AUDIO_MIME.to_string()),
            env,
        }
    }
}
