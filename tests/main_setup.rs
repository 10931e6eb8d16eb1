use aula_portal::{AppConfig, config::Env};
use serial_test::serial;
use std::{env, panic, path::PathBuf, time::Duration};

// --- Setup/Teardown Utilities ---

const CONFIG_VARS: [&str; 8] = [
    "APP_ENV",
    "API_BASE_URL",
    "SESSION_FILE",
    "BIND_ADDR",
    "FANOUT_LIMIT",
    "REQUEST_TIMEOUT_SECS",
    "AUDIO_MIME",
    "RUST_LOG",
];

/// Runs `test` with a clean configuration environment and restores the previous values
/// afterwards, even if the test panics.
fn run_with_env<T, R>(vars: &[(&str, &str)], test: T) -> R
where
    T: FnOnce() -> R + panic::UnwindSafe,
{
    let originals: Vec<(&str, Option<String>)> = CONFIG_VARS
        .iter()
        .map(|&var| (var, env::var(var).ok()))
        .collect();

    unsafe {
        for var in CONFIG_VARS {
            env::remove_var(var);
        }
        for (key, value) in vars {
            env::set_var(key, value);
        }
    }

    let result = panic::catch_unwind(test);

    unsafe {
        for (key, original) in originals {
            match original {
                Some(value) => env::set_var(key, value),
                None => env::remove_var(key),
            }
        }
    }

    match result {
        Ok(value) => value,
        Err(e) => panic::resume_unwind(e),
    }
}

// --- Tests ---

#[test]
#[serial]
fn test_app_config_production_requires_api_base_url() {
    let result = run_with_env(&[("APP_ENV", "production")], || {
        panic::catch_unwind(AppConfig::load)
    });

    assert!(
        result.is_err(),
        "Production config loading should panic without API_BASE_URL"
    );
}

#[test]
#[serial]
fn test_app_config_production_with_api_base_url() {
    let config = run_with_env(
        &[
            ("APP_ENV", "production"),
            ("API_BASE_URL", "https://aula.example.com/api/"),
        ],
        AppConfig::load,
    );

    assert_eq!(config.env, Env::Production);
    assert_eq!(config.api_base_url, "https://aula.example.com/api");
}

#[test]
#[serial]
fn test_app_config_local_env_defaults() {
    let config = run_with_env(&[], AppConfig::load);
    let defaults = AppConfig::default();

    assert_eq!(config.env, Env::Local);
    assert_eq!(config.api_base_url, defaults.api_base_url);
    assert_eq!(config.session_file, defaults.session_file);
    assert_eq!(config.bind_addr, "0.0.0.0:3000");
    assert_eq!(config.fanout_limit, 4);
    assert_eq!(config.request_timeout, Duration::from_secs(30));
    assert_eq!(config.audio_mime, "audio/webm");
}

#[test]
#[serial]
fn test_app_config_reads_overrides() {
    let config = run_with_env(
        &[
            ("API_BASE_URL", "http://127.0.0.1:9000"),
            ("SESSION_FILE", "/tmp/aula-test-session.json"),
            ("BIND_ADDR", "127.0.0.1:4000"),
            ("FANOUT_LIMIT", "8"),
            ("REQUEST_TIMEOUT_SECS", "5"),
            ("AUDIO_MIME", "audio/ogg"),
        ],
        AppConfig::load,
    );

    assert_eq!(config.api_base_url, "http://127.0.0.1:9000");
    assert_eq!(config.session_file, PathBuf::from("/tmp/aula-test-session.json"));
    assert_eq!(config.bind_addr, "127.0.0.1:4000");
    assert_eq!(config.fanout_limit, 8);
    assert_eq!(config.request_timeout, Duration::from_secs(5));
    assert_eq!(config.audio_mime, "audio/ogg");
}

#[test]
#[serial]
fn test_app_config_fanout_limit_never_zero() {
    let zero = run_with_env(&[("FANOUT_LIMIT", "0")], AppConfig::load);
    let garbage = run_with_env(&[("FANOUT_LIMIT", "lots")], AppConfig::load);

    assert_eq!(zero.fanout_limit, 1);
    assert_eq!(garbage.fanout_limit, 4);
}

#[test]
#[serial]
fn test_app_config_request_timeout_never_zero() {
    let zero = run_with_env(&[("REQUEST_TIMEOUT_SECS", "0")], AppConfig::load);
    let garbage = run_with_env(&[("REQUEST_TIMEOUT_SECS", "soon")], AppConfig::load);

    assert_eq!(zero.request_timeout, Duration::from_secs(1));
    assert_eq!(garbage.request_timeout, Duration::from_secs(30));
}
