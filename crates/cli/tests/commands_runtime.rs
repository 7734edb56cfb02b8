use std::env;
use std::sync::{Mutex, OnceLock};

use cotizador_cli::commands::{migrate, seed};
use serde_json::Value;

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("COTIZADOR_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");

        let message = payload["message"].as_str().unwrap_or("");
        assert!(message.contains("2 migrations applied"));
    });
}

#[test]
fn migrate_returns_config_failure_with_invalid_database_url() {
    with_env(&[("COTIZADOR_DATABASE_URL", "postgres://localhost/cotizador")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_returns_the_deterministic_dataset_summary() {
    with_env(&[("COTIZADOR_DATABASE_URL", "sqlite::memory:")], || {
        let result = seed::run();
        assert_eq!(result.exit_code, 0, "expected seed success");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        assert_eq!(payload["status"], "ok");

        let message = payload["message"].as_str().unwrap_or("");
        assert!(message.contains("2 clients"));
        assert!(message.contains("3 products"));
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    with_env(&[("COTIZADOR_DATABASE_URL", "sqlite::memory:")], || {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");

        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");

        let first_payload = parse_payload(&first.output);
        let second_payload = parse_payload(&second.output);
        assert_eq!(first_payload["message"], second_payload["message"]);
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "COTIZADOR_DATABASE_URL",
        "COTIZADOR_DATABASE_MAX_CONNECTIONS",
        "COTIZADOR_DATABASE_TIMEOUT_SECS",
        "COTIZADOR_SERVER_BIND_ADDRESS",
        "COTIZADOR_SERVER_PORT",
        "COTIZADOR_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "COTIZADOR_SMTP_ENABLED",
        "COTIZADOR_SMTP_HOST",
        "COTIZADOR_SMTP_PORT",
        "COTIZADOR_SMTP_USERNAME",
        "COTIZADOR_SMTP_PASSWORD",
        "COTIZADOR_SMTP_FROM_ADDRESS",
        "COTIZADOR_PDF_TEMPLATE_DIR",
        "COTIZADOR_LOGGING_LEVEL",
        "COTIZADOR_LOGGING_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
