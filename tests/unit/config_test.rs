use automation_suggester::config::Config;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::NamedTempFile;

// Environment overrides are process-global, so config loads must not
// interleave with the test that sets SUGGESTER__* variables.
static ENV_LOCK: Mutex<()> = Mutex::new(());

fn write_config(body: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(body.as_bytes()).unwrap();
    file
}

const MINIMAL: &str = r#"
api_key = "super-secret-api-key"
homeassistant_token = "llat-token"
"#;

#[test]
fn minimal_file_gets_defaults() {
    let _guard = ENV_LOCK.lock().unwrap();
    let file = write_config(MINIMAL);

    let cfg = Config::load(Some(file.path())).unwrap();

    assert_eq!(cfg.server_port, 8087);
    assert_eq!(cfg.log_level, "info");
    assert_eq!(cfg.homeassistant_url, "http://localhost:8123");
    assert!(cfg.data_dir.ends_with(".automation-suggester"));
    assert!(cfg.automations_file.is_none());
    assert!(cfg.providers.is_empty());
}

#[test]
fn file_values_override_defaults() {
    let _guard = ENV_LOCK.lock().unwrap();
    let file = write_config(
        r#"
server_port = 9090
log_level = "debug"
api_key = "super-secret-api-key"
homeassistant_url = "http://hass.local:8123"
homeassistant_token = "llat-token"
automations_file = "/config/automations.yaml"
"#,
    );

    let cfg = Config::load(Some(file.path())).unwrap();

    assert_eq!(cfg.server_port, 9090);
    assert_eq!(cfg.log_level, "debug");
    assert_eq!(cfg.homeassistant_url, "http://hass.local:8123");
    assert_eq!(
        cfg.automations_file,
        Some(PathBuf::from("/config/automations.yaml"))
    );
}

#[test]
fn provider_tables_parse_into_instances() {
    let _guard = ENV_LOCK.lock().unwrap();
    let file = write_config(
        r#"
api_key = "super-secret-api-key"
homeassistant_token = "llat-token"

[[providers]]
id = "openai_main"
title = "OpenAI"
kind = "openai"
api_key = "sk-test"

[[providers]]
id = "local"
title = "Ollama"
kind = "ollama"
host = "127.0.0.1"
port = 11434
"#,
    );

    let cfg = Config::load(Some(file.path())).unwrap();

    assert_eq!(cfg.providers.len(), 2);
    assert_eq!(cfg.providers[0].id, "openai_main");
    assert_eq!(cfg.providers[0].settings.kind(), "openai");
    assert_eq!(cfg.providers[1].settings.kind(), "ollama");
}

#[test]
fn environment_variables_override_the_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    let file = write_config(MINIMAL);

    std::env::set_var("SUGGESTER__SERVER_PORT", "9999");
    let result = Config::load(Some(file.path()));
    std::env::remove_var("SUGGESTER__SERVER_PORT");

    assert_eq!(result.unwrap().server_port, 9999);
}

#[test]
fn short_api_key_is_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    let file = write_config(
        r#"
api_key = "short"
homeassistant_token = "llat-token"
"#,
    );

    assert!(Config::load(Some(file.path())).is_err());
}

#[test]
fn privileged_port_is_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    let file = write_config(
        r#"
server_port = 80
api_key = "super-secret-api-key"
homeassistant_token = "llat-token"
"#,
    );

    assert!(Config::load(Some(file.path())).is_err());
}

#[test]
fn missing_explicit_file_is_an_error() {
    let _guard = ENV_LOCK.lock().unwrap();
    let path = PathBuf::from("/definitely/not/here/config.toml");
    assert!(Config::load(Some(&path)).is_err());
}
