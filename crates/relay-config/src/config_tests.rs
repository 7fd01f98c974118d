use super::*;
use serial_test::serial;

#[test]
fn test_default_config() {
    let config = RelayConfig::default();
    assert_eq!(config.server.bind, "127.0.0.1");
    assert_eq!(config.server.port, 3000);
    assert_eq!(config.server.route, "/api/gemini");
    assert_eq!(config.provider.model, "gemini-2.5-flash-lite");
    assert_eq!(config.provider.credentials_env, "GOOGLE_API_KEYS");
    assert!(config.provider.request_timeout().is_none());
    assert_eq!(config.dispatch.default_retry_secs, 20.0);
    assert_eq!(config.dispatch.retry_buffer_secs, 2.0);
    assert_eq!(config.client.endpoint, "http://127.0.0.1:3000/api/gemini");
    assert_eq!(config.client.fallback_retry_secs, 20);
}

#[test]
fn test_parse_partial_toml_keeps_defaults() {
    let config = RelayConfig::parse(
        r#"
[server]
port = 8088

[provider]
model = "gemini-2.5-pro"
request_timeout_secs = 45
"#,
    )
    .unwrap();
    assert_eq!(config.server.port, 8088);
    assert_eq!(config.server.bind, "127.0.0.1");
    assert_eq!(config.provider.model, "gemini-2.5-pro");
    assert_eq!(
        config.provider.request_timeout(),
        Some(Duration::from_secs(45))
    );
    assert_eq!(config.dispatch, DispatchConfig::default());
    assert_eq!(config.server.listen_addr(), "127.0.0.1:8088");
}

#[test]
fn test_parse_rejects_non_positive_default_retry() {
    let err = RelayConfig::parse("[dispatch]\ndefault_retry_secs = 0.0\n").unwrap_err();
    assert!(err.to_string().contains("default_retry_secs"));
}

#[test]
fn test_parse_rejects_negative_buffer() {
    let err = RelayConfig::parse("[dispatch]\nretry_buffer_secs = -1.0\n").unwrap_err();
    assert!(err.to_string().contains("retry_buffer_secs"));
}

#[test]
fn test_parse_rejects_relative_route() {
    let err = RelayConfig::parse("[server]\nroute = \"api/gemini\"\n").unwrap_err();
    assert!(err.to_string().contains("server.route"));
}

#[test]
fn test_default_template_parses_to_defaults() {
    let config = RelayConfig::parse(&RelayConfig::default_template()).unwrap();
    assert_eq!(config, RelayConfig::default());
}

#[test]
fn test_load_explicit_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    let err = RelayConfig::load(Some(&missing)).unwrap_err();
    assert!(format!("{err:#}").contains("Failed to read relay config"));
}

#[test]
fn test_save_and_load_template_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");
    let written = RelayConfig::save_default_template(Some(&path)).unwrap();
    assert_eq!(written, path);

    let loaded = RelayConfig::load(Some(&path)).unwrap();
    assert_eq!(loaded.server.route, "/api/gemini");
}

#[test]
fn test_load_reports_parse_errors_with_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[server\nport = 1").unwrap();
    let err = RelayConfig::load(Some(&path)).unwrap_err();
    assert!(format!("{err:#}").contains("Failed to parse relay config"));
}

#[test]
#[serial]
fn test_credential_pool_uses_configured_env_var() {
    let config = RelayConfig::parse("[provider]\ncredentials_env = \"RELAY_CONFIG_TEST_KEYS\"\n")
        .unwrap();
    // SAFETY: serialized test; no other thread reads this variable.
    unsafe { std::env::set_var("RELAY_CONFIG_TEST_KEYS", "alpha,beta,gamma") };
    let pool = config.credential_pool();
    unsafe { std::env::remove_var("RELAY_CONFIG_TEST_KEYS") };
    assert_eq!(pool.len(), 3);
}
