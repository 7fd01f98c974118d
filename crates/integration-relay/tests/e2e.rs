// End-to-end tests: a fake Gemini provider behind the real relay endpoint,
// driven by the HTTP scheduler client.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use relay_config::CredentialPool;
use relay_core::{Course, DispatchResult};
use relay_dispatch::{DispatchPolicy, Dispatcher, GeminiClient};
use relay_scheduler::{DispatchTransport, HttpDispatchClient, Phase, RetryScheduler};
use relay_server::HttpEndpoint;
use serde_json::json;

const ROUTE: &str = "/api/gemini";

/// `limited` always answers 429, `flaky` answers 429 once then succeeds,
/// `good` always succeeds, anything else is rejected as an invalid key.
async fn fake_generate_content(
    axum::extract::State(flaky_calls): axum::extract::State<Arc<AtomicUsize>>,
    headers: HeaderMap,
) -> Response {
    let key = headers
        .get("x-goog-api-key")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    let limited = || {
        (
            StatusCode::TOO_MANY_REQUESTS,
            axum::Json(json!({
                "error": {
                    "code": 429,
                    "message": "Resource has been exhausted (e.g. check quota).",
                    "status": "RESOURCE_EXHAUSTED",
                    "details": [{
                        "@type": "type.googleapis.com/google.rpc.RetryInfo",
                        "retryDelay": "1s"
                    }]
                }
            })),
        )
            .into_response()
    };
    let ok = |text: &str| {
        axum::Json(json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        }))
        .into_response()
    };

    match key {
        "limited" => limited(),
        "flaky" if flaky_calls.fetch_add(1, Ordering::SeqCst) == 0 => limited(),
        "flaky" => ok("recovered after waiting"),
        "good" => ok("Both fields model complex systems."),
        _ => (
            StatusCode::BAD_REQUEST,
            axum::Json(json!({
                "error": {
                    "code": 400,
                    "message": "API key not valid. Please pass a valid API key.",
                    "status": "INVALID_ARGUMENT"
                }
            })),
        )
            .into_response(),
    }
}

struct Stack {
    provider: HttpEndpoint,
    relay: HttpEndpoint,
    relay_url: String,
}

impl Stack {
    async fn start(tokens: &[&str]) -> Self {
        let provider_app = Router::new()
            .route("/v1beta/models/{model}", post(fake_generate_content))
            .with_state(Arc::new(AtomicUsize::new(0)));
        let provider = HttpEndpoint::start("127.0.0.1:0", provider_app)
            .await
            .unwrap();

        let client = GeminiClient::new(
            format!("http://{}", provider.local_addr()),
            "gemini-test",
            None,
        )
        .unwrap();
        let dispatcher = Arc::new(Dispatcher::new(
            CredentialPool::from_tokens(tokens.iter().copied()),
            client,
            DispatchPolicy {
                default_retry_secs: 20.0,
                retry_buffer_secs: 0.0,
            },
        ));
        let relay = HttpEndpoint::start("127.0.0.1:0", relay_server::router(dispatcher, ROUTE))
            .await
            .unwrap();
        let relay_url = format!("http://{}{ROUTE}", relay.local_addr());

        Self {
            provider,
            relay,
            relay_url,
        }
    }

    async fn shutdown(self) {
        self.relay.shutdown().await;
        self.provider.shutdown().await;
    }
}

fn courses() -> Vec<Course> {
    vec![
        Course::new("Complex Systems", "Emergence in networks."),
        Course::new("Ecology", "Population dynamics."),
    ]
}

#[tokio::test]
async fn failover_skips_limited_and_invalid_keys() {
    let stack = Stack::start(&["limited", "revoked", "good"]).await;
    let client = HttpDispatchClient::new(stack.relay_url.clone(), 20).unwrap();

    let result = client.dispatch("prompt").await;

    assert_eq!(
        result,
        DispatchResult::Ok {
            text: "Both fields model complex systems.".into()
        }
    );
    stack.shutdown().await;
}

#[tokio::test]
async fn all_limited_maps_to_429_with_provider_delay() {
    let stack = Stack::start(&["limited", "limited"]).await;

    let response = reqwest::Client::new()
        .post(&stack.relay_url)
        .json(&json!({ "prompt": "p" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 429);
    assert_eq!(
        response.headers().get("retry-after").unwrap().to_str().unwrap(),
        "1"
    );
    assert_eq!(
        response.json::<serde_json::Value>().await.unwrap(),
        json!({ "error": "All API keys are rate-limited.", "retryDelay": 1 })
    );
    stack.shutdown().await;
}

#[tokio::test]
async fn scheduler_waits_out_rate_limit_and_completes() {
    let stack = Stack::start(&["flaky"]).await;
    let scheduler =
        RetryScheduler::new(HttpDispatchClient::new(stack.relay_url.clone(), 20).unwrap());

    assert!(scheduler.begin_generation(&courses()));
    let state = scheduler.wait_until_settled().await;

    assert_eq!(state.phase, Phase::Done);
    assert_eq!(state.attempt, 2);
    assert_eq!(state.result.as_deref(), Some("recovered after waiting"));
    drop(scheduler);
    stack.shutdown().await;
}

#[tokio::test]
async fn all_invalid_surfaces_error_to_scheduler() {
    let stack = Stack::start(&["revoked"]).await;
    let scheduler =
        RetryScheduler::new(HttpDispatchClient::new(stack.relay_url.clone(), 20).unwrap());

    scheduler.begin_generation(&courses());
    let state = scheduler.wait_until_settled().await;

    assert_eq!(state.phase, Phase::Failed);
    assert_eq!(
        state.error.as_deref(),
        Some("Failed to generate with all credentials")
    );
    drop(scheduler);
    stack.shutdown().await;
}

#[test]
fn cli_help_lists_subcommands() {
    let output = std::process::Command::new(env!("CARGO_BIN_EXE_relay"))
        .arg("--help")
        .output()
        .expect("failed to run relay --help");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("serve"));
    assert!(stdout.contains("generate"));
    assert!(stdout.contains("config"));
}

#[test]
fn serve_refuses_empty_credential_pool() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(
        &config,
        "[provider]\ncredentials_env = \"RELAY_E2E_UNSET_KEYS\"\n",
    )
    .unwrap();

    let output = std::process::Command::new(env!("CARGO_BIN_EXE_relay"))
        .args(["serve", "--port", "0", "--config"])
        .arg(&config)
        .env_remove("RELAY_E2E_UNSET_KEYS")
        .output()
        .expect("failed to run relay serve");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("No credentials configured (set RELAY_E2E_UNSET_KEYS)"));
}
