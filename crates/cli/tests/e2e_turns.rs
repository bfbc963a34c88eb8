//! End-to-end tests: real HTTP adapters against a local stand-in for the
//! search and reasoning services, and the `veritas` binary itself.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use veritas_agent::{Session, TurnOrchestrator};
use veritas_config::AppConfig;
use veritas_core::message::Role;

#[derive(Clone, Default)]
struct Backend {
    search_down: Arc<AtomicBool>,
    reasoning_down: Arc<AtomicBool>,
    searches: Arc<Mutex<Vec<String>>>,
    completions: Arc<Mutex<Vec<serde_json::Value>>>,
}

impl Backend {
    fn completions(&self) -> Vec<serde_json::Value> {
        self.completions.lock().unwrap().clone()
    }
}

async fn search(
    State(backend): State<Backend>,
    axum::Json(body): axum::Json<serde_json::Value>,
) -> impl IntoResponse {
    if backend.search_down.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "search index offline".to_string());
    }
    let query = body["query"].as_str().unwrap_or_default().to_string();
    backend.searches.lock().unwrap().push(query);
    let results = serde_json::json!({
        "results": [
            {"url": "https://en.wikipedia.org/wiki/Eiffel_Tower",
             "content": "The Eiffel Tower is a wrought-iron lattice tower in Paris, France."},
            {"url": "https://www.toureiffel.paris/en",
             "content": "Official site of the Eiffel Tower, Champ de Mars, Paris."}
        ]
    });
    (StatusCode::OK, results.to_string())
}

async fn completions(
    State(backend): State<Backend>,
    axum::Json(body): axum::Json<serde_json::Value>,
) -> axum::response::Response {
    if backend.reasoning_down.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "model overloaded").into_response();
    }
    let n = {
        let mut seen = backend.completions.lock().unwrap();
        seen.push(body);
        seen.len()
    };
    let frame = |content: &str| {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"delta": {"content": content}}]})
        )
    };
    let sse = [
        frame("**Verdict:** FALSE\n\n"),
        frame(&format!("**Analysis:** Reply {n}. The tower stands in Paris.")),
        "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n".to_string(),
        "data: [DONE]\n\n".to_string(),
    ]
    .concat();
    ([("content-type", "text/event-stream")], sse).into_response()
}

async fn spawn_backend() -> (String, Backend) {
    let backend = Backend::default();
    let router = Router::new()
        .route("/search", post(search))
        .route("/chat/completions", post(completions))
        .with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (format!("http://{addr}"), backend)
}

fn config_toml(url: &str) -> String {
    format!(
        r#"
[search]
api_key = "tvly-e2e"
api_url = "{url}"

[reasoning]
api_key = "gsk-e2e"
api_url = "{url}"
model = "llama-3.3-70b-versatile"
"#
    )
}

fn orchestrator_for(url: &str) -> TurnOrchestrator {
    let config: AppConfig = toml::from_str(&config_toml(url)).unwrap();
    let secrets = config.require_secrets().unwrap();
    let providers = veritas_providers::build_from_config(&config, &secrets).unwrap();
    TurnOrchestrator::from_config(&config, providers)
}

#[tokio::test]
async fn eiffel_claim_is_refuted_with_evidence_in_context() {
    let (url, backend) = spawn_backend().await;
    let orchestrator = orchestrator_for(&url);
    let mut session = Session::new();

    let committed = orchestrator
        .process_turn(&mut session, "The Eiffel Tower is in Berlin.", None)
        .await
        .unwrap();

    assert!(committed.turn.content.starts_with("**Verdict:** FALSE"));
    assert_eq!(committed.evidence_count, 2);
    assert_eq!(session.transcript.len(), 2);

    let sent = backend.completions();
    assert_eq!(sent.len(), 1);
    let messages = sent[0]["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(messages[1]["role"], "user");

    let composite = messages[1]["content"].as_str().unwrap();
    assert!(composite.starts_with("USER QUERY: The Eiffel Tower is in Berlin."));
    assert!(composite.contains(
        "REAL-TIME SEARCH DATA: - The Eiffel Tower is a wrought-iron lattice tower in Paris, France. (URL: https://en.wikipedia.org/wiki/Eiffel_Tower)\n- Official site"
    ));
    assert_eq!(sent[0]["stream"], true);
    assert_eq!(sent[0]["model"], "llama-3.3-70b-versatile");
}

#[tokio::test]
async fn conversation_alternates_and_windows_history() {
    let (url, backend) = spawn_backend().await;
    let orchestrator = orchestrator_for(&url);
    let mut session = Session::new();

    for i in 1..=4 {
        orchestrator
            .process_turn(&mut session, &format!("claim {i}"), None)
            .await
            .unwrap();
    }

    let turns = session.transcript.turns();
    assert_eq!(turns.len(), 8);
    for (i, turn) in turns.iter().enumerate() {
        let expected = if i % 2 == 0 { Role::User } else { Role::Assistant };
        assert_eq!(turn.role, expected, "turn {i}");
    }
    assert!(turns[7].content.contains("Reply 4"));

    // Fourth request: system + last 5 of the 7 entries present at the time
    let sent = backend.completions();
    let last = sent[3]["messages"].as_array().unwrap();
    assert_eq!(last.len(), 6);
    assert_eq!(last[1]["role"], "user");
    assert_eq!(last[1]["content"], "claim 2");
    assert!(
        last[5]["content"]
            .as_str()
            .unwrap()
            .starts_with("USER QUERY: claim 4")
    );
    // Earlier composites never leak back into history
    assert_eq!(last[3]["content"], "claim 3");

    // Search sees the raw input only
    assert_eq!(
        *backend.searches.lock().unwrap(),
        vec!["claim 1", "claim 2", "claim 3", "claim 4"]
    );
}

#[tokio::test]
async fn search_outage_keeps_only_the_user_turn() {
    let (url, backend) = spawn_backend().await;
    let orchestrator = orchestrator_for(&url);
    let mut session = Session::new();

    orchestrator
        .process_turn(&mut session, "first", None)
        .await
        .unwrap();

    backend.search_down.store(true, Ordering::SeqCst);
    let err = orchestrator
        .process_turn(&mut session, "second", None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "search_unavailable");
    assert_eq!(session.transcript.len(), 3);
    assert_eq!(session.transcript.last().unwrap().content, "second");
    assert_eq!(backend.completions().len(), 1, "reasoning must not be called");

    // The session stays usable
    backend.search_down.store(false, Ordering::SeqCst);
    orchestrator
        .process_turn(&mut session, "third", None)
        .await
        .unwrap();
    assert_eq!(session.transcript.len(), 5);
}

fn veritas() -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(env!("CARGO_BIN_EXE_veritas"));
    for name in veritas_config::SEARCH_KEY_ENV
        .iter()
        .chain(veritas_config::REASONING_KEY_ENV.iter())
        .chain(["VERITAS_MODEL", "VERITAS_CONFIG"].iter())
    {
        cmd.env_remove(name);
    }
    // Keep stderr down to what the user is shown
    cmd.env("RUST_LOG", "off");
    cmd
}

#[tokio::test]
async fn binary_refuses_to_run_turns_without_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[context]\nwindow_size = 5\n").unwrap();

    let output = veritas()
        .arg("--config")
        .arg(&path)
        .args(["chat", "--message", "The Eiffel Tower is in Berlin."])
        .output()
        .await
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("search.api_key"), "stderr: {stderr}");
    assert!(stderr.contains("reasoning.api_key"), "stderr: {stderr}");
    assert!(stderr.contains("TAVILY_API_KEY"));
    assert!(output.stdout.is_empty());
}

#[tokio::test]
async fn binary_verifies_a_single_claim() {
    let (url, backend) = spawn_backend().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, config_toml(&url)).unwrap();

    let output = veritas()
        .arg("--config")
        .arg(&path)
        .args(["chat", "-m", "The Eiffel Tower is in Berlin."])
        .output()
        .await
        .unwrap();

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout.contains("**Verdict:** FALSE"));
    assert!(stdout.contains("Reply 1"));
    assert_eq!(backend.completions().len(), 1);
}

#[tokio::test]
async fn binary_reports_a_failed_turn_once() {
    let (url, backend) = spawn_backend().await;
    backend.reasoning_down.store(true, Ordering::SeqCst);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, config_toml(&url)).unwrap();

    let output = veritas()
        .arg("--config")
        .arg(&path)
        .args(["chat", "-m", "The Eiffel Tower is in Berlin."])
        .output()
        .await
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(stderr.matches("Reasoning unavailable").count(), 1, "stderr: {stderr}");
    assert!(stderr.contains("System Error:"));
    assert!(!stderr.contains("ReasoningUnavailable("));
    assert!(output.stdout.is_empty());
}

#[tokio::test]
async fn doctor_reports_missing_keys_without_failing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "").unwrap();

    let output = veritas()
        .arg("--config")
        .arg(&path)
        .arg("doctor")
        .output()
        .await
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Configuration valid"));
    assert!(stdout.contains("Missing search.api_key"));
    assert!(stdout.contains("2 issue(s) found"));
}

#[tokio::test]
async fn onboard_writes_a_loadable_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let output = veritas()
        .arg("--config")
        .arg(&path)
        .arg("onboard")
        .output()
        .await
        .unwrap();

    assert!(output.status.success());
    let config = AppConfig::load_from(&path).unwrap();
    assert_eq!(config.context.window_size, 5);
    assert!(config.search.api_key.is_none());
}
