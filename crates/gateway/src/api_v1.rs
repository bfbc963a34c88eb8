//! Versioned REST API (`/v1`) for the Veritas gateway.
//!
//! Provides endpoints for:
//! - Sessions (create, inspect transcript, end)
//! - Chat (one verification turn per request, whole or streamed over SSE)
//!
//! Each session owns its transcript behind a `tokio::sync::Mutex`; a turn
//! holds the lock for its whole duration, so a second message for the same
//! session while one is running gets `409 Conflict`.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::{
        Json,
        sse::{Event as SseEvent, Sse},
    },
    routing::{get, post},
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use veritas_agent::{Session, TurnEvent, TurnOrchestrator};
use veritas_core::message::{SessionId, Turn};
use veritas_core::provider::Usage;

// ── State ─────────────────────────────────────────────────────────────────

/// Buffered turn events per streaming request.
const EVENT_BUFFER: usize = 64;

pub type SessionHandle = Arc<Mutex<Session>>;

struct SessionSlot {
    /// Logical time of the last request that touched this session.
    last_active: AtomicU64,
    session: SessionHandle,
}

impl SessionSlot {
    /// Only the map holds the handle: no turn is running or about to start.
    fn is_idle(&self) -> bool {
        Arc::strong_count(&self.session) == 1
    }
}

/// Shared state for the v1 API.
pub struct ApiV1State {
    pub orchestrator: Arc<TurnOrchestrator>,
    sessions: RwLock<HashMap<String, SessionSlot>>,
    max_sessions: usize,
    clock: AtomicU64,
}

pub type SharedApiState = Arc<ApiV1State>;

impl ApiV1State {
    pub fn new(orchestrator: Arc<TurnOrchestrator>, max_sessions: usize) -> Self {
        Self {
            orchestrator,
            sessions: RwLock::new(HashMap::new()),
            max_sessions: max_sessions.max(1),
            clock: AtomicU64::new(0),
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    fn touch(&self, slot: &SessionSlot) -> SessionHandle {
        let now = self.clock.fetch_add(1, Ordering::Relaxed) + 1;
        slot.last_active.store(now, Ordering::Relaxed);
        slot.session.clone()
    }

    /// Look up a session, creating it (with that id, or a fresh one) if absent.
    ///
    /// When the map is full the least recently active idle session is
    /// evicted. Sessions with a turn in flight are never evicted; if every
    /// session is busy the request is refused with 503.
    async fn session_or_create(&self, id: Option<&str>) -> Result<(String, SessionHandle), ApiError> {
        let session = match id {
            Some(id) => {
                if let Some(slot) = self.sessions.read().await.get(id) {
                    return Ok((id.to_string(), self.touch(slot)));
                }
                Session::with_id(SessionId::from(id))
            }
            None => Session::new(),
        };

        let id = session.id.to_string();
        let mut sessions = self.sessions.write().await;

        // Another request may have created it between the two locks.
        if let Some(slot) = sessions.get(&id) {
            return Ok((id, self.touch(slot)));
        }

        if sessions.len() >= self.max_sessions {
            let idle = sessions
                .iter()
                .filter(|(_, slot)| slot.is_idle())
                .min_by_key(|(_, slot)| slot.last_active.load(Ordering::Relaxed))
                .map(|(k, _)| k.clone());

            match idle {
                Some(key) => {
                    debug!(session_id = %key, "Evicting least recently active session");
                    sessions.remove(&key);
                }
                None => {
                    warn!(max_sessions = self.max_sessions, "Session map full and every session busy");
                    return Err(api_error(
                        StatusCode::SERVICE_UNAVAILABLE,
                        "All sessions are busy, try again shortly",
                    ));
                }
            }
        }

        let slot = SessionSlot {
            last_active: AtomicU64::new(0),
            session: Arc::new(Mutex::new(session)),
        };
        let handle = self.touch(&slot);
        sessions.insert(id.clone(), slot);
        Ok((id, handle))
    }

    async fn get(&self, id: &str) -> Option<SessionHandle> {
        self.sessions
            .read()
            .await
            .get(id)
            .map(|slot| self.touch(slot))
    }

    async fn remove(&self, id: &str) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }
}

// ── Router ────────────────────────────────────────────────────────────────

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedApiState) -> Router {
    Router::new()
        .route("/sessions", post(create_session_handler))
        .route(
            "/sessions/{id}",
            get(get_session_handler).delete(delete_session_handler),
        )
        .route("/chat", post(chat_handler))
        .route("/chat/stream", post(chat_stream_handler))
        .with_state(state)
}

// ── Request / Response types ──────────────────────────────────────────────

#[derive(Deserialize)]
struct ChatRequest {
    /// Existing session ID (omit to start a new session).
    #[serde(default)]
    session_id: Option<String>,
    /// The claim or topic to verify.
    message: String,
}

#[derive(Serialize, Deserialize)]
struct ChatResponse {
    session_id: String,
    reply: String,
    evidence_count: usize,
    usage: Option<Usage>,
}

#[derive(Serialize, Deserialize)]
struct SessionCreatedResponse {
    id: String,
    created_at: String,
}

#[derive(Serialize, Deserialize)]
struct SessionDetailResponse {
    id: String,
    created_at: String,
    turns: Vec<Turn>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
    /// Set for failed turns: `search_unavailable` or `reasoning_unavailable`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
            kind: None,
        }),
    )
}

fn validate_message(message: &str) -> Result<(), ApiError> {
    if message.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "message must not be empty"));
    }
    Ok(())
}

/// Claim the session for one turn, or 409 if a turn is already running.
fn claim(handle: SessionHandle) -> Result<OwnedMutexGuard<Session>, ApiError> {
    handle.try_lock_owned().map_err(|_| {
        api_error(
            StatusCode::CONFLICT,
            "A turn is already in progress for this session",
        )
    })
}

// ── Session handlers ──────────────────────────────────────────────────────

async fn create_session_handler(
    State(state): State<SharedApiState>,
) -> Result<(StatusCode, Json<SessionCreatedResponse>), ApiError> {
    let (id, handle) = state.session_or_create(None).await?;
    let created_at = handle.lock().await.created_at.to_rfc3339();
    info!(session_id = %id, "Session created");

    Ok((
        StatusCode::CREATED,
        Json(SessionCreatedResponse { id, created_at }),
    ))
}

/// Waits for any running turn so the transcript is never read mid-turn.
async fn get_session_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
) -> Result<Json<SessionDetailResponse>, ApiError> {
    let handle = state
        .get(&id)
        .await
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Session '{id}' not found")))?;

    let session = handle.lock().await;
    Ok(Json(SessionDetailResponse {
        id,
        created_at: session.created_at.to_rfc3339(),
        turns: session.transcript.turns().to_vec(),
    }))
}

async fn delete_session_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.remove(&id).await {
        info!(session_id = %id, "Session ended");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Session '{id}' not found"),
        ))
    }
}

// ── Chat handlers ─────────────────────────────────────────────────────────

/// `POST /v1/chat` — run one turn and return the committed reply.
async fn chat_handler(
    State(state): State<SharedApiState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    validate_message(&payload.message)?;
    info!(message_len = payload.message.len(), "v1/chat request");

    let (session_id, handle) = state.session_or_create(payload.session_id.as_deref()).await?;
    let mut session = claim(handle)?;

    match state
        .orchestrator
        .process_turn(&mut session, &payload.message, None)
        .await
    {
        Ok(committed) => Ok(Json(ChatResponse {
            session_id,
            reply: committed.turn.content,
            evidence_count: committed.evidence_count,
            usage: committed.usage,
        })),
        Err(e) => Err((
            StatusCode::BAD_GATEWAY,
            Json(ErrorResponse {
                error: e.to_string(),
                kind: Some(e.kind().to_string()),
            }),
        )),
    }
}

/// `POST /v1/chat/stream` — run one turn, streaming `TurnEvent`s over SSE.
///
/// The first event is `session` carrying the session id; the last is either
/// `committed` or `error`.
async fn chat_stream_handler(
    State(state): State<SharedApiState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    validate_message(&payload.message)?;
    info!(message_len = payload.message.len(), "v1/chat/stream SSE request");

    let (session_id, handle) = state.session_or_create(payload.session_id.as_deref()).await?;
    let mut session = claim(handle)?;

    let (tx, rx) = mpsc::channel::<TurnEvent>(EVENT_BUFFER);
    let orchestrator = state.orchestrator.clone();
    let message = payload.message;

    tokio::spawn(async move {
        if let Err(e) = orchestrator
            .process_turn(&mut session, &message, Some(&tx))
            .await
        {
            warn!(session_id = %session.id, kind = e.kind(), "Streamed turn failed");
        }
    });

    let opening = SseEvent::default()
        .event("session")
        .data(serde_json::json!({ "session_id": session_id }).to_string());

    let events = ReceiverStream::new(rx).map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_default();
        Ok::<_, Infallible>(SseEvent::default().event(event.event_type()).data(data))
    });

    let stream = futures::stream::once(async move { Ok::<_, Infallible>(opening) }).chain(events);

    Ok(Sse::new(stream))
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::collections::VecDeque;
    use tower::ServiceExt;

    use veritas_core::error::{ReasoningError, SearchError};
    use veritas_core::evidence::EvidenceItem;
    use veritas_core::message::Role;
    use veritas_core::provider::{
        CompletionRequest, FragmentReceiver, ReasoningProvider, StreamChunk,
    };
    use veritas_core::search::SearchProvider;

    /// Lightweight mock search for gateway tests.
    struct MockSearch {
        fail: bool,
    }

    #[async_trait::async_trait]
    impl SearchProvider for MockSearch {
        fn name(&self) -> &str {
            "gateway_mock_search"
        }

        async fn search(&self, _query: &str) -> Result<Vec<EvidenceItem>, SearchError> {
            if self.fail {
                return Err(SearchError::ApiError {
                    status_code: 503,
                    message: "search backend down".into(),
                });
            }
            Ok(vec![EvidenceItem::new(
                "The Eiffel Tower is in Paris.",
                "https://en.wikipedia.org/wiki/Eiffel_Tower",
            )])
        }
    }

    /// Streams each scripted reply word by word; fails once exhausted.
    struct MockReasoning {
        replies: std::sync::Mutex<VecDeque<&'static str>>,
    }

    #[async_trait::async_trait]
    impl ReasoningProvider for MockReasoning {
        fn name(&self) -> &str {
            "gateway_mock_reasoning"
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<FragmentReceiver, ReasoningError> {
            let reply = self.replies.lock().unwrap().pop_front().ok_or(
                ReasoningError::ApiError {
                    status_code: 503,
                    message: "no scripted reply".into(),
                },
            )?;

            let (tx, rx) = mpsc::channel(64);
            for word in reply.split_inclusive(' ') {
                tx.try_send(Ok(StreamChunk::text(word))).unwrap();
            }
            tx.try_send(Ok(StreamChunk::done(None))).unwrap();
            Ok(rx)
        }
    }

    fn state_with(search_fails: bool, replies: Vec<&'static str>, max_sessions: usize) -> SharedApiState {
        let orchestrator = TurnOrchestrator::new(
            Arc::new(MockSearch { fail: search_fails }),
            Arc::new(MockReasoning {
                replies: std::sync::Mutex::new(replies.into()),
            }),
            "mock-model",
        );
        Arc::new(ApiV1State::new(Arc::new(orchestrator), max_sessions))
    }

    pub(crate) fn test_api_state(replies: Vec<&'static str>) -> SharedApiState {
        state_with(false, replies, 100)
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_bytes(response: axum::response::Response) -> axum::body::Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    #[tokio::test]
    async fn create_session_returns_id() {
        let state = test_api_state(vec![]);
        let req = Request::builder()
            .method("POST")
            .uri("/sessions")
            .body(Body::empty())
            .unwrap();

        let response = v1_router(state.clone()).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let created: SessionCreatedResponse =
            serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert!(!created.id.is_empty());
        assert_eq!(state.session_count().await, 1);
    }

    #[tokio::test]
    async fn get_session_not_found() {
        let req = Request::builder()
            .uri("/sessions/nope")
            .body(Body::empty())
            .unwrap();
        let response = v1_router(test_api_state(vec![])).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn chat_commits_turn_and_transcript_is_visible() {
        let state = test_api_state(vec!["**Verdict:** FALSE The tower is in Paris."]);

        let response = v1_router(state.clone())
            .oneshot(post_json(
                "/chat",
                serde_json::json!({"session_id": "s-1", "message": "The Eiffel Tower is in Berlin."}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let chat: ChatResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(chat.session_id, "s-1");
        assert_eq!(chat.reply, "**Verdict:** FALSE The tower is in Paris.");
        assert_eq!(chat.evidence_count, 1);

        let req = Request::builder()
            .uri("/sessions/s-1")
            .body(Body::empty())
            .unwrap();
        let response = v1_router(state).oneshot(req).await.unwrap();
        let detail: SessionDetailResponse =
            serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(detail.turns.len(), 2);
        assert_eq!(detail.turns[0].role, Role::User);
        assert_eq!(detail.turns[1].content, chat.reply);
    }

    #[tokio::test]
    async fn chat_rejects_blank_message() {
        let response = v1_router(test_api_state(vec![]))
            .oneshot(post_json("/chat", serde_json::json!({"message": "   "})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn chat_search_failure_keeps_user_turn_only() {
        let state = state_with(true, vec!["unused"], 10);

        let response = v1_router(state.clone())
            .oneshot(post_json(
                "/chat",
                serde_json::json!({"session_id": "s-err", "message": "claim"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let err: ErrorResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(err.kind.as_deref(), Some("search_unavailable"));
        assert!(err.error.contains("search backend down"));

        let handle = state.get("s-err").await.unwrap();
        let session = handle.lock().await;
        assert_eq!(session.transcript.len(), 1);
        assert_eq!(session.transcript.turns()[0].role, Role::User);
    }

    #[tokio::test]
    async fn chat_stream_emits_turn_events() {
        let state = test_api_state(vec!["**Verdict:** FALSE"]);

        let response = v1_router(state)
            .oneshot(post_json(
                "/chat/stream",
                serde_json::json!({"message": "The Eiffel Tower is in Berlin."}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_bytes(response).await;
        let text = String::from_utf8_lossy(&body);
        assert!(text.starts_with("event: session\n"));
        assert!(text.contains("event: user_turn"));
        assert!(text.contains("event: phase"));
        assert!(text.contains(r#""phase":"searching""#));
        assert!(text.contains("event: chunk"));
        assert!(text.contains("event: committed"));
        assert!(!text.contains("event: error"));
    }

    #[tokio::test]
    async fn chat_stream_reports_reasoning_failure() {
        // No scripted replies: the reasoning call is rejected.
        let state = test_api_state(vec![]);

        let response = v1_router(state)
            .oneshot(post_json("/chat/stream", serde_json::json!({"message": "claim"})))
            .await
            .unwrap();

        let body = body_bytes(response).await;
        let text = String::from_utf8_lossy(&body);
        assert!(text.contains("event: error"));
        assert!(text.contains("reasoning_unavailable"));
        assert!(!text.contains("event: committed"));
    }

    #[tokio::test]
    async fn concurrent_turn_on_same_session_conflicts() {
        let state = test_api_state(vec!["unused"]);
        let (_, handle) = state.session_or_create(Some("busy")).await.unwrap();
        let _running = handle.lock().await;

        let response = v1_router(state)
            .oneshot(post_json(
                "/chat/stream",
                serde_json::json!({"session_id": "busy", "message": "claim"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn delete_session_ends_it() {
        let state = test_api_state(vec![]);
        state.session_or_create(Some("gone")).await.unwrap();

        let req = Request::builder()
            .method("DELETE")
            .uri("/sessions/gone")
            .body(Body::empty())
            .unwrap();
        let response = v1_router(state.clone()).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(state.session_count().await, 0);

        let req = Request::builder()
            .method("DELETE")
            .uri("/sessions/gone")
            .body(Body::empty())
            .unwrap();
        let response = v1_router(state).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn least_recently_active_session_is_evicted_at_capacity() {
        let state = state_with(false, vec![], 2);
        state.session_or_create(Some("first")).await.unwrap();
        state.session_or_create(Some("second")).await.unwrap();
        // Touching "first" makes "second" the stalest
        state.session_or_create(Some("first")).await.unwrap();
        state.session_or_create(Some("third")).await.unwrap();

        assert_eq!(state.session_count().await, 2);
        assert!(state.get("second").await.is_none());
        assert!(state.get("first").await.is_some());
        assert!(state.get("third").await.is_some());
    }

    #[tokio::test]
    async fn session_with_running_turn_is_never_evicted() {
        let state = state_with(false, vec!["unused"], 1);
        let (_, handle) = state.session_or_create(Some("a")).await.unwrap();
        let running = handle.clone().lock_owned().await;
        drop(handle);

        let Err((status, Json(err))) = state.session_or_create(Some("b")).await else {
            panic!("a full map of busy sessions must refuse new ones");
        };
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.error.contains("busy"));

        let response = v1_router(state.clone())
            .oneshot(post_json(
                "/chat",
                serde_json::json!({"session_id": "b", "message": "claim"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        assert_eq!(state.session_count().await, 1);
        let still_there = state.get("a").await.unwrap();
        assert!(Arc::ptr_eq(&still_there, OwnedMutexGuard::mutex(&running)));
    }

    #[tokio::test]
    async fn finished_session_becomes_evictable() {
        let state = state_with(false, vec![], 1);
        {
            let (_, handle) = state.session_or_create(Some("a")).await.unwrap();
            let _turn = handle.lock_owned().await;
        }

        state.session_or_create(Some("b")).await.unwrap();
        assert!(state.get("a").await.is_none());
        assert!(state.get("b").await.is_some());
    }

    #[tokio::test]
    async fn sessions_keep_separate_transcripts() {
        let state = test_api_state(vec!["**Verdict:** TRUE", "**Verdict:** FALSE"]);

        for (id, msg) in [("a", "claim a"), ("b", "claim b")] {
            let response = v1_router(state.clone())
                .oneshot(post_json(
                    "/chat",
                    serde_json::json!({"session_id": id, "message": msg}),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let a = state.get("a").await.unwrap();
        let a = a.lock().await;
        assert_eq!(a.transcript.len(), 2);
        assert_eq!(a.transcript.turns()[0].content, "claim a");
    }
}
