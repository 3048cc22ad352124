//! Loopback stand-ins for the signer agent and the session authority.
//!
//! Both bind `127.0.0.1:0`, serve with axum on a background task and shut
//! down when dropped. They record every bearer token they see so tests can
//! check that each call was authenticated.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A port on `127.0.0.1` with nothing listening.
pub fn closed_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .map(|addr| addr.port())
        .unwrap_or(9)
}

/// What the stub agent does with `POST /sign`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentBehaviour {
    /// Sign exactly the digest it was sent.
    SignRequested,
    /// Report success over a digest other than the one it was sent.
    SignOtherDigest,
    /// The user declines in the agent.
    Decline,
    /// The card fails.
    Fail,
    /// Refuse the session token.
    Unauthorized,
    /// Never answer.
    Hang,
    /// Answer with something that is not JSON.
    Malformed,
}

/// Signature payload returned by the stub.
pub const STUB_SIGNATURE: &str = "MEUCIQDstub-signature";

/// Timestamp returned by the stub (Unix ms).
pub const STUB_TIMESTAMP: i64 = 1_767_225_600_000;

/// Digest reported by [`AgentBehaviour::SignOtherDigest`].
pub fn other_digest() -> String {
    eyp_core::digest(b"a different document")
}

#[derive(Default)]
struct Recorder {
    tokens: Mutex<Vec<Option<String>>>,
    bodies: Mutex<Vec<Value>>,
}

impl Recorder {
    fn token(&self, headers: &HeaderMap) {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_string);
        self.tokens
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(token);
    }

    fn body(&self, body: Value) {
        self.bodies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(body);
    }

    fn tokens(&self) -> Vec<Option<String>> {
        self.tokens.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn bodies(&self) -> Vec<Value> {
        self.bodies.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// A running axum server on a loopback port.
struct Served {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl Served {
    async fn start(app: Router) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("bind loopback listener")?;
        let addr = listener.local_addr()?;
        let (tx, rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let shutdown = async {
                let _ = rx.await;
            };
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                tracing::warn!(error = %e, "stub server stopped with error");
            }
        });

        Ok(Self {
            addr,
            shutdown: Some(tx),
            task,
        })
    }
}

impl Drop for Served {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.task.abort();
    }
}

struct AgentState {
    behaviour: AgentBehaviour,
    recorder: Recorder,
}

/// Stub signer agent: `GET /status` and `POST /sign`.
pub struct StubAgent {
    served: Served,
    state: Arc<AgentState>,
}

impl StubAgent {
    pub async fn start(behaviour: AgentBehaviour) -> Result<Self> {
        let state = Arc::new(AgentState {
            behaviour,
            recorder: Recorder::default(),
        });
        let app = Router::new()
            .route("/status", get(agent_status))
            .route("/sign", post(agent_sign))
            .with_state(state.clone());

        Ok(Self {
            served: Served::start(app).await?,
            state,
        })
    }

    pub fn port(&self) -> u16 {
        self.served.addr.port()
    }

    /// Bearer token of every request received, in order. `None` for a
    /// request without one.
    pub fn bearer_tokens(&self) -> Vec<Option<String>> {
        self.state.recorder.tokens()
    }

    /// Every `POST /sign` body received.
    pub fn sign_requests(&self) -> Vec<Value> {
        self.state.recorder.bodies()
    }
}

async fn agent_status(State(state): State<Arc<AgentState>>, headers: HeaderMap) -> StatusCode {
    state.recorder.token(&headers);
    StatusCode::OK
}

async fn agent_sign(
    State(state): State<Arc<AgentState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.recorder.token(&headers);
    let requested = body["digest"].as_str().unwrap_or_default().to_string();
    state.recorder.body(body);

    match state.behaviour {
        AgentBehaviour::SignRequested => Json(json!({
            "success": true,
            "signature": STUB_SIGNATURE,
            "digest": requested,
            "algorithm": "SHA-256",
            "timestamp": STUB_TIMESTAMP,
        }))
        .into_response(),
        AgentBehaviour::SignOtherDigest => Json(json!({
            "success": true,
            "signature": STUB_SIGNATURE,
            "digest": other_digest(),
            "algorithm": "SHA-256",
            "timestamp": STUB_TIMESTAMP,
        }))
        .into_response(),
        AgentBehaviour::Decline => Json(json!({
            "success": false,
            "code": "declined",
            "error": "user declined to sign",
        }))
        .into_response(),
        AgentBehaviour::Fail => Json(json!({
            "success": false,
            "code": "card_error",
            "error": "smart card not present",
        }))
        .into_response(),
        AgentBehaviour::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
        AgentBehaviour::Hang => {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            StatusCode::REQUEST_TIMEOUT.into_response()
        }
        AgentBehaviour::Malformed => (StatusCode::OK, "<html>not json</html>").into_response(),
    }
}

/// How the stub authority answers `POST /session`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorityMode {
    /// Issue sessions valid for five minutes.
    Issue,
    /// Issue sessions that have already expired.
    IssueExpired,
    /// Answer 503.
    Reject,
}

struct AuthorityState {
    mode: AuthorityMode,
    issued: AtomicUsize,
    recorder: Recorder,
}

/// Stub session authority: `POST /session`.
pub struct StubAuthority {
    served: Served,
    state: Arc<AuthorityState>,
}

impl StubAuthority {
    pub async fn start(mode: AuthorityMode) -> Result<Self> {
        let state = Arc::new(AuthorityState {
            mode,
            issued: AtomicUsize::new(0),
            recorder: Recorder::default(),
        });
        let app = Router::new()
            .route("/session", post(issue_session))
            .with_state(state.clone());

        Ok(Self {
            served: Served::start(app).await?,
            state,
        })
    }

    /// URL of the session endpoint.
    pub fn endpoint(&self) -> String {
        format!("http://{}/session", self.served.addr)
    }

    /// Number of sessions issued so far.
    pub fn issued(&self) -> usize {
        self.state.issued.load(Ordering::SeqCst)
    }

    /// Token that the `n`th issued session carries (0-based).
    pub fn token_for(n: usize) -> String {
        format!("stub-session-{}", n)
    }

    /// Backend credentials presented to the authority.
    pub fn credentials(&self) -> Vec<Option<String>> {
        self.state.recorder.tokens()
    }
}

async fn issue_session(State(state): State<Arc<AuthorityState>>, headers: HeaderMap) -> Response {
    state.recorder.token(&headers);

    let now = Utc::now();
    let expires_at = match state.mode {
        AuthorityMode::Reject => return StatusCode::SERVICE_UNAVAILABLE.into_response(),
        AuthorityMode::Issue => now + chrono::Duration::minutes(5),
        AuthorityMode::IssueExpired => now - chrono::Duration::minutes(1),
    };
    let n = state.issued.fetch_add(1, Ordering::SeqCst);

    Json(json!({
        "token": StubAuthority::token_for(n),
        "issued_at": now.to_rfc3339(),
        "expires_at": expires_at.to_rfc3339(),
    }))
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_agent_records_tokens() {
        let agent = StubAgent::start(AgentBehaviour::SignRequested).await.unwrap();
        let client = reqwest::Client::builder().no_proxy().build().unwrap();

        let status = client
            .get(format!("http://127.0.0.1:{}/status", agent.port()))
            .bearer_auth("t-1")
            .send()
            .await
            .unwrap();
        assert!(status.status().is_success());

        let signed: Value = client
            .post(format!("http://127.0.0.1:{}/sign", agent.port()))
            .bearer_auth("t-1")
            .json(&json!({"digest": "abcd"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(signed["digest"], "abcd");
        assert_eq!(
            agent.bearer_tokens(),
            vec![Some("t-1".to_string()), Some("t-1".to_string())]
        );
        assert_eq!(agent.sign_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_authority_issues_numbered_sessions() {
        let authority = StubAuthority::start(AuthorityMode::Issue).await.unwrap();
        let client = reqwest::Client::builder().no_proxy().build().unwrap();

        for _ in 0..2 {
            let response = client.post(authority.endpoint()).send().await.unwrap();
            assert!(response.status().is_success());
        }
        assert_eq!(authority.issued(), 2);
    }

    #[test]
    fn test_closed_port_refuses() {
        let port = closed_port();
        assert!(std::net::TcpStream::connect(("127.0.0.1", port)).is_err());
    }
}
