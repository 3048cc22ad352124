//! One signing attempt, from session request to terminal state.
//!
//! ```text
//! Idle ─▶ ProbingAgent ─┬─▶ AgentFound ─▶ AwaitingUserPin ─┬─▶ Signed
//!   │                   │                                  ├─▶ Declined
//!   │                   └─▶ AgentNotFound                  ├─▶ Error
//!   └─▶ Error | Cancelled                                  └─▶ Cancelled
//! ```
//!
//! Only `Signed` yields a [`SignatureResult`]. Every other terminal state
//! carries the [`SignerError`] that caused it.

use std::fmt;

use tokio_util::sync::CancellationToken;

use eyp_core::SignatureResult;

use crate::agent::SignerAgent;
use crate::error::SignerError;
use crate::messages::SignHashRequest;
use crate::session::SessionBroker;

/// State of a signing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttemptState {
    Idle,
    ProbingAgent,
    AgentFound,
    AwaitingUserPin,
    Signed,
    Declined,
    Error,
    AgentNotFound,
    Cancelled,
}

impl AttemptState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ProbingAgent => "probing_agent",
            Self::AgentFound => "agent_found",
            Self::AwaitingUserPin => "awaiting_user_pin",
            Self::Signed => "signed",
            Self::Declined => "declined",
            Self::Error => "error",
            Self::AgentNotFound => "agent_not_found",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Signed | Self::Declined | Self::Error | Self::AgentNotFound | Self::Cancelled
        )
    }

    pub fn can_transition_to(self, next: AttemptState) -> bool {
        use AttemptState::*;
        matches!(
            (self, next),
            (Idle, ProbingAgent)
                | (Idle, Error)
                | (Idle, Cancelled)
                | (ProbingAgent, AgentFound)
                | (ProbingAgent, AgentNotFound)
                | (ProbingAgent, Cancelled)
                | (AgentFound, AwaitingUserPin)
                | (AwaitingUserPin, Signed)
                | (AwaitingUserPin, Declined)
                | (AwaitingUserPin, Error)
                | (AwaitingUserPin, Cancelled)
        )
    }
}

impl fmt::Display for AttemptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A finished attempt.
#[derive(Debug)]
pub struct AttemptOutcome {
    /// Every state visited, starting at `Idle`.
    pub history: Vec<AttemptState>,
    pub result: Result<SignatureResult, SignerError>,
}

impl AttemptOutcome {
    pub fn state(&self) -> AttemptState {
        self.history.last().copied().unwrap_or(AttemptState::Idle)
    }

    /// Remediation text for a failed attempt.
    pub fn hint(&self) -> Option<String> {
        self.result.as_ref().err().map(SignerError::hint)
    }
}

struct Tracker {
    history: Vec<AttemptState>,
}

impl Tracker {
    fn new() -> Self {
        Self {
            history: vec![AttemptState::Idle],
        }
    }

    fn current(&self) -> AttemptState {
        self.history.last().copied().unwrap_or(AttemptState::Idle)
    }

    fn advance(&mut self, next: AttemptState) {
        let current = self.current();
        debug_assert!(
            current.can_transition_to(next),
            "illegal attempt transition {} -> {}",
            current,
            next
        );
        tracing::debug!(from = %current, to = %next, "signing attempt transition");
        self.history.push(next);
    }

    fn finish(mut self, result: Result<SignatureResult, SignerError>) -> AttemptOutcome {
        let terminal = match &result {
            Ok(_) => AttemptState::Signed,
            Err(SignerError::SigningDeclined(_)) => AttemptState::Declined,
            Err(SignerError::Cancelled) => AttemptState::Cancelled,
            Err(SignerError::AgentUnavailable { .. })
                if self.current() == AttemptState::ProbingAgent =>
            {
                AttemptState::AgentNotFound
            }
            Err(_) => AttemptState::Error,
        };
        self.advance(terminal);

        match &result {
            Ok(_) => tracing::info!(state = %terminal, "signing attempt finished"),
            Err(e) => tracing::warn!(state = %terminal, error = %e, "signing attempt failed"),
        }

        AttemptOutcome {
            history: self.history,
            result,
        }
    }
}

/// Drive one attempt to a terminal state.
///
/// Obtains its own session from `broker`, probes `agent`, then asks it to
/// sign. `cancel` is honoured in every waiting phase.
pub async fn run_attempt(
    broker: &dyn SessionBroker,
    agent: &dyn SignerAgent,
    request: SignHashRequest,
    cancel: CancellationToken,
) -> AttemptOutcome {
    let mut tracker = Tracker::new();

    let session = tokio::select! {
        biased;
        _ = cancel.cancelled() => return tracker.finish(Err(SignerError::Cancelled)),
        session = broker.request_session_token() => match session {
            Ok(session) => session,
            Err(e) => return tracker.finish(Err(e)),
        },
    };

    tracker.advance(AttemptState::ProbingAgent);
    let available = tokio::select! {
        biased;
        _ = cancel.cancelled() => return tracker.finish(Err(SignerError::Cancelled)),
        available = agent.check_availability(&session) => available,
    };
    if !available {
        return tracker.finish(Err(SignerError::AgentUnavailable { port: agent.port() }));
    }

    tracker.advance(AttemptState::AgentFound);
    tracker.advance(AttemptState::AwaitingUserPin);

    let result = agent.sign_hash(session, request, cancel).await;
    tracker.finish(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::session::SigningSession;
    use async_trait::async_trait;
    use chrono::{Duration, NaiveDate, Utc};
    use eyp_core::{DigestAlgorithm, DocumentContext};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedBroker {
        fail: bool,
        issued: AtomicUsize,
    }

    impl FixedBroker {
        fn ok() -> Self {
            Self {
                fail: false,
                issued: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SessionBroker for FixedBroker {
        async fn request_session_token(&self) -> Result<SigningSession> {
            if self.fail {
                return Err(SignerError::SessionUnavailable("authority down".into()));
            }
            let n = self.issued.fetch_add(1, Ordering::SeqCst);
            let now = Utc::now();
            Ok(SigningSession::new(
                format!("token-{}", n),
                now,
                now + Duration::minutes(5),
            ))
        }
    }

    enum Behaviour {
        Sign,
        Decline,
        Fail,
        Hang,
    }

    struct ScriptedAgent {
        available: bool,
        behaviour: Behaviour,
    }

    #[async_trait]
    impl SignerAgent for ScriptedAgent {
        fn port(&self) -> u16 {
            8099
        }

        async fn check_availability(&self, _session: &SigningSession) -> bool {
            self.available
        }

        async fn sign_hash(
            &self,
            _session: SigningSession,
            request: SignHashRequest,
            cancel: CancellationToken,
        ) -> Result<SignatureResult> {
            match self.behaviour {
                Behaviour::Sign => Ok(SignatureResult {
                    algorithm: DigestAlgorithm::Sha256,
                    digest: request.digest,
                    signature: "sig".into(),
                    timestamp: 1,
                    success: true,
                    error: None,
                }),
                Behaviour::Decline => Err(SignerError::SigningDeclined("no".into())),
                Behaviour::Fail => Err(SignerError::signing("card error")),
                Behaviour::Hang => {
                    cancel.cancelled().await;
                    Err(SignerError::Cancelled)
                }
            }
        }
    }

    fn request() -> SignHashRequest {
        SignHashRequest::new(
            "ab".repeat(32),
            DocumentContext {
                number: "E-9".into(),
                date: NaiveDate::from_ymd_opt(2026, 9, 9).unwrap(),
                subject: "Konu".into(),
                recipient: Some("Valilik".into()),
            },
        )
    }

    fn agent(available: bool, behaviour: Behaviour) -> ScriptedAgent {
        ScriptedAgent {
            available,
            behaviour,
        }
    }

    #[tokio::test]
    async fn test_happy_path_visits_every_state() {
        let outcome = run_attempt(
            &FixedBroker::ok(),
            &agent(true, Behaviour::Sign),
            request(),
            CancellationToken::new(),
        )
        .await;

        use AttemptState::*;
        assert_eq!(
            outcome.history,
            vec![Idle, ProbingAgent, AgentFound, AwaitingUserPin, Signed]
        );
        assert_eq!(outcome.result.unwrap().digest, "ab".repeat(32));
    }

    #[tokio::test]
    async fn test_agent_not_found() {
        let outcome = run_attempt(
            &FixedBroker::ok(),
            &agent(false, Behaviour::Sign),
            request(),
            CancellationToken::new(),
        )
        .await;

        assert_eq!(outcome.state(), AttemptState::AgentNotFound);
        assert!(outcome.hint().unwrap().contains("8099"));
    }

    #[tokio::test]
    async fn test_decline_and_error() {
        let declined = run_attempt(
            &FixedBroker::ok(),
            &agent(true, Behaviour::Decline),
            request(),
            CancellationToken::new(),
        )
        .await;
        assert_eq!(declined.state(), AttemptState::Declined);

        let failed = run_attempt(
            &FixedBroker::ok(),
            &agent(true, Behaviour::Fail),
            request(),
            CancellationToken::new(),
        )
        .await;
        assert_eq!(failed.state(), AttemptState::Error);
        assert!(failed.result.is_err());
    }

    #[tokio::test]
    async fn test_broker_failure_lands_in_error() {
        let broker = FixedBroker {
            fail: true,
            issued: AtomicUsize::new(0),
        };
        let outcome = run_attempt(
            &broker,
            &agent(true, Behaviour::Sign),
            request(),
            CancellationToken::new(),
        )
        .await;

        assert_eq!(outcome.history, vec![AttemptState::Idle, AttemptState::Error]);
        assert!(matches!(
            outcome.result,
            Err(SignerError::SessionUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_cancel_while_awaiting_pin() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let outcome = run_attempt(
            &FixedBroker::ok(),
            &agent(true, Behaviour::Hang),
            request(),
            cancel,
        )
        .await;
        assert_eq!(outcome.state(), AttemptState::Cancelled);
    }

    #[tokio::test]
    async fn test_each_attempt_gets_its_own_session() {
        let broker = FixedBroker::ok();
        for _ in 0..3 {
            run_attempt(
                &broker,
                &agent(true, Behaviour::Sign),
                request(),
                CancellationToken::new(),
            )
            .await;
        }
        assert_eq!(broker.issued.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        use AttemptState::*;
        let all = [
            Idle,
            ProbingAgent,
            AgentFound,
            AwaitingUserPin,
            Signed,
            Declined,
            Error,
            AgentNotFound,
            Cancelled,
        ];
        for from in all.iter().filter(|s| s.is_terminal()) {
            assert!(all.iter().all(|to| !from.can_transition_to(*to)));
        }
    }
}
