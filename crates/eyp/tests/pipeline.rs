//! End-to-end scenarios: attachments, build, store, and signing against a
//! loopback stub agent and session authority.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Duration as ChronoDuration, Utc};
use tokio_util::sync::CancellationToken;

use eyp::core::{Attachment, EntryKind, StatusError};
use eyp::signer::{AttemptState, SignerAgent, SignerAgentClient, SignerConfig, SignerError, SigningSession};
use eyp::store::{MemoryStore, PackageStore, SqliteStore};
use eyp::{EypConfig, EypError, EypService, MemorySource, NewPackage, PackageStatus};
use eyp_testkit::stub::other_digest;
use eyp_testkit::{
    closed_port, parse_container, parse_metadata, sample_metadata, AgentBehaviour, AuthorityMode,
    StubAgent, StubAuthority, TestFixture,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Attachment "A" resolves; "B" is unavailable.
fn source() -> MemorySource {
    MemorySource::new()
        .with("A", Attachment::new("A.txt", "text/plain", b"0123456789".to_vec()))
        .with_failure("B", "object storage returned 500")
}

struct Harness {
    agent: StubAgent,
    authority: StubAuthority,
    fixture: TestFixture,
}

impl Harness {
    async fn start(behaviour: AgentBehaviour) -> Self {
        init_tracing();
        Self {
            agent: StubAgent::start(behaviour).await.unwrap(),
            authority: StubAuthority::start(AuthorityMode::Issue).await.unwrap(),
            fixture: TestFixture::new(),
        }
    }

    fn config(&self) -> EypConfig {
        EypConfig::default().with_signer(
            SignerConfig::default()
                .with_agent_port(self.agent.port())
                .with_session_endpoint(self.authority.endpoint()),
        )
    }

    fn service_with<S: PackageStore>(&self, store: S, config: EypConfig) -> EypService<S> {
        EypService::connect(store, Arc::new(source()), config).unwrap()
    }

    fn service(&self) -> EypService<MemoryStore> {
        self.service_with(MemoryStore::new(), self.config())
    }

    fn package(&self) -> NewPackage {
        NewPackage::new(
            self.fixture.cover(1024),
            sample_metadata(&self.fixture.document_number()),
        )
        .signer(self.fixture.signer())
        .attachment("A")
        .attachment("B")
    }
}

#[tokio::test]
async fn failing_attachment_is_left_out() {
    let harness = Harness::start(AgentBehaviour::SignRequested).await;
    let service = harness.service();

    let created = service.create_package(harness.package()).await.unwrap();
    let envelope = &created.envelope;

    assert_eq!(envelope.status, PackageStatus::Created);
    assert_eq!(envelope.attachment_count(), 1);
    assert_eq!(envelope.attachments[0].name, "A.txt");
    assert_eq!(envelope.attachments[0].size, 10);
    assert_eq!(created.unavailable.len(), 1);
    assert_eq!(created.unavailable[0].key, "B");

    let container = parse_container(&envelope.container).unwrap();
    assert_eq!(container.attachments().count(), 1);
    assert_eq!(
        container.kinds(),
        vec![
            EntryKind::Cover,
            EntryKind::Metadata,
            EntryKind::Manifest,
            EntryKind::Attachment,
            EntryKind::Signer,
        ]
    );
    assert!(envelope.container.len() >= 1024);

    let metadata = parse_metadata(container.metadata().unwrap()).unwrap();
    assert_eq!(metadata.file_digest, envelope.cover_digest.to_hex());
    assert_eq!(metadata.file_size, 1024);

    assert_eq!(
        service.status(&envelope.id).await.unwrap(),
        PackageStatus::Created
    );
}

#[tokio::test]
async fn sign_then_send() {
    let harness = Harness::start(AgentBehaviour::SignRequested).await;
    let service = harness.service();
    let id = service
        .create_package(harness.package())
        .await
        .unwrap()
        .envelope
        .id;

    let signed = service
        .sign_package(&id, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(signed.status, PackageStatus::Signed);
    assert!(signed.signed_at.is_some());

    let signature = signed.signature.as_ref().unwrap();
    assert_eq!(signature.digest, signed.cover_digest.to_hex());

    // The probe and the sign call both carried the session token.
    let token = Some(StubAuthority::token_for(0));
    assert_eq!(harness.agent.bearer_tokens(), vec![token.clone(), token]);

    let sent = service.mark_sent(&id).await.unwrap();
    assert_eq!(sent.status, PackageStatus::Sent);
    assert!(service.cancel(&id).await.is_err());

    let listed = service.list(Some(PackageStatus::Sent)).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, id);
}

#[tokio::test]
async fn closed_port_probe_is_bounded() {
    init_tracing();
    let client =
        SignerAgentClient::new(SignerConfig::default().with_agent_port(closed_port())).unwrap();
    let now = Utc::now();
    let session = SigningSession::new("t", now, now + ChronoDuration::minutes(1));

    let started = Instant::now();
    assert!(!client.check_availability(&session).await);
    assert!(started.elapsed() <= Duration::from_secs(3));
}

#[tokio::test]
async fn missing_agent_leaves_package_created() {
    let harness = Harness::start(AgentBehaviour::SignRequested).await;
    let port = closed_port();
    let mut config = harness.config();
    config.signer = config.signer.with_agent_port(port);
    let service = harness.service_with(MemoryStore::new(), config);
    let id = service
        .create_package(harness.package())
        .await
        .unwrap()
        .envelope
        .id;

    let err = service
        .sign_package(&id, CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EypError::Signing {
            state: AttemptState::AgentNotFound,
            ..
        }
    ));
    assert!(err.hint().unwrap().contains(&port.to_string()));
    assert_eq!(service.status(&id).await.unwrap(), PackageStatus::Created);
}

#[tokio::test]
async fn wrong_digest_is_refused() {
    let harness = Harness::start(AgentBehaviour::SignOtherDigest).await;
    let service = harness.service();
    let id = service
        .create_package(harness.package())
        .await
        .unwrap()
        .envelope
        .id;

    let err = service
        .sign_package(&id, CancellationToken::new())
        .await
        .unwrap_err();
    match err {
        EypError::Status(StatusError::DigestMismatch { presented, .. }) => {
            assert_eq!(presented, other_digest());
        }
        other => panic!("expected digest mismatch, got {:?}", other),
    }

    let stored = service.get(&id).await.unwrap();
    assert_eq!(stored.status, PackageStatus::Created);
    assert!(stored.signature.is_none());
    assert!(stored.signed_at.is_none());
}

#[tokio::test]
async fn declined_signature_leaves_package_created() {
    let harness = Harness::start(AgentBehaviour::Decline).await;
    let service = harness.service();
    let id = service
        .create_package(harness.package())
        .await
        .unwrap()
        .envelope
        .id;

    let err = service
        .sign_package(&id, CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EypError::Signing {
            state: AttemptState::Declined,
            source: SignerError::SigningDeclined(_),
        }
    ));
    assert_eq!(service.status(&id).await.unwrap(), PackageStatus::Created);
}

#[tokio::test]
async fn cancellation_leaves_package_created() {
    let harness = Harness::start(AgentBehaviour::Hang).await;
    let service = harness.service();
    let id = service
        .create_package(harness.package())
        .await
        .unwrap()
        .envelope
        .id;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let err = service.sign_package(&id, cancel).await.unwrap_err();
    assert!(matches!(
        err,
        EypError::Signing {
            state: AttemptState::Cancelled,
            source: SignerError::Cancelled,
        }
    ));
    assert_eq!(service.status(&id).await.unwrap(), PackageStatus::Created);

    // A retry gets a fresh session.
    assert_eq!(harness.authority.issued(), 1);
}

#[tokio::test]
async fn sign_timeout_is_not_cancellation() {
    let harness = Harness::start(AgentBehaviour::Hang).await;
    let mut config = harness.config();
    config.signer = config.signer.with_sign_timeout(Duration::from_millis(300));
    let service = harness.service_with(MemoryStore::new(), config);
    let id = service
        .create_package(harness.package())
        .await
        .unwrap()
        .envelope
        .id;

    let err = service
        .sign_package(&id, CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EypError::Signing {
            state: AttemptState::Error,
            source: SignerError::NetworkTimeout { .. },
        }
    ));
    assert_eq!(service.status(&id).await.unwrap(), PackageStatus::Created);
}

#[tokio::test]
async fn signed_package_survives_reopen() {
    let harness = Harness::start(AgentBehaviour::SignRequested).await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("eyp.db");

    let (id, container) = {
        let service = harness.service_with(SqliteStore::open(&path).unwrap(), harness.config());
        let created = service.create_package(harness.package()).await.unwrap();
        service
            .sign_package(&created.envelope.id, CancellationToken::new())
            .await
            .unwrap();
        (created.envelope.id, created.envelope.container)
    };

    let service = harness.service_with(SqliteStore::open(&path).unwrap(), harness.config());
    let stored = service.get(&id).await.unwrap();
    assert_eq!(stored.status, PackageStatus::Signed);
    assert!(stored.signature.is_some());

    let download = service.download(&id).await.unwrap();
    assert_eq!(download.bytes, container);
    assert!(download.file_name.ends_with(".eyp"));
}
