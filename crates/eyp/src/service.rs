//! The service: unified API for packaging and signing.
//!
//! Brings together attachment retrieval, the package builder, storage and
//! the signing pipeline.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use eyp_core::{
    CoverDocument, DeliveryTarget, DocumentEnvelope, PackageBuilder, PackageId, PackageMetadata,
    PackageStatus, SignerInfo, StatusError,
};
use eyp_signer::{
    run_attempt, HttpSessionBroker, SessionBroker, SignHashRequest, SignerAgent,
    SignerAgentClient,
};
use eyp_store::{InsertResult, PackageStore, PackageSummary, StatusUpdate, UpdateResult};

use crate::attachments::{resolve_attachments, AttachmentSource};
use crate::config::EypConfig;
use crate::error::{AttachmentUnavailable, EypError, Result};

/// Everything needed to create one package.
#[derive(Debug, Clone)]
pub struct NewPackage {
    pub cover: CoverDocument,
    pub metadata: PackageMetadata,
    pub delivery_targets: Vec<DeliveryTarget>,
    pub signers: Vec<SignerInfo>,
    /// Keys to fetch from the attachment source, in package order.
    pub attachments: Vec<String>,
}

impl NewPackage {
    pub fn new(cover: CoverDocument, metadata: PackageMetadata) -> Self {
        Self {
            cover,
            metadata,
            delivery_targets: Vec::new(),
            signers: Vec::new(),
            attachments: Vec::new(),
        }
    }

    pub fn delivery_target(mut self, target: DeliveryTarget) -> Self {
        self.delivery_targets.push(target);
        self
    }

    pub fn signer(mut self, signer: SignerInfo) -> Self {
        self.signers.push(signer);
        self
    }

    pub fn attachment(mut self, key: impl Into<String>) -> Self {
        self.attachments.push(key.into());
        self
    }
}

/// A stored package plus the attachments that were left out of it.
#[derive(Debug, Clone)]
pub struct Created {
    pub envelope: DocumentEnvelope,
    pub unavailable: Vec<AttachmentUnavailable>,
}

/// A container ready to hand out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub file_name: String,
    pub bytes: Bytes,
}

/// The EYP service.
pub struct EypService<S: PackageStore> {
    store: Arc<S>,
    attachments: Arc<dyn AttachmentSource>,
    broker: Arc<dyn SessionBroker>,
    agent: Arc<dyn SignerAgent>,
    config: EypConfig,
}

impl<S: PackageStore> EypService<S> {
    /// Create a service over explicit collaborators.
    pub fn new(
        store: S,
        attachments: Arc<dyn AttachmentSource>,
        broker: Arc<dyn SessionBroker>,
        agent: Arc<dyn SignerAgent>,
        config: EypConfig,
    ) -> Self {
        Self {
            store: Arc::new(store),
            attachments,
            broker,
            agent,
            config,
        }
    }

    /// Create a service that talks to the session authority and the
    /// signer agent over HTTP, as configured.
    pub fn connect(
        store: S,
        attachments: Arc<dyn AttachmentSource>,
        config: EypConfig,
    ) -> Result<Self> {
        let broker = HttpSessionBroker::new(&config.signer)?;
        let agent = SignerAgentClient::new(config.signer.clone())?;
        Ok(Self::new(
            store,
            attachments,
            Arc::new(broker),
            Arc::new(agent),
            config,
        ))
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EypConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Packaging
    // ─────────────────────────────────────────────────────────────────────────

    /// Fetch attachments, build the container and store it as `created`.
    ///
    /// Unavailable attachments are left out and reported in
    /// [`Created::unavailable`]. A build error stores nothing.
    pub async fn create_package(&self, package: NewPackage) -> Result<Created> {
        let resolved = resolve_attachments(
            Arc::clone(&self.attachments),
            &package.attachments,
            self.config.attachment_timeout,
        )
        .await;

        let built = PackageBuilder::new(package.cover, package.metadata)
            .delivery_targets(package.delivery_targets)
            .signers(package.signers)
            .attachments(resolved.attachments)
            .build()?;

        let envelope = DocumentEnvelope::created(built, now_millis());
        match self.store.insert_package(&envelope).await? {
            InsertResult::Inserted => {}
            InsertResult::AlreadyExists => return Err(EypError::AlreadyExists(envelope.id)),
        }

        tracing::info!(
            package = %envelope.id,
            document = %envelope.document_number,
            attachments = envelope.attachment_count(),
            dropped = resolved.unavailable.len(),
            "package created"
        );

        Ok(Created {
            envelope,
            unavailable: resolved.unavailable,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Signing
    // ─────────────────────────────────────────────────────────────────────────

    /// Run one signing attempt for a `created` package.
    ///
    /// The envelope is not locked while the user enters the PIN. The result
    /// is checked against the stored cover digest and written with a
    /// compare-and-set on `created`. Any failure leaves the stored package
    /// `created`; a new attempt gets a new session.
    pub async fn sign_package(
        &self,
        id: &PackageId,
        cancel: CancellationToken,
    ) -> Result<DocumentEnvelope> {
        let mut envelope = self.load(id).await?;
        if !envelope.status.can_transition_to(PackageStatus::Signed) {
            return Err(StatusError::InvalidTransition {
                from: envelope.status,
                to: PackageStatus::Signed,
            }
            .into());
        }

        let request = SignHashRequest::new(envelope.cover_digest.to_hex(), envelope.context.clone());
        let outcome = run_attempt(&*self.broker, &*self.agent, request, cancel).await;
        let state = outcome.state();
        let result = outcome
            .result
            .map_err(|source| EypError::Signing { state, source })?;

        envelope.apply_signature(result, now_millis())?;
        self.write_status(&envelope, PackageStatus::Created).await?;
        Ok(envelope)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Status
    // ─────────────────────────────────────────────────────────────────────────

    /// `signed → sent`, once the collaborator has dispatched the container.
    pub async fn mark_sent(&self, id: &PackageId) -> Result<DocumentEnvelope> {
        let mut envelope = self.load(id).await?;
        let expected = envelope.status;
        envelope.mark_sent()?;
        self.write_status(&envelope, expected).await?;
        Ok(envelope)
    }

    /// `created | signed → cancelled`.
    pub async fn cancel(&self, id: &PackageId) -> Result<DocumentEnvelope> {
        let mut envelope = self.load(id).await?;
        let expected = envelope.status;
        envelope.cancel()?;
        self.write_status(&envelope, expected).await?;
        Ok(envelope)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn get(&self, id: &PackageId) -> Result<DocumentEnvelope> {
        self.load(id).await
    }

    pub async fn status(&self, id: &PackageId) -> Result<PackageStatus> {
        self.store
            .get_status(id)
            .await?
            .ok_or(EypError::NotFound(*id))
    }

    pub async fn list(&self, status: Option<PackageStatus>) -> Result<Vec<PackageSummary>> {
        Ok(self.store.list_packages(status).await?)
    }

    /// The sealed container and its download name.
    pub async fn download(&self, id: &PackageId) -> Result<Download> {
        let envelope = self.load(id).await?;
        Ok(Download {
            file_name: envelope.file_name(),
            bytes: envelope.container,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal
    // ─────────────────────────────────────────────────────────────────────────

    async fn load(&self, id: &PackageId) -> Result<DocumentEnvelope> {
        self.store
            .get_package(id)
            .await?
            .ok_or(EypError::NotFound(*id))
    }

    async fn write_status(&self, envelope: &DocumentEnvelope, expected: PackageStatus) -> Result<()> {
        let update = StatusUpdate::from_envelope(envelope);
        match self.store.update_status(&envelope.id, expected, update).await? {
            UpdateResult::Updated => Ok(()),
            UpdateResult::Stale { current } => {
                tracing::warn!(
                    package = %envelope.id,
                    expected = %expected,
                    current = %current,
                    "status write refused: package changed concurrently"
                );
                Err(EypError::StaleStatus { current })
            }
        }
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
