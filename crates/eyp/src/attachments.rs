//! Attachment retrieval.
//!
//! Attachments live with a storage collaborator and are fetched in
//! parallel, one task per attachment, before the package is built. A fetch
//! that fails or times out is logged and left out; it never fails the
//! build. Successful fetches keep their input order.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinSet;

use eyp_core::Attachment;

use crate::error::AttachmentUnavailable;

/// Where attachment content comes from.
#[async_trait]
pub trait AttachmentSource: Send + Sync + 'static {
    /// Fetch the attachment stored under `key`.
    async fn fetch(&self, key: &str) -> Result<Attachment, AttachmentUnavailable>;
}

/// Outcome of resolving a list of attachment keys.
#[derive(Debug, Clone, Default)]
pub struct ResolvedAttachments {
    /// Fetched attachments, in input order.
    pub attachments: Vec<Attachment>,
    /// Keys that could not be fetched, in input order.
    pub unavailable: Vec<AttachmentUnavailable>,
}

/// Fetch every key concurrently and join before returning.
pub async fn resolve_attachments(
    source: Arc<dyn AttachmentSource>,
    keys: &[String],
    timeout: Duration,
) -> ResolvedAttachments {
    let mut tasks = JoinSet::new();
    for (index, key) in keys.iter().enumerate() {
        let source = Arc::clone(&source);
        let key = key.clone();
        tasks.spawn(async move {
            let fetched = match tokio::time::timeout(timeout, source.fetch(&key)).await {
                Ok(result) => result,
                Err(_) => Err(AttachmentUnavailable::new(
                    key,
                    format!("no answer within {}ms", timeout.as_millis()),
                )),
            };
            (index, fetched)
        });
    }

    let mut slots: Vec<Option<Result<Attachment, AttachmentUnavailable>>> =
        (0..keys.len()).map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, fetched)) => slots[index] = Some(fetched),
            Err(e) => tracing::warn!(error = %e, "attachment fetch task failed"),
        }
    }

    let mut resolved = ResolvedAttachments::default();
    for (key, slot) in keys.iter().zip(slots) {
        match slot {
            Some(Ok(attachment)) => resolved.attachments.push(attachment),
            Some(Err(unavailable)) => {
                tracing::warn!(key = %unavailable.key, reason = %unavailable.reason, "dropping unavailable attachment");
                resolved.unavailable.push(unavailable);
            }
            None => {
                tracing::warn!(key = %key, "dropping attachment whose fetch task did not finish");
                resolved
                    .unavailable
                    .push(AttachmentUnavailable::new(key.clone(), "fetch task aborted"));
            }
        }
    }

    tracing::debug!(
        requested = keys.len(),
        resolved = resolved.attachments.len(),
        "resolved attachments"
    );
    resolved
}

/// In-memory attachment source.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    entries: HashMap<String, Result<Attachment, String>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `attachment` under `key`.
    pub fn with(mut self, key: impl Into<String>, attachment: Attachment) -> Self {
        self.entries.insert(key.into(), Ok(attachment));
        self
    }

    /// Fail every fetch of `key` with `reason`.
    pub fn with_failure(mut self, key: impl Into<String>, reason: impl Into<String>) -> Self {
        self.entries.insert(key.into(), Err(reason.into()));
        self
    }
}

#[async_trait]
impl AttachmentSource for MemorySource {
    async fn fetch(&self, key: &str) -> Result<Attachment, AttachmentUnavailable> {
        match self.entries.get(key) {
            Some(Ok(attachment)) => Ok(attachment.clone()),
            Some(Err(reason)) => Err(AttachmentUnavailable::new(key, reason.clone())),
            None => Err(AttachmentUnavailable::new(key, "not found")),
        }
    }
}
