//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::atomic::{AtomicU32, Ordering};

use chrono::NaiveDate;

use eyp_core::{
    Attachment, BuiltPackage, CoverDocument, DeliveryTarget, DocumentEnvelope, PackageBuilder,
    PackageMetadata, Party, SignerInfo,
};
use eyp_store::MemoryStore;

/// Complete, valid metadata for document `number`.
pub fn sample_metadata(number: &str) -> PackageMetadata {
    let mut metadata = PackageMetadata::new()
        .document_number(number)
        .date(NaiveDate::from_ymd_opt(2026, 3, 16).expect("valid date"))
        .subject("Olağan genel kurul toplantısı")
        .sender(Party::named("Oda Yönetim Kurulu").with_id("34000001"))
        .recipient(Party::named("Ticaret İl Müdürlüğü").with_role("Müdür"));
    metadata
        .delivery_targets
        .push(DeliveryTarget::new("ilmudurlugu@hs01.kep.tr").with_purpose("Bilgi"));
    metadata
}

/// A test fixture with a memory store and a counter for document numbers.
pub struct TestFixture {
    pub store: MemoryStore,
    next: AtomicU32,
}

impl TestFixture {
    pub fn new() -> Self {
        Self {
            store: MemoryStore::new(),
            next: AtomicU32::new(1),
        }
    }

    /// Next unique document number, `E-TEST-0001` onwards.
    pub fn document_number(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("E-TEST-{:04}", n)
    }

    /// A cover document of `size` bytes with a PDF header.
    pub fn cover(&self, size: usize) -> CoverDocument {
        let mut bytes = b"%PDF-1.7\n".to_vec();
        bytes.resize(size.max(bytes.len()), b'.');
        bytes.truncate(size);
        CoverDocument::new("ust-yazi.pdf", bytes)
    }

    /// A text attachment with the given name and content.
    pub fn attachment(&self, name: &str, content: &[u8]) -> Attachment {
        Attachment::new(name, "text/plain", content.to_vec())
    }

    pub fn signer(&self) -> SignerInfo {
        SignerInfo::new("Ayşe", "Yılmaz")
            .with_title("Genel Sekreter")
            .with_capacity("Oda Genel Sekreteri")
    }

    /// Build a package with a 1 KiB cover and one attachment.
    pub fn built(&self) -> BuiltPackage {
        PackageBuilder::new(self.cover(1024), sample_metadata(&self.document_number()))
            .attachment(self.attachment("liste.txt", b"1. Ali\n2. Veli\n"))
            .signers(vec![self.signer()])
            .build()
            .expect("fixture package builds")
    }

    /// A freshly created envelope.
    pub fn envelope(&self) -> DocumentEnvelope {
        DocumentEnvelope::created(self.built(), now_millis())
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyp_core::PackageStatus;
    use eyp_store::{InsertResult, PackageStore};

    #[test]
    fn test_cover_has_exact_size() {
        let fixture = TestFixture::new();
        assert_eq!(fixture.cover(1024).len(), 1024);
        assert_eq!(fixture.cover(4).len(), 4);
    }

    #[test]
    fn test_document_numbers_are_unique() {
        let fixture = TestFixture::new();
        assert_ne!(fixture.document_number(), fixture.document_number());
    }

    #[tokio::test]
    async fn test_envelope_goes_into_store() {
        let fixture = TestFixture::new();
        let envelope = fixture.envelope();
        assert_eq!(envelope.status, PackageStatus::Created);
        assert_eq!(envelope.attachments.len(), 1);

        let result = fixture.store.insert_package(&envelope).await.unwrap();
        assert_eq!(result, InsertResult::Inserted);
    }
}
