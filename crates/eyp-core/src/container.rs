//! Package builder: seals a cover document, its metadata and attachments
//! into one container.
//!
//! Entry order is fixed: cover document, metadata, manifest, attachments
//! (input order), signer-info entries. The builder does no I/O. Attachment
//! bytes must already be resolved; entries that failed to resolve are
//! dropped by the caller before they get here.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::canonical::{container_bytes, encode_metadata, manifest_bytes, signer_bytes};
use crate::digest::Sha256Digest;
use crate::envelope::{DocumentContext, SignerInfo};
use crate::error::BuildError;
use crate::metadata::{DeliveryTarget, EmbeddedFile, PackageMetadata};
use crate::validation::validate_metadata;

/// Format tag written at the head of every container.
pub const CONTAINER_FORMAT: &str = "eyp/v1";

/// Path of the metadata entry inside the container.
pub const METADATA_PATH: &str = "metadata.cbor";

/// Path of the manifest entry inside the container.
pub const MANIFEST_PATH: &str = "manifest.cbor";

/// Media type assumed for cover documents.
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// The kind of a container entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EntryKind {
    Cover = 1,
    Metadata = 2,
    Manifest = 3,
    Attachment = 4,
    Signer = 5,
}

impl EntryKind {
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Cover),
            2 => Some(Self::Metadata),
            3 => Some(Self::Manifest),
            4 => Some(Self::Attachment),
            5 => Some(Self::Signer),
            _ => None,
        }
    }
}

/// The rendered cover document (usually a PDF) that gets signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverDocument {
    file_name: String,
    signed_file_name: String,
    media_type: String,
    bytes: Bytes,
}

impl CoverDocument {
    /// Wrap rendered bytes. The post-signature name is derived from
    /// `file_name` (`letter.pdf` becomes `letter_signed.pdf`).
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let file_name = file_name.into();
        let signed_file_name = signed_name_for(&file_name);
        Self {
            file_name,
            signed_file_name,
            media_type: PDF_MEDIA_TYPE.to_string(),
            bytes: bytes.into(),
        }
    }

    pub fn with_signed_file_name(mut self, name: impl Into<String>) -> Self {
        self.signed_file_name = name.into();
        self
    }

    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = media_type.into();
        self
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn signed_file_name(&self) -> &str {
        &self.signed_file_name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Describe this document for the metadata, digesting its bytes.
    pub fn describe(&self) -> EmbeddedFile {
        EmbeddedFile::new(
            self.file_name.clone(),
            self.signed_file_name.clone(),
            self.media_type.clone(),
            self.bytes.len() as u64,
            Sha256Digest::hash(&self.bytes),
        )
    }
}

fn signed_name_for(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}_signed.{}", stem, ext),
        _ => format!("{}_signed", file_name),
    }
}

/// A resolved attachment. Size and digest are computed from the content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    file_name: String,
    media_type: String,
    content: Bytes,
    digest: Sha256Digest,
}

impl Attachment {
    pub fn new(
        file_name: impl Into<String>,
        media_type: impl Into<String>,
        content: impl Into<Bytes>,
    ) -> Self {
        let content = content.into();
        let digest = Sha256Digest::hash(&content);
        Self {
            file_name: file_name.into(),
            media_type: media_type.into(),
            content,
            digest,
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }

    pub fn digest(&self) -> &Sha256Digest {
        &self.digest
    }

    /// The manifest line for this attachment.
    pub fn manifest_entry(&self) -> ManifestEntry {
        ManifestEntry {
            name: self.file_name.clone(),
            media_type: self.media_type.clone(),
            size: self.size(),
            digest: self.digest,
        }
    }
}

/// One line of the attachment manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub media_type: String,
    pub size: u64,
    pub digest: Sha256Digest,
}

/// Output of a successful build.
#[derive(Debug, Clone)]
pub struct BuiltPackage {
    /// The sealed container.
    pub bytes: Bytes,
    /// Digest of the cover document, as written into the metadata.
    pub cover_digest: Sha256Digest,
    /// Size of the cover document in bytes.
    pub cover_size: u64,
    /// Manifest of the included attachments, in container order.
    pub manifest: Vec<ManifestEntry>,
    /// Signer-info entries that were sealed.
    pub signers: Vec<SignerInfo>,
    /// What the signer agent shows the user before asking for a PIN.
    pub context: DocumentContext,
}

/// Builder for sealed containers.
#[derive(Debug, Clone)]
pub struct PackageBuilder {
    cover: CoverDocument,
    metadata: PackageMetadata,
    signers: Vec<SignerInfo>,
    attachments: Vec<Attachment>,
}

impl PackageBuilder {
    /// Start a package for the given cover document and metadata.
    pub fn new(cover: CoverDocument, metadata: PackageMetadata) -> Self {
        Self {
            cover,
            metadata,
            signers: Vec::new(),
            attachments: Vec::new(),
        }
    }

    /// Add delivery targets (appended to any already in the metadata).
    pub fn delivery_targets(mut self, targets: impl IntoIterator<Item = DeliveryTarget>) -> Self {
        self.metadata.delivery_targets.extend(targets);
        self
    }

    /// Set the signer-info entries.
    pub fn signers(mut self, signers: Vec<SignerInfo>) -> Self {
        self.signers = signers;
        self
    }

    /// Add one resolved attachment.
    pub fn attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Add resolved attachments, preserving order.
    pub fn attachments(mut self, attachments: impl IntoIterator<Item = Attachment>) -> Self {
        self.attachments.extend(attachments);
        self
    }

    /// Seal the container.
    ///
    /// Fails with [`BuildError::EmptyDocument`] for a zero-byte cover and
    /// with [`BuildError::Validation`] for incomplete metadata. Either way no
    /// bytes are produced.
    pub fn build(self) -> Result<BuiltPackage, BuildError> {
        if self.cover.is_empty() {
            return Err(BuildError::EmptyDocument);
        }

        let validated = validate_metadata(&self.metadata)?;
        let embedded = self.cover.describe();
        let metadata = encode_metadata(&validated, &embedded);
        let context = DocumentContext::from_validated(&validated);

        let manifest: Vec<ManifestEntry> = self
            .attachments
            .iter()
            .map(Attachment::manifest_entry)
            .collect();
        let manifest_doc = manifest_bytes(&manifest);
        let signer_docs: Vec<Vec<u8>> = self.signers.iter().map(signer_bytes).collect();

        let mut entries: Vec<(String, EntryKind, &[u8])> =
            Vec::with_capacity(3 + self.attachments.len() + signer_docs.len());
        entries.push((
            format!("document/{}", entry_name(self.cover.file_name())),
            EntryKind::Cover,
            &self.cover.bytes()[..],
        ));
        entries.push((METADATA_PATH.to_string(), EntryKind::Metadata, &metadata[..]));
        entries.push((MANIFEST_PATH.to_string(), EntryKind::Manifest, &manifest_doc[..]));
        for (i, attachment) in self.attachments.iter().enumerate() {
            entries.push((
                format!("attachments/{:03}-{}", i + 1, entry_name(attachment.file_name())),
                EntryKind::Attachment,
                &attachment.content()[..],
            ));
        }
        for (i, doc) in signer_docs.iter().enumerate() {
            entries.push((
                format!("signers/{:02}.cbor", i + 1),
                EntryKind::Signer,
                &doc[..],
            ));
        }

        let bytes = container_bytes(&entries);
        debug_assert!(bytes.len() >= self.cover.len());

        tracing::debug!(
            cover_size = self.cover.len(),
            attachments = manifest.len(),
            signers = self.signers.len(),
            container_size = bytes.len(),
            "sealed package container"
        );

        Ok(BuiltPackage {
            bytes: Bytes::from(bytes),
            cover_digest: *embedded.digest(),
            cover_size: embedded.size(),
            manifest,
            signers: self.signers,
            context,
        })
    }
}

/// Build a sealed container in one call.
///
/// `attachments` must contain only successfully resolved entries.
pub fn build_package(
    cover: CoverDocument,
    metadata: PackageMetadata,
    delivery_targets: Vec<DeliveryTarget>,
    signers: Option<Vec<SignerInfo>>,
    attachments: Vec<Attachment>,
) -> Result<Vec<u8>, BuildError> {
    let built = PackageBuilder::new(cover, metadata)
        .delivery_targets(delivery_targets)
        .signers(signers.unwrap_or_default())
        .attachments(attachments)
        .build()?;
    Ok(built.bytes.to_vec())
}

/// Download name for a package: the document number without path
/// separators, suffixed `.eyp`.
pub fn container_file_name(document_number: &str) -> String {
    let stem: String = document_number
        .trim()
        .chars()
        .filter(|c| *c != '/' && *c != '\\')
        .collect();
    if stem.is_empty() {
        "package.eyp".to_string()
    } else {
        format!("{}.eyp", stem)
    }
}

fn entry_name(name: &str) -> String {
    name.replace(['/', '\\'], "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Party;
    use chrono::NaiveDate;

    fn metadata() -> PackageMetadata {
        PackageMetadata::new()
            .document_number("E-100/7")
            .date(NaiveDate::from_ymd_opt(2026, 5, 4).unwrap())
            .subject("Test")
            .sender(Party::named("Oda"))
            .recipient(Party::named("Bakanlık"))
    }

    #[test]
    fn test_empty_cover_rejected() {
        let result = PackageBuilder::new(CoverDocument::new("a.pdf", Vec::new()), metadata()).build();
        assert_eq!(result.unwrap_err(), BuildError::EmptyDocument);
    }

    #[test]
    fn test_validation_error_propagates_unchanged() {
        let mut m = metadata();
        m.date = None;
        let err = PackageBuilder::new(CoverDocument::new("a.pdf", vec![1u8; 4]), m)
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::Validation(ref v) if v.field() == "date"));
    }

    #[test]
    fn test_build_records_cover_digest() {
        let cover = CoverDocument::new("a.pdf", vec![7u8; 1024]);
        let expected = Sha256Digest::hash(&[7u8; 1024]);
        let built = PackageBuilder::new(cover, metadata()).build().unwrap();
        assert_eq!(built.cover_digest, expected);
        assert_eq!(built.cover_size, 1024);
        assert!(built.bytes.len() >= 1024);
        assert_eq!(built.context.number, "E-100/7");
        assert_eq!(built.context.recipient.as_deref(), Some("Bakanlık"));
    }

    #[test]
    fn test_build_is_deterministic() {
        let make = || {
            PackageBuilder::new(CoverDocument::new("a.pdf", vec![1u8; 64]), metadata())
                .attachment(Attachment::new("ek.txt", "text/plain", b"ek".to_vec()))
                .signers(vec![SignerInfo::new("Ayşe", "Yılmaz")])
                .build()
                .unwrap()
                .bytes
        };
        assert_eq!(make(), make());
    }

    #[test]
    fn test_manifest_preserves_input_order() {
        let built = PackageBuilder::new(CoverDocument::new("a.pdf", vec![1u8; 8]), metadata())
            .attachment(Attachment::new("b.txt", "text/plain", b"b".to_vec()))
            .attachment(Attachment::new("a.txt", "text/plain", b"a".to_vec()))
            .build()
            .unwrap();
        let names: Vec<_> = built.manifest.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["b.txt", "a.txt"]);
        assert_eq!(built.manifest[0].digest, Sha256Digest::hash(b"b"));
    }

    #[test]
    fn test_flat_build_matches_builder() {
        let flat = build_package(
            CoverDocument::new("a.pdf", vec![3u8; 16]),
            metadata(),
            vec![DeliveryTarget::new("x@kep.tr")],
            None,
            vec![],
        )
        .unwrap();
        let built = PackageBuilder::new(CoverDocument::new("a.pdf", vec![3u8; 16]), metadata())
            .delivery_targets([DeliveryTarget::new("x@kep.tr")])
            .build()
            .unwrap();
        assert_eq!(flat, built.bytes.to_vec());
    }

    #[test]
    fn test_signed_name_derivation() {
        assert_eq!(signed_name_for("yazi.pdf"), "yazi_signed.pdf");
        assert_eq!(signed_name_for("yazi"), "yazi_signed");
        assert_eq!(
            CoverDocument::new("a.pdf", vec![1])
                .with_signed_file_name("a.imzali.pdf")
                .describe()
                .signed_name(),
            "a.imzali.pdf"
        );
    }

    #[test]
    fn test_container_file_name() {
        assert_eq!(container_file_name("E-100/7"), "E-1007.eyp");
        assert_eq!(container_file_name("a\\b/c"), "abc.eyp");
        assert_eq!(container_file_name("//"), "package.eyp");
    }

    #[test]
    fn test_entry_kind_roundtrip() {
        for kind in [
            EntryKind::Cover,
            EntryKind::Metadata,
            EntryKind::Manifest,
            EntryKind::Attachment,
            EntryKind::Signer,
        ] {
            assert_eq!(EntryKind::from_u8(kind.to_u8()), Some(kind));
        }
        assert_eq!(EntryKind::from_u8(0), None);
    }
}
