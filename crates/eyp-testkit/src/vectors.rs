//! Golden test vectors for deterministic verification.
//!
//! The digest vectors pin SHA-256 itself. The package vector pins the whole
//! encoding path: metadata layout, canonical CBOR and container order. Its
//! expected digest was computed independently of this code base.

use chrono::NaiveDate;

use eyp_core::{
    digest, CoverDocument, DeliveryTarget, PackageBuilder, PackageMetadata, Party, Sha256Digest,
};

/// A digest test vector.
#[derive(Debug, Clone)]
pub struct DigestVector {
    pub name: &'static str,
    pub input: Vec<u8>,
    /// Expected SHA-256 (lowercase hex).
    pub expected: &'static str,
}

/// Get all digest vectors.
pub fn all_vectors() -> Vec<DigestVector> {
    vec![
        DigestVector {
            name: "empty input",
            input: Vec::new(),
            expected: "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
        },
        DigestVector {
            name: "abc",
            input: b"abc".to_vec(),
            expected: "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad",
        },
        DigestVector {
            name: "quick brown fox",
            input: b"The quick brown fox jumps over the lazy dog".to_vec(),
            expected: "d7a8fbb307d7809469ca9abcb0082e4f8d5651e46d3cdb762d02d0bf37c9e592",
        },
        DigestVector {
            name: "1 KiB cover of 0x07",
            input: vec![0x07; 1024],
            expected: "a99c07ce93703c7390589c5b007bd9a97a8b6de29e9a920d474d4f028ce2d42c",
        },
        DigestVector {
            name: "10-byte attachment",
            input: vec![b'A'; 10],
            expected: "1d65bf29403e4fb1767522a107c827b8884d16640cf0e3b18c4c1dd107e0d49d",
        },
        DigestVector {
            name: "UTF-8 text",
            input: "Ayşe Yılmaz".as_bytes().to_vec(),
            expected: "e574fe26388f2dfd2a1066ce9fd507183c2bc3f78d9e00cf51c34605bef711ae",
        },
    ]
}

/// Cover bytes of the golden package.
pub const GOLDEN_COVER: &[u8] = b"%PDF-1.7 golden";

/// Expected SHA-256 of the golden package's cover.
pub const GOLDEN_COVER_DIGEST: &str =
    "fbf536c9da41d9f267a234e9ae2d1484cd63461439845a7f021491f5f3a1ae0a";

/// Expected SHA-256 of the golden package's sealed container.
pub const GOLDEN_CONTAINER_DIGEST: &str =
    "cb38cf30a445201ea7d1e04734972e12cdaef5d031c609c431335ba419720ec0";

/// Expected size of the golden package's sealed container.
pub const GOLDEN_CONTAINER_SIZE: usize = 322;

/// The golden package: fixed metadata, one delivery target, no attachments.
pub fn golden_package() -> PackageBuilder {
    let metadata = PackageMetadata::new()
        .document_number("E-2026/1")
        .date(NaiveDate::from_ymd_opt(2026, 1, 14).expect("valid date"))
        .subject("Golden vector")
        .sender(Party::named("Oda").with_id("100"))
        .recipient(Party::named("Bakanlik"));

    PackageBuilder::new(CoverDocument::new("golden.pdf", GOLDEN_COVER), metadata)
        .delivery_targets([DeliveryTarget::new("x@kep.tr")])
}

/// Verify every vector. Returns a description of the first mismatch.
pub fn verify_all_vectors() -> Result<(), String> {
    for vector in all_vectors() {
        let actual = digest(&vector.input);
        if actual != vector.expected {
            return Err(format!(
                "{}: expected {}, got {}",
                vector.name, vector.expected, actual
            ));
        }
    }

    let built = golden_package().build().map_err(|e| e.to_string())?;
    if built.cover_digest.to_hex() != GOLDEN_COVER_DIGEST {
        return Err(format!("golden cover digest: got {}", built.cover_digest));
    }
    let container = Sha256Digest::hash(&built.bytes).to_hex();
    if container != GOLDEN_CONTAINER_DIGEST || built.bytes.len() != GOLDEN_CONTAINER_SIZE {
        return Err(format!(
            "golden container: got {} ({} bytes)",
            container,
            built.bytes.len()
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_vectors_verify() {
        verify_all_vectors().unwrap();
    }

    #[test]
    fn test_vectors_are_distinct() {
        let vectors = all_vectors();
        for (i, a) in vectors.iter().enumerate() {
            for b in &vectors[i + 1..] {
                assert_ne!(a.expected, b.expected, "{} vs {}", a.name, b.name);
            }
        }
    }

    #[test]
    fn test_golden_package_is_reproducible() {
        let first = golden_package().build().unwrap();
        let second = golden_package().build().unwrap();
        assert_eq!(first.bytes, second.bytes);
        assert!(first.bytes.len() >= GOLDEN_COVER.len());
    }
}
