//! Canonical CBOR encoding for deterministic serialization.
//!
//! This module implements RFC 8949 Core Deterministic Encoding:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - No floats (sizes are integers, dates are `YYYY-MM-DD` text)
//!
//! Every key of a map is always present; absent optional values encode as
//! null. The same package therefore produces identical bytes (and digests)
//! on every platform.

use ciborium::value::Value;

use crate::container::{EntryKind, ManifestEntry, CONTAINER_FORMAT};
use crate::envelope::SignerInfo;
use crate::error::ValidationError;
use crate::metadata::{EmbeddedFile, PackageMetadata, ValidatedMetadata, ValidatedParty};
use crate::validation::validate_metadata;

/// Version of the metadata document layout.
pub const METADATA_VERSION: u64 = 1;

/// Metadata field keys (integer keys for compact encoding).
///
/// Keys 0-23 encode as single bytes in CBOR.
pub mod keys {
    pub const VERSION: u64 = 0;
    pub const SCENARIO: u64 = 1;
    pub const LANGUAGE: u64 = 2;
    pub const DOCUMENT_NUMBER: u64 = 3;
    pub const DATE: u64 = 4;
    pub const SUBJECT: u64 = 5;
    pub const SENDER: u64 = 6;
    pub const RECIPIENTS: u64 = 7;
    pub const DELIVERY_TARGETS: u64 = 8;
    pub const EMBEDDED_FILE: u64 = 9;

    /// Party: {0: id, 1: name, 2: role}
    pub const PARTY_ID: u64 = 0;
    pub const PARTY_NAME: u64 = 1;
    pub const PARTY_ROLE: u64 = 2;

    /// Delivery target: {0: target, 1: purpose}
    pub const TARGET_ADDRESS: u64 = 0;
    pub const TARGET_PURPOSE: u64 = 1;

    /// Embedded file: {0: name, 1: signed name, 2: media type, 3: size, 4: digest, 5: algorithm}
    pub const FILE_NAME: u64 = 0;
    pub const FILE_SIGNED_NAME: u64 = 1;
    pub const FILE_MEDIA_TYPE: u64 = 2;
    pub const FILE_SIZE: u64 = 3;
    pub const FILE_DIGEST: u64 = 4;
    pub const FILE_ALGORITHM: u64 = 5;

    /// Manifest entry: {0: name, 1: media type, 2: size, 3: digest}
    pub const MANIFEST_NAME: u64 = 0;
    pub const MANIFEST_MEDIA_TYPE: u64 = 1;
    pub const MANIFEST_SIZE: u64 = 2;
    pub const MANIFEST_DIGEST: u64 = 3;

    /// Signer: {0: first name, 1: last name, 2: title, 3: capacity}
    pub const SIGNER_FIRST_NAME: u64 = 0;
    pub const SIGNER_LAST_NAME: u64 = 1;
    pub const SIGNER_TITLE: u64 = 2;
    pub const SIGNER_CAPACITY: u64 = 3;

    /// Container: {0: format, 1: entries}; entry: {0: path, 1: kind, 2: content}
    pub const CONTAINER_FORMAT: u64 = 0;
    pub const CONTAINER_ENTRIES: u64 = 1;
    pub const ENTRY_PATH: u64 = 0;
    pub const ENTRY_KIND: u64 = 1;
    pub const ENTRY_CONTENT: u64 = 2;
}

/// Validate and encode package metadata to canonical CBOR bytes.
///
/// Fails with the first [`ValidationError`]; nothing is encoded in that case.
pub fn metadata_bytes(
    metadata: &PackageMetadata,
    embedded: &EmbeddedFile,
) -> Result<Vec<u8>, ValidationError> {
    let validated = validate_metadata(metadata)?;
    Ok(encode_metadata(&validated, embedded))
}

/// Encode metadata that has already passed validation.
pub fn encode_metadata(metadata: &ValidatedMetadata<'_>, embedded: &EmbeddedFile) -> Vec<u8> {
    let value = metadata_to_cbor_value(metadata, embedded);
    encode_cbor_value_canonical(&value)
}

/// Encode the attachment manifest to canonical CBOR bytes.
pub fn manifest_bytes(entries: &[ManifestEntry]) -> Vec<u8> {
    let items = entries
        .iter()
        .map(|e| {
            int_map(vec![
                (keys::MANIFEST_NAME, text(&e.name)),
                (keys::MANIFEST_MEDIA_TYPE, text(&e.media_type)),
                (keys::MANIFEST_SIZE, Value::Integer(e.size.into())),
                (keys::MANIFEST_DIGEST, text(&e.digest.to_hex())),
            ])
        })
        .collect();
    encode_cbor_value_canonical(&Value::Array(items))
}

/// Encode one signer-info entry to canonical CBOR bytes.
pub fn signer_bytes(signer: &SignerInfo) -> Vec<u8> {
    let value = int_map(vec![
        (keys::SIGNER_FIRST_NAME, text(&signer.first_name)),
        (keys::SIGNER_LAST_NAME, text(&signer.last_name)),
        (keys::SIGNER_TITLE, opt_text(signer.title.as_deref())),
        (keys::SIGNER_CAPACITY, opt_text(signer.capacity.as_deref())),
    ]);
    encode_cbor_value_canonical(&value)
}

/// Encode the sealed container.
///
/// Format: `{0: "eyp/v1", 1: [{0: path, 1: kind, 2: content}, ...]}`.
/// Entries are written in the given order. Content is copied straight into
/// the output instead of going through a [`Value`], so large documents are
/// not duplicated in memory.
pub fn container_bytes(entries: &[(String, EntryKind, &[u8])]) -> Vec<u8> {
    let payload: usize = entries.iter().map(|(p, _, c)| p.len() + c.len() + 16).sum();
    let mut buf = Vec::with_capacity(payload + CONTAINER_FORMAT.len() + 16);

    encode_uint(&mut buf, 5, 2);
    encode_uint(&mut buf, 0, keys::CONTAINER_FORMAT);
    encode_text(&mut buf, CONTAINER_FORMAT);
    encode_uint(&mut buf, 0, keys::CONTAINER_ENTRIES);
    encode_uint(&mut buf, 4, entries.len() as u64);

    for (path, kind, content) in entries {
        encode_uint(&mut buf, 5, 3);
        encode_uint(&mut buf, 0, keys::ENTRY_PATH);
        encode_text(&mut buf, path);
        encode_uint(&mut buf, 0, keys::ENTRY_KIND);
        encode_uint(&mut buf, 0, kind.to_u8() as u64);
        encode_uint(&mut buf, 0, keys::ENTRY_CONTENT);
        encode_bytes(&mut buf, content);
    }

    buf
}

/// Convert validated metadata to a CBOR Value (map with integer keys).
fn metadata_to_cbor_value(m: &ValidatedMetadata<'_>, embedded: &EmbeddedFile) -> Value {
    let recipients = m.recipients.iter().map(party_value).collect();
    let targets = m
        .delivery_targets
        .iter()
        .map(|t| {
            int_map(vec![
                (keys::TARGET_ADDRESS, text(t.target.trim())),
                (keys::TARGET_PURPOSE, opt_text(t.purpose.as_deref())),
            ])
        })
        .collect();

    let file = int_map(vec![
        (keys::FILE_NAME, text(embedded.name())),
        (keys::FILE_SIGNED_NAME, text(embedded.signed_name())),
        (keys::FILE_MEDIA_TYPE, text(embedded.media_type())),
        (keys::FILE_SIZE, Value::Integer(embedded.size().into())),
        (keys::FILE_DIGEST, text(&embedded.digest().to_hex())),
        (keys::FILE_ALGORITHM, text(embedded.algorithm().as_str())),
    ]);

    int_map(vec![
        (keys::VERSION, Value::Integer(METADATA_VERSION.into())),
        (keys::SCENARIO, text(m.scenario)),
        (keys::LANGUAGE, text(m.language)),
        (keys::DOCUMENT_NUMBER, text(m.document_number)),
        (keys::DATE, text(&m.date.format("%Y-%m-%d").to_string())),
        (keys::SUBJECT, text(m.subject)),
        (keys::SENDER, party_value(&m.sender)),
        (keys::RECIPIENTS, Value::Array(recipients)),
        (keys::DELIVERY_TARGETS, Value::Array(targets)),
        (keys::EMBEDDED_FILE, file),
    ])
}

fn party_value(p: &ValidatedParty<'_>) -> Value {
    int_map(vec![
        (keys::PARTY_ID, opt_text(p.id)),
        (keys::PARTY_NAME, text(p.name)),
        (keys::PARTY_ROLE, opt_text(p.role)),
    ])
}

fn int_map(entries: Vec<(u64, Value)>) -> Value {
    Value::Map(
        entries
            .into_iter()
            .map(|(k, v)| (Value::Integer(k.into()), v))
            .collect(),
    )
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

fn opt_text(s: Option<&str>) -> Value {
    match s.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => text(s),
        None => Value::Null,
    }
}

/// Encode a CBOR Value to canonical bytes.
fn encode_cbor_value_canonical(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_value_to(&mut buf, value);
    buf
}

/// Recursively encode a CBOR value.
fn encode_value_to(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => encode_bytes(buf, b),
        Value::Text(s) => encode_text(buf, s),
        Value::Array(arr) => encode_array(buf, arr),
        Value::Map(entries) => encode_map_canonical(buf, entries),
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Null => buf.push(0xf6),
        Value::Float(_) => panic!("floats not supported in canonical encoding"),
        _ => panic!("unsupported CBOR value type"),
    }
}

/// Encode a CBOR integer (major types 0 and 1).
fn encode_integer(buf: &mut Vec<u8>, i: ciborium::value::Integer) {
    let n: i128 = i.into();

    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        encode_uint(buf, 1, (-1 - n) as u64);
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffffffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(buf, 2, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

fn encode_text(buf: &mut Vec<u8>, s: &str) {
    encode_uint(buf, 3, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

fn encode_array(buf: &mut Vec<u8>, arr: &[Value]) {
    encode_uint(buf, 4, arr.len() as u64);
    for item in arr {
        encode_value_to(buf, item);
    }
}

fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) {
    // RFC 8949 canonical: sort keys by CBOR-encoded bytes
    let mut sorted: Vec<_> = entries
        .iter()
        .map(|(k, v)| {
            let mut key_bytes = Vec::new();
            encode_value_to(&mut key_bytes, k);
            (key_bytes, v)
        })
        .collect();

    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, sorted.len() as u64);
    for (key_bytes, v) in sorted {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::CoverDocument;
    use crate::metadata::{DeliveryTarget, Party};
    use chrono::NaiveDate;

    fn metadata() -> PackageMetadata {
        let mut m = PackageMetadata::new()
            .document_number("E-1-2")
            .date(NaiveDate::from_ymd_opt(2026, 1, 14).unwrap())
            .subject("Genel kurul daveti")
            .sender(Party::named("Oda").with_id("100"))
            .recipient(Party::named("Üye"));
        m.delivery_targets
            .push(DeliveryTarget::new("uye@hs01.kep.tr").with_purpose("Gereği"));
        m
    }

    fn embedded() -> EmbeddedFile {
        CoverDocument::new("E-1-2.pdf", b"%PDF-1.7 test".to_vec()).describe()
    }

    fn decode(bytes: &[u8]) -> Value {
        ciborium::from_reader(bytes).unwrap()
    }

    fn map_get(value: &Value, key: u64) -> &Value {
        match value {
            Value::Map(entries) => entries
                .iter()
                .find(|(k, _)| *k == Value::Integer(key.into()))
                .map(|(_, v)| v)
                .unwrap(),
            _ => panic!("expected map"),
        }
    }

    #[test]
    fn test_metadata_deterministic() {
        let b1 = metadata_bytes(&metadata(), &embedded()).unwrap();
        let b2 = metadata_bytes(&metadata(), &embedded()).unwrap();
        assert_eq!(b1, b2);
    }

    #[test]
    fn test_metadata_key_order_and_digest() {
        let file = embedded();
        let bytes = metadata_bytes(&metadata(), &file).unwrap();
        let value = decode(&bytes);

        if let Value::Map(entries) = &value {
            let order: Vec<i128> = entries
                .iter()
                .map(|(k, _)| match k {
                    Value::Integer(i) => (*i).into(),
                    _ => panic!("non-integer key"),
                })
                .collect();
            assert_eq!(order, (0..=9).collect::<Vec<i128>>());
        } else {
            panic!("expected map");
        }

        let file_value = map_get(&value, keys::EMBEDDED_FILE);
        assert_eq!(
            map_get(file_value, keys::FILE_DIGEST),
            &Value::Text(file.digest().to_hex())
        );
        assert_eq!(
            map_get(file_value, keys::FILE_ALGORITHM),
            &Value::Text("SHA-256".into())
        );
        assert_eq!(map_get(&value, keys::DATE), &Value::Text("2026-01-14".into()));
        assert_eq!(map_get(&value, keys::LANGUAGE), &Value::Text("tr".into()));
    }

    #[test]
    fn test_missing_optional_fields_are_null() {
        let bytes = metadata_bytes(&metadata(), &embedded()).unwrap();
        let value = decode(&bytes);
        let sender = map_get(&value, keys::SENDER);
        assert_eq!(map_get(sender, keys::PARTY_ROLE), &Value::Null);
        assert_eq!(map_get(sender, keys::PARTY_ID), &Value::Text("100".into()));
    }

    #[test]
    fn test_invalid_metadata_produces_no_output() {
        let mut m = metadata();
        m.subject = None;
        let err = metadata_bytes(&m, &embedded()).unwrap_err();
        assert_eq!(err.field(), "subject");
    }

    #[test]
    fn test_uint_encoding_is_minimal() {
        let mut buf = Vec::new();
        encode_uint(&mut buf, 0, 23);
        assert_eq!(buf, vec![0x17]);

        buf.clear();
        encode_uint(&mut buf, 0, 24);
        assert_eq!(buf, vec![0x18, 24]);

        buf.clear();
        encode_uint(&mut buf, 0, 1024);
        assert_eq!(buf, vec![0x19, 0x04, 0x00]);
    }

    #[test]
    fn test_container_is_valid_cbor() {
        let cover = b"cover".to_vec();
        let entries = vec![(
            "document/a.pdf".to_string(),
            EntryKind::Cover,
            cover.as_slice(),
        )];
        let bytes = container_bytes(&entries);
        let value = decode(&bytes);

        assert_eq!(
            map_get(&value, keys::CONTAINER_FORMAT),
            &Value::Text(CONTAINER_FORMAT.into())
        );
        match map_get(&value, keys::CONTAINER_ENTRIES) {
            Value::Array(items) => {
                assert_eq!(items.len(), 1);
                assert_eq!(
                    map_get(&items[0], keys::ENTRY_CONTENT),
                    &Value::Bytes(cover.clone())
                );
            }
            _ => panic!("expected entries array"),
        }
    }
}
