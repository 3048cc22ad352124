//! Test-only parsers for sealed containers and metadata documents.
//!
//! Production code only ever writes these formats. Tests read them back to
//! check what was sealed.

use anyhow::{anyhow, bail, Context, Result};
use ciborium::value::Value;

use eyp_core::canonical::keys;
use eyp_core::{EntryKind, SignerInfo, CONTAINER_FORMAT};

/// One entry of a parsed container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEntry {
    pub path: String,
    pub kind: EntryKind,
    pub content: Vec<u8>,
}

/// A parsed container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedContainer {
    pub format: String,
    pub entries: Vec<ParsedEntry>,
}

impl ParsedContainer {
    fn of_kind(&self, kind: EntryKind) -> impl Iterator<Item = &ParsedEntry> {
        self.entries.iter().filter(move |e| e.kind == kind)
    }

    pub fn cover(&self) -> Option<&ParsedEntry> {
        self.of_kind(EntryKind::Cover).next()
    }

    pub fn metadata(&self) -> Option<&[u8]> {
        self.of_kind(EntryKind::Metadata).next().map(|e| &e.content[..])
    }

    pub fn manifest(&self) -> Option<&[u8]> {
        self.of_kind(EntryKind::Manifest).next().map(|e| &e.content[..])
    }

    pub fn attachments(&self) -> impl Iterator<Item = &ParsedEntry> {
        self.of_kind(EntryKind::Attachment)
    }

    pub fn signers(&self) -> impl Iterator<Item = &ParsedEntry> {
        self.of_kind(EntryKind::Signer)
    }

    /// Entry kinds in container order.
    pub fn kinds(&self) -> Vec<EntryKind> {
        self.entries.iter().map(|e| e.kind).collect()
    }
}

/// A sender or recipient read back from metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedParty {
    pub id: Option<String>,
    pub name: String,
    pub role: Option<String>,
}

/// A metadata document read back from a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMetadata {
    pub version: u64,
    pub scenario: String,
    pub language: String,
    pub document_number: String,
    pub date: String,
    pub subject: String,
    pub sender: ParsedParty,
    pub recipients: Vec<ParsedParty>,
    pub delivery_targets: Vec<(String, Option<String>)>,
    pub file_name: String,
    pub file_signed_name: String,
    pub file_media_type: String,
    pub file_size: u64,
    pub file_digest: String,
    pub file_algorithm: String,
}

/// A manifest line read back from a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedManifestEntry {
    pub name: String,
    pub media_type: String,
    pub size: u64,
    pub digest: String,
}

/// Parse a sealed `.eyp` container.
pub fn parse_container(bytes: &[u8]) -> Result<ParsedContainer> {
    let root = decode(bytes)?;

    let format = text(field(&root, keys::CONTAINER_FORMAT)?)?;
    if format != CONTAINER_FORMAT {
        bail!("unexpected container format {:?}", format);
    }

    let entries = array(field(&root, keys::CONTAINER_ENTRIES)?)?
        .iter()
        .enumerate()
        .map(|(i, entry)| -> Result<ParsedEntry> {
            let kind = uint(field(entry, keys::ENTRY_KIND)?)?;
            Ok(ParsedEntry {
                path: text(field(entry, keys::ENTRY_PATH)?)?,
                kind: u8::try_from(kind)
                    .ok()
                    .and_then(EntryKind::from_u8)
                    .ok_or_else(|| anyhow!("entry {} has unknown kind {}", i, kind))?,
                content: match field(entry, keys::ENTRY_CONTENT)? {
                    Value::Bytes(b) => b.clone(),
                    other => bail!("entry {} content is not bytes: {:?}", i, other),
                },
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ParsedContainer { format, entries })
}

/// Parse a metadata document.
pub fn parse_metadata(bytes: &[u8]) -> Result<ParsedMetadata> {
    let root = decode(bytes)?;
    let file = field(&root, keys::EMBEDDED_FILE)?;

    Ok(ParsedMetadata {
        version: uint(field(&root, keys::VERSION)?)?,
        scenario: text(field(&root, keys::SCENARIO)?)?,
        language: text(field(&root, keys::LANGUAGE)?)?,
        document_number: text(field(&root, keys::DOCUMENT_NUMBER)?)?,
        date: text(field(&root, keys::DATE)?)?,
        subject: text(field(&root, keys::SUBJECT)?)?,
        sender: party(field(&root, keys::SENDER)?).context("sender")?,
        recipients: array(field(&root, keys::RECIPIENTS)?)?
            .iter()
            .map(party)
            .collect::<Result<Vec<_>>>()
            .context("recipients")?,
        delivery_targets: array(field(&root, keys::DELIVERY_TARGETS)?)?
            .iter()
            .map(|t| -> Result<(String, Option<String>)> {
                Ok((
                    text(field(t, keys::TARGET_ADDRESS)?)?,
                    opt_text(field(t, keys::TARGET_PURPOSE)?)?,
                ))
            })
            .collect::<Result<Vec<_>>>()?,
        file_name: text(field(file, keys::FILE_NAME)?)?,
        file_signed_name: text(field(file, keys::FILE_SIGNED_NAME)?)?,
        file_media_type: text(field(file, keys::FILE_MEDIA_TYPE)?)?,
        file_size: uint(field(file, keys::FILE_SIZE)?)?,
        file_digest: text(field(file, keys::FILE_DIGEST)?)?,
        file_algorithm: text(field(file, keys::FILE_ALGORITHM)?)?,
    })
}

/// Parse the attachment manifest.
pub fn parse_manifest(bytes: &[u8]) -> Result<Vec<ParsedManifestEntry>> {
    array(&decode(bytes)?)?
        .iter()
        .map(|e| -> Result<ParsedManifestEntry> {
            Ok(ParsedManifestEntry {
                name: text(field(e, keys::MANIFEST_NAME)?)?,
                media_type: text(field(e, keys::MANIFEST_MEDIA_TYPE)?)?,
                size: uint(field(e, keys::MANIFEST_SIZE)?)?,
                digest: text(field(e, keys::MANIFEST_DIGEST)?)?,
            })
        })
        .collect()
}

/// Parse one signer-info entry.
pub fn parse_signer(bytes: &[u8]) -> Result<SignerInfo> {
    let root = decode(bytes)?;
    Ok(SignerInfo {
        first_name: text(field(&root, keys::SIGNER_FIRST_NAME)?)?,
        last_name: text(field(&root, keys::SIGNER_LAST_NAME)?)?,
        title: opt_text(field(&root, keys::SIGNER_TITLE)?)?,
        capacity: opt_text(field(&root, keys::SIGNER_CAPACITY)?)?,
    })
}

fn decode(bytes: &[u8]) -> Result<Value> {
    ciborium::from_reader(bytes).context("invalid CBOR")
}

fn field(value: &Value, key: u64) -> Result<&Value> {
    match value {
        Value::Map(entries) => entries
            .iter()
            .find(|(k, _)| *k == Value::Integer(key.into()))
            .map(|(_, v)| v)
            .ok_or_else(|| anyhow!("missing key {}", key)),
        other => bail!("expected map, found {:?}", other),
    }
}

fn party(value: &Value) -> Result<ParsedParty> {
    Ok(ParsedParty {
        id: opt_text(field(value, keys::PARTY_ID)?)?,
        name: text(field(value, keys::PARTY_NAME)?)?,
        role: opt_text(field(value, keys::PARTY_ROLE)?)?,
    })
}

fn text(value: &Value) -> Result<String> {
    match value {
        Value::Text(s) => Ok(s.clone()),
        other => bail!("expected text, found {:?}", other),
    }
}

fn opt_text(value: &Value) -> Result<Option<String>> {
    match value {
        Value::Null => Ok(None),
        other => text(other).map(Some),
    }
}

fn uint(value: &Value) -> Result<u64> {
    match value {
        Value::Integer(i) => u64::try_from(*i).map_err(|_| anyhow!("negative integer")),
        other => bail!("expected integer, found {:?}", other),
    }
}

fn array(value: &Value) -> Result<&Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        other => bail!("expected array, found {:?}", other),
    }
}
