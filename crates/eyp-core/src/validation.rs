//! Metadata validation: required fields and structural checks.

use crate::error::ValidationError;
use crate::metadata::{PackageMetadata, Party, ValidatedMetadata, ValidatedParty};

/// Validate metadata before serialization.
///
/// This checks, in order:
/// - Language code (2-3 ASCII letters)
/// - Document number
/// - Date
/// - Subject
/// - Sender name
/// - Every recipient name (the list itself may be empty)
/// - Every delivery target address
///
/// The first failure is returned; blank strings count as missing.
pub fn validate_metadata(metadata: &PackageMetadata) -> Result<ValidatedMetadata<'_>, ValidationError> {
    let language = metadata.language.trim();
    if language.is_empty() {
        return Err(ValidationError::missing("language"));
    }
    if !(2..=3).contains(&language.len()) || !language.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ValidationError::invalid(
            "language",
            format!("expected a 2-3 letter code, got {:?}", metadata.language),
        ));
    }

    let scenario = metadata.scenario.trim();
    if scenario.is_empty() {
        return Err(ValidationError::missing("scenario"));
    }

    let document_number = required(metadata.document_number.as_deref(), "document_number")?;
    let date = metadata
        .date
        .ok_or_else(|| ValidationError::missing("date"))?;
    let subject = required(metadata.subject.as_deref(), "subject")?;
    let sender = validate_party(&metadata.sender, "sender.name")?;

    let recipients = metadata
        .recipients
        .iter()
        .enumerate()
        .map(|(i, party)| validate_party(party, &format!("recipients[{}].name", i)))
        .collect::<Result<Vec<_>, _>>()?;

    for (i, target) in metadata.delivery_targets.iter().enumerate() {
        if target.target.trim().is_empty() {
            return Err(ValidationError::missing(format!(
                "delivery_targets[{}].target",
                i
            )));
        }
    }

    Ok(ValidatedMetadata {
        scenario,
        language,
        document_number,
        date,
        subject,
        sender,
        recipients,
        delivery_targets: &metadata.delivery_targets,
    })
}

fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, ValidationError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ValidationError::missing(field)),
    }
}

fn validate_party<'a>(party: &'a Party, field: &str) -> Result<ValidatedParty<'a>, ValidationError> {
    Ok(ValidatedParty {
        id: non_blank(party.id.as_deref()),
        name: required(party.name.as_deref(), field)?,
        role: non_blank(party.role.as_deref()),
    })
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
