//! Input validation for message submission.
//!
//! Field checks are expressed with the `validator` crate so the caller
//! gets every offending field at once, not just the first.

use std::borrow::Cow;

use serde_json::Value;
use validator::{ValidationError, ValidationErrors};

use super::types::{AttachmentData, NewAttachment, MAX_ITEM_NAME_LENGTH};
use crate::MailError;

/// Validate that a string is not empty after trimming whitespace.
pub fn not_empty_trimmed(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("not_empty_trimmed")
            .with_message("Must not be empty".into()));
    }
    Ok(())
}

/// Validate that a string does not contain control characters or NULL bytes.
pub fn no_control_chars(value: &str) -> Result<(), ValidationError> {
    if value
        .chars()
        .any(|c| c.is_control() && c != '\n' && c != '\r' && c != '\t')
    {
        return Err(ValidationError::new("no_control_chars")
            .with_message("Must not contain control characters".into()));
    }
    Ok(())
}

/// Validate that a string is at most `max` characters long.
pub fn max_chars(value: &str, max: usize) -> Result<(), ValidationError> {
    if value.chars().count() > max {
        return Err(ValidationError::new("length")
            .with_message(Cow::Owned(format!("Must be at most {max} characters"))));
    }
    Ok(())
}

/// Validate attachment metadata: every value must be a JSON primitive.
pub fn primitive_values(data: &AttachmentData) -> Result<(), ValidationError> {
    match data
        .iter()
        .find(|(_, v)| matches!(v, Value::Array(_) | Value::Object(_)))
    {
        Some((key, _)) => Err(ValidationError::new("primitive_values").with_message(Cow::Owned(
            format!("Value for {key:?} must be a string, number, boolean or null"),
        ))),
        None => Ok(()),
    }
}

/// Validate a single attachment, recording failures under `attachments[index]`.
pub fn validate_attachment(
    index: usize,
    attachment: &NewAttachment,
    errors: &mut ValidationErrors,
) {
    let field = "attachments";
    let at = |e: ValidationError| {
        let message = e
            .message
            .clone()
            .unwrap_or(Cow::Borrowed("invalid value"));
        let mut indexed = ValidationError::new("attachment");
        indexed.message = Some(Cow::Owned(format!("[{index}] {message}")));
        indexed
    };

    if !attachment.quantity.is_finite() || attachment.quantity < 0.0 {
        errors.add(
            field,
            at(ValidationError::new("range")
                .with_message("Quantity must be a non-negative number".into())),
        );
    }

    if let Some(name) = &attachment.item_name {
        if let Err(e) = max_chars(name, MAX_ITEM_NAME_LENGTH) {
            errors.add(field, at(e));
        }
        if let Err(e) = no_control_chars(name) {
            errors.add(field, at(e));
        }
    }

    if let Some(data) = &attachment.attachment_data {
        if let Err(e) = primitive_values(data) {
            errors.add(field, at(e));
        }
    }
}

/// Flatten validation errors into a single caller-facing error.
pub fn into_mail_error(errors: ValidationErrors) -> MailError {
    let mut parts: Vec<String> = errors
        .field_errors()
        .into_iter()
        .map(|(field, field_errors)| {
            let messages: Vec<String> = field_errors
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid value for {field}"))
                })
                .collect();
            format!("{field}: {}", messages.join("; "))
        })
        .collect();
    parts.sort();
    MailError::Validation(parts.join(", "))
}
