use std::sync::OnceLock;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use regex::Regex;
use thiserror::Error;

pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Body cap for JSON routes carrying a base64 upload: the encoded form of the
/// largest allowed file plus the surrounding fields.
pub const MAX_UPLOAD_REQUEST_BYTES: usize = 8 * 1024 * 1024;

pub const ALLOWED_UPLOAD_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/webp", "webp"),
    ("application/pdf", "pdf"),
];

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Invalid email address: {0}")]
    Email(String),

    #[error("Invalid phone number: {0}. Use international format, e.g. +14155552671")]
    Phone(String),

    #[error("{field} must be between {min} and {max} characters")]
    Length { field: String, min: usize, max: usize },

    #[error("Unsupported file type: {0}")]
    FileType(String),

    #[error("File exceeds the {0} byte limit")]
    FileTooLarge(usize),

    #[error("File data is not valid base64: {0}")]
    Encoding(String),
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").expect("static email regex")
    })
}

fn phone_regex() -> &'static Regex {
    static PHONE: OnceLock<Regex> = OnceLock::new();
    PHONE.get_or_init(|| Regex::new(r"^\+[1-9]\d{9,14}$").expect("static phone regex"))
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email_regex().is_match(email.trim()) {
        Ok(())
    } else {
        Err(ValidationError::Email(email.to_string()))
    }
}

/// Canonical form used for storage and uniqueness checks.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if phone_regex().is_match(phone.trim()) {
        Ok(())
    } else {
        Err(ValidationError::Phone(phone.to_string()))
    }
}

pub fn validate_length(field: &str, value: &str, min: usize, max: usize) -> Result<(), ValidationError> {
    let len = value.trim().chars().count();
    if len < min || len > max {
        return Err(ValidationError::Length {
            field: field.to_string(),
            min,
            max,
        });
    }
    Ok(())
}

/// Maps an allowed MIME type to the extension used for stored objects.
pub fn extension_for(content_type: &str) -> Result<&'static str, ValidationError> {
    ALLOWED_UPLOAD_TYPES
        .iter()
        .find(|(mime, _)| mime.eq_ignore_ascii_case(content_type.trim()))
        .map(|(_, ext)| *ext)
        .ok_or_else(|| ValidationError::FileType(content_type.to_string()))
}

/// Decodes a base64 payload, accepting an optional `data:<mime>;base64,`
/// prefix, and enforces the upload size limit.
pub fn decode_upload(payload: &str) -> Result<Vec<u8>, ValidationError> {
    let data = match payload.split_once(";base64,") {
        Some((_, rest)) => rest,
        None => payload,
    };

    let bytes = BASE64
        .decode(data.trim())
        .map_err(|e| ValidationError::Encoding(e.to_string()))?;

    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(ValidationError::FileTooLarge(MAX_UPLOAD_BYTES));
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(validate_email("jane.doe@carepulse.app").is_ok());
        assert!(validate_email("jane@localhost").is_err());
        assert!(validate_email("not-an-email").is_err());
    }

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  Jane.Doe@CarePulse.app "), "jane.doe@carepulse.app");
    }

    #[test]
    fn phone_validation_requires_e164() {
        assert!(validate_phone("+14155552671").is_ok());
        assert!(validate_phone("4155552671").is_err());
        assert!(validate_phone("+0123456789").is_err());
        assert!(validate_phone("+123").is_err());
    }

    #[test]
    fn length_counts_trimmed_chars() {
        assert!(validate_length("name", "  Al ", 2, 50).is_ok());
        assert_eq!(
            validate_length("name", "A", 2, 50),
            Err(ValidationError::Length { field: "name".into(), min: 2, max: 50 })
        );
    }

    #[test]
    fn upload_types_and_decoding() {
        assert_eq!(extension_for("image/PNG").unwrap(), "png");
        assert!(extension_for("text/html").is_err());

        let plain = decode_upload("aGVsbG8=").unwrap();
        let with_prefix = decode_upload("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(plain, b"hello");
        assert_eq!(plain, with_prefix);

        assert!(matches!(decode_upload("%%%"), Err(ValidationError::Encoding(_))));
    }

    #[test]
    fn oversized_upload_is_rejected() {
        let big = BASE64.encode(vec![0u8; MAX_UPLOAD_BYTES + 1]);
        assert_eq!(decode_upload(&big), Err(ValidationError::FileTooLarge(MAX_UPLOAD_BYTES)));
    }
}
