//! Validation helpers for DTOs.

use std::collections::HashSet;

use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use validator::ValidationError;

/// Rejects strings made only of whitespace.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value must contain non-whitespace characters".into());
        return Err(err);
    }
    Ok(())
}

/// Validates poll option labels: none blank, no duplicates (case-insensitive).
///
/// # Examples
///
/// ```ignore
/// validate_option_labels(&["Yes".into(), "No".into()])  // Ok
/// validate_option_labels(&["Yes".into(), "yes".into()]) // Err - duplicate
/// validate_option_labels(&["Yes".into(), " ".into()])   // Err - blank
/// ```
pub fn validate_option_labels(options: &[String]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for option in options {
        let label = option.trim();
        if label.is_empty() {
            let mut err = ValidationError::new("poll_option_blank");
            err.message = Some("Poll options must not be blank".into());
            return Err(err);
        }
        if !seen.insert(label.to_lowercase()) {
            let mut err = ValidationError::new("poll_option_duplicate");
            err.message = Some(format!("Poll option `{label}` is listed twice").into());
            return Err(err);
        }
    }
    Ok(())
}

/// Validates an RFC 3339 timestamp such as `2025-03-01T14:30:00Z`.
pub fn validate_rfc3339(value: &str) -> Result<(), ValidationError> {
    OffsetDateTime::parse(value, &Rfc3339)
        .map(|_| ())
        .map_err(|_| {
            let mut err = ValidationError::new("rfc3339");
            err.message = Some("Timestamp must be RFC 3339 formatted".into());
            err
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_not_blank() {
        assert!(validate_not_blank("Six runs!").is_ok());
        assert!(validate_not_blank("").is_err());
        assert!(validate_not_blank(" \t ").is_err());
    }

    #[test]
    fn test_validate_option_labels() {
        assert!(validate_option_labels(&["India".into(), "Australia".into()]).is_ok());
        assert!(validate_option_labels(&["India".into(), "india ".into()]).is_err()); // duplicate
        assert!(validate_option_labels(&["India".into(), "".into()]).is_err()); // blank
    }

    #[test]
    fn test_validate_rfc3339() {
        assert!(validate_rfc3339("2025-03-01T14:30:00Z").is_ok());
        assert!(validate_rfc3339("2025-03-01T14:30:00+05:30").is_ok());
        assert!(validate_rfc3339("01/03/2025 14:30").is_err());
    }
}
