//! Validation helpers for DTOs.

use validator::ValidationError;

const MAX_UID_LEN: usize = 128;

/// Validates a provider user id: 1 to 128 ASCII letters, digits, `_` or `-`.
///
/// Ids end up inside storage keys, so separators such as `:` are refused.
///
/// # Examples
///
/// ```ignore
/// validate_uid("g_1029384756") // Ok
/// validate_uid("")             // Err - empty
/// validate_uid("a::b")         // Err - separator
/// ```
pub fn validate_uid(uid: &str) -> Result<(), ValidationError> {
    if uid.is_empty() || uid.len() > MAX_UID_LEN {
        let mut err = ValidationError::new("uid_length");
        err.message = Some(
            format!(
                "User id must be between 1 and {MAX_UID_LEN} characters (got {})",
                uid.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !uid
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        let mut err = ValidationError::new("uid_format");
        err.message = Some("User id may only contain letters, digits, `_` and `-`".into());
        return Err(err);
    }

    Ok(())
}

/// Rejects strings that are empty once surrounding whitespace is removed.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value must not be blank".into());
        return Err(err);
    }
    Ok(())
}

/// Requires at least one rule and no blank rule.
pub fn validate_rules(rules: &[String]) -> Result<(), ValidationError> {
    if rules.is_empty() {
        let mut err = ValidationError::new("rules_empty");
        err.message = Some("At least one rule is required".into());
        return Err(err);
    }

    if let Some(index) = rules.iter().position(|rule| rule.trim().is_empty()) {
        let mut err = ValidationError::new("rule_blank");
        err.message = Some(format!("Rule #{} is blank", index + 1).into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_uid_valid() {
        assert!(validate_uid("alice").is_ok());
        assert!(validate_uid("G-1029_3847").is_ok());
        assert!(validate_uid(&"a".repeat(128)).is_ok());
    }

    #[test]
    fn test_validate_uid_invalid() {
        assert!(validate_uid("").is_err());
        assert!(validate_uid(&"a".repeat(129)).is_err());
        assert!(validate_uid("a::b").is_err()); // separator
        assert!(validate_uid("a b").is_err()); // space
        assert!(validate_uid("é").is_err()); // non-ascii
    }

    #[test]
    fn test_validate_not_blank() {
        assert!(validate_not_blank("Go").is_ok());
        assert!(validate_not_blank("").is_err());
        assert!(validate_not_blank(" \t\n").is_err());
    }

    #[test]
    fn test_validate_rules() {
        assert!(validate_rules(&["Deal five cards".into()]).is_ok());
        assert!(validate_rules(&[]).is_err());
        let err = validate_rules(&["First".into(), "  ".into()]).unwrap_err();
        assert_eq!(err.code, "rule_blank");
    }
}
