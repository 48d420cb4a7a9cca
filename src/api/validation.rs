use super::ApiError;

pub fn validate_photo_id(id: i32) -> Result<i32, ApiError> {
    if id <= 0 {
        return Err(ApiError::validation(format!(
            "Invalid photo ID: {}. ID must be a positive integer",
            id
        )));
    }
    Ok(id)
}

pub fn validate_name(name: &str) -> Result<&str, ApiError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation("Name cannot be empty"));
    }
    if trimmed.len() > 255 {
        return Err(ApiError::validation("Name must be 255 characters or less"));
    }
    Ok(trimmed)
}

/// Lightweight shape check only; real verification happens via the
/// verification email, not here.
pub fn validate_email(email: &str) -> Result<&str, ApiError> {
    let trimmed = email.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation("Email cannot be empty"));
    }
    if trimmed.len() > 255 {
        return Err(ApiError::validation("Email must be 255 characters or less"));
    }

    let mut parts = trimmed.splitn(2, '@');
    let local = parts.next().unwrap_or_default();
    let domain = parts.next().unwrap_or_default();
    if local.is_empty() || domain.is_empty() || !domain.contains('.') || domain.contains(' ') {
        return Err(ApiError::validation(format!(
            "Invalid email address: {}",
            trimmed
        )));
    }

    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_photo_id() {
        assert!(validate_photo_id(1).is_ok());
        assert!(validate_photo_id(12345).is_ok());
        assert!(validate_photo_id(0).is_err());
        assert!(validate_photo_id(-1).is_err());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Ada Lovelace").is_ok());
        assert_eq!(validate_name("  trimmed  ").unwrap(), "trimmed");
        assert!(validate_name("").is_err());
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"a".repeat(256)).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("ada@example.com").is_ok());
        assert!(validate_email("first.last@sub.example.org").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("missing@tld").is_err());
        assert!(validate_email("@example.com").is_err());
    }
}
