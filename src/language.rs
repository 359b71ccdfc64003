use crate::error::ConfigError;
use isolang::Language;

/// Normalize and validate an ISO 639-1 or ISO 639-3 language code.
///
/// Returns the lowercased, trimmed code that goes on the wire as `target=<code>`.
pub fn validate_language_code(code: &str) -> Result<String, ConfigError> {
    let normalized = code.trim().to_lowercase();

    let known = match normalized.len() {
        2 => Language::from_639_1(&normalized).is_some(),
        3 => Language::from_639_3(&normalized).is_some(),
        _ => false,
    };

    if known {
        Ok(normalized)
    } else {
        Err(ConfigError::InvalidLanguage {
            code: code.to_string(),
        })
    }
}

/// True when text in this language needs no translation round trip
pub fn is_passthrough_language(code: &str) -> bool {
    matches!(code.trim().to_lowercase().as_str(), "en" | "eng")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_codes() {
        assert_eq!(validate_language_code("en").unwrap(), "en");
        assert_eq!(validate_language_code(" HI ").unwrap(), "hi");
        assert_eq!(validate_language_code("hin").unwrap(), "hin");
    }

    #[test]
    fn test_invalid_codes() {
        assert!(validate_language_code("").is_err());
        assert!(validate_language_code("zz").is_err());
        assert!(validate_language_code("english").is_err());
        assert!(matches!(
            validate_language_code("q1"),
            Err(ConfigError::InvalidLanguage { code }) if code == "q1"
        ));
    }

    #[test]
    fn test_passthrough() {
        assert!(is_passthrough_language("en"));
        assert!(is_passthrough_language("EN"));
        assert!(!is_passthrough_language("hi"));
    }
}
