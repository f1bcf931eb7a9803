use http::header::AUTHORIZATION;

use crate::error::ProxyError;

/// Extract the bearer key from `Authorization: Bearer <key>`.
///
/// # Errors
///
/// Returns `ProxyError::Auth` when the header is absent or not bearer-shaped.
pub fn extract_api_key(headers: &http::HeaderMap) -> Result<&str, ProxyError> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| ProxyError::Auth("Missing API key".to_string()))
}

/// Validate the request key against the configured static key.
///
/// # Errors
///
/// Returns `ProxyError::Auth` when the key is missing or does not match.
pub fn authenticate(headers: &http::HeaderMap, expected_key: &str) -> Result<(), ProxyError> {
    let key = extract_api_key(headers)?;
    if key != expected_key {
        return Err(ProxyError::Auth("Invalid API key".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderMap;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value.parse().unwrap());
        headers
    }

    #[test]
    fn test_valid_bearer_key_passes() {
        assert!(authenticate(&headers_with("Bearer sk-test"), "sk-test").is_ok());
    }

    #[test]
    fn test_wrong_key_is_rejected() {
        assert!(authenticate(&headers_with("Bearer sk-other"), "sk-test").is_err());
    }

    #[test]
    fn test_missing_header_is_rejected() {
        assert!(authenticate(&HeaderMap::new(), "sk-test").is_err());
    }

    #[test]
    fn test_non_bearer_scheme_is_rejected() {
        assert!(authenticate(&headers_with("Basic sk-test"), "sk-test").is_err());
    }
}
