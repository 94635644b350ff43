//! Single-key API authentication.

use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde_json::{json, Value};

use crate::rate_limit::RateLimiter;

pub const API_KEY_HEADER: &str = "x-api-key";

pub type Rejection = (StatusCode, Json<Value>);

/// Check the `X-API-KEY` header and the caller's rate budget.
///
/// Rate limiting is applied per presented key, including wrong ones, so a
/// brute-force run burns its own budget rather than the real key's.
pub fn authorize(
    headers: &HeaderMap,
    expected_key: &str,
    limiter: &RateLimiter,
) -> Result<(), Rejection> {
    let presented = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if !limiter.allow(presented) {
        return Err((
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({"detail": "rate limit exceeded"})),
        ));
    }

    if presented != expected_key {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "invalid API key"})),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with_key(key: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_str(key).unwrap());
        headers
    }

    #[test]
    fn test_valid_key_passes() {
        let limiter = RateLimiter::new(10);
        let headers = headers_with_key("dev-local-key");
        assert!(authorize(&headers, "dev-local-key", &limiter).is_ok());
    }

    #[test]
    fn test_wrong_key_is_401() {
        let limiter = RateLimiter::new(10);
        let headers = headers_with_key("nope");
        let (status, _) = authorize(&headers, "dev-local-key", &limiter).unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_missing_header_is_401() {
        let limiter = RateLimiter::new(10);
        let (status, _) = authorize(&HeaderMap::new(), "dev-local-key", &limiter).unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_exhausted_budget_is_429_even_with_valid_key() {
        let limiter = RateLimiter::new(1);
        let headers = headers_with_key("dev-local-key");
        assert!(authorize(&headers, "dev-local-key", &limiter).is_ok());
        let (status, _) = authorize(&headers, "dev-local-key", &limiter).unwrap_err();
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_wrong_key_burns_its_own_budget() {
        let limiter = RateLimiter::new(1);
        let wrong = headers_with_key("guess-1");
        let _ = authorize(&wrong, "dev-local-key", &limiter);
        // The real key's budget is untouched.
        let right = headers_with_key("dev-local-key");
        assert!(authorize(&right, "dev-local-key", &limiter).is_ok());
    }
}
