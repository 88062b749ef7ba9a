//! Bearer-token authentication and company scoping.
//!
//! Implements constant-time comparison to mitigate timing attacks.

use axum::{
    extract::{FromRequestParts, Request},
    http::{header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;

use crate::errors::AppError;

/// Header carrying the company every `/api` request is scoped to.
pub const COMPANY_HEADER: &str = "x-company-id";

/// Token authentication layer function that takes the expected token as a parameter.
pub async fn token_auth_layer(
    expected_token: Option<String>,
    request: Request,
    next: Next,
) -> Response {
    // If no token is configured, allow all requests (dev mode)
    let Some(expected) = expected_token else {
        return next.run(request).await;
    };

    let bearer = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string());

    match bearer {
        Some(token) if constant_time_compare(&token, &expected) => next.run(request).await,
        Some(_) => AppError::Unauthorized("Invalid bearer token".to_string()).into_response(),
        None => AppError::Unauthorized("Missing bearer token".to_string()).into_response(),
    }
}

/// Perform constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// The company a request operates on, taken from the `x-company-id` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyId(pub String);

impl<S> FromRequestParts<S> for CompanyId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(COMPANY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| CompanyId(v.to_string()))
            .ok_or_else(|| {
                AppError::BadRequest(format!("{} header is required", COMPANY_HEADER))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_compare_equal() {
        assert!(constant_time_compare("test-key-123", "test-key-123"));
    }

    #[test]
    fn test_constant_time_compare_not_equal() {
        assert!(!constant_time_compare("test-key-123", "test-key-124"));
    }

    #[test]
    fn test_constant_time_compare_different_lengths() {
        assert!(!constant_time_compare("short", "much-longer-key"));
    }

    #[test]
    fn test_constant_time_compare_empty() {
        assert!(constant_time_compare("", ""));
        assert!(!constant_time_compare("", "not-empty"));
    }

    #[tokio::test]
    async fn test_company_header_required() {
        let request = axum::http::Request::builder()
            .uri("/api/staff")
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();

        let rejected = CompanyId::from_request_parts(&mut parts, &()).await;
        assert!(matches!(rejected, Err(AppError::BadRequest(_))));

        parts
            .headers
            .insert(COMPANY_HEADER, "acme".parse().unwrap());
        let company = CompanyId::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(company, CompanyId("acme".to_string()));
    }
}
