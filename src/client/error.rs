//! The single error type of the data-access layer.

use std::fmt;

/// Category of a failed service call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 401: missing or rejected credentials
    Authentication,
    /// 403
    Authorization,
    /// 404
    NotFound,
    /// 409: version mismatch
    Conflict,
    /// 400/422 or a client-side check
    Validation,
    /// 429
    RateLimited,
    /// 5xx
    Server,
    /// Connection failure or timeout, including 408
    Network,
    /// The response could not be read
    Decode,
}

impl ErrorKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => ErrorKind::Authentication,
            403 => ErrorKind::Authorization,
            404 => ErrorKind::NotFound,
            409 => ErrorKind::Conflict,
            400 | 422 => ErrorKind::Validation,
            408 => ErrorKind::Network,
            429 => ErrorKind::RateLimited,
            500..=599 => ErrorKind::Server,
            _ => ErrorKind::Decode,
        }
    }
}

/// A failed service call.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceError {
    pub kind: ErrorKind,
    /// HTTP status, when the server answered
    pub status: Option<u16>,
    /// Error code from the response envelope, when present
    pub code: Option<String>,
    pub message: String,
}

/// Result type of every service method.
pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            code: None,
            message: message.into(),
        }
    }

    pub fn from_status(status: u16, code: Option<String>, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::from_status(status),
            status: Some(status),
            code,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Decode, message)
    }

    /// Server, network and rate-limit failures may succeed on a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Server | ErrorKind::Network | ErrorKind::RateLimited
        )
    }

    /// Text suitable for a toast or inline alert.
    pub fn user_message(&self) -> String {
        match self.kind {
            ErrorKind::Authentication => "Your session has expired. Please sign in again.".to_string(),
            ErrorKind::Authorization => "You do not have permission to do this.".to_string(),
            ErrorKind::NotFound => "The requested record no longer exists.".to_string(),
            ErrorKind::Conflict => {
                "Someone else changed this record. Reload and try again.".to_string()
            }
            ErrorKind::Validation => self.message.clone(),
            ErrorKind::RateLimited => {
                "Too many requests. Wait a moment and retry.".to_string()
            }
            ErrorKind::Server => "The server ran into a problem. Please retry.".to_string(),
            ErrorKind::Network => {
                "Could not reach the server. Check your connection and retry.".to_string()
            }
            ErrorKind::Decode => "Received an unexpected response from the server.".to_string(),
        }
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{:?} ({}): {}", self.kind, status, self.message),
            None => write!(f, "{:?}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ServiceError::network(format!("Request timed out: {}", err))
        } else if err.is_decode() {
            ServiceError::decode(format!("Invalid response body: {}", err))
        } else if let Some(status) = err.status() {
            ServiceError::from_status(status.as_u16(), None, err.to_string())
        } else {
            ServiceError::network(format!("Request failed: {}", err))
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::decode(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_status() {
        assert_eq!(ErrorKind::from_status(401), ErrorKind::Authentication);
        assert_eq!(ErrorKind::from_status(403), ErrorKind::Authorization);
        assert_eq!(ErrorKind::from_status(404), ErrorKind::NotFound);
        assert_eq!(ErrorKind::from_status(422), ErrorKind::Validation);
        assert_eq!(ErrorKind::from_status(503), ErrorKind::Server);
        assert_eq!(ErrorKind::from_status(408), ErrorKind::Network);
        assert_eq!(ErrorKind::from_status(429), ErrorKind::RateLimited);
        assert_eq!(ErrorKind::from_status(302), ErrorKind::Decode);
    }

    #[test]
    fn test_timeouts_and_rate_limits() {
        let timeout = ServiceError::from_status(408, None, "Request Timeout");
        assert!(timeout.is_retryable());
        assert!(timeout.user_message().contains("connection"));

        let limited = ServiceError::from_status(429, None, "Too Many Requests");
        assert!(limited.is_retryable());
        assert_eq!(limited.status, Some(429));
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(ServiceError::from_status(502, None, "bad gateway").is_retryable());
        assert!(ServiceError::network("refused").is_retryable());
        assert!(!ServiceError::from_status(404, None, "gone").is_retryable());
        assert!(!ServiceError::validation("Title is required").is_retryable());
    }

    #[test]
    fn test_validation_message_is_shown_verbatim() {
        let err = ServiceError::validation("Title is required");
        assert_eq!(err.user_message(), "Title is required");
        assert_eq!(err.to_string(), "Validation: Title is required");
    }
}
