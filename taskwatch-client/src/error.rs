use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Parse error: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Non-2xx answer from the task service. `code` is only set for business
    /// errors (HTTP 403).
    #[error("API error ({status}): {message}")]
    ApiError {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Request timed out after {0} ms")]
    Timeout(u64),
}

impl ClientError {
    /// Transient failures are retried by the next poll instead of surfacing.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::HttpError(_) | ClientError::ParseError(_) | ClientError::Timeout(_) => true,
            ClientError::ApiError { status, .. } => *status >= 500,
            ClientError::InvalidUrl(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(status: u16, code: Option<&str>) -> ClientError {
        ClientError::ApiError {
            status,
            code: code.map(str::to_string),
            message: "nope".to_string(),
        }
    }

    #[test]
    fn test_timeout_is_transient() {
        let err = ClientError::Timeout(5000);
        assert!(err.is_transient());
        assert_eq!(err.to_string(), "Request timed out after 5000 ms");
    }

    #[test]
    fn test_business_errors_are_not_transient() {
        assert!(!api_error(403, Some("TASK_NOT_FOUND")).is_transient());
        assert!(!api_error(400, None).is_transient());
        assert!(!ClientError::InvalidUrl("::".to_string()).is_transient());
    }

    #[test]
    fn test_server_errors_are_transient() {
        assert!(api_error(500, None).is_transient());
        assert!(api_error(502, None).is_transient());
    }
}
