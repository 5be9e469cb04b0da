use std::error::Error as StdError;
use std::fmt;

use serde::{Deserialize, Serialize};

/// An error answered by the homeserver, or produced locally in its shape.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatrixError {
    #[serde(skip)]
    pub status_code: Option<u16>,
    pub errcode: String,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

impl MatrixError {
    pub fn new(errcode: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            status_code: None,
            errcode: errcode.into(),
            error: error.into(),
            retry_after_ms: None,
        }
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn unknown(msg: impl Into<String>) -> Self {
        Self::new("M_UNKNOWN", msg).with_status(500)
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new("M_FORBIDDEN", msg).with_status(403)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new("M_UNAUTHORIZED", msg).with_status(401)
    }

    pub fn missing_token(msg: impl Into<String>) -> Self {
        Self::new("M_MISSING_TOKEN", msg).with_status(401)
    }

    pub fn unknown_token(msg: impl Into<String>) -> Self {
        Self::new("M_UNKNOWN_TOKEN", msg).with_status(401)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new("M_NOT_FOUND", msg).with_status(404)
    }

    pub fn bad_json(msg: impl Into<String>) -> Self {
        Self::new("M_BAD_JSON", msg).with_status(400)
    }

    pub fn invalid_param(msg: impl Into<String>) -> Self {
        Self::new("M_INVALID_PARAM", msg).with_status(400)
    }

    pub fn user_in_use(msg: impl Into<String>) -> Self {
        Self::new("M_USER_IN_USE", msg).with_status(400)
    }

    pub fn limit_exceeded(retry_after_ms: Option<u64>, msg: impl Into<String>) -> Self {
        let mut e = Self::new("M_LIMIT_EXCEEDED", msg).with_status(429);
        e.retry_after_ms = retry_after_ms;
        e
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::new("M_UNAVAILABLE", msg).with_status(503)
    }

    /// True for both the HTTP and the errcode spelling of "slow down".
    pub fn is_rate_limit(&self) -> bool {
        self.status_code == Some(429) || self.errcode == "M_LIMIT_EXCEEDED"
    }

    pub fn is_user_in_use(&self) -> bool {
        self.errcode == "M_USER_IN_USE"
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code == Some(404) || self.errcode == "M_NOT_FOUND"
    }
}

impl fmt::Display for MatrixError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.status_code.unwrap_or(0),
            self.errcode,
            self.error
        )
    }
}

impl StdError for MatrixError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_detected_by_status_or_errcode() {
        let by_status = MatrixError::new("M_UNKNOWN", "busy").with_status(429);
        assert!(by_status.is_rate_limit());

        let by_code = MatrixError::new("M_LIMIT_EXCEEDED", "busy").with_status(400);
        assert!(by_code.is_rate_limit());

        let neither = MatrixError::forbidden("no");
        assert!(!neither.is_rate_limit());
    }

    #[test]
    fn deserializes_homeserver_error_body() {
        let e: MatrixError = serde_json::from_str(
            r#"{"errcode":"M_LIMIT_EXCEEDED","error":"Too Many Requests","retry_after_ms":2000}"#,
        )
        .unwrap();
        assert_eq!(e.errcode, "M_LIMIT_EXCEEDED");
        assert_eq!(e.retry_after_ms, Some(2000));
    }
}
