use std::time::Duration;

use thiserror::Error;

/// Failure of a single gateway call.
#[derive(Error, Debug)]
pub enum CallError {
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Invalid JSON from server: {0}")]
    InvalidBody(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Maximum length for response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl CallError {
    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut cut = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..cut], body.len())
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        CallError::HttpStatus {
            status: status.as_u16(),
            body: Self::truncate_body(body),
        }
    }

    pub fn invalid_body(raw: &str) -> Self {
        CallError::InvalidBody(Self::truncate_body(raw))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CallError::Timeout(_))
    }

    /// 401 from the server. Only the refresh path gives this special meaning.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, CallError::HttpStatus { status: 401, .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            CallError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}
