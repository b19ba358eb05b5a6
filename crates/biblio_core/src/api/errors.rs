use serde::Serialize;

/// Error type for everything that can go wrong between a store and the REST API.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP client could not be built
    #[error("failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    /// The configured base URL cannot be used to address the API
    #[error("invalid API base URL {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    /// The request never produced a response, originating from `reqwest`
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// The server answered with a non-2xx status
    #[error("{path} answered with status {status}")]
    Status {
        path: String,
        status: u16,
        body: String,
    },
    /// The request body could not be turned into JSON
    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),
    /// The response body is not the JSON we expected
    #[error("failed to decode response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    /// Classifies the failure for the stores' `last_error` field
    #[must_use]
    #[inline]
    pub const fn kind(&self) -> ErrorKind {
        match *self {
            Self::Status {
                status: 400 | 409 | 422,
                ..
            } => ErrorKind::ValidationFailure,
            Self::Client(_)
            | Self::InvalidBaseUrl { .. }
            | Self::Request { .. }
            | Self::Status { .. }
            | Self::Encode(_)
            | Self::Decode { .. } => ErrorKind::NetworkFailure,
        }
    }

    /// HTTP status of the failed response, if there was one
    #[must_use]
    #[inline]
    pub const fn status(&self) -> Option<u16> {
        match *self {
            Self::Status { status, .. } => Some(status),
            Self::Client(_)
            | Self::InvalidBaseUrl { .. }
            | Self::Request { .. }
            | Self::Encode(_)
            | Self::Decode { .. } => None,
        }
    }
}

#[non_exhaustive]
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Transport failure, undecodable body or an unexpected status
    NetworkFailure,
    /// The server rejected the payload; it is the only authority on validity
    ValidationFailure,
    /// An id the caller referenced is not in the local cache
    NotFound,
}

/// Cloneable snapshot of a failure, kept by the stores for consumers to display.
#[non_exhaustive]
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

impl ErrorInfo {
    #[must_use]
    #[inline]
    pub const fn new(kind: ErrorKind, status: Option<u16>, message: String) -> Self {
        Self {
            kind,
            status,
            message,
        }
    }
}

impl From<&ApiError> for ErrorInfo {
    #[inline]
    fn from(error: &ApiError) -> Self {
        Self::new(error.kind(), error.status(), error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn status_error(status: u16) -> ApiError {
        ApiError::Status {
            path: "members/m1".to_owned(),
            status,
            body: String::new(),
        }
    }

    #[test]
    fn rejected_payloads_are_validation_failures() {
        assert_eq!(status_error(400).kind(), ErrorKind::ValidationFailure);
        assert_eq!(status_error(409).kind(), ErrorKind::ValidationFailure);
        assert_eq!(status_error(500).kind(), ErrorKind::NetworkFailure);
        assert_eq!(status_error(404).kind(), ErrorKind::NetworkFailure);
    }

    #[test]
    fn error_info_keeps_status_and_message() {
        let info = ErrorInfo::from(&status_error(503));
        assert_eq!(info.status, Some(503));
        assert_eq!(info.message, "members/m1 answered with status 503");
    }
}
