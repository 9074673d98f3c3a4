//! Weub error types

use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::ApiErrorBody;

/// Machine-readable error code carried by every [`ApiError`].
///
/// Serializes to the service's wire strings (`VIDEO_NOT_FOUND`, `HTTP_409`,
/// ...). Codes the client does not know are preserved verbatim in
/// [`ErrorCode::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ErrorCode {
    /// Local failure before the request reached the server.
    ClientError,
    /// 5xx without a more specific mapping.
    ServerError,
    /// Any other HTTP status without a more specific mapping.
    Http(u16),
    VideoNotFound,
    InvalidFileFormat,
    FileTooLarge,
    ProcessingFailed,
    StreamingError,
    TimeoutError,
    NetworkError,
    InvalidInput,
    MissingRequiredField,
    InvalidUuid,
    /// The server reported a processing status the client does not recognise.
    UnknownStatus,
    Other(String),
}

impl ErrorCode {
    /// Wire representation of the code.
    pub fn as_str(&self) -> Cow<'_, str> {
        let s = match self {
            ErrorCode::ClientError => "CLIENT_ERROR",
            ErrorCode::ServerError => "SERVER_ERROR",
            ErrorCode::Http(status) => return Cow::Owned(format!("HTTP_{status}")),
            ErrorCode::VideoNotFound => "VIDEO_NOT_FOUND",
            ErrorCode::InvalidFileFormat => "INVALID_FILE_FORMAT",
            ErrorCode::FileTooLarge => "FILE_TOO_LARGE",
            ErrorCode::ProcessingFailed => "PROCESSING_FAILED",
            ErrorCode::StreamingError => "STREAMING_ERROR",
            ErrorCode::TimeoutError => "TIMEOUT_ERROR",
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::MissingRequiredField => "MISSING_REQUIRED_FIELD",
            ErrorCode::InvalidUuid => "INVALID_UUID",
            ErrorCode::UnknownStatus => "UNKNOWN_STATUS",
            ErrorCode::Other(code) => code.as_str(),
        };
        Cow::Borrowed(s)
    }

    /// Whether the code belongs to the validation family, which is always
    /// raised before any network call.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ErrorCode::InvalidInput
                | ErrorCode::MissingRequiredField
                | ErrorCode::InvalidUuid
                | ErrorCode::InvalidFileFormat
                | ErrorCode::FileTooLarge
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

impl From<&str> for ErrorCode {
    fn from(s: &str) -> Self {
        match s {
            "CLIENT_ERROR" => ErrorCode::ClientError,
            "SERVER_ERROR" => ErrorCode::ServerError,
            "VIDEO_NOT_FOUND" => ErrorCode::VideoNotFound,
            "INVALID_FILE_FORMAT" => ErrorCode::InvalidFileFormat,
            "FILE_TOO_LARGE" => ErrorCode::FileTooLarge,
            "PROCESSING_FAILED" => ErrorCode::ProcessingFailed,
            "STREAMING_ERROR" => ErrorCode::StreamingError,
            "TIMEOUT_ERROR" => ErrorCode::TimeoutError,
            "NETWORK_ERROR" => ErrorCode::NetworkError,
            "INVALID_INPUT" => ErrorCode::InvalidInput,
            "MISSING_REQUIRED_FIELD" => ErrorCode::MissingRequiredField,
            "INVALID_UUID" => ErrorCode::InvalidUuid,
            "UNKNOWN_STATUS" => ErrorCode::UnknownStatus,
            other => match other.strip_prefix("HTTP_").and_then(|n| n.parse().ok()) {
                Some(status) => ErrorCode::Http(status),
                None => ErrorCode::Other(other.to_string()),
            },
        }
    }
}

impl From<String> for ErrorCode {
    fn from(s: String) -> Self {
        ErrorCode::from(s.as_str())
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> Self {
        code.as_str().into_owned()
    }
}

/// Uniform error shape surfaced to callers once a failure has left the
/// retry loop: code, human message, structured details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
    /// HTTP status of the failed response, when there was one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: Map::new(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

impl From<ApiErrorBody> for ApiError {
    fn from(body: ApiErrorBody) -> Self {
        Self {
            code: ErrorCode::from(body.code),
            message: body.message,
            details: body.details.unwrap_or_default(),
            status: None,
        }
    }
}

/// Weub error types
#[derive(Debug, Clone, thiserror::Error)]
pub enum WeubError {
    // Transport/server failures, as seen by the retry loop
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP {status} from {url}")]
    Status {
        status: u16,
        url: String,
        /// Error object from the response envelope, if the body had one.
        body: Option<ApiErrorBody>,
        /// Parsed `Retry-After` header.
        retry_after: Option<Duration>,
    },

    #[error("client error: {0}")]
    Client(String),

    #[error("JSON error: {0}")]
    Json(String),

    /// A failure already translated into the uniform shape.
    #[error(transparent)]
    Api(ApiError),

    // Validation errors, raised before any network call
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("missing required field: {0}")]
    MissingRequiredField(String),

    #[error("invalid video id: {0:?}")]
    InvalidUuid(String),

    #[error("invalid file format: {0}")]
    InvalidFileFormat(String),

    #[error("file too large: {size} bytes (max {max})")]
    FileTooLarge { size: u64, max: u64 },

    // Processing state
    #[error("unknown video status: {0:?}")]
    UnknownStatus(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl From<serde_json::Error> for WeubError {
    fn from(err: serde_json::Error) -> Self {
        WeubError::Json(err.to_string())
    }
}

impl From<ApiError> for WeubError {
    fn from(err: ApiError) -> Self {
        WeubError::Api(err)
    }
}

/// Whether an HTTP status is worth retrying: 408, 429 and every 5xx.
pub fn is_transient_status(status: u16) -> bool {
    matches!(status, 408 | 429) || (500..600).contains(&status)
}

impl WeubError {
    /// HTTP status associated with the failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            WeubError::Status { status, .. } => Some(*status),
            WeubError::Api(e) => e.status,
            _ => None,
        }
    }

    /// Transport failures and transient statuses may succeed on retry;
    /// everything else is permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            WeubError::Network(_) | WeubError::Timeout(_) => true,
            WeubError::Status { status, .. } => is_transient_status(*status),
            _ => false,
        }
    }

    /// Server-provided `Retry-After` hint.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            WeubError::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Taxonomy code for this error, without request context.
    ///
    /// [`ErrorTranslator`](crate::pipeline::ErrorTranslator) refines raw HTTP
    /// failures using the request path; this is the context-free fallback.
    pub fn code(&self) -> ErrorCode {
        match self {
            WeubError::Network(_) => ErrorCode::NetworkError,
            WeubError::Timeout(_) => ErrorCode::TimeoutError,
            WeubError::Status { status, body, .. } => match body {
                Some(body) => ErrorCode::from(body.code.as_str()),
                None if *status >= 500 => ErrorCode::ServerError,
                None => ErrorCode::Http(*status),
            },
            WeubError::Client(_) | WeubError::Json(_) => ErrorCode::ClientError,
            WeubError::Api(e) => e.code.clone(),
            WeubError::InvalidInput(_) => ErrorCode::InvalidInput,
            WeubError::MissingRequiredField(_) => ErrorCode::MissingRequiredField,
            WeubError::InvalidUuid(_) => ErrorCode::InvalidUuid,
            WeubError::InvalidFileFormat(_) => ErrorCode::InvalidFileFormat,
            WeubError::FileTooLarge { .. } => ErrorCode::FileTooLarge,
            WeubError::UnknownStatus(_) => ErrorCode::UnknownStatus,
            WeubError::Configuration(_) | WeubError::Cancelled => ErrorCode::ClientError,
        }
    }

    /// Human-readable message for user-facing surfaces.
    pub fn user_message(&self) -> String {
        match self {
            WeubError::Api(e) => e.message.clone(),
            WeubError::Status {
                body: Some(body), ..
            } => body.message.clone(),
            other => other.to_string(),
        }
    }
}

/// Result type alias for Weub operations
pub type Result<T> = std::result::Result<T, WeubError>;
