//! Translation of raw failures into the uniform [`ApiError`] shape.

use crate::error::{ApiError, ErrorCode, WeubError};

const NETWORK_MESSAGE: &str = "A network error occurred. Please check your connection.";
const TIMEOUT_MESSAGE: &str = "Request timeout. Please try again.";
const GENERIC_MESSAGE: &str = "An unexpected server error occurred";

/// Human message for an HTTP status without a server-provided one.
pub fn status_message(status: u16) -> Option<&'static str> {
    Some(match status {
        400 => "Invalid request. Please check your input.",
        401 => "Authentication required.",
        403 => "Access denied.",
        404 => "Resource not found.",
        408 => TIMEOUT_MESSAGE,
        409 => "Conflict with existing resource.",
        413 => "File size exceeds the upload limit.",
        415 => "Unsupported file format. Please upload MP4, MOV, WEBM, or AVI files.",
        422 => "Invalid data provided.",
        429 => "Too many requests. Please try again later.",
        500 => "Internal server error. Please try again later.",
        502 => "Server temporarily unavailable.",
        503 => "Service temporarily unavailable.",
        504 => TIMEOUT_MESSAGE,
        _ => return None,
    })
}

/// Maps every error leaving the retry loop to an [`ApiError`].
///
/// Rules, first match wins:
///
/// 1. an already translated error passes through;
/// 2. transport failures become `NETWORK_ERROR` / `TIMEOUT_ERROR`, local
///    failures `CLIENT_ERROR`, validation errors keep their own code;
/// 3. an error body with a code supplies code and message;
/// 4. otherwise status and path decide (`VIDEO_NOT_FOUND`,
///    `FILE_TOO_LARGE`, `INVALID_FILE_FORMAT`, `TIMEOUT_ERROR`,
///    `STREAMING_ERROR`, `SERVER_ERROR`, `HTTP_<status>`).
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorTranslator;

impl ErrorTranslator {
    pub fn new() -> Self {
        Self
    }

    pub fn translate(&self, error: &WeubError, url: &str) -> ApiError {
        match error {
            WeubError::Api(api) => api.clone(),
            WeubError::Network(cause) => ApiError::new(ErrorCode::NetworkError, NETWORK_MESSAGE)
                .with_detail("url", url)
                .with_detail("originalError", cause.as_str()),
            WeubError::Timeout(after) => ApiError::new(ErrorCode::TimeoutError, TIMEOUT_MESSAGE)
                .with_detail("url", url)
                .with_detail("timeoutMs", after.as_millis() as u64),
            WeubError::Status {
                status,
                url: failed_url,
                body,
                ..
            } => self.translate_status(*status, failed_url, body.as_ref()),
            other => ApiError::new(other.code(), other.to_string()),
        }
    }

    fn translate_status(
        &self,
        status: u16,
        url: &str,
        body: Option<&crate::types::ApiErrorBody>,
    ) -> ApiError {
        let path = path_of(url);
        let code = match body.filter(|b| !b.code.is_empty()) {
            Some(body) => ErrorCode::from(body.code.as_str()),
            None => code_for_status(status, path),
        };
        let message = body
            .map(|b| b.message.as_str())
            .filter(|m| !m.is_empty())
            .or_else(|| status_message(status))
            .unwrap_or(GENERIC_MESSAGE);

        let mut error = ApiError::new(code, message)
            .with_status(status)
            .with_detail("status", status)
            .with_detail("url", url);
        if let Some(details) = body.and_then(|b| b.details.as_ref()) {
            for (key, value) in details {
                error.details.insert(key.clone(), value.clone());
            }
        }
        error
    }
}

fn code_for_status(status: u16, path: &str) -> ErrorCode {
    match status {
        404 if path.contains("/videos/") => ErrorCode::VideoNotFound,
        413 => ErrorCode::FileTooLarge,
        415 => ErrorCode::InvalidFileFormat,
        408 | 504 => ErrorCode::TimeoutError,
        _ if path.contains("/stream/") => ErrorCode::StreamingError,
        500..=599 => ErrorCode::ServerError,
        _ => ErrorCode::Http(status),
    }
}

/// Path component of an absolute or relative URL, without the query.
pub(crate) fn path_of(url: &str) -> &str {
    let rest = url
        .split_once("://")
        .map(|(_, rest)| rest.find('/').map_or("", |i| &rest[i..]))
        .unwrap_or(url);
    rest.split(['?', '#']).next().unwrap_or(rest)
}
