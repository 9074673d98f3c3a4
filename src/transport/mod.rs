//! HTTP transport seam.
//!
//! The pipeline talks to the network only through [`Transport`]. Non-2xx
//! statuses come back as ordinary [`HttpResponse`]s; only failures to obtain
//! a response at all (DNS, connect, reset, local encoding) are errors.
//!
//! # Implementations
//!
//! - [`ReqwestTransport`]: production implementation using `reqwest`
//! - Mock implementations for testing

pub mod reqwest;

pub use self::reqwest::ReqwestTransport;

use async_trait::async_trait;
use bytes::Bytes;
use ::reqwest::Method;
use ::reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::types::{TransferProgress, UploadRequest};
use crate::{Result, WeubError};

/// Receives request-body progress while an upload is being sent.
pub type ProgressSender = mpsc::UnboundedSender<TransferProgress>;

/// Request body variants the service accepts.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Multipart(UploadForm),
}

/// Multipart upload form: the file part followed by text fields.
#[derive(Debug, Clone)]
pub struct UploadForm {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
    /// Text fields in send order. Repeated names are allowed (`tags[]`).
    pub fields: Vec<(String, String)>,
}

impl UploadForm {
    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<&UploadRequest> for UploadForm {
    fn from(request: &UploadRequest) -> Self {
        let mut fields = vec![("title".to_string(), request.title.trim().to_string())];
        if let Some(description) = request.description.as_deref().map(str::trim)
            && !description.is_empty()
        {
            fields.push(("description".to_string(), description.to_string()));
        }
        for tag in &request.tags {
            fields.push(("tags[]".to_string(), tag.trim().to_string()));
        }
        Self {
            file_name: request.file_name.clone(),
            content_type: request.mime_type(),
            data: request.data.clone(),
            fields,
        }
    }
}

/// Fully prepared request as handed to a [`Transport`].
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

impl TransportRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
        }
    }
}

/// A received response. Cheap to clone: the body is reference counted.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// JSON response with `Content-Type: application/json`.
    pub fn json(status: u16, value: &Value) -> Self {
        let mut response = Self::new(status, value.to_string());
        response.headers.insert(
            ::reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        response
    }

    /// Add a header; invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| WeubError::Client(format!("response body is not UTF-8: {e}")))
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Sends one prepared request.
///
/// Implementations must not retry, cache or interpret statuses; the pipeline
/// owns all of that. When `progress` is given, the implementation reports
/// request-body bytes as they are consumed.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: TransportRequest,
        progress: Option<ProgressSender>,
    ) -> Result<HttpResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_form_field_order() {
        let request = UploadRequest::new("clip.webm", vec![1u8, 2, 3], " Clip ")
            .description("")
            .tag("a")
            .tag("b");
        let form = UploadForm::from(&request);
        assert_eq!(form.content_type, "video/webm");
        assert_eq!(form.len(), 3);
        let names: Vec<&str> = form.fields.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, ["title", "tags[]", "tags[]"]);
        assert_eq!(form.fields[0].1, "Clip");
    }

    #[test]
    fn response_helpers() {
        let response = HttpResponse::json(200, &serde_json::json!({"ok": true}))
            .with_header("Retry-After", "3");
        assert!(response.is_success());
        assert_eq!(response.header("retry-after"), Some("3"));
        let value: Value = response.decode().unwrap();
        assert_eq!(value["ok"], true);
        assert!(!HttpResponse::new(503, "").is_success());
    }
}
