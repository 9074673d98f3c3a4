//! Production [`Transport`] built on `reqwest` (rustls).

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, stream};
use ::reqwest::multipart::{Form, Part};
use pin_project_lite::pin_project;

use super::{HttpResponse, ProgressSender, RequestBody, Transport, TransportRequest, UploadForm};
use crate::types::TransferProgress;
use crate::version;
use crate::{Result, WeubError};

/// Upload bodies are fed to the connection in chunks of this size.
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP transport backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: ::reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with the crate's user agent and a 10s connect timeout.
    pub fn new() -> Result<Self> {
        let client = ::reqwest::Client::builder()
            .user_agent(version::user_agent())
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| WeubError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wrap an existing client (custom proxies, certificates, ...).
    pub fn with_client(client: ::reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: TransportRequest,
        progress: Option<ProgressSender>,
    ) -> Result<HttpResponse> {
        let mut builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers);

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Multipart(form) => builder.multipart(multipart_form(form, progress)?),
        };

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(map_reqwest_error)?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn multipart_form(form: UploadForm, progress: Option<ProgressSender>) -> Result<Form> {
    let total = form.len();
    let body = ::reqwest::Body::wrap_stream(ProgressStream::new(
        chunked(form.data),
        total,
        progress,
    ));
    let file = Part::stream_with_length(body, total)
        .file_name(form.file_name)
        .mime_str(&form.content_type)
        .map_err(|e| WeubError::Client(format!("invalid content type: {e}")))?;

    let mut multipart = Form::new().part("file", file);
    for (name, value) in form.fields {
        multipart = multipart.text(name, value);
    }
    Ok(multipart)
}

fn chunked(data: Bytes) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
    let len = data.len();
    let chunks: Vec<io::Result<Bytes>> = (0..len)
        .step_by(UPLOAD_CHUNK_SIZE)
        .map(|start| Ok(data.slice(start..(start + UPLOAD_CHUNK_SIZE).min(len))))
        .collect();
    stream::iter(chunks)
}

fn map_reqwest_error(err: ::reqwest::Error) -> WeubError {
    if err.is_builder() {
        WeubError::Client(err.to_string())
    } else {
        WeubError::Network(err.to_string())
    }
}

pin_project! {
    /// Byte stream that reports the running total after every chunk.
    pub(crate) struct ProgressStream<S> {
        #[pin]
        inner: S,
        sent: u64,
        total: u64,
        progress: Option<ProgressSender>,
    }
}

impl<S> ProgressStream<S> {
    pub(crate) fn new(inner: S, total: u64, progress: Option<ProgressSender>) -> Self {
        Self {
            inner,
            sent: 0,
            total,
            progress,
        }
    }
}

impl<S> Stream for ProgressStream<S>
where
    S: Stream<Item = io::Result<Bytes>>,
{
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        let item = ready!(this.inner.poll_next(cx));
        if let Some(Ok(chunk)) = &item {
            *this.sent += chunk.len() as u64;
            if let Some(tx) = this.progress.as_ref() {
                // Receiver gone means nobody is watching any more.
                let _ = tx.send(TransferProgress {
                    bytes_sent: *this.sent,
                    total_bytes: *this.total,
                });
            }
        }
        Poll::Ready(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
