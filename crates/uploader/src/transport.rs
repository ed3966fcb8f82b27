//! Transport trait and the reqwest-backed implementation.
//!
//! `ChunkTransport` is the seam between the control loop and the network.
//! The loop builds a fully-formed [`ChunkRequest`] and only ever learns the
//! resulting status code (or a transport failure) back.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use tracing::trace;

use crate::error::{TransportError, UploadError};

/// Multipart field holding the chunk bytes.
pub const CHUNK_FIELD: &str = "file";

/// File name attached to the chunk part.
pub const CHUNK_FILE_NAME: &str = "blob";

/// Content type of the chunk part.
pub const CHUNK_CONTENT_TYPE: &str = "application/octet-stream";

/// One chunk request, rebuilt from session state for every send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRequest {
    pub endpoint: String,
    /// Caller headers followed by the protocol headers.
    pub headers: Vec<(String, String)>,
    /// Raw chunk bytes, sent under [`CHUNK_FIELD`].
    pub data: Vec<u8>,
    /// Additional text fields (post parameters on the last chunk).
    pub fields: Vec<(String, String)>,
    pub timeout: Duration,
}

impl ChunkRequest {
    /// Looks up a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Abstract chunk transport.
///
/// Using a trait keeps the control loop decoupled from HTTP and testable
/// with mocks. Implementations return the response status; classification
/// is left to the caller.
pub trait ChunkTransport: Send + Sync {
    /// Sends one chunk and waits for the response status.
    fn send(
        &self,
        request: ChunkRequest,
    ) -> Pin<Box<dyn Future<Output = Result<u16, TransportError>> + Send + '_>>;
}

/// [`ChunkTransport`] over a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport with a default client.
    pub fn new() -> Result<Self, UploadError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self { client })
    }

    /// Wraps an existing client (custom TLS, proxies, ...).
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn map_reqwest_error(err: reqwest::Error, timeout: Duration) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(timeout)
    } else {
        TransportError::Network(err.to_string())
    }
}

impl ChunkTransport for HttpTransport {
    fn send(
        &self,
        request: ChunkRequest,
    ) -> Pin<Box<dyn Future<Output = Result<u16, TransportError>> + Send + '_>> {
        Box::pin(async move {
            let ChunkRequest {
                endpoint,
                headers,
                data,
                fields,
                timeout,
            } = request;

            let chunk_part = Part::bytes(data)
                .file_name(CHUNK_FILE_NAME)
                .mime_str(CHUNK_CONTENT_TYPE)
                .map_err(|e| map_reqwest_error(e, timeout))?;

            let mut form = Form::new().part(CHUNK_FIELD, chunk_part);
            for (name, value) in fields {
                form = form.text(name, value);
            }

            let mut builder = self.client.post(&endpoint).timeout(timeout);
            for (name, value) in &headers {
                builder = builder.header(name.as_str(), value.as_str());
            }

            // Dropping this future (timeout or cancellation) aborts the
            // request.
            let response = builder
                .multipart(form)
                .send()
                .await
                .map_err(|e| map_reqwest_error(e, timeout))?;

            let status = response.status().as_u16();
            trace!(%endpoint, status, "chunk response");
            Ok(status)
        })
    }
}
