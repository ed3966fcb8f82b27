//! Per-chunk request construction.

use std::time::Duration;

use chunkup_transfer::{Chunk, TransferSession};
use tracing::warn;

use crate::config::UploadConfig;
use crate::error::TransportError;
use crate::transport::{ChunkRequest, ChunkTransport};

/// Stable identifier of the logical upload.
pub const FILE_ID_HEADER: &str = "uploader-file-id";

/// Total number of chunks in the upload.
pub const CHUNKS_TOTAL_HEADER: &str = "uploader-chunks-total";

/// Zero-based index of the chunk in this request.
pub const CHUNK_NUMBER_HEADER: &str = "uploader-chunk-number";

const PROTOCOL_HEADERS: [&str; 3] = [FILE_ID_HEADER, CHUNKS_TOTAL_HEADER, CHUNK_NUMBER_HEADER];

fn is_protocol_header(name: &str) -> bool {
    PROTOCOL_HEADERS
        .iter()
        .any(|h| h.eq_ignore_ascii_case(name))
}

/// Builds and sends chunk requests for one session.
///
/// Everything that stays constant for the session is captured up front;
/// each request is assembled fresh from it plus the chunk.
pub struct ChunkSender<'a> {
    transport: &'a dyn ChunkTransport,
    endpoint: String,
    file_id: String,
    total_chunks: u64,
    headers: Vec<(String, String)>,
    post_params: Vec<(String, String)>,
    timeout: Duration,
}

impl<'a> ChunkSender<'a> {
    /// Creates a sender for `session`.
    ///
    /// Caller headers that collide with a protocol header are dropped.
    pub fn new(
        transport: &'a dyn ChunkTransport,
        config: &UploadConfig,
        session: &TransferSession,
    ) -> Self {
        let mut headers = Vec::with_capacity(config.headers.len());
        for (name, value) in &config.headers {
            if is_protocol_header(name) {
                warn!(header = %name, "ignoring caller header that overrides an upload protocol header");
                continue;
            }
            headers.push((name.clone(), value.clone()));
        }

        Self {
            transport,
            endpoint: config.endpoint.clone(),
            file_id: session.file_id().to_string(),
            total_chunks: session.total_chunks(),
            headers,
            post_params: config
                .post_params
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            timeout: config.request_timeout(),
        }
    }

    /// Assembles the request for `chunk`.
    pub fn build_request(&self, chunk: &Chunk) -> ChunkRequest {
        let mut headers = self.headers.clone();
        headers.push((FILE_ID_HEADER.into(), self.file_id.clone()));
        headers.push((CHUNKS_TOTAL_HEADER.into(), self.total_chunks.to_string()));
        headers.push((CHUNK_NUMBER_HEADER.into(), chunk.index.to_string()));

        let fields = if chunk.is_last {
            self.post_params.clone()
        } else {
            Vec::new()
        };

        ChunkRequest {
            endpoint: self.endpoint.clone(),
            headers,
            data: chunk.data.clone(),
            fields,
            timeout: self.timeout,
        }
    }

    /// Sends `chunk` and returns the response status.
    pub async fn send(&self, chunk: &Chunk) -> Result<u16, TransportError> {
        self.transport.send(self.build_request(chunk)).await
    }
}
