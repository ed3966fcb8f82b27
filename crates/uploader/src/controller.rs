//! Transfer controller: the read → send → classify loop.
//!
//! Drives a [`ChunkReader`] and a [`ChunkSender`] strictly in sequence,
//! keeps the per-chunk retry budget, and reports progress and the final
//! outcome as [`UploadEvent`]s.

use std::sync::Arc;

use chunkup_transfer::{Chunk, ChunkReader, TransferSession};
use tokio::io::{AsyncRead, AsyncSeek};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::UploadConfig;
use crate::error::UploadError;
use crate::sender::ChunkSender;
use crate::transport::{ChunkTransport, HttpTransport};
use crate::types::{TransferState, UploadEvent, UploadSummary};

/// How the controller treats a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// The chunk was stored; move on.
    Accepted,
    /// Worth resending the same chunk after the delay.
    Transient,
    /// Stop the upload.
    Permanent,
}

/// Classifies an HTTP status for the upload protocol.
pub fn classify_status(status: u16) -> StatusClass {
    match status {
        200 | 201 | 204 => StatusClass::Accepted,
        408 | 502 | 503 | 504 => StatusClass::Transient,
        _ => StatusClass::Permanent,
    }
}

/// Uploads one file in sequential chunks.
pub struct Uploader {
    config: UploadConfig,
    transport: Arc<dyn ChunkTransport>,
    events_tx: mpsc::UnboundedSender<UploadEvent>,
    events_rx: Option<mpsc::UnboundedReceiver<UploadEvent>>,
    cancel: CancellationToken,
    state: TransferState,
}

impl Uploader {
    /// Validates `config` and creates an uploader over HTTP.
    pub fn new(config: UploadConfig) -> Result<Self, UploadError> {
        config.validate()?;
        let transport = HttpTransport::new()?;
        Ok(Self::build(config, Arc::new(transport)))
    }

    /// Validates `config` and creates an uploader over `transport`.
    pub fn with_transport(
        config: UploadConfig,
        transport: Arc<dyn ChunkTransport>,
    ) -> Result<Self, UploadError> {
        config.validate()?;
        Ok(Self::build(config, transport))
    }

    fn build(config: UploadConfig, transport: Arc<dyn ChunkTransport>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            config,
            transport,
            events_tx,
            events_rx: Some(events_rx),
            cancel: CancellationToken::new(),
            state: TransferState::Idle,
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<UploadEvent>> {
        self.events_rx.take()
    }

    /// Returns a token that stops the upload when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Current controller state.
    pub fn state(&self) -> TransferState {
        self.state
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Runs the upload to completion.
    ///
    /// Emits exactly one terminal event (`Finished` or `Failed`) and
    /// returns the same outcome. An uploader runs once.
    pub async fn run(&mut self) -> Result<UploadSummary, UploadError> {
        if self.state != TransferState::Idle {
            return Err(UploadError::AlreadyRun);
        }

        self.state = TransferState::Sending;
        let result = match self.open_reader().await {
            Ok(reader) => self.transfer(reader).await,
            Err(e) => Err(e),
        };
        self.finish(result)
    }

    fn finish(
        &mut self,
        result: Result<UploadSummary, UploadError>,
    ) -> Result<UploadSummary, UploadError> {
        match &result {
            Ok(summary) => {
                self.state = TransferState::Finished;
                self.emit(UploadEvent::Finished);
                info!(
                    file_id = %summary.file_id,
                    chunks = summary.total_chunks,
                    bytes = summary.bytes_sent,
                    retries = summary.retries,
                    "upload finished"
                );
            }
            Err(e) => {
                self.state = TransferState::Failed;
                self.emit(UploadEvent::Failed {
                    error: e.to_string(),
                });
                error!(file = %self.config.file.display(), error = %e, "upload failed");
            }
        }
        result
    }

    async fn open_reader(&self) -> Result<ChunkReader, UploadError> {
        self.check_cancelled()?;
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(UploadError::Cancelled),
            opened = ChunkReader::open(&self.config.file, self.config.chunk_size_bytes()) => Ok(opened?),
        }
    }

    async fn transfer<F>(&mut self, mut reader: ChunkReader<F>) -> Result<UploadSummary, UploadError>
    where
        F: AsyncRead + AsyncSeek + Unpin + Send,
    {
        let mut session = TransferSession::new(reader.file_size(), reader.chunk_size());
        info!(
            file_id = %session.file_id(),
            file = %self.config.file.display(),
            size = session.file_size(),
            chunks = session.total_chunks(),
            "upload started"
        );

        if session.total_chunks() == 0 {
            reader.close();
            self.emit(UploadEvent::Progress { percent: 100 });
            return Ok(summary(&session));
        }

        let sender = ChunkSender::new(self.transport.as_ref(), &self.config, &session);
        let mut pending: Option<Chunk> = None;

        loop {
            self.check_cancelled()?;
            self.state = TransferState::Sending;

            // A chunk that failed to send is resent as-is; only a failed
            // read goes back to the file.
            let chunk = match pending.take() {
                Some(chunk) => chunk,
                None => match reader.next_chunk().await {
                    Ok(Some(chunk)) => chunk,
                    Ok(None) => {
                        warn!(
                            chunk = session.current_chunk(),
                            chunks = session.total_chunks(),
                            "file ended before the expected chunk count"
                        );
                        self.emit(UploadEvent::Progress { percent: 100 });
                        return Ok(summary(&session));
                    }
                    Err(e) => {
                        self.state = TransferState::Retrying;
                        self.retry_or_fail(&mut session, e.to_string()).await?;
                        continue;
                    }
                },
            };

            if self.config.verbose {
                debug!(
                    chunk = chunk.index,
                    offset = chunk.offset,
                    bytes = chunk.len(),
                    last = chunk.is_last,
                    "sending chunk"
                );
            }

            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(UploadError::Cancelled),
                outcome = sender.send(&chunk) => outcome,
            };

            let failure = match outcome {
                Ok(status) => match classify_status(status) {
                    StatusClass::Accepted => {
                        let percent = session.accept(chunk.len() as u64);
                        if self.config.verbose {
                            debug!(chunk = chunk.index, status, percent, "chunk accepted");
                        }
                        if chunk.is_last || session.is_complete() {
                            reader.close();
                            self.emit(UploadEvent::Progress { percent: 100 });
                            return Ok(summary(&session));
                        }
                        self.state = TransferState::Advancing;
                        self.emit(UploadEvent::Progress { percent });
                        continue;
                    }
                    StatusClass::Transient => format!("server responded with status {status}"),
                    StatusClass::Permanent => {
                        return Err(UploadError::Rejected {
                            chunk: chunk.index,
                            status,
                        });
                    }
                },
                Err(e) => e.to_string(),
            };

            self.state = TransferState::Retrying;
            self.retry_or_fail(&mut session, failure).await?;
            pending = Some(chunk);
        }
    }

    /// Charges a transient failure to the current chunk.
    ///
    /// Within budget: emits `Retry` and waits out the delay. Otherwise
    /// returns `RetriesExhausted`.
    async fn retry_or_fail(
        &self,
        session: &mut TransferSession,
        reason: String,
    ) -> Result<(), UploadError> {
        let chunk = session.current_chunk();
        let used = session.record_failure();
        let budget = self.config.retries;

        if used > budget {
            return Err(UploadError::RetriesExhausted {
                chunk,
                retries: budget,
                last: reason,
            });
        }

        let retries_left = session.retries_left(budget);
        let delay = self.config.retry_delay();
        warn!(chunk, retries_left, delay = ?delay, reason = %reason, "chunk failed, retrying");
        self.emit(UploadEvent::Retry {
            message: format!(
                "An error occurred uploading chunk {chunk} ({reason}). {retries_left} retries left."
            ),
            chunk_index: chunk,
            retries_left,
        });

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(UploadError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }

    fn check_cancelled(&self) -> Result<(), UploadError> {
        if self.cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }
        Ok(())
    }

    fn emit(&self, event: UploadEvent) {
        // Nobody listening is fine.
        let _ = self.events_tx.send(event);
    }
}

fn summary(session: &TransferSession) -> UploadSummary {
    UploadSummary {
        file_id: session.file_id().to_string(),
        total_chunks: session.total_chunks(),
        bytes_sent: session.bytes_accepted(),
        retries: session.total_retries(),
    }
}
