use std::io::SeekFrom;
use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};

use crate::types::Chunk;
use crate::{DEFAULT_CHUNK_SIZE, TransferError};

/// Number of chunks needed to cover `file_size` bytes.
///
/// An empty file has zero chunks; a size that is an exact multiple of
/// `chunk_size` does not get a trailing empty chunk.
pub fn total_chunks(file_size: u64, chunk_size: u64) -> u64 {
    if chunk_size == 0 {
        return 0;
    }
    file_size.div_ceil(chunk_size)
}

// ---------------------------------------------------------------------------
// ChunkReader
// ---------------------------------------------------------------------------

/// Reads a file sequentially in fixed-size chunks.
///
/// The committed offset only moves forward once a whole chunk has been
/// read, and every read starts by seeking to it. A failed read can
/// therefore be repeated without skipping or duplicating bytes.
///
/// The source defaults to a [`tokio::fs::File`]; any seekable async reader
/// works through [`ChunkReader::from_source`].
pub struct ChunkReader<F = File> {
    file: Option<F>,
    chunk_size: u64,
    offset: u64,
    next_index: u64,
    file_size: u64,
    total_chunks: u64,
}

impl ChunkReader {
    /// Opens `path` read-only for chunked reading.
    ///
    /// If `chunk_size` is 0, [`DEFAULT_CHUNK_SIZE`] (10 MiB) is used.
    pub async fn open(path: &Path, chunk_size: u64) -> Result<Self, TransferError> {
        let open_err = |source| TransferError::Open {
            path: path.display().to_string(),
            source,
        };

        let file = File::open(path).await.map_err(open_err)?;
        let metadata = file.metadata().await.map_err(open_err)?;
        if metadata.is_dir() {
            return Err(open_err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "is a directory",
            )));
        }

        Ok(Self::from_source(file, metadata.len(), chunk_size))
    }
}

impl<F: AsyncRead + AsyncSeek + Unpin> ChunkReader<F> {
    /// Wraps an already-open source of `file_size` bytes.
    ///
    /// If `chunk_size` is 0, [`DEFAULT_CHUNK_SIZE`] is used.
    pub fn from_source(file: F, file_size: u64, chunk_size: u64) -> Self {
        let chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };

        Self {
            file: Some(file),
            chunk_size,
            offset: 0,
            next_index: 0,
            file_size,
            total_chunks: total_chunks(file_size, chunk_size),
        }
    }

    /// Reads the next chunk. Returns `None` at EOF, closing the file.
    pub async fn next_chunk(&mut self) -> Result<Option<Chunk>, TransferError> {
        let offset = self.offset;
        let read_len = self.chunk_size.min(self.remaining());

        if read_len == 0 {
            self.close();
            return Ok(None);
        }
        let Some(file) = self.file.as_mut() else {
            return Ok(None);
        };

        let read_err = |source| TransferError::Read { offset, source };
        file.seek(SeekFrom::Start(offset)).await.map_err(read_err)?;

        // A single read may return short; keep going until the chunk is
        // full or the file ends.
        let mut buf = vec![0u8; read_len as usize];
        let mut filled = 0;
        while filled < buf.len() {
            let n = file.read(&mut buf[filled..]).await.map_err(read_err)?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled == 0 {
            self.close();
            return Ok(None);
        }
        buf.truncate(filled);

        let index = self.next_index;
        let is_last = (filled as u64) < self.chunk_size || index + 1 >= self.total_chunks;
        let chunk = Chunk {
            index,
            offset,
            data: buf,
            is_last,
        };

        self.offset += filled as u64;
        self.next_index += 1;
        Ok(Some(chunk))
    }

    /// Releases the file handle. Further reads return `None`.
    pub fn close(&mut self) {
        self.file = None;
    }

    /// Returns `true` once the handle has been released.
    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    /// Committed byte offset.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// File size captured when the file was opened.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Effective chunk size in bytes.
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Chunk count for the whole file.
    pub fn total_chunks(&self) -> u64 {
        self.total_chunks
    }

    /// Bytes remaining to read.
    pub fn remaining(&self) -> u64 {
        self.file_size.saturating_sub(self.offset)
    }
}
