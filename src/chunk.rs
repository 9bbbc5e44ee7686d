use std::io;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

const MEGABYTE: u64 = 1024 * 1024; // 1MB
pub const DEFAULT_CHUNK_SIZE_BYTES: u64 = MEGABYTE;

/// One APPEND worth of payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub sequence_index: u32,
    pub payload: Bytes,
}

/// Number of APPEND calls needed for `total_bytes`.
pub fn chunk_count(total_bytes: u64, chunk_size: u64) -> u64 {
    total_bytes.div_ceil(chunk_size)
}

/// Splits a reader into contiguous chunks of at most `chunk_size` bytes.
///
/// Every chunk but the last is exactly `chunk_size` long, even when the
/// reader hands out short reads. The last chunk is never padded.
pub struct ChunkReader<R> {
    reader: R,
    chunk_size: usize,
    next_index: u64,
    exhausted: bool,
}

impl<R: AsyncRead + Unpin> ChunkReader<R> {
    pub fn new(reader: R, chunk_size: u64) -> Self {
        Self {
            reader,
            chunk_size: usize::try_from(chunk_size).unwrap_or(usize::MAX),
            next_index: 0,
            exhausted: false,
        }
    }

    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    pub async fn next_chunk(&mut self) -> io::Result<Option<Chunk>> {
        if self.exhausted {
            return Ok(None);
        }
        let sequence_index = u32::try_from(self.next_index).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "segment index exceeds the u32 range",
            )
        })?;

        let mut buffer = BytesMut::with_capacity(self.chunk_size.min(16 * MEGABYTE as usize));
        while buffer.len() < self.chunk_size {
            let remaining = self.chunk_size - buffer.len();
            let read = (&mut self.reader)
                .take(remaining as u64)
                .read_buf(&mut buffer)
                .await?;
            if read == 0 {
                self.exhausted = true;
                break;
            }
        }

        if buffer.is_empty() {
            return Ok(None);
        }

        let chunk = Chunk {
            sequence_index,
            payload: buffer.freeze(),
        };
        self.next_index += 1;
        Ok(Some(chunk))
    }

    /// Continues numbering from `index`, for readers resumed mid-stream.
    pub fn starting_at(mut self, index: u32) -> Self {
        self.next_index = u64::from(index);
        self
    }
}
