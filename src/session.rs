//! The INIT → APPEND* → FINALIZE state machine for a single upload.
//!
//! A session is driven either step by step (`init`, `append_next`,
//! `finalize`) or all at once with `run`. Every request is awaited before the
//! next one is issued; the server reassembles the media by segment index and
//! declared size, so appends never overlap.

use std::io::SeekFrom;

use tokio::io::AsyncSeekExt;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::chunk::{Chunk, ChunkReader, DEFAULT_CHUNK_SIZE_BYTES, chunk_count};
use crate::error::{Phase, Result, UploadError};
use crate::id::MediaId;
use crate::multipart::MultipartEncoder;
use crate::rest_types::{
    AppendRequest, FinalizeRequest, InitRequest, InitResponse, UploadResult,
};
use crate::source::FileSource;
use crate::transport::{Transport, TransportResponse, UploadRequest};

#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub max_chunk_bytes: u64,
    /// Close the source once every chunk was sent, or when the session fails.
    pub close_after: bool,
    pub cancel: CancelToken,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            max_chunk_bytes: DEFAULT_CHUNK_SIZE_BYTES,
            close_after: false,
            cancel: CancelToken::never(),
        }
    }
}

impl UploadOptions {
    pub fn with_chunk_size(mut self, max_chunk_bytes: u64) -> Self {
        self.max_chunk_bytes = max_chunk_bytes;
        self
    }

    pub fn close_after(mut self, close_after: bool) -> Self {
        self.close_after = close_after;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Identity assigned by INIT, required by every later request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadHandle {
    pub media_id: MediaId,
    pub media_id_string: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Initializing,
    Appending,
    Finalizing,
    Completed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Failed)
    }
}

pub struct ChunkedUploadSession<T> {
    transport: T,
    options: UploadOptions,
    encoder: MultipartEncoder,
    state: SessionState,
    handle: Option<UploadHandle>,
    total_bytes: u64,
    bytes_sent: u64,
    next_segment: u32,
    rewound: bool,
}

impl<T: Transport> ChunkedUploadSession<T> {
    pub fn new(transport: T, options: UploadOptions) -> Result<Self> {
        if options.max_chunk_bytes == 0 {
            return Err(UploadError::InvalidChunkSize);
        }

        Ok(Self {
            transport,
            options,
            encoder: MultipartEncoder::new(),
            state: SessionState::Idle,
            handle: None,
            total_bytes: 0,
            bytes_sent: 0,
            next_segment: 0,
            rewound: false,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn handle(&self) -> Option<&UploadHandle> {
        self.handle.as_ref()
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn segments_sent(&self) -> u32 {
        self.next_segment
    }

    /// Runs the whole protocol for `source`.
    pub async fn run(&mut self, source: &mut FileSource) -> Result<UploadResult> {
        self.init(source).await?;
        while self.append_next(source).await?.is_some() {}
        self.finalize().await
    }

    pub async fn init(&mut self, source: &mut FileSource) -> Result<UploadHandle> {
        if self.state != SessionState::Idle {
            return Err(self.misuse(Phase::Init, "session was already started", Some(source)));
        }
        if self.options.cancel.is_cancelled() {
            return Err(self.fail(UploadError::Cancelled { phase: Phase::Init }, Some(source)));
        }

        self.state = SessionState::Initializing;
        self.total_bytes = source.size_bytes();

        let segments = chunk_count(self.total_bytes, self.options.max_chunk_bytes);
        if segments > u64::from(u32::MAX) {
            let reason = format!(
                "{} bytes need {} segments, more than a segment index can number",
                self.total_bytes, segments
            );
            return Err(self.fail(UploadError::protocol(Phase::Init, reason), Some(source)));
        }

        let request = InitRequest::new(source.size_bytes(), source.mime_type());
        let response = match self.exchange(Phase::Init, UploadRequest::Init(request)).await {
            Ok(response) => response,
            Err(e) => return Err(self.fail(e, Some(source))),
        };
        let handle = match parse_handle(&response) {
            Ok(handle) => handle,
            Err(e) => return Err(self.fail(e, Some(source))),
        };

        debug!(
            media_id = %handle.media_id,
            total_bytes = self.total_bytes,
            segments,
            "initialized chunked upload"
        );

        self.handle = Some(handle.clone());
        self.state = SessionState::Appending;
        Ok(handle)
    }

    /// Sends the next chunk. Returns its segment index, or `None` once the
    /// source is exhausted and the session is ready to finalize.
    pub async fn append_next(&mut self, source: &mut FileSource) -> Result<Option<u32>> {
        let phase = Phase::Append {
            segment_index: self.next_segment,
        };
        if self.state != SessionState::Appending {
            return Err(self.misuse(phase, "session is not accepting segments", Some(source)));
        }
        let Some(media_id) = self.handle.as_ref().map(|h| h.media_id) else {
            return Err(self.misuse(phase, "no media handle before APPEND", Some(source)));
        };
        if self.options.cancel.is_cancelled() {
            return Err(self.fail(UploadError::Cancelled { phase }, Some(source)));
        }

        let chunk = match self.read_chunk(source).await {
            Ok(chunk) => chunk,
            Err(source_err) => {
                let err = UploadError::Io {
                    phase,
                    source: source_err,
                };
                return Err(self.fail(err, Some(source)));
            }
        };

        let Some(chunk) = chunk else {
            if self.bytes_sent != self.total_bytes {
                let reason = format!(
                    "source ended after {} of {} declared bytes",
                    self.bytes_sent, self.total_bytes
                );
                return Err(self.fail(UploadError::protocol(phase, reason), Some(source)));
            }
            if self.options.close_after {
                source.close();
            }
            self.state = SessionState::Finalizing;
            return Ok(None);
        };
        if self.bytes_sent + chunk.payload.len() as u64 > self.total_bytes {
            let reason = format!("source grew past its declared {} bytes", self.total_bytes);
            return Err(self.fail(UploadError::protocol(phase, reason), Some(source)));
        }
        let Some(next_segment) = chunk.sequence_index.checked_add(1) else {
            let reason = "segment index exceeds the u32 range";
            return Err(self.fail(UploadError::protocol(phase, reason), Some(source)));
        };

        let request = AppendRequest {
            media_id,
            segment_index: chunk.sequence_index,
            payload_len: chunk.payload.len(),
            content_type: self.encoder.content_type(),
            body: self
                .encoder
                .encode_append(media_id, source.display_name(), &chunk),
        };

        if let Err(e) = self.exchange(phase, UploadRequest::Append(request)).await {
            return Err(self.fail(e, Some(source)));
        }

        self.bytes_sent += chunk.payload.len() as u64;
        self.next_segment = next_segment;
        debug!(
            %media_id,
            segment_index = chunk.sequence_index,
            bytes_sent = self.bytes_sent,
            total_bytes = self.total_bytes,
            "appended segment"
        );
        Ok(Some(chunk.sequence_index))
    }

    pub async fn finalize(&mut self) -> Result<UploadResult> {
        let phase = Phase::Finalize;
        let Some(media_id) = self.handle.as_ref().map(|h| h.media_id) else {
            return Err(self.misuse(phase, "no media handle before FINALIZE", None));
        };
        if self.state != SessionState::Finalizing {
            return Err(self.misuse(phase, "FINALIZE before every segment was appended", None));
        }
        if self.options.cancel.is_cancelled() {
            return Err(self.fail(UploadError::Cancelled { phase }, None));
        }

        let request = FinalizeRequest::new(media_id);
        let response = match self.exchange(phase, UploadRequest::Finalize(request)).await {
            Ok(response) => response,
            Err(e) => return Err(self.fail(e, None)),
        };
        let result: UploadResult = match serde_json::from_slice(&response.body) {
            Ok(result) => result,
            Err(source) => {
                return Err(self.fail(UploadError::InvalidResponse { phase, source }, None));
            }
        };

        self.state = SessionState::Completed;
        info!(
            %media_id,
            total_bytes = self.total_bytes,
            segments = self.next_segment,
            "finalized chunked upload"
        );
        Ok(result)
    }

    async fn read_chunk(&mut self, source: &mut FileSource) -> std::io::Result<Option<Chunk>> {
        let stream = source.stream_mut()?;
        if !self.rewound {
            stream.seek(SeekFrom::Start(0)).await?;
            self.rewound = true;
        }
        ChunkReader::new(stream, self.options.max_chunk_bytes)
            .starting_at(self.next_segment)
            .next_chunk()
            .await
    }

    async fn exchange(&self, phase: Phase, request: UploadRequest) -> Result<TransportResponse> {
        let response = self
            .transport
            .send(request)
            .await
            .map_err(|source| UploadError::Network { phase, source })?;

        if response.status == 429 {
            return Err(UploadError::RateLimited {
                phase,
                rate_limit: response.rate_limit,
            });
        }
        if !response.is_success() {
            return Err(UploadError::TransportFailure {
                phase,
                status: response.status,
                body: response.body_text(),
            });
        }
        Ok(response)
    }

    fn fail(&mut self, err: UploadError, source: Option<&mut FileSource>) -> UploadError {
        self.state = SessionState::Failed;
        if self.options.close_after
            && let Some(source) = source
        {
            source.close();
        }
        warn!(error = %err, "chunked upload failed");
        err
    }

    /// Out-of-order calls fail a live session but leave a finished one as it was.
    fn misuse(
        &mut self,
        phase: Phase,
        reason: &str,
        source: Option<&mut FileSource>,
    ) -> UploadError {
        let err = UploadError::protocol(phase, reason);
        if self.state.is_terminal() {
            err
        } else {
            self.fail(err, source)
        }
    }
}

fn parse_handle(response: &TransportResponse) -> Result<UploadHandle> {
    let init: InitResponse = serde_json::from_slice(&response.body).map_err(|source| {
        UploadError::InvalidResponse {
            phase: Phase::Init,
            source,
        }
    })?;

    let media_id = match (init.media_id_string.as_deref(), init.media_id) {
        (Some(id), _) => id
            .parse::<MediaId>()
            .map_err(|e| UploadError::malformed_id(Phase::Init, e))?,
        (None, Some(id)) => MediaId::new(id),
        (None, None) => {
            return Err(UploadError::protocol(
                Phase::Init,
                "response lacks media_id_string and media_id",
            ));
        }
    };

    Ok(UploadHandle {
        media_id,
        media_id_string: media_id.to_string(),
    })
}
