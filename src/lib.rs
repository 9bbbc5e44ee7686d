//! Chunked media uploads for the Twitter v1.1 `media/upload` endpoint.
//!
//! A [`ChunkedUploadSession`] drives one [`FileSource`] through INIT, a
//! sequence of multipart APPEND requests and FINALIZE. [`MediaClient`] wraps
//! sessions for the common cases: a single upload, an upload with progress
//! events, and the attachments of one post.
//!
//! ```no_run
//! use twup::{FileSource, MediaClient, UploadOptions};
//! use url::Url;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let client = MediaClient::new(
//!     Url::parse(twup::DEFAULT_UPLOAD_URL)?,
//!     std::env::var("TWUP_TOKEN")?,
//! );
//! let mut source = FileSource::open("clip.mp4").await?;
//! let media = client
//!     .upload(&mut source, UploadOptions::default().close_after(true))
//!     .await?;
//! println!("{}", media.media_id);
//! # Ok(())
//! # }
//! ```

mod attachments;
mod cancel;
mod chunk;
mod client;
mod error;
mod id;
mod multipart;
mod rate_limit;
mod rest_types;
mod serde_utils;
mod session;
mod source;
mod transport;

#[cfg(test)]
mod test_support;

pub use attachments::{AttachmentKind, check_attachment_set};
pub use cancel::{CancelHandle, CancelToken, cancel_pair};
pub use chunk::{Chunk, ChunkReader, DEFAULT_CHUNK_SIZE_BYTES, chunk_count};
pub use client::{ChunkedUploadProgress, MediaClient, UploadEvent};
pub use error::{Phase, Result, TransportError, UploadError};
pub use id::{IdError, MediaId};
pub use multipart::MultipartEncoder;
pub use rate_limit::RateLimitInfo;
pub use rest_types::{
    AppendRequest, FinalizeRequest, ImageInfo, InitRequest, InitResponse, ProcessingError,
    ProcessingInfo, ProcessingState, UploadResult, VideoInfo,
};
pub use session::{ChunkedUploadSession, SessionState, UploadHandle, UploadOptions};
pub use source::{ByteStream, FetchError, FileSource};
pub use transport::{
    DEFAULT_UPLOAD_URL, HttpTransport, Transport, TransportResponse, UploadRequest,
};
