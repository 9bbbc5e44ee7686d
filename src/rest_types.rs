use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::id::MediaId;

/// Form fields of the INIT command, in the order the API documents them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitRequest {
    pub command: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    pub total_bytes: u64,
}

impl InitRequest {
    pub fn new(total_bytes: u64, media_type: Option<&str>) -> Self {
        Self {
            command: "INIT",
            media_type: media_type.filter(|t| !t.is_empty()).map(str::to_string),
            total_bytes,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InitResponse {
    pub media_id: Option<u64>,
    pub media_id_string: Option<String>,
    pub expires_after_secs: Option<u64>,
}

/// A pre-encoded multipart APPEND body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendRequest {
    pub media_id: MediaId,
    pub segment_index: u32,
    pub payload_len: usize,
    pub content_type: String,
    pub body: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalizeRequest {
    pub command: &'static str,
    pub media_id: MediaId,
}

impl FinalizeRequest {
    pub fn new(media_id: MediaId) -> Self {
        Self {
            command: "FINALIZE",
            media_id,
        }
    }
}

/// The finalized media, as reported by the FINALIZE response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadResult {
    pub media_id: MediaId,
    pub media_id_string: Option<String>,
    pub size: Option<u64>,
    pub expires_after_secs: Option<u64>,
    pub processing_info: Option<ProcessingInfo>,
    pub image: Option<ImageInfo>,
    pub video: Option<VideoInfo>,
}

impl UploadResult {
    /// Whether the server still has to process the media before it can be attached.
    pub fn is_processing(&self) -> bool {
        self.processing_info.as_ref().is_some_and(|info| {
            matches!(
                info.state,
                ProcessingState::Pending | ProcessingState::InProgress
            )
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProcessingInfo {
    pub state: ProcessingState,
    pub check_after_secs: Option<u64>,
    pub progress_percent: Option<u8>,
    pub error: Option<ProcessingError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingState {
    Pending,
    InProgress,
    Failed,
    Succeeded,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProcessingError {
    pub code: Option<i64>,
    pub name: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImageInfo {
    pub image_type: Option<String>,
    pub w: Option<u32>,
    pub h: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VideoInfo {
    pub video_type: Option<String>,
}
