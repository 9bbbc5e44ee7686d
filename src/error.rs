use std::fmt::Display;

use thiserror::Error;

use crate::id::IdError;
use crate::rate_limit::RateLimitInfo;

pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

/// The protocol phase a request belonged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Append { segment_index: u32 },
    Finalize,
}

impl Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Init => write!(f, "INIT"),
            Phase::Append { segment_index } => write!(f, "APPEND (segment {})", segment_index),
            Phase::Finalize => write!(f, "FINALIZE"),
        }
    }
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Rate limit exceeded during {phase}")]
    RateLimited {
        phase: Phase,
        rate_limit: RateLimitInfo,
    },

    #[error("{phase} failed with status {status}: {body}")]
    TransportFailure {
        phase: Phase,
        status: u16,
        body: String,
    },

    #[error("Protocol violation during {phase}: {reason}")]
    ProtocolViolation { phase: Phase, reason: String },

    #[error("Incompatible attachment set: {0}")]
    IncompatibleAttachmentSet(String),

    #[error("{phase} request could not be completed: {source}")]
    Network {
        phase: Phase,
        #[source]
        source: TransportError,
    },

    #[error("Failed to read media during {phase}: {source}")]
    Io {
        phase: Phase,
        #[source]
        source: std::io::Error,
    },

    #[error("Unexpected {phase} response body: {source}")]
    InvalidResponse {
        phase: Phase,
        #[source]
        source: serde_json::Error,
    },

    #[error("Upload cancelled before {phase}")]
    Cancelled { phase: Phase },

    #[error("Chunk size must be greater than zero")]
    InvalidChunkSize,
}

impl UploadError {
    /// The phase the failure happened in, if it belongs to one.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            UploadError::RateLimited { phase, .. }
            | UploadError::TransportFailure { phase, .. }
            | UploadError::ProtocolViolation { phase, .. }
            | UploadError::Network { phase, .. }
            | UploadError::Io { phase, .. }
            | UploadError::InvalidResponse { phase, .. }
            | UploadError::Cancelled { phase } => Some(*phase),
            UploadError::IncompatibleAttachmentSet(_) | UploadError::InvalidChunkSize => None,
        }
    }

    /// Whether starting a fresh session later could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            UploadError::RateLimited { .. } | UploadError::Network { .. } => true,
            UploadError::TransportFailure { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub(crate) fn protocol(phase: Phase, reason: impl Into<String>) -> Self {
        UploadError::ProtocolViolation {
            phase,
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed_id(phase: Phase, err: IdError) -> Self {
        UploadError::protocol(phase, err.to_string())
    }
}

pub type Result<T, E = UploadError> = std::result::Result<T, E>;
