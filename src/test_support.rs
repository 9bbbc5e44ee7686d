use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::TransportError;
use crate::rate_limit::RateLimitInfo;
use crate::transport::{Transport, TransportResponse, UploadRequest};

pub(crate) const MEDIA_ID: u64 = 710511363345354753;

type Responder =
    Box<dyn Fn(&UploadRequest, usize) -> Result<TransportResponse, TransportError> + Send + Sync>;

/// Records every request and answers through a scripted responder.
///
/// The responder gets the request and the 0-based index of the call.
pub(crate) struct MockTransport {
    requests: Mutex<Vec<UploadRequest>>,
    responder: Responder,
}

impl MockTransport {
    pub fn happy() -> Self {
        Self::scripted(|request, _| Ok(default_response(request)))
    }

    pub fn scripted<F>(responder: F) -> Self
    where
        F: Fn(&UploadRequest, usize) -> Result<TransportResponse, TransportError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            requests: Mutex::new(Vec::new()),
            responder: Box::new(responder),
        }
    }

    pub fn requests(&self) -> Vec<UploadRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn append_lengths(&self) -> Vec<usize> {
        self.requests()
            .iter()
            .filter_map(|r| match r {
                UploadRequest::Append(append) => Some(append.payload_len),
                _ => None,
            })
            .collect()
    }

    pub fn append_indices(&self) -> Vec<u32> {
        self.requests()
            .iter()
            .filter_map(|r| match r {
                UploadRequest::Append(append) => Some(append.segment_index),
                _ => None,
            })
            .collect()
    }

    pub fn commands(&self) -> Vec<&'static str> {
        self.requests()
            .iter()
            .map(|r| match r {
                UploadRequest::Init(_) => "INIT",
                UploadRequest::Append(_) => "APPEND",
                UploadRequest::Finalize(_) => "FINALIZE",
            })
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: UploadRequest) -> Result<TransportResponse, TransportError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len() - 1
        };
        (self.responder)(&request, call)
    }
}

pub(crate) fn json_response(status: u16, body: &str) -> TransportResponse {
    TransportResponse {
        status,
        rate_limit: RateLimitInfo::default(),
        body: Bytes::copy_from_slice(body.as_bytes()),
    }
}

pub(crate) fn default_response(request: &UploadRequest) -> TransportResponse {
    match request {
        UploadRequest::Init(_) => json_response(
            202,
            &format!(
                r#"{{"media_id":{MEDIA_ID},"media_id_string":"{MEDIA_ID}","expires_after_secs":86399}}"#
            ),
        ),
        UploadRequest::Append(_) => json_response(204, ""),
        UploadRequest::Finalize(_) => json_response(
            201,
            &format!(r#"{{"media_id":{MEDIA_ID},"media_id_string":"{MEDIA_ID}","size":11065}}"#),
        ),
    }
}

pub(crate) fn rate_limited() -> TransportResponse {
    TransportResponse {
        status: 429,
        rate_limit: RateLimitInfo {
            limit: Some(415),
            remaining: Some(0),
            reset_at: Some(1_700_000_900),
            retry_after: None,
        },
        body: Bytes::from_static(br#"{"errors":[{"code":88,"message":"Rate limit exceeded"}]}"#),
    }
}
