use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, header::CONTENT_TYPE};
use url::Url;

use crate::error::TransportError;
use crate::rate_limit::RateLimitInfo;
use crate::rest_types::{AppendRequest, FinalizeRequest, InitRequest};

pub const DEFAULT_UPLOAD_URL: &str = "https://upload.twitter.com/1.1/media/upload.json";

/// One request of the chunked upload protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadRequest {
    Init(InitRequest),
    Append(AppendRequest),
    Finalize(FinalizeRequest),
}

/// What came back from the server, unclassified.
#[derive(Debug, Clone, Default)]
pub struct TransportResponse {
    pub status: u16,
    pub rate_limit: RateLimitInfo,
    pub body: Bytes,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Issues authenticated requests against the media upload endpoint.
///
/// Implementations perform exactly one round trip per call and report
/// whatever status they got; mapping statuses to errors is the caller's job.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: UploadRequest) -> Result<TransportResponse, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for &T {
    async fn send(&self, request: UploadRequest) -> Result<TransportResponse, TransportError> {
        (**self).send(request).await
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn send(&self, request: UploadRequest) -> Result<TransportResponse, TransportError> {
        (**self).send(request).await
    }
}

pub struct HttpTransport {
    client: Client,
    upload_url: Url,
    auth_token: String,
}

impl HttpTransport {
    pub fn new(upload_url: Url, auth_token: String) -> Self {
        Self::with_client(Client::new(), upload_url, auth_token)
    }

    pub fn with_client(client: Client, upload_url: Url, auth_token: String) -> Self {
        Self {
            client,
            upload_url,
            auth_token,
        }
    }

    pub fn upload_url(&self) -> &Url {
        &self.upload_url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: UploadRequest) -> Result<TransportResponse, TransportError> {
        let builder = self
            .client
            .post(self.upload_url.clone())
            .bearer_auth(&self.auth_token);

        let builder = match request {
            UploadRequest::Init(init) => builder.form(&init),
            UploadRequest::Finalize(finalize) => builder.form(&finalize),
            UploadRequest::Append(append) => builder
                .header(CONTENT_TYPE, append.content_type)
                .body(append.body),
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let rate_limit = RateLimitInfo::from_headers(response.headers());
        let body = response.bytes().await?;

        Ok(TransportResponse {
            status,
            rate_limit,
            body,
        })
    }
}
