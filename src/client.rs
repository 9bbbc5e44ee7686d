use futures::stream::BoxStream;
use tracing::info;
use url::Url;

use crate::attachments::check_attachment_set;
use crate::error::Result;
use crate::rest_types::UploadResult;
use crate::session::{ChunkedUploadSession, UploadOptions};
use crate::source::FileSource;
use crate::transport::{HttpTransport, Transport};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChunkedUploadProgress {
    pub bytes_uploaded: u64,
    pub total_bytes: u64,
}

#[derive(Debug)]
pub enum UploadEvent {
    Progress(ChunkedUploadProgress),
    Complete(UploadResult),
}

/// Uploads media through a [`Transport`], one session per file.
pub struct MediaClient<T = HttpTransport> {
    transport: T,
}

impl MediaClient<HttpTransport> {
    pub fn new(upload_url: Url, auth_token: String) -> Self {
        Self {
            transport: HttpTransport::new(upload_url, auth_token),
        }
    }
}

impl<T: Transport> MediaClient<T> {
    pub fn with_transport(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn upload(
        &self,
        source: &mut FileSource,
        options: UploadOptions,
    ) -> Result<UploadResult> {
        let mut session = ChunkedUploadSession::new(&self.transport, options)?;
        session.run(source).await
    }

    /// Same as [`MediaClient::upload`], reporting progress after every segment.
    pub fn upload_with_progress<'a>(
        &'a self,
        source: &'a mut FileSource,
        options: UploadOptions,
    ) -> Result<BoxStream<'a, Result<UploadEvent>>> {
        let mut session = ChunkedUploadSession::new(&self.transport, options)?;

        let stream = async_stream::try_stream! {
            let total_bytes = source.size_bytes();
            session.init(source).await?;

            yield UploadEvent::Progress(ChunkedUploadProgress {
                bytes_uploaded: 0,
                total_bytes,
            });

            while session.append_next(source).await?.is_some() {
                yield UploadEvent::Progress(ChunkedUploadProgress {
                    bytes_uploaded: session.bytes_sent(),
                    total_bytes,
                });
            }

            let result = session.finalize().await?;
            yield UploadEvent::Complete(result);
        };

        Ok(Box::pin(stream))
    }

    /// Uploads every source for a single post, in order.
    ///
    /// The set is validated before anything is sent; the first failure stops
    /// the remaining uploads.
    pub async fn upload_attachments(
        &self,
        sources: &mut [FileSource],
        options: UploadOptions,
    ) -> Result<Vec<UploadResult>> {
        check_attachment_set(sources)?;

        let mut results = Vec::with_capacity(sources.len());
        for source in sources.iter_mut() {
            let result = self.upload(source, options.clone()).await?;
            info!(
                media_id = %result.media_id,
                name = source.display_name(),
                "uploaded attachment"
            );
            results.push(result);
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UploadError;
    use crate::id::MediaId;
    use crate::test_support::{MEDIA_ID, MockTransport, default_response, json_response};
    use crate::transport::UploadRequest;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_progress_events() {
        let client = MediaClient::with_transport(MockTransport::happy());
        let mut source = FileSource::from_bytes("clip.mp4", vec![0u8; 25]);

        let mut stream = client
            .upload_with_progress(&mut source, UploadOptions::default().with_chunk_size(10))
            .unwrap();

        let mut progress = Vec::new();
        let mut completed = None;
        while let Some(event) = stream.next().await {
            match event.unwrap() {
                UploadEvent::Progress(p) => {
                    assert_eq!(p.total_bytes, 25);
                    progress.push(p.bytes_uploaded);
                }
                UploadEvent::Complete(result) => completed = Some(result),
            }
        }
        drop(stream);

        assert_eq!(progress, vec![0, 10, 20, 25]);
        assert_eq!(completed.unwrap().media_id, MediaId::new(MEDIA_ID));
    }

    #[tokio::test]
    async fn test_progress_stream_ends_with_error() {
        let client = MediaClient::with_transport(MockTransport::scripted(|request, _| {
            match request {
                UploadRequest::Append(append) if append.segment_index == 1 => {
                    Ok(json_response(400, "bad segment"))
                }
                other => Ok(default_response(other)),
            }
        }));
        let mut source = FileSource::from_bytes("clip.mp4", vec![0u8; 25]);

        let events: Vec<_> = client
            .upload_with_progress(&mut source, UploadOptions::default().with_chunk_size(10))
            .unwrap()
            .collect()
            .await;

        assert_eq!(events.len(), 3);
        assert!(matches!(
            events.last().unwrap(),
            Err(UploadError::TransportFailure { status: 400, .. })
        ));
    }

    #[tokio::test]
    async fn test_attachments_upload_sequentially() {
        let client = MediaClient::with_transport(MockTransport::happy());
        let mut sources = vec![
            FileSource::from_bytes("a.png", vec![0u8; 15]),
            FileSource::from_bytes("b.jpg", vec![0u8; 5]),
        ];

        let results = client
            .upload_attachments(
                &mut sources,
                UploadOptions::default().with_chunk_size(10).close_after(true),
            )
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(
            client.transport().commands(),
            vec!["INIT", "APPEND", "APPEND", "FINALIZE", "INIT", "APPEND", "FINALIZE"]
        );
        assert!(sources.iter().all(FileSource::is_closed));
    }

    #[tokio::test]
    async fn test_incompatible_set_sends_nothing() {
        let client = MediaClient::with_transport(MockTransport::happy());
        let mut sources = vec![
            FileSource::from_bytes("a.mp4", vec![0u8; 15]),
            FileSource::from_bytes("b.mp4", vec![0u8; 5]),
        ];

        let err = client
            .upload_attachments(&mut sources, UploadOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::IncompatibleAttachmentSet(_)));
        assert!(client.transport().requests().is_empty());
    }

    #[tokio::test]
    async fn test_first_failure_stops_remaining_uploads() {
        let client = MediaClient::with_transport(MockTransport::scripted(|request, call| {
            match request {
                UploadRequest::Finalize(_) if call == 2 => Ok(json_response(503, "over capacity")),
                other => Ok(default_response(other)),
            }
        }));
        let mut sources = vec![
            FileSource::from_bytes("a.png", vec![0u8; 5]),
            FileSource::from_bytes("b.png", vec![0u8; 5]),
        ];

        let err = client
            .upload_attachments(&mut sources, UploadOptions::default())
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(client.transport().commands(), vec!["INIT", "APPEND", "FINALIZE"]);
    }
}
