use std::{
    io::{self, Cursor, SeekFrom},
    path::Path,
};

use reqwest::{Client, header::CONTENT_TYPE};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncSeek, AsyncSeekExt};
use url::Url;

/// A seekable byte stream usable as upload payload.
pub trait ByteStream: AsyncRead + AsyncSeek + Unpin + Send {}

impl<T: AsyncRead + AsyncSeek + Unpin + Send> ByteStream for T {}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to download {url}: {source}")]
    Http {
        url: Url,
        #[source]
        source: reqwest::Error,
    },
    #[error("Failed to download {url}: server responded with {status}")]
    Status { url: Url, status: u16 },
}

/// A binary payload to upload, along with what the server needs to know about it.
pub struct FileSource {
    size_bytes: u64,
    mime_type: Option<String>,
    display_name: String,
    stream: Option<Box<dyn ByteStream>>,
}

impl FileSource {
    pub async fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path).await?;
        let display_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self::from_reader(display_name, file).await
    }

    /// Wraps any seekable reader, measuring its size by seeking to the end.
    pub async fn from_reader<R>(display_name: impl Into<String>, mut reader: R) -> io::Result<Self>
    where
        R: ByteStream + 'static,
    {
        let size_bytes = reader.seek(SeekFrom::End(0)).await?;
        reader.seek(SeekFrom::Start(0)).await?;

        let display_name = display_name.into();
        Ok(Self {
            size_bytes,
            mime_type: guess_mime_type(&display_name),
            display_name,
            stream: Some(Box::new(reader)),
        })
    }

    pub fn from_bytes(display_name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        let display_name = display_name.into();
        Self {
            size_bytes: data.len() as u64,
            mime_type: guess_mime_type(&display_name),
            display_name,
            stream: Some(Box::new(Cursor::new(data))),
        }
    }

    /// Downloads a remote file into memory.
    pub async fn fetch(client: &Client, url: Url) -> Result<Self, FetchError> {
        let response = client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| FetchError::Http {
                url: url.clone(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        let served_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .map(|value| value.trim().to_string());

        let body = response.bytes().await.map_err(|source| FetchError::Http {
            url: url.clone(),
            source,
        })?;

        let display_name = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or_default()
            .to_string();

        let mut source = Self::from_bytes(display_name, body.to_vec());
        if source.mime_type.is_none() {
            source.mime_type = served_type.filter(|t| !t.is_empty());
        }
        Ok(source)
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    /// Releases the underlying stream. Closing twice is a no-op.
    pub fn close(&mut self) {
        self.stream = None;
    }

    pub(crate) fn stream_mut(&mut self) -> io::Result<&mut Box<dyn ByteStream>> {
        match self.stream.as_mut() {
            Some(stream) => Ok(stream),
            None => Err(io::Error::other(format!(
                "media source '{}' is closed",
                self.display_name
            ))),
        }
    }
}

impl std::fmt::Debug for FileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSource")
            .field("size_bytes", &self.size_bytes)
            .field("mime_type", &self.mime_type)
            .field("display_name", &self.display_name)
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn guess_mime_type(display_name: &str) -> Option<String> {
    mime_guess::from_path(display_name)
        .first()
        .map(|mime| mime.essence_str().to_string())
}
