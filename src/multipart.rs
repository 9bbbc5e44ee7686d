use bytes::{BufMut, Bytes, BytesMut};
use uuid::Uuid;

use crate::{chunk::Chunk, id::MediaId};

const CRLF: &[u8] = b"\r\n";

/// Encodes APPEND bodies as `multipart/form-data`.
///
/// One boundary is drawn per encoder and reused for every chunk of a session.
#[derive(Debug, Clone)]
pub struct MultipartEncoder {
    boundary: String,
}

impl MultipartEncoder {
    pub fn new() -> Self {
        Self::with_boundary(Uuid::new_v4().simple().to_string())
    }

    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Fields are written as command, media_id, media, segment_index.
    pub fn encode_append(&self, media_id: MediaId, file_name: &str, chunk: &Chunk) -> Bytes {
        let mut body = BytesMut::with_capacity(chunk.payload.len() + 512);

        self.text_field(&mut body, "command", "APPEND");
        self.text_field(&mut body, "media_id", &media_id.to_string());

        self.delimiter(&mut body);
        body.put_slice(
            format!(
                "Content-Disposition: form-data; name=\"media\"; filename=\"{}\"",
                escape_quoted(file_name)
            )
            .as_bytes(),
        );
        body.put_slice(CRLF);
        body.put_slice(b"Content-Type: application/octet-stream");
        body.put_slice(CRLF);
        body.put_slice(CRLF);
        body.put_slice(&chunk.payload);
        body.put_slice(CRLF);

        self.text_field(&mut body, "segment_index", &chunk.sequence_index.to_string());

        body.put_slice(b"--");
        body.put_slice(self.boundary.as_bytes());
        body.put_slice(b"--");
        body.put_slice(CRLF);

        body.freeze()
    }

    fn delimiter(&self, body: &mut BytesMut) {
        body.put_slice(b"--");
        body.put_slice(self.boundary.as_bytes());
        body.put_slice(CRLF);
    }

    fn text_field(&self, body: &mut BytesMut, name: &str, value: &str) {
        self.delimiter(body);
        body.put_slice(format!("Content-Disposition: form-data; name=\"{}\"", name).as_bytes());
        body.put_slice(CRLF);
        body.put_slice(CRLF);
        body.put_slice(value.as_bytes());
        body.put_slice(CRLF);
    }
}

impl Default for MultipartEncoder {
    fn default() -> Self {
        Self::new()
    }
}

fn escape_quoted(value: &str) -> String {
    value
        .chars()
        .flat_map(|c| match c {
            '"' => vec!['%', '2', '2'],
            '\r' => vec!['%', '0', 'D'],
            '\n' => vec!['%', '0', 'A'],
            c => vec![c],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(index: u32, payload: &'static [u8]) -> Chunk {
        Chunk {
            sequence_index: index,
            payload: Bytes::from_static(payload),
        }
    }

    #[test]
    fn test_append_layout() {
        let encoder = MultipartEncoder::with_boundary("b0und");
        let body = encoder.encode_append(MediaId::new(42), "cat.png", &chunk(3, b"\x00\x01PNG"));

        let mut expected = Vec::new();
        expected.extend_from_slice(
            b"--b0und\r\n\
              Content-Disposition: form-data; name=\"command\"\r\n\r\n\
              APPEND\r\n\
              --b0und\r\n\
              Content-Disposition: form-data; name=\"media_id\"\r\n\r\n\
              42\r\n\
              --b0und\r\n\
              Content-Disposition: form-data; name=\"media\"; filename=\"cat.png\"\r\n\
              Content-Type: application/octet-stream\r\n\r\n",
        );
        expected.extend_from_slice(b"\x00\x01PNG");
        expected.extend_from_slice(
            b"\r\n--b0und\r\n\
              Content-Disposition: form-data; name=\"segment_index\"\r\n\r\n\
              3\r\n\
              --b0und--\r\n",
        );

        assert_eq!(body.as_ref(), expected.as_slice());
        assert_eq!(encoder.content_type(), "multipart/form-data; boundary=b0und");
    }

    #[test]
    fn test_boundary_is_random_hex() {
        let a = MultipartEncoder::new();
        let b = MultipartEncoder::new();
        assert_ne!(a.boundary(), b.boundary());
        assert_eq!(a.boundary().len(), 32);
        assert!(a.boundary().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_filename_quotes_are_escaped() {
        let encoder = MultipartEncoder::with_boundary("x");
        let body = encoder.encode_append(MediaId::new(1), "a\"b.gif", &chunk(0, b"z"));
        let text = String::from_utf8_lossy(&body);
        assert!(text.contains("filename=\"a%22b.gif\""));
    }
}
