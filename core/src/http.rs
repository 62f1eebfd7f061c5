//! Wire-level request and response types.
//!
//! # Design
//! The outgoing request is a plain `http::Request<RequestBody>` so any
//! `Transport` can execute it without knowing about the builder. The
//! transport hands back an `http::Response<BodyReader>` whose body is still
//! a stream; `Request::end` consumes that stream through `decode_body` and
//! keeps only the head as a `Response`.

use std::fmt;
use std::io::{self, Read};

use flate2::read::MultiGzDecoder;
use http::header::CONTENT_ENCODING;
use http::{HeaderMap, StatusCode, Version};

/// Streaming body of a raw response.
pub type BodyReader = Box<dyn Read + Send>;

/// Body of an outgoing request.
pub enum RequestBody {
    Empty,
    Bytes(Vec<u8>),
    Reader(Box<dyn Read + Send>),
}

impl RequestBody {
    /// Drain the body into memory. Used by transports that need a length
    /// up front, and by tests.
    pub fn into_bytes(self) -> io::Result<Vec<u8>> {
        match self {
            RequestBody::Empty => Ok(Vec::new()),
            RequestBody::Bytes(bytes) => Ok(bytes),
            RequestBody::Reader(mut reader) => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf)?;
                Ok(buf)
            }
        }
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Empty => f.write_str("Empty"),
            RequestBody::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            RequestBody::Reader(_) => f.write_str("Reader(..)"),
        }
    }
}

/// Head of a completed exchange, returned by `Request::end` next to the
/// decoded body.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub version: Version,
    pub headers: HeaderMap,
}

impl Response {
    pub fn from_parts(parts: http::response::Parts) -> Self {
        Self {
            status: parts.status,
            version: parts.version,
            headers: parts.headers,
        }
    }

    /// First value of `name`, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Read a response body to the end, gunzipping it when the response says
/// `Content-Encoding: gzip`.
///
/// Read errors stop decoding but are not reported; the bytes produced up to
/// that point are returned. The reader is dropped before returning, which
/// closes the underlying connection stream.
pub fn decode_body(headers: &HeaderMap, body: BodyReader) -> Vec<u8> {
    let gzip = headers
        .get(CONTENT_ENCODING)
        .is_some_and(|v| v.as_bytes() == b"gzip");

    let mut buf = Vec::new();
    let result = if gzip {
        MultiGzDecoder::new(body).read_to_end(&mut buf)
    } else {
        let mut body = body;
        body.read_to_end(&mut buf)
    };
    if let Err(err) = result {
        tracing::debug!(error = %err, decoded = buf.len(), "response body read stopped early");
    }
    buf
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use flate2::write::GzEncoder;
    use flate2::Compression;
    use http::HeaderValue;

    use super::*;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    fn gzip_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        headers
    }

    #[test]
    fn plain_body_is_returned_verbatim() {
        let body = decode_body(&HeaderMap::new(), Box::new(Cursor::new(b"ok".to_vec())));
        assert_eq!(body, b"ok");
    }

    #[test]
    fn gzip_body_is_decompressed() {
        let payload = b"hello gzip world".repeat(20);
        let body = decode_body(&gzip_headers(), Box::new(Cursor::new(gzip(&payload))));
        assert_eq!(body, payload);
    }

    #[test]
    fn multi_member_gzip_is_fully_decoded() {
        let mut stream = gzip(b"first ");
        stream.extend(gzip(b"second"));
        let body = decode_body(&gzip_headers(), Box::new(Cursor::new(stream)));
        assert_eq!(body, b"first second");
    }

    #[test]
    fn other_encodings_are_left_alone() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static("br"));
        let raw = gzip(b"still compressed");
        let body = decode_body(&headers, Box::new(Cursor::new(raw.clone())));
        assert_eq!(body, raw);
    }

    #[test]
    fn corrupt_gzip_yields_no_error() {
        let body = decode_body(&gzip_headers(), Box::new(Cursor::new(b"not gzip".to_vec())));
        assert!(body.is_empty());
    }

    #[test]
    fn truncated_gzip_returns_partial_prefix() {
        let payload = b"abcdefghij".repeat(100);
        let mut stream = gzip(&payload);
        stream.truncate(stream.len() - 8);
        let body = decode_body(&gzip_headers(), Box::new(Cursor::new(stream)));
        assert!(payload.starts_with(&body));
    }

    #[test]
    fn response_header_lookup_ignores_case() {
        let response = Response::from_parts(
            http::Response::builder()
                .header("X-Trace", "1")
                .body(())
                .unwrap()
                .into_parts()
                .0,
        );
        assert_eq!(response.header("x-trace"), Some("1"));
        assert_eq!(response.header("missing"), None);
    }
}
