//! Message framing for the stdio transport.
//!
//! MCP clients speak one of two framing disciplines over the same byte
//! stream, chosen at startup and never mixed within a session:
//!
//! - **Newline-delimited**: one compact JSON document per line. Messages
//!   must not contain embedded newlines. A trailing carriage return before
//!   the newline is tolerated.
//! - **Content-Length**: LSP-style header block (`Key: Value` lines ending
//!   with a blank line) followed by exactly `Content-Length` body bytes.
//!   The header name match is case-sensitive.
//!
//! The reader owns a buffered stream, so lookahead bytes pulled in while
//! scanning headers are preserved for subsequent messages. A partial
//! message at end of stream is never surfaced as a parsed value: the
//! newline discipline discards an unterminated final line, the
//! Content-Length discipline reports truncation.

use std::io;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Framing discipline for messages on a byte stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
pub enum Framing {
    /// One compact JSON document per newline-terminated line.
    #[default]
    #[serde(rename = "newline")]
    NewlineDelimited,

    /// `Content-Length` header block followed by the exact body bytes.
    #[serde(rename = "content-length")]
    ContentLength,
}

impl std::fmt::Display for Framing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NewlineDelimited => f.write_str("newline"),
            Self::ContentLength => f.write_str("content-length"),
        }
    }
}

/// Errors surfaced by the framing layer.
#[derive(Debug, Error)]
pub enum FramingError {
    /// The underlying stream failed.
    #[error("stdio transport failure")]
    Io(#[from] io::Error),

    /// A complete frame arrived but its payload is not usable JSON.
    #[error("malformed message: {reason}")]
    Malformed {
        /// Description of the decode failure.
        reason: String,
    },

    /// The stream ended partway through a framed message.
    #[error("stream ended {context}")]
    Truncated {
        /// Where in the frame the stream gave out.
        context: &'static str,
    },
}

impl FramingError {
    fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }

    /// Whether this error means the peer went away rather than spoke
    /// garbage. Truncation is an end-of-input condition for the session;
    /// malformed payloads are fatal.
    #[must_use]
    pub const fn is_truncation(&self) -> bool {
        matches!(self, Self::Truncated { .. })
    }
}

/// Decodes framed JSON messages from a byte stream.
pub struct FrameReader<R> {
    reader: BufReader<R>,
    framing: Framing,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Creates a reader for the given discipline over a raw stream.
    #[must_use]
    pub fn new(framing: Framing, inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            framing,
        }
    }

    /// Reads the next message from the stream.
    ///
    /// Returns `Ok(None)` on clean end of input. Under the newline
    /// discipline a blank line and an unterminated final line also yield
    /// `Ok(None)`; under the Content-Length discipline a missing or zero
    /// `Content-Length` does.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError::Malformed`] if a complete frame fails to
    /// decode, [`FramingError::Truncated`] if the stream ends inside a
    /// frame, and [`FramingError::Io`] if the stream itself fails.
    pub async fn read_message(&mut self) -> Result<Option<Value>, FramingError> {
        match self.framing {
            Framing::NewlineDelimited => self.read_newline_delimited().await,
            Framing::ContentLength => self.read_content_length().await,
        }
    }

    async fn read_newline_delimited(&mut self) -> Result<Option<Value>, FramingError> {
        let mut line = Vec::new();
        let bytes_read = self.reader.read_until(b'\n', &mut line).await?;

        if bytes_read == 0 {
            // EOF - stream closed
            return Ok(None);
        }

        if line.last() != Some(&b'\n') {
            // Stream ended without a terminator; the partial line is
            // dropped rather than parsed.
            return Ok(None);
        }

        // Remove the trailing newline and an optional carriage return
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }

        if line.is_empty() {
            return Ok(None);
        }

        decode_payload(&line).map(Some)
    }

    async fn read_content_length(&mut self) -> Result<Option<Value>, FramingError> {
        let mut content_length: Option<usize> = None;
        let mut header_bytes = 0usize;

        loop {
            let mut line = Vec::new();
            let bytes_read = self.reader.read_until(b'\n', &mut line).await?;

            if bytes_read == 0 {
                if header_bytes == 0 {
                    // EOF - stream closed between messages
                    return Ok(None);
                }
                return Err(FramingError::Truncated {
                    context: "inside a header block",
                });
            }
            header_bytes += bytes_read;

            if line.last() == Some(&b'\n') {
                line.pop();
            }
            if line.last() == Some(&b'\r') {
                line.pop();
            }

            if line.is_empty() {
                // Blank line terminates the header block
                break;
            }

            let text = std::str::from_utf8(&line)
                .map_err(|_| FramingError::malformed("header line is not valid UTF-8"))?;

            // Lines without a colon are ignored, as are unknown headers.
            // The header name comparison is case-sensitive.
            if let Some((key, value)) = text.split_once(':') {
                if key.trim() == "Content-Length" {
                    let value = value.trim();
                    content_length = Some(value.parse::<usize>().map_err(|_| {
                        FramingError::malformed(format!("invalid Content-Length value: {value}"))
                    })?);
                }
            }
        }

        let Some(length) = content_length.filter(|&l| l > 0) else {
            // No usable Content-Length header: nothing to read
            return Ok(None);
        };

        let mut body = vec![0u8; length];
        self.reader.read_exact(&mut body).await.map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                FramingError::Truncated {
                    context: "inside a declared body",
                }
            } else {
                FramingError::Io(e)
            }
        })?;

        decode_payload(&body).map(Some)
    }
}

/// Encodes JSON messages onto a byte stream.
pub struct FrameWriter<W> {
    writer: W,
    framing: Framing,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Creates a writer for the given discipline over a raw stream.
    #[must_use]
    pub fn new(framing: Framing, inner: W) -> Self {
        Self {
            writer: inner,
            framing,
        }
    }

    /// Serialises `message` as compact JSON and writes one full frame,
    /// flushing before returning so the client never waits on a
    /// partially buffered reply.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation or writing fails.
    pub async fn write_message<T: Serialize + ?Sized>(
        &mut self,
        message: &T,
    ) -> Result<(), FramingError> {
        let body =
            serde_json::to_vec(message).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let frame = match self.framing {
            Framing::NewlineDelimited => {
                // MCP spec: messages must not contain embedded newlines
                debug_assert!(
                    !body.contains(&b'\n'),
                    "JSON message must not contain embedded newlines"
                );
                let mut frame = body;
                frame.push(b'\n');
                frame
            }
            Framing::ContentLength => {
                let mut frame = format!("Content-Length: {}\r\n\r\n", body.len()).into_bytes();
                frame.extend_from_slice(&body);
                frame
            }
        };

        self.writer.write_all(&frame).await?;
        self.writer.flush().await?;

        Ok(())
    }

    /// Consumes the writer, returning the underlying stream.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // destructors cannot run in const fn
    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn decode_payload(bytes: &[u8]) -> Result<Value, FramingError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| FramingError::malformed("payload is not valid UTF-8"))?;
    serde_json::from_str(text)
        .map_err(|e| FramingError::malformed(format!("payload is not valid JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reader(framing: Framing, bytes: &[u8]) -> FrameReader<&[u8]> {
        FrameReader::new(framing, bytes)
    }

    async fn encode<T: Serialize>(framing: Framing, message: &T) -> Vec<u8> {
        let mut writer = FrameWriter::new(framing, Vec::new());
        writer.write_message(message).await.unwrap();
        writer.into_inner()
    }

    #[tokio::test]
    async fn newline_round_trip() {
        let message = json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"});
        let bytes = encode(Framing::NewlineDelimited, &message).await;

        let mut reader = reader(Framing::NewlineDelimited, &bytes);
        let decoded = reader.read_message().await.unwrap().unwrap();
        assert_eq!(decoded, message);
        assert!(reader.read_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn content_length_round_trip() {
        let message = json!({"jsonrpc": "2.0", "id": "abc", "result": {"tools": []}});
        let bytes = encode(Framing::ContentLength, &message).await;

        let mut reader = reader(Framing::ContentLength, &bytes);
        let decoded = reader.read_message().await.unwrap().unwrap();
        assert_eq!(decoded, message);
        assert!(reader.read_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unicode_survives_both_disciplines() {
        let message = json!({"text": "snö 雪 ❄"});
        for framing in [Framing::NewlineDelimited, Framing::ContentLength] {
            let bytes = encode(framing, &message).await;
            let mut reader = FrameReader::new(framing, bytes.as_slice());
            assert_eq!(reader.read_message().await.unwrap().unwrap(), message);
        }
    }

    #[tokio::test]
    async fn newline_frame_bytes_are_exact() {
        let bytes = encode(Framing::NewlineDelimited, &json!({"a": 1})).await;
        assert_eq!(bytes, b"{\"a\":1}\n");
    }

    #[tokio::test]
    async fn content_length_frame_bytes_are_exact() {
        let bytes = encode(Framing::ContentLength, &json!({"a": 1})).await;
        assert_eq!(bytes, b"Content-Length: 7\r\n\r\n{\"a\":1}");
    }

    #[tokio::test]
    async fn newline_tolerates_carriage_return() {
        let mut reader = reader(Framing::NewlineDelimited, b"{\"a\":1}\r\n");
        let decoded = reader.read_message().await.unwrap().unwrap();
        assert_eq!(decoded, json!({"a": 1}));
    }

    #[tokio::test]
    async fn newline_blank_line_yields_no_message() {
        let mut reader = reader(Framing::NewlineDelimited, b"\n");
        assert!(reader.read_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn newline_unterminated_tail_is_dropped() {
        let mut reader = reader(Framing::NewlineDelimited, b"{\"a\":1}");
        assert!(reader.read_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn newline_invalid_json_is_malformed() {
        let mut reader = reader(Framing::NewlineDelimited, b"not json\n");
        let err = reader.read_message().await.unwrap_err();
        assert!(matches!(err, FramingError::Malformed { .. }));
    }

    #[tokio::test]
    async fn newline_invalid_utf8_is_malformed() {
        let mut reader = reader(Framing::NewlineDelimited, b"\xff\xfe\n");
        let err = reader.read_message().await.unwrap_err();
        assert!(matches!(err, FramingError::Malformed { .. }));
    }

    #[tokio::test]
    async fn newline_reads_consecutive_messages() {
        let mut reader = reader(Framing::NewlineDelimited, b"{\"a\":1}\n{\"b\":2}\n");
        assert_eq!(
            reader.read_message().await.unwrap().unwrap(),
            json!({"a": 1})
        );
        assert_eq!(
            reader.read_message().await.unwrap().unwrap(),
            json!({"b": 2})
        );
        assert!(reader.read_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn truncated_body_never_parses() {
        let mut reader = reader(
            Framing::ContentLength,
            b"Content-Length: 50\r\n\r\n{\"a\":1}",
        );
        let err = reader.read_message().await.unwrap_err();
        assert!(err.is_truncation(), "expected truncation, got {err:?}");
    }

    #[tokio::test]
    async fn header_name_is_case_sensitive() {
        // A lowercase header does not count; the message yields nothing.
        let mut reader = reader(Framing::ContentLength, b"content-length: 7\r\n\r\n{\"a\":1}");
        assert!(reader.read_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_content_length_yields_no_message() {
        let mut reader = reader(Framing::ContentLength, b"Content-Type: json\r\n\r\n");
        assert!(reader.read_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn zero_content_length_yields_no_message() {
        let mut reader = reader(Framing::ContentLength, b"Content-Length: 0\r\n\r\n");
        assert!(reader.read_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn non_numeric_content_length_is_malformed() {
        let mut reader = reader(Framing::ContentLength, b"Content-Length: seven\r\n\r\n");
        let err = reader.read_message().await.unwrap_err();
        assert!(matches!(err, FramingError::Malformed { .. }));
    }

    #[tokio::test]
    async fn eof_inside_headers_is_truncation() {
        let mut reader = reader(Framing::ContentLength, b"Content-Length: 10\r\n");
        let err = reader.read_message().await.unwrap_err();
        assert!(err.is_truncation());
    }

    #[tokio::test]
    async fn eof_between_messages_is_clean() {
        let mut reader = reader(Framing::ContentLength, b"");
        assert!(reader.read_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn lines_without_colon_are_ignored() {
        let mut reader = reader(
            Framing::ContentLength,
            b"garbage line\r\nContent-Length: 7\r\n\r\n{\"a\":1}",
        );
        let decoded = reader.read_message().await.unwrap().unwrap();
        assert_eq!(decoded, json!({"a": 1}));
    }

    #[tokio::test]
    async fn header_bytes_never_leak_into_body() {
        // Two back-to-back frames: buffered lookahead from the first
        // header scan must leave the second frame intact.
        let mut bytes = encode(Framing::ContentLength, &json!({"first": 1})).await;
        bytes.extend(encode(Framing::ContentLength, &json!({"second": 2})).await);

        let mut reader = reader(Framing::ContentLength, &bytes);
        assert_eq!(
            reader.read_message().await.unwrap().unwrap(),
            json!({"first": 1})
        );
        assert_eq!(
            reader.read_message().await.unwrap().unwrap(),
            json!({"second": 2})
        );
        assert!(reader.read_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn frame_split_across_reads_is_reassembled() {
        let mock = tokio_test::io::Builder::new()
            .read(b"Content-Le")
            .read(b"ngth: 13\r\n")
            .read(b"\r\n{\"answer\"")
            .read(b":42}")
            .build();

        let mut reader = FrameReader::new(Framing::ContentLength, mock);
        let decoded = reader.read_message().await.unwrap().unwrap();
        assert_eq!(decoded, json!({"answer": 42}));
    }

    #[tokio::test]
    async fn newline_frame_split_across_reads_is_reassembled() {
        let mock = tokio_test::io::Builder::new()
            .read(b"{\"jsonrpc\":\"2.0\",")
            .read(b"\"method\":\"x\"}\n")
            .build();

        let mut reader = FrameReader::new(Framing::NewlineDelimited, mock);
        let decoded = reader.read_message().await.unwrap().unwrap();
        assert_eq!(decoded, json!({"jsonrpc": "2.0", "method": "x"}));
    }
}
