//! Newline-delimited JSON framing
//!
//! One frame per line:
//!
//! ```text
//! {"type":"auth","token":"...","room":"lobby"}\n
//! {"type":"send_message","message":"hello"}\n
//! ```
//!
//! The reader accumulates bytes in a [`BytesMut`] and yields a frame per
//! complete line, so frames split across TCP segments reassemble
//! transparently. `read_frame` is cancel-safe: partial data stays buffered
//! across polls, which makes it usable inside `tokio::select!`.

use bytes::{Buf, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ProtocolError, Result};
use crate::protocol::MAX_FRAME_BYTES;

/// Reads `\n`-delimited JSON frames from an async byte stream
#[derive(Debug)]
pub struct FrameReader<R> {
    reader: R,
    buf: BytesMut,
    max_frame_bytes: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Create a reader with the default frame size limit
    pub fn new(reader: R) -> Self {
        Self::with_limit(reader, MAX_FRAME_BYTES)
    }

    /// Create a reader with a custom frame size limit
    pub fn with_limit(reader: R, max_frame_bytes: usize) -> Self {
        Self {
            reader,
            buf: BytesMut::with_capacity(4 * 1024),
            max_frame_bytes,
        }
    }

    /// Read the next frame, or `None` on clean end of stream.
    ///
    /// Blank lines are skipped. A line that is not valid JSON for `T` fails
    /// with [`ProtocolError::Malformed`]; the line is consumed, so the caller
    /// may keep reading. A line longer than the frame limit fails with
    /// [`ProtocolError::Oversized`], whether or not its newline has arrived
    /// yet.
    pub async fn read_frame<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        loop {
            if let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
                if pos > self.max_frame_bytes {
                    self.buf.advance(pos + 1);
                    return Err(ProtocolError::Oversized(self.max_frame_bytes).into());
                }
                let line = self.buf.split_to(pos + 1);
                let line = trim_line(&line[..pos]);
                if line.is_empty() {
                    continue;
                }
                return match serde_json::from_slice(line) {
                    Ok(frame) => Ok(Some(frame)),
                    Err(e) => Err(ProtocolError::Malformed(e.to_string()).into()),
                };
            }

            if self.buf.len() > self.max_frame_bytes {
                return Err(ProtocolError::Oversized(self.max_frame_bytes).into());
            }

            let n = self.reader.read_buf(&mut self.buf).await?;
            if n == 0 {
                if self.buf.iter().all(|&b| b.is_ascii_whitespace()) {
                    self.buf.advance(self.buf.len());
                    return Ok(None);
                }
                return Err(ProtocolError::Malformed("truncated frame at end of stream".into()).into());
            }
        }
    }
}

/// Writes frames as `\n`-terminated JSON lines
#[derive(Debug)]
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Serialize `frame` and write it as one line, flushing afterwards
    pub async fn write_frame<T: Serialize>(&mut self, frame: &T) -> Result<()> {
        let mut data =
            serde_json::to_vec(frame).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        data.push(b'\n');
        self.writer.write_all(&data).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Flush and shut down the underlying stream
    pub async fn shutdown(&mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

/// Strip a trailing carriage return so `\r\n` peers parse cleanly
fn trim_line(line: &[u8]) -> &[u8] {
    match line.last() {
        Some(b'\r') => &line[..line.len() - 1],
        _ => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::protocol::{ClientFrame, ServerFrame};
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_write_then_read() {
        let (client, server) = tokio::io::duplex(1024);
        let mut writer = FrameWriter::new(client);
        let mut reader = FrameReader::new(server);

        tokio_test::assert_ok!(
            writer
                .write_frame(&ClientFrame::SendMessage {
                    message: "hello".to_string(),
                })
                .await
        );
        tokio_test::assert_ok!(writer.write_frame(&ClientFrame::Ping).await);

        let first: ClientFrame = reader.read_frame().await.unwrap().unwrap();
        assert_eq!(
            first,
            ClientFrame::SendMessage {
                message: "hello".to_string()
            }
        );
        let second: ClientFrame = reader.read_frame().await.unwrap().unwrap();
        assert_eq!(second, ClientFrame::Ping);
    }

    #[tokio::test]
    async fn test_frame_split_across_writes() {
        let (mut client, server) = tokio::io::duplex(1024);
        let mut reader = FrameReader::new(server);

        let line = br#"{"type":"ping"}"#;
        let (head, tail) = line.split_at(7);

        let read = tokio::spawn(async move { reader.read_frame::<ClientFrame>().await });

        client.write_all(head).await.unwrap();
        tokio::task::yield_now().await;
        client.write_all(tail).await.unwrap();
        client.write_all(b"\n").await.unwrap();

        let frame = read.await.unwrap().unwrap().unwrap();
        assert_eq!(frame, ClientFrame::Ping);
    }

    #[tokio::test]
    async fn test_blank_lines_and_crlf() {
        let (mut client, server) = tokio::io::duplex(1024);
        let mut reader = FrameReader::new(server);

        client
            .write_all(b"\n\r\n{\"type\":\"pong\"}\r\n")
            .await
            .unwrap();

        let frame: ServerFrame = reader.read_frame().await.unwrap().unwrap();
        assert_eq!(frame, ServerFrame::Pong);
    }

    #[tokio::test]
    async fn test_clean_eof_returns_none() {
        let (client, server) = tokio::io::duplex(1024);
        let mut reader = FrameReader::new(server);
        drop(client);

        let frame: Option<ClientFrame> = reader.read_frame().await.unwrap();
        assert!(frame.is_none());
    }

    #[tokio::test]
    async fn test_truncated_frame_at_eof() {
        let (mut client, server) = tokio::io::duplex(1024);
        let mut reader = FrameReader::new(server);

        client.write_all(b"{\"type\":\"ping\"").await.unwrap();
        drop(client);

        let err = reader.read_frame::<ClientFrame>().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_line_is_consumed() {
        let (mut client, server) = tokio::io::duplex(1024);
        let mut reader = FrameReader::new(server);

        client
            .write_all(b"not json at all\n{\"type\":\"ping\"}\n")
            .await
            .unwrap();

        let err = reader.read_frame::<ClientFrame>().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::Malformed(_))
        ));

        // The bad line is gone; the next frame parses normally
        let frame: ClientFrame = reader.read_frame().await.unwrap().unwrap();
        assert_eq!(frame, ClientFrame::Ping);
    }

    #[tokio::test]
    async fn test_oversized_frame() {
        let (mut client, server) = tokio::io::duplex(4096);
        let mut reader = FrameReader::with_limit(server, 64);

        // No newline in sight; the buffer alone trips the cap.
        let big = vec![b'x'; 256];
        client.write_all(&big).await.unwrap();

        let err = tokio_test::assert_err!(reader.read_frame::<ClientFrame>().await);
        assert!(matches!(err, Error::Protocol(ProtocolError::Oversized(64))));
    }

    #[tokio::test]
    async fn test_oversized_complete_line_rejected() {
        let (mut client, server) = tokio::io::duplex(4096);
        let mut reader = FrameReader::with_limit(server, 64);

        // A well-formed, terminated frame over the limit must not parse.
        let frame = ClientFrame::SendMessage {
            message: "x".repeat(200),
        };
        let mut line = serde_json::to_vec(&frame).unwrap();
        line.push(b'\n');
        client.write_all(&line).await.unwrap();

        let err = tokio_test::assert_err!(reader.read_frame::<ClientFrame>().await);
        assert!(matches!(err, Error::Protocol(ProtocolError::Oversized(64))));
    }

    #[tokio::test]
    async fn test_frame_at_limit_is_accepted() {
        let frame = ClientFrame::SendMessage {
            message: "x".repeat(100),
        };
        let encoded = serde_json::to_vec(&frame).unwrap();

        let (mut client, server) = tokio::io::duplex(4096);
        let mut reader = FrameReader::with_limit(server, encoded.len());

        let mut line = encoded;
        line.push(b'\n');
        client.write_all(&line).await.unwrap();

        let got: ClientFrame = reader.read_frame().await.unwrap().unwrap();
        assert_eq!(got, frame);
    }
}
