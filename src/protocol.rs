//! AMI wire protocol: header-block framing over the byte stream
//!
//! AMI messages are blocks of CRLF-terminated `Name: value` lines ending at a
//! blank line (MIME-header-like framing). The codec turns the raw stream into
//! one header map per message and serializes outgoing actions into the same
//! format. It performs no classification of read errors; that belongs to the
//! session layer.

use std::collections::HashMap;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf,
    WriteHalf,
};
use tracing::trace;

use crate::action::{canonical_key, Params};
use crate::constants::{LINE_TERMINATOR, MAX_LINE_SIZE};
use crate::error::{AmiError, AmiResult};

/// Duplex byte stream the codec runs over (plain TCP or TLS).
pub(crate) trait AmiIo: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> AmiIo for T {}

/// Boxed transport stream; swapped wholesale on reconnect.
pub(crate) type IoStream = Box<dyn AmiIo>;

/// One complete inbound message: canonicalized header names to values.
/// Repeated header names keep the last value observed.
pub(crate) type RawMessage = HashMap<String, String>;

/// Split a live stream into its codec halves.
pub(crate) fn split(stream: IoStream) -> (MessageReader, MessageWriter) {
    let (read_half, write_half) = tokio::io::split(stream);
    (
        MessageReader {
            inner: BufReader::new(read_half),
        },
        MessageWriter { inner: write_half },
    )
}

/// Reading side of the codec.
pub(crate) struct MessageReader {
    inner: BufReader<ReadHalf<IoStream>>,
}

impl std::fmt::Debug for MessageReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageReader").finish_non_exhaustive()
    }
}

impl MessageReader {
    /// Read one line, without its terminator. `Ok(None)` means end-of-stream
    /// at a line boundary.
    async fn read_line(&mut self) -> AmiResult<Option<String>> {
        let mut line = String::new();
        let n = (&mut self.inner)
            .take(MAX_LINE_SIZE as u64)
            .read_line(&mut line)
            .await?;
        if n == 0 {
            return Ok(None);
        }
        if !line.ends_with('\n') && n >= MAX_LINE_SIZE {
            return Err(AmiError::LineTooLong);
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }

    /// Read the server's opening banner line (connect time only).
    pub(crate) async fn read_banner(&mut self) -> AmiResult<String> {
        self.read_line()
            .await?
            .ok_or(AmiError::ConnectionClosed)
    }

    /// Read the next header block. Blocks until a blank line terminates the
    /// message; end-of-stream surfaces as [`AmiError::ConnectionClosed`].
    pub(crate) async fn read_message(&mut self) -> AmiResult<RawMessage> {
        let mut headers = RawMessage::new();

        loop {
            let line = self
                .read_line()
                .await?
                .ok_or(AmiError::ConnectionClosed)?;

            if line.is_empty() {
                trace!("[RECV] message block complete ({} headers)", headers.len());
                return Ok(headers);
            }

            match line.find(':') {
                Some(colon_pos) => {
                    let key = canonical_key(line[..colon_pos].trim());
                    let value = line[colon_pos + 1..]
                        .trim()
                        .to_string();
                    headers.insert(key, value);
                }
                None => {
                    return Err(AmiError::InvalidHeader { line });
                }
            }
        }
    }
}

/// Writing side of the codec.
pub(crate) struct MessageWriter {
    inner: WriteHalf<IoStream>,
}

impl std::fmt::Debug for MessageWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageWriter").finish_non_exhaustive()
    }
}

impl MessageWriter {
    /// Serialize normalized action parameters as one `Name: value` line per
    /// header plus the terminating blank line, and flush.
    pub(crate) async fn write_action(&mut self, params: &Params) -> AmiResult<()> {
        let mut wire = String::new();
        for (key, value) in params {
            wire.push_str(key);
            wire.push_str(": ");
            wire.push_str(value);
            wire.push_str(LINE_TERMINATOR);
        }
        wire.push_str(LINE_TERMINATOR);

        self.inner
            .write_all(wire.as_bytes())
            .await?;
        self.inner
            .flush()
            .await?;
        Ok(())
    }

    /// Shut down the write half, signalling end-of-session to the server.
    pub(crate) async fn shutdown(&mut self) -> AmiResult<()> {
        self.inner
            .shutdown()
            .await?;
        Ok(())
    }
}
