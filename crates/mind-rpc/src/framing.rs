use std::collections::BTreeMap;

use mind_core::{PREAMBLE_TOKEN, protocol::HEADER_RPC_ID};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::{RpcError, codec::decode_body};

/// Maximum header plus body size accepted by the frame reader.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;
/// Longest preamble line tolerated before giving up on finding its newline.
pub const MAX_PREAMBLE_LEN: usize = 4 * 1024;

const EOL: &str = "\r\n";
const READ_CHUNK: usize = 8 * 1024;

/// One decoded frame: its header mapping and parsed JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Header lines; a repeated key keeps the last value seen.
    pub headers: BTreeMap<String, String>,
    /// Parsed JSON body.
    pub body: Value,
}

impl Frame {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Correlation id echoed by the peer, when present.
    pub fn rpc_id(&self) -> Result<Option<u64>, RpcError> {
        self.header(HEADER_RPC_ID)
            .map(|value| {
                value
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| RpcError::Protocol(format!("invalid RpcId header '{value}'")))
            })
            .transpose()
    }
}

/// Sizes announced by a frame preamble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preamble {
    /// Bytes of header lines plus the blank separator line.
    pub header_size: usize,
    /// Bytes of JSON body.
    pub body_size: usize,
    /// Offset of the first header byte, just past the preamble's CRLF.
    pub offset: usize,
}

/// Builds the wire bytes of one frame from ordered headers and an encoded body.
pub fn encode_frame<K, V>(headers: &[(K, V)], body: &[u8]) -> Vec<u8>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut header_block = String::new();
    for (key, value) in headers {
        header_block.push_str(key.as_ref());
        header_block.push_str(": ");
        header_block.push_str(value.as_ref());
        header_block.push_str(EOL);
    }

    let preamble = format!(
        "{PREAMBLE_TOKEN} {} {}",
        header_block.len() + EOL.len(),
        body.len()
    );

    let mut frame = Vec::with_capacity(preamble.len() + header_block.len() + body.len() + 5);
    frame.extend_from_slice(preamble.as_bytes());
    frame.extend_from_slice(EOL.as_bytes());
    frame.extend_from_slice(header_block.as_bytes());
    frame.extend_from_slice(EOL.as_bytes());
    frame.extend_from_slice(body);
    frame.push(b'\n');
    frame
}

/// Writes one already-encoded frame with a single write.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    frame: &[u8],
) -> Result<(), RpcError> {
    writer.write_all(frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Parses the preamble line found in `buf[..=newline]`.
///
/// The token may be preceded by other bytes on the same line.
pub fn parse_preamble(buf: &[u8], newline: usize) -> Result<Preamble, RpcError> {
    let line = std::str::from_utf8(&buf[..newline])
        .map_err(|_| RpcError::Protocol("preamble is not valid utf-8".to_string()))?;
    let Some(line) = line.strip_suffix('\r') else {
        return Err(RpcError::Protocol(
            "preamble is not terminated by CRLF".to_string(),
        ));
    };
    let Some(start) = line.find(PREAMBLE_TOKEN) else {
        return Err(RpcError::Protocol(format!(
            "missing {PREAMBLE_TOKEN} preamble in '{}'",
            line.escape_debug()
        )));
    };

    let sizes = &line[start + PREAMBLE_TOKEN.len()..];
    let mut fields = sizes
        .strip_prefix(' ')
        .map(|rest| rest.split(' '))
        .into_iter()
        .flatten();
    let (Some(header_size), Some(body_size), None) = (fields.next(), fields.next(), fields.next())
    else {
        return Err(RpcError::Protocol(format!(
            "malformed preamble sizes '{}'",
            sizes.escape_debug()
        )));
    };

    Ok(Preamble {
        header_size: parse_size(header_size)?,
        body_size: parse_size(body_size)?,
        offset: newline + 1,
    })
}

/// Splits a header block into a mapping; later duplicates overwrite earlier ones.
pub fn parse_headers(block: &[u8]) -> Result<BTreeMap<String, String>, RpcError> {
    let text = std::str::from_utf8(block)
        .map_err(|_| RpcError::Protocol("headers are not valid utf-8".to_string()))?;

    let mut headers = BTreeMap::new();
    for line in text.split(EOL).filter(|line| !line.is_empty()) {
        let Some((key, value)) = line.split_once(": ") else {
            return Err(RpcError::Protocol(format!(
                "malformed header line '{}'",
                line.escape_debug()
            )));
        };
        headers.insert(key.to_string(), value.to_string());
    }
    Ok(headers)
}

fn parse_size(digits: &str) -> Result<usize, RpcError> {
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(RpcError::Protocol(format!(
            "invalid preamble size '{digits}'"
        )));
    }
    digits
        .parse()
        .map_err(|_| RpcError::Protocol(format!("preamble size '{digits}' out of range")))
}

/// Buffered frame decoder over a byte stream that delivers arbitrary chunks.
///
/// Bytes read past the end of one frame are kept for the next call.
pub struct FrameReader<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
        }
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Number of bytes read from the stream but not yet consumed by a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Reads exactly one frame, awaiting further chunks as needed.
    pub async fn read_frame(&mut self) -> Result<Frame, RpcError> {
        let newline = self.fill_preamble().await?;
        let preamble = parse_preamble(&self.buf, newline)?;

        let total = preamble
            .header_size
            .checked_add(preamble.body_size)
            .filter(|total| *total <= MAX_FRAME_SIZE)
            .ok_or(RpcError::FrameTooLarge {
                size: preamble.header_size.saturating_add(preamble.body_size),
                max: MAX_FRAME_SIZE,
            })?;

        let start = preamble.offset;
        while self.buf.len() - start < total {
            if self.fill().await? == 0 {
                return Err(RpcError::Protocol(format!(
                    "connection closed mid-frame: received {} of {total} bytes",
                    self.buf.len() - start
                )));
            }
            trace!(loaded = self.buf.len() - start, expected = total, "frame bytes loaded");
        }

        trace!(
            offset = start,
            h_size = preamble.header_size,
            b_size = preamble.body_size,
            "decoding frame"
        );

        let body_start = start + preamble.header_size;
        let end = start + total;
        let headers = parse_headers(&self.buf[start..body_start])?;
        let body = decode_body(&self.buf[body_start..end])?;
        self.buf.drain(..end);

        Ok(Frame { headers, body })
    }

    /// Reads until the buffer holds a newline, returning its index.
    async fn fill_preamble(&mut self) -> Result<usize, RpcError> {
        loop {
            self.skip_separators();
            if let Some(newline) = self.buf.iter().position(|byte| *byte == b'\n') {
                return Ok(newline);
            }
            if self.buf.len() > MAX_PREAMBLE_LEN {
                return Err(RpcError::Protocol(format!(
                    "no preamble line within {MAX_PREAMBLE_LEN} bytes"
                )));
            }
            if self.fill().await? == 0 {
                return Err(if self.buf.is_empty() {
                    RpcError::ConnectionClosed
                } else {
                    RpcError::Protocol("connection closed inside frame preamble".to_string())
                });
            }
        }
    }

    /// Drops the newline terminator of the previous frame.
    fn skip_separators(&mut self) {
        let leading = self
            .buf
            .iter()
            .take_while(|byte| matches!(byte, b'\r' | b'\n'))
            .count();
        if leading > 0 {
            self.buf.drain(..leading);
        }
    }

    async fn fill(&mut self) -> Result<usize, RpcError> {
        let mut chunk = [0_u8; READ_CHUNK];
        let read = self.reader.read(&mut chunk).await?;
        self.buf.extend_from_slice(&chunk[..read]);
        Ok(read)
    }
}
