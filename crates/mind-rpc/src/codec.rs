use std::io;

use mind_core::{AppSessionId, Request, RpcId};
use serde::Serialize;
use serde_json::{Map, Serializer, Value, ser::Formatter};

use crate::{RpcError, framing::encode_frame};

/// Serializes a payload object to ASCII-only JSON bytes.
///
/// Non-ASCII characters are written as `\uXXXX` escapes, as surrogate pairs outside the BMP.
pub fn encode_body(body: &Map<String, Value>) -> Result<Vec<u8>, RpcError> {
    let mut out = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut out, AsciiFormatter);
    body.serialize(&mut serializer)
        .map_err(|err| RpcError::Encode(err.to_string()))?;
    Ok(out)
}

/// Deserializes a frame body into a JSON value.
pub fn decode_body(bytes: &[u8]) -> Result<Value, RpcError> {
    serde_json::from_slice(bytes).map_err(|err| RpcError::Decode(err.to_string()))
}

/// Encodes a request into one complete wire frame.
pub fn encode_request(
    request: Request,
    rpc_id: RpcId,
    session_id: AppSessionId,
) -> Result<Vec<u8>, RpcError> {
    let headers = request.headers(rpc_id, session_id);
    let body = encode_body(&request.into_body())?;
    Ok(encode_frame(&headers, &body))
}

struct AsciiFormatter;

impl Formatter for AsciiFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if fragment.is_ascii() {
            return writer.write_all(fragment.as_bytes());
        }

        let mut units = [0_u16; 2];
        for ch in fragment.chars() {
            if ch.is_ascii() {
                writer.write_all(&[ch as u8])?;
            } else {
                for unit in ch.encode_utf16(&mut units).iter() {
                    write!(writer, "\\u{unit:04x}")?;
                }
            }
        }
        Ok(())
    }
}
