//! Wire codec
//!
//! Pure functions that turn commands into request frames and response frames
//! into [`Response`] values. Nothing in here touches a socket.
//!
//! Requests are plain text:
//!
//! ```text
//! LIST\r\n\r\n
//! GET <filename>\r\n\r\n
//! UPLOAD <filename>\r\n<base64 payload>\r\n\r\n
//! ```
//!
//! Responses are a single JSON object followed by the terminator.

use super::{Command, ProtocolError, Response, ResponseData, Status, TERMINATOR};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use serde_json::{Map, Value};

/// Encode a command into a complete request frame
///
/// Filenames are written verbatim. A name containing whitespace or the
/// terminator produces an ambiguous frame; use [`validate_filename`] before
/// encoding untrusted names.
pub fn encode(cmd: &Command<'_>) -> Vec<u8> {
    match cmd {
        Command::List => {
            let mut out = b"LIST".to_vec();
            out.extend_from_slice(TERMINATOR);
            out
        }
        Command::Fetch(name) => format!("GET {}\r\n\r\n", name).into_bytes(),
        Command::Store(name, payload) => {
            let encoded_len = (payload.len() + 2) / 3 * 4;
            let mut out = String::with_capacity(name.len() + encoded_len + 16);
            out.push_str("UPLOAD ");
            out.push_str(name);
            out.push_str("\r\n");
            BASE64_STANDARD.encode_string(payload, &mut out);
            out.push_str("\r\n\r\n");
            out.into_bytes()
        }
    }
}

/// Reject filenames that cannot travel safely in a request line
///
/// The request line is split on whitespace by servers, so names must be a
/// single non-empty token without control characters.
pub fn validate_filename(name: &str) -> Result<(), ProtocolError> {
    if name.is_empty() || name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ProtocolError::InvalidFilename(name.to_string()));
    }
    Ok(())
}

/// Find the first terminator at or after `from`
///
/// `from` is where the previous scan stopped; the search backs up three bytes
/// so a terminator split across two reads is still found. Returns the index of
/// the first terminator byte.
pub fn find_terminator(buf: &[u8], from: usize) -> Option<usize> {
    let start = from.saturating_sub(TERMINATOR.len() - 1);
    if buf.len() < start + TERMINATOR.len() {
        return None;
    }
    buf[start..]
        .windows(TERMINATOR.len())
        .position(|w| w == TERMINATOR)
        .map(|pos| start + pos)
}

/// Decode a complete response frame
///
/// The frame must end with the terminator; anything else is a caller error
/// reported as `UnexpectedEof`.
pub fn decode(frame: &[u8]) -> Result<Response, ProtocolError> {
    if !frame.ends_with(TERMINATOR) {
        return Err(ProtocolError::UnexpectedEof);
    }
    decode_body(&frame[..frame.len() - TERMINATOR.len()])
}

/// Decode a response body that arrived without a terminator
///
/// Used when the server closed the connection after writing its final frame.
pub fn decode_unterminated(body: &[u8]) -> Result<Response, ProtocolError> {
    let body = body.strip_suffix(TERMINATOR).unwrap_or(body);
    decode_body(body)
}

fn decode_body(body: &[u8]) -> Result<Response, ProtocolError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ProtocolError::MalformedResponse(e.to_string()))?;

    let obj = value
        .as_object()
        .ok_or_else(|| ProtocolError::MalformedResponse("response is not a JSON object".to_string()))?;

    let status = match obj.get("status").and_then(Value::as_str) {
        Some("OK") => Status::Ok,
        Some("ERROR") => Status::Error,
        Some(other) => {
            return Err(ProtocolError::MalformedResponse(format!(
                "unknown status {:?}",
                other
            )))
        }
        None => {
            return Err(ProtocolError::MalformedResponse(
                "missing status field".to_string(),
            ))
        }
    };

    Ok(Response {
        status,
        data: decode_data(obj)?,
    })
}

fn decode_data(obj: &Map<String, Value>) -> Result<ResponseData, ProtocolError> {
    if let Some(file) = obj.get("data_file") {
        let encoded = file
            .as_str()
            .ok_or_else(|| ProtocolError::MalformedResponse("data_file is not a string".to_string()))?;
        let name = obj
            .get("data_namafile")
            .and_then(Value::as_str)
            .map(str::to_string);
        return Ok(ResponseData::File {
            name,
            encoded: encoded.to_string(),
        });
    }

    match obj.get("data") {
        None | Some(Value::Null) => Ok(ResponseData::Empty),
        Some(Value::String(text)) => Ok(ResponseData::Message { text: text.clone() }),
        Some(Value::Array(items)) => {
            let names = items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        ProtocolError::MalformedResponse("file list entry is not a string".to_string())
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ResponseData::Files { names })
        }
        Some(other) => Ok(ResponseData::Message {
            text: other.to_string(),
        }),
    }
}

/// A request decoded from the wire, owning its data
///
/// Only servers need this direction; the mock server and the codec tests use it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    List,
    Fetch(String),
    Store(String, Vec<u8>),
}

/// Decode a request frame
///
/// Accepts frames with or without the trailing terminator.
pub fn decode_request(frame: &[u8]) -> Result<Request, ProtocolError> {
    let frame = frame.strip_suffix(TERMINATOR).unwrap_or(frame);
    let text = std::str::from_utf8(frame)
        .map_err(|e| ProtocolError::MalformedResponse(format!("request is not UTF-8: {}", e)))?;

    let (line, rest) = match text.find("\r\n") {
        Some(pos) => (&text[..pos], &text[pos + 2..]),
        None => (text, ""),
    };

    let mut parts = line.splitn(2, ' ');
    let verb = parts.next().unwrap_or("").to_ascii_uppercase();
    let arg = parts.next().map(str::trim).unwrap_or("");

    match verb.as_str() {
        "LIST" => Ok(Request::List),
        "GET" if !arg.is_empty() => Ok(Request::Fetch(arg.to_string())),
        "UPLOAD" if !arg.is_empty() => {
            let payload = BASE64_STANDARD
                .decode(rest.trim_end().as_bytes())
                .map_err(|e| ProtocolError::CorruptPayload(e.to_string()))?;
            Ok(Request::Store(arg.to_string(), payload))
        }
        _ => Err(ProtocolError::MalformedResponse(format!(
            "unknown request line {:?}",
            line
        ))),
    }
}
