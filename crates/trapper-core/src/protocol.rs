//! Trapper wire format.
//!
//! Every message, request or response, is a 13-byte header followed by a
//! UTF-8 JSON body:
//!
//! ```text
//! offset  size  content
//! 0       4     magic "ZBXD"
//! 4       1     flags, 0x01 = protocol version 1
//! 5       8     body length, u64 little-endian
//! 13      N     body
//! ```
//!
//! Request bodies are rendered by hand with a fixed field order:
//! `{"request":"sender data","clock":..,"data":[{"clock":..,"host":..,"key":..,"value":..}]}`.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::json::escape_into;
use crate::status::Status;

/// Magic bytes at the start of every frame.
pub const MAGIC: [u8; 4] = *b"ZBXD";
/// Protocol version flag.
pub const VERSION: u8 = 0x01;
/// Flag bit set by collectors that compress the body.
pub const FLAG_COMPRESSED: u8 = 0x02;
/// Size of magic + flags + length.
pub const HEADER_LEN: usize = 13;
/// Default collector port.
pub const DEFAULT_PORT: u16 = 10051;
/// Response text used when the collector sends back no usable frame.
pub const EMPTY_RESPONSE: &str = "[]";

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub flags: u8,
    pub length: u64,
}

/// Prepend the header to `body`.
pub fn encode_frame(body: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_LEN + body.len());
    frame.extend_from_slice(&MAGIC);
    frame.push(VERSION);
    frame.extend_from_slice(&(body.len() as u64).to_le_bytes());
    frame.extend_from_slice(body);
    frame
}

/// Decode the 13-byte header at the start of `buf`.
pub fn decode_header(buf: &[u8]) -> Result<FrameHeader> {
    if buf.len() < HEADER_LEN {
        return Err(Error::ProtocolDecode(format!(
            "incomplete header: need {HEADER_LEN} bytes, have {}",
            buf.len()
        )));
    }
    if buf[..4] != MAGIC {
        return Err(Error::ProtocolDecode(format!(
            "bad magic {:02x?}",
            &buf[..4]
        )));
    }
    let mut len = [0u8; 8];
    len.copy_from_slice(&buf[5..HEADER_LEN]);
    Ok(FrameHeader {
        flags: buf[4],
        length: u64::from_le_bytes(len),
    })
}

/// Decode a complete frame, requiring exactly `length` body bytes.
pub fn decode_frame(buf: &[u8]) -> Result<(FrameHeader, &[u8])> {
    let header = decode_header(buf)?;
    let body = &buf[HEADER_LEN..];
    if body.len() as u64 != header.length {
        return Err(Error::ProtocolDecode(format!(
            "length mismatch: header says {}, frame carries {}",
            header.length,
            body.len()
        )));
    }
    Ok((header, body))
}

// ---------------------------------------------------------------------------
// Request body
// ---------------------------------------------------------------------------

/// A rendered request body plus the values that went into it.
#[derive(Debug, Clone, Default)]
pub struct RenderedBody {
    pub json: String,
    /// Reported key → value sent, for correlating with the collector reply.
    pub data: BTreeMap<String, String>,
}

/// Render `statuses` into a request body stamped with `clock`.
///
/// Each status's value and clock accessors are evaluated exactly once.
pub fn render_body(statuses: &[Status], clock: i64) -> RenderedBody {
    let mut json = String::with_capacity(64 + statuses.len() * 96);
    let mut data = BTreeMap::new();

    json.push_str("{\"request\":\"sender data\",\"clock\":");
    json.push_str(&clock.to_string());
    json.push_str(",\"data\":[");
    for (i, status) in statuses.iter().enumerate() {
        if i > 0 {
            json.push(',');
        }
        let value = status.value();
        let item_clock = status.clock();

        json.push_str("{\"clock\":");
        json.push_str(&item_clock.to_string());
        json.push_str(",\"host\":");
        escape_into(&status.host, &mut json);
        json.push_str(",\"key\":");
        escape_into(&status.key, &mut json);
        json.push_str(",\"value\":");
        escape_into(&value, &mut json);
        json.push('}');

        data.insert(status.key.clone(), value);
    }
    json.push_str("]}");

    RenderedBody { json, data }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// Response text sliced out of the collector's frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse {
    pub text: String,
    /// The header declared more body bytes than were received.
    pub truncated: bool,
}

impl ParsedResponse {
    fn empty() -> Self {
        Self {
            text: EMPTY_RESPONSE.to_string(),
            truncated: false,
        }
    }
}

/// Slice the body out of a raw response buffer.
///
/// Fewer than 13 bytes is "no usable reply" and yields `"[]"`. Bytes beyond
/// the declared length are ignored. When fewer bytes arrived than declared
/// the received part is used and the result is flagged as truncated; a
/// multi-byte character cut off by the truncation is dropped.
pub fn parse_response(buf: &[u8]) -> Result<ParsedResponse> {
    if buf.len() < HEADER_LEN {
        return Ok(ParsedResponse::empty());
    }
    let header = decode_header(buf)?;
    if header.flags & FLAG_COMPRESSED != 0 {
        return Err(Error::ProtocolDecode(
            "compressed responses are not supported".to_string(),
        ));
    }

    let received = &buf[HEADER_LEN..];
    let truncated = header.length > received.len() as u64;
    let body = if truncated {
        received
    } else {
        &received[..header.length as usize]
    };

    let text = match std::str::from_utf8(body) {
        Ok(s) => s.to_string(),
        Err(e) if truncated && e.error_len().is_none() => {
            String::from_utf8_lossy(&body[..e.valid_up_to()]).into_owned()
        }
        Err(e) => {
            return Err(Error::ProtocolDecode(format!(
                "response body is not UTF-8: {e}"
            )));
        }
    };

    Ok(ParsedResponse { text, truncated })
}
