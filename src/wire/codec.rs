// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Ghost Frame wire codec.
//!
//! On-air payload layout: `GF|TYPE|MSG_ID|SEQ|DATA`, `|`-delimited, with
//! `TYPE` two decimal digits and `MSG_ID`/`SEQ` four decimal digits.
//! `DATA` is "everything after the fourth `|`" so embedded `|` bytes in the
//! logical payload survive unharmed. `DATA` itself is the base64 encoding of
//! an AES-256-CBC ciphertext (see [`crate::wire::crypto`]); empty logical
//! data encodes to an empty `DATA` field with no encryption performed.

use crate::error::CodecError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use super::crypto;

const PREFIX: &str = "GF";

/// The closed set of Ghost Frame message types. Numeric values are the wire
/// values and must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MsgType {
    HandshakeReq = 1,
    HandshakeAck = 2,
    Msg = 3,
    MsgAck = 4,
    MsgRetry = 5,
    Rename = 6,
    RenameAck = 7,
    FileInit = 8,
    FileChunk = 9,
    FileEnd = 10,
    FileAck = 11,
    Heartbeat = 12,
    Terminate = 13,
}

impl MsgType {
    fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            1 => Self::HandshakeReq,
            2 => Self::HandshakeAck,
            3 => Self::Msg,
            4 => Self::MsgAck,
            5 => Self::MsgRetry,
            6 => Self::Rename,
            7 => Self::RenameAck,
            8 => Self::FileInit,
            9 => Self::FileChunk,
            10 => Self::FileEnd,
            11 => Self::FileAck,
            12 => Self::Heartbeat,
            13 => Self::Terminate,
            _ => return None,
        })
    }

    /// Types subject to `(addr2, msg_id, seq)` duplicate suppression in the
    /// router (§4.3 step 1). Ack/control-only types are excluded: replaying
    /// an ack is harmless, so there is no need to remember it.
    pub fn requires_dedup(self) -> bool {
        matches!(
            self,
            Self::HandshakeReq | Self::HandshakeAck | Self::Msg | Self::FileInit | Self::FileChunk | Self::FileEnd
        )
    }
}

/// A decoded, decrypted Ghost Frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub msg_type: MsgType,
    pub msg_id: u32,
    pub seq: u32,
    pub data: String,
}

/// Build the on-air payload bytes for a frame, encrypting `data` first.
pub fn encode(msg_type: MsgType, msg_id: u32, seq: u32, data: &str) -> Vec<u8> {
    let encrypted = crypto::encrypt(data.as_bytes());
    let data_field = if encrypted.is_empty() {
        String::new()
    } else {
        BASE64.encode(encrypted)
    };

    format!(
        "{PREFIX}|{:02}|{:04}|{:04}|{}",
        msg_type as u8, msg_id, seq, data_field
    )
    .into_bytes()
}

/// Parse and decrypt an on-air payload. Never panics; any malformed input
/// yields a [`CodecError`] for the caller to log and drop.
pub fn decode(payload: &[u8]) -> Result<Frame, CodecError> {
    let text = std::str::from_utf8(payload).map_err(|_| CodecError::BadPrefix)?;

    let mut parts = text.splitn(5, '|');
    let prefix = parts.next().ok_or(CodecError::BadPrefix)?;
    if prefix != PREFIX {
        return Err(CodecError::BadPrefix);
    }

    let type_field = parts.next().ok_or(CodecError::TooFewFields)?;
    let msg_id_field = parts.next().ok_or(CodecError::TooFewFields)?;
    let seq_field = parts.next().ok_or(CodecError::TooFewFields)?;
    let data_field = parts.next().unwrap_or("");

    let type_num: u8 = type_field
        .parse()
        .map_err(|_| CodecError::UnknownType(type_field.to_string()))?;
    let msg_type = MsgType::from_u8(type_num).ok_or_else(|| CodecError::UnknownType(type_field.to_string()))?;

    let msg_id: u32 = msg_id_field.parse().map_err(|_| CodecError::BadInteger("MSG_ID"))?;
    let seq: u32 = seq_field.parse().map_err(|_| CodecError::BadInteger("SEQ"))?;

    let data = if data_field.is_empty() {
        String::new()
    } else {
        let ciphertext = BASE64.decode(data_field).map_err(|_| CodecError::BadBase64)?;
        let plaintext = crypto::decrypt(&ciphertext)?;
        String::from_utf8(plaintext).map_err(|_| CodecError::Decrypt)?
    };

    Ok(Frame {
        msg_type,
        msg_id,
        seq,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(msg_type: MsgType, msg_id: u32, seq: u32, data: &str) {
        let wire = encode(msg_type, msg_id, seq, data);
        let frame = decode(&wire).expect("decode should succeed");
        assert_eq!(frame.msg_type, msg_type);
        assert_eq!(frame.msg_id, msg_id);
        assert_eq!(frame.seq, seq);
        assert_eq!(frame.data, data);
    }

    #[test]
    fn round_trips_plain_ascii() {
        round_trip(MsgType::Msg, 1, 1, "hello");
    }

    #[test]
    fn round_trips_empty_data() {
        round_trip(MsgType::Heartbeat, 42, 7, "");
    }

    #[test]
    fn round_trips_multibyte_utf8() {
        round_trip(MsgType::Msg, 3, 1, "hello \u{1F47B} world");
    }

    #[test]
    fn round_trips_embedded_pipes() {
        round_trip(MsgType::FileInit, 5, 1, "weird|file|name.txt|12345");
    }

    #[test]
    fn wire_format_matches_fixed_width_header() {
        let wire = encode(MsgType::Msg, 7, 12, "x");
        let text = std::str::from_utf8(&wire).unwrap();
        let header: Vec<&str> = text.splitn(5, '|').collect();
        assert_eq!(header[0], "GF");
        assert_eq!(header[1], "03");
        assert_eq!(header[2], "0007");
        assert_eq!(header[3], "0012");
    }

    #[test]
    fn rejects_bad_prefix() {
        assert_eq!(decode(b"XX|03|0001|0001|hi"), Err(CodecError::BadPrefix));
    }

    #[test]
    fn rejects_too_few_fields() {
        assert_eq!(decode(b"GF|03|0001"), Err(CodecError::TooFewFields));
    }

    #[test]
    fn rejects_unknown_type() {
        assert_eq!(
            decode(b"GF|99|0001|0001|"),
            Err(CodecError::UnknownType("99".to_string()))
        );
    }

    #[test]
    fn rejects_garbage_base64() {
        assert_eq!(decode(b"GF|03|0001|0001|not valid base64!!"), Err(CodecError::BadBase64));
    }
}
