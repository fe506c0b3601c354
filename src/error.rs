// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for the Ghost Frame messenger.
//!
//! The codec and the public messenger API get separate error types: a codec
//! error never escapes the router (it is logged and the frame is dropped),
//! while a messenger error is surfaced to the operator CLI or bridge caller.

use std::fmt;
use std::io;

/// Failure parsing or decrypting a single on-air frame payload.
///
/// Never propagated past the router: callers log it at `debug` and move on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Payload did not start with the `GF|` prefix.
    BadPrefix,
    /// Payload had fewer than the four required `|`-delimited fields.
    TooFewFields,
    /// The `TYPE` field was not a recognized two-digit message type.
    UnknownType(String),
    /// The `MSG_ID` or `SEQ` field was not a valid decimal integer.
    BadInteger(&'static str),
    /// `DATA` was not valid base64.
    BadBase64,
    /// Decryption or PKCS#7 unpadding failed.
    Decrypt,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadPrefix => write!(f, "payload missing GF| prefix"),
            Self::TooFewFields => write!(f, "payload has fewer than four fields"),
            Self::UnknownType(s) => write!(f, "unknown frame type {s:?}"),
            Self::BadInteger(field) => write!(f, "field {field} is not a valid integer"),
            Self::BadBase64 => write!(f, "DATA field is not valid base64"),
            Self::Decrypt => write!(f, "decryption failed"),
        }
    }
}

impl std::error::Error for CodecError {}

/// Failure reported back to an operator or bridge caller.
#[derive(Debug)]
pub enum MessengerError {
    /// `send_message`/`send_file`/`rename` targeted a peer id not in the table.
    UnknownPeer(String),
    /// A filesystem or socket operation failed.
    Io(io::Error),
    /// A frame could not be decoded (surfaced only where the caller needs to know).
    Codec(CodecError),
}

impl fmt::Display for MessengerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownPeer(id) => write!(f, "Unknown peer ID: {id}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Codec(e) => write!(f, "codec error: {e}"),
        }
    }
}

impl std::error::Error for MessengerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Codec(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for MessengerError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<CodecError> for MessengerError {
    fn from(e: CodecError) -> Self {
        Self::Codec(e)
    }
}
