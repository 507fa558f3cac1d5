// Copyright (C) 2024 Scott Lamb <slamb@slamb.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{fmt::Display, sync::Arc};

use bytes::Bytes;
use thiserror::Error;

use crate::codec::bits::BitstreamUnderflow;

/// An opaque `std::error::Error + Send + Sync + 'static` implementation.
///
/// The focus is on detailed human-readable messages; [`Error::kind`] offers
/// a coarse classification for callers which need to react programmatically.
#[derive(Clone)]
pub struct Error(pub(crate) Arc<ErrorInt>);

impl Error {
    /// Returns the broad category of this error.
    pub fn kind(&self) -> ErrorKind {
        match &*self.0 {
            ErrorInt::InvalidArgument(_) => ErrorKind::InvalidArgument,
            ErrorInt::InputTooShort { .. } => ErrorKind::InputTooShort,
            ErrorInt::InvalidStartCode { .. } => ErrorKind::InvalidStartCode,
            ErrorInt::BitstreamUnderflow(_) => ErrorKind::BitstreamUnderflow,
            ErrorInt::ParseError { .. } => ErrorKind::ParseError,
            ErrorInt::NotKeyFrame { .. } => ErrorKind::NotKeyFrame,
            ErrorInt::EmptyPayload { .. } => ErrorKind::EmptyPayload,
            ErrorInt::MalformedPayloadDescriptor { .. } => ErrorKind::MalformedPayloadDescriptor,
            ErrorInt::InvalidRtpPacket { .. } => ErrorKind::InvalidRtpPacket,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.0, f)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(&*self.0)
    }
}

impl From<BitstreamUnderflow> for Error {
    fn from(e: BitstreamUnderflow) -> Self {
        wrap!(ErrorInt::BitstreamUnderflow(e))
    }
}

/// Broad category of an [`Error`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The method's caller provided an invalid argument.
    InvalidArgument,

    /// The input was shorter than the structure being decoded.
    InputTooShort,

    /// A VP8 key frame lacked the `9d 01 2a` start code.
    InvalidStartCode,

    /// A bit read or skip went past the end of the buffer.
    BitstreamUnderflow,

    /// A VP9 uncompressed header was truncated.
    ParseError,

    /// The operation requires a key frame.
    NotKeyFrame,

    /// An RTP packet had no payload.
    EmptyPayload,

    /// An RTP payload was shorter than its payload descriptor claims.
    MalformedPayloadDescriptor,

    /// A raw RTP packet failed validation.
    InvalidRtpPacket,
}

#[derive(Debug, Error)]
pub(crate) enum ErrorInt {
    /// The method's caller provided an invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{what} needs at least {needed} bytes; got {len}")]
    InputTooShort {
        what: &'static str,
        needed: usize,
        len: usize,
    },

    #[error("VP8 key frame has start code {found:02x?}; expected [9d, 01, 2a]")]
    InvalidStartCode { found: [u8; 3] },

    #[error(transparent)]
    BitstreamUnderflow(BitstreamUnderflow),

    #[error("Unable to parse VP9 uncompressed header at {field}: {source}")]
    ParseError {
        field: &'static str,
        source: BitstreamUnderflow,
    },

    #[error("{codec} frame is not a key frame")]
    NotKeyFrame { codec: &'static str },

    #[error("Empty payload at seq={sequence_number:04x} ts={timestamp}")]
    EmptyPayload { sequence_number: u16, timestamp: u32 },

    #[error(
        "{codec} payload descriptor needs {needed} bytes; payload has {len}:\n{:?}",
        crate::hex::LimitedHex::new(payload, 16)
    )]
    MalformedPayloadDescriptor {
        codec: &'static str,
        needed: usize,
        len: usize,
        payload: Bytes,
    },

    #[error(
        "Invalid RTP packet: {reason}\n{:?}",
        crate::hex::LimitedHex::new(data, 64)
    )]
    InvalidRtpPacket { reason: &'static str, data: Bytes },
}
