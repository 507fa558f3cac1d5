// Copyright (C) 2024 Scott Lamb <slamb@slamb.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Handles RTP data as described in
//! [RFC 3550 section 5.1](https://datatracker.ietf.org/doc/html/rfc3550#section-5.1).
//!
//! The depacketizer needs only the sequence number, timestamp, marker bit, and
//! payload of each packet. [`ReceivedPacket`] validates a raw datagram once and
//! then provides cheap accessors for those fields.

use std::convert::TryFrom;
use std::ops::Range;

use bytes::{Buf, Bytes};

use crate::error::ErrorInt;
use crate::Error;

/// The minimum length of an RTP header (no CSRCs or extensions).
const MIN_HEADER_LEN: u16 = 12;

fn invalid(data: Bytes, reason: &'static str) -> Error {
    wrap!(ErrorInt::InvalidRtpPacket { reason, data })
}

/// A validated RTP packet.
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |V=2|P|X|  CC   |M|     PT      |       sequence number         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                           timestamp                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |           synchronization source (SSRC) identifier            |
/// +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
/// |            contributing source (CSRC) identifiers             |
/// |                             ....                              |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Clone)]
pub struct ReceivedPacket {
    /// Full packet data, including headers.
    raw: Bytes,
    payload_range: Range<u16>,
}

impl ReceivedPacket {
    /// Validates a raw RTP packet.
    ///
    /// Only the fixed header, CSRC list, header extension length, and padding
    /// are checked. The payload itself is left to the depacketizer.
    pub fn parse(data: Bytes) -> Result<Self, Error> {
        // UDP datagrams, even fragmented ones, are at most 65,535 bytes.
        let Ok(len) = u16::try_from(data.len()) else {
            return Err(invalid(data, "too long"));
        };
        if len < MIN_HEADER_LEN {
            return Err(invalid(data, "too short"));
        }
        let b0 = data[0];
        if b0 >> 6 != 2 {
            return Err(invalid(data, "must be version 2"));
        }
        let mut payload_start = MIN_HEADER_LEN + 4 * u16::from(b0 & 0b0000_1111);
        if (b0 & 0b0001_0000) != 0 {
            // 16-bit profile-defined id, then 16-bit length in 32-bit words.
            let ext_start = usize::from(payload_start);
            let Some(&[_, _, hi, lo]) = data.get(ext_start..ext_start + 4) else {
                return Err(invalid(data, "extension is after end of packet"));
            };
            let words = u32::from(u16::from_be_bytes([hi, lo]));
            let Ok(s) = u16::try_from(u32::from(payload_start) + 4 + 4 * words) else {
                return Err(invalid(data, "extension extends beyond maximum packet size"));
            };
            payload_start = s;
        }
        if len < payload_start {
            return Err(invalid(data, "payload start is after end of packet"));
        }
        let mut payload_end = len;
        if (b0 & 0b0010_0000) != 0 {
            // The last byte counts the padding, itself included.
            let padding = match data.last() {
                Some(&p) if len > payload_start => u16::from(p),
                _ => return Err(invalid(data, "missing padding")),
            };
            if padding == 0 {
                return Err(invalid(data, "invalid padding length 0"));
            }
            payload_end = match len.checked_sub(padding) {
                Some(e) if e >= payload_start => e,
                _ => return Err(invalid(data, "padding larger than payload")),
            };
        }
        Ok(Self {
            raw: data,
            payload_range: payload_start..payload_end,
        })
    }

    #[inline]
    pub fn mark(&self) -> bool {
        (self.raw[1] & 0b1000_0000) != 0
    }

    #[inline]
    pub fn payload_type(&self) -> u8 {
        self.raw[1] & 0b0111_1111
    }

    #[inline]
    pub fn sequence_number(&self) -> u16 {
        u16::from_be_bytes([self.raw[2], self.raw[3]])
    }

    #[inline]
    pub fn timestamp(&self) -> u32 {
        u32::from_be_bytes([self.raw[4], self.raw[5], self.raw[6], self.raw[7]])
    }

    #[inline]
    pub fn ssrc(&self) -> u32 {
        u32::from_be_bytes([self.raw[8], self.raw[9], self.raw[10], self.raw[11]])
    }

    /// Returns the raw bytes, including the RTP headers.
    #[inline]
    pub fn raw(&self) -> &[u8] {
        &self.raw[..]
    }

    /// Returns only the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.raw[usize::from(self.payload_range.start)..usize::from(self.payload_range.end)]
    }

    /// Consumes the packet and returns the payload without copying.
    #[inline]
    pub fn into_payload_bytes(self) -> Bytes {
        let mut data = self.raw;
        data.truncate(usize::from(self.payload_range.end));
        data.advance(usize::from(self.payload_range.start));
        data
    }
}

impl std::fmt::Debug for ReceivedPacket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceivedPacket")
            .field("ssrc", &format_args!("{:08x}", self.ssrc()))
            .field("sequence_number", &self.sequence_number())
            .field("timestamp", &self.timestamp())
            .field("mark", &self.mark())
            .field("payload_type", &self.payload_type())
            .field("payload", &crate::hex::LimitedHex::new(self.payload(), 64))
            .finish()
    }
}

/// Builds a [`ReceivedPacket`] from already-decoded header fields.
///
/// This is the way in for callers whose RTP stack has already split off the
/// header, as well as for tests, benchmarks, and fuzzing.
#[derive(Copy, Clone, Debug)]
pub struct ReceivedPacketBuilder {
    pub sequence_number: u16,
    pub timestamp: u32,
    pub payload_type: u8,
    pub ssrc: u32,
    pub mark: bool,
}

impl ReceivedPacketBuilder {
    pub fn build<P: IntoIterator<Item = u8>>(self, payload: P) -> Result<ReceivedPacket, Error> {
        if self.payload_type >= 0x80 {
            bail!(ErrorInt::InvalidArgument(format!(
                "payload type {} too large",
                self.payload_type
            )));
        }
        let raw: Bytes = [
            2 << 6, // version=2, no padding, no extensions, no CSRCs.
            if self.mark { 0b1000_0000 } else { 0 } | self.payload_type,
        ]
        .into_iter()
        .chain(self.sequence_number.to_be_bytes())
        .chain(self.timestamp.to_be_bytes())
        .chain(self.ssrc.to_be_bytes())
        .chain(payload)
        .collect();
        let Ok(len) = u16::try_from(raw.len()) else {
            bail!(ErrorInt::InvalidArgument(format!(
                "{}-byte packet too long",
                raw.len()
            )));
        };
        Ok(ReceivedPacket {
            raw,
            payload_range: MIN_HEADER_LEN..len,
        })
    }
}
