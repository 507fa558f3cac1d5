// Copyright (C) 2024 Scott Lamb <slamb@slamb.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! [VP8](https://datatracker.ietf.org/doc/html/rfc6386) frame headers, and the
//! payload descriptor from the RTP format in
//! [RFC 7741](https://datatracker.ietf.org/doc/html/rfc7741).
//!
//! Everything here works on fixed byte offsets and masks; VP8's frame header
//! needs no bit reader.

use bytes::Bytes;

use super::vpcc::{VpcCRecord, UNSPECIFIED};
use crate::error::ErrorInt;
use crate::Error;

/// The 3-byte start code which follows the frame tag of a key frame.
pub const START_CODE: [u8; 3] = [0x9d, 0x01, 0x2a];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrameType {
    Key,
    Inter,
}

/// The 3-byte frame tag which starts every VP8 frame (RFC 6386 section 9.1).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FrameTag {
    pub frame_type: FrameType,

    /// 3-bit version number, used as the `vpcC` profile.
    pub version: u8,

    /// The `show_frame` flag.
    pub display: bool,

    /// Size of the first data partition in bytes, excluding the tag and
    /// key frame header. 19 bits.
    pub first_part_size: u32,
}

/// The 7 bytes following the tag of a key frame (RFC 6386 section 9.1).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct KeyFrameHead {
    pub width: u16,
    pub height: u16,
    pub horiz_scale: u8,
    pub vert_scale: u8,
}

/// Decodes the frame tag from the first 3 bytes of `frame`.
///
/// The tag is stored little-endian: byte 0 holds the *least* significant
/// bits. So `frame[0] & 1` is the frame type, not the top bit of anything.
///
/// ```text
///  bit  0       frame type (0 = key frame)
///  bits 1..=3   version
///  bit  4       show_frame
///  bits 5..=23  first_part_size
/// ```
pub fn decode_frame_tag(frame: &[u8]) -> Result<FrameTag, Error> {
    let &[b0, b1, b2, ..] = frame else {
        bail!(ErrorInt::InputTooShort {
            what: "VP8 frame tag",
            needed: 3,
            len: frame.len(),
        });
    };
    let raw = u32::from_le_bytes([b0, b1, b2, 0]);
    Ok(FrameTag {
        frame_type: if raw & 0x01 == 0 {
            FrameType::Key
        } else {
            FrameType::Inter
        },
        version: ((raw >> 1) & 0x07) as u8,
        display: (raw >> 4) & 0x01 != 0,
        first_part_size: (raw >> 5) & 0x7_ffff,
    })
}

/// Returns true iff `frame` starts with a key frame's tag.
///
/// A frame too short to hold a tag is simply not a key frame.
pub fn is_key_frame(frame: &[u8]) -> bool {
    matches!(
        decode_frame_tag(frame),
        Ok(FrameTag {
            frame_type: FrameType::Key,
            ..
        })
    )
}

/// Decodes the key frame header from the bytes *after* the 3-byte tag.
///
/// ```text
///  0..3   start code 9d 01 2a
///  3..5   little-endian: 14-bit width, 2-bit horizontal scale
///  5..7   little-endian: 14-bit height, 2-bit vertical scale
/// ```
pub fn decode_key_frame_head(after_tag: &[u8]) -> Result<KeyFrameHead, Error> {
    let Some(h) = after_tag.get(..7) else {
        bail!(ErrorInt::InputTooShort {
            what: "VP8 key frame header",
            needed: 7,
            len: after_tag.len(),
        });
    };
    if h[..3] != START_CODE {
        bail!(ErrorInt::InvalidStartCode {
            found: [h[0], h[1], h[2]],
        });
    }
    let w = u16::from_le_bytes([h[3], h[4]]);
    let v = u16::from_le_bytes([h[5], h[6]]);
    Ok(KeyFrameHead {
        width: w & 0x3fff,
        horiz_scale: (w >> 14) as u8,
        height: v & 0x3fff,
        vert_scale: (v >> 14) as u8,
    })
}

/// Returns the coded `(width, height)` of a key frame.
pub fn get_resolution(frame: &[u8]) -> Result<(u32, u32), Error> {
    if !is_key_frame(frame) {
        bail!(ErrorInt::NotKeyFrame { codec: "VP8" });
    }
    let head = decode_key_frame_head(&frame[3..])?;
    Ok((u32::from(head.width), u32::from(head.height)))
}

/// Builds a `vpcC` record from a key frame.
///
/// VP8 has no levels and is always 8-bit 4:2:0. It's conventionally full
/// range, unlike VP9 (see [`super::vp9::create_vpcc_extradata`]).
pub fn create_vpcc_extradata(keyframe: &[u8]) -> Result<VpcCRecord, Error> {
    let tag = match decode_frame_tag(keyframe) {
        Ok(tag @ FrameTag {
            frame_type: FrameType::Key,
            ..
        }) => tag,
        _ => bail!(ErrorInt::NotKeyFrame { codec: "VP8" }),
    };
    Ok(VpcCRecord {
        profile: tag.version,
        level: 0,
        bit_depth: 8,
        chroma_subsampling: 0,
        video_full_range_flag: 1,
        colour_primaries: UNSPECIFIED,
        transfer_characteristics: UNSPECIFIED,
        matrix_coefficients: UNSPECIFIED,
    })
}

/// Returns the length of the RFC 7741 section 4.2 payload descriptor which
/// starts `payload`.
///
/// ```text
///       0 1 2 3 4 5 6 7
///      +-+-+-+-+-+-+-+-+
///      |X|R|N|S|R| PID | (REQUIRED)
///      +-+-+-+-+-+-+-+-+
/// X:   |I|L|T|K| RSV   | (OPTIONAL)
///      +-+-+-+-+-+-+-+-+
/// I:   |M| PictureID   | (OPTIONAL)
///      +-+-+-+-+-+-+-+-+
///      |   PictureID   | (present iff M)
///      +-+-+-+-+-+-+-+-+
/// L:   |   TL0PICIDX   | (OPTIONAL)
///      +-+-+-+-+-+-+-+-+
/// T/K: |TID|Y| KEYIDX  | (OPTIONAL)
///      +-+-+-+-+-+-+-+-+
/// ```
pub fn payload_descriptor_len(payload: &[u8]) -> Result<usize, Error> {
    let mut len = 1;
    if let Some(&b0) = payload.first() {
        if b0 & 0x80 != 0 {
            len += 1;
            if let Some(&x) = payload.get(1) {
                if x & 0x80 != 0 {
                    // The M bit is in the first picture ID byte. If that byte is
                    // missing, the descriptor is at least one byte too long already.
                    len += match payload.get(len) {
                        Some(&pid) if pid & 0x80 != 0 => 2,
                        _ => 1,
                    };
                }
                if x & 0x40 != 0 {
                    len += 1;
                }
                if x & 0x30 != 0 {
                    len += 1;
                }
            }
        }
    }
    if payload.len() < len {
        bail!(ErrorInt::MalformedPayloadDescriptor {
            codec: "VP8",
            needed: len,
            len: payload.len(),
            payload: Bytes::copy_from_slice(payload),
        });
    }
    Ok(len)
}
