// Copyright (C) 2024 Scott Lamb <slamb@slamb.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! [VP9](https://www.webmproject.org/vp9/) uncompressed headers, and the
//! payload descriptor from the RTP format in
//! [RFC 9628](https://datatracker.ietf.org/doc/html/rfc9628).
//!
//! Only as much of the uncompressed header is parsed as needed to find the
//! frame size. Loop filter, quantization, and segmentation parameters are
//! never reached.

use bytes::Bytes;

use super::bits::{BitReader, BitstreamUnderflow};
use super::vpcc::{VpcCRecord, UNSPECIFIED};
use crate::error::ErrorInt;
use crate::Error;

/// `color_space` value for sRGB, which has no `color_range` bit.
const CS_RGB: u8 = 7;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrameType {
    Key,
    NonKey,
}

/// The leading fields of a VP9 uncompressed header.
///
/// Fields between `color_space` and the frame size are skipped rather than
/// retained.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct UncompressedHeader {
    pub profile: u8,
    pub show_existing_frame: bool,
    pub frame_type: FrameType,
    pub color_space: u8,
    pub width: u32,
    pub height: u32,
}

/// Returns true iff the first byte of `frame` describes a key frame.
///
/// ```text
/// bits 7..=6  frame_marker, always 0b10
/// bits 5..=4  profile
/// bit  3      show_existing_frame
/// bit  2      frame_type (0 for key frame)
/// bit  1      show_frame
/// bit  0      error_resilient_mode
/// ```
///
/// A frame which shows an existing frame has a different header layout and
/// is never considered a key frame.
pub fn is_key_frame(frame: &[u8]) -> bool {
    let Some(&b) = frame.first() else {
        return false;
    };
    (b & 0b1100_0000) == 0b1000_0000 && (b & 0b0000_1000) == 0 && (b & 0b0000_0100) == 0
}

/// Wraps a [`BitReader`], naming each field so failures say where the header ended.
struct HeaderReader<'a>(BitReader<'a>);

impl HeaderReader<'_> {
    fn read(&mut self, bit_count: u32, field: &'static str) -> Result<u32, Error> {
        self.0.read_bits(bit_count).map_err(|e| parse_error(field, e))
    }

    fn read_bool(&mut self, field: &'static str) -> Result<bool, Error> {
        self.0.read_bool().map_err(|e| parse_error(field, e))
    }

    fn skip(&mut self, bit_count: u32, field: &'static str) -> Result<(), Error> {
        self.0.skip_bits(bit_count).map_err(|e| parse_error(field, e))
    }
}

fn parse_error(field: &'static str, source: BitstreamUnderflow) -> Error {
    wrap!(ErrorInt::ParseError { field, source })
}

/// Parses the uncompressed header of a key frame up to and including the frame size.
///
/// The caller is expected to have checked [`is_key_frame`]. In particular,
/// the frame marker and sync code are skipped, not validated.
pub fn parse_uncompressed_header(frame: &[u8]) -> Result<UncompressedHeader, Error> {
    let mut r = HeaderReader(BitReader::new(frame));
    r.skip(2, "frame_marker")?;
    let profile_high = r.read(1, "profile_high_bit")?;
    let profile_low = r.read(1, "profile_low_bit")?;
    let profile = ((profile_high << 1) | profile_low) as u8;
    if profile == 3 {
        r.skip(1, "reserved_zero")?;
    }

    let show_existing_frame = r.read_bool("show_existing_frame")?;
    if show_existing_frame {
        // Not a key frame header; the size read below is meaningless.
        r.skip(3, "frame_to_show_map_idx")?;
    }

    let frame_type = if r.read_bool("frame_type")? {
        FrameType::NonKey
    } else {
        FrameType::Key
    };
    r.skip(1, "show_frame")?;
    r.skip(1, "error_resilient_mode")?;
    r.skip(24, "frame_sync_code")?;

    // color_config()
    if profile >= 2 && r.read_bool("high_bitdepth")? {
        r.skip(1, "twelve_bit")?;
    }
    let color_space = r.read(3, "color_space")? as u8;
    if color_space != CS_RGB {
        r.skip(1, "color_range")?;
        if profile == 1 || profile == 3 {
            r.skip(2, "subsampling_x/subsampling_y")?;
            r.skip(1, "reserved_zero")?;
        }
    } else if profile == 1 || profile == 3 {
        r.skip(1, "reserved_zero")?;
    }

    // frame_size() and the render size, which is skipped.
    if r.read_bool("render_and_frame_size_different")? {
        r.skip(32, "render_width_minus_1/render_height_minus_1")?;
    }
    let width = r.read(16, "frame_width_minus_1")? + 1;
    let height = r.read(16, "frame_height_minus_1")? + 1;
    Ok(UncompressedHeader {
        profile,
        show_existing_frame,
        frame_type,
        color_space,
        width,
        height,
    })
}

/// Returns the `(width, height)` of a key frame.
pub fn get_resolution(frame: &[u8]) -> Result<(u32, u32), Error> {
    let h = parse_uncompressed_header(frame)?;
    Ok((h.width, h.height))
}

/// Builds a `vpcC` record from a key frame's first byte.
///
/// Only byte 0 is consulted:
///
/// *   `profile` comes straight from bits 4 and 5 of byte 0, which is right
///     only for profiles 0 through 2. Profile 3's extra bit isn't consulted.
/// *   `bit_depth` is 10 for profiles 2 and 3 and 8 otherwise, without looking
///     at the header's bit depth flag.
/// *   `video_full_range_flag` is 0 (studio range). This differs from VP8's
///     record, which says full range.
pub fn create_vpcc_extradata(keyframe: &[u8]) -> Result<VpcCRecord, Error> {
    let Some(&b) = keyframe.first() else {
        bail!(ErrorInt::InputTooShort {
            what: "VP9 frame header",
            needed: 1,
            len: 0,
        });
    };
    let profile = (b >> 4) & 0b11;
    Ok(VpcCRecord {
        profile,
        level: 0,
        bit_depth: if profile >= 2 { 10 } else { 8 },
        chroma_subsampling: 0,
        video_full_range_flag: 0,
        colour_primaries: UNSPECIFIED,
        transfer_characteristics: UNSPECIFIED,
        matrix_coefficients: UNSPECIFIED,
    })
}

/// Returns the length of the RFC 9628 section 4.2 payload descriptor which
/// starts `payload`.
///
/// ```text
///        0 1 2 3 4 5 6 7
///       +-+-+-+-+-+-+-+-+
///       |I|P|L|F|B|E|V|Z| (REQUIRED)
///       +-+-+-+-+-+-+-+-+
///  I:   |M| PICTURE ID  | (REQUIRED)
///       +-+-+-+-+-+-+-+-+
///  M:   | EXTENDED PID  | (RECOMMENDED)
///       +-+-+-+-+-+-+-+-+
///  L:   | TID |U| SID |D| (Conditionally RECOMMENDED)
///       +-+-+-+-+-+-+-+-+
///       |   TL0PICIDX   | (non-flexible mode only)
///       +-+-+-+-+-+-+-+-+
///  P,F: | P_DIFF      |N| (up to 3 times)
///       +-+-+-+-+-+-+-+-+
///  V:   | SS            |
///       | ..            |
///       +-+-+-+-+-+-+-+-+
/// ```
pub fn payload_descriptor_len(payload: &[u8]) -> Result<usize, Error> {
    let at = |i: usize| -> Result<u8, Error> {
        match payload.get(i) {
            Some(&b) => Ok(b),
            None => Err(wrap!(ErrorInt::MalformedPayloadDescriptor {
                codec: "VP9",
                needed: i + 1,
                len: payload.len(),
                payload: Bytes::copy_from_slice(payload),
            })),
        }
    };
    let b0 = at(0)?;
    let picture_id = b0 & 0x80 != 0;
    let inter_picture_predicted = b0 & 0x40 != 0;
    let layer_indices = b0 & 0x20 != 0;
    let flexible = b0 & 0x10 != 0;
    let scalability_structure = b0 & 0x02 != 0;
    let mut len = 1;
    if picture_id {
        len += if at(len)? & 0x80 != 0 { 2 } else { 1 };
    }
    if layer_indices {
        len += if flexible { 1 } else { 2 };
    }
    if flexible && inter_picture_predicted {
        for _ in 0..3 {
            let p_diff = at(len)?;
            len += 1;
            if p_diff & 0x01 == 0 {
                break;
            }
        }
    }
    if scalability_structure {
        // | N_S |Y|G|-|-|-|
        let ss = at(len)?;
        len += 1;
        let spatial_layers = usize::from(ss >> 5) + 1;
        if ss & 0x10 != 0 {
            len += 4 * spatial_layers; // WIDTH and HEIGHT, 16 bits each.
        }
        if ss & 0x08 != 0 {
            let pictures = at(len)?; // N_G
            len += 1;
            for _ in 0..pictures {
                // | T |U| R |-|-|
                let r = usize::from((at(len)? >> 2) & 0b11);
                len += 1 + r;
            }
        }
    }
    if payload.len() < len {
        // Reports the full length, unlike the per-byte checks above.
        at(len - 1)?;
    }
    Ok(len)
}
