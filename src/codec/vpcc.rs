// Copyright (C) 2024 Scott Lamb <slamb@slamb.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Creates a `VPCodecConfigurationRecord`, the body of an `.mp4` `vpcC` box,
//! as defined in the [VP Codec ISO Media File Format
//! Binding](https://www.webmproject.org/vp9/mp4/).

use bytes::{BufMut, Bytes, BytesMut};

/// Length of a serialized record without codec initialization data.
pub const RECORD_LEN: usize = 8;

/// `colour_primaries`, `transfer_characteristics`, and `matrix_coefficients`
/// value meaning "unspecified" (ISO/IEC 23091-2).
pub const UNSPECIFIED: u8 = 2;

/// Codec configuration for a VP8 or VP9 stream.
///
/// This is built from a key frame's leading bytes. VP8 and VP9 never carry
/// codec initialization data, so `codecInitializationDataSize` is always 0.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct VpcCRecord {
    pub profile: u8,
    pub level: u8,

    /// Bits per sample; 8, 10, or 12. Only the low 4 bits are serialized.
    pub bit_depth: u8,

    /// 0 and 1 are 4:2:0 (vertical/colocated); 2 is 4:2:2; 3 is 4:4:4. Only
    /// the low 3 bits are serialized.
    pub chroma_subsampling: u8,

    /// 1 for full range, 0 for studio range.
    pub video_full_range_flag: u8,
    pub colour_primaries: u8,
    pub transfer_characteristics: u8,
    pub matrix_coefficients: u8,
}

impl VpcCRecord {
    /// Returns the `codecInitializationDataSize`, which is always 0.
    pub fn codec_init_data_size(&self) -> u16 {
        0
    }

    /// Serializes into the 8-byte record.
    ///
    /// This is only the record: the caller wraps it in a `FullBox('vpcC',
    /// version = 1, flags = 0)` header when writing an `.mp4` file.
    ///
    /// ```text
    /// unsigned int(8)  profile;
    /// unsigned int(8)  level;
    /// unsigned int(4)  bitDepth;
    /// unsigned int(3)  chromaSubsampling;
    /// unsigned int(1)  videoFullRangeFlag;
    /// unsigned int(8)  colourPrimaries;
    /// unsigned int(8)  transferCharacteristics;
    /// unsigned int(8)  matrixCoefficients;
    /// unsigned int(16) codecInitializationDataSize;
    /// ```
    pub fn to_bytes(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(RECORD_LEN);
        out.put_u8(self.profile);
        out.put_u8(self.level);
        out.put_u8(
            ((self.bit_depth & 0x0f) << 4)
                | ((self.chroma_subsampling & 0x07) << 1)
                | (self.video_full_range_flag & 0x01),
        );
        out.put_u8(self.colour_primaries);
        out.put_u8(self.transfer_characteristics);
        out.put_u8(self.matrix_coefficients);
        out.put_u16(self.codec_init_data_size());
        debug_assert_eq!(out.len(), RECORD_LEN);
        out.freeze()
    }

    /// Returns the codec string as in the binding's "Codecs Parameter String"
    /// section, eg `vp09.02.00.10`.
    pub(crate) fn rfc6381_codec(&self, fourcc: &str) -> String {
        format!(
            "{}.{:02}.{:02}.{:02}",
            fourcc, self.profile, self.level, self.bit_depth
        )
    }
}
