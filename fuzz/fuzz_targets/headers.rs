// Copyright (C) 2024 Scott Lamb <slamb@slamb.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

#![no_main]
use libfuzzer_sys::fuzz_target;
use vpx_rtp::codec::{vp8, vp9};

fuzz_target!(|data: &[u8]| {
    if let Ok(tag) = vp8::decode_frame_tag(data) {
        assert!(tag.first_part_size < 1 << 19);
        assert_eq!(vp8::is_key_frame(data), tag.frame_type == vp8::FrameType::Key);
    }
    let _ = vp8::get_resolution(data);
    let _ = vp8::create_vpcc_extradata(data);
    let _ = vp8::payload_descriptor_len(data);
    if let Ok(h) = vp9::parse_uncompressed_header(data) {
        assert!(h.profile <= 3);
        assert!(h.width >= 1 && h.height >= 1);
    }
    let _ = vp9::create_vpcc_extradata(data);
    if let Ok(len) = vp9::payload_descriptor_len(data) {
        assert!(len <= data.len());
    }
});
