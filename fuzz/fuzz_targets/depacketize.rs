// Copyright (C) 2024 Scott Lamb <slamb@slamb.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

#![no_main]
use libfuzzer_sys::fuzz_target;
use vpx_rtp::codec::{Codec, Depacketizer, VideoFrame};

fuzz_target!(|data: &[u8]| {
    let Some((&first, mut data)) = data.split_first() else {
        return;
    };
    let mut depacketizer = Depacketizer::with_codec(if first & 1 == 0 {
        Codec::Vp8
    } else {
        Codec::Vp9
    });
    let mut timestamp = 0u32;
    let mut sequence_number: u16 = 0;
    let mut frames: Vec<VideoFrame> = Vec::new();
    loop {
        let Some((hdr, rest)) = data.split_first() else {
            return;
        };
        let ts_change = (hdr & 0b001) != 0;
        let mark = (hdr & 0b010) != 0;
        let loss = (hdr & 0b100) != 0;
        let len = usize::from(hdr >> 3);
        if rest.len() < len {
            return;
        }
        let (payload, rest) = rest.split_at(len);
        data = rest;
        if loss {
            sequence_number = sequence_number.wrapping_add(1);
        }
        if ts_change {
            timestamp = timestamp.wrapping_add(1);
        }
        let pkt = vpx_rtp::rtp::ReceivedPacketBuilder {
            timestamp,
            ssrc: 0,
            sequence_number,
            payload_type: 96,
            mark,
        }
        .build(payload.iter().copied())
        .unwrap();
        let empty = payload.is_empty();
        let before = frames.len();
        match depacketizer.push(pkt, &mut frames) {
            Ok(()) => assert!(!empty),
            Err(_) => {
                assert!(empty);
                assert_eq!(frames.len(), before);
            }
        }
        if mark && !empty {
            assert!(frames.len() > before);
        }
        sequence_number = sequence_number.wrapping_add(1);
    }
});
