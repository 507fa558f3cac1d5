// Copyright (C) 2024 Scott Lamb <slamb@slamb.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Codec-specific logic for VP8 and VP9.
//!
//! The header parsers in [`vp8`] and [`vp9`] operate on a single frame's
//! leading bytes. [`Depacketizer`] reassembles frames from a stream of RTP
//! packets and tracks the stream's [`VideoParameters`].

use bytes::{Bytes, BytesMut};
use log::{debug, trace};

use crate::error::ErrorInt;
use crate::hex::LimitedHex;
use crate::rtp::ReceivedPacket;
use crate::Error;

pub mod bits;
pub mod vp8;
pub mod vp9;
pub mod vpcc;

use vpcc::VpcCRecord;

/// The RTP clock rate for both VP8 and VP9, as required by RFC 7741 and RFC 9628.
pub const CLOCK_RATE: u32 = 90_000;

/// A supported video codec.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Codec {
    Vp8,
    Vp9,
}

impl Codec {
    pub fn name(self) -> &'static str {
        match self {
            Codec::Vp8 => "VP8",
            Codec::Vp9 => "VP9",
        }
    }

    /// The sample entry fourcc, which prefixes the RFC 6381 codec string.
    fn fourcc(self) -> &'static str {
        match self {
            Codec::Vp8 => "vp08",
            Codec::Vp9 => "vp09",
        }
    }

    pub fn is_key_frame(self, frame: &[u8]) -> bool {
        match self {
            Codec::Vp8 => vp8::is_key_frame(frame),
            Codec::Vp9 => vp9::is_key_frame(frame),
        }
    }

    /// Returns a key frame's `(width, height)`.
    pub fn resolution(self, frame: &[u8]) -> Result<(u32, u32), Error> {
        match self {
            Codec::Vp8 => vp8::get_resolution(frame),
            Codec::Vp9 => vp9::get_resolution(frame),
        }
    }

    pub fn vpcc_record(self, keyframe: &[u8]) -> Result<VpcCRecord, Error> {
        match self {
            Codec::Vp8 => vp8::create_vpcc_extradata(keyframe),
            Codec::Vp9 => vp9::create_vpcc_extradata(keyframe),
        }
    }

    /// Returns the length of the RTP payload descriptor starting `payload`.
    pub fn payload_descriptor_len(self, payload: &[u8]) -> Result<usize, Error> {
        match self {
            Codec::Vp8 => vp8::payload_descriptor_len(payload),
            Codec::Vp9 => vp9::payload_descriptor_len(payload),
        }
    }

    /// Describes the stream given one of its key frames.
    pub fn parameters(self, keyframe: &[u8]) -> Result<VideoParameters, Error> {
        let pixel_dimensions = self.resolution(keyframe)?;
        let vpcc = self.vpcc_record(keyframe)?;
        Ok(VideoParameters {
            codec: self,
            pixel_dimensions,
            rfc6381_codec: vpcc.rfc6381_codec(self.fourcc()),
            extra_data: vpcc.to_bytes(),
            vpcc,
        })
    }
}

/// Parameters of a video stream, as determined from its most recent key frame.
#[derive(Clone, PartialEq, Eq)]
pub struct VideoParameters {
    codec: Codec,
    pixel_dimensions: (u32, u32),
    rfc6381_codec: String,
    vpcc: VpcCRecord,
    extra_data: Bytes,
}

impl VideoParameters {
    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Returns a codec description in
    /// [RFC-6381](https://tools.ietf.org/html/rfc6381) form, eg `vp09.00.00.08`.
    pub fn rfc6381_codec(&self) -> &str {
        &self.rfc6381_codec
    }

    /// Returns the overall dimensions of the video frame in pixels, as `(width, height)`.
    pub fn pixel_dimensions(&self) -> (u32, u32) {
        self.pixel_dimensions
    }

    pub fn vpcc(&self) -> &VpcCRecord {
        &self.vpcc
    }

    /// The serialized `vpcC` record, as returned by [`VpcCRecord::to_bytes`].
    pub fn extra_data(&self) -> &Bytes {
        &self.extra_data
    }
}

impl std::fmt::Debug for VideoParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoParameters")
            .field("codec", &self.codec)
            .field("rfc6381_codec", &self.rfc6381_codec)
            .field("pixel_dimensions", &self.pixel_dimensions)
            .field("extra_data", &LimitedHex::new(&self.extra_data, 16))
            .finish()
    }
}

/// A single encoded video frame (aka picture or access unit).
pub struct VideoFrame {
    /// Set on a complete key frame whose parameters differ from the stream's previous ones.
    pub new_parameters: Option<VideoParameters>,

    /// This frame's RTP timestamp.
    pub timestamp: u32,

    /// True if any part of this frame may be missing or corrupt: a sequence
    /// number gap, a malformed payload descriptor, or a missing marker bit.
    pub lost: bool,

    pub is_key_frame: bool,

    data: Bytes,
}

impl VideoFrame {
    /// Returns the frame's data, with payload descriptors removed.
    #[inline]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    #[inline]
    pub fn into_data(self) -> Bytes {
        self.data
    }
}

impl std::fmt::Debug for VideoFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoFrame")
            .field("timestamp", &self.timestamp)
            .field("lost", &self.lost)
            .field("is_key_frame", &self.is_key_frame)
            .field("new_parameters", &self.new_parameters)
            .field("data", &LimitedHex::new(&self.data, 64))
            .finish()
    }
}

/// Receives output from a [`Depacketizer`].
pub trait Sink {
    /// Observes each packet with a non-empty payload, before it's processed.
    fn on_packet(&mut self, _pkt: &ReceivedPacket) {}

    /// Receives each completed frame, in order.
    fn on_frame(&mut self, frame: VideoFrame);
}

impl Sink for Vec<VideoFrame> {
    fn on_frame(&mut self, frame: VideoFrame) {
        self.push(frame);
    }
}

#[derive(Copy, Clone, Debug)]
enum DepacketizerInputState {
    /// Between frames: nothing has been received since the last marked packet.
    Idle,

    /// Accumulating the group of packets with the given timestamp.
    Building {
        timestamp: u32,
        last_sequence: u16,
        lost: bool,
    },
}

/// Turns RTP packets of a single stream into [`VideoFrame`]s.
///
/// Packets must be pushed in arrival order; they're never reordered.
/// Anomalies within the stream are reported through [`VideoFrame::lost`]
/// rather than as errors.
#[derive(Debug)]
pub struct Depacketizer {
    codec: Codec,
    input_state: DepacketizerInputState,

    /// Payload bytes of the current group; non-empty only while building.
    frame_buffer: BytesMut,
    parameters: Option<VideoParameters>,
}

impl Depacketizer {
    /// Creates a depacketizer from SDP-style media attributes, eg `("video", "VP8", 90000)`.
    pub fn new(media: &str, encoding_name: &str, clock_rate: u32) -> Result<Self, Error> {
        // RTP Payload Format Media Types
        // https://www.iana.org/assignments/rtp-parameters/rtp-parameters.xhtml#rtp-parameters-2
        let codec = match (media, encoding_name.to_ascii_lowercase().as_str()) {
            ("video", "vp8") => Codec::Vp8,
            ("video", "vp9") => Codec::Vp9,
            _ => bail!(ErrorInt::InvalidArgument(format!(
                "no depacketizer for media/encoding_name {media}/{encoding_name}"
            ))),
        };
        if clock_rate != CLOCK_RATE {
            bail!(ErrorInt::InvalidArgument(format!(
                "{} clock rate must be {CLOCK_RATE}; got {clock_rate}",
                codec.name()
            )));
        }
        Ok(Self::with_codec(codec))
    }

    pub fn with_codec(codec: Codec) -> Self {
        Depacketizer {
            codec,
            input_state: DepacketizerInputState::Idle,
            frame_buffer: BytesMut::new(),
            parameters: None,
        }
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Returns the parameters from the most recent complete key frame, if any.
    pub fn parameters(&self) -> Option<&VideoParameters> {
        self.parameters.as_ref()
    }

    /// Processes a single packet, sending any completed frame to `sink`.
    ///
    /// A frame is completed by a packet with the marker bit set, or, with
    /// `lost` set, by a packet which starts a new timestamp before the
    /// previous one was marked.
    ///
    /// Returns an error only for a packet with an empty payload, in which case
    /// neither `self` nor `sink` is touched.
    pub fn push<S: Sink + ?Sized>(
        &mut self,
        pkt: ReceivedPacket,
        sink: &mut S,
    ) -> Result<(), Error> {
        let seq = pkt.sequence_number();
        let ts = pkt.timestamp();
        if pkt.payload().is_empty() {
            bail!(ErrorInt::EmptyPayload {
                sequence_number: seq,
                timestamp: ts,
            });
        }
        sink.on_packet(&pkt);

        let mut lost = match self.input_state {
            DepacketizerInputState::Building {
                timestamp,
                last_sequence,
                lost,
            } if timestamp == ts => {
                if seq != last_sequence.wrapping_add(1) {
                    debug!(
                        "{} seq={:04x} follows {:04x} within ts={}; marking frame lost",
                        self.codec.name(),
                        seq,
                        last_sequence,
                        ts
                    );
                    true
                } else {
                    lost
                }
            }
            DepacketizerInputState::Building { timestamp, .. } => {
                if !self.frame_buffer.is_empty() {
                    debug!(
                        "{} ts={} seq={:04x} starts before ts={} was marked; flushing partial frame",
                        self.codec.name(),
                        ts,
                        seq,
                        timestamp
                    );
                    self.emit(timestamp, true, sink);
                }
                false
            }
            DepacketizerInputState::Idle => false,
        };

        let payload = pkt.payload();
        match self.codec.payload_descriptor_len(payload) {
            Ok(len) => self.frame_buffer.extend_from_slice(&payload[len..]),
            Err(e) => {
                debug!("seq={:04x} ts={}: {}", seq, ts, e);
                lost = true;
            }
        }

        if pkt.mark() {
            self.emit(ts, lost, sink);
            self.input_state = DepacketizerInputState::Idle;
        } else {
            self.input_state = DepacketizerInputState::Building {
                timestamp: ts,
                last_sequence: seq,
                lost,
            };
        }
        Ok(())
    }

    /// Hands the buffered frame to `sink`, leaving the buffer empty.
    fn emit<S: Sink + ?Sized>(&mut self, timestamp: u32, lost: bool, sink: &mut S) {
        let data = self.frame_buffer.split().freeze();
        let is_key_frame = self.codec.is_key_frame(&data);
        let new_parameters = if is_key_frame && !lost {
            self.update_parameters(&data)
        } else {
            None
        };
        trace!(
            "{} frame ts={} lost={} key={} len={}",
            self.codec.name(),
            timestamp,
            lost,
            is_key_frame,
            data.len()
        );
        sink.on_frame(VideoFrame {
            new_parameters,
            timestamp,
            lost,
            is_key_frame,
            data,
        });
    }

    /// Returns the key frame's parameters iff they differ from the stream's previous ones.
    fn update_parameters(&mut self, keyframe: &[u8]) -> Option<VideoParameters> {
        match self.codec.parameters(keyframe) {
            Ok(p) if self.parameters.as_ref() != Some(&p) => {
                debug!("{} parameters: {:?}", self.codec.name(), &p);
                self.parameters = Some(p.clone());
                Some(p)
            }
            Ok(_) => None,
            Err(e) => {
                debug!(
                    "unable to parse {} key frame parameters: {}",
                    self.codec.name(),
                    e
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtp::ReceivedPacketBuilder;
    use crate::testutil::{assert_eq_hex, init_logging};
    use crate::ErrorKind;

    /// A 176x144 VP8 key frame's leading bytes.
    const VP8_KEY_FRAME: &[u8] = b"\x50\x42\x00\x9d\x01\x2a\xb0\x00\x90\x00\x06\x47\x08\x85";

    /// A 1280x720 VP9 key frame's uncompressed header.
    const VP9_KEY_FRAME: &[u8] = b"\x82\x49\x83\x42\x20\x27\xf8\x16\x78";

    fn pkt(seq: u16, ts: u32, mark: bool, payload: &[u8]) -> ReceivedPacket {
        ReceivedPacketBuilder {
            sequence_number: seq,
            timestamp: ts,
            payload_type: 96,
            ssrc: 0x1234_5678,
            mark,
        }
        .build(payload.iter().copied())
        .unwrap()
    }

    fn vp8() -> Depacketizer {
        Depacketizer::new("video", "VP8", 90_000).unwrap()
    }

    #[test]
    fn single_packet_frame() {
        init_logging();
        let mut d = vp8();
        let mut frames = Vec::new();
        d.push(pkt(1, 1000, true, b"\x00\xaa\xbb"), &mut frames).unwrap();
        assert_eq!(frames.len(), 1);
        let f = &frames[0];
        assert_eq_hex!(f.data(), b"\xaa\xbb");
        assert_eq!(f.timestamp, 1000);
        assert!(!f.lost);
        assert!(!f.is_key_frame);
        assert!(f.new_parameters.is_none());
    }

    #[test]
    fn two_packet_frame() {
        init_logging();
        let mut d = vp8();
        let mut frames = Vec::new();
        d.push(pkt(10, 2000, false, b"\x10\x01\x02"), &mut frames).unwrap();
        assert!(frames.is_empty());
        d.push(pkt(11, 2000, true, b"\x00\x03"), &mut frames).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq_hex!(frames[0].data(), b"\x01\x02\x03");
        assert!(!frames[0].lost);
    }

    #[test]
    fn sequence_gap() {
        init_logging();
        let mut d = vp8();
        let mut frames = Vec::new();
        d.push(pkt(10, 2000, false, b"\x10\x01"), &mut frames).unwrap();
        d.push(pkt(12, 2000, true, b"\x00\x02"), &mut frames).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq_hex!(frames[0].data(), b"\x01\x02");
        assert!(frames[0].lost);

        // Loss doesn't carry into the next frame.
        d.push(pkt(13, 5000, true, b"\x10\x03"), &mut frames).unwrap();
        assert!(!frames[1].lost);
    }

    #[test]
    fn sequence_wraparound() {
        init_logging();
        let mut d = vp8();
        let mut frames = Vec::new();
        d.push(pkt(0xffff, 2000, false, b"\x10\x01"), &mut frames).unwrap();
        d.push(pkt(0x0000, 2000, true, b"\x00\x02"), &mut frames).unwrap();
        assert_eq!(frames.len(), 1);
        assert!(!frames[0].lost);
    }

    #[test]
    fn missing_marker() {
        init_logging();
        let mut d = vp8();
        let mut frames = Vec::new();
        d.push(pkt(1, 2000, false, b"\x10\x01"), &mut frames).unwrap();
        d.push(pkt(2, 5000, false, b"\x10\x02"), &mut frames).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].timestamp, 2000);
        assert!(frames[0].lost);
        assert_eq_hex!(frames[0].data(), b"\x01");

        d.push(pkt(3, 5000, true, b"\x00\x03"), &mut frames).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].timestamp, 5000);
        assert!(!frames[1].lost);
        assert_eq_hex!(frames[1].data(), b"\x02\x03");
    }

    #[test]
    fn long_picture_id() {
        init_logging();
        let mut d = vp8();
        let mut frames = Vec::new();
        let payload = b"\x90\x80\x81\x23\xaa\xbb\xcc";
        assert_eq!(Codec::Vp8.payload_descriptor_len(payload).unwrap(), 4);
        d.push(pkt(1, 2000, true, payload), &mut frames).unwrap();
        assert_eq_hex!(frames[0].data(), b"\xaa\xbb\xcc");
        assert_eq!(frames[0].data().len(), payload.len() - 4);
    }

    #[test]
    fn empty_payload() {
        init_logging();
        struct CountingSink(usize);
        impl Sink for CountingSink {
            fn on_packet(&mut self, _pkt: &ReceivedPacket) {
                self.0 += 1;
            }
            fn on_frame(&mut self, _frame: VideoFrame) {
                self.0 += 1;
            }
        }
        let mut d = vp8();
        let mut sink = CountingSink(0);
        d.push(pkt(1, 2000, false, b"\x10\x01"), &mut sink).unwrap();
        assert_eq!(sink.0, 1);
        let e = d.push(pkt(9, 2000, true, b""), &mut sink).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::EmptyPayload);
        assert_eq!(sink.0, 1);

        // The empty packet didn't update the sequence number or complete the frame.
        let mut frames = Vec::new();
        d.push(pkt(2, 2000, true, b"\x00\x02"), &mut frames).unwrap();
        assert_eq!(frames.len(), 1);
        assert!(!frames[0].lost);
        assert_eq_hex!(frames[0].data(), b"\x01\x02");
    }

    #[test]
    fn malformed_descriptor() {
        init_logging();
        let mut d = vp8();
        let mut frames = Vec::new();
        d.push(pkt(1, 2000, false, b"\x10\x01"), &mut frames).unwrap();
        d.push(pkt(2, 2000, false, b"\x80\x80"), &mut frames).unwrap();
        d.push(pkt(3, 2000, true, b"\x00\x03"), &mut frames).unwrap();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].lost);
        assert_eq_hex!(frames[0].data(), b"\x01\x03");
    }

    #[test]
    fn unmarked_empty_group_is_not_flushed() {
        init_logging();
        let mut d = vp8();
        let mut frames = Vec::new();
        d.push(pkt(1, 100, false, b"\x80"), &mut frames).unwrap();
        assert!(frames.is_empty());
        d.push(pkt(2, 200, true, b"\x10\x01"), &mut frames).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].timestamp, 200);
        assert!(!frames[0].lost);
        assert_eq_hex!(frames[0].data(), b"\x01");
    }

    #[test]
    fn marked_malformed_descriptor_emits_empty_frame() {
        init_logging();
        for codec in [Codec::Vp8, Codec::Vp9] {
            let mut d = Depacketizer::with_codec(codec);
            let mut frames = Vec::new();
            d.push(pkt(1, 100, true, b"\x80"), &mut frames).unwrap();
            assert_eq!(frames.len(), 1, "{codec:?}");
            assert!(frames[0].lost);
            assert!(frames[0].data().is_empty());
            assert!(!frames[0].is_key_frame);
            assert!(frames[0].new_parameters.is_none());

            // The next group starts clean.
            d.push(pkt(2, 200, true, b"\x10\x01"), &mut frames).unwrap();
            assert!(!frames[1].lost, "{codec:?}");
        }
    }

    #[test]
    fn vp8_parameters() {
        init_logging();
        let mut d = vp8();
        let mut frames = Vec::new();
        let mut payload = b"\x10".to_vec();
        payload.extend_from_slice(VP8_KEY_FRAME);
        d.push(pkt(1, 0, true, &payload), &mut frames).unwrap();
        let p = frames[0].new_parameters.as_ref().unwrap();
        assert!(frames[0].is_key_frame);
        assert_eq!(p.codec(), Codec::Vp8);
        assert_eq!(p.pixel_dimensions(), (176, 144));
        assert_eq!(p.rfc6381_codec(), "vp08.00.00.08");
        assert_eq_hex!(p.extra_data(), b"\x00\x00\x81\x02\x02\x02\x00\x00");
        assert_eq!(d.parameters(), Some(p));

        // The same parameters again aren't reported as new.
        d.push(pkt(2, 3000, true, &payload), &mut frames).unwrap();
        assert!(frames[1].is_key_frame);
        assert!(frames[1].new_parameters.is_none());
    }

    #[test]
    fn vp9_parameters() {
        init_logging();
        let mut d = Depacketizer::new("video", "vp9", 90_000).unwrap();
        assert_eq!(d.codec(), Codec::Vp9);
        let mut frames = Vec::new();

        // I=1 (7-bit picture id) B=1, then the first half of the header.
        let mut first = b"\x88\x01".to_vec();
        first.extend_from_slice(&VP9_KEY_FRAME[..4]);
        d.push(pkt(100, 0, false, &first), &mut frames).unwrap();

        // I=1 E=1, then the rest.
        let mut second = b"\x84\x01".to_vec();
        second.extend_from_slice(&VP9_KEY_FRAME[4..]);
        d.push(pkt(101, 0, true, &second), &mut frames).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq_hex!(frames[0].data(), VP9_KEY_FRAME);
        let p = frames[0].new_parameters.as_ref().unwrap();
        assert_eq!(p.pixel_dimensions(), (1280, 720));
        assert_eq!(p.rfc6381_codec(), "vp09.00.00.08");
        assert_eq_hex!(p.extra_data(), b"\x00\x00\x80\x02\x02\x02\x00\x00");

        // A non-key frame; parameters are unchanged.
        d.push(pkt(102, 3000, true, b"\x0c\x86\x00"), &mut frames).unwrap();
        assert!(!frames[1].is_key_frame);
        assert!(frames[1].new_parameters.is_none());
        assert_eq!(d.parameters().unwrap().pixel_dimensions(), (1280, 720));
    }

    #[test]
    fn lost_key_frame_has_no_parameters() {
        init_logging();
        let mut d = vp8();
        let mut frames = Vec::new();
        d.push(pkt(1, 0, false, b"\x10\x50\x42\x00\x9d\x01"), &mut frames).unwrap();
        d.push(pkt(3, 0, true, b"\x00\x2a\xb0\x00\x90\x00"), &mut frames).unwrap();
        assert!(frames[0].lost);
        assert!(frames[0].is_key_frame);
        assert!(frames[0].new_parameters.is_none());
        assert!(d.parameters().is_none());
    }

    #[test]
    fn truncated_key_frame_keeps_parameters() {
        init_logging();
        let mut d = vp8();
        let mut frames = Vec::new();
        d.push(pkt(1, 0, true, b"\x10\x50\x42\x00\x9d\x01"), &mut frames).unwrap();
        assert!(frames[0].is_key_frame);
        assert!(!frames[0].lost);
        assert!(frames[0].new_parameters.is_none());
        assert!(d.parameters().is_none());
    }

    #[test]
    fn new() {
        assert_eq!(Depacketizer::new("video", "Vp8", 90_000).unwrap().codec(), Codec::Vp8);
        for (media, encoding_name, clock_rate) in [
            ("audio", "vp8", 90_000),
            ("video", "h264", 90_000),
            ("video", "vp9", 48_000),
        ] {
            let e = Depacketizer::new(media, encoding_name, clock_rate).unwrap_err();
            assert_eq!(e.kind(), ErrorKind::InvalidArgument);
        }
    }

    #[test]
    fn frame_debug() {
        let mut frames = Vec::new();
        vp8().push(pkt(1, 7, true, b"\x00\xaa"), &mut frames).unwrap();
        let s = format!("{:?}", &frames[0]);
        assert!(s.contains("timestamp: 7"), "{s}");
    }
}
