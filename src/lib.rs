// Copyright (C) 2024 Scott Lamb <slamb@slamb.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! VP8 and VP9 header parsing and RTP depacketization.
//!
//! This crate doesn't decode pictures. It understands just enough of each
//! bitstream to tell key frames apart, find the coded resolution, and build
//! the `vpcC` record a muxer needs, and just enough of the RTP payload
//! formats ([RFC 7741](https://datatracker.ietf.org/doc/html/rfc7741) for
//! VP8, [RFC 9628](https://datatracker.ietf.org/doc/html/rfc9628) for VP9) to
//! reassemble frames from packets.
//!
//! Start with [`codec::Depacketizer`] for a stream of packets, or the
//! functions in [`codec::vp8`] and [`codec::vp9`] for individual frames.

#![forbid(clippy::print_stderr, clippy::print_stdout)]

/// Wraps the supplied `ErrorInt` and returns it as an `Err`.
macro_rules! bail {
    ($e:expr) => {
        return Err(crate::error::Error(std::sync::Arc::new($e)))
    };
}

macro_rules! wrap {
    ($e:expr) => {
        crate::error::Error(std::sync::Arc::new($e))
    };
}

mod error;
mod hex;

pub mod codec;
pub mod rtp;

#[cfg(test)]
mod testutil;

pub use error::{Error, ErrorKind};
