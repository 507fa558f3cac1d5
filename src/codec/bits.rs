// Copyright (C) 2024 Scott Lamb <slamb@slamb.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! MSB-first bit reading over a byte slice.

/// A read or skip asked for more bits than remain in the buffer, or a read
/// asked for more than 32 bits.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("bitstream underflow: wanted {requested} bits at bit {position} with {remaining} remaining")]
pub struct BitstreamUnderflow {
    pub requested: u32,
    pub position: usize,
    pub remaining: usize,
}

/// Sequential bit cursor over an immutable buffer.
///
/// Bits are consumed most-significant first, continuing across byte
/// boundaries as a single stream: bit 0 is the MSB of byte 0. A failed read or
/// skip leaves the cursor where it was.
#[derive(Clone, Debug)]
pub struct BitReader<'a> {
    data: &'a [u8],

    /// Bit offset into `data`; always `<= 8 * data.len()`.
    pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Returns the number of bits consumed so far.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns the number of bits left to read.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() * 8 - self.pos
    }

    fn check(&self, bit_count: u32) -> Result<(), BitstreamUnderflow> {
        let remaining = self.remaining();
        if usize::try_from(bit_count).map_or(true, |n| n > remaining) {
            return Err(BitstreamUnderflow {
                requested: bit_count,
                position: self.pos,
                remaining,
            });
        }
        Ok(())
    }

    /// Reads `bit_count` bits, at most 32, as an unsigned integer.
    pub fn read_bits(&mut self, bit_count: u32) -> Result<u32, BitstreamUnderflow> {
        if bit_count > 32 {
            return Err(BitstreamUnderflow {
                requested: bit_count,
                position: self.pos,
                remaining: self.remaining(),
            });
        }
        self.check(bit_count)?;
        let mut value = 0u32;
        let mut left = bit_count;
        while left > 0 {
            let byte = self.data[self.pos / 8];
            let bit_off = (self.pos % 8) as u32; // < 8
            let avail = 8 - bit_off;
            let take = left.min(avail);
            let chunk = (u32::from(byte) >> (avail - take)) & ((1 << take) - 1);

            value = (value << take) | chunk;
            self.pos += take as usize;
            left -= take;
        }
        Ok(value)
    }

    /// Reads a single bit as a `bool`.
    #[inline]
    pub fn read_bool(&mut self) -> Result<bool, BitstreamUnderflow> {
        self.read_bits(1).map(|b| b != 0)
    }

    /// Advances past `bit_count` bits without interpreting them.
    pub fn skip_bits(&mut self, bit_count: u32) -> Result<(), BitstreamUnderflow> {
        self.check(bit_count)?;
        self.pos += bit_count as usize;
        Ok(())
    }
}
