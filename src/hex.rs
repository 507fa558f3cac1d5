// Copyright (C) 2024 Scott Lamb <slamb@slamb.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hex dumps of packet and frame bytes, capped to a prefix.

use pretty_hex::{HexConfig, PrettyHex};

/// Formats at most `max_bytes` of `inner` via `pretty-hex`, noting how much was omitted.
pub(crate) struct LimitedHex<'a> {
    inner: &'a [u8],
    max_bytes: usize,
}

impl<'a> LimitedHex<'a> {
    pub(crate) fn new(inner: &'a [u8], max_bytes: usize) -> Self {
        Self { inner, max_bytes }
    }
}

impl std::fmt::Debug for LimitedHex<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (shown, omitted) = match self.inner.get(..self.max_bytes) {
            Some(prefix) if prefix.len() < self.inner.len() => {
                (prefix, self.inner.len() - prefix.len())
            }
            _ => (self.inner, 0),
        };
        writeln!(f, "Length: {0} (0x{0:x}) bytes", self.inner.len())?;
        write!(
            f,
            "{:?}",
            shown.hex_conf(HexConfig {
                title: false,
                ..Default::default()
            })
        )?;
        if omitted > 0 {
            write!(f, "\n...{0} (0x{0:x}) bytes not shown...", omitted)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::LimitedHex;

    #[test]
    fn truncates() {
        let data = [0u8; 40];
        let s = format!("{:?}", LimitedHex::new(&data, 16));
        assert!(s.starts_with("Length: 40 (0x28) bytes"), "{s}");
        assert!(s.ends_with("...24 (0x18) bytes not shown..."), "{s}");
    }

    #[test]
    fn short_input_is_complete() {
        let data = [0xaa, 0xbb];
        let s = format!("{:?}", LimitedHex::new(&data, 16));
        assert!(!s.contains("not shown"), "{s}");
    }
}
