// Copyright (C) 2024 Scott Lamb <slamb@slamb.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Installs a logger which honors `RUST_LOG` and writes through the test harness's capture.
pub(crate) fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .is_test(true)
        .try_init();
}

/// Like `assert_eq!` for byte slices, but prints hex dumps on mismatch.
macro_rules! assert_eq_hex {
    ($left:expr, $right:expr $(,)?) => {
        match (&$left, &$right) {
            (left_val, right_val) => {
                let left_val: &[u8] = &left_val[..];
                let right_val: &[u8] = &right_val[..];
                if left_val != right_val {
                    use pretty_hex::PrettyHex;
                    panic!(
                        "assertion failed: left == right\n\nleft:\n{:?}\n\nright:\n{:?}",
                        left_val.hex_dump(),
                        right_val.hex_dump()
                    );
                }
            }
        }
    };
}

pub(crate) use assert_eq_hex;
