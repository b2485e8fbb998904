// Copyright 2024 Karpeles Lab Inc.
// Based on the S2 compression format by Klaus Post
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::constants::MAX_VARINT_LEN;
use crate::error::{Error, Result};

/// Outcome of scanning a possibly truncated varint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarintScan {
    /// A complete varint of this many bytes starts the slice
    Complete(usize),
    /// More bytes are needed
    Incomplete,
}

/// Decode a varint from the beginning of the slice.
/// Returns (value, bytes_read)
pub fn decode_varint(src: &[u8]) -> Result<(u64, usize)> {
    let mut value: u64 = 0;
    let mut shift = 0;

    for (i, &byte) in src.iter().enumerate() {
        if i >= MAX_VARINT_LEN {
            return Err(Error::CorruptData("varint overflow"));
        }

        if byte < 0x80 {
            if i == MAX_VARINT_LEN - 1 && byte > 1 {
                return Err(Error::CorruptData("varint overflow"));
            }
            value |= (byte as u64) << shift;
            return Ok((value, i + 1));
        }

        value |= ((byte & 0x7f) as u64) << shift;
        shift += 7;
    }

    Err(Error::CorruptData("truncated varint"))
}

/// Find how long the varint at the start of `src` is without decoding it.
pub fn scan_varint(src: &[u8]) -> Result<VarintScan> {
    match src.iter().take(MAX_VARINT_LEN).position(|&b| b < 0x80) {
        Some(i) => Ok(VarintScan::Complete(i + 1)),
        None if src.len() >= MAX_VARINT_LEN => Err(Error::CorruptData("varint overflow")),
        None => Ok(VarintScan::Incomplete),
    }
}

/// Encode a varint into the buffer.
/// Returns the number of bytes written, or `OutputTooSmall` if it does not fit.
pub fn encode_varint(dst: &mut [u8], mut value: u64) -> Result<usize> {
    let needed = varint_size(value);
    if dst.len() < needed {
        return Err(Error::OutputTooSmall {
            required: needed,
            provided: dst.len(),
        });
    }

    let mut i = 0;
    while value >= 0x80 {
        dst[i] = (value as u8) | 0x80;
        value >>= 7;
        i += 1;
    }

    dst[i] = value as u8;
    Ok(i + 1)
}

/// Returns the number of bytes needed to encode this value as a varint
pub fn varint_size(mut value: u64) -> usize {
    let mut n = 1;
    while value >= 0x80 {
        value >>= 7;
        n += 1;
    }
    n
}
