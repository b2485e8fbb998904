// Copyright 2024 Karpeles Lab Inc.
// Based on the S2 compression format by Klaus Post
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Block decoder
//!
//! Decodes one compressed block payload into a caller buffer that already
//! holds the frame's earlier output. Copies may reach back past the start of
//! that buffer into a dictionary prefix, as if the prefix and the buffer were
//! one contiguous history.

use crate::constants::*;
use crate::error::{Error, Result};
use crate::varint::decode_varint;

/// Decode a compressed block payload (varint length followed by tags).
///
/// Output goes to `out[start..]`, with `out[..start]` and then `prefix`
/// serving as history. `offset` carries the repeat offset in and out.
/// Returns the number of bytes produced.
pub(crate) fn decode_block(
    src: &[u8],
    prefix: &[u8],
    out: &mut [u8],
    start: usize,
    window_size: usize,
    block_max: usize,
    offset: &mut usize,
) -> Result<usize> {
    let (dlen, header_len) = decode_varint(src)?;
    if dlen > block_max as u64 {
        return Err(Error::CorruptData("block decodes past the block size limit"));
    }
    let dlen = dlen as usize;
    if out.len() - start < dlen {
        return Err(Error::OutputTooSmall {
            required: start + dlen,
            provided: out.len(),
        });
    }

    let end = start + dlen;
    let mut d = start;
    let mut s = header_len;
    let mut last_offset = *offset;

    while s < src.len() {
        match src[s] & 0x03 {
            TAG_LITERAL => {
                let (length, consumed) = decode_literal_length(&src[s..])?;
                s += consumed;

                if length > end - d || length > src.len() - s {
                    return Err(Error::CorruptData("literal runs past the block"));
                }

                out[d..d + length].copy_from_slice(&src[s..s + length]);
                d += length;
                s += length;
                continue;
            }
            TAG_COPY1 => {
                let (new_offset, length, consumed) = decode_copy1(&src[s..], last_offset)?;
                s += consumed;
                last_offset = new_offset;
                copy_match(out, prefix, d, end, window_size, last_offset, length)?;
                d += length;
            }
            TAG_COPY2 => {
                if s + 3 > src.len() {
                    return Err(Error::CorruptData("truncated copy"));
                }
                last_offset = u16::from_le_bytes([src[s + 1], src[s + 2]]) as usize;
                let length = 1 + (src[s] >> 2) as usize;
                s += 3;
                copy_match(out, prefix, d, end, window_size, last_offset, length)?;
                d += length;
            }
            _ => {
                if s + 5 > src.len() {
                    return Err(Error::CorruptData("truncated copy"));
                }
                last_offset =
                    u32::from_le_bytes([src[s + 1], src[s + 2], src[s + 3], src[s + 4]]) as usize;
                let length = 1 + (src[s] >> 2) as usize;
                s += 5;
                copy_match(out, prefix, d, end, window_size, last_offset, length)?;
                d += length;
            }
        }
    }

    // Verify we decoded exactly the right amount
    if d != end {
        return Err(Error::CorruptData("block length mismatch"));
    }

    *offset = last_offset;
    Ok(dlen)
}

/// Decode the length of a literal chunk
/// Returns (length, bytes_consumed)
fn decode_literal_length(src: &[u8]) -> Result<(usize, usize)> {
    let x = src[0] >> 2;
    let width = match x {
        0..=59 => return Ok((x as usize + 1, 1)),
        60 => 1,
        61 => 2,
        62 => 3,
        _ => 4,
    };
    if src.len() < 1 + width {
        return Err(Error::CorruptData("truncated literal header"));
    }

    let mut len = [0u8; 4];
    len[..width].copy_from_slice(&src[1..1 + width]);
    Ok((u32::from_le_bytes(len) as usize + 1, 1 + width))
}

/// Decode a COPY1 tag; a zero offset means "repeat the last offset"
/// Returns (offset, length, bytes_consumed)
fn decode_copy1(src: &[u8], last_offset: usize) -> Result<(usize, usize, usize)> {
    if src.len() < 2 {
        return Err(Error::CorruptData("truncated copy"));
    }

    let toffset = ((src[0] as usize & 0xe0) << 3) | (src[1] as usize);
    let length = ((src[0] >> 2) & 0x7) as usize;

    if toffset != 0 {
        return Ok((toffset, length + 4, 2));
    }

    if last_offset == 0 {
        return Err(Error::CorruptData("repeat without a previous offset"));
    }

    let truncated = Error::CorruptData("truncated repeat");
    match length {
        5 => {
            let b = src.get(2).ok_or(truncated)?;
            Ok((last_offset, *b as usize + 8, 3))
        }
        6 => {
            let b = src.get(2..4).ok_or(truncated)?;
            let len = u16::from_le_bytes([b[0], b[1]]) as usize + (1 << 8);
            Ok((last_offset, len + 4, 4))
        }
        7 => {
            let b = src.get(2..5).ok_or(truncated)?;
            let len = u32::from_le_bytes([b[0], b[1], b[2], 0]) as usize + (1 << 16);
            Ok((last_offset, len + 4, 5))
        }
        _ => Ok((last_offset, length + 4, 2)),
    }
}

/// Copy `length` bytes from `offset` back into `out[d..]`, reading through
/// `prefix` when the source lies before the start of `out`
#[inline]
fn copy_match(
    out: &mut [u8],
    prefix: &[u8],
    d: usize,
    end: usize,
    window_size: usize,
    offset: usize,
    length: usize,
) -> Result<()> {
    if offset == 0 || offset > window_size || offset > d + prefix.len() {
        return Err(Error::CorruptData("copy offset out of range"));
    }
    if length > end - d {
        return Err(Error::CorruptData("copy runs past the block"));
    }

    let mut d = d;
    let mut length = length;
    if offset > d {
        // Source starts inside the prefix
        let from = prefix.len() - (offset - d);
        let n = length.min(prefix.len() - from);
        out[d..d + n].copy_from_slice(&prefix[from..from + n]);
        d += n;
        length -= n;
    }
    if length > 0 {
        copy_within(out, d, offset, length);
    }
    Ok(())
}

/// Copy data within the same buffer. Overlapping copies repeat the pattern.
#[inline]
fn copy_within(dst: &mut [u8], d: usize, offset: usize, length: usize) {
    let src_start = d - offset;

    if offset >= length {
        dst.copy_within(src_start..src_start + length, d);
    } else {
        for i in 0..length {
            dst[d + i] = dst[src_start + i];
        }
    }
}
