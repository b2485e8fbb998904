// Copyright 2024 Karpeles Lab Inc.
// Based on the S2 compression format by Klaus Post
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Block encoder
//!
//! Blocks are encoded as an S2 tag stream preceded by the varint decoded
//! length. The match finder works on a window buffer that already holds the
//! history (dictionary and earlier blocks) followed by the block itself, and
//! keeps its hash and chain tables in workspace memory. Table entries are
//! window positions plus one, so zero means empty.

use crate::constants::*;
use crate::params::CompressionParameters;
use crate::varint::encode_varint;
use crate::workspace::Table;

/// Hash and chain tables for one session
pub(crate) struct MatchTables<'t> {
    pub(crate) hash: Table<'t>,
    pub(crate) chain: Option<Table<'t>>,
}

impl MatchTables<'_> {
    pub(crate) fn clear(&mut self) {
        self.hash.clear();
        if let Some(chain) = self.chain.as_mut() {
            chain.clear();
        }
    }

    /// Rebase every entry after the window buffer dropped its first `shift`
    /// bytes. Chain links are keyed by position, so they cannot be rebased
    /// and are dropped instead.
    pub(crate) fn shift_down(&mut self, shift: usize) {
        let shift = shift as u32;
        self.hash
            .update(|v| if v > shift { v - shift } else { 0 });
        if let Some(chain) = self.chain.as_mut() {
            chain.clear();
        }
    }
}

/// Load a u64 from the slice at the given offset
#[inline]
fn load64(data: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
        data[offset + 4],
        data[offset + 5],
        data[offset + 6],
        data[offset + 7],
    ])
}

/// Hash the first `min_match` bytes of `v` into `bits` bits
#[inline]
fn hash_value(v: u64, min_match: u32, bits: u32) -> usize {
    const PRIME_8_BYTES: u64 = 0xcf1bbcdcb7a56463;
    let masked = v << (64 - 8 * min_match);
    (masked.wrapping_mul(PRIME_8_BYTES) >> (64 - bits)) as usize
}

/// Record `pos` as the newest candidate for its hash.
/// Requires `pos + 8 <= buf.len()`.
#[inline]
fn insert(tables: &mut MatchTables<'_>, buf: &[u8], pos: usize, cparams: &CompressionParameters) -> u32 {
    let h = hash_value(load64(buf, pos), cparams.min_match, cparams.hash_log);
    let head = tables.hash.get(h);
    tables.hash.set(h, (pos + 1) as u32);
    if let Some(chain) = tables.chain.as_mut() {
        let mask = chain.len() - 1;
        chain.set(pos & mask, head);
    }
    head
}

/// Index every position of `buf[start..end]` that has 8 readable bytes.
/// Used to seed the tables from a dictionary.
pub(crate) fn fill_tables(
    tables: &mut MatchTables<'_>,
    buf: &[u8],
    start: usize,
    end: usize,
    cparams: &CompressionParameters,
) {
    let mut pos = start;
    while pos + INPUT_MARGIN <= end {
        insert(tables, buf, pos, cparams);
        pos += 1;
    }
}

/// Length of the common run at `c` and `s`, stopping at `end`. Requires `c < s`.
#[inline]
fn match_len(buf: &[u8], mut c: usize, mut s: usize, end: usize) -> usize {
    let start = s;
    while s + 8 <= end {
        let diff = load64(buf, s) ^ load64(buf, c);
        if diff != 0 {
            return s - start + (diff.trailing_zeros() / 8) as usize;
        }
        s += 8;
        c += 8;
    }
    while s < end && buf[s] == buf[c] {
        s += 1;
        c += 1;
    }
    s - start
}

/// Insert `s` and return the best candidate `(position, length)` for it
fn find_match(
    tables: &mut MatchTables<'_>,
    buf: &[u8],
    s: usize,
    end: usize,
    cparams: &CompressionParameters,
    repeat: usize,
) -> Option<(usize, usize)> {
    let window_size = cparams.window_size();
    let min_match = cparams.min_match as usize;
    let head = insert(tables, buf, s, cparams) as usize;

    let mut best_len = 0;
    let mut best = 0;

    // The repeat offset is cheapest to encode, so it wins ties
    if repeat != 0 && repeat <= s && repeat <= window_size {
        let len = match_len(buf, s - repeat, s, end);
        if len >= min_match {
            best_len = len;
            best = s - repeat;
        }
    }

    let mut cand = head;
    let mut attempts = 1usize << cparams.search_log;
    while cand != 0 && attempts > 0 {
        let c = cand - 1;
        if c >= s || s - c > window_size {
            break;
        }
        let len = match_len(buf, c, s, end);
        if len > best_len {
            best_len = len;
            best = c;
        }
        attempts -= 1;

        let Some(chain) = tables.chain.as_ref() else {
            break;
        };
        let next = chain.get(c & (chain.len() - 1)) as usize;
        // Links must strictly decrease, which also stops on overwritten slots
        if next == 0 || next - 1 >= c {
            break;
        }
        cand = next;
    }

    if best_len >= min_match {
        Some((best, best_len))
    } else {
        None
    }
}

/// Upper bound on bytes written for a literal run followed by one copy
#[inline]
fn emit_cost_bound(literal_len: usize, match_len: usize) -> usize {
    literal_len + 5 + 10 + match_len / 16
}

/// Compress `buf[start..end]` into `dst`, using everything before `start` as
/// history.
///
/// Returns the payload length (varint header plus tags), or `None` if the
/// block is too small to bother with or would not come out meaningfully
/// smaller than `end - start`. In that case `repeat` is left untouched and
/// the caller stores the block raw.
pub(crate) fn compress_block(
    tables: &mut MatchTables<'_>,
    buf: &[u8],
    start: usize,
    end: usize,
    cparams: &CompressionParameters,
    repeat: &mut usize,
    dst: &mut [u8],
) -> Option<usize> {
    let src_len = end - start;
    if src_len < MIN_NON_LITERAL_BLOCK_SIZE {
        return None;
    }

    // Bail if we can't compress to at least this
    let limit = dst.len().min(src_len - src_len / 32);
    let mut d = encode_varint(&mut dst[..limit], src_len as u64).ok()?;

    let s_limit = end - INPUT_MARGIN;
    let accelerate = cparams.chain_log == 0;
    let mut offset = *repeat;
    let mut next_emit = start;
    let mut s = start;

    while s <= s_limit {
        let Some((mut cand, mut len)) = find_match(tables, buf, s, end, cparams, offset) else {
            s += if accelerate {
                1 + ((s - next_emit) >> 6)
            } else {
                1
            };
            continue;
        };

        // Bail if the match is equal or worse to the encoding for large offsets
        if s - cand > 65535 && len <= 5 && s - cand != offset {
            s += 1;
            continue;
        }

        // Extend backwards
        while cand > 0 && s > next_emit && buf[cand - 1] == buf[s - 1] {
            cand -= 1;
            s -= 1;
            len += 1;
        }

        if d + emit_cost_bound(s - next_emit, len) > limit {
            return None;
        }

        if s > next_emit {
            d += emit_literal(&mut dst[d..], &buf[next_emit..s]);
        }

        let match_offset = s - cand;
        if match_offset == offset {
            d += emit_repeat(&mut dst[d..], match_offset, len);
        } else {
            d += emit_copy(&mut dst[d..], match_offset, len);
            offset = match_offset;
        }

        let base = s;
        s += len;
        next_emit = s;

        // Index a couple of positions inside the match
        for pos in [base + 1, s - 2, s - 1] {
            if pos > base && pos <= s_limit {
                insert(tables, buf, pos, cparams);
            }
        }
    }

    if next_emit < end {
        if d + emit_cost_bound(end - next_emit, 0) > limit {
            return None;
        }
        d += emit_literal(&mut dst[d..], &buf[next_emit..end]);
    }

    if d >= limit {
        return None;
    }

    *repeat = offset;
    Some(d)
}

/// Write a tag byte followed by the low `extra` bytes of `value`, little endian
#[inline]
fn put_tag(dst: &mut [u8], tag: u8, value: u32, extra: usize) -> usize {
    dst[0] = tag;
    dst[1..1 + extra].copy_from_slice(&value.to_le_bytes()[..extra]);
    1 + extra
}

/// COPY1: 4..=11 bytes, offset below 2048
#[inline]
fn put_copy1(dst: &mut [u8], offset: usize, length: usize) -> usize {
    let tag = (((offset >> 8) << 5) | ((length - 4) << 2)) as u8 | TAG_COPY1;
    put_tag(dst, tag, offset as u32, 1)
}

/// COPY2: 1..=64 bytes, offset below 65536
#[inline]
fn put_copy2(dst: &mut [u8], offset: usize, length: usize) -> usize {
    put_tag(dst, ((length - 1) << 2) as u8 | TAG_COPY2, offset as u32, 2)
}

/// COPY4: 1..=64 bytes, any offset
#[inline]
fn put_copy4(dst: &mut [u8], offset: usize, length: usize) -> usize {
    put_tag(dst, ((length - 1) << 2) as u8 | TAG_COPY4, offset as u32, 4)
}

/// Emit a literal run and return the number of bytes written
fn emit_literal(dst: &mut [u8], lit: &[u8]) -> usize {
    if lit.is_empty() {
        return 0;
    }

    let n = (lit.len() - 1) as u32;
    let head = if n < 60 {
        put_tag(dst, (n as u8) << 2 | TAG_LITERAL, 0, 0)
    } else {
        // Tag values 60..=63 say how many length bytes follow
        let extra = 4 - n.leading_zeros() as usize / 8;
        put_tag(dst, (59 + extra as u8) << 2 | TAG_LITERAL, n, extra)
    };

    dst[head..head + lit.len()].copy_from_slice(lit);
    head + lit.len()
}

/// Emit a match at a new offset and return the number of bytes written
fn emit_copy(dst: &mut [u8], offset: usize, length: usize) -> usize {
    if offset >= 65536 {
        return emit_copy4(dst, offset, length);
    }

    if length > 64 {
        // A short copy sets the offset, a repeat covers the rest
        let (n, first) = if offset < 2048 {
            (put_copy1(dst, offset, 8), 8)
        } else {
            (put_copy2(dst, offset, 60), 60)
        };
        return n + emit_repeat(&mut dst[n..], offset, length - first);
    }

    if length >= 12 || offset >= 2048 {
        put_copy2(dst, offset, length)
    } else {
        put_copy1(dst, offset, length)
    }
}

fn emit_copy4(dst: &mut [u8], offset: usize, length: usize) -> usize {
    if length <= 64 {
        return put_copy4(dst, offset, length);
    }

    let n = put_copy4(dst, offset, 64);
    match length - 64 {
        0 => n,
        rest @ 1..=3 => n + put_copy4(&mut dst[n..], offset, rest),
        rest => n + emit_repeat(&mut dst[n..], offset, rest),
    }
}

/// Emit a match at the previous offset
fn emit_repeat(dst: &mut [u8], offset: usize, length: usize) -> usize {
    let len = length - 4;
    match len {
        0..=4 => put_tag(dst, (len << 2) as u8 | TAG_COPY1, 0, 1),
        // Spelling the offset out costs nothing here
        5..=7 if offset < 2048 => put_copy1(dst, offset, length),
        _ if len < (1 << 8) + 4 => put_tag(dst, (5 << 2) | TAG_COPY1, ((len - 4) as u32) << 8, 2),
        _ if len < (1 << 16) + (1 << 8) => {
            put_tag(dst, (6 << 2) | TAG_COPY1, ((len - (1 << 8)) as u32) << 8, 3)
        }
        _ => put_tag(dst, (7 << 2) | TAG_COPY1, ((len - (1 << 16)) as u32) << 8, 4),
    }
}
