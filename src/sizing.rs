// Copyright 2024 Karpeles Lab Inc.
// Based on the S2 compression format by Klaus Post
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Workspace sizes
//!
//! Every session kind has one layout: the list of regions its constructor
//! claims, in claim order. The public size functions sum the same layout the
//! constructors carve, so a workspace of exactly the reported size always
//! fits and one byte less never does.

use crate::constants::*;
use crate::error::{Error, Result};
use crate::params::{block_size_for_window, CompressionParameters};
use crate::session::SessionKind;
use crate::workspace::{Region, Workspace};

/// Region lengths for one session kind, in claim order
#[derive(Debug, Clone, Copy)]
pub(crate) struct Layout<const N: usize>([usize; N]);

impl<const N: usize> Layout<N> {
    pub(crate) fn total(&self) -> usize {
        self.0.iter().sum()
    }

    /// Claim every region, failing up front with the full requirement
    pub(crate) fn claim(&self, workspace: &mut Workspace<'_>) -> Result<[Region; N]> {
        workspace.require(self.total())?;
        let mut regions = [Region::default(); N];
        for (region, &len) in regions.iter_mut().zip(self.0.iter()) {
            *region = workspace.claim(len)?;
            debug_assert_eq!(region.len(), len);
        }
        Ok(regions)
    }
}

#[inline]
fn hash_table_size(cparams: &CompressionParameters) -> usize {
    4 << cparams.hash_log
}

#[inline]
fn chain_table_size(cparams: &CompressionParameters) -> usize {
    if cparams.chain_log == 0 {
        0
    } else {
        4 << cparams.chain_log
    }
}

#[inline]
fn window_buffer_size(window_log: u32) -> usize {
    (1 << window_log) + block_size_for_window(window_log)
}

fn check_window_log(window_log: u32) -> Result<()> {
    if !(WINDOWLOG_MIN..=WINDOWLOG_MAX).contains(&window_log) {
        return Err(Error::InvalidParameters("window_log out of range"));
    }
    Ok(())
}

/// Window buffer, hash table, chain table
pub(crate) fn compression_context_layout(cparams: &CompressionParameters) -> Layout<3> {
    Layout([
        window_buffer_size(cparams.window_log),
        hash_table_size(cparams),
        chain_table_size(cparams),
    ])
}

/// Context regions followed by the output staging buffer
pub(crate) fn compression_stream_layout(cparams: &CompressionParameters) -> Layout<4> {
    let [window, hash, chain] = compression_context_layout(cparams).0;
    let staging = MAX_FRAME_HEADER_SIZE + BLOCK_HEADER_SIZE + cparams.block_size() + CHECKSUM_SIZE;
    Layout([window, hash, chain, staging])
}

/// Frame-state region
pub(crate) fn decompression_context_layout() -> Layout<1> {
    Layout([DCTX_STATE_SIZE])
}

/// Header scratch, block input buffer, window buffer
pub(crate) fn decompression_stream_layout(max_window_log: u32) -> Layout<3> {
    Layout([
        MAX_FRAME_HEADER_SIZE,
        block_size_for_window(max_window_log),
        window_buffer_size(max_window_log),
    ])
}

/// Loaded content, hash table, chain table
pub(crate) fn compression_dictionary_layout(cparams: &CompressionParameters, dict_size: usize) -> Layout<3> {
    Layout([
        dict_size.min(cparams.window_size()),
        hash_table_size(cparams),
        chain_table_size(cparams),
    ])
}

/// Content copy
pub(crate) fn decompression_dictionary_layout(dict_size: usize) -> Layout<1> {
    Layout([dict_size])
}

/// Bytes needed by a [`CompressionContext`](crate::CompressionContext)
pub fn compression_context_size(cparams: &CompressionParameters) -> Result<usize> {
    cparams.validate()?;
    Ok(compression_context_layout(cparams).total())
}

/// Bytes needed by a [`DecompressionContext`](crate::DecompressionContext).
///
/// The one-shot decoder writes straight into the caller's output, so the size
/// does not depend on the window; `max_window_log` is only range checked.
pub fn decompression_context_size(max_window_log: u32) -> Result<usize> {
    check_window_log(max_window_log)?;
    Ok(decompression_context_layout().total())
}

/// Bytes needed by a [`CompressionStream`](crate::CompressionStream)
pub fn compression_stream_size(cparams: &CompressionParameters) -> Result<usize> {
    cparams.validate()?;
    Ok(compression_stream_layout(cparams).total())
}

/// Bytes needed by a [`DecompressionStream`](crate::DecompressionStream)
/// accepting frames with windows up to `2^max_window_log`
pub fn decompression_stream_size(max_window_log: u32) -> Result<usize> {
    check_window_log(max_window_log)?;
    Ok(decompression_stream_layout(max_window_log).total())
}

/// Bytes needed by a [`CompressionDictionary`](crate::CompressionDictionary)
/// built from `dict_size` bytes
pub fn compression_dictionary_size(cparams: &CompressionParameters, dict_size: usize) -> Result<usize> {
    cparams.validate()?;
    Ok(compression_dictionary_layout(cparams, dict_size).total())
}

/// Bytes needed by a [`DecompressionDictionary`](crate::DecompressionDictionary)
/// built from `dict_size` bytes
pub fn decompression_dictionary_size(dict_size: usize) -> Result<usize> {
    Ok(decompression_dictionary_layout(dict_size).total())
}

/// Bytes needed by a session of the given kind
pub fn size_for(kind: &SessionKind) -> Result<usize> {
    match *kind {
        SessionKind::CompressionContext(ref params) => compression_context_size(&params.cparams),
        SessionKind::DecompressionContext { max_window_log } => {
            decompression_context_size(max_window_log)
        }
        SessionKind::CompressionStream(ref params) => compression_stream_size(&params.cparams),
        SessionKind::DecompressionStream { max_window_log } => {
            decompression_stream_size(max_window_log)
        }
        SessionKind::CompressionDictionary {
            ref params,
            dict_size,
        } => compression_dictionary_size(&params.cparams, dict_size),
        SessionKind::DecompressionDictionary { dict_size } => {
            decompression_dictionary_size(dict_size)
        }
    }
}

/// Largest frame the one-shot compressor can produce for `src_len` bytes of
/// input, under any parameters and with every frame option enabled.
///
/// Streams emit the same data in pieces and have no such bound, since every
/// flush can close a block early.
pub fn compress_bound(src_len: usize) -> usize {
    src_len + (src_len >> 8) + 8 + MAX_FRAME_HEADER_SIZE + CHECKSUM_SIZE
}
