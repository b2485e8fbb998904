// Copyright 2024 Karpeles Lab Inc.
// Based on the S2 compression format by Klaus Post
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! # ArenaLZ Compression
//!
//! An LZ77 compressor built on the S2 block encoding that never allocates.
//! Every session lives in a buffer the caller provides, and the size of that
//! buffer can be computed ahead of time from the parameters alone.
//!
//! ArenaLZ provides:
//! - Workspace size queries for every session kind
//! - One-shot and streaming compression and decompression
//! - Raw and trained dictionaries, preprocessed once and shared across sessions
//! - Framed output with optional content size, dictionary id and checksum
//!
//! ## Block API Example
//!
//! ```rust
//! use arenalz::{
//!     compress_bound, compression_context_size, decompression_context_size, CompressionContext,
//!     DecompressionContext, Parameters, Workspace,
//! };
//!
//! let data = b"Hello, World! This is a test of ArenaLZ compression. Hello, World!";
//! let params = Parameters::level(3).with_window_log(16).with_checksum(true);
//!
//! let mut cmem = vec![0u8; compression_context_size(&params.cparams).unwrap()];
//! let mut cctx = CompressionContext::new(Workspace::new(&mut cmem), params).unwrap();
//! let mut frame = vec![0u8; compress_bound(data.len())];
//! let n = cctx.compress(&mut frame, data).unwrap();
//!
//! let mut dmem = vec![0u8; decompression_context_size(16).unwrap()];
//! let mut dctx = DecompressionContext::new(Workspace::new(&mut dmem), 16).unwrap();
//! let mut out = vec![0u8; data.len()];
//! let m = dctx.decompress(&mut out, &frame[..n]).unwrap();
//! assert_eq!(&out[..m], &data[..]);
//! ```

mod checksum;
mod compress;
mod constants;
mod cstream;
mod decode;
mod decompress;
mod dict;
mod dstream;
mod encode;
mod error;
mod frame;
mod params;
mod session;
mod sizing;
mod varint;
mod workspace;

#[cfg(feature = "concurrent")]
mod concurrent;

pub use compress::CompressionContext;
pub use constants::{
    BLOCK_SIZE_MAX, DEFAULT_LEVEL, FRAME_MAGIC, MAX_FRAME_HEADER_SIZE, MAX_LEVEL, MIN_LEVEL,
    WINDOWLOG_MAX, WINDOWLOG_MIN,
};
pub use cstream::{CompressionStream, FlushStatus, Progress, StreamStage};
pub use decompress::DecompressionContext;
pub use dict::{dictionary_id_of, finalize_dictionary, CompressionDictionary, DecompressionDictionary};
pub use dstream::DecompressionStream;
pub use error::{Error, Result};
pub use frame::{
    find_decompressed_size, find_frame_compressed_size, BlockHeader, BlockType, ContentSize,
    FrameHeader,
};
pub use params::{get_cparams, get_params, CompressionParameters, FrameParameters, Parameters};
pub use session::{Session, SessionKind};
pub use sizing::{
    compress_bound, compression_context_size, compression_dictionary_size, compression_stream_size,
    decompression_context_size, decompression_dictionary_size, decompression_stream_size, size_for,
};
pub use workspace::Workspace;

#[cfg(feature = "concurrent")]
pub use concurrent::compress_batch;
