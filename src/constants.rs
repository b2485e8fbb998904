// Copyright 2024 Karpeles Lab Inc.
// Based on the S2 compression format by Klaus Post
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

/// Tag for literal chunks
pub const TAG_LITERAL: u8 = 0x00;

/// Tag for copy with 1-byte offset (11 bits), or a repeat when the offset is 0
pub const TAG_COPY1: u8 = 0x01;

/// Tag for copy with 2-byte offset (16 bits)
pub const TAG_COPY2: u8 = 0x02;

/// Tag for copy with 4-byte offset (32 bits)
pub const TAG_COPY4: u8 = 0x03;

/// Frame magic number ("ALZ" followed by 0xB7), little-endian on the wire
pub const FRAME_MAGIC: u32 = 0xB75A_4C41;

/// Frame format version stored in the top bits of the descriptor
pub const FORMAT_VERSION: u8 = 1;

/// Structured dictionary magic number, little-endian on the wire
pub const DICT_MAGIC: u32 = 0xEC30_A437;

/// Descriptor flag: a content size field follows the window byte
pub const FLAG_CONTENT_SIZE: u8 = 0x01;

/// Descriptor flag: a dictionary id follows the content size
pub const FLAG_DICT_ID: u8 = 0x02;

/// Descriptor flag: a content checksum trails the last block
pub const FLAG_CHECKSUM: u8 = 0x04;

/// Descriptor bits that must be zero
pub const FLAG_RESERVED_MASK: u8 = 0x38;

/// Shift of the version field inside the descriptor
pub const VERSION_SHIFT: u8 = 6;

/// Fixed part of the frame header: magic, descriptor and window byte
pub const FRAME_HEADER_MIN_SIZE: usize = 6;

/// Largest possible frame header
pub const MAX_FRAME_HEADER_SIZE: usize = FRAME_HEADER_MIN_SIZE + MAX_VARINT_LEN + 4;

/// Block header size
pub const BLOCK_HEADER_SIZE: usize = 3;

/// Content checksum size
pub const CHECKSUM_SIZE: usize = 4;

/// Maximum encoded length of a u64 varint
pub const MAX_VARINT_LEN: usize = 10;

/// Block types stored in bits 1-2 of the block header
pub const BLOCK_TYPE_RAW: u8 = 0;
pub const BLOCK_TYPE_RLE: u8 = 1;
pub const BLOCK_TYPE_COMPRESSED: u8 = 2;

/// Maximum block size (128KB); smaller windows use the window size
pub const BLOCK_SIZE_MAX: usize = 1 << 17;

/// Window log bounds
pub const WINDOWLOG_MIN: u32 = 10;
pub const WINDOWLOG_MAX: u32 = 27;

/// Hash table log bounds
pub const HASHLOG_MIN: u32 = 6;
pub const HASHLOG_MAX: u32 = 24;

/// Chain table log bounds (0 disables the chain)
pub const CHAINLOG_MIN: u32 = 6;
pub const CHAINLOG_MAX: u32 = 24;

/// Maximum search depth log
pub const SEARCHLOG_MAX: u32 = 8;

/// Minimum match length bounds
pub const MINMATCH_MIN: u32 = 4;
pub const MINMATCH_MAX: u32 = 7;

/// Compression levels
pub const MIN_LEVEL: i32 = 1;
pub const MAX_LEVEL: i32 = 9;
pub const DEFAULT_LEVEL: i32 = 3;

/// Input margin for encoding; the match finder loads 8 bytes at a time
pub const INPUT_MARGIN: usize = 8;

/// Blocks shorter than this are stored without attempting matches
pub const MIN_NON_LITERAL_BLOCK_SIZE: usize = 16;

/// Frame-state region of a decompression context: a length byte followed by
/// the last frame header as it appeared on the wire
pub const DCTX_STATE_SIZE: usize = 1 + MAX_FRAME_HEADER_SIZE;
