// Copyright 2024 Karpeles Lab Inc.
// Based on the S2 compression format by Klaus Post
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Frame and block headers
//!
//! ```text
//! frame   := header block* [checksum u32 LE]
//! header  := magic u32 LE | descriptor u8 | window_log u8
//!            [uvarint content_size] [dict_id u32 LE]
//! block   := block_header (3 bytes LE) payload
//! ```
//!
//! Descriptor bits: 0 content size present, 1 dictionary id present,
//! 2 checksum present, 3-5 reserved (zero), 6-7 format version.
//!
//! Block header bits: 0 last block, 1-2 block type, 3-23 size. The size is the
//! payload length for raw and compressed blocks and the run length for RLE
//! blocks (whose payload is one byte).

use crate::constants::*;
use crate::error::{Error, Result};
use crate::varint::{decode_varint, encode_varint, scan_varint, varint_size, VarintScan};

/// Decompressed size as far as the frame header knows it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentSize {
    /// The encoder recorded the size
    Known(u64),
    /// The encoder did not opt into recording the size
    Unknown,
}

/// Parsed frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub window_log: u32,
    pub content_size: Option<u64>,
    pub dict_id: Option<u32>,
    pub checksum: bool,
}

impl FrameHeader {
    /// Encoded size of this header
    pub fn encoded_len(&self) -> usize {
        FRAME_HEADER_MIN_SIZE
            + self.content_size.map_or(0, varint_size)
            + if self.dict_id.is_some() { 4 } else { 0 }
    }

    #[inline]
    pub fn window_size(&self) -> usize {
        1 << self.window_log
    }

    /// Write the header; returns bytes written
    pub fn write(&self, dst: &mut [u8]) -> Result<usize> {
        let len = self.encoded_len();
        if dst.len() < len {
            return Err(Error::OutputTooSmall {
                required: len,
                provided: dst.len(),
            });
        }

        let mut descriptor = FORMAT_VERSION << VERSION_SHIFT;
        if self.content_size.is_some() {
            descriptor |= FLAG_CONTENT_SIZE;
        }
        if self.dict_id.is_some() {
            descriptor |= FLAG_DICT_ID;
        }
        if self.checksum {
            descriptor |= FLAG_CHECKSUM;
        }

        dst[..4].copy_from_slice(&FRAME_MAGIC.to_le_bytes());
        dst[4] = descriptor;
        dst[5] = self.window_log as u8;
        let mut n = FRAME_HEADER_MIN_SIZE;
        if let Some(size) = self.content_size {
            n += encode_varint(&mut dst[n..], size)?;
        }
        if let Some(id) = self.dict_id {
            dst[n..n + 4].copy_from_slice(&id.to_le_bytes());
            n += 4;
        }
        Ok(n)
    }

    /// Length of the header at the start of `src`, or `None` if more bytes are
    /// needed to tell. Rejects a bad magic number as soon as 4 bytes are seen.
    pub fn peek_len(src: &[u8]) -> Result<Option<usize>> {
        if src.len() < 4 {
            return Ok(None);
        }
        if u32::from_le_bytes([src[0], src[1], src[2], src[3]]) != FRAME_MAGIC {
            return Err(Error::UnsupportedFormat);
        }
        if src.len() < FRAME_HEADER_MIN_SIZE {
            return Ok(None);
        }

        let descriptor = src[4];
        let mut len = FRAME_HEADER_MIN_SIZE;
        if descriptor & FLAG_CONTENT_SIZE != 0 {
            match scan_varint(&src[len..])? {
                VarintScan::Complete(n) => len += n,
                VarintScan::Incomplete => return Ok(None),
            }
        }
        if descriptor & FLAG_DICT_ID != 0 {
            len += 4;
        }
        Ok(if src.len() >= len { Some(len) } else { None })
    }

    /// Parse the header at the start of `src`; returns it with its length
    pub fn parse(src: &[u8]) -> Result<(FrameHeader, usize)> {
        if src.len() < 4 {
            return Err(Error::CorruptData("truncated frame header"));
        }
        if u32::from_le_bytes([src[0], src[1], src[2], src[3]]) != FRAME_MAGIC {
            return Err(Error::UnsupportedFormat);
        }
        if src.len() < FRAME_HEADER_MIN_SIZE {
            return Err(Error::CorruptData("truncated frame header"));
        }

        let descriptor = src[4];
        if descriptor >> VERSION_SHIFT != FORMAT_VERSION {
            return Err(Error::UnsupportedFormat);
        }
        if descriptor & FLAG_RESERVED_MASK != 0 {
            return Err(Error::CorruptData("reserved frame descriptor bits set"));
        }

        let window_log = src[5] as u32;
        if !(WINDOWLOG_MIN..=WINDOWLOG_MAX).contains(&window_log) {
            return Err(Error::CorruptData("frame window out of range"));
        }

        let mut n = FRAME_HEADER_MIN_SIZE;
        let content_size = if descriptor & FLAG_CONTENT_SIZE != 0 {
            let (size, used) = decode_varint(&src[n..])?;
            n += used;
            Some(size)
        } else {
            None
        };

        let dict_id = if descriptor & FLAG_DICT_ID != 0 {
            if src.len() < n + 4 {
                return Err(Error::CorruptData("truncated frame header"));
            }
            let id = u32::from_le_bytes([src[n], src[n + 1], src[n + 2], src[n + 3]]);
            n += 4;
            if id == 0 {
                return Err(Error::CorruptData("zero dictionary id"));
            }
            Some(id)
        } else {
            None
        };

        Ok((
            FrameHeader {
                window_log,
                content_size,
                dict_id,
                checksum: descriptor & FLAG_CHECKSUM != 0,
            },
            n,
        ))
    }
}

/// Kind of block payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    Raw,
    Rle,
    Compressed,
}

/// Parsed block header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub last: bool,
    pub block_type: BlockType,
    pub size: usize,
}

impl BlockHeader {
    /// Bytes of payload following the header
    #[inline]
    pub fn payload_len(&self) -> usize {
        match self.block_type {
            BlockType::Rle => 1,
            _ => self.size,
        }
    }

    pub fn write(&self, dst: &mut [u8]) {
        let kind = match self.block_type {
            BlockType::Raw => BLOCK_TYPE_RAW,
            BlockType::Rle => BLOCK_TYPE_RLE,
            BlockType::Compressed => BLOCK_TYPE_COMPRESSED,
        };
        let v = (self.size as u32) << 3 | (kind as u32) << 1 | self.last as u32;
        dst[..BLOCK_HEADER_SIZE].copy_from_slice(&v.to_le_bytes()[..BLOCK_HEADER_SIZE]);
    }

    /// Parse a block header, rejecting sizes above `block_size_max`
    pub fn parse(src: &[u8], block_size_max: usize) -> Result<BlockHeader> {
        if src.len() < BLOCK_HEADER_SIZE {
            return Err(Error::CorruptData("truncated block header"));
        }
        let v = u32::from_le_bytes([src[0], src[1], src[2], 0]);
        let block_type = match (v >> 1) & 0x3 {
            0 => BlockType::Raw,
            1 => BlockType::Rle,
            2 => BlockType::Compressed,
            _ => return Err(Error::CorruptData("reserved block type")),
        };
        let size = (v >> 3) as usize;
        if size > block_size_max {
            return Err(Error::CorruptData("block larger than window allows"));
        }
        Ok(BlockHeader {
            last: v & 1 != 0,
            block_type,
            size,
        })
    }
}

/// Decompressed size recorded in the frame at the start of `src`.
///
/// Reads only the header; returns `Unknown` when the encoder did not set the
/// content size flag.
pub fn find_decompressed_size(src: &[u8]) -> Result<ContentSize> {
    let (header, _) = FrameHeader::parse(src)?;
    Ok(match header.content_size {
        Some(size) => ContentSize::Known(size),
        None => ContentSize::Unknown,
    })
}

/// Total length of the frame at the start of `src`, trailer included.
///
/// Walks block headers without decompressing anything.
pub fn find_frame_compressed_size(src: &[u8]) -> Result<usize> {
    let (header, mut pos) = FrameHeader::parse(src)?;
    let block_max = crate::params::block_size_for_window(header.window_log);
    loop {
        let block = BlockHeader::parse(&src[pos.min(src.len())..], block_max)?;
        pos += BLOCK_HEADER_SIZE + block.payload_len();
        if pos > src.len() {
            return Err(Error::CorruptData("truncated block"));
        }
        if block.last {
            break;
        }
    }
    if header.checksum {
        pos += CHECKSUM_SIZE;
        if pos > src.len() {
            return Err(Error::CorruptData("truncated checksum"));
        }
    }
    Ok(pos)
}
