// Copyright 2024 Karpeles Lab Inc.
// Based on the S2 compression format by Klaus Post
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! One-shot decompression
//!
//! The one-shot decoder writes straight into the caller's output, which also
//! serves as the match history, so it needs no window of its own. Its
//! workspace only keeps the header of the last decoded frame.

use tracing::{debug, trace};

use crate::checksum::crc;
use crate::constants::*;
use crate::decode::decode_block;
use crate::dict::{DecompressionDictionary, DictionaryContent};
use crate::error::{Error, Result};
use crate::frame::{BlockHeader, BlockType, FrameHeader};
use crate::params::block_size_for_window;
use crate::sizing;
use crate::workspace::{Region, Workspace};

/// Check a frame's dictionary id against the dictionary on hand
pub(crate) fn check_dictionary(header: &FrameHeader, dict: Option<&DictionaryContent<'_>>) -> Result<()> {
    match (header.dict_id, dict) {
        (Some(expected), None) => Err(Error::DictionaryMismatch {
            expected,
            provided: 0,
        }),
        (Some(expected), Some(d)) if d.id != expected => Err(Error::DictionaryMismatch {
            expected,
            provided: d.id,
        }),
        _ => Ok(()),
    }
}

/// Reject frames whose window exceeds what the decoder was built for
pub(crate) fn check_window(header: &FrameHeader, max_window_log: u32) -> Result<()> {
    if header.window_log > max_window_log {
        return Err(Error::WindowTooLarge {
            window_log: header.window_log,
            max_window_log,
        });
    }
    Ok(())
}

/// One-shot decompressor living in a workspace
#[derive(Debug)]
pub struct DecompressionContext<'a> {
    workspace: Workspace<'a>,
    max_window_log: u32,
    state: Region,
}

impl<'a> DecompressionContext<'a> {
    /// Build a context accepting frames with windows up to `2^max_window_log`
    pub fn new(mut workspace: Workspace<'a>, max_window_log: u32) -> Result<Self> {
        let size = sizing::decompression_context_size(max_window_log)?;
        let [state] = sizing::decompression_context_layout().claim(&mut workspace)?;
        workspace.region_mut(state)[0] = 0;

        debug!(max_window_log, workspace = size, "decompression context built");

        Ok(DecompressionContext {
            workspace,
            max_window_log,
            state,
        })
    }

    /// Largest window log this context accepts
    pub fn max_window_log(&self) -> u32 {
        self.max_window_log
    }

    /// Decompress every frame in `src` into `dst`; returns the bytes written
    pub fn decompress(&mut self, dst: &mut [u8], src: &[u8]) -> Result<usize> {
        self.decompress_frames(dst, src, None)
    }

    /// Decompress frames made against raw dictionary bytes
    pub fn decompress_using_dict(&mut self, dst: &mut [u8], src: &[u8], dict: &[u8]) -> Result<usize> {
        let dict = DictionaryContent::parse(dict)?;
        self.decompress_frames(dst, src, dict.as_ref())
    }

    /// Decompress frames made against a preprocessed dictionary
    pub fn decompress_using_dictionary(
        &mut self,
        dst: &mut [u8],
        src: &[u8],
        ddict: &DecompressionDictionary<'_>,
    ) -> Result<usize> {
        let dict = ddict.as_content();
        self.decompress_frames(dst, src, dict.as_ref())
    }

    /// Header of the most recently decoded frame
    pub fn last_frame_header(&self) -> Option<FrameHeader> {
        let state = self.workspace.region(self.state);
        let len = state[0] as usize;
        if len == 0 {
            return None;
        }
        FrameHeader::parse(&state[1..1 + len]).ok().map(|(h, _)| h)
    }

    /// Tear the context down and hand back its workspace, rewound
    pub fn into_workspace(mut self) -> Workspace<'a> {
        self.workspace.rebuild();
        self.workspace
    }

    fn decompress_frames(
        &mut self,
        dst: &mut [u8],
        src: &[u8],
        dict: Option<&DictionaryContent<'_>>,
    ) -> Result<usize> {
        if src.is_empty() {
            return Err(Error::CorruptData("no frame"));
        }

        let mut consumed = 0;
        let mut produced = 0;
        while consumed < src.len() {
            let (used, written) = self.decompress_frame(&mut dst[produced..], &src[consumed..], dict)?;
            consumed += used;
            produced += written;
        }
        Ok(produced)
    }

    /// Decode the frame at the start of `src`; returns (consumed, produced)
    fn decompress_frame(
        &mut self,
        dst: &mut [u8],
        src: &[u8],
        dict: Option<&DictionaryContent<'_>>,
    ) -> Result<(usize, usize)> {
        let (header, mut pos) = FrameHeader::parse(src)?;
        check_window(&header, self.max_window_log)?;
        check_dictionary(&header, dict)?;

        if let Some(size) = header.content_size {
            if size > dst.len() as u64 {
                return Err(Error::OutputTooSmall {
                    required: size.try_into().unwrap_or(usize::MAX),
                    provided: dst.len(),
                });
            }
        }

        let window_size = header.window_size();
        let block_max = block_size_for_window(header.window_log);
        let prefix = dict.map_or(&[][..], |d| d.tail(window_size));
        let mut repeat = dict.map_or(0, |d| d.repeat_seed(window_size));
        let mut d = 0;

        loop {
            let block = BlockHeader::parse(&src[pos.min(src.len())..], block_max)?;
            pos += BLOCK_HEADER_SIZE;
            let payload = src
                .get(pos..pos + block.payload_len())
                .ok_or(Error::CorruptData("truncated block"))?;

            let n = match block.block_type {
                BlockType::Raw | BlockType::Rle => {
                    if dst.len() - d < block.size {
                        return Err(Error::OutputTooSmall {
                            required: d + block.size,
                            provided: dst.len(),
                        });
                    }
                    match block.block_type {
                        BlockType::Raw => dst[d..d + block.size].copy_from_slice(payload),
                        _ => dst[d..d + block.size].fill(payload[0]),
                    }
                    block.size
                }
                BlockType::Compressed => {
                    decode_block(payload, prefix, dst, d, window_size, block_max, &mut repeat)?
                }
            };
            trace!(block_type = ?block.block_type, size = n, last = block.last, "block decoded");

            d += n;
            pos += block.payload_len();
            if block.last {
                break;
            }
        }

        if let Some(size) = header.content_size {
            if size != d as u64 {
                return Err(Error::CorruptData("content size mismatch"));
            }
        }

        if header.checksum {
            let trailer = src
                .get(pos..pos + CHECKSUM_SIZE)
                .ok_or(Error::CorruptData("truncated checksum"))?;
            let expected = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
            let actual = crc(&dst[..d]);
            if expected != actual {
                return Err(Error::ChecksumMismatch { expected, actual });
            }
            pos += CHECKSUM_SIZE;
        }

        let state = self.workspace.region_mut(self.state);
        let len = header.write(&mut state[1..])?;
        state[0] = len as u8;

        Ok((pos, d))
    }
}
