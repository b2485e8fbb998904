// Copyright 2024 Karpeles Lab Inc.
// Based on the S2 compression format by Klaus Post
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Streaming decompression
//!
//! A [`DecompressionStream`] takes compressed input in pieces of any size.
//! Header fields, block headers and block payloads are gathered in workspace
//! buffers until complete; decoded blocks land in a window buffer that keeps
//! the match history and drains into the caller's output. Frames can follow
//! each other back to back.

use tracing::{debug, trace};

use crate::checksum::ContentChecksum;
use crate::constants::*;
use crate::cstream::Progress;
use crate::decode::decode_block;
use crate::decompress::{check_dictionary, check_window};
use crate::dict::{DecompressionDictionary, DictionaryContent};
use crate::error::{Error, Result};
use crate::frame::{BlockHeader, BlockType, FrameHeader};
use crate::params::block_size_for_window;
use crate::sizing;
use crate::workspace::{Region, Workspace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Header,
    BlockHeader,
    Block(BlockHeader),
    Checksum,
    Done,
}

/// Move bytes from `src[*consumed..]` into `buf` until it holds `want`.
/// Returns true once it does.
fn gather(buf: &mut [u8], staged: &mut usize, want: usize, src: &[u8], consumed: &mut usize) -> bool {
    let avail = &src[*consumed..];
    let n = (want - *staged).min(avail.len());
    buf[*staged..*staged + n].copy_from_slice(&avail[..n]);
    *staged += n;
    *consumed += n;
    *staged == want
}

/// Decoder progress through the current frame
#[derive(Debug)]
struct FrameState {
    stage: Stage,
    header: Option<FrameHeader>,
    block_max: usize,
    /// Bytes gathered for the current header, block or trailer
    staged: usize,
    /// Window bytes holding history and decoded output
    fill: usize,
    /// Window bytes already handed to the caller
    flushed: usize,
    repeat: usize,
    checksum: ContentChecksum,
    produced: u64,
}

impl FrameState {
    fn new() -> Self {
        FrameState {
            stage: Stage::Header,
            header: None,
            block_max: BLOCK_SIZE_MAX,
            staged: 0,
            fill: 0,
            flushed: 0,
            repeat: 0,
            checksum: ContentChecksum::new(),
            produced: 0,
        }
    }

    fn start_frame(
        &mut self,
        header: FrameHeader,
        window: &mut [u8],
        dict: Option<&DictionaryContent<'_>>,
        max_window_log: u32,
    ) -> Result<()> {
        check_window(&header, max_window_log)?;
        check_dictionary(&header, dict)?;

        let window_size = header.window_size();
        let tail = dict.map_or(&[][..], |d| d.tail(window_size));
        window[..tail.len()].copy_from_slice(tail);

        self.block_max = block_size_for_window(header.window_log);
        self.fill = tail.len();
        self.flushed = self.fill;
        self.repeat = dict.map_or(0, |d| d.repeat_seed(window_size));
        self.checksum.reset();
        self.produced = 0;
        self.header = Some(header);
        self.staged = 0;
        self.stage = Stage::BlockHeader;

        trace!(window_log = header.window_log, dict_id = ?header.dict_id, "frame started");
        Ok(())
    }

    fn finish_frame(&mut self) -> Result<()> {
        if let Some(size) = self.header.and_then(|h| h.content_size) {
            if size != self.produced {
                return Err(Error::CorruptData("content size mismatch"));
            }
        }
        self.stage = Stage::Done;
        Ok(())
    }

    /// Keep one window of history and make room for a full block.
    /// Everything must have been handed out already.
    fn make_room(&mut self, window: &mut [u8], window_size: usize) {
        if self.fill + self.block_max <= window.len() {
            return;
        }
        let shift = self.fill.saturating_sub(window_size).min(self.flushed);
        window.copy_within(shift..self.fill, 0);
        self.fill -= shift;
        self.flushed -= shift;
    }

    #[allow(clippy::too_many_arguments)]
    fn run(
        &mut self,
        scratch: &mut [u8],
        input: &mut [u8],
        window: &mut [u8],
        dict: Option<&DictionaryContent<'_>>,
        max_window_log: u32,
        src: &[u8],
        dst: &mut [u8],
    ) -> Result<Progress> {
        let mut progress = Progress::default();
        loop {
            // Hand out decoded bytes first
            if self.flushed < self.fill {
                let n = (self.fill - self.flushed).min(dst.len() - progress.produced);
                dst[progress.produced..progress.produced + n]
                    .copy_from_slice(&window[self.flushed..self.flushed + n]);
                self.flushed += n;
                progress.produced += n;
                if self.flushed < self.fill {
                    break;
                }
            }

            match self.stage {
                Stage::Done => {
                    if progress.consumed == src.len() {
                        break;
                    }
                    self.stage = Stage::Header;
                    self.staged = 0;
                }
                Stage::Header => {
                    let want = if self.staged < 4 {
                        4
                    } else {
                        match FrameHeader::peek_len(&scratch[..self.staged])? {
                            Some(len) if len == self.staged => {
                                let (header, _) = FrameHeader::parse(&scratch[..len])?;
                                self.start_frame(header, window, dict, max_window_log)?;
                                continue;
                            }
                            Some(len) => len,
                            None if self.staged < FRAME_HEADER_MIN_SIZE => FRAME_HEADER_MIN_SIZE,
                            None => self.staged + 1,
                        }
                    };
                    if !gather(scratch, &mut self.staged, want, src, &mut progress.consumed) {
                        break;
                    }
                }
                Stage::BlockHeader => {
                    if !gather(scratch, &mut self.staged, BLOCK_HEADER_SIZE, src, &mut progress.consumed) {
                        break;
                    }
                    let block = BlockHeader::parse(&scratch[..BLOCK_HEADER_SIZE], self.block_max)?;
                    self.staged = 0;
                    self.stage = Stage::Block(block);
                }
                Stage::Block(block) => {
                    if !gather(input, &mut self.staged, block.payload_len(), src, &mut progress.consumed) {
                        break;
                    }

                    let Some(header) = self.header else {
                        return Err(Error::CorruptData("block outside a frame"));
                    };
                    let window_size = header.window_size();
                    self.make_room(window, window_size);

                    let start = self.fill;
                    let n = match block.block_type {
                        BlockType::Raw => {
                            window[start..start + block.size].copy_from_slice(&input[..block.size]);
                            block.size
                        }
                        BlockType::Rle => {
                            window[start..start + block.size].fill(input[0]);
                            block.size
                        }
                        BlockType::Compressed => decode_block(
                            &input[..block.payload_len()],
                            &[],
                            window,
                            start,
                            window_size,
                            self.block_max,
                            &mut self.repeat,
                        )?,
                    };
                    self.checksum.update(&window[start..start + n]);
                    self.fill += n;
                    self.produced += n as u64;
                    self.staged = 0;
                    trace!(block_type = ?block.block_type, size = n, last = block.last, "block decoded");

                    if !block.last {
                        self.stage = Stage::BlockHeader;
                    } else if header.checksum {
                        self.stage = Stage::Checksum;
                    } else {
                        self.finish_frame()?;
                    }
                }
                Stage::Checksum => {
                    if !gather(scratch, &mut self.staged, CHECKSUM_SIZE, src, &mut progress.consumed) {
                        break;
                    }
                    let expected = u32::from_le_bytes([scratch[0], scratch[1], scratch[2], scratch[3]]);
                    let actual = self.checksum.value();
                    if expected != actual {
                        return Err(Error::ChecksumMismatch { expected, actual });
                    }
                    self.staged = 0;
                    self.finish_frame()?;
                }
            }
        }
        Ok(progress)
    }
}

/// Streaming decompressor living in a workspace
#[derive(Debug)]
pub struct DecompressionStream<'a, 'd> {
    workspace: Workspace<'a>,
    max_window_log: u32,
    dict: Option<DictionaryContent<'d>>,
    regions: [Region; 3],
    frame: FrameState,
    error: Option<Error>,
}

impl<'a, 'd> DecompressionStream<'a, 'd> {
    /// Build a stream accepting frames with windows up to `2^max_window_log`
    pub fn new(workspace: Workspace<'a>, max_window_log: u32) -> Result<Self> {
        Self::with_content(workspace, max_window_log, None)
    }

    /// Build a stream that decodes frames made against `ddict`
    pub fn with_dictionary(
        workspace: Workspace<'a>,
        max_window_log: u32,
        ddict: &'d DecompressionDictionary<'d>,
    ) -> Result<Self> {
        Self::with_content(workspace, max_window_log, ddict.as_content())
    }

    /// Build a stream that decodes frames made against raw dictionary bytes
    pub fn with_dict_bytes(workspace: Workspace<'a>, max_window_log: u32, dict: &'d [u8]) -> Result<Self> {
        Self::with_content(workspace, max_window_log, DictionaryContent::parse(dict)?)
    }

    fn with_content(
        mut workspace: Workspace<'a>,
        max_window_log: u32,
        dict: Option<DictionaryContent<'d>>,
    ) -> Result<Self> {
        let size = sizing::decompression_stream_size(max_window_log)?;
        let regions = sizing::decompression_stream_layout(max_window_log).claim(&mut workspace)?;

        debug!(
            max_window_log,
            workspace = size,
            dict_id = dict.map(|d| d.id),
            "decompression stream built"
        );

        Ok(DecompressionStream {
            workspace,
            max_window_log,
            dict,
            regions,
            frame: FrameState::new(),
            error: None,
        })
    }

    /// Take compressed input from `src` and write decoded output to `dst`.
    ///
    /// Stops when all input is taken or `dst` is full. After any error the
    /// stream keeps returning that error until [`reset`](Self::reset).
    pub fn feed(&mut self, src: &[u8], dst: &mut [u8]) -> Result<Progress> {
        if let Some(err) = self.error {
            return Err(err);
        }

        let [scratch, input, window] = self.workspace.regions_mut(self.regions);
        let result = self.frame.run(
            scratch,
            input,
            window,
            self.dict.as_ref(),
            self.max_window_log,
            src,
            dst,
        );
        if let Err(err) = result {
            debug!(%err, "decompression stream poisoned");
            self.error = Some(err);
        }
        result
    }

    /// True once the last frame started has been decoded, verified and fully
    /// handed out
    pub fn is_frame_complete(&self) -> bool {
        self.frame.stage == Stage::Done && self.frame.flushed == self.frame.fill
    }

    /// Header of the frame being decoded (or last decoded)
    pub fn frame_header(&self) -> Option<FrameHeader> {
        self.frame.header
    }

    /// Drop any partial frame and clear a stored error
    pub fn reset(&mut self) {
        self.frame = FrameState::new();
        self.error = None;
        debug!("decompression stream reset");
    }

    /// Tear the stream down and hand back its workspace, rewound
    pub fn into_workspace(mut self) -> Workspace<'a> {
        self.workspace.rebuild();
        self.workspace
    }
}
