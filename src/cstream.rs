// Copyright 2024 Karpeles Lab Inc.
// Based on the S2 compression format by Klaus Post
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Streaming compression
//!
//! A [`CompressionStream`] accepts input in pieces of any size and hands
//! compressed output back through caller buffers of any size. Input is
//! gathered in the window until a block is full; encoded blocks wait in a
//! staging buffer until the caller has room for them.
//!
//! ```
//! use arenalz::{compression_stream_size, CompressionStream, Parameters, Workspace};
//!
//! let params = Parameters::level(1);
//! let mut memory = vec![0u8; compression_stream_size(&params.cparams).unwrap()];
//! let mut stream = CompressionStream::new(Workspace::new(&mut memory), params, None).unwrap();
//!
//! let mut out = [0u8; 256];
//! let mut written = 0;
//! let progress = stream.feed(b"Hello world", &mut out).unwrap();
//! assert_eq!(progress.consumed, 11);
//! written += progress.produced;
//! loop {
//!     let status = stream.end(&mut out[written..]).unwrap();
//!     written += status.produced;
//!     if status.done {
//!         break;
//!     }
//! }
//! assert!(written > 0);
//! ```

use tracing::debug;

use crate::compress::{frame_header, DictSource, MatchBuffers, MatchState};
use crate::constants::CHECKSUM_SIZE;
use crate::dict::CompressionDictionary;
use crate::error::{Error, Result};
use crate::frame::FrameHeader;
use crate::params::Parameters;
use crate::sizing;
use crate::workspace::{Region, Workspace};

/// How far a [`feed`](CompressionStream::feed) call got
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    /// Input bytes taken
    pub consumed: usize,
    /// Output bytes written
    pub produced: usize,
}

/// How far a flush or end call got
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlushStatus {
    /// Output bytes written
    pub produced: usize,
    /// True once nothing is left to hand out; otherwise call again with more
    /// output space
    pub done: bool,
}

/// Lifecycle of a compression stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStage {
    /// Frame begun, no input yet
    Idle,
    /// Taking input
    Active,
    /// A flush or end is waiting for output space
    Flushing,
    /// Frame finished; only reset is allowed
    Ended,
}

/// Streaming compressor living in a workspace
#[derive(Debug)]
pub struct CompressionStream<'a, 'd> {
    workspace: Workspace<'a>,
    params: Parameters,
    dict: DictSource<'d>,
    regions: [Region; 4],
    state: MatchState,
    stage: StreamStage,
    pledged: Option<u64>,
    header_written: bool,
    last_written: bool,
    staged: usize,
    drained: usize,
}

/// Encode the pending block into `staging`, with the frame header in front
/// of it when given and the checksum behind it when `last`
fn encode_into_staging(
    state: &mut MatchState,
    bufs: &mut MatchBuffers<'_>,
    staging: &mut [u8],
    header: Option<FrameHeader>,
    last: bool,
    checksum: bool,
) -> Result<usize> {
    let mut n = 0;
    if let Some(header) = header {
        n += header.write(staging)?;
    }
    n += state.encode_block(bufs, last, &mut staging[n..])?;
    if last && checksum {
        staging[n..n + CHECKSUM_SIZE].copy_from_slice(&state.checksum().to_le_bytes());
        n += CHECKSUM_SIZE;
    }
    Ok(n)
}

impl<'a, 'd> CompressionStream<'a, 'd> {
    /// Build a stream for `params` inside `workspace`.
    ///
    /// `pledged_src_size` promises the total input length of the first
    /// frame; see [`reset`](Self::reset).
    pub fn new(workspace: Workspace<'a>, params: Parameters, pledged_src_size: Option<u64>) -> Result<Self> {
        Self::with_source(workspace, params, DictSource::None, pledged_src_size)
    }

    /// Build a stream that compresses every frame against `cdict`.
    ///
    /// The workspace is sized from `params`, which need not match the
    /// parameters the dictionary was built with. A window smaller than the
    /// dictionary keeps only its tail.
    pub fn with_dictionary(
        workspace: Workspace<'a>,
        params: Parameters,
        cdict: &'d CompressionDictionary<'d>,
        pledged_src_size: Option<u64>,
    ) -> Result<Self> {
        Self::with_source(workspace, params, DictSource::Prepared(cdict), pledged_src_size)
    }

    /// Build a stream that compresses every frame against raw dictionary bytes
    pub fn with_dict_bytes(
        workspace: Workspace<'a>,
        params: Parameters,
        dict: &'d [u8],
        pledged_src_size: Option<u64>,
    ) -> Result<Self> {
        Self::with_source(workspace, params, DictSource::from_bytes(dict)?, pledged_src_size)
    }

    fn with_source(
        mut workspace: Workspace<'a>,
        params: Parameters,
        dict: DictSource<'d>,
        pledged: Option<u64>,
    ) -> Result<Self> {
        params.validate()?;
        let regions = sizing::compression_stream_layout(&params.cparams).claim(&mut workspace)?;

        debug!(
            window_log = params.cparams.window_log,
            hash_log = params.cparams.hash_log,
            workspace = workspace.used(),
            "compression stream built"
        );

        let mut stream = CompressionStream {
            workspace,
            params,
            dict,
            regions,
            state: MatchState::new(params.cparams),
            stage: StreamStage::Idle,
            pledged,
            header_written: false,
            last_written: false,
            staged: 0,
            drained: 0,
        };
        stream.begin_frame();
        Ok(stream)
    }

    fn begin_frame(&mut self) {
        let [window, hash, chain, _] = self.workspace.regions_mut(self.regions);
        let mut bufs = MatchBuffers { window, hash, chain };
        self.state.begin_frame(&mut bufs, self.params.cparams, self.dict);
        self.stage = StreamStage::Idle;
        self.header_written = false;
        self.last_written = false;
        self.staged = 0;
        self.drained = 0;
    }

    /// Parameters every frame of this stream is compressed with
    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn stage(&self) -> StreamStage {
        self.stage
    }

    /// Abandon the current frame and start a new, independent one.
    ///
    /// When `pledged_src_size` is given the frame must receive exactly that
    /// many bytes, and the header records it if the content size flag is set.
    pub fn reset(&mut self, pledged_src_size: Option<u64>) {
        self.pledged = pledged_src_size;
        self.begin_frame();
        debug!(pledged = ?pledged_src_size, "compression stream reset");
    }

    /// Copy staged output into `dst`; returns bytes written
    fn drain(&mut self, dst: &mut [u8]) -> usize {
        let staged = &self.workspace.region(self.regions[3])[self.drained..self.staged];
        let n = staged.len().min(dst.len());
        dst[..n].copy_from_slice(&staged[..n]);
        self.drained += n;
        if self.drained == self.staged {
            self.staged = 0;
            self.drained = 0;
        }
        n
    }

    #[inline]
    fn has_staged(&self) -> bool {
        self.drained < self.staged
    }

    /// Encode the pending input as one block into the (empty) staging buffer
    fn stage_block(&mut self, last: bool) -> Result<()> {
        let header = frame_header(&self.params, self.state.dict_id(), self.pledged);
        let [window, hash, chain, staging] = self.workspace.regions_mut(self.regions);
        let mut bufs = MatchBuffers { window, hash, chain };
        self.staged = encode_into_staging(
            &mut self.state,
            &mut bufs,
            staging,
            (!self.header_written).then_some(header),
            last,
            header.checksum,
        )?;
        self.drained = 0;
        self.header_written = true;
        Ok(())
    }

    /// Take input from `src` and write compressed output to `dst`.
    ///
    /// Stops when all input is taken or `dst` is full. Output only appears
    /// once a whole block has been gathered, so small feeds often produce
    /// nothing until [`flush`](Self::flush) or [`end`](Self::end).
    pub fn feed(&mut self, src: &[u8], dst: &mut [u8]) -> Result<Progress> {
        if self.stage == StreamStage::Ended || self.last_written {
            return Err(Error::StreamAlreadyEnded);
        }
        if let Some(pledged) = self.pledged {
            let actual = self.state.consumed() + src.len() as u64;
            if actual > pledged {
                return Err(Error::PledgedSizeMismatch { pledged, actual });
            }
        }

        let mut progress = Progress::default();
        loop {
            progress.produced += self.drain(&mut dst[progress.produced..]);
            if self.has_staged() || progress.consumed == src.len() {
                break;
            }

            let [window, hash, chain, _] = self.workspace.regions_mut(self.regions);
            let mut bufs = MatchBuffers { window, hash, chain };
            progress.consumed += self.state.append(&mut bufs, &src[progress.consumed..]);

            if self.state.pending() == self.state.block_size() {
                self.stage_block(false)?;
            }
        }

        if progress.consumed > 0 || (self.stage == StreamStage::Flushing && !self.has_staged()) {
            self.stage = StreamStage::Active;
        }
        Ok(progress)
    }

    /// Emit everything fed so far as complete blocks.
    ///
    /// The frame stays open. Returns `done == false` if `dst` filled up first.
    pub fn flush(&mut self, dst: &mut [u8]) -> Result<FlushStatus> {
        if self.stage == StreamStage::Ended {
            return Err(Error::StreamAlreadyEnded);
        }
        if self.last_written {
            return self.end(dst);
        }

        let mut produced = 0;
        loop {
            produced += self.drain(&mut dst[produced..]);
            if self.has_staged() {
                self.stage = StreamStage::Flushing;
                return Ok(FlushStatus {
                    produced,
                    done: false,
                });
            }
            if self.state.pending() == 0 {
                if self.stage == StreamStage::Flushing {
                    self.stage = StreamStage::Active;
                }
                return Ok(FlushStatus {
                    produced,
                    done: true,
                });
            }
            self.stage_block(false)?;
        }
    }

    /// Finish the frame: last block, then the checksum if enabled.
    ///
    /// Call until `done`; the stream is then [`Ended`](StreamStage::Ended)
    /// until reset.
    pub fn end(&mut self, dst: &mut [u8]) -> Result<FlushStatus> {
        if self.stage == StreamStage::Ended {
            return Err(Error::StreamAlreadyEnded);
        }
        if !self.last_written {
            if let Some(pledged) = self.pledged {
                let actual = self.state.consumed();
                if actual != pledged {
                    return Err(Error::PledgedSizeMismatch { pledged, actual });
                }
            }
        }

        let mut produced = 0;
        loop {
            produced += self.drain(&mut dst[produced..]);
            if self.has_staged() {
                self.stage = StreamStage::Flushing;
                return Ok(FlushStatus {
                    produced,
                    done: false,
                });
            }
            if self.last_written {
                self.stage = StreamStage::Ended;
                debug!(input = self.state.consumed(), "compression stream ended");
                return Ok(FlushStatus {
                    produced,
                    done: true,
                });
            }
            self.stage_block(true)?;
            self.last_written = true;
        }
    }

    /// Tear the stream down and hand back its workspace, rewound
    pub fn into_workspace(mut self) -> Workspace<'a> {
        self.workspace.rebuild();
        self.workspace
    }
}
