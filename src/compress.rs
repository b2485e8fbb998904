// Copyright 2024 Karpeles Lab Inc.
// Based on the S2 compression format by Klaus Post
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! One-shot compression and the encoder state shared with streams

use tracing::{debug, trace};

use crate::checksum::ContentChecksum;
use crate::constants::*;
use crate::dict::{CompressionDictionary, DictionaryContent};
use crate::encode::{compress_block, fill_tables, MatchTables};
use crate::error::{Error, Result};
use crate::frame::{BlockHeader, BlockType, FrameHeader};
use crate::params::{CompressionParameters, Parameters};
use crate::sizing::{self, compress_bound};
use crate::workspace::{Region, Table, Workspace};

/// Where a frame's dictionary comes from
#[derive(Debug, Clone, Copy)]
pub(crate) enum DictSource<'d> {
    None,
    Raw(DictionaryContent<'d>),
    Prepared(&'d CompressionDictionary<'d>),
}

impl<'d> DictSource<'d> {
    pub(crate) fn from_bytes(bytes: &'d [u8]) -> Result<Self> {
        Ok(match DictionaryContent::parse(bytes)? {
            Some(d) => DictSource::Raw(d),
            None => DictSource::None,
        })
    }
}

/// Workspace memory behind a [`MatchState`]
pub(crate) struct MatchBuffers<'w> {
    pub(crate) window: &'w mut [u8],
    pub(crate) hash: &'w mut [u8],
    pub(crate) chain: &'w mut [u8],
}

/// Window plus tables sized for the active parameters
fn split<'b>(bufs: &'b mut MatchBuffers<'_>, cparams: &CompressionParameters) -> (&'b mut [u8], MatchTables<'b>) {
    let chain = if cparams.chain_log != 0 {
        Some(Table::new(&mut bufs.chain[..4 << cparams.chain_log]))
    } else {
        None
    };
    let tables = MatchTables {
        hash: Table::new(&mut bufs.hash[..4 << cparams.hash_log]),
        chain,
    };
    (&mut *bufs.window, tables)
}

/// Per-frame encoder bookkeeping.
///
/// The window buffer holds dictionary history followed by frame input;
/// `block_start..fill` is input not yet encoded.
#[derive(Debug)]
pub(crate) struct MatchState {
    capacity: CompressionParameters,
    cparams: CompressionParameters,
    fill: usize,
    block_start: usize,
    repeat: usize,
    dict_id: Option<u32>,
    checksum: ContentChecksum,
    consumed: u64,
}

impl MatchState {
    /// State for buffers laid out for `capacity`
    pub(crate) fn new(capacity: CompressionParameters) -> Self {
        MatchState {
            capacity,
            cparams: capacity,
            fill: 0,
            block_start: 0,
            repeat: 0,
            dict_id: None,
            checksum: ContentChecksum::new(),
            consumed: 0,
        }
    }

    /// Parameters the buffers were sized for
    #[inline]
    pub(crate) fn capacity(&self) -> &CompressionParameters {
        &self.capacity
    }

    #[inline]
    pub(crate) fn dict_id(&self) -> Option<u32> {
        self.dict_id
    }

    /// Input bytes taken since the frame began
    #[inline]
    pub(crate) fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Input bytes waiting to be encoded
    #[inline]
    pub(crate) fn pending(&self) -> usize {
        self.fill - self.block_start
    }

    #[inline]
    pub(crate) fn block_size(&self) -> usize {
        self.cparams.block_size()
    }

    #[inline]
    pub(crate) fn checksum(&self) -> u32 {
        self.checksum.value()
    }

    /// Forget the previous frame and load the dictionary, if any.
    /// `cparams` must fit within the capacity.
    pub(crate) fn begin_frame(
        &mut self,
        bufs: &mut MatchBuffers<'_>,
        cparams: CompressionParameters,
        dict: DictSource<'_>,
    ) {
        debug_assert!(self.capacity.fits_within(&cparams));
        self.cparams = cparams;
        self.repeat = 0;
        self.dict_id = None;
        self.checksum.reset();
        self.consumed = 0;

        let window_size = cparams.window_size();
        let (window, mut tables) = split(bufs, &cparams);
        tables.clear();

        let loaded = match dict {
            DictSource::None => 0,
            DictSource::Raw(d) => {
                let tail = d.tail(window_size);
                window[..tail.len()].copy_from_slice(tail);
                fill_tables(&mut tables, window, 0, tail.len(), &cparams);
                self.repeat = d.repeat_seed(window_size);
                self.dict_id = Some(d.id);
                tail.len()
            }
            DictSource::Prepared(cdict) => {
                let content = cdict.content();
                let tail = &content[content.len().saturating_sub(window_size)..];
                window[..tail.len()].copy_from_slice(tail);
                if tail.len() == content.len() && cparams.same_hash_geometry(&cdict.params().cparams) {
                    tables.hash.as_bytes_mut().copy_from_slice(cdict.hash_table());
                    if let Some(chain) = tables.chain.as_mut() {
                        chain.as_bytes_mut().copy_from_slice(cdict.chain_table());
                    }
                } else {
                    fill_tables(&mut tables, window, 0, tail.len(), &cparams);
                }
                let seed = cdict.repeat_seed();
                self.repeat = if seed <= tail.len() { seed } else { 0 };
                self.dict_id = (cdict.id() != 0).then_some(cdict.id());
                tail.len()
            }
        };

        self.fill = loaded;
        self.block_start = loaded;
    }

    /// Copy as much of `src` as fits in the current block; returns bytes taken
    pub(crate) fn append(&mut self, bufs: &mut MatchBuffers<'_>, src: &[u8]) -> usize {
        let block_size = self.block_size();
        if self.pending() == 0 && self.fill + block_size > bufs.window.len() {
            self.slide(bufs);
        }

        let n = src.len().min(block_size - self.pending());
        bufs.window[self.fill..self.fill + n].copy_from_slice(&src[..n]);
        self.checksum.update(&src[..n]);
        self.fill += n;
        self.consumed += n as u64;
        n
    }

    /// Drop everything older than one window from the front of the buffer
    fn slide(&mut self, bufs: &mut MatchBuffers<'_>) {
        let shift = self.fill.saturating_sub(self.cparams.window_size());
        if shift == 0 {
            return;
        }
        bufs.window.copy_within(shift..self.fill, 0);
        self.fill -= shift;
        self.block_start = self.fill;

        let (_, mut tables) = split(bufs, &self.cparams);
        tables.shift_down(shift);
        trace!(shift, "window slid");
    }

    /// Encode the pending input as one block (header included) into `dst`
    pub(crate) fn encode_block(&mut self, bufs: &mut MatchBuffers<'_>, last: bool, dst: &mut [u8]) -> Result<usize> {
        let start = self.block_start;
        let end = self.fill;
        let len = end - start;
        let required = BLOCK_HEADER_SIZE + len;
        if dst.len() < required {
            return Err(Error::OutputTooSmall {
                required,
                provided: dst.len(),
            });
        }

        let cparams = self.cparams;
        let (window, mut tables) = split(bufs, &cparams);
        let window = &*window;
        let block = &window[start..end];

        let (block_type, size) = if len > 1 && block.iter().all(|&b| b == block[0]) {
            dst[BLOCK_HEADER_SIZE] = block[0];
            (BlockType::Rle, len)
        } else {
            let payload = &mut dst[BLOCK_HEADER_SIZE..required];
            match compress_block(&mut tables, window, start, end, &cparams, &mut self.repeat, payload) {
                Some(n) => (BlockType::Compressed, n),
                None => {
                    payload.copy_from_slice(block);
                    (BlockType::Raw, len)
                }
            }
        };

        let header = BlockHeader {
            last,
            block_type,
            size,
        };
        header.write(dst);
        self.block_start = end;

        trace!(?block_type, input = len, output = header.payload_len(), last, "block encoded");
        Ok(BLOCK_HEADER_SIZE + header.payload_len())
    }
}

/// Header for a frame compressed with `params`.
///
/// A frame that leaves its dictionary id out always carries a checksum, so a
/// decoder given the wrong dictionary still fails.
pub(crate) fn frame_header(params: &Parameters, dict_id: Option<u32>, content_size: Option<u64>) -> FrameHeader {
    let hide_dict = dict_id.is_some() && params.fparams.no_dict_id_flag;
    FrameHeader {
        window_log: params.cparams.window_log,
        content_size: content_size.filter(|_| params.fparams.content_size_flag),
        dict_id: dict_id.filter(|_| !hide_dict),
        checksum: params.fparams.checksum_flag || hide_dict,
    }
}

/// One-shot compressor living in a workspace.
///
/// Every call produces one complete, independent frame. The context can be
/// reused for any number of calls, with any parameters whose tables fit the
/// ones it was sized for.
#[derive(Debug)]
pub struct CompressionContext<'a> {
    workspace: Workspace<'a>,
    params: Parameters,
    regions: [Region; 3],
    state: MatchState,
}

impl<'a> CompressionContext<'a> {
    /// Build a context for `params` inside `workspace`
    pub fn new(mut workspace: Workspace<'a>, params: Parameters) -> Result<Self> {
        params.validate()?;
        let regions = sizing::compression_context_layout(&params.cparams).claim(&mut workspace)?;

        debug!(
            window_log = params.cparams.window_log,
            hash_log = params.cparams.hash_log,
            chain_log = params.cparams.chain_log,
            workspace = workspace.used(),
            "compression context built"
        );

        Ok(CompressionContext {
            workspace,
            params,
            regions,
            state: MatchState::new(params.cparams),
        })
    }

    /// Parameters the context was built with
    pub fn params(&self) -> &Parameters {
        &self.params
    }

    /// Compress `src` into `dst` with the construction parameters.
    ///
    /// `dst` must hold at least [`compress_bound`]`(src.len())` bytes.
    /// Returns the frame length.
    pub fn compress(&mut self, dst: &mut [u8], src: &[u8]) -> Result<usize> {
        let params = self.params;
        self.compress_frame(dst, src, &params, DictSource::None)
    }

    /// Compress with other parameters. Their tables must fit the workspace.
    pub fn compress_with_params(&mut self, dst: &mut [u8], src: &[u8], params: &Parameters) -> Result<usize> {
        self.compress_frame(dst, src, params, DictSource::None)
    }

    /// Compress against raw dictionary bytes (plain or trained)
    pub fn compress_using_dict(
        &mut self,
        dst: &mut [u8],
        src: &[u8],
        dict: &[u8],
        params: &Parameters,
    ) -> Result<usize> {
        let dict = DictSource::from_bytes(dict)?;
        self.compress_frame(dst, src, params, dict)
    }

    /// Compress against a preprocessed dictionary, with the parameters it was
    /// built for
    pub fn compress_using_dictionary(
        &mut self,
        dst: &mut [u8],
        src: &[u8],
        cdict: &CompressionDictionary<'_>,
    ) -> Result<usize> {
        let params = *cdict.params();
        self.compress_frame(dst, src, &params, DictSource::Prepared(cdict))
    }

    /// Tear the context down and hand back its workspace, rewound
    pub fn into_workspace(mut self) -> Workspace<'a> {
        self.workspace.rebuild();
        self.workspace
    }

    fn compress_frame(
        &mut self,
        dst: &mut [u8],
        src: &[u8],
        params: &Parameters,
        dict: DictSource<'_>,
    ) -> Result<usize> {
        params.validate()?;
        if !self.state.capacity().fits_within(&params.cparams) {
            return Err(Error::InsufficientWorkspace {
                required: sizing::compression_context_size(&params.cparams)?,
                provided: self.workspace.capacity(),
            });
        }
        let bound = compress_bound(src.len());
        if dst.len() < bound {
            return Err(Error::OutputTooSmall {
                required: bound,
                provided: dst.len(),
            });
        }

        let [window, hash, chain] = self.workspace.regions_mut(self.regions);
        let mut bufs = MatchBuffers { window, hash, chain };
        self.state.begin_frame(&mut bufs, params.cparams, dict);

        let header = frame_header(params, self.state.dict_id(), Some(src.len() as u64));
        let mut n = header.write(dst)?;

        let mut pos = 0;
        loop {
            pos += self.state.append(&mut bufs, &src[pos..]);
            let last = pos == src.len();
            n += self.state.encode_block(&mut bufs, last, &mut dst[n..])?;
            if last {
                break;
            }
        }

        if header.checksum {
            dst[n..n + CHECKSUM_SIZE].copy_from_slice(&self.state.checksum().to_le_bytes());
            n += CHECKSUM_SIZE;
        }

        trace!(input = src.len(), output = n, "frame compressed");
        Ok(n)
    }
}
