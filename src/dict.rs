// Copyright 2024 Karpeles Lab Inc.
// Based on the S2 compression format by Klaus Post
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Dictionary support
//!
//! A dictionary is either plain content or a trained dictionary:
//!
//! ```text
//! trained := magic u32 LE (0xEC30A437) | dict_id u32 LE | uvarint(repeat_index) | content
//! ```
//!
//! The repeat index marks a position in the content; the first repeat offset
//! of every frame points back at it. Plain content has no repeat seed and is
//! identified by its checksum.
//!
//! Dictionaries can be handed to sessions as raw bytes or preprocessed once
//! into a [`CompressionDictionary`] or [`DecompressionDictionary`] living in
//! its own workspace. Both paths produce and accept the same frames.

use tracing::debug;

use crate::checksum::dictionary_id;
use crate::constants::*;
use crate::encode::{fill_tables, MatchTables};
use crate::error::{Error, Result};
use crate::params::Parameters;
use crate::sizing;
use crate::varint::{decode_varint, encode_varint, varint_size};
use crate::workspace::{Region, Table, Workspace};

/// Trained dictionary header without the varint
const TRAINED_HEADER_SIZE: usize = 8;

/// A parsed dictionary, borrowing its content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DictionaryContent<'b> {
    pub(crate) id: u32,
    pub(crate) content: &'b [u8],
    /// Position in `content` the first repeat offset points at
    pub(crate) repeat_index: Option<usize>,
}

impl<'b> DictionaryContent<'b> {
    /// Parse raw dictionary bytes. Empty input means no dictionary.
    pub(crate) fn parse(bytes: &'b [u8]) -> Result<Option<Self>> {
        if bytes.is_empty() {
            return Ok(None);
        }
        if bytes.len() < 4 || u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) != DICT_MAGIC {
            return Ok(Some(DictionaryContent {
                id: dictionary_id(bytes),
                content: bytes,
                repeat_index: None,
            }));
        }

        if bytes.len() < TRAINED_HEADER_SIZE {
            return Err(Error::CorruptDictionary("truncated header"));
        }
        let id = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if id == 0 {
            return Err(Error::CorruptDictionary("zero dictionary id"));
        }
        let (repeat_index, n) = decode_varint(&bytes[TRAINED_HEADER_SIZE..])
            .map_err(|_| Error::CorruptDictionary("bad repeat index"))?;
        let content = &bytes[TRAINED_HEADER_SIZE + n..];
        if content.is_empty() {
            return Err(Error::CorruptDictionary("no content"));
        }
        if repeat_index > content.len() as u64 {
            return Err(Error::CorruptDictionary("repeat index past content"));
        }

        Ok(Some(DictionaryContent {
            id,
            content,
            repeat_index: Some(repeat_index as usize),
        }))
    }

    /// The part of the content a frame with this window can reference
    pub(crate) fn tail(&self, window_size: usize) -> &'b [u8] {
        &self.content[self.content.len().saturating_sub(window_size)..]
    }

    /// Initial repeat offset for a frame with this window, 0 for none
    pub(crate) fn repeat_seed(&self, window_size: usize) -> usize {
        match self.repeat_index {
            Some(index) => {
                let distance = self.content.len() - index;
                if distance <= window_size {
                    distance
                } else {
                    0
                }
            }
            None => 0,
        }
    }
}

/// Identifier a dictionary will be recorded under in frame headers.
///
/// Returns `None` for empty input, which sessions treat as no dictionary.
pub fn dictionary_id_of(bytes: &[u8]) -> Result<Option<u32>> {
    Ok(DictionaryContent::parse(bytes)?.map(|d| d.id))
}

/// Write a trained dictionary around `content`.
///
/// If `search_start` is given, the repeat index is set to the last occurrence
/// of the longest prefix of it (at least 4 bytes) that still leaves 8 bytes of
/// content after it. Without a match the dictionary carries no repeat seed.
/// Returns the number of bytes written.
pub fn finalize_dictionary(
    dst: &mut [u8],
    content: &[u8],
    dict_id: u32,
    search_start: Option<&[u8]>,
) -> Result<usize> {
    if dict_id == 0 {
        return Err(Error::InvalidParameters("dictionary id must be non-zero"));
    }
    if content.is_empty() {
        return Err(Error::InvalidParameters("empty dictionary content"));
    }

    // Find repeat offset
    let mut repeat_index = content.len();
    if let Some(search) = search_start {
        // Find longest match, trying progressively shorter lengths
        for len in (4..=search.len()).rev() {
            if let Some(pos) = find_last_occurrence(content, &search[..len]) {
                // Make sure we have at least 8 bytes remaining
                if pos <= content.len().saturating_sub(8) {
                    repeat_index = pos;
                    break;
                }
            }
        }
    }

    let header = TRAINED_HEADER_SIZE + varint_size(repeat_index as u64);
    let total = header + content.len();
    if dst.len() < total {
        return Err(Error::OutputTooSmall {
            required: total,
            provided: dst.len(),
        });
    }

    dst[..4].copy_from_slice(&DICT_MAGIC.to_le_bytes());
    dst[4..8].copy_from_slice(&dict_id.to_le_bytes());
    encode_varint(&mut dst[TRAINED_HEADER_SIZE..header], repeat_index as u64)?;
    dst[header..total].copy_from_slice(content);
    Ok(total)
}

/// Find last occurrence of needle in haystack
fn find_last_occurrence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }

    #[allow(clippy::manual_find)]
    for i in (0..=haystack.len() - needle.len()).rev() {
        if &haystack[i..i + needle.len()] == needle {
            return Some(i);
        }
    }
    None
}

/// Dictionary preprocessed for compression.
///
/// Holds the part of the content the parameters' window can reach, hashed
/// with the parameters' table geometry. Read-only once built, so one instance
/// can be shared by reference across threads and sessions.
#[derive(Debug)]
pub struct CompressionDictionary<'a> {
    workspace: Workspace<'a>,
    params: Parameters,
    id: u32,
    repeat: usize,
    content: Region,
    hash: Region,
    chain: Region,
}

impl<'a> CompressionDictionary<'a> {
    /// Preprocess `bytes` inside `workspace`.
    ///
    /// The workspace must hold at least
    /// [`compression_dictionary_size`](crate::compression_dictionary_size)
    /// for these parameters and `bytes.len()`.
    pub fn new(mut workspace: Workspace<'a>, bytes: &[u8], params: &Parameters) -> Result<Self> {
        params.validate()?;
        let cparams = params.cparams;
        let layout = sizing::compression_dictionary_layout(&cparams, bytes.len());
        let [content, hash, chain] = layout.claim(&mut workspace)?;

        let parsed = DictionaryContent::parse(bytes)?;
        let window_size = cparams.window_size();
        let (id, tail, repeat) = match parsed {
            Some(d) => (d.id, d.tail(window_size), d.repeat_seed(window_size)),
            None => (0, &[][..], 0),
        };

        let [content_buf, hash_buf, chain_buf] = workspace.regions_mut([content, hash, chain]);
        content_buf[..tail.len()].copy_from_slice(tail);
        let mut tables = MatchTables {
            hash: Table::new(hash_buf),
            chain: (cparams.chain_log != 0).then(|| Table::new(chain_buf)),
        };
        tables.clear();
        fill_tables(&mut tables, &content_buf[..tail.len()], 0, tail.len(), &cparams);

        debug!(
            dict_id = id,
            loaded = tail.len(),
            window_log = cparams.window_log,
            "compression dictionary built"
        );

        Ok(CompressionDictionary {
            workspace,
            params: *params,
            id,
            repeat,
            content: Region::sub(content, tail.len()),
            hash,
            chain,
        })
    }

    /// Dictionary id, or 0 for an empty dictionary
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Parameters the dictionary was hashed for
    pub fn params(&self) -> &Parameters {
        &self.params
    }

    /// Content that sessions load as history
    pub fn content(&self) -> &[u8] {
        self.workspace.region(self.content)
    }

    pub(crate) fn repeat_seed(&self) -> usize {
        self.repeat
    }

    pub(crate) fn hash_table(&self) -> &[u8] {
        self.workspace.region(self.hash)
    }

    pub(crate) fn chain_table(&self) -> &[u8] {
        self.workspace.region(self.chain)
    }

    /// Release the workspace for reuse
    pub fn into_workspace(mut self) -> Workspace<'a> {
        self.workspace.rebuild();
        self.workspace
    }
}

/// Dictionary preprocessed for decompression
#[derive(Debug)]
pub struct DecompressionDictionary<'a> {
    workspace: Workspace<'a>,
    id: u32,
    repeat_index: Option<usize>,
    content: Region,
}

impl<'a> DecompressionDictionary<'a> {
    /// Copy and parse `bytes` into `workspace`
    pub fn new(mut workspace: Workspace<'a>, bytes: &[u8]) -> Result<Self> {
        let [content] = sizing::decompression_dictionary_layout(bytes.len()).claim(&mut workspace)?;
        let parsed = DictionaryContent::parse(bytes)?;
        let (id, body, repeat_index) = match parsed {
            Some(d) => (d.id, d.content, d.repeat_index),
            None => (0, &[][..], None),
        };
        workspace.region_mut(content)[..body.len()].copy_from_slice(body);

        debug!(dict_id = id, size = body.len(), "decompression dictionary built");

        Ok(DecompressionDictionary {
            workspace,
            id,
            repeat_index,
            content: Region::sub(content, body.len()),
        })
    }

    /// Dictionary id, or 0 for an empty dictionary
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn content(&self) -> &[u8] {
        self.workspace.region(self.content)
    }

    /// View in the same shape as freshly parsed raw bytes, or `None` when empty
    pub(crate) fn as_content(&self) -> Option<DictionaryContent<'_>> {
        (self.id != 0).then(|| DictionaryContent {
            id: self.id,
            content: self.content(),
            repeat_index: self.repeat_index,
        })
    }

    /// Release the workspace for reuse
    pub fn into_workspace(mut self) -> Workspace<'a> {
        self.workspace.rebuild();
        self.workspace
    }
}
