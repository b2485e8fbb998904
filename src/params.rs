// Copyright 2024 Karpeles Lab Inc.
// Based on the S2 compression format by Klaus Post
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Compression and frame parameters
//!
//! A [`Parameters`] value is plain data. Sessions copy it at construction, so
//! the parameters a session runs with cannot change underneath it.

use crate::constants::*;
use crate::error::{Error, Result};

/// Match-finder and window settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompressionParameters {
    /// Log2 of the largest match distance (and of the decoder window)
    pub window_log: u32,
    /// Log2 of the number of hash table entries
    pub hash_log: u32,
    /// Log2 of the number of chain table entries; 0 disables chaining
    pub chain_log: u32,
    /// Log2 of the number of chain candidates tried per position
    pub search_log: u32,
    /// Shortest match the encoder will emit
    pub min_match: u32,
}

/// Settings for what goes into the frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FrameParameters {
    /// Write the uncompressed size into the frame header
    pub content_size_flag: bool,
    /// Append a checksum of the uncompressed content
    pub checksum_flag: bool,
    /// Leave the dictionary id out of the frame header
    pub no_dict_id_flag: bool,
}

/// Full parameter set for a compression session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Parameters {
    pub cparams: CompressionParameters,
    pub fparams: FrameParameters,
}

/// (window_log, hash_log, chain_log, search_log, min_match) per level
const LEVELS: [(u32, u32, u32, u32, u32); MAX_LEVEL as usize] = [
    (19, 12, 0, 0, 6),
    (19, 13, 0, 0, 5),
    (20, 15, 16, 1, 5),
    (20, 16, 17, 2, 5),
    (21, 16, 17, 3, 5),
    (21, 17, 18, 4, 4),
    (22, 17, 19, 5, 4),
    (22, 18, 20, 6, 4),
    (23, 18, 21, 7, 4),
];

impl CompressionParameters {
    /// Table parameters for a level. Levels below 1 select the default level,
    /// levels above the maximum are clamped.
    pub fn for_level(level: i32) -> Self {
        let level = if level < MIN_LEVEL {
            DEFAULT_LEVEL
        } else {
            level.min(MAX_LEVEL)
        };
        let (window_log, hash_log, chain_log, search_log, min_match) =
            LEVELS[(level - 1) as usize];
        CompressionParameters {
            window_log,
            hash_log,
            chain_log,
            search_log,
            min_match,
        }
    }

    /// Check every field against its allowed range
    pub fn validate(&self) -> Result<()> {
        if !(WINDOWLOG_MIN..=WINDOWLOG_MAX).contains(&self.window_log) {
            return Err(Error::InvalidParameters("window_log out of range"));
        }
        if !(HASHLOG_MIN..=HASHLOG_MAX).contains(&self.hash_log) {
            return Err(Error::InvalidParameters("hash_log out of range"));
        }
        if self.chain_log != 0 && !(CHAINLOG_MIN..=CHAINLOG_MAX).contains(&self.chain_log) {
            return Err(Error::InvalidParameters("chain_log out of range"));
        }
        if self.search_log > SEARCHLOG_MAX {
            return Err(Error::InvalidParameters("search_log out of range"));
        }
        if !(MINMATCH_MIN..=MINMATCH_MAX).contains(&self.min_match) {
            return Err(Error::InvalidParameters("min_match out of range"));
        }
        Ok(())
    }

    /// Largest match distance
    #[inline]
    pub fn window_size(&self) -> usize {
        1 << self.window_log
    }

    /// Largest amount of input compressed as one block
    #[inline]
    pub fn block_size(&self) -> usize {
        block_size_for_window(self.window_log)
    }

    /// Whether a session sized for `self` can run with `other`
    pub fn fits_within(&self, other: &CompressionParameters) -> bool {
        other.window_log <= self.window_log
            && other.hash_log <= self.hash_log
            && other.chain_log <= self.chain_log
    }

    /// Whether hash tables built with `other` can be reused by `self`
    pub(crate) fn same_hash_geometry(&self, other: &CompressionParameters) -> bool {
        self.hash_log == other.hash_log
            && self.chain_log == other.chain_log
            && self.min_match == other.min_match
    }

    pub fn with_window_log(mut self, window_log: u32) -> Self {
        self.window_log = window_log;
        self
    }

    pub fn with_hash_log(mut self, hash_log: u32) -> Self {
        self.hash_log = hash_log;
        self
    }

    pub fn with_chain_log(mut self, chain_log: u32) -> Self {
        self.chain_log = chain_log;
        self
    }

    pub fn with_search_log(mut self, search_log: u32) -> Self {
        self.search_log = search_log;
        self
    }

    pub fn with_min_match(mut self, min_match: u32) -> Self {
        self.min_match = min_match;
        self
    }
}

impl Default for CompressionParameters {
    fn default() -> Self {
        Self::for_level(DEFAULT_LEVEL)
    }
}

/// Block size used with a given window
#[inline]
pub(crate) fn block_size_for_window(window_log: u32) -> usize {
    BLOCK_SIZE_MAX.min(1 << window_log)
}

impl Parameters {
    /// Parameters for a level with default frame settings
    pub fn level(level: i32) -> Self {
        get_params(level, 0, 0)
    }

    pub fn with_content_size(mut self, enabled: bool) -> Self {
        self.fparams.content_size_flag = enabled;
        self
    }

    pub fn with_checksum(mut self, enabled: bool) -> Self {
        self.fparams.checksum_flag = enabled;
        self
    }

    pub fn with_dict_id(mut self, enabled: bool) -> Self {
        self.fparams.no_dict_id_flag = !enabled;
        self
    }

    pub fn with_window_log(mut self, window_log: u32) -> Self {
        self.cparams.window_log = window_log;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.cparams.validate()
    }
}

impl Default for Parameters {
    fn default() -> Self {
        Self::level(DEFAULT_LEVEL)
    }
}

/// Compression parameters for a level, adapted to the expected input.
///
/// `src_size_hint` of 0 means unknown. When the source or the dictionary size
/// is known, the window shrinks to the smallest power of two covering both,
/// which also shrinks every workspace sized from the result.
pub fn get_cparams(level: i32, src_size_hint: u64, dict_size: usize) -> CompressionParameters {
    let mut cparams = CompressionParameters::for_level(level);

    let total = src_size_hint.saturating_add(dict_size as u64);
    if total != 0 && total < (1u64 << cparams.window_log) {
        let needed = 64 - (total - 1).leading_zeros();
        cparams.window_log = needed.clamp(WINDOWLOG_MIN, cparams.window_log);
    }

    cparams.hash_log = cparams.hash_log.min(cparams.window_log + 1);
    if cparams.chain_log != 0 {
        cparams.chain_log = cparams.chain_log.min(cparams.window_log + 1);
    }
    cparams
}

/// Full parameter set for a level with default frame settings
pub fn get_params(level: i32, src_size_hint: u64, dict_size: usize) -> Parameters {
    Parameters {
        cparams: get_cparams(level, src_size_hint, dict_size),
        fparams: FrameParameters::default(),
    }
}
