// Copyright 2024 Karpeles Lab Inc.
// Based on the S2 compression format by Klaus Post
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use thiserror::Error;

/// Result type for arenalz operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by sizing, construction, compression and decompression.
///
/// Every variant is `Copy` and carries only static messages or integers, so
/// reporting an error never allocates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// The workspace is smaller than the sizer requires for the session
    #[error("arenalz: insufficient workspace: need {required} bytes, got {provided}")]
    InsufficientWorkspace { required: usize, provided: usize },

    /// A level, window or flag value is out of range
    #[error("arenalz: invalid parameters: {0}")]
    InvalidParameters(&'static str),

    /// Malformed frame header or payload
    #[error("arenalz: corrupt input: {0}")]
    CorruptData(&'static str),

    /// The frame was encoded against a different (or no) dictionary
    #[error("arenalz: dictionary mismatch: frame wants {expected:#010x}, got {provided:#010x}")]
    DictionaryMismatch { expected: u32, provided: u32 },

    /// Unrecognized magic number or format version
    #[error("arenalz: unsupported format")]
    UnsupportedFormat,

    /// The stream has ended and must be reset before reuse
    #[error("arenalz: stream already ended")]
    StreamAlreadyEnded,

    /// The caller-provided output buffer is too small
    #[error("arenalz: output too small: need {required} bytes, got {provided}")]
    OutputTooSmall { required: usize, provided: usize },

    /// A structured dictionary has a malformed header
    #[error("arenalz: corrupt dictionary: {0}")]
    CorruptDictionary(&'static str),

    /// Content checksum in the frame trailer does not match the decoded data
    #[error("arenalz: checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    /// The frame needs a larger window than the decoder was built for
    #[error("arenalz: frame window 2^{window_log} exceeds decoder limit 2^{max_window_log}")]
    WindowTooLarge { window_log: u32, max_window_log: u32 },

    /// A stream received a different number of bytes than it was pledged
    #[error("arenalz: pledged {pledged} source bytes, got {actual}")]
    PledgedSizeMismatch { pledged: u64, actual: u64 },
}

impl Error {
    /// True for errors that mean the compressed input itself is bad
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Error::CorruptData(_)
                | Error::UnsupportedFormat
                | Error::ChecksumMismatch { .. }
                | Error::DictionaryMismatch { .. }
        )
    }
}
