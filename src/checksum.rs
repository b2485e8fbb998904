// Copyright 2024 Karpeles Lab Inc.
// Based on the S2 compression format by Klaus Post
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! CRC32 checksums for frame trailers and plain-dictionary identifiers

use core::fmt;

use crc32fast::Hasher;

/// Mask a CRC the way S2 stream chunks do
#[inline]
fn mask(c: u32) -> u32 {
    c.rotate_right(15).wrapping_add(0xa282ead8)
}

/// Calculate the masked CRC32 of a complete buffer
pub fn crc(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    mask(hasher.finalize())
}

/// Incremental content checksum used by frames with the checksum flag.
///
/// The hasher lives inline in the session, so it needs no workspace bytes.
#[derive(Clone)]
pub struct ContentChecksum {
    hasher: Hasher,
}

impl ContentChecksum {
    pub fn new() -> Self {
        ContentChecksum {
            hasher: Hasher::new(),
        }
    }

    pub fn reset(&mut self) {
        self.hasher.reset();
    }

    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    /// Masked checksum of everything fed since the last reset
    pub fn value(&self) -> u32 {
        mask(self.hasher.clone().finalize())
    }
}

impl fmt::Debug for ContentChecksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ContentChecksum")
            .field(&format_args!("{:#010x}", self.value()))
            .finish()
    }
}

impl Default for ContentChecksum {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifier for a plain-content dictionary. Never zero, since zero means
/// "no dictionary" in frame headers.
pub fn dictionary_id(content: &[u8]) -> u32 {
    match crc32fast::hash(content) {
        0 => 1,
        id => id,
    }
}
