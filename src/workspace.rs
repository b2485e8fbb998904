// Copyright 2024 Karpeles Lab Inc.
// Based on the S2 compression format by Klaus Post
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Caller-supplied memory for sessions
//!
//! A [`Workspace`] is a bump arena over a borrowed byte slice. Sessions take
//! the workspace by value and carve their tables and buffers out of it with
//! one claim after another, so a live session holds the only access to that
//! memory and cannot outlive it. Handing the workspace back with a session's
//! `into_workspace` rewinds it, ready to build a new session in place.
//!
//! ```
//! use arenalz::{compression_context_size, CompressionContext, Parameters, Workspace};
//!
//! let params = Parameters::level(1);
//! let mut memory = vec![0u8; compression_context_size(&params.cparams).unwrap()];
//!
//! let ctx = CompressionContext::new(Workspace::new(&mut memory), params).unwrap();
//! let workspace = ctx.into_workspace();
//! let ctx = CompressionContext::new(workspace, params).unwrap();
//! # drop(ctx);
//! ```

use core::fmt;

use crate::error::{Error, Result};

/// A range of workspace bytes handed out by [`Workspace::claim`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Region {
    offset: usize,
    len: usize,
}

impl Region {
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// The first `len` bytes of `r`
    #[inline]
    pub(crate) fn sub(r: Region, len: usize) -> Region {
        debug_assert!(len <= r.len);
        Region {
            offset: r.offset,
            len,
        }
    }
}

/// Bump arena over caller memory
pub struct Workspace<'a> {
    buf: &'a mut [u8],
    used: usize,
}

impl fmt::Debug for Workspace<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workspace")
            .field("capacity", &self.buf.len())
            .field("used", &self.used)
            .finish()
    }
}

impl<'a> Workspace<'a> {
    /// Wrap caller memory. Nothing is claimed yet.
    pub fn new(buf: &'a mut [u8]) -> Self {
        Workspace { buf, used: 0 }
    }

    /// Total bytes available
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes claimed so far
    #[inline]
    pub fn used(&self) -> usize {
        self.used
    }

    /// Bytes still free
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.used
    }

    /// Rewind the cursor so the whole region can back a new session.
    ///
    /// Contents are left as they are; every session initializes what it reads.
    pub fn rebuild(&mut self) {
        self.used = 0;
    }

    /// Give the memory back to the caller
    pub fn into_inner(self) -> &'a mut [u8] {
        self.buf
    }

    /// Fail with the full requirement if fewer than `required` bytes remain.
    ///
    /// Constructors call this with the sizer's answer before claiming, so the
    /// error reports the real size needed rather than the first region that
    /// did not fit.
    pub(crate) fn require(&self, required: usize) -> Result<()> {
        if self.remaining() < required {
            return Err(Error::InsufficientWorkspace {
                required: self.used + required,
                provided: self.capacity(),
            });
        }
        Ok(())
    }

    /// Claim the next `len` bytes
    pub(crate) fn claim(&mut self, len: usize) -> Result<Region> {
        let end = self
            .used
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or(Error::InsufficientWorkspace {
                required: self.used.saturating_add(len),
                provided: self.buf.len(),
            })?;
        let region = Region {
            offset: self.used,
            len,
        };
        self.used = end;
        Ok(region)
    }

    /// Read access to a claimed region
    #[inline]
    pub(crate) fn region(&self, r: Region) -> &[u8] {
        &self.buf[r.offset..r.offset + r.len]
    }

    /// Write access to a claimed region
    #[inline]
    pub(crate) fn region_mut(&mut self, r: Region) -> &mut [u8] {
        &mut self.buf[r.offset..r.offset + r.len]
    }

    /// Disjoint mutable access to several claimed regions at once.
    ///
    /// Regions must be given in claim order, which is the order they sit in
    /// memory.
    pub(crate) fn regions_mut<const N: usize>(&mut self, regions: [Region; N]) -> [&mut [u8]; N] {
        let mut rest: &mut [u8] = &mut self.buf[..];
        let mut base = 0;
        regions.map(|r| {
            debug_assert!(r.offset >= base, "regions out of claim order");
            let taken = core::mem::take(&mut rest);
            let (_, tail) = taken.split_at_mut(r.offset - base);
            let (head, tail) = tail.split_at_mut(r.len);
            rest = tail;
            base = r.offset + r.len;
            head
        })
    }
}

/// Table of u32 entries stored little-endian in workspace bytes
pub(crate) struct Table<'t> {
    bytes: &'t mut [u8],
}

impl<'t> Table<'t> {
    #[inline]
    pub(crate) fn new(bytes: &'t mut [u8]) -> Self {
        debug_assert!(bytes.len() % 4 == 0);
        Table { bytes }
    }

    /// Number of entries
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.bytes.len() / 4
    }

    #[inline]
    pub(crate) fn get(&self, i: usize) -> u32 {
        let b = &self.bytes[i * 4..i * 4 + 4];
        u32::from_le_bytes([b[0], b[1], b[2], b[3]])
    }

    #[inline]
    pub(crate) fn set(&mut self, i: usize, v: u32) {
        self.bytes[i * 4..i * 4 + 4].copy_from_slice(&v.to_le_bytes());
    }

    pub(crate) fn clear(&mut self) {
        self.bytes.fill(0);
    }

    /// Raw bytes, for copying a prebuilt table wholesale
    #[inline]
    pub(crate) fn as_bytes_mut(&mut self) -> &mut [u8] {
        self.bytes
    }

    /// Apply `f` to every entry
    pub(crate) fn update(&mut self, mut f: impl FnMut(u32) -> u32) {
        for chunk in self.bytes.chunks_exact_mut(4) {
            let v = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            chunk.copy_from_slice(&f(v).to_le_bytes());
        }
    }
}
