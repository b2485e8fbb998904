// Copyright 2024 Karpeles Lab Inc.
// Based on the S2 compression format by Klaus Post
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Building any session kind from one entry point

use crate::compress::CompressionContext;
use crate::cstream::CompressionStream;
use crate::decompress::DecompressionContext;
use crate::dict::{CompressionDictionary, DecompressionDictionary};
use crate::dstream::DecompressionStream;
use crate::error::{Error, Result};
use crate::params::Parameters;
use crate::workspace::Workspace;

/// What to build, with the parameters that decide its size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    CompressionContext(Parameters),
    DecompressionContext { max_window_log: u32 },
    CompressionStream(Parameters),
    DecompressionStream { max_window_log: u32 },
    CompressionDictionary { params: Parameters, dict_size: usize },
    DecompressionDictionary { dict_size: usize },
}

/// A session of any kind
#[derive(Debug)]
pub enum Session<'a, 'd> {
    CompressionContext(CompressionContext<'a>),
    DecompressionContext(DecompressionContext<'a>),
    CompressionStream(CompressionStream<'a, 'd>),
    DecompressionStream(DecompressionStream<'a, 'd>),
    CompressionDictionary(CompressionDictionary<'a>),
    DecompressionDictionary(DecompressionDictionary<'a>),
}

impl<'a, 'd> Session<'a, 'd> {
    /// Build a session of `kind` inside `workspace`.
    ///
    /// `dictionary` is required for the dictionary kinds, optional for streams
    /// (which then use it for every frame) and rejected for contexts, which take
    /// dictionaries per call.
    pub fn build(kind: SessionKind, workspace: Workspace<'a>, dictionary: Option<&'d [u8]>) -> Result<Self> {
        Ok(match kind {
            SessionKind::CompressionContext(params) => {
                if dictionary.is_some() {
                    return Err(Error::InvalidParameters(
                        "contexts take dictionaries per call",
                    ));
                }
                Session::CompressionContext(CompressionContext::new(workspace, params)?)
            }
            SessionKind::DecompressionContext { max_window_log } => {
                if dictionary.is_some() {
                    return Err(Error::InvalidParameters(
                        "contexts take dictionaries per call",
                    ));
                }
                Session::DecompressionContext(DecompressionContext::new(workspace, max_window_log)?)
            }
            SessionKind::CompressionStream(params) => {
                Session::CompressionStream(CompressionStream::with_dict_bytes(
                    workspace,
                    params,
                    dictionary.unwrap_or_default(),
                    None,
                )?)
            }
            SessionKind::DecompressionStream { max_window_log } => {
                Session::DecompressionStream(DecompressionStream::with_dict_bytes(
                    workspace,
                    max_window_log,
                    dictionary.unwrap_or_default(),
                )?)
            }
            SessionKind::CompressionDictionary { params, .. } => {
                let bytes = dictionary.ok_or(Error::InvalidParameters("dictionary bytes required"))?;
                Session::CompressionDictionary(CompressionDictionary::new(workspace, bytes, &params)?)
            }
            SessionKind::DecompressionDictionary { .. } => {
                let bytes = dictionary.ok_or(Error::InvalidParameters("dictionary bytes required"))?;
                Session::DecompressionDictionary(DecompressionDictionary::new(workspace, bytes)?)
            }
        })
    }

    /// Tear the session down and hand back its workspace, rewound
    pub fn into_workspace(self) -> Workspace<'a> {
        match self {
            Session::CompressionContext(s) => s.into_workspace(),
            Session::DecompressionContext(s) => s.into_workspace(),
            Session::CompressionStream(s) => s.into_workspace(),
            Session::DecompressionStream(s) => s.into_workspace(),
            Session::CompressionDictionary(s) => s.into_workspace(),
            Session::DecompressionDictionary(s) => s.into_workspace(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameHeader;
    use crate::sizing::size_for;

    #[test]
    fn test_every_kind_builds_in_its_size() {
        let params = Parameters::level(1).with_window_log(12);
        let dict = b"a small dictionary with some content in it".repeat(4);
        let kinds = [
            SessionKind::CompressionContext(params),
            SessionKind::DecompressionContext { max_window_log: 12 },
            SessionKind::CompressionStream(params),
            SessionKind::DecompressionStream { max_window_log: 12 },
            SessionKind::CompressionDictionary {
                params,
                dict_size: dict.len(),
            },
            SessionKind::DecompressionDictionary {
                dict_size: dict.len(),
            },
        ];

        for kind in kinds {
            let size = size_for(&kind).unwrap();
            let needs_dict = matches!(
                kind,
                SessionKind::CompressionDictionary { .. } | SessionKind::DecompressionDictionary { .. }
            );
            let dictionary = needs_dict.then_some(&dict[..]);

            let mut mem = vec![0u8; size];
            let session = Session::build(kind, Workspace::new(&mut mem), dictionary).unwrap();
            let ws = session.into_workspace();
            assert_eq!(ws.used(), 0);

            let mut short = vec![0u8; size - 1];
            let err = Session::build(kind, Workspace::new(&mut short), dictionary).unwrap_err();
            assert_eq!(
                err,
                Error::InsufficientWorkspace {
                    required: size,
                    provided: size - 1
                },
                "{:?}",
                kind
            );
        }
    }

    #[test]
    fn test_stream_keeps_frame_parameters() {
        let params = Parameters::level(3)
            .with_window_log(14)
            .with_checksum(true)
            .with_content_size(true);
        let kind = SessionKind::CompressionStream(params);
        let mut mem = vec![0u8; size_for(&kind).unwrap()];
        let mut stream = match Session::build(kind, Workspace::new(&mut mem), None).unwrap() {
            Session::CompressionStream(stream) => stream,
            other => panic!("unexpected session {:?}", other),
        };
        assert_eq!(stream.params(), &params);

        let src = b"framed by the factory";
        stream.reset(Some(src.len() as u64));
        let mut out = [0u8; 256];
        let mut n = stream.feed(src, &mut out).unwrap().produced;
        loop {
            let status = stream.end(&mut out[n..]).unwrap();
            n += status.produced;
            if status.done {
                break;
            }
        }

        let (header, _) = FrameHeader::parse(&out[..n]).unwrap();
        assert!(header.checksum);
        assert_eq!(header.content_size, Some(src.len() as u64));
        assert_eq!(header.window_log, 14);
    }

    #[test]
    fn test_dictionary_kinds_need_bytes() {
        let kind = SessionKind::DecompressionDictionary { dict_size: 16 };
        let mut mem = vec![0u8; 16];
        assert!(matches!(
            Session::build(kind, Workspace::new(&mut mem), None),
            Err(Error::InvalidParameters(_))
        ));
    }
}
