// Copyright 2024 Karpeles Lab Inc.
// Parallel batch compression using Rayon

use rayon::prelude::*;

use crate::compress::CompressionContext;
use crate::dict::CompressionDictionary;
use crate::error::Result;
use crate::params::Parameters;
use crate::sizing::{compress_bound, compression_context_size};
use crate::workspace::Workspace;

/// Compress every input into its own frame, in parallel
///
/// Each Rayon worker allocates one workspace and reuses it for all the inputs
/// it handles. When `dict` is given, every frame is compressed against it
/// with the dictionary's own parameters and `params` is ignored.
///
/// # Example
///
/// ```
/// use arenalz::{compress_batch, Parameters};
///
/// let inputs: Vec<&[u8]> = vec![b"first input", b"second input"];
/// let frames = compress_batch(&inputs, &Parameters::level(1), None).unwrap();
/// assert_eq!(frames.len(), 2);
/// ```
pub fn compress_batch(
    inputs: &[&[u8]],
    params: &Parameters,
    dict: Option<&CompressionDictionary<'_>>,
) -> Result<Vec<Vec<u8>>> {
    let params = dict.map_or(*params, |d| *d.params());
    let size = compression_context_size(&params.cparams)?;

    inputs
        .par_iter()
        .map_init(
            || vec![0u8; size],
            |mem, src| {
                let mut ctx = CompressionContext::new(Workspace::new(mem), params)?;
                let mut dst = vec![0u8; compress_bound(src.len())];
                let n = match dict {
                    Some(dict) => ctx.compress_using_dictionary(&mut dst, src, dict)?,
                    None => ctx.compress(&mut dst, src)?,
                };
                dst.truncate(n);
                Ok(dst)
            },
        )
        .collect()
}
