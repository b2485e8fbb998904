#![no_main]

use arenalz::{decompression_context_size, DecompressionContext, Workspace};
use libfuzzer_sys::fuzz_target;

const MAX_WINDOW_LOG: u32 = 20;

fuzz_target!(|data: &[u8]| {
    let mut mem = vec![0u8; decompression_context_size(MAX_WINDOW_LOG).unwrap()];
    let mut dctx = DecompressionContext::new(Workspace::new(&mut mem), MAX_WINDOW_LOG).unwrap();
    let mut out = vec![0u8; 1 << 20];

    // Either succeeds or returns an error, never panics
    let _ = dctx.decompress(&mut out, data);
});
