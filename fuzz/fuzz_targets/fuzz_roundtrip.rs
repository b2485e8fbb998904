#![no_main]

use arenalz::{
    compress_bound, compression_context_size, decompression_context_size, CompressionContext,
    DecompressionContext, Parameters, Workspace,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Skip very large inputs to avoid OOM
    if data.len() > 1_000_000 || data.is_empty() {
        return;
    }

    // First byte picks the level and whether a dictionary is used
    let level = (data[0] % 9) as i32 + 1;
    let (dict, src) = if data[0] & 0x80 != 0 {
        data[1..].split_at((data.len() - 1) / 4)
    } else {
        (&[][..], &data[1..])
    };

    let params = Parameters::level(level).with_window_log(18).with_checksum(true);
    let mut cmem = vec![0u8; compression_context_size(&params.cparams).unwrap()];
    let mut cctx = CompressionContext::new(Workspace::new(&mut cmem), params).unwrap();
    let mut frame = vec![0u8; compress_bound(src.len())];
    let n = match cctx.compress_using_dict(&mut frame, src, dict, &params) {
        Ok(n) => n,
        // Input that happens to look like a malformed trained dictionary
        Err(err) => {
            assert!(matches!(err, arenalz::Error::CorruptDictionary(_)));
            return;
        }
    };

    let mut dmem = vec![0u8; decompression_context_size(18).unwrap()];
    let mut dctx = DecompressionContext::new(Workspace::new(&mut dmem), 18).unwrap();
    let mut out = vec![0u8; src.len()];
    let m = dctx
        .decompress_using_dict(&mut out, &frame[..n], dict)
        .expect("roundtrip decode failed");
    assert_eq!(src, &out[..m], "roundtrip failed at level {}", level);
});
