#![no_main]

use arenalz::{
    compression_stream_size, decompression_stream_size, CompressionStream, DecompressionStream,
    Parameters, Workspace,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Skip very large inputs
    if data.len() > 1_000_000 || data.is_empty() {
        return;
    }

    // First byte picks the chunk size for both directions
    let chunk = data[0] as usize + 1;
    let src = &data[1..];

    let params = Parameters::level(4).with_window_log(12).with_checksum(true);
    let mut cmem = vec![0u8; compression_stream_size(&params.cparams).unwrap()];
    let mut cstream = CompressionStream::new(Workspace::new(&mut cmem), params, None).unwrap();
    let mut buf = vec![0u8; chunk];
    let mut frame = Vec::new();
    for piece in src.chunks(chunk) {
        let mut taken = 0;
        while taken < piece.len() {
            let p = cstream.feed(&piece[taken..], &mut buf).unwrap();
            taken += p.consumed;
            frame.extend_from_slice(&buf[..p.produced]);
        }
    }
    loop {
        let status = cstream.end(&mut buf).unwrap();
        frame.extend_from_slice(&buf[..status.produced]);
        if status.done {
            break;
        }
    }

    let mut dmem = vec![0u8; decompression_stream_size(12).unwrap()];
    let mut dstream = DecompressionStream::new(Workspace::new(&mut dmem), 12).unwrap();
    let mut out = Vec::new();
    for piece in frame.chunks(chunk) {
        let mut taken = 0;
        loop {
            let p = dstream.feed(&piece[taken..], &mut buf).unwrap();
            taken += p.consumed;
            out.extend_from_slice(&buf[..p.produced]);
            if taken == piece.len() && p.produced < buf.len() {
                break;
            }
        }
    }
    assert!(dstream.is_frame_complete());
    assert_eq!(out, src);

    // Arbitrary input fed to a fresh stream must not panic
    dstream.reset();
    let _ = dstream.feed(data, &mut buf);
});
