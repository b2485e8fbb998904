// Copyright 2024 Karpeles Lab Inc.
// End-to-end tests for workspaces, sessions, dictionaries and streams

use arenalz::{
    compress_bound, compression_context_size, compression_dictionary_size, compression_stream_size,
    decompression_context_size, decompression_dictionary_size, decompression_stream_size,
    dictionary_id_of, finalize_dictionary, find_decompressed_size, find_frame_compressed_size,
    get_params, size_for, CompressionContext, CompressionDictionary, CompressionStream,
    ContentSize, DecompressionContext, DecompressionDictionary, DecompressionStream, Error,
    FrameHeader, Parameters, Session, SessionKind, StreamStage, Workspace, WINDOWLOG_MAX,
};

/// Deterministic text-like data: a rotating set of words
fn make_data(size: usize) -> Vec<u8> {
    const WORDS: [&str; 12] = [
        "alpha ", "bravo ", "charlie ", "delta ", "echo ", "foxtrot ", "golf ", "hotel ",
        "india ", "juliet ", "kilo ", "lima ",
    ];
    let mut state = 0x2545_f491_4f6c_dd1du64;
    let mut out = Vec::with_capacity(size + 8);
    while out.len() < size {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        out.extend_from_slice(WORDS[(state % WORDS.len() as u64) as usize].as_bytes());
    }
    out.truncate(size);
    out
}

/// A small trained dictionary: magic, id, repeat index, then content
const SAMPLE_DICT: &[u8] = b"\
\x37\xA4\x30\xEC\x99\x69\x58\x1C\x21\x10\xD8\x4A\x84\x01\xCC\xF3\
\x3C\xCF\x9B\x25\xBB\xC9\x6E\xB2\x9B\xEC\x26\xAD\xCF\xDF\x4E\xCD\
\xF3\x2C\x3A\x21\x84\x10\x42\x08\x21\x01\x33\xF1\x78\x3C\x1E\x8F\
\xC7\xE3\xF1\x78\x3C\xCF\xF3\xBC\xF7\xD4\x42\x41\x41\x41\x41\x41\
\x41\x41\x41\x41\x41\x41\x41\x41\x41\x41\x41\x41\x41\x41\x41\x41\
\x41\x41\x41\x41\xA1\x50\x28\x14\x0A\x85\x42\xA1\x50\x28\x14\x0A\
\x85\xA2\x28\x8A\xA2\x28\x4A\x29\x7D\x74\xE1\xE1\xE1\xE1\xE1\xE1\
\xE1\xE1\xE1\xE1\xE1\xE1\xE1\xE1\xE1\xE1\xE1\xE1\xE1\xF1\x78\x3C\
\x1E\x8F\xC7\xE3\xF1\x78\x9E\xE7\x79\xEF\x01\x01\x00\x00\x00\x04\
\x00\x00\x00\x08\x00\x00\x00\
0123456789";

fn compress(params: Parameters, src: &[u8], dict: Option<&[u8]>) -> Vec<u8> {
    let mut mem = vec![0u8; compression_context_size(&params.cparams).unwrap()];
    let mut cctx = CompressionContext::new(Workspace::new(&mut mem), params).unwrap();
    let mut dst = vec![0u8; compress_bound(src.len())];
    let n = match dict {
        Some(dict) => cctx.compress_using_dict(&mut dst, src, dict, &params).unwrap(),
        None => cctx.compress(&mut dst, src).unwrap(),
    };
    dst.truncate(n);
    dst
}

fn decompress(frame: &[u8], capacity: usize, dict: Option<&[u8]>) -> Result<Vec<u8>, Error> {
    let mut mem = vec![0u8; decompression_context_size(WINDOWLOG_MAX)?];
    let mut dctx = DecompressionContext::new(Workspace::new(&mut mem), WINDOWLOG_MAX)?;
    let mut out = vec![0u8; capacity];
    let n = match dict {
        Some(dict) => dctx.decompress_using_dict(&mut out, frame, dict)?,
        None => dctx.decompress(&mut out, frame)?,
    };
    out.truncate(n);
    Ok(out)
}

fn trained_dictionary(content: &[u8], id: u32) -> Vec<u8> {
    let mut dict = vec![0u8; content.len() + 32];
    let n = finalize_dictionary(&mut dict, content, id, Some(&content[content.len() / 2..])).unwrap();
    dict.truncate(n);
    dict
}

fn stream_compress(stream: &mut CompressionStream<'_, '_>, src: &[u8], chunk: usize) -> Vec<u8> {
    let mut frame = Vec::new();
    let mut buf = vec![0u8; chunk.max(1)];
    for piece in src.chunks(chunk.max(1)) {
        let mut taken = 0;
        while taken < piece.len() {
            let p = stream.feed(&piece[taken..], &mut buf).unwrap();
            taken += p.consumed;
            frame.extend_from_slice(&buf[..p.produced]);
        }
    }
    loop {
        let status = stream.end(&mut buf).unwrap();
        frame.extend_from_slice(&buf[..status.produced]);
        if status.done {
            return frame;
        }
    }
}

fn stream_decompress(stream: &mut DecompressionStream<'_, '_>, frame: &[u8], chunk: usize) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    let mut buf = vec![0u8; chunk.max(1)];
    for piece in frame.chunks(chunk.max(1)) {
        let mut taken = 0;
        loop {
            let p = stream.feed(&piece[taken..], &mut buf)?;
            taken += p.consumed;
            out.extend_from_slice(&buf[..p.produced]);
            if taken == piece.len() && p.produced < buf.len() {
                break;
            }
        }
    }
    Ok(out)
}

#[test]
fn test_hello_world() {
    let data = b"Hello world";

    let frame = compress(Parameters::level(1), data, None);
    assert_eq!(decompress(&frame, data.len(), None).unwrap(), data);
    assert_eq!(find_decompressed_size(&frame).unwrap(), ContentSize::Unknown);

    let frame = compress(Parameters::level(1).with_content_size(true), data, None);
    assert_eq!(decompress(&frame, data.len(), None).unwrap(), data);
    assert_eq!(find_decompressed_size(&frame).unwrap(), ContentSize::Known(11));
    assert_eq!(find_frame_compressed_size(&frame).unwrap(), frame.len());
}

#[test]
fn test_content_size_hint() {
    for size in [0usize, 1, 100, 70_000, 300_000] {
        let data = make_data(size);
        let with = compress(Parameters::level(2).with_content_size(true), &data, None);
        let without = compress(Parameters::level(2), &data, None);
        assert_eq!(find_decompressed_size(&with).unwrap(), ContentSize::Known(size as u64));
        assert_eq!(find_decompressed_size(&without).unwrap(), ContentSize::Unknown);
        assert_eq!(decompress(&with, size, None).unwrap(), data);
        assert_eq!(decompress(&without, size, None).unwrap(), data);
    }
}

#[test]
fn test_levels_round_trip() {
    let data = make_data(200_000);
    for level in 1..=6 {
        let frame = compress(Parameters::level(level).with_checksum(true), &data, None);
        assert_eq!(decompress(&frame, data.len(), None).unwrap(), data, "level {}", level);
    }
}

#[test]
fn test_context_level_increase() {
    // Sized for level 1, then asked for a level whose tables do not fit
    let small = Parameters::level(1);
    let mut mem = vec![0u8; compression_context_size(&small.cparams).unwrap()];
    let mut cctx = CompressionContext::new(Workspace::new(&mut mem), small).unwrap();
    let data = make_data(10_000);
    let mut dst = vec![0u8; compress_bound(data.len())];

    assert!(matches!(
        cctx.compress_with_params(&mut dst, &data, &Parameters::level(6)),
        Err(Error::InsufficientWorkspace { .. })
    ));

    // Still usable afterwards
    let n = cctx.compress(&mut dst, &data).unwrap();
    assert_eq!(decompress(&dst[..n], data.len(), None).unwrap(), data);

    // A context sized for level 6 serves every lower level
    let big = Parameters::level(6);
    let mut mem = vec![0u8; compression_context_size(&big.cparams).unwrap()];
    let mut cctx = CompressionContext::new(Workspace::new(&mut mem), big).unwrap();
    for level in 1..=6 {
        let n = cctx
            .compress_with_params(&mut dst, &data, &Parameters::level(level))
            .unwrap();
        assert_eq!(decompress(&dst[..n], data.len(), None).unwrap(), data);
    }
}

#[test]
fn test_plain_dictionary() {
    let dict = make_data(10_000);
    let data = b"Hello world";
    let params = Parameters::level(3);

    let frame = compress(params, data, Some(&dict));
    assert_eq!(decompress(&frame, data.len(), Some(&dict)).unwrap(), data);

    // The frame names the dictionary it needs
    let id = dictionary_id_of(&dict).unwrap().unwrap();
    assert!(matches!(
        decompress(&frame, data.len(), None),
        Err(Error::DictionaryMismatch { expected, provided: 0 }) if expected == id
    ));
}

#[test]
fn test_trained_dictionary() {
    let content = make_data(10_000);
    let dict = trained_dictionary(&content, 0xabcd);
    assert_eq!(dictionary_id_of(&dict).unwrap(), Some(0xabcd));

    let data = make_data(4_000);
    for level in [1, 4, 8] {
        let params = Parameters::level(level).with_checksum(true);
        let frame = compress(params, &data, Some(&dict));
        let plain = compress(params, &data, None);
        assert!(frame.len() < plain.len(), "dictionary should help at level {}", level);
        assert_eq!(decompress(&frame, data.len(), Some(&dict)).unwrap(), data);
    }
}

#[test]
fn test_dictionary_mismatch_never_returns_wrong_data() {
    let dict_a = make_data(5_000);
    let dict_b: Vec<u8> = dict_a.iter().rev().copied().collect();
    let data = make_data(3_000);

    let frame = compress(Parameters::level(3), &data, Some(&dict_a));
    assert!(matches!(
        decompress(&frame, data.len(), Some(&dict_b)),
        Err(Error::DictionaryMismatch { .. })
    ));
    assert!(matches!(
        decompress(&frame, data.len(), None),
        Err(Error::DictionaryMismatch { .. })
    ));

    // Without the id in the header, a missing dictionary shows up as corruption
    let frame = compress(Parameters::level(3).with_dict_id(false).with_checksum(true), &data, Some(&dict_a));
    match decompress(&frame, data.len(), None) {
        Ok(out) => assert_eq!(out, data),
        Err(err) => assert!(err.is_corruption(), "{:?}", err),
    }
}

#[test]
fn test_hidden_dictionary_id_still_checked() {
    let dict_a = make_data(5_000);
    let dict_b: Vec<u8> = dict_a.iter().map(|b| b.to_ascii_uppercase()).collect();
    let data = make_data(3_000);

    // No id and no checksum asked for: the frame gets a checksum anyway
    let params = Parameters::level(3).with_dict_id(false);
    let frame = compress(params, &data, Some(&dict_a));
    let (header, _) = FrameHeader::parse(&frame).unwrap();
    assert_eq!(header.dict_id, None);
    assert!(header.checksum);

    assert_eq!(decompress(&frame, data.len(), Some(&dict_a)).unwrap(), data);
    assert!(matches!(
        decompress(&frame, data.len(), Some(&dict_b)),
        Err(Error::ChecksumMismatch { .. })
    ));
    match decompress(&frame, data.len(), None) {
        Ok(out) => assert_eq!(out, data),
        Err(err) => assert!(err.is_corruption(), "{:?}", err),
    }

    // Streams follow the same rule
    let mut cmem = vec![0u8; compression_stream_size(&params.cparams).unwrap()];
    let mut cstream = CompressionStream::with_dict_bytes(Workspace::new(&mut cmem), params, &dict_a, None).unwrap();
    let frame = stream_compress(&mut cstream, &data, 500);
    let wl = params.cparams.window_log;
    let mut dmem = vec![0u8; decompression_stream_size(wl).unwrap()];
    let mut dstream = DecompressionStream::with_dict_bytes(Workspace::new(&mut dmem), wl, &dict_b).unwrap();
    assert!(matches!(
        stream_decompress(&mut dstream, &frame, 4_000),
        Err(Error::ChecksumMismatch { .. })
    ));

    // A dictionary that is empty is no dictionary, so nothing is forced
    let frame = compress(params, &data, Some(&[][..]));
    let (header, _) = FrameHeader::parse(&frame).unwrap();
    assert!(!header.checksum);
}

#[test]
fn test_sample_trained_dictionary() {
    let data = b"Hello world";
    assert_eq!(dictionary_id_of(SAMPLE_DICT).unwrap(), Some(0x1C58_6999));

    let frame = compress(get_params(1, 0, SAMPLE_DICT.len()), data, Some(SAMPLE_DICT));
    assert!(matches!(
        decompress(&frame, data.len(), None),
        Err(Error::DictionaryMismatch {
            expected: 0x1C58_6999,
            provided: 0
        })
    ));
    assert_eq!(decompress(&frame, data.len(), Some(SAMPLE_DICT)).unwrap(), data);

    // Preprocessed on both sides
    let params = get_params(1, 0, SAMPLE_DICT.len());
    let mut cdict_mem = vec![0u8; compression_dictionary_size(&params.cparams, SAMPLE_DICT.len()).unwrap()];
    let cdict = CompressionDictionary::new(Workspace::new(&mut cdict_mem), SAMPLE_DICT, &params).unwrap();
    let mut ddict_mem = vec![0u8; decompression_dictionary_size(SAMPLE_DICT.len()).unwrap()];
    let ddict = DecompressionDictionary::new(Workspace::new(&mut ddict_mem), SAMPLE_DICT).unwrap();

    let cctx_params = Parameters::level(1);
    let mut cmem = vec![0u8; compression_context_size(&cctx_params.cparams).unwrap()];
    let mut cctx = CompressionContext::new(Workspace::new(&mut cmem), cctx_params).unwrap();
    let mut frame = vec![0u8; compress_bound(data.len())];
    let n = cctx.compress_using_dictionary(&mut frame, data, &cdict).unwrap();
    frame.truncate(n);

    assert!(matches!(
        decompress(&frame, data.len(), None),
        Err(Error::DictionaryMismatch { .. })
    ));
    let mut dmem = vec![0u8; decompression_context_size(WINDOWLOG_MAX).unwrap()];
    let mut dctx = DecompressionContext::new(Workspace::new(&mut dmem), WINDOWLOG_MAX).unwrap();
    let mut out = vec![0u8; data.len()];
    let m = dctx.decompress_using_dictionary(&mut out, &frame, &ddict).unwrap();
    assert_eq!(&out[..m], data);
}

#[test]
fn test_stream_with_sample_dictionary() {
    // Dictionary built for its own small window, stream sized for a larger one
    let params = Parameters::level(1).with_window_log(17);
    let dict_params = get_params(1, 0, SAMPLE_DICT.len());
    assert!(dict_params.cparams.window_log < 17);
    let mut cdict_mem = vec![0u8; compression_dictionary_size(&dict_params.cparams, SAMPLE_DICT.len()).unwrap()];
    let cdict = CompressionDictionary::new(Workspace::new(&mut cdict_mem), SAMPLE_DICT, &dict_params).unwrap();

    let mut cmem = vec![0u8; compression_stream_size(&params.cparams).unwrap()];
    let mut cstream = CompressionStream::with_dictionary(Workspace::new(&mut cmem), params, &cdict, None).unwrap();
    let frame = stream_compress(&mut cstream, b"Hello world", 64);
    assert_eq!(FrameHeader::parse(&frame).unwrap().0.window_log, 17);

    let mut dmem = vec![0u8; decompression_stream_size(17).unwrap()];
    let mut plain = DecompressionStream::new(Workspace::new(&mut dmem), 17).unwrap();
    assert!(matches!(
        stream_decompress(&mut plain, &frame, 64),
        Err(Error::DictionaryMismatch { .. })
    ));

    let mut ddict_mem = vec![0u8; decompression_dictionary_size(SAMPLE_DICT.len()).unwrap()];
    let ddict = DecompressionDictionary::new(Workspace::new(&mut ddict_mem), SAMPLE_DICT).unwrap();
    let mut dmem = vec![0u8; decompression_stream_size(17).unwrap()];
    let mut dstream = DecompressionStream::with_dictionary(Workspace::new(&mut dmem), 17, &ddict).unwrap();
    assert_eq!(stream_decompress(&mut dstream, &frame, 64).unwrap(), b"Hello world");
}

#[test]
fn test_malformed_trained_dictionary_rejected() {
    let content = make_data(1_000);
    let mut dict = trained_dictionary(&content, 7);
    // Zero id
    dict[4..8].copy_from_slice(&0u32.to_le_bytes());

    let params = Parameters::level(1);
    let mut mem = vec![0u8; compression_context_size(&params.cparams).unwrap()];
    let mut cctx = CompressionContext::new(Workspace::new(&mut mem), params).unwrap();
    let mut dst = vec![0u8; compress_bound(10)];
    assert!(matches!(
        cctx.compress_using_dict(&mut dst, b"0123456789", &dict, &params),
        Err(Error::CorruptDictionary(_))
    ));
}

#[test]
fn test_preprocessed_dictionaries() {
    let content = make_data(20_000);
    let dict = trained_dictionary(&content, 42);
    let params = Parameters::level(5).with_checksum(true).with_content_size(true);
    let data = make_data(50_000);

    let mut cdict_mem = vec![0u8; compression_dictionary_size(&params.cparams, dict.len()).unwrap()];
    let cdict = CompressionDictionary::new(Workspace::new(&mut cdict_mem), &dict, &params).unwrap();
    assert_eq!(cdict.id(), 42);

    let mut ddict_mem = vec![0u8; decompression_dictionary_size(dict.len()).unwrap()];
    let ddict = DecompressionDictionary::new(Workspace::new(&mut ddict_mem), &dict).unwrap();
    assert_eq!(ddict.id(), 42);

    let mut cmem = vec![0u8; compression_context_size(&params.cparams).unwrap()];
    let mut cctx = CompressionContext::new(Workspace::new(&mut cmem), params).unwrap();
    let mut frame = vec![0u8; compress_bound(data.len())];
    let n = cctx.compress_using_dictionary(&mut frame, &data, &cdict).unwrap();
    frame.truncate(n);

    // Same output as handing the raw bytes to every call
    assert_eq!(frame, compress(params, &data, Some(&dict)));

    let mut dmem = vec![0u8; decompression_context_size(params.cparams.window_log).unwrap()];
    let mut dctx = DecompressionContext::new(Workspace::new(&mut dmem), params.cparams.window_log).unwrap();
    let mut out = vec![0u8; data.len()];
    let m = dctx.decompress_using_dictionary(&mut out, &frame, &ddict).unwrap();
    assert_eq!(&out[..m], &data[..]);
    assert_eq!(dctx.last_frame_header().unwrap().dict_id, Some(42));
}

#[test]
fn test_shared_dictionary_across_threads() {
    let dict = make_data(8_000);
    let params = Parameters::level(3).with_checksum(true);
    let mut mem = vec![0u8; compression_dictionary_size(&params.cparams, dict.len()).unwrap()];
    let cdict = CompressionDictionary::new(Workspace::new(&mut mem), &dict, &params).unwrap();

    let frames: Vec<(Vec<u8>, Vec<u8>)> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let cdict = &cdict;
                scope.spawn(move || {
                    let data = make_data(1_000 + t * 777);
                    let mut mem = vec![0u8; compression_context_size(&cdict.params().cparams).unwrap()];
                    let mut cctx = CompressionContext::new(Workspace::new(&mut mem), *cdict.params()).unwrap();
                    let mut dst = vec![0u8; compress_bound(data.len())];
                    let n = cctx.compress_using_dictionary(&mut dst, &data, cdict).unwrap();
                    dst.truncate(n);
                    (data, dst)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for (data, frame) in frames {
        assert_eq!(decompress(&frame, data.len(), Some(&dict)).unwrap(), data);
    }
}

#[test]
fn test_recreate_sessions_in_same_memory() {
    let params = Parameters::level(4).with_checksum(true);
    let data = make_data(30_000);
    let mut cmem = vec![0u8; compression_context_size(&params.cparams).unwrap()];
    let mut dmem = vec![0u8; decompression_context_size(params.cparams.window_log).unwrap()];

    let mut frames = Vec::new();
    let mut cws = Workspace::new(&mut cmem);
    let mut dws = Workspace::new(&mut dmem);
    for _ in 0..3 {
        let mut cctx = CompressionContext::new(cws, params).unwrap();
        let mut frame = vec![0u8; compress_bound(data.len())];
        let n = cctx.compress(&mut frame, &data).unwrap();
        frame.truncate(n);
        cws = cctx.into_workspace();

        let mut dctx = DecompressionContext::new(dws, params.cparams.window_log).unwrap();
        let mut out = vec![0u8; data.len()];
        let m = dctx.decompress(&mut out, &frame).unwrap();
        assert_eq!(&out[..m], &data[..]);
        dws = dctx.into_workspace();
        frames.push(frame);
    }
    assert!(frames.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn test_session_factory_sizes() {
    let params = Parameters::level(2);
    let small = SessionKind::CompressionStream(Parameters::level(1));
    let large = SessionKind::CompressionStream(Parameters::level(6));
    assert!(size_for(&large).unwrap() >= size_for(&small).unwrap());

    let kind = SessionKind::DecompressionStream { max_window_log: 20 };
    let size = size_for(&kind).unwrap();
    assert_eq!(size, decompression_stream_size(20).unwrap());

    let mut mem = vec![0u8; size];
    let session = Session::build(kind, Workspace::new(&mut mem), None).unwrap();
    assert!(matches!(session, Session::DecompressionStream(_)));

    let kind = SessionKind::CompressionContext(params);
    let mut mem = vec![0u8; size_for(&kind).unwrap()];
    assert!(matches!(
        Session::build(kind, Workspace::new(&mut mem), Some(&b"dictionary"[..])),
        Err(Error::InvalidParameters(_))
    ));
}

#[test]
fn test_stream_chunking_matches_block_output() {
    let data = make_data(150_000);
    let params = Parameters::level(3).with_checksum(true);
    let mut mem = vec![0u8; compression_stream_size(&params.cparams).unwrap()];
    let mut stream = CompressionStream::new(Workspace::new(&mut mem), params, None).unwrap();

    for chunk in [1, 13, 4096, 150_000] {
        let frame = stream_compress(&mut stream, &data, chunk);
        assert_eq!(stream.stage(), StreamStage::Ended);
        assert_eq!(decompress(&frame, data.len(), None).unwrap(), data, "chunk {}", chunk);
        stream.reset(None);
    }
}

#[test]
fn test_stream_flush() {
    let params = Parameters::level(2);
    let mut mem = vec![0u8; compression_stream_size(&params.cparams).unwrap()];
    let mut stream = CompressionStream::new(Workspace::new(&mut mem), params, None).unwrap();
    let wl = params.cparams.window_log;
    let mut dmem = vec![0u8; decompression_stream_size(wl).unwrap()];
    let mut dstream = DecompressionStream::new(Workspace::new(&mut dmem), wl).unwrap();

    let mut buf = vec![0u8; compress_bound(1_000)];
    let mut out = vec![0u8; 1_000];
    for i in 0..5 {
        let msg = format!("message {} goes through right away", i);
        let p = stream.feed(msg.as_bytes(), &mut buf).unwrap();
        assert_eq!(p.consumed, msg.len());
        assert_eq!(p.produced, 0);

        let status = stream.flush(&mut buf).unwrap();
        assert!(status.done);
        assert!(status.produced > 0);

        // Everything fed so far decodes before the frame ends
        let p = dstream.feed(&buf[..status.produced], &mut out).unwrap();
        assert_eq!(p.consumed, status.produced);
        assert_eq!(&out[..p.produced], msg.as_bytes());
        assert!(!dstream.is_frame_complete());
    }

    let status = stream.end(&mut buf).unwrap();
    assert!(status.done);
    let p = dstream.feed(&buf[..status.produced], &mut out).unwrap();
    assert_eq!(p.produced, 0);
    assert!(dstream.is_frame_complete());

    assert_eq!(stream.feed(b"late", &mut buf), Err(Error::StreamAlreadyEnded));
}

#[test]
fn test_stream_with_dictionaries() {
    let content = make_data(12_000);
    let dict = trained_dictionary(&content, 9);
    let params = Parameters::level(4).with_checksum(true);
    let data = make_data(40_000);

    let mut cdict_mem = vec![0u8; compression_dictionary_size(&params.cparams, dict.len()).unwrap()];
    let cdict = CompressionDictionary::new(Workspace::new(&mut cdict_mem), &dict, &params).unwrap();
    let mut ddict_mem = vec![0u8; decompression_dictionary_size(dict.len()).unwrap()];
    let ddict = DecompressionDictionary::new(Workspace::new(&mut ddict_mem), &dict).unwrap();

    let mut cmem = vec![0u8; compression_stream_size(&params.cparams).unwrap()];
    let mut cstream = CompressionStream::with_dictionary(Workspace::new(&mut cmem), params, &cdict, None).unwrap();
    let frame = stream_compress(&mut cstream, &data, 999);

    let wl = params.cparams.window_log;
    let mut dmem = vec![0u8; decompression_stream_size(wl).unwrap()];
    let mut dstream = DecompressionStream::with_dictionary(Workspace::new(&mut dmem), wl, &ddict).unwrap();
    assert_eq!(stream_decompress(&mut dstream, &frame, 1_000).unwrap(), data);

    // Raw bytes on either side give the same result
    let mut dmem2 = vec![0u8; decompression_stream_size(wl).unwrap()];
    let mut dstream2 = DecompressionStream::with_dict_bytes(Workspace::new(&mut dmem2), wl, &dict).unwrap();
    assert_eq!(stream_decompress(&mut dstream2, &frame, 77).unwrap(), data);
    assert_eq!(decompress(&frame, data.len(), Some(&dict)).unwrap(), data);
}

#[test]
fn test_reset_isolates_streams() {
    let params = Parameters::level(3).with_checksum(true);
    let mut cmem = vec![0u8; compression_stream_size(&params.cparams).unwrap()];
    let mut stream = CompressionStream::new(Workspace::new(&mut cmem), params, None).unwrap();

    let first = make_data(20_000);
    let frame1 = stream_compress(&mut stream, &first, 5_000);
    stream.reset(None);

    // Abandon a frame half way through
    let mut buf = vec![0u8; 64];
    stream.feed(&first[..10_000], &mut buf).unwrap();
    stream.reset(None);

    let second: Vec<u8> = first.iter().map(|b| b.to_ascii_uppercase()).collect();
    let frame2 = stream_compress(&mut stream, &second, 5_000);

    assert_eq!(decompress(&frame1, first.len(), None).unwrap(), first);
    assert_eq!(decompress(&frame2, second.len(), None).unwrap(), second);
    assert_eq!(frame2, compress(params, &second, None));
}

#[test]
fn test_reset_decompression_stream() {
    let params = Parameters::level(1);
    let data = make_data(10_000);
    let frame = compress(params, &data, None);
    let wl = params.cparams.window_log;
    let mut mem = vec![0u8; decompression_stream_size(wl).unwrap()];
    let mut stream = DecompressionStream::new(Workspace::new(&mut mem), wl).unwrap();

    // Feed plaintext: the stream rejects it and stays failed
    let mut out = vec![0u8; data.len()];
    assert!(stream.feed(&data, &mut out).is_err());
    assert!(stream.feed(&frame, &mut out).is_err());

    stream.reset();
    assert_eq!(stream_decompress(&mut stream, &frame, 1 << 20).unwrap(), data);
    assert!(stream.is_frame_complete());

    // Half a frame, then a reset and a clean frame
    stream.reset();
    stream.feed(&frame[..frame.len() / 2], &mut out).unwrap();
    stream.reset();
    assert_eq!(stream_decompress(&mut stream, &frame, 3_000).unwrap(), data);
}

#[test]
fn test_insufficient_workspace() {
    let params = Parameters::level(3);
    let size = compression_context_size(&params.cparams).unwrap();
    let mut mem = vec![0u8; size - 1];
    assert_eq!(
        CompressionContext::new(Workspace::new(&mut mem), params).unwrap_err(),
        Error::InsufficientWorkspace {
            required: size,
            provided: size - 1,
        }
    );
}

#[test]
fn test_output_too_small() {
    let data = make_data(5_000);
    let params = Parameters::level(1).with_content_size(true);
    let frame = compress(params, &data, None);
    assert!(matches!(
        decompress(&frame, data.len() - 1, None),
        Err(Error::OutputTooSmall { .. })
    ));

    let mut mem = vec![0u8; compression_context_size(&params.cparams).unwrap()];
    let mut cctx = CompressionContext::new(Workspace::new(&mut mem), params).unwrap();
    let mut dst = vec![0u8; compress_bound(data.len()) - 1];
    assert!(matches!(
        cctx.compress(&mut dst, &data),
        Err(Error::OutputTooSmall { .. })
    ));
}
