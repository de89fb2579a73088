//! File-to-file splices through every bundled codec, under the default
//! mapped-splice preference.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use squash_codecs::default_registry;
use squash_core::Direction;
use tempfile::tempdir;

// ============================================================================
// Helpers
// ============================================================================

const ALL_CODECS: &[&str] = &["copy", "lz4", "snappy", "zlib", "zstd"];

fn source_file(path: &Path, contents: &[u8]) -> File {
    std::fs::write(path, contents).unwrap();
    File::open(path).unwrap()
}

fn sink_file(path: &Path) -> File {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .unwrap()
}

fn read_back(file: &mut File) -> Vec<u8> {
    file.seek(SeekFrom::Start(0)).unwrap();
    let mut contents = Vec::new();
    file.read_to_end(&mut contents).unwrap();
    contents
}

fn generate_incompressible_data(len: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(len);
    let mut state = 0x1234_5678u32;
    for _ in 0..len {
        state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        data.push((state >> 24) as u8);
    }
    data
}

/// Splices `payload` through `codec` and back, returning the intermediate
/// encoded bytes and the restored payload.
fn round_trip(codec: &str, payload: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let registry = default_registry();
    let dir = tempdir().unwrap();

    let mut src = source_file(&dir.path().join("plain"), payload);
    let mut encoded = sink_file(&dir.path().join("encoded"));
    registry
        .splice(codec, Direction::Compress, &mut encoded, &mut src, 0)
        .unwrap();
    let encoded_bytes = read_back(&mut encoded);

    encoded.seek(SeekFrom::Start(0)).unwrap();
    let mut restored = sink_file(&dir.path().join("restored"));
    registry
        .splice(codec, Direction::Decompress, &mut restored, &mut encoded, 0)
        .unwrap();
    let restored_bytes = read_back(&mut restored);

    (encoded_bytes, restored_bytes)
}

// ============================================================================
// Round trips
// ============================================================================

#[test]
fn every_codec_round_trips_text() {
    let payload = b"The quick brown fox jumps over the lazy dog. ".repeat(200);
    for codec in ALL_CODECS {
        let (_, restored) = round_trip(codec, &payload);
        assert_eq!(restored, payload, "round trip failed for {codec}");
    }
}

#[test]
fn every_codec_round_trips_incompressible_data() {
    let payload = generate_incompressible_data(16 * 1024);
    for codec in ALL_CODECS {
        let (_, restored) = round_trip(codec, &payload);
        assert_eq!(restored, payload, "round trip failed for {codec}");
    }
}

#[test]
fn every_codec_round_trips_the_empty_stream() {
    for codec in ALL_CODECS {
        let (encoded, restored) = round_trip(codec, b"");
        assert!(
            restored.is_empty(),
            "decoding the empty encoding of {codec} produced {} bytes",
            restored.len()
        );
        // The encoding itself may legitimately be empty only for copy.
        if *codec != "copy" {
            assert!(!encoded.is_empty() || *codec == "lz4");
        }
    }
}

#[test]
fn snappy_hello_world_stays_within_the_documented_bound() {
    let payload = b"hello world";
    let (encoded, restored) = round_trip("snappy", payload);
    assert!(encoded.len() <= snap::raw::max_compress_len(payload.len()));
    assert_eq!(restored, payload);
}

#[test]
fn zstd_round_trips_64_kib_of_random_bytes() {
    let payload = generate_incompressible_data(64 * 1024);
    let (_, restored) = round_trip("zstd", &payload);
    assert_eq!(restored, payload);
}

// ============================================================================
// Byte budgets
// ============================================================================

#[test]
fn compression_budget_consumes_exactly_the_prefix() {
    let payload = generate_incompressible_data(8 * 1024);
    let budget = 1000u64;
    let registry = default_registry();

    for codec in ALL_CODECS {
        let dir = tempdir().unwrap();
        let mut src = source_file(&dir.path().join("plain"), &payload);
        let mut encoded = sink_file(&dir.path().join("encoded"));
        registry
            .splice(codec, Direction::Compress, &mut encoded, &mut src, budget)
            .unwrap();

        encoded.seek(SeekFrom::Start(0)).unwrap();
        let mut restored = sink_file(&dir.path().join("restored"));
        registry
            .splice(codec, Direction::Decompress, &mut restored, &mut encoded, 0)
            .unwrap();

        assert_eq!(
            read_back(&mut restored),
            &payload[..budget as usize],
            "budgeted compression through {codec} did not encode the exact prefix"
        );
    }
}

#[test]
fn decompression_budget_yields_exactly_the_prefix() {
    let payload = generate_incompressible_data(8 * 1024);
    let budget = 100u64;
    let registry = default_registry();

    for codec in ALL_CODECS {
        let dir = tempdir().unwrap();
        let mut src = source_file(&dir.path().join("plain"), &payload);
        let mut encoded = sink_file(&dir.path().join("encoded"));
        registry
            .splice(codec, Direction::Compress, &mut encoded, &mut src, 0)
            .unwrap();

        encoded.seek(SeekFrom::Start(0)).unwrap();
        let mut restored = sink_file(&dir.path().join("restored"));
        registry
            .splice(codec, Direction::Decompress, &mut restored, &mut encoded, budget)
            .unwrap();

        assert_eq!(
            read_back(&mut restored),
            &payload[..budget as usize],
            "budgeted decompression through {codec} did not yield the exact prefix"
        );
    }
}

#[test]
fn zstd_frame_of_one_kib_truncates_to_one_hundred_bytes() {
    let payload = vec![b'A'; 1024];
    let registry = default_registry();
    let dir = tempdir().unwrap();

    let mut src = source_file(&dir.path().join("plain"), &payload);
    let mut encoded = sink_file(&dir.path().join("encoded"));
    registry
        .splice("zstd", Direction::Compress, &mut encoded, &mut src, 0)
        .unwrap();

    encoded.seek(SeekFrom::Start(0)).unwrap();
    let mut restored = sink_file(&dir.path().join("restored"));
    registry
        .splice("zstd", Direction::Decompress, &mut restored, &mut encoded, 100)
        .unwrap();

    assert_eq!(read_back(&mut restored), vec![b'A'; 100]);
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn unknown_codec_names_are_rejected() {
    let registry = default_registry();
    let dir = tempdir().unwrap();
    let mut src = source_file(&dir.path().join("plain"), b"data");
    let mut dst = sink_file(&dir.path().join("out"));

    let err = registry
        .splice("brotli", Direction::Compress, &mut dst, &mut src, 0)
        .unwrap_err();
    assert!(matches!(err, squash_core::Error::UnknownCodec(name) if name == "brotli"));
}

#[test]
fn garbage_input_fails_decompression() {
    let registry = default_registry();
    let garbage = generate_incompressible_data(512);

    for codec in ["snappy", "zlib", "zstd"] {
        let dir = tempdir().unwrap();
        let mut src = source_file(&dir.path().join("garbage"), &garbage);
        let mut dst = sink_file(&dir.path().join("out"));

        let result = registry.splice(codec, Direction::Decompress, &mut dst, &mut src, 0);
        assert!(result.is_err(), "{codec} accepted garbage input");
    }
}

// ============================================================================
// Positions and sequencing
// ============================================================================

#[test]
fn consecutive_compressions_append_at_the_advanced_position() {
    // Each splice leaves the sink position at the end of its output, so a
    // second splice appends rather than overwrites.
    let first = b"first payload".to_vec();
    let second = b"second payload, longer than the first".to_vec();
    let registry = default_registry();
    let dir = tempdir().unwrap();

    let mut combined = sink_file(&dir.path().join("combined"));
    for (index, payload) in [&first, &second].into_iter().enumerate() {
        let mut src = source_file(&dir.path().join(format!("plain-{index}")), payload);
        registry
            .splice("zstd", Direction::Compress, &mut combined, &mut src, 0)
            .unwrap();
    }

    let mut expected = Vec::new();
    for (index, payload) in [&first, &second].into_iter().enumerate() {
        let mut src = source_file(&dir.path().join(format!("again-{index}")), payload);
        let mut lone = sink_file(&dir.path().join(format!("lone-{index}")));
        registry
            .splice("zstd", Direction::Compress, &mut lone, &mut src, 0)
            .unwrap();
        expected.extend_from_slice(&read_back(&mut lone));
    }

    assert_eq!(read_back(&mut combined), expected);
}

#[test]
fn write_only_sinks_still_work_via_the_buffered_fallback() {
    // A write-only sink cannot be mapped; the dispatcher must fall through
    // transparently instead of failing.
    let payload = b"write-only sink".repeat(50);
    let registry = default_registry();
    let dir = tempdir().unwrap();

    let mut src = source_file(&dir.path().join("plain"), &payload);
    let mut dst = File::create(dir.path().join("encoded")).unwrap();
    registry
        .splice("snappy", Direction::Compress, &mut dst, &mut src, 0)
        .unwrap();
    drop(dst);

    let mut encoded = File::open(dir.path().join("encoded")).unwrap();
    let mut restored = sink_file(&dir.path().join("restored"));
    registry
        .splice("snappy", Direction::Decompress, &mut restored, &mut encoded, 0)
        .unwrap();
    assert_eq!(read_back(&mut restored), payload);
}
