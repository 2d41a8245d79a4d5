use std::fs;
use std::hash::Hasher as _;
use std::path::PathBuf;

use filegate_core::hasher::{Fingerprinter, FringeMode, XxFingerprinter, FRINGE_WINDOW};
use tempfile::TempDir;
use twox_hash::XxHash64;
use xxhash_rust::xxh3::xxh3_128;

/// Deterministic pseudo-random content so failures reproduce.
fn patterned(len: usize, seed: u64) -> Vec<u8> {
    let mut state = seed;
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (state >> 24) as u8
        })
        .collect()
}

fn write_file(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, bytes).unwrap();
    path
}

/// What the fringe contract says the fingerprint must be: the given byte
/// stream, then the 8-byte little-endian size, through XxHash64 seed 0,
/// widened by zero padding.
fn expected_fringe(stream: &[u8], size: u64) -> [u8; 16] {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(stream);
    hasher.write(&size.to_le_bytes());
    let narrow = hasher.finish();
    let mut out = [0u8; 16];
    out[8..].copy_from_slice(&narrow.to_be_bytes());
    out
}

fn expected_full(content: &[u8]) -> [u8; 16] {
    xxh3_128(content).to_be_bytes()
}

#[test]
fn test_fringe_small_file_hashes_exact_bytes() {
    let tmp = TempDir::new().unwrap();
    let content = patterned(1000, 1);
    let path = write_file(&tmp, "small.bin", &content);

    let hasher = XxFingerprinter::new(FringeMode::Edge);
    let fp = hasher.fringe(&path, 1000).unwrap();
    assert_eq!(fp.as_bytes(), expected_fringe(&content, 1000));
}

#[test]
fn test_fringe_widened_with_leading_zeros() {
    let tmp = TempDir::new().unwrap();
    let path = write_file(&tmp, "w.bin", &patterned(64, 2));

    let hasher = XxFingerprinter::new(FringeMode::Edge);
    let fp = hasher.fringe(&path, 64).unwrap();
    assert_eq!(&fp.as_bytes()[..8], &[0u8; 8]);
}

#[test]
fn test_fringe_boundary_exactly_two_windows() {
    // Size 2W: the two windows tile the file exactly.
    let tmp = TempDir::new().unwrap();
    let size = 2 * FRINGE_WINDOW;
    let content = patterned(size, 3);
    let path = write_file(&tmp, "boundary.bin", &content);

    let hasher = XxFingerprinter::new(FringeMode::Edge);
    let fp = hasher.fringe(&path, size as u64).unwrap();
    assert_eq!(fp.as_bytes(), expected_fringe(&content, size as u64));
}

#[test]
fn test_fringe_boundary_one_byte_overlap_not_double_counted() {
    // Size 2W - 1: the windows overlap by one byte; the fingerprint must
    // cover each byte exactly once.
    let tmp = TempDir::new().unwrap();
    let size = 2 * FRINGE_WINDOW - 1;
    let content = patterned(size, 4);
    let path = write_file(&tmp, "overlap.bin", &content);

    let hasher = XxFingerprinter::new(FringeMode::Edge);
    let fp = hasher.fringe(&path, size as u64).unwrap();
    assert_eq!(fp.as_bytes(), expected_fringe(&content, size as u64));
}

#[test]
fn test_fringe_large_file_covers_first_and_last_window() {
    let tmp = TempDir::new().unwrap();
    let size = 200_000;
    let content = patterned(size, 5);
    let path = write_file(&tmp, "large.bin", &content);

    let mut stream = Vec::with_capacity(2 * FRINGE_WINDOW);
    stream.extend_from_slice(&content[..FRINGE_WINDOW]);
    stream.extend_from_slice(&content[size - FRINGE_WINDOW..]);

    let hasher = XxFingerprinter::new(FringeMode::Edge);
    let fp = hasher.fringe(&path, size as u64).unwrap();
    assert_eq!(fp.as_bytes(), expected_fringe(&stream, size as u64));
}

#[test]
fn test_fringe_distinguishes_sizes_with_identical_edges() {
    let tmp = TempDir::new().unwrap();
    let base = patterned(200_000, 6);
    let first = &base[..FRINGE_WINDOW];
    let last = &base[200_000 - FRINGE_WINDOW..];

    let mut a = Vec::new();
    a.extend_from_slice(first);
    a.extend_from_slice(&patterned(200_000 - 2 * FRINGE_WINDOW, 7));
    a.extend_from_slice(last);

    let mut b = Vec::new();
    b.extend_from_slice(first);
    b.extend_from_slice(&patterned(200_001 - 2 * FRINGE_WINDOW, 8));
    b.extend_from_slice(last);

    let path_a = write_file(&tmp, "a.bin", &a);
    let path_b = write_file(&tmp, "b.bin", &b);

    let hasher = XxFingerprinter::new(FringeMode::Edge);
    let fp_a = hasher.fringe(&path_a, a.len() as u64).unwrap();
    let fp_b = hasher.fringe(&path_b, b.len() as u64).unwrap();
    assert_ne!(fp_a, fp_b, "length must separate identical edge bytes");
}

#[test]
fn test_full_streaming_matches_single_shot() {
    // Larger than two read chunks, so the streaming path is exercised.
    let tmp = TempDir::new().unwrap();
    let content = patterned(600_000, 9);
    let path = write_file(&tmp, "stream.bin", &content);

    let hasher = XxFingerprinter::new(FringeMode::Edge);
    let fp = hasher.full(&path).unwrap();
    assert_eq!(fp.as_bytes(), expected_full(&content));
}

#[test]
fn test_full_differs_for_middle_mutation() {
    let tmp = TempDir::new().unwrap();
    let content = patterned(300_000, 10);
    let mut mutated = content.clone();
    mutated[150_000] ^= 0xFF;

    let path_a = write_file(&tmp, "orig.bin", &content);
    let path_b = write_file(&tmp, "mut.bin", &mutated);

    let hasher = XxFingerprinter::new(FringeMode::Edge);
    assert_ne!(
        hasher.full(&path_a).unwrap(),
        hasher.full(&path_b).unwrap()
    );
}

#[test]
fn test_contiguous_mode_reads_leading_bytes_only() {
    let tmp = TempDir::new().unwrap();
    let size = 200_000;
    let content = patterned(size, 11);
    let path = write_file(&tmp, "hdd.bin", &content);

    let hasher = XxFingerprinter::new(FringeMode::Contiguous);
    let fp = hasher.fringe(&path, size as u64).unwrap();
    assert_eq!(
        fp.as_bytes(),
        expected_fringe(&content[..2 * FRINGE_WINDOW], size as u64)
    );
}

#[test]
fn test_modes_agree_below_two_windows() {
    // Up to 2W both readers see the whole file, so the fingerprints match.
    let tmp = TempDir::new().unwrap();
    let content = patterned(50_000, 12);
    let path = write_file(&tmp, "both.bin", &content);

    let edge = XxFingerprinter::new(FringeMode::Edge);
    let contiguous = XxFingerprinter::new(FringeMode::Contiguous);
    assert_eq!(
        edge.fringe(&path, 50_000).unwrap(),
        contiguous.fringe(&path, 50_000).unwrap()
    );
}

#[test]
fn test_missing_file_surfaces_io_error() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("nope.bin");
    let hasher = XxFingerprinter::new(FringeMode::Edge);
    assert!(hasher.fringe(&path, 100).is_err());
    assert!(hasher.full(&path).is_err());
}
