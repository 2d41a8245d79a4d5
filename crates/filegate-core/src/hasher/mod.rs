use std::io;
use std::path::Path;

pub mod xxhash;

pub use xxhash::XxFingerprinter;

/// Window read from each end of a file for the fringe fingerprint.
pub const FRINGE_WINDOW: usize = 64 * 1024;

/// Chunk size for streaming the full-content fingerprint.
pub const CHUNK_SIZE: usize = 256 * 1024;

/// A 128-bit content fingerprint, stored big-endian.
///
/// Fringe fingerprints are produced 64 bits wide and widened by zero
/// padding on the left, so the two widths share one storage form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u128);

impl Fingerprint {
    pub fn from_wide(value: u128) -> Self {
        Fingerprint(value)
    }

    pub fn from_narrow(value: u64) -> Self {
        Fingerprint(value as u128)
    }

    pub fn as_bytes(&self) -> [u8; 16] {
        self.0.to_be_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 16] = bytes.try_into().ok()?;
        Some(Fingerprint(u128::from_be_bytes(arr)))
    }

    /// 32-character lowercase hex form, used for shard ids.
    pub fn to_hex(&self) -> String {
        format!("{:032x}", self.0)
    }
}

/// How the fringe reader covers a file. The two modes produce different
/// fingerprints for files larger than two windows, so a database is bound
/// to the mode it was created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FringeMode {
    /// First window + last window (seeks on large files).
    Edge,
    /// One sequential read of up to two windows from the start.
    Contiguous,
}

impl FringeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FringeMode::Edge => "edge",
            FringeMode::Contiguous => "contiguous",
        }
    }
}

/// Content fingerprinting over file regions.
///
/// Abstracted so the pipeline can be exercised with in-memory fakes.
pub trait Fingerprinter {
    /// Fingerprint of the file's edge bytes plus its length. `size` is the
    /// length observed by the caller's single metadata probe.
    fn fringe(&self, path: &Path, size: u64) -> io::Result<Fingerprint>;

    /// Streaming fingerprint of the entire file content.
    fn full(&self, path: &Path) -> io::Result<Fingerprint>;
}
