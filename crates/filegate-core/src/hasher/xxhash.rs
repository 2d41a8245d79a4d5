use std::fs::File;
use std::hash::Hasher as _;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use twox_hash::XxHash64;
use xxhash_rust::xxh3::Xxh3;

use super::{Fingerprint, FringeMode, Fingerprinter, CHUNK_SIZE, FRINGE_WINDOW};

/// Production fingerprinter: XxHash64 over the fringe bytes, XXH3-128 over
/// the full content. Seed 0 for both, so fingerprints are stable across
/// sessions and databases.
pub struct XxFingerprinter {
    mode: FringeMode,
}

impl XxFingerprinter {
    pub fn new(mode: FringeMode) -> Self {
        XxFingerprinter { mode }
    }

    pub fn mode(&self) -> FringeMode {
        self.mode
    }
}

impl Fingerprinter for XxFingerprinter {
    fn fringe(&self, path: &Path, size: u64) -> io::Result<Fingerprint> {
        let mut file = File::open(path)?;
        let mut hasher = XxHash64::with_seed(0);
        let window = FRINGE_WINDOW as u64;

        match self.mode {
            FringeMode::Edge if size > 2 * window => {
                let mut buf = vec![0u8; FRINGE_WINDOW];
                file.read_exact(&mut buf)?;
                hasher.write(&buf);
                file.seek(SeekFrom::Start(size - window))?;
                file.read_exact(&mut buf)?;
                hasher.write(&buf);
            }
            _ => {
                // Whole file (edge mode, size <= 2W: the two windows cover
                // every byte exactly once) or the leading 2W (contiguous
                // mode). Never feed a byte twice.
                let take = size.min(2 * window);
                let mut buf = vec![0u8; take as usize];
                file.read_exact(&mut buf)?;
                hasher.write(&buf);
            }
        }

        hasher.write(&size.to_le_bytes());
        Ok(Fingerprint::from_narrow(hasher.finish()))
    }

    fn full(&self, path: &Path) -> io::Result<Fingerprint> {
        let mut file = File::open(path)?;
        let expected = file.metadata()?.len();
        let mut hasher = Xxh3::new();
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut total: u64 = 0;

        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            total += n as u64;
        }

        if total < expected {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "{} shrank during read ({} of {} bytes)",
                    path.display(),
                    total,
                    expected
                ),
            ));
        }

        Ok(Fingerprint::from_wide(hasher.digest128()))
    }
}
