//! Bounded-cost file fingerprints.
//!
//! Small files are hashed in full. Files at least one chunk long are hashed
//! from their first chunk plus their size and modification time, so the I/O
//! per large file is constant. Two large files that differ only after the
//! first chunk and share size and mtime get the same fingerprint; this is a
//! change detector, not an integrity check.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use blake3::Hasher;

/// Bytes read before deciding whether a file is "large".
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// How a fingerprint was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FingerprintKind {
    /// Whole content was hashed.
    FullContent,
    /// First chunk plus size and modification time.
    PrefixWithMetadata,
    /// The file could not be read; path and (if known) mtime were hashed.
    Degraded,
}

/// A computed fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    /// Hex digest.
    pub hash: String,
    /// How the digest was derived.
    pub kind: FingerprintKind,
}

/// Computes fingerprints with a fixed chunk size.
#[derive(Debug, Clone, Copy)]
pub struct Fingerprinter {
    chunk_size: usize,
}

impl Fingerprinter {
    /// Create a fingerprinter with the default 8 KiB chunk.
    pub fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Create a fingerprinter with a custom chunk size (minimum 1 byte).
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Chunk size in bytes.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Fingerprint `path`. Never fails.
    pub fn fingerprint(&self, path: &Path) -> String {
        self.compute(path).hash
    }

    /// Fingerprint `path`, reporting how the value was derived.
    pub fn compute(&self, path: &Path) -> Fingerprint {
        match self.hash_content(path) {
            Ok(fingerprint) => fingerprint,
            Err(err) => {
                tracing::debug!(path = %path.display(), "falling back to path fingerprint: {err}");
                degraded(path)
            }
        }
    }

    fn hash_content(&self, path: &Path) -> io::Result<Fingerprint> {
        let mut file = File::open(path)?;
        let mut hasher = Hasher::new();
        let mut buf = vec![0u8; self.chunk_size];

        let first = read_full(&mut file, &mut buf)?;
        hasher.update(&buf[..first]);

        let kind = if first == self.chunk_size {
            let metadata = file.metadata()?;
            hasher.update(&metadata.len().to_le_bytes());
            hasher.update(&mtime_nanos(metadata.modified().ok()).to_le_bytes());
            FingerprintKind::PrefixWithMetadata
        } else {
            hash_rest(&mut file, &mut hasher, &mut buf)?;
            FingerprintKind::FullContent
        };

        Ok(Fingerprint {
            hash: hasher.finalize().to_hex().to_string(),
            kind,
        })
    }
}

impl Default for Fingerprinter {
    fn default() -> Self {
        Self::new()
    }
}

/// Fingerprint derived from the path and, if stat works, the mtime.
fn degraded(path: &Path) -> Fingerprint {
    let mut hasher = Hasher::new();
    hasher.update(path.to_string_lossy().as_bytes());
    if let Ok(modified) = path.metadata().and_then(|m| m.modified()) {
        hasher.update(&mtime_nanos(Some(modified)).to_le_bytes());
    }

    Fingerprint {
        hash: hasher.finalize().to_hex().to_string(),
        kind: FingerprintKind::Degraded,
    }
}

/// Feed everything left in `reader` to `hasher`.
fn hash_rest<R: Read>(reader: &mut R, hasher: &mut Hasher, buf: &mut [u8]) -> io::Result<()> {
    loop {
        let n = read_full(reader, buf)?;
        if n == 0 {
            return Ok(());
        }
        hasher.update(&buf[..n]);
    }
}

/// Read until `buf` is full or EOF. Returns bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Modification time as signed nanoseconds relative to the Unix epoch.
fn mtime_nanos(modified: Option<SystemTime>) -> i128 {
    match modified {
        Some(t) => match t.duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_nanos() as i128,
            Err(e) => -(e.duration().as_nanos() as i128),
        },
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, OpenOptions};
    use std::io::{Seek, SeekFrom, Write};
    use tempfile::TempDir;

    fn patterned(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_small_file_is_stable_and_content_sensitive() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("small.bin");
        let mut data = patterned(4096);
        fs::write(&path, &data).unwrap();

        let fp = Fingerprinter::new();
        let first = fp.compute(&path);
        let second = fp.compute(&path);
        assert_eq!(first, second);
        assert_eq!(first.kind, FingerprintKind::FullContent);
        assert_eq!(first.hash.len(), 64);

        data[4095] ^= 0xff;
        fs::write(&path, &data).unwrap();
        assert_ne!(fp.fingerprint(&path), first.hash);
    }

    #[test]
    fn test_small_file_covers_tail_beyond_one_read() {
        // One byte short of a chunk: the whole content is hashed.
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("almost.bin");
        let mut data = patterned(DEFAULT_CHUNK_SIZE - 1);
        fs::write(&path, &data).unwrap();

        let fp = Fingerprinter::new();
        let before = fp.compute(&path);
        assert_eq!(before.kind, FingerprintKind::FullContent);

        let last = data.len() - 1;
        data[last] ^= 0x01;
        fs::write(&path, &data).unwrap();
        assert_ne!(fp.fingerprint(&path), before.hash);
    }

    #[test]
    fn test_large_file_ignores_bytes_past_first_chunk() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("large.bin");
        fs::write(&path, patterned(20_000)).unwrap();

        let fp = Fingerprinter::new();
        let first = fp.compute(&path);
        assert_eq!(first.kind, FingerprintKind::PrefixWithMetadata);
        assert_eq!(fp.compute(&path), first);

        // Touch byte 9000 only, then put the mtime back: size and mtime are
        // unchanged, so the prefix+metadata fingerprint must not move.
        let mtime = fs::metadata(&path).unwrap().modified().unwrap();
        let mut file = OpenOptions::new().write(true).open(&path).unwrap();
        file.seek(SeekFrom::Start(9000)).unwrap();
        file.write_all(&[0xAB]).unwrap();
        file.set_modified(mtime).unwrap();
        drop(file);

        assert_eq!(fs::metadata(&path).unwrap().len(), 20_000);
        assert_eq!(fp.fingerprint(&path), first.hash);
    }

    #[test]
    fn test_large_file_changes_with_prefix_or_size() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("large.bin");
        let mut data = patterned(DEFAULT_CHUNK_SIZE);
        fs::write(&path, &data).unwrap();

        let fp = Fingerprinter::new();
        let first = fp.compute(&path);
        assert_eq!(first.kind, FingerprintKind::PrefixWithMetadata);

        data[10] ^= 0xff;
        fs::write(&path, &data).unwrap();
        let changed_prefix = fp.fingerprint(&path);
        assert_ne!(changed_prefix, first.hash);

        let mtime = fs::metadata(&path).unwrap().modified().unwrap();
        data.push(0);
        fs::write(&path, &data).unwrap();
        OpenOptions::new()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
        assert_ne!(fp.fingerprint(&path), changed_prefix);
    }

    #[test]
    fn test_empty_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("empty");
        fs::write(&path, b"").unwrap();

        let fp = Fingerprinter::new().compute(&path);
        assert_eq!(fp.kind, FingerprintKind::FullContent);
        assert_eq!(fp.hash, blake3::hash(b"").to_hex().to_string());
    }

    #[test]
    fn test_unreadable_path_degrades() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing.txt");

        let fp = Fingerprinter::new();
        let first = fp.compute(&missing);
        assert_eq!(first.kind, FingerprintKind::Degraded);
        assert_eq!(fp.compute(&missing), first);

        let other = fp.compute(&temp.path().join("other.txt"));
        assert_ne!(other.hash, first.hash);
    }

    /// Returns `Interrupted` before every successful short read.
    struct Interrupting {
        data: Vec<u8>,
        pos: usize,
        interrupt: bool,
    }

    impl Read for Interrupting {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.interrupt = !self.interrupt;
            if self.interrupt {
                return Err(io::Error::from(io::ErrorKind::Interrupted));
            }
            let n = buf.len().min(3).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn test_interrupted_reads_are_retried() {
        let data = patterned(100);
        let mut reader = Interrupting {
            data: data.clone(),
            pos: 0,
            interrupt: false,
        };

        let mut hasher = Hasher::new();
        let mut buf = vec![0u8; 16];
        hash_rest(&mut reader, &mut hasher, &mut buf).unwrap();

        assert_eq!(hasher.finalize(), blake3::hash(&data));
    }

    #[test]
    fn test_custom_chunk_size() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("f");
        fs::write(&path, b"0123456789").unwrap();

        assert_eq!(Fingerprinter::with_chunk_size(0).chunk_size(), 1);
        assert_eq!(
            Fingerprinter::with_chunk_size(4).compute(&path).kind,
            FingerprintKind::PrefixWithMetadata
        );
        assert_eq!(
            Fingerprinter::with_chunk_size(64).compute(&path).kind,
            FingerprintKind::FullContent
        );
    }
}
