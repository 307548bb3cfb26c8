//! Single-pass fingerprint + compression codec
//!
//! Every byte read from the source goes to both an XXH64 hasher and a zlib
//! stream, so the stored payload and the fingerprint always describe the
//! same bytes. XXH64 is fast and non-cryptographic: good enough to spot
//! duplicates, not safe against adversarial input (see collision handling in
//! the repositories).

use crate::error::{CodecError, CodecResult};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::fmt;
use std::io::{ErrorKind, Read, Write};
use xxhash_rust::xxh64::{xxh64, Xxh64};

/// Seed for the content hasher; fixed so fingerprints are reproducible
const FINGERPRINT_SEED: u64 = 0;

/// Read buffer size for streaming sources
const READ_CHUNK: usize = 64 * 1024;

/// 64-bit content fingerprint, the primary key of every stored object
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }

    /// Signed form used as the SQLite `id` column
    pub fn as_i64(self) -> i64 {
        self.0 as i64
    }

    pub fn from_i64(id: i64) -> Self {
        Self(id as u64)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Output of [`encode`]
#[derive(Debug, Clone)]
pub struct Encoded {
    pub fingerprint: Fingerprint,
    /// Complete zlib stream
    pub payload: Vec<u8>,
    /// Number of bytes read from the source
    pub size: u64,
}

/// Fingerprint and compress a stream in one pass
///
/// Fails with [`CodecError::Io`] if the stream cannot be read to the end.
pub fn encode<R: Read>(mut reader: R) -> CodecResult<Encoded> {
    let mut hasher = Xxh64::new(FINGERPRINT_SEED);
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    let mut buf = vec![0u8; READ_CHUNK];
    let mut size = 0u64;

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(CodecError::Io(e)),
        };
        hasher.update(&buf[..n]);
        encoder.write_all(&buf[..n])?;
        size += n as u64;
    }

    let payload = encoder.finish()?;

    Ok(Encoded {
        fingerprint: Fingerprint(hasher.digest()),
        payload,
        size,
    })
}

/// Decompress a payload produced by [`encode`]
pub fn decode(payload: &[u8]) -> CodecResult<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(payload);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).map_err(CodecError::Decode)?;
    Ok(out)
}

/// Fingerprint an in-memory buffer without compressing it
///
/// Always equal to `encode(content).fingerprint`.
pub fn fingerprint_bytes(content: &[u8]) -> Fingerprint {
    Fingerprint(xxh64(content, FINGERPRINT_SEED))
}
