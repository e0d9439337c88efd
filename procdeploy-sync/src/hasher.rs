//! SHA-256 fingerprints of raw script bytes.
//!
//! No normalisation: a CRLF/LF flip or a BOM change is a new fingerprint
//! and the script is redeployed.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use procdeploy_core::Fingerprint;

/// Read buffer size. Files are streamed, never loaded whole.
const CHUNK_SIZE: usize = 8192;

/// Hash everything `reader` yields.
pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<Fingerprint> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        hasher.update(&buf[..n]);
    }
    Ok(Fingerprint(hex::encode(hasher.finalize())))
}

/// Hash the file at `path`.
pub fn hash_file(path: &Path) -> io::Result<Fingerprint> {
    hash_reader(File::open(path)?)
}

/// Hash an in-memory buffer.
pub fn hash_bytes(bytes: &[u8]) -> Fingerprint {
    Fingerprint(hex::encode(Sha256::digest(bytes)))
}
