//! SHA-256 verification against a release checksums manifest.
//!
//! The manifest has one `<hex digest> <file name>` pair per line, as
//! produced by `sha256sum`.

use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use super::UpdateError;
use crate::platform::Platform;

const CHUNK_SIZE: usize = 64 * 1024;

/// SHA-256 of the file at `path`, read in fixed-size chunks.
pub fn digest(path: &Path) -> Result<[u8; 32], UpdateError> {
    let mut file = File::open(path).map_err(|e| UpdateError::fs("open", path, e))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = file
            .read(&mut buf)
            .map_err(|e| UpdateError::fs("read", path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    Ok(out)
}

/// Expected digest for `platform` from the manifest at `manifest`.
pub fn lookup_expected(manifest: &Path, platform: &Platform) -> Result<Vec<u8>, UpdateError> {
    let text = fs::read_to_string(manifest).map_err(|e| UpdateError::fs("read", manifest, e))?;
    parse_manifest(&text, platform)
}

/// Every non-empty line must hold exactly two fields. The first line whose
/// file name mentions the platform wins.
pub fn parse_manifest(text: &str, platform: &Platform) -> Result<Vec<u8>, UpdateError> {
    for (idx, line) in text.lines().enumerate() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        let [hash, file_name] = fields[..] else {
            return Err(UpdateError::Decode {
                what: "checksums manifest",
                reason: format!("line {}: expected 2 fields, got {}", idx + 1, fields.len()),
            });
        };
        if platform.matches(file_name) {
            return hex::decode(hash).map_err(|e| UpdateError::Decode {
                what: "checksums manifest",
                reason: format!("line {}: {e}", idx + 1),
            });
        }
    }

    Err(UpdateError::ChecksumNotFound {
        os: platform.os().to_string(),
        arch: platform.arch().to_string(),
    })
}

/// Check `asset` against its manifest entry.
pub fn verify(asset: &Path, manifest: &Path, platform: &Platform) -> Result<(), UpdateError> {
    let expected = lookup_expected(manifest, platform)?;
    let actual = digest(asset)?;
    if expected.as_slice() != actual.as_slice() {
        return Err(UpdateError::ChecksumMismatch {
            expected: hex::encode(expected),
            actual: hex::encode(actual),
        });
    }
    Ok(())
}
