//! SHA-256 content signatures for published versions
//!
//! A signature is a pure function of the published files: their sorted
//! relative paths and their bytes. Timestamps and permissions never enter
//! the digest, so republishing identical content yields the same signature.

use sha2::{Digest, Sha256};
use std::fs;

use crate::constants::StorePath;
use crate::{Error, NormalizedPath, Result, io};

/// Length of a hex-encoded SHA-256 digest
pub const SIGNATURE_LEN: usize = 64;

/// Compute the signature of an in-memory set of files.
///
/// `files` are `(relative path, bytes)` pairs; order does not matter.
pub fn signature_of<'a, I>(files: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let mut files: Vec<_> = files.into_iter().collect();
    files.sort_by(|a, b| a.0.cmp(b.0));

    let mut hasher = Sha256::new();
    for (path, bytes) in files {
        feed(&mut hasher, path, bytes);
    }
    format!("{:x}", hasher.finalize())
}

/// Compute the signature of every file below `dir`.
///
/// The signature marker file is excluded, so a version directory hashes
/// to the same value before and after its marker is written.
///
/// # Errors
///
/// Returns an error if the tree cannot be walked or a file cannot be read.
pub fn compute_signature(dir: &NormalizedPath) -> Result<String> {
    let files = io::list_files(dir, &[StorePath::SignatureMarker.as_str()])?;

    let mut hasher = Sha256::new();
    for relative in &files {
        let full = dir.join(relative).to_native();
        let bytes = fs::read(&full).map_err(|e| Error::io(&full, e))?;
        feed(&mut hasher, relative, &bytes);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Whether `value` is a well-formed lowercase hex SHA-256 digest.
pub fn is_signature(value: &str) -> bool {
    value.len() == SIGNATURE_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

fn feed(hasher: &mut Sha256, path: &str, bytes: &[u8]) {
    hasher.update(path.as_bytes());
    hasher.update([0u8]);
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}
