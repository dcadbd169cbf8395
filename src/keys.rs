//! Credential file loading
//!
//! Credentials live outside the core as a JSON array of opaque per-provider
//! blobs. This module reads them into [`Credential`] values; shaping a pool
//! out of them is up to the caller.

use std::fs;
use std::path::Path;
use tracing::debug;

use crate::limiter::Credential;

/// Credential file errors.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    /// The file could not be read
    #[error("failed to read key file: {0}")]
    Io(#[from] std::io::Error),

    /// The file was not a JSON array of credential objects
    #[error("failed to parse key file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Read a list of credentials from a JSON file.
///
/// # Errors
/// Returns [`KeyError`] if the file cannot be read or is not a JSON array.
pub fn load_keys(path: impl AsRef<Path>) -> Result<Vec<Credential>, KeyError> {
    let path = path.as_ref();
    debug!("reading keys from {}", path.display());

    let contents = fs::read_to_string(path)?;
    let keys: Vec<Credential> = serde_json::from_str(&contents)?;

    debug!("loaded {} keys from {}", keys.len(), path.display());
    Ok(keys)
}

/// Read credentials from a JSON file, split into blocks of at most `size`.
///
/// Useful for partitioning one key file across several independent pools
/// (one per worker process or stream group).
///
/// # Errors
/// Returns [`KeyError`] on read or parse failure.
pub fn load_keys_split(
    path: impl AsRef<Path>,
    size: usize,
) -> Result<Vec<Vec<Credential>>, KeyError> {
    let keys = load_keys(path)?;
    let size = size.max(1);
    Ok(keys.chunks(size).map(<[Credential]>::to_vec).collect())
}
