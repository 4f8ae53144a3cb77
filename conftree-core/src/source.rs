use std::fs;
use std::path::Path;

use thiserror::Error;

/// Errors raised while loading an export from disk.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Failed to read the input file.
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

/// Read an export file.
///
/// Exports occasionally carry stray non-UTF-8 bytes in comments, so invalid
/// sequences are replaced rather than rejected.
pub fn read_source(path: &Path) -> Result<String, SourceError> {
    let bytes = fs::read(path).map_err(|source| SourceError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
