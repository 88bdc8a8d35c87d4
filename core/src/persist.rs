//! Small helpers for the JSON files Tether keeps in its data directory.

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs;
use tracing::debug;

/// Reads and deserializes a JSON file. Returns `Ok(None)` if the file does not exist.
///
/// Malformed content is reported as [`io::ErrorKind::InvalidData`].
pub(crate) async fn read_json<T: DeserializeOwned>(path: &Path) -> io::Result<Option<T>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let value = serde_json::from_slice(&bytes)?;
    Ok(Some(value))
}

/// Serializes `value` and replaces `path` with it.
///
/// The content goes to a sibling temporary file first and is then renamed over the
/// target, so readers never observe a half-written file.
pub(crate) async fn write_json<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let content = serde_json::to_vec_pretty(value)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let tmp = temp_path(path);
    fs::write(&tmp, content).await?;
    fs::rename(&tmp, path).await?;
    debug!("Wrote {}", path.display());
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
