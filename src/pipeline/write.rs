//! Output path derivation and atomic PDF writes.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use url::Url;

/// Replace the extension of `path` with `ext`, or append it when there is
/// none. `ext` may be given with or without its leading dot.
pub fn replace_extension(path: &Path, ext: &str) -> PathBuf {
    path.with_extension(ext.trim_start_matches('.'))
}

/// The PDF written for `source`: same directory, same stem, `.pdf`.
pub fn pdf_path(source: &Path) -> PathBuf {
    replace_extension(source, "pdf")
}

/// `file://` URL for an absolute path.
pub fn file_url(path: &Path) -> Option<Url> {
    Url::from_file_path(path).ok()
}

/// Write `bytes` to `target` through a uniquely named sibling temp file and
/// a rename, so readers never observe a half-written PDF and an existing
/// file is replaced in one step.
pub async fn write_atomic(target: &Path, bytes: &[u8]) -> io::Result<()> {
    let target = target.to_path_buf();
    let bytes = bytes.to_vec();
    tokio::task::spawn_blocking(move || write_atomic_blocking(&target, &bytes))
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
}

fn write_atomic_blocking(target: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::Builder::new()
        .prefix(".sitepdf-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    // On failure the temp file is removed when the error drops it.
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}
