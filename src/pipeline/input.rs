//! Input resolution: turn user-supplied paths into file records.
//!
//! Stands in for the upstream `**/*.html` discovery step of a site build.
//! A directory is scanned recursively for `.html` files; a file is taken as
//! is. Every record is read into memory so it counts as materialised.

use crate::error::ExportError;
use crate::record::FileRecord;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Whether `path` has an `.html` extension (any case).
pub fn is_html(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("html"))
}

/// Recursively collect `.html` files under `root`, sorted by path.
pub async fn discover_html(root: &Path) -> Result<Vec<PathBuf>, ExportError> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| ExportError::ReadFailed {
                path: dir.clone(),
                source: e,
            })?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ExportError::ReadFailed {
                path: dir.clone(),
                source: e,
            })?
        {
            let path = entry.path();
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| ExportError::ReadFailed {
                    path: path.clone(),
                    source: e,
                })?;
            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() && is_html(&path) {
                found.push(path);
            }
        }
    }

    found.sort();
    debug!("Found {} HTML files under {}", found.len(), root.display());
    Ok(found)
}

/// Resolve files and directories into buffered records.
///
/// Directories expand to their HTML files; explicit files are kept whatever
/// their extension. Order follows `inputs`, directories sorted within.
pub async fn collect_records<P: AsRef<Path>>(inputs: &[P]) -> Result<Vec<FileRecord>, ExportError> {
    let mut records = Vec::new();

    for input in inputs {
        let path = input.as_ref();
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|_| ExportError::SourceNotFound {
                path: path.to_path_buf(),
            })?;

        let files = if meta.is_dir() {
            discover_html(path).await?
        } else {
            vec![path.to_path_buf()]
        };

        for file in files {
            let record = FileRecord::read(&file)
                .await
                .map_err(|e| ExportError::ReadFailed {
                    path: file.clone(),
                    source: e,
                })?;
            records.push(record);
        }
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_is_html() {
        assert!(is_html(Path::new("index.html")));
        assert!(is_html(Path::new("docs/INDEX.HTML")));
        assert!(!is_html(Path::new("style.css")));
        assert!(!is_html(Path::new("page.htm")));
        assert!(!is_html(Path::new("html")));
    }

    #[tokio::test]
    async fn discovers_nested_html_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("b/deep")).unwrap();
        fs::write(root.join("z.html"), "z").unwrap();
        fs::write(root.join("a.html"), "a").unwrap();
        fs::write(root.join("b/deep/c.html"), "c").unwrap();
        fs::write(root.join("b/style.css"), "body{}").unwrap();

        let found = discover_html(root).await.unwrap();
        assert_eq!(
            found,
            vec![root.join("a.html"), root.join("b/deep/c.html"), root.join("z.html")]
        );
    }

    #[tokio::test]
    async fn collects_files_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("site")).unwrap();
        fs::write(root.join("site/index.html"), "<p>index</p>").unwrap();
        fs::write(root.join("extra.xhtml"), "<p>extra</p>").unwrap();

        let records = collect_records(&[root.join("extra.xhtml"), root.join("site")])
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].path(), root.join("extra.xhtml").as_path());
        assert_eq!(records[1].bytes(), Some(&b"<p>index</p>"[..]));
        assert!(records.iter().all(FileRecord::is_buffer));
    }

    #[tokio::test]
    async fn missing_input_is_reported() {
        let err = collect_records(&["/definitely/not/here"]).await.unwrap_err();
        assert!(matches!(err, ExportError::SourceNotFound { .. }));
    }
}
