//! Atomic file replacement for workspace documents.

use std::io::Write;
use std::path::{Path, PathBuf};

/// Write `content` to `path` so that readers see either the old file or the
/// complete new one:
/// - ensure the parent directory exists
/// - write to a uniquely named temp file in the same directory
/// - fsync, then rename over the target
///
/// The temp file is removed if any step before the rename fails.
pub fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent)?;

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .unwrap_or("document");
    let temp_path = parent.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

    let result = write_and_sync(&temp_path, content).and_then(|_| std::fs::rename(&temp_path, path));
    if result.is_err() {
        let _ = std::fs::remove_file(&temp_path);
    }
    result
}

fn write_and_sync(temp_path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut file = std::fs::File::create(temp_path)?;
    file.write_all(content)?;
    file.sync_all()
}
