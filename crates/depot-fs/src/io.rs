//! Atomic I/O operations with file locking
//!
//! Read-side helpers treat a missing path as "empty" rather than an error;
//! every other I/O failure is surfaced with the offending path attached.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use fs2::FileExt;
use walkdir::WalkDir;

use crate::{Error, NormalizedPath, Result};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Write content atomically to a file with locking.
///
/// Uses write-to-temp-then-rename so readers never observe a partially
/// written document. The temp file lives in the same directory as the
/// target to keep the rename on one filesystem.
pub fn write_atomic(path: &NormalizedPath, content: &[u8]) -> Result<()> {
    let native_path = path.to_native();

    if let Some(parent) = native_path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    let temp_name = format!(
        ".{}.{}.{}.tmp",
        native_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default(),
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    );
    let temp_path = native_path.with_file_name(&temp_name);

    let mut temp_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .map_err(|e| Error::io(&temp_path, e))?;

    let written = fill_and_rename(&mut temp_file, content, &temp_path, &native_path);

    if written.is_err() {
        drop(temp_file);
        if let Err(e) = fs::remove_file(&temp_path) {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!(path = %temp_path.display(), "Failed to remove temp file: {}", e);
            }
        }
    }
    written
}

fn fill_and_rename(file: &mut File, content: &[u8], temp_path: &Path, target: &Path) -> Result<()> {
    file.lock_exclusive().map_err(|_| Error::LockFailed {
        path: target.to_path_buf(),
    })?;
    file.write_all(content).map_err(|e| Error::io(temp_path, e))?;
    file.sync_all().map_err(|e| Error::io(temp_path, e))?;
    file.unlock().map_err(|_| Error::LockFailed {
        path: target.to_path_buf(),
    })?;
    fs::rename(temp_path, target).map_err(|e| Error::io(target, e))
}

/// Read text content from a file.
pub fn read_text(path: &NormalizedPath) -> Result<String> {
    let native_path = path.to_native();
    fs::read_to_string(&native_path).map_err(|e| Error::io(&native_path, e))
}

/// Read text content, returning `None` when the file does not exist.
pub fn read_text_if_exists(path: &NormalizedPath) -> Result<Option<String>> {
    match read_text(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Write text content to a file atomically.
pub fn write_text(path: &NormalizedPath, content: &str) -> Result<()> {
    write_atomic(path, content.as_bytes())
}

/// Create a directory and all of its parents.
pub fn ensure_dir(path: &NormalizedPath) -> Result<()> {
    let native = path.to_native();
    fs::create_dir_all(&native).map_err(|e| Error::io(&native, e))
}

/// Remove a file. Returns `false` if it was already gone.
pub fn remove_file_if_exists(path: &NormalizedPath) -> Result<bool> {
    let native = path.to_native();
    match fs::remove_file(&native) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::io(&native, e)),
    }
}

/// Recursively remove a directory. Returns `false` if it was already gone.
pub fn remove_dir_all_if_exists(path: &NormalizedPath) -> Result<bool> {
    let native = path.to_native();
    match fs::remove_dir_all(&native) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::io(&native, e)),
    }
}

/// Remove `path` if it is an empty directory.
///
/// Returns `true` when the directory was removed, `false` when it is
/// missing or still has entries.
pub fn remove_dir_if_empty(path: &NormalizedPath) -> Result<bool> {
    let native = path.to_native();
    let mut entries = match fs::read_dir(&native) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(Error::io(&native, e)),
    };
    if entries.next().is_some() {
        return Ok(false);
    }
    match fs::remove_dir(&native) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::io(&native, e)),
    }
}

/// Names of the immediate subdirectories of `path`, sorted.
///
/// A missing directory yields an empty list.
pub fn list_dir_names(path: &NormalizedPath) -> Result<Vec<String>> {
    let native = path.to_native();
    let entries = match fs::read_dir(&native) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::io(&native, e)),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(&native, e))?;
        let file_type = entry.file_type().map_err(|e| Error::io(entry.path(), e))?;
        if file_type.is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Every regular file below `root`, as sorted `/`-separated relative paths.
///
/// Files whose name equals one of `exclude` are skipped. A missing root
/// yields an empty list.
pub fn list_files(root: &NormalizedPath, exclude: &[&str]) -> Result<Vec<String>> {
    let native_root = root.to_native();
    if !native_root.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(&native_root).follow_links(false) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if exclude.iter().any(|ex| *ex == name) {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(&native_root)
            .unwrap_or(entry.path());
        files.push(NormalizedPath::new(relative).as_str().to_string());
    }
    files.sort();
    Ok(files)
}

/// Copy `src` to `dest`, creating the destination's parent directories.
pub fn copy_file(src: &Path, dest: &NormalizedPath) -> Result<u64> {
    let native_dest = dest.to_native();
    if let Some(parent) = native_dest.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    fs::copy(src, &native_dest).map_err(|e| Error::io(src, e))
}

/// Total size in bytes of all files below `path`.
///
/// A missing path has size zero.
pub fn dir_size(path: &NormalizedPath) -> Result<u64> {
    let native = path.to_native();
    if !native.exists() {
        return Ok(0);
    }

    let mut total = 0u64;
    for entry in WalkDir::new(&native).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            // Entries can vanish while another process prunes the tree.
            Err(e) if e.io_error().map(|io| io.kind()) == Some(ErrorKind::NotFound) => continue,
            Err(e) => return Err(e.into()),
        };
        if entry.file_type().is_file() {
            let metadata = entry.metadata()?;
            total += metadata.len();
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn failed_write_atomic_removes_its_temp_file() {
        let dir = tempdir().unwrap();
        let target = dir.path().join(".depot-signature");
        fs::create_dir_all(target.join("occupied")).unwrap();

        let result = write_atomic(&NormalizedPath::new(&target), b"abc\n");
        assert!(result.is_err());

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![".depot-signature".to_string()]);
    }

    #[test]
    fn write_atomic_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = NormalizedPath::new(dir.path().join("doc.toml"));

        write_atomic(&path, b"a = 1").unwrap();

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "temp files left: {leftovers:?}");
        assert_eq!(fs::read_to_string(path.to_native()).unwrap(), "a = 1");
    }

    #[test]
    fn missing_paths_are_empty() {
        let dir = tempdir().unwrap();
        let missing = NormalizedPath::new(dir.path().join("nope"));

        assert_eq!(read_text_if_exists(&missing).unwrap(), None);
        assert!(list_dir_names(&missing).unwrap().is_empty());
        assert!(list_files(&missing, &[]).unwrap().is_empty());
        assert_eq!(dir_size(&missing).unwrap(), 0);
        assert!(!remove_dir_all_if_exists(&missing).unwrap());
        assert!(!remove_file_if_exists(&missing).unwrap());
    }

    #[test]
    fn remove_dir_if_empty_keeps_populated_dirs() {
        let dir = tempdir().unwrap();
        let full = NormalizedPath::new(dir.path().join("full"));
        let empty = NormalizedPath::new(dir.path().join("empty"));
        fs::create_dir_all(full.to_native()).unwrap();
        fs::write(full.join("f").to_native(), "x").unwrap();
        fs::create_dir_all(empty.to_native()).unwrap();

        assert!(!remove_dir_if_empty(&full).unwrap());
        assert!(remove_dir_if_empty(&empty).unwrap());
        assert!(full.exists());
        assert!(!empty.exists());
    }

    #[test]
    fn list_files_is_sorted_and_relative() {
        let dir = tempdir().unwrap();
        let root = NormalizedPath::new(dir.path());
        fs::create_dir_all(dir.path().join("lib")).unwrap();
        fs::write(dir.path().join("lib/b.js"), "b").unwrap();
        fs::write(dir.path().join("a.json"), "a").unwrap();
        fs::write(dir.path().join(".skip"), "s").unwrap();

        let files = list_files(&root, &[".skip"]).unwrap();
        assert_eq!(files, vec!["a.json".to_string(), "lib/b.js".to_string()]);
        assert_eq!(dir_size(&root).unwrap(), 3);
    }
}
