//! Capability-based file helpers for the handover tools.
//!
//! `cap-std` only opens paths relative to a directory handle, so each helper
//! first splits its target into an ambient base directory (the filesystem
//! root, a Windows drive, or the current directory) and a relative remainder.
#![forbid(unsafe_code)]

use std::io;
use std::path::{Component, MAIN_SEPARATOR_STR};

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};

/// Open `path` for reading, e.g. a fleet snapshot.
///
/// # Errors
///
/// Returns the underlying I/O error when the file cannot be opened.
pub fn open_utf8_file(path: &Utf8Path) -> io::Result<fs_utf8::File> {
    fs_utf8::File::open_ambient(path, ambient_authority())
}

/// Whether `path` names an existing regular file.
///
/// A missing file is `Ok(false)`; other failures, such as an unreadable
/// parent directory, are returned.
///
/// # Errors
///
/// Returns the underlying I/O error when the parent cannot be inspected.
pub fn file_is_file(path: &Utf8Path) -> io::Result<bool> {
    let Some(name) = path.file_name() else {
        return Ok(false);
    };
    let dir = fs_utf8::Dir::open_ambient_dir(parent_or_current(path), ambient_authority())?;
    match dir.metadata(name) {
        Ok(meta) => Ok(meta.is_file()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

/// Create every missing directory above `path`, such as the folder that
/// will hold the SQLite database.
///
/// # Errors
///
/// Returns the underlying I/O error when a directory cannot be created.
pub fn ensure_parent_dir(path: &Utf8Path) -> io::Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_str().is_empty() {
        return Ok(());
    }
    let (base, relative) = split_ambient(parent)?;
    if relative.as_str().is_empty() {
        return Ok(());
    }
    base.create_dir_all(&relative)
}

fn parent_or_current(path: &Utf8Path) -> &Utf8Path {
    match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    }
}

/// Split `path` into an opened anchor directory and the part below it.
fn split_ambient(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, Utf8PathBuf)> {
    let (anchor, relative) = match path.as_std_path().components().next() {
        Some(Component::Prefix(prefix)) => {
            let drive = prefix
                .as_os_str()
                .to_str()
                .ok_or_else(|| io::Error::other("path prefix is not UTF-8"))?;
            let anchor = Utf8PathBuf::from(format!("{drive}{MAIN_SEPARATOR_STR}"));
            let relative = path
                .strip_prefix(&anchor)
                .or_else(|_| path.strip_prefix(drive))
                .map_err(io::Error::other)?;
            (anchor, relative.to_path_buf())
        }
        Some(Component::RootDir) => {
            let anchor = Utf8PathBuf::from(MAIN_SEPARATOR_STR);
            let relative = path.strip_prefix(&anchor).map_err(io::Error::other)?;
            (anchor, relative.to_path_buf())
        }
        _ => (Utf8PathBuf::from("."), path.to_path_buf()),
    };
    let dir = fs_utf8::Dir::open_ambient_dir(&anchor, ambient_authority())?;
    Ok((dir, relative))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Read;
    use tempfile::TempDir;

    fn utf8_root(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("temp dir is UTF-8")
    }

    #[rstest]
    fn creates_nested_parents_for_absolute_paths() {
        let dir = TempDir::new().expect("temp dir");
        let target = utf8_root(&dir).join("state/db/handover.db");
        ensure_parent_dir(&target).expect("create parents");
        assert!(target.parent().is_some_and(|parent| parent.is_dir()));
        ensure_parent_dir(&target).expect("existing parents are fine");
    }

    #[rstest]
    #[case::bare_file("handover.db")]
    #[case::root("/handover.db")]
    fn paths_without_missing_parents_are_noops(#[case] path: &str) {
        ensure_parent_dir(Utf8Path::new(path)).expect("nothing to create");
    }

    #[rstest]
    fn reports_regular_files_only() {
        let dir = TempDir::new().expect("temp dir");
        let root = utf8_root(&dir);
        let file = root.join("fleet.json");
        std::fs::write(&file, "{}").expect("write file");

        assert!(file_is_file(&file).expect("inspect file"));
        assert!(!file_is_file(&root.join("missing.json")).expect("inspect missing"));
        assert!(!file_is_file(&root).expect("inspect directory"));
    }

    #[rstest]
    fn opens_files_for_reading() {
        let dir = TempDir::new().expect("temp dir");
        let file = utf8_root(&dir).join("fleet.json");
        std::fs::write(&file, "{\"operators\":[]}").expect("write file");

        let mut contents = String::new();
        open_utf8_file(&file)
            .expect("open file")
            .read_to_string(&mut contents)
            .expect("read file");
        assert_eq!(contents, "{\"operators\":[]}");
    }
}
