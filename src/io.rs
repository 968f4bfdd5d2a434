use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;

use crate::result::{err_msg, Result};

/// Suffix of in-progress files
pub const PART_SUFFIX: &str = ".part";

/// Create a named temporary file next to `dest`, so that it can later be
/// renamed over it without crossing file systems.
///
/// The file is removed when the handle is dropped.
/// **As such, one must not simply get the file path and drop the handle.**
pub fn sibling_tempfile(dest: &Path) -> Result<NamedTempFile> {
    let dir = parent_dir(dest)?;
    fs::create_dir_all(dir)?;

    // Keep the real extension last: some tools pick the format from it
    let suffix = match dest.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => format!("{PART_SUFFIX}.{ext}"),
        None => PART_SUFFIX.to_owned(),
    };

    Ok(tempfile::Builder::new()
        .prefix(".")
        .suffix(&suffix)
        .tempfile_in(dir)?)
}

/// Move a finished temporary file to its final place
pub fn publish(tmp: NamedTempFile, dest: &Path) -> Result<()> {
    tmp.persist(dest).map_err(|err| err.error)?;
    Ok(())
}

/// Write the whole content to `dest`, never exposing a partially written file
pub fn atomic_write(dest: &Path, contents: &[u8]) -> Result<()> {
    let mut tmp = sibling_tempfile(dest)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    publish(tmp, dest)
}

/// Whether a directory entry is an in-progress file left by [`sibling_tempfile`]
pub fn is_part_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.') && name.contains(PART_SUFFIX))
}

pub fn parent_dir(path: &Path) -> Result<&Path> {
    match path.parent() {
        Some(parent) if parent.as_os_str().is_empty() => Ok(Path::new(".")),
        Some(parent) => Ok(parent),
        None => Err(err_msg(format!("'{}' has no parent directory", path.display()))),
    }
}

/// List the regular files of a directory, sorted by name.
/// A missing directory is treated as empty.
pub fn sorted_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_leaves_no_part_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested").join("out.json");

        atomic_write(&dest, b"{}").unwrap();

        assert_eq!(fs::read(&dest).unwrap(), b"{}");
        let leftovers: Vec<_> = sorted_files(dest.parent().unwrap())
            .unwrap()
            .into_iter()
            .filter(|p| is_part_file(p))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn dropped_tempfile_disappears() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("video.mp4");

        let tmp = sibling_tempfile(&dest).unwrap();
        let tmp_path = tmp.path().to_path_buf();
        assert!(is_part_file(&tmp_path));
        assert!(tmp_path.to_string_lossy().ends_with(".part.mp4"));

        drop(tmp);
        assert!(!tmp_path.exists());
        assert!(!dest.exists());
    }
}
