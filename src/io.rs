//! Append-only file helpers shared by the ledger and the sink

use crate::error::Result;
use chrono::Utc;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Open `path` for appending, creating it and its parent directories
///
/// Returns the file and whether it was empty. A trailing partial line left
/// by an interrupted write is terminated so the next row starts cleanly.
pub(crate) fn open_append(path: &Path) -> Result<(File, bool)> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let is_empty = file.metadata()?.len() == 0;

    if !is_empty && !ends_with_newline(path)? {
        file.write_all(b"\n")?;
    }

    Ok((file, is_empty))
}

/// Header row of an existing, non-empty CSV file
///
/// `None` when the file is missing or empty; `Some(None)` when the header
/// cannot be read at all.
pub(crate) fn existing_header(path: &Path) -> Option<Option<csv::StringRecord>> {
    let len = std::fs::metadata(path).map(|m| m.len()).ok()?;
    if len == 0 {
        return None;
    }
    let header = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .and_then(|mut reader| reader.headers().cloned())
        .ok();
    Some(header)
}

/// Move an unusable file aside so a fresh one can start at `path`
///
/// The old contents are kept as `<name>.corrupt-<timestamp>`.
pub(crate) fn set_aside(path: &Path) -> Result<PathBuf> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stamp = Utc::now().format("%Y%m%dT%H%M%S");

    let mut target = path.with_file_name(format!("{name}.corrupt-{stamp}"));
    let mut n = 1;
    while target.exists() {
        target = path.with_file_name(format!("{name}.corrupt-{stamp}-{n}"));
        n += 1;
    }
    std::fs::rename(path, &target)?;
    Ok(target)
}

fn ends_with_newline(path: &Path) -> Result<bool> {
    let mut file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_append_creates_parents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a").join("b.csv");

        let (_, is_empty) = open_append(&path).unwrap();
        assert!(is_empty);
        assert!(path.exists());
    }

    #[test]
    fn test_open_append_terminates_partial_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "id\n1\n2").unwrap();

        let (mut file, is_empty) = open_append(&path).unwrap();
        assert!(!is_empty);
        file.write_all(b"3\n").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "id\n1\n2\n3\n");
    }

    #[test]
    fn test_existing_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        assert!(existing_header(&path).is_none());

        std::fs::write(&path, "").unwrap();
        assert!(existing_header(&path).is_none());

        std::fs::write(&path, "id,name\n1,a\n").unwrap();
        let header = existing_header(&path).unwrap().unwrap();
        assert_eq!(header.iter().collect::<Vec<_>>(), vec!["id", "name"]);

        std::fs::write(&path, [0xff, 0xfe, b'\n']).unwrap();
        assert!(existing_header(&path).unwrap().is_none());
    }

    #[test]
    fn test_set_aside_keeps_old_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("done.csv");
        std::fs::write(&path, "unit_ke").unwrap();

        let first = set_aside(&path).unwrap();
        assert!(!path.exists());
        assert_eq!(std::fs::read_to_string(&first).unwrap(), "unit_ke");

        std::fs::write(&path, "again").unwrap();
        let second = set_aside(&path).unwrap();
        assert_ne!(first, second);
        assert_eq!(std::fs::read_to_string(&second).unwrap(), "again");
    }
}
