//! Local persistence helpers: atomic JSON writes and directory scans.
//!
//! Finished sessions are stored one JSON file per session; writes go to a
//! `.tmp` sibling first and are renamed into place.

use std::io;
use std::path::{Path, PathBuf};

/// Atomically write JSON data to a file.
///
/// Serializes `data` to pretty-printed JSON, writes to a `.tmp` sibling file,
/// then renames to the target path. Creates parent directories if they don't exist.
pub fn atomic_write_json<T: serde::Serialize>(path: &Path, data: &T) -> io::Result<()> {
    let json = serde_json::to_string_pretty(data).map_err(io::Error::other)?;
    atomic_write(path, json.as_bytes())
}

/// Atomically write raw bytes to a file.
pub fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Load and deserialize JSON from a file.
///
/// Returns `Ok(None)` if the file doesn't exist.
pub fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> io::Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read_to_string(path)?;
    let value =
        serde_json::from_str(&data).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(Some(value))
}

/// Every `*.json` file directly inside `dir`. A missing directory yields an empty list.
pub fn json_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Snapshot {
        brief: String,
        revisions: u32,
    }

    #[test]
    fn test_atomic_write_json_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sessions").join("one.json");
        let data = Snapshot {
            brief: "Denver day hikes".into(),
            revisions: 2,
        };

        atomic_write_json(&path, &data).unwrap();
        let loaded: Option<Snapshot> = load_json(&path).unwrap();
        assert_eq!(loaded, Some(data));
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_load_json_nonexistent() {
        let result: io::Result<Option<Snapshot>> = load_json(Path::new("/nonexistent/file.json"));
        assert!(result.unwrap().is_none());
    }

    #[test]
    fn test_load_json_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = load_json::<Snapshot>(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_json_files_filters_extension() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.json"), "{}").unwrap();
        std::fs::write(dir.path().join("a.json"), "{}").unwrap();
        std::fs::write(dir.path().join("c.tmp"), "{}").unwrap();

        let files = json_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .collect();
        assert_eq!(names, vec!["a.json", "b.json"]);
        assert!(json_files(&dir.path().join("missing")).unwrap().is_empty());
    }
}
