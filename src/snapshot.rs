//! Scoped snapshot copies of live history databases.
//!
//! Browsers keep their history database open and locked while running. We
//! never open the live file: a [`Snapshot`] copies it to a temporary sibling
//! and removes that copy when dropped. Dropping happens on every exit path,
//! including `?` returns, panics, and cancellation of the owning future.

use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::SourceError;

const SNAPSHOT_PREFIX: &str = ".hdigest-snapshot-";

/// A temporary copy of a history store, deleted on drop.
#[derive(Debug)]
pub struct Snapshot {
    file: NamedTempFile,
}

impl Snapshot {
    /// Copy `source` into a new temporary file in the same directory.
    ///
    /// The copy lives next to the original so it lands on the same volume
    /// and inherits the profile directory's permissions.
    pub fn take(source: &Path) -> Result<Self, SourceError> {
        let dir = match source.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let file = tempfile::Builder::new()
            .prefix(SNAPSHOT_PREFIX)
            .suffix(".sqlite")
            .tempfile_in(dir)
            .map_err(|e| SourceError::Snapshot {
                path: source.to_path_buf(),
                source: e,
            })?;

        std::fs::copy(source, file.path()).map_err(|e| SourceError::Snapshot {
            path: source.to_path_buf(),
            source: e,
        })?;

        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

impl Drop for Snapshot {
    fn drop(&mut self) {
        // SQLite may leave sidecar files next to the copy. The copy itself
        // is removed by NamedTempFile after this runs.
        for suffix in ["-wal", "-shm", "-journal"] {
            let mut sidecar = self.file.path().as_os_str().to_owned();
            sidecar.push(suffix);
            let _ = std::fs::remove_file(&sidecar);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_snapshot_copies_and_cleans_up() {
        let tmp = TempDir::new().unwrap();
        let original = tmp.path().join("History");
        std::fs::write(&original, b"sqlite bytes").unwrap();

        let snapshot_path = {
            let snapshot = Snapshot::take(&original).unwrap();
            assert_ne!(snapshot.path(), original.as_path());
            assert_eq!(snapshot.path().parent(), original.parent());
            assert_eq!(std::fs::read(snapshot.path()).unwrap(), b"sqlite bytes");
            snapshot.path().to_path_buf()
        };

        assert!(!snapshot_path.exists());
        assert!(original.exists());
    }

    #[test]
    fn test_snapshot_of_missing_file_fails_without_leftovers() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("History");

        let err = Snapshot::take(&missing).unwrap_err();
        assert!(matches!(err, SourceError::Snapshot { .. }));

        let leftovers: Vec<_> = std::fs::read_dir(tmp.path()).unwrap().collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_snapshot_removed_on_panic() {
        let tmp = TempDir::new().unwrap();
        let original = tmp.path().join("places.sqlite");
        std::fs::write(&original, b"data").unwrap();

        let dir = tmp.path().to_path_buf();
        let result = std::panic::catch_unwind(move || {
            let _snapshot = Snapshot::take(&original).unwrap();
            panic!("query blew up");
        });
        assert!(result.is_err());

        let names: Vec<String> = std::fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["places.sqlite".to_string()]);
    }
}
