//! File system storage implementation.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{HeraldError, Result};
use crate::storage::{Storage, check_name};

/// File system storage rooted at a single directory.
///
/// Blob names map directly to file names under the root. Atomic replace is
/// implemented as a write to a temporary sibling followed by a rename, so a
/// crash mid-write leaves the previous contents intact.
#[derive(Debug)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Create a file storage rooted at `root`, creating the directory if needed.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(FileStorage { root })
    }

    /// The root directory of this storage.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn temp_path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!(".{name}.tmp"))
    }
}

impl Storage for FileStorage {
    fn read(&self, name: &str) -> Result<Vec<u8>> {
        check_name(name)?;
        let path = self.path_for(name);
        if !path.is_file() {
            return Err(HeraldError::not_found(format!("blob {name}")));
        }
        Ok(fs::read(path)?)
    }

    fn write(&self, name: &str, data: &[u8]) -> Result<()> {
        check_name(name)?;
        fs::write(self.path_for(name), data)?;
        Ok(())
    }

    fn write_atomic(&self, name: &str, data: &[u8]) -> Result<()> {
        check_name(name)?;
        let temp = self.temp_path_for(name);
        fs::write(&temp, data)?;
        match fs::rename(&temp, self.path_for(name)) {
            Ok(()) => Ok(()),
            Err(e) => {
                let _ = fs::remove_file(&temp);
                Err(e.into())
            }
        }
    }

    fn exists(&self, name: &str) -> bool {
        check_name(name).is_ok() && self.path_for(name).is_file()
    }

    fn delete(&self, name: &str) -> Result<()> {
        check_name(name)?;
        let path = self.path_for(name);
        if !path.is_file() {
            return Err(HeraldError::not_found(format!("blob {name}")));
        }
        Ok(fs::remove_file(path)?)
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            // Skip in-flight temp files and anything else hidden.
            if name.starts_with('.') {
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_read_roundtrip() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();
        storage.write("a.json", b"hello").unwrap();
        assert_eq!(storage.read("a.json").unwrap(), b"hello");
    }

    #[test]
    fn test_atomic_replace_keeps_single_visible_blob() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();
        storage.write_atomic("a.json", b"v1").unwrap();
        storage.write_atomic("a.json", b"v2").unwrap();
        assert_eq!(storage.read("a.json").unwrap(), b"v2");
        // No leftover temp files visible.
        assert_eq!(storage.list().unwrap(), vec!["a.json"]);
    }

    #[test]
    fn test_delete_missing_blob() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();
        assert!(matches!(
            storage.delete("missing"),
            Err(HeraldError::NotFound(_))
        ));
    }
}
