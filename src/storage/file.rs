use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::{Backend, Collection};

/// One JSON file per collection under `data_dir`
#[derive(Debug, Clone)]
pub struct FileBackend {
    data_dir: PathBuf,
}

impl FileBackend {
    /// Create the backend, creating the data directory if needed
    pub fn new(data_dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(data_dir)?;
        Ok(Self {
            data_dir: data_dir.to_path_buf(),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn path_for(&self, collection: Collection) -> PathBuf {
        self.data_dir.join(collection.file_name())
    }
}

impl Backend for FileBackend {
    fn read(&self, collection: Collection) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.path_for(collection)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, collection: Collection, bytes: &[u8]) -> io::Result<()> {
        let path = self.path_for(collection);
        let temp_path = self.data_dir.join(format!("{}.tmp", collection.file_name()));

        let mut file = File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;

        // Atomic rename
        fs::rename(&temp_path, &path)?;

        tracing::trace!(path = %path.display(), "Collection file replaced");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_backend_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileBackend::new(temp_dir.path()).unwrap();

        assert_eq!(backend.read(Collection::Users).unwrap(), None);

        backend.write(Collection::Users, b"[1]").unwrap();
        backend.write(Collection::Users, b"[1,2]").unwrap();

        assert_eq!(backend.read(Collection::Users).unwrap(), Some(b"[1,2]".to_vec()));
        assert!(temp_dir.path().join("users.json").exists());
        assert!(!temp_dir.path().join("users.json.tmp").exists());
    }

    #[test]
    fn test_file_backend_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("region").join("data");

        let backend = FileBackend::new(&nested).unwrap();
        backend.write(Collection::Likes, b"{}").unwrap();

        assert!(nested.join("likes.json").exists());
    }
}
