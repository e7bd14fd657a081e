use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::terrain::error::TerrainError;

use super::TerrainStorage;

/// Хранилище секций на диске: каждая секция - отдельный файл
pub struct DirectoryStorage {
    root: PathBuf,
}

impl DirectoryStorage {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let mut full = self.root.clone();
        for part in path.split('/').filter(|p| !p.is_empty() && *p != "..") {
            full.push(part);
        }
        full
    }
}

impl TerrainStorage for DirectoryStorage {
    fn open_section(&self, path: &str) -> Option<Vec<u8>> {
        let full = self.resolve(path);
        if !full.is_file() {
            return None;
        }
        match fs::read(&full) {
            Ok(data) => Some(data),
            Err(e) => {
                log::warn!("can't read section {}: {}", full.display(), e);
                None
            }
        }
    }

    fn save_section(&self, path: &str, data: &[u8]) -> Result<(), TerrainError> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(&full)?;
        file.write_all(data)?;
        file.flush()?;
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_open_nested_section() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DirectoryStorage::new(dir.path());

        storage.save_section("space/0001.cdata/heights", &[7, 8, 9]).unwrap();

        assert!(storage.exists("space/0001.cdata"));
        assert_eq!(storage.open_section("space/0001.cdata/heights"), Some(vec![7, 8, 9]));
        assert_eq!(storage.open_section("space/0001.cdata"), None);
        assert_eq!(storage.open_section("space/0001.cdata/normals"), None);
    }
}
