use std::collections::HashMap;
use std::sync::RwLock;

use crate::terrain::error::TerrainError;

use super::TerrainStorage;

/// Хранилище секций в памяти
#[derive(Default)]
pub struct MemoryStorage {
    sections: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<String>, data: Vec<u8>) {
        if let Ok(mut sections) = self.sections.write() {
            sections.insert(path.into(), data);
        }
    }

    pub fn remove(&self, path: &str) -> Option<Vec<u8>> {
        self.sections.write().ok()?.remove(path)
    }

    pub fn len(&self) -> usize {
        self.sections.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TerrainStorage for MemoryStorage {
    fn open_section(&self, path: &str) -> Option<Vec<u8>> {
        self.sections.read().ok()?.get(path).cloned()
    }

    fn save_section(&self, path: &str, data: &[u8]) -> Result<(), TerrainError> {
        let mut sections = self
            .sections
            .write()
            .map_err(|_| TerrainError::InvalidData("memory storage lock poisoned".into()))?;
        sections.insert(path.to_string(), data.to_vec());
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        let prefix = format!("{}/", path);
        self.sections
            .read()
            .map(|s| s.keys().any(|k| k == path || k.starts_with(&prefix)))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_exists_by_child_section() {
        let storage = MemoryStorage::new();
        storage.insert("blocks/0000.cdata/heights", vec![1, 2, 3]);
        assert!(storage.exists("blocks/0000.cdata"));
        assert!(!storage.exists("blocks/0000.cd"));
        assert_eq!(storage.open_section("blocks/0000.cdata/heights"), Some(vec![1, 2, 3]));
        assert_eq!(storage.open_section("blocks/0000.cdata/heights1"), None);
    }
}
