use crate::domain::ports::LayerStorage;
use crate::utils::error::Result;
use std::fs;
use std::path::Path;

/// Layer files on the local filesystem, relative paths resolved against `base_path`.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: String,
}

impl LocalStorage {
    pub fn new(base_path: String) -> Self {
        Self { base_path }
    }
}

impl LayerStorage for LocalStorage {
    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = Path::new(&self.base_path).join(path);
        tracing::debug!("Reading {}", full_path.display());
        let data = fs::read(full_path)?;
        Ok(data)
    }

    fn exists(&self, path: &str) -> bool {
        Path::new(&self.base_path).join(path).is_file()
    }
}
