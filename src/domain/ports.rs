use crate::utils::error::Result;

/// Source of raw layer bytes. Analysis reads each layer at most once per call.
pub trait LayerStorage: Send + Sync {
    fn read_file(&self, path: &str) -> Result<Vec<u8>>;
    fn exists(&self, path: &str) -> bool;
}
