//! Storage backends for the recall conversational memory

mod snapshot;
mod storage;

pub use recall_core::{MemorySnapshot, MemoryStorage, RecallError, RecordKind, Result};
pub use snapshot::{LoadReport, load_snapshot, save_snapshot};
pub use storage::{FileStorage, RECORD_VERSION};

use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StorageConfig {
    #[default]
    #[serde(rename = "none")]
    None,
    #[serde(rename = "file")]
    File { path: String },
}

impl StorageConfig {
    pub fn file(path: impl Into<String>) -> Self {
        StorageConfig::File { path: path.into() }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, StorageConfig::None)
    }
}

pub fn create_storage(config: &StorageConfig) -> Result<Option<Arc<dyn MemoryStorage>>> {
    match config {
        StorageConfig::None => Ok(None),
        StorageConfig::File { path } => {
            if path.trim().is_empty() {
                return Err(RecallError::Config(
                    "file storage requires a non-empty path".into(),
                ));
            }
            Ok(Some(Arc::new(FileStorage::new(path))))
        }
    }
}
