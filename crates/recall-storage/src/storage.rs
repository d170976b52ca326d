use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use recall_core::{ConversationTurn, MemoryStorage, RecallError, RecordKind, Result, Summary};

pub const RECORD_VERSION: u32 = 1;

/// On-disk envelope of a persisted record.
#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord<T> {
    kind: RecordKind,
    version: u32,
    saved_at: DateTime<Utc>,
    records: Vec<T>,
}

// Bare arrays are accepted so files written before the envelope existed still load.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecordFile<T> {
    Envelope(StoredRecord<T>),
    Bare(Vec<T>),
}

/// Stores history and summaries as two JSON files in one directory.
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn record_path(&self, kind: RecordKind) -> PathBuf {
        self.base_path.join(format!("{}.json", kind))
    }

    fn temp_path(&self, kind: RecordKind) -> PathBuf {
        self.base_path.join(format!(".{}.json.tmp", kind))
    }

    async fn write_record<T: Serialize + Sync>(&self, kind: RecordKind, records: &[T]) -> Result<()> {
        tokio::fs::create_dir_all(&self.base_path).await?;

        let json = {
            let envelope = StoredRecord {
                kind,
                version: RECORD_VERSION,
                saved_at: Utc::now(),
                records: records.iter().collect::<Vec<_>>(),
            };
            serde_json::to_string_pretty(&envelope)?
        };

        let temp = self.temp_path(kind);
        let target = self.record_path(kind);
        if let Err(e) = write_synced(&temp, json.as_bytes()).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&temp, &target).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e.into());
        }

        debug!(kind = %kind, records = records.len(), path = %target.display(), "Record saved");
        Ok(())
    }

    async fn read_record<T: DeserializeOwned>(&self, kind: RecordKind) -> Result<Option<Vec<T>>> {
        let path = self.record_path(kind);
        if !path.exists() {
            return Ok(None);
        }

        let json = tokio::fs::read_to_string(&path).await?;
        let records = match serde_json::from_str::<RecordFile<T>>(&json) {
            Ok(RecordFile::Envelope(stored)) => {
                if stored.kind != kind {
                    return Err(RecallError::storage(format!(
                        "{} holds a {} record",
                        path.display(),
                        stored.kind
                    )));
                }
                if stored.version > RECORD_VERSION {
                    return Err(RecallError::storage(format!(
                        "{} has unsupported version {}",
                        path.display(),
                        stored.version
                    )));
                }
                stored.records
            }
            Ok(RecordFile::Bare(records)) => records,
            Err(_) => {
                // Re-parse as the envelope to surface a precise error location.
                let err = serde_json::from_str::<StoredRecord<T>>(&json)
                    .err()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unrecognized record layout".to_string());
                return Err(RecallError::storage(format!(
                    "{} is corrupt: {}",
                    path.display(),
                    err
                )));
            }
        };

        debug!(kind = %kind, records = records.len(), "Record loaded");
        Ok(Some(records))
    }
}

async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await?;
    Ok(())
}

#[async_trait]
impl MemoryStorage for FileStorage {
    async fn save_turns(&self, turns: &[ConversationTurn]) -> Result<()> {
        self.write_record(RecordKind::ConversationHistory, turns).await
    }

    async fn save_summaries(&self, summaries: &[Summary]) -> Result<()> {
        self.write_record(RecordKind::ConversationSummaries, summaries)
            .await
    }

    async fn load_turns(&self) -> Result<Option<Vec<ConversationTurn>>> {
        self.read_record(RecordKind::ConversationHistory).await
    }

    async fn load_summaries(&self) -> Result<Option<Vec<Summary>>> {
        self.read_record(RecordKind::ConversationSummaries).await
    }

    fn location(&self) -> String {
        self.base_path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_summary() -> Summary {
        let now = Utc::now();
        Summary {
            period_start: now,
            period_end: now,
            period_label: "session".into(),
            topics: vec!["pizza".into()],
            digest_text: "session: 2 turns about pizza.".into(),
            source_turn_count: 2,
            total_tokens: 10,
        }
    }

    #[tokio::test]
    async fn test_save_and_load_turns() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());

        let turns = vec![
            ConversationTurn::user("I like pizza"),
            ConversationTurn::assistant("So do I"),
        ];
        storage.save_turns(&turns).await.unwrap();

        let loaded = storage.load_turns().await.unwrap().unwrap();
        assert_eq!(loaded, turns);
        assert!(
            storage
                .record_path(RecordKind::ConversationHistory)
                .ends_with("conversation_history.json")
        );
    }

    #[tokio::test]
    async fn test_save_and_load_summaries() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());

        let summaries = vec![make_summary()];
        storage.save_summaries(&summaries).await.unwrap();
        let loaded = storage.load_summaries().await.unwrap().unwrap();
        assert_eq!(loaded, summaries);
    }

    #[tokio::test]
    async fn test_load_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path().join("missing"));

        assert!(storage.load_turns().await.unwrap().is_none());
        assert!(storage.load_summaries().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_envelope_layout() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());
        storage
            .save_turns(&[ConversationTurn::user("hello")])
            .await
            .unwrap();

        let raw = std::fs::read_to_string(storage.record_path(RecordKind::ConversationHistory))
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["kind"], "conversation_history");
        assert_eq!(value["version"], RECORD_VERSION);
        assert!(value["saved_at"].is_string());
        assert_eq!(value["records"][0]["text"], "hello");
        assert_eq!(value["records"][0]["role"], "user");
    }

    #[tokio::test]
    async fn test_no_temp_file_left_behind() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());
        storage.save_summaries(&[make_summary()]).await.unwrap();

        let names: Vec<String> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["conversation_summaries.json".to_string()]);
    }

    #[tokio::test]
    async fn test_bare_array_accepted() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());
        let turns = vec![ConversationTurn::user("legacy")];
        std::fs::write(
            storage.record_path(RecordKind::ConversationHistory),
            serde_json::to_string(&turns).unwrap(),
        )
        .unwrap();

        let loaded = storage.load_turns().await.unwrap().unwrap();
        assert_eq!(loaded[0].text, "legacy");
    }

    #[tokio::test]
    async fn test_corrupt_record_is_storage_error() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());
        std::fs::write(
            storage.record_path(RecordKind::ConversationSummaries),
            "{ not json",
        )
        .unwrap();

        let err = storage.load_summaries().await.unwrap_err();
        assert!(matches!(err, RecallError::StorageUnavailable(_)));
    }

    #[tokio::test]
    async fn test_wrong_kind_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());
        storage
            .save_turns(&[ConversationTurn::user("hello")])
            .await
            .unwrap();
        std::fs::copy(
            storage.record_path(RecordKind::ConversationHistory),
            storage.record_path(RecordKind::ConversationSummaries),
        )
        .unwrap();

        assert!(storage.load_summaries().await.is_err());
    }
}
