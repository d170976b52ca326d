//! Snapshot-level load and save with per-record recovery

use tracing::{debug, info, warn};

use recall_core::{MemorySnapshot, MemoryStorage, RecallError, RecordKind, Result};

/// Outcome of loading persisted memory. Failures of individual records are
/// reported as warnings and the affected part of the snapshot is left empty.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub snapshot: MemorySnapshot,
    pub warnings: Vec<RecallError>,
    pub history_found: bool,
    pub summaries_found: bool,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn found_anything(&self) -> bool {
        self.history_found || self.summaries_found
    }
}

pub async fn load_snapshot(storage: &dyn MemoryStorage) -> LoadReport {
    let mut report = LoadReport::default();
    let location = storage.location();

    match storage.load_turns().await {
        Ok(Some(turns)) => {
            report.history_found = true;
            report.snapshot.turns = turns;
        }
        Ok(None) => debug!(location = %location, "No saved conversation history"),
        Err(e) => {
            warn!(location = %location, error = %e, "Failed to load conversation history, starting empty");
            report.warnings.push(record_warning(RecordKind::ConversationHistory, e));
        }
    }

    match storage.load_summaries().await {
        Ok(Some(summaries)) => {
            report.summaries_found = true;
            report.snapshot.summaries = summaries;
        }
        Ok(None) => debug!(location = %location, "No saved conversation summaries"),
        Err(e) => {
            warn!(location = %location, error = %e, "Failed to load conversation summaries, starting empty");
            report
                .warnings
                .push(record_warning(RecordKind::ConversationSummaries, e));
        }
    }

    info!(
        location = %location,
        turns = report.snapshot.turns.len(),
        summaries = report.snapshot.summaries.len(),
        warnings = report.warnings.len(),
        "Memory loaded"
    );
    report
}

/// Persists both records. The history is written first; a failure on either
/// record is returned as `StorageUnavailable`.
pub async fn save_snapshot(storage: &dyn MemoryStorage, snapshot: &MemorySnapshot) -> Result<()> {
    let location = storage.location();

    storage
        .save_turns(&snapshot.turns)
        .await
        .map_err(|e| record_warning(RecordKind::ConversationHistory, e))?;
    storage
        .save_summaries(&snapshot.summaries)
        .await
        .map_err(|e| record_warning(RecordKind::ConversationSummaries, e))?;

    info!(
        location = %location,
        turns = snapshot.turns.len(),
        summaries = snapshot.summaries.len(),
        "Memory saved"
    );
    Ok(())
}

fn record_warning(kind: RecordKind, error: RecallError) -> RecallError {
    match error {
        RecallError::StorageUnavailable(message) => {
            RecallError::storage(format!("{}: {}", kind, message))
        }
        other => RecallError::storage(format!("{}: {}", kind, other)),
    }
}
