//! Loading seed records from disk.

use std::path::Path;

use anyhow::Context;
use fieldgate::types::Record;
use serde_json::Value;

/// Reads a JSON array of records in the stored layout.
pub fn load_records(path: &Path) -> anyhow::Result<Vec<Record>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read seed file {}", path.display()))?;
    let documents: Vec<Value> = serde_json::from_str(&text)
        .with_context(|| format!("seed file {} is not a JSON array", path.display()))?;

    documents
        .into_iter()
        .enumerate()
        .map(|(index, document)| {
            Record::from_document(document)
                .with_context(|| format!("invalid record at index {} in {}", index, path.display()))
        })
        .collect()
}
