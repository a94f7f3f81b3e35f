//! In-process document collection.
//!
//! Stores documents in the same layout a document store would (`_id` plus
//! data fields plus `accessPolicy`) and evaluates [`NativeFilter`]s against
//! them. Used for tests, demos and the default CLI backend.

use parking_lot::RwLock;
use serde_json::Value;

use super::filter::NativeFilter;
use crate::types::{DOCUMENT_ID_ATTRIBUTE, ID_ATTRIBUTE, Record};

/// A thread-safe in-memory collection of documents.
#[derive(Debug, Default)]
pub struct MemoryCollection {
    documents: RwLock<Vec<Value>>,
}

impl MemoryCollection {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a record, keyed by its identifier.
    pub fn upsert(&self, record: &Record) {
        let document = to_stored_layout(record);
        let id = record.id().to_value();

        let mut documents = self.documents.write();
        match documents
            .iter_mut()
            .find(|doc| doc.get(DOCUMENT_ID_ATTRIBUTE) == Some(&id))
        {
            Some(existing) => *existing = document,
            None => documents.push(document),
        }
    }

    /// Returns projected copies of every matching document, in insertion
    /// order.
    pub fn find(&self, filter: &NativeFilter) -> Vec<Value> {
        self.documents
            .read()
            .iter()
            .filter(|doc| filter.matches(doc))
            .map(|doc| filter.project(doc))
            .collect()
    }

    /// Returns the number of stored documents.
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    /// Returns true if the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    /// Removes every document.
    pub fn clear(&self) {
        self.documents.write().clear();
    }
}

/// Converts a record to the document-store layout, `id` becoming `_id`.
pub(crate) fn to_stored_layout(record: &Record) -> Value {
    let mut document = record.to_document();
    if let Value::Object(map) = &mut document
        && let Some(id) = map.remove(ID_ATTRIBUTE)
    {
        map.insert(DOCUMENT_ID_ATTRIBUTE.to_string(), id);
    }
    document
}
