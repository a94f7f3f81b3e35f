//! MongoDB engine for the document adapter.

use std::time::Duration;

use futures::TryStreamExt;
use mongodb::bson::{self, Bson, Document, doc};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection};
use serde_json::Value;

use super::filter::NativeFilter;
use super::memory::to_stored_layout;
use crate::error::{BackendError, BackendResult};
use crate::types::{DOCUMENT_ID_ATTRIBUTE, Record};

const BACKEND_NAME: &str = "mongodb";

/// A MongoDB client bound to one collection.
///
/// The driver keeps its own connection pool, so a handle is cheap to clone.
#[derive(Debug, Clone)]
pub struct MongoEngine {
    client: Client,
    collection: Collection<Document>,
}

impl MongoEngine {
    /// Creates a client for `uri`. No network traffic happens until the
    /// first operation.
    pub async fn open(
        uri: &str,
        database: &str,
        collection: &str,
        connect_timeout: Duration,
    ) -> BackendResult<Self> {
        let mut options = ClientOptions::parse(uri).await.map_err(|e| {
            BackendError::Configuration {
                backend_name: BACKEND_NAME.to_string(),
                message: e.to_string(),
            }
        })?;
        options.connect_timeout = Some(connect_timeout);
        options.server_selection_timeout = Some(connect_timeout);

        let client = Client::with_options(options)?;
        let collection = client.database(database).collection::<Document>(collection);
        Ok(Self { client, collection })
    }

    /// Verifies the server is reachable.
    pub async fn ping(&self) -> BackendResult<()> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;
        Ok(())
    }

    /// Returns a handle to the collection.
    pub fn collection(&self) -> Collection<Document> {
        self.collection.clone()
    }

    /// Runs a filter and returns the projected documents as JSON.
    pub async fn find(
        collection: &Collection<Document>,
        filter: &NativeFilter,
        max_time: Duration,
    ) -> BackendResult<Vec<Value>> {
        let filter_doc = to_bson_document(&filter.filter_document())?;
        let projection = to_bson_document(&filter.projection_document())?;

        let cursor = collection
            .find(filter_doc)
            .projection(projection)
            .max_time(max_time)
            .await?;
        let documents: Vec<Document> = cursor.try_collect().await?;

        Ok(documents
            .into_iter()
            .map(|d| Bson::Document(d).into_relaxed_extjson())
            .collect())
    }

    /// Inserts or replaces a record by identifier.
    pub async fn upsert(&self, record: &Record) -> BackendResult<()> {
        let document = to_bson_document(&to_stored_layout(record))?;
        let id = bson::to_bson(&record.id().to_value()).map_err(|e| {
            BackendError::protocol(BACKEND_NAME, format!("invalid record id: {}", e))
        })?;

        self.collection
            .replace_one(doc! { DOCUMENT_ID_ATTRIBUTE: id }, document)
            .upsert(true)
            .await?;
        Ok(())
    }
}

fn to_bson_document(value: &Value) -> BackendResult<Document> {
    bson::to_document(value).map_err(|e| {
        BackendError::protocol(BACKEND_NAME, format!("failed to encode document: {}", e))
    })
}
