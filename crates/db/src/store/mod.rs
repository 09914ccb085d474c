//! Document-store driver interface.
//!
//! Collections are addressed by name (a resource's plural). Drivers only
//! persist and match documents; they know nothing about schemas.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{document::Document, query::StoreQuery};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("corrupt document {id}: {reason}")]
    Corrupt { id: Uuid, reason: String },
    #[error("document store unavailable: {0}")]
    Unavailable(String),
    #[error("document {0} no longer exists")]
    Missing(Uuid),
    #[error("invalid query field `{0}`")]
    InvalidField(String),
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Documents matching `query`, in stored order.
    async fn find(&self, collection: &str, query: &StoreQuery)
    -> Result<Vec<Document>, StoreError>;

    async fn find_by_id(&self, collection: &str, id: Uuid)
    -> Result<Option<Document>, StoreError>;

    /// Inserts a new document. The store assigns `_id`, `created` and
    /// `updated`; reserved keys in `fields` are ignored.
    async fn create(
        &self,
        collection: &str,
        fields: Map<String, Value>,
    ) -> Result<Document, StoreError>;

    /// Persists the whole document. Fails with [`StoreError::Missing`] when it
    /// was removed in the meantime.
    async fn save(&self, collection: &str, document: &Document) -> Result<Document, StoreError>;

    /// Number of documents removed; removing an absent id is not an error.
    async fn remove(&self, collection: &str, id: Uuid) -> Result<u64, StoreError>;
}
