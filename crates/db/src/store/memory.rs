use std::{
    collections::HashMap,
    sync::{
        RwLock,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{DocumentStore, StoreError};
use crate::models::{document::Document, query::StoreQuery};

/// In-process store with the same matching rules as the SQLite driver.
///
/// Can be switched offline to exercise store-error paths, and counts every
/// driver call so callers can assert that no query was issued.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
    unavailable: AtomicBool,
    calls: AtomicU64,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Driver calls issued so far, including failed ones.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    fn begin(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }
        Ok(())
    }

    fn poisoned() -> StoreError {
        StoreError::Unavailable("memory store lock poisoned".to_string())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn find(
        &self,
        collection: &str,
        query: &StoreQuery,
    ) -> Result<Vec<Document>, StoreError> {
        self.begin()?;
        if let Some(field) = query.invalid_field() {
            return Err(StoreError::InvalidField(field.to_string()));
        }
        let collections = self.collections.read().map_err(|_| Self::poisoned())?;
        let skip = query.skip.unwrap_or(0) as usize;
        let limit = query.limit.map_or(usize::MAX, |limit| limit as usize);
        Ok(collections
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|document| query.matches(document))
                    .skip(skip)
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_by_id(
        &self,
        collection: &str,
        id: Uuid,
    ) -> Result<Option<Document>, StoreError> {
        self.begin()?;
        let collections = self.collections.read().map_err(|_| Self::poisoned())?;
        Ok(collections
            .get(collection)
            .and_then(|documents| documents.iter().find(|document| document.id == id))
            .cloned())
    }

    async fn create(
        &self,
        collection: &str,
        fields: Map<String, Value>,
    ) -> Result<Document, StoreError> {
        self.begin()?;
        let document = Document::new(Uuid::new_v4(), fields, Utc::now());
        let mut collections = self.collections.write().map_err(|_| Self::poisoned())?;
        collections
            .entry(collection.to_string())
            .or_default()
            .push(document.clone());
        Ok(document)
    }

    async fn save(&self, collection: &str, document: &Document) -> Result<Document, StoreError> {
        self.begin()?;
        let mut collections = self.collections.write().map_err(|_| Self::poisoned())?;
        let stored = collections
            .get_mut(collection)
            .and_then(|documents| documents.iter_mut().find(|stored| stored.id == document.id))
            .ok_or(StoreError::Missing(document.id))?;
        *stored = document.clone();
        Ok(document.clone())
    }

    async fn remove(&self, collection: &str, id: Uuid) -> Result<u64, StoreError> {
        self.begin()?;
        let mut collections = self.collections.write().map_err(|_| Self::poisoned())?;
        let Some(documents) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = documents.len();
        documents.retain(|document| document.id != id);
        Ok((before - documents.len()) as u64)
    }
}
