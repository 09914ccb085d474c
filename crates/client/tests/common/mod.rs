#![allow(dead_code)]

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use client::api::{ClientError, DefaultResponse, ItemResponse, ItemsResponse, ResourceApi};
use db::{
    MemoryDocumentStore,
    models::{document::Document, resource::ResourceKind},
};
use serde_json::Value;
use services::services::resource::{ResourceError, ResourceService};
use tokio::sync::Semaphore;
use utils::response::{Ack, ApiResponse, DefaultObj, Item, Items};
use uuid::Uuid;

/// `ResourceApi` answering from the real controller over an in-memory
/// store. Counts fetches and can hold them at a gate.
pub struct FakeApi {
    store: Arc<MemoryDocumentStore>,
    fetches: AtomicUsize,
    writes: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
    reject_writes: AtomicBool,
    fail_fetches: AtomicBool,
}

fn envelope<T>(result: Result<T, ResourceError>) -> ApiResponse<T> {
    match result {
        Ok(data) => ApiResponse::success(data),
        Err(error) => ApiResponse::error(error.to_string()),
    }
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryDocumentStore::new()),
            fetches: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            gate: None,
            reject_writes: AtomicBool::new(false),
            fail_fetches: AtomicBool::new(false),
        }
    }

    /// Fetches block until the returned semaphore is given a permit.
    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let api = Self {
            gate: Some(gate.clone()),
            ..Self::new()
        };
        (api, gate)
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    /// Fetches fail at the transport level, as if the server were offline.
    pub fn fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    /// Reads a record straight from the backing store.
    pub async fn stored(&self, kind: ResourceKind, id: Uuid) -> Option<Document> {
        self.service(kind).get_by_id(&id.to_string()).await.ok()
    }

    fn service(&self, kind: ResourceKind) -> ResourceService {
        ResourceService::new(self.store.clone(), kind)
    }

    /// Inserts a record directly, bypassing the counters.
    pub async fn seed(&self, kind: ResourceKind, body: Value) -> Document {
        self.service(kind).create(body).await.unwrap()
    }

    async fn begin_fetch(&self) -> Result<(), ClientError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.unwrap();
        }
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(ClientError::Transport("connection refused".to_string()));
        }
        Ok(())
    }

    /// Counts the write and returns the failure envelope if writes are rejected.
    fn begin_write<T>(&self) -> Option<ApiResponse<T>> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.reject_writes
            .load(Ordering::SeqCst)
            .then(|| ApiResponse::error("Error saving update"))
    }
}

#[async_trait]
impl ResourceApi for FakeApi {
    async fn fetch_single(&self, kind: ResourceKind, id: Uuid) -> Result<ItemResponse, ClientError> {
        self.begin_fetch().await?;
        let result = self.service(kind).get_by_id(&id.to_string()).await;
        Ok(envelope(result.map(|item| Item { item })))
    }

    async fn fetch_list(
        &self,
        kind: ResourceKind,
        ref_key: &str,
        ref_id: &str,
    ) -> Result<ItemsResponse, ClientError> {
        self.begin_fetch().await?;
        let result = self.service(kind).list_by_refs(ref_key, ref_id, None).await;
        Ok(envelope(result.map(|items| Items {
            items,
            pagination: None,
        })))
    }

    async fn fetch_all(&self, kind: ResourceKind) -> Result<ItemsResponse, ClientError> {
        self.begin_fetch().await?;
        let result = self.service(kind).list(None, None).await;
        Ok(envelope(result.map(Items::from)))
    }

    async fn fetch_default(&self, kind: ResourceKind) -> Result<DefaultResponse, ClientError> {
        Ok(ApiResponse::success(DefaultObj {
            default_obj: self.service(kind).get_default(),
        }))
    }

    async fn create(&self, kind: ResourceKind, body: Value) -> Result<ItemResponse, ClientError> {
        if let Some(rejected) = self.begin_write() {
            return Ok(rejected);
        }
        let result = self.service(kind).create(body).await;
        Ok(envelope(result.map(|item| Item { item })))
    }

    async fn update(
        &self,
        kind: ResourceKind,
        id: Uuid,
        body: Value,
    ) -> Result<ItemResponse, ClientError> {
        if let Some(rejected) = self.begin_write() {
            return Ok(rejected);
        }
        let result = self.service(kind).update(&id.to_string(), body).await;
        Ok(envelope(result.map(|item| Item { item })))
    }

    async fn delete(
        &self,
        kind: ResourceKind,
        id: Uuid,
    ) -> Result<ApiResponse<Ack>, ClientError> {
        if let Some(rejected) = self.begin_write() {
            return Ok(rejected);
        }
        let result = self.service(kind).delete(&id.to_string()).await;
        Ok(match result {
            Ok(()) => ApiResponse::acknowledged(format!("Deleted {}", kind.def().singular)),
            Err(error) => ApiResponse::error(error.to_string()),
        })
    }
}
