use std::{
    collections::HashMap,
    sync::{Arc, Mutex as StdMutex, PoisonError},
};

use chrono::Utc;
use db::models::{document::Document, resource::ResourceKind};
use serde_json::{Map, Value};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};
use utils::response::{Ack, ApiResponse};
use uuid::Uuid;

use crate::{
    api::{ClientError, ItemResponse, ResourceApi},
    state::{Action, ListKey, SliceState, reduce},
};

/// Client cache for one resource kind, backed by a [`ResourceApi`].
///
/// Cloning is cheap and clones share state. Fetches for the same key are
/// serialized: a caller that arrives while a fetch is in flight waits for it
/// and then reads the cache instead of issuing a second request.
#[derive(Clone)]
pub struct ResourceSlice {
    inner: Arc<Inner>,
}

struct Inner {
    kind: ResourceKind,
    api: Arc<dyn ResourceApi>,
    state: StdMutex<SliceState>,
    inflight: Mutex<HashMap<FetchKey, Arc<Mutex<()>>>>,
}

/// What a fetch populates; fetches with equal keys never overlap.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum FetchKey {
    Single(Uuid),
    List(ListKey),
    Default,
}

impl ResourceSlice {
    pub fn new(kind: ResourceKind, api: Arc<dyn ResourceApi>) -> Self {
        Self {
            inner: Arc::new(Inner {
                kind,
                api,
                state: StdMutex::new(SliceState::default()),
                inflight: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.inner.kind
    }

    pub fn snapshot(&self) -> SliceState {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn dispatch(&self, action: Action) {
        let mut state = self
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *state = reduce(&state, &action);
    }

    async fn acquire(&self, key: &FetchKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut inflight = self.inner.inflight.lock().await;
            Arc::clone(
                inflight
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }

    /// Unlocks `key` and forgets its lock once nobody else holds or awaits it.
    async fn release(&self, key: &FetchKey, guard: OwnedMutexGuard<()>) {
        let mut inflight = self.inner.inflight.lock().await;
        drop(guard);
        if inflight
            .get(key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            inflight.remove(key);
        }
    }

    /// Runs `fetch` while holding the lock for `key`.
    async fn single_flight<T, F, Fut>(&self, key: FetchKey, fetch: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let guard = self.acquire(&key).await;
        let result = fetch().await;
        self.release(&key, guard).await;
        result
    }

    fn rejected(&self, message: Option<&str>) -> ClientError {
        let message = message.unwrap_or("request was not successful").to_string();
        warn!(resource = %self.inner.kind, %message, "server rejected request");
        ClientError::Rejected(message)
    }

    /// Fetches `id` unless it is cached and valid, then selects it.
    pub async fn fetch_single_if_needed(&self, id: Uuid) -> Result<(), ClientError> {
        self.single_flight(FetchKey::Single(id), || self.load_single(id))
            .await
    }

    async fn load_single(&self, id: Uuid) -> Result<(), ClientError> {
        if !self.snapshot().should_fetch_single(id) {
            self.dispatch(Action::SetSelected { id });
            return Ok(());
        }

        debug!(resource = %self.inner.kind, %id, "fetching single");
        self.dispatch(Action::RequestSingle { id });
        let response = self.inner.api.fetch_single(self.inner.kind, id).await;
        match response {
            Ok(ApiResponse {
                success: true,
                data: Some(item),
                ..
            }) => {
                self.dispatch(Action::ReceiveSingle {
                    document: item.item,
                    received_at: Utc::now(),
                });
                Ok(())
            }
            Ok(response) => {
                let error = self.rejected(response.message());
                self.dispatch(Action::SingleFailed {
                    id,
                    error: error.to_string(),
                });
                Err(error)
            }
            Err(error) => {
                self.dispatch(Action::SingleFailed {
                    id,
                    error: error.to_string(),
                });
                Err(error)
            }
        }
    }

    /// Fetches the list keyed by `(ref_key, ref_id)` unless it is cached and
    /// valid. The [`ListKey::all`] key fetches the whole collection.
    pub async fn fetch_list_if_needed(&self, ref_key: &str, ref_id: &str) -> Result<(), ClientError> {
        let key = ListKey::new(ref_key, ref_id);
        self.single_flight(FetchKey::List(key.clone()), || self.load_list(key))
            .await
    }

    async fn load_list(&self, key: ListKey) -> Result<(), ClientError> {
        if !self.snapshot().should_fetch_list(&key) {
            return Ok(());
        }

        debug!(resource = %self.inner.kind, ref_key = %key.ref_key, ref_id = %key.ref_id, "fetching list");
        self.dispatch(Action::RequestList { key: key.clone() });
        let response = if key == ListKey::all() {
            self.inner.api.fetch_all(self.inner.kind).await
        } else {
            self.inner
                .api
                .fetch_list(self.inner.kind, &key.ref_key, &key.ref_id)
                .await
        };
        match response {
            Ok(ApiResponse {
                success: true,
                data: Some(items),
                ..
            }) => {
                self.dispatch(Action::ReceiveList {
                    key,
                    documents: items.items,
                    received_at: Utc::now(),
                });
                Ok(())
            }
            Ok(response) => {
                let error = self.rejected(response.message());
                self.dispatch(Action::ListFailed {
                    key,
                    error: error.to_string(),
                });
                Err(error)
            }
            Err(error) => {
                self.dispatch(Action::ListFailed {
                    key,
                    error: error.to_string(),
                });
                Err(error)
            }
        }
    }

    pub async fn fetch_all_if_needed(&self) -> Result<(), ClientError> {
        let key = ListKey::all();
        self.fetch_list_if_needed(&key.ref_key, &key.ref_id).await
    }

    /// Always asks the server for a fresh default object.
    pub async fn fetch_default(&self) -> Result<Map<String, Value>, ClientError> {
        self.single_flight(FetchKey::Default, || self.load_default())
            .await
    }

    async fn load_default(&self) -> Result<Map<String, Value>, ClientError> {
        self.dispatch(Action::RequestDefault);
        match self.inner.api.fetch_default(self.inner.kind).await {
            Ok(ApiResponse {
                success: true,
                data: Some(default),
                ..
            }) => {
                self.dispatch(Action::ReceiveDefault {
                    obj: default.default_obj.clone(),
                });
                Ok(default.default_obj)
            }
            Ok(response) => {
                let error = self.rejected(response.message());
                self.dispatch(Action::DefaultFailed {
                    error: error.to_string(),
                });
                Err(error)
            }
            Err(error) => {
                self.dispatch(Action::DefaultFailed {
                    error: error.to_string(),
                });
                Err(error)
            }
        }
    }

    pub fn invalidate_list(&self, ref_key: &str, ref_id: &str) {
        self.dispatch(Action::InvalidateList {
            key: ListKey::new(ref_key, ref_id),
        });
    }

    pub fn invalidate_selected(&self) {
        self.dispatch(Action::InvalidateSelected);
    }

    fn received(response: &ItemResponse) -> Option<Document> {
        match response {
            ApiResponse {
                success: true,
                data: Some(item),
                ..
            } => Some(item.item.clone()),
            _ => None,
        }
    }

    /// Creates a record and caches it as the selection. Lists are left for
    /// the caller to invalidate.
    pub async fn send_create(&self, body: Value) -> Result<ItemResponse, ClientError> {
        let response = self.inner.api.create(self.inner.kind, body).await?;
        if let Some(document) = Self::received(&response) {
            self.dispatch(Action::ReceiveCreated {
                document,
                received_at: Utc::now(),
            });
        }
        Ok(response)
    }

    pub async fn send_update(&self, id: Uuid, body: Value) -> Result<ItemResponse, ClientError> {
        let response = self.inner.api.update(self.inner.kind, id, body).await?;
        if let Some(document) = Self::received(&response) {
            self.dispatch(Action::ReceiveUpdated {
                document,
                received_at: Utc::now(),
            });
        }
        Ok(response)
    }

    pub async fn send_delete(&self, id: Uuid) -> Result<ApiResponse<Ack>, ClientError> {
        let response = self.inner.api.delete(self.inner.kind, id).await?;
        if response.is_success() {
            self.dispatch(Action::ReceiveDeleted { id });
        }
        Ok(response)
    }
}
