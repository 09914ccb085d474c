//! Schema-driven controller shared by every resource.
//!
//! Each operation is a thin translation from request parameters to one
//! document-store call. Field names are never hard-coded here: defaults,
//! query coercion and the update whitelist all come from the resource's
//! declared field set.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use db::{
    DocumentStore, StoreError,
    models::{
        document::Document,
        query::{StoreQuery, is_valid_field_name},
        resource::{ResourceDef, ResourceKind},
    },
};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use utils::response::{Items, Pagination};
use uuid::Uuid;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_PER: u64 = 20;

/// Failures surfaced to callers. All three collapse to the same flat
/// `{success: false, message}` envelope on the wire.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("{message}")]
    Store {
        message: String,
        #[source]
        source: StoreError,
    },
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
}

/// A page window resolved from raw `page`/`per` query values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub per: u64,
}

impl PageRequest {
    /// Missing, non-numeric or zero values fall back to the defaults.
    pub fn parse(page: Option<&str>, per: Option<&str>) -> Self {
        Self {
            page: parse_positive(page).unwrap_or(DEFAULT_PAGE),
            per: parse_positive(per).unwrap_or(DEFAULT_PER),
        }
    }

    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.per)
    }

    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            per: self.per,
        }
    }
}

fn parse_positive(raw: Option<&str>) -> Option<u64> {
    raw.and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value >= 1)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub items: Vec<Document>,
    pub pagination: Option<Pagination>,
}

impl From<Listing> for Items<Document> {
    fn from(listing: Listing) -> Self {
        Items {
            items: listing.items,
            pagination: listing.pagination,
        }
    }
}

#[derive(Clone)]
pub struct ResourceService {
    store: Arc<dyn DocumentStore>,
    def: &'static ResourceDef,
}

impl ResourceService {
    pub fn new(store: Arc<dyn DocumentStore>, kind: ResourceKind) -> Self {
        Self {
            store,
            def: kind.def(),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.def.kind
    }

    fn collection(&self) -> &'static str {
        self.def.plural
    }

    fn store_error(&self, message: impl Into<String>, source: StoreError) -> ResourceError {
        let message = message.into();
        error!(resource = %self.def.kind, error = %source, "{}", message);
        ResourceError::Store { message, source }
    }

    /// `"null"` in a reference position means the database null.
    fn ref_value(&self, field: &str, raw: &str) -> Value {
        if raw == "null" {
            Value::Null
        } else {
            self.def.fields.coerce(field, raw)
        }
    }

    async fn find_window(
        &self,
        query: StoreQuery,
        window: Option<PageRequest>,
    ) -> Result<Listing, ResourceError> {
        let query = match window {
            Some(window) => query.paginate(window.skip(), window.per),
            None => query,
        };
        let items = self
            .store
            .find(self.collection(), &query)
            .await
            .map_err(|e| self.store_error(e.to_string(), e))?;
        Ok(Listing {
            items,
            pagination: window.map(|window| window.pagination()),
        })
    }

    /// Every record, paginated only when `page` is supplied.
    pub async fn list(
        &self,
        page: Option<&str>,
        per: Option<&str>,
    ) -> Result<Listing, ResourceError> {
        match page.filter(|page| !page.is_empty()) {
            Some(page) => {
                debug!(resource = %self.def.kind, "listing with pagination");
                self.find_window(StoreQuery::new(), Some(PageRequest::parse(Some(page), per)))
                    .await
            }
            None => {
                debug!(resource = %self.def.kind, "listing");
                self.find_window(StoreQuery::new(), None).await
            }
        }
    }

    /// Records whose `ref_key` is one of the values passed as repeated
    /// `ref_key` query parameters.
    pub async fn list_by_values(
        &self,
        ref_key: &str,
        params: &[(String, String)],
    ) -> Result<Vec<Document>, ResourceError> {
        let values: Vec<Value> = params
            .iter()
            .filter(|(key, value)| key == ref_key && !value.is_empty())
            .map(|(_, value)| self.def.fields.coerce(ref_key, value))
            .collect();
        if values.is_empty() {
            return Err(ResourceError::Validation(format!(
                "Missing query param(s) specified by the ref: {ref_key}"
            )));
        }
        if !is_valid_field_name(ref_key) {
            return Err(ResourceError::Validation(format!("Invalid ref key: {ref_key}")));
        }

        let query = StoreQuery::new().any_of(ref_key, values);
        self.store
            .find(self.collection(), &query)
            .await
            .map_err(|e| {
                self.store_error(
                    format!("Error querying for {} by {} list", self.def.plural, ref_key),
                    e,
                )
            })
    }

    /// Conjunctive equality query from a primary ref pair plus alternating
    /// `key/value` segments in `rest`.
    pub async fn list_by_refs(
        &self,
        ref_key: &str,
        ref_id: &str,
        rest: Option<&str>,
    ) -> Result<Vec<Document>, ResourceError> {
        let extras: Vec<&str> = rest
            .filter(|rest| !rest.is_empty())
            .map(|rest| rest.split('/').collect())
            .unwrap_or_default();
        if extras.len() % 2 != 0 {
            return Err(ResourceError::Validation("Invalid parameter length".to_string()));
        }

        let mut query = StoreQuery::new().eq(ref_key, self.ref_value(ref_key, ref_id));
        for pair in extras.chunks_exact(2) {
            query = query.eq(pair[0], self.ref_value(pair[0], pair[1]));
        }
        if let Some(field) = query.invalid_field() {
            return Err(ResourceError::Validation(format!("Invalid ref key: {field}")));
        }

        self.store
            .find(self.collection(), &query)
            .await
            .map_err(|e| {
                self.store_error(
                    format!(
                        "Error retrieving {} by {}: {}",
                        self.def.plural, ref_key, ref_id
                    ),
                    e,
                )
            })
    }

    /// Every parameter except `page`/`per` is an equality filter; a repeated
    /// parameter matches any of its values.
    pub async fn search(&self, params: &[(String, String)]) -> Result<Listing, ResourceError> {
        let mut page = None;
        let mut per = None;
        let mut grouped: Vec<(&str, Vec<Value>)> = Vec::new();
        for (key, raw) in params {
            match key.as_str() {
                "page" => page = Some(raw.as_str()),
                "per" => per = Some(raw.as_str()),
                field => {
                    if !is_valid_field_name(field) {
                        return Err(ResourceError::Validation(format!(
                            "Invalid search field: {field}"
                        )));
                    }
                    debug!(resource = %self.def.kind, field, "found search query param");
                    let value = self.def.fields.coerce(field, raw);
                    match grouped.iter_mut().find(|(name, _)| *name == field) {
                        Some((_, values)) => values.push(value),
                        None => grouped.push((field, vec![value])),
                    }
                }
            }
        }

        let mut query = StoreQuery::new();
        for (field, mut values) in grouped {
            query = if values.len() == 1 {
                query.eq(field, values.remove(0))
            } else {
                query.any_of(field, values)
            };
        }
        info!(resource = %self.def.kind, filters = query.filters.len(), "search");

        let window = (page.is_some() || per.is_some()).then(|| PageRequest::parse(page, per));
        self.find_window(query, window).await
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Document, ResourceError> {
        let not_found = || {
            warn!(resource = %self.def.kind, id, "record not found");
            ResourceError::NotFound(format!("{} not found.", self.def.display))
        };
        let Ok(id) = Uuid::parse_str(id) else {
            return Err(not_found());
        };
        match self.store.find_by_id(self.collection(), id).await {
            Ok(Some(document)) => Ok(document),
            Ok(None) => Err(not_found()),
            Err(e) => Err(self.store_error(e.to_string(), e)),
        }
    }

    pub fn get_schema(&self) -> Value {
        info!(resource = %self.def.kind, "get full schema object");
        self.def.fields.describe()
    }

    pub fn get_default(&self) -> Map<String, Value> {
        debug!(resource = %self.def.kind, "get default object");
        self.def.fields.default_object()
    }

    /// Inserts the whole body; no field whitelist applies on create.
    pub async fn create(&self, body: Value) -> Result<Document, ResourceError> {
        let Value::Object(fields) = body else {
            return Err(ResourceError::Validation(format!(
                "Invalid {} payload",
                self.def.singular
            )));
        };
        let document = self
            .store
            .create(self.collection(), fields)
            .await
            .map_err(|e| self.store_error(e.to_string(), e))?;
        info!(resource = %self.def.kind, id = %document.id, "created");
        Ok(document)
    }

    /// Overwrites the whitelisted mutable fields wholesale: fields present in
    /// `body` are set, absent ones are cleared. Everything else is kept.
    pub async fn update(&self, id: &str, body: Value) -> Result<Document, ResourceError> {
        let missing = format!("Could not find {}.", self.def.singular);
        let Value::Object(mut changes) = body else {
            return Err(ResourceError::Validation(format!(
                "Invalid {} payload",
                self.def.singular
            )));
        };
        let Ok(id) = Uuid::parse_str(id) else {
            return Err(ResourceError::NotFound(missing));
        };
        let mut document = match self.store.find_by_id(self.collection(), id).await {
            Ok(Some(document)) => document,
            Ok(None) => return Err(ResourceError::NotFound(missing)),
            Err(e) => return Err(self.store_error(missing, e)),
        };

        for field in self.def.fields.mutable_fields() {
            match changes.remove(field) {
                Some(value) => document.set(field, value),
                None => {
                    document.remove(field);
                }
            }
        }
        document.updated = advance(document.updated);

        let saved = self
            .store
            .save(self.collection(), &document)
            .await
            .map_err(|e| {
                self.store_error(format!("Error saving {} update", self.def.singular), e)
            })?;
        info!(resource = %self.def.kind, id = %saved.id, "updated");
        Ok(saved)
    }

    /// Removes the record. Absent or malformed ids are not an error.
    pub async fn delete(&self, id: &str) -> Result<(), ResourceError> {
        warn!(resource = %self.def.kind, id, "deleting");
        let Ok(id) = Uuid::parse_str(id) else {
            return Ok(());
        };
        self.store
            .remove(self.collection(), id)
            .await
            .map_err(|e| self.store_error(e.to_string(), e))?;
        Ok(())
    }
}

/// `now`, or just past `previous` when the clock hasn't moved on.
fn advance(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + Duration::milliseconds(1)
    }
}

#[cfg(test)]
mod tests {
    use db::MemoryDocumentStore;
    use serde_json::json;

    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    fn service(kind: ResourceKind) -> (Arc<MemoryDocumentStore>, ResourceService) {
        let store = Arc::new(MemoryDocumentStore::new());
        let service = ResourceService::new(store.clone(), kind);
        (store, service)
    }

    async fn seed_tasks(service: &ResourceService, count: usize) -> Vec<Document> {
        let mut created = Vec::new();
        for index in 0..count {
            created.push(
                service
                    .create(json!({"name": format!("task-{index}"), "complete": index % 2 == 0}))
                    .await
                    .unwrap(),
            );
        }
        created
    }

    #[test]
    fn page_request_defaults_and_window() {
        assert_eq!(PageRequest::parse(None, None), PageRequest { page: 1, per: 20 });
        assert_eq!(
            PageRequest::parse(Some("0"), Some("abc")),
            PageRequest { page: 1, per: 20 }
        );
        let window = PageRequest::parse(Some("3"), Some("5"));
        assert_eq!(window.skip(), 10);
        assert_eq!(window.pagination(), Pagination { page: 3, per: 5 });
    }

    #[tokio::test]
    async fn list_without_page_returns_everything() {
        let (_, service) = service(ResourceKind::Task);
        seed_tasks(&service, 25).await;

        let listing = service.list(None, None).await.unwrap();
        assert_eq!(listing.items.len(), 25);
        assert!(listing.pagination.is_none());
    }

    #[tokio::test]
    async fn list_paginates_in_stored_order() {
        let (_, service) = service(ResourceKind::Task);
        let created = seed_tasks(&service, 12).await;

        let listing = service.list(Some("2"), Some("5")).await.unwrap();
        assert_eq!(listing.pagination, Some(Pagination { page: 2, per: 5 }));
        let ids: Vec<_> = listing.items.iter().map(|d| d.id).collect();
        let expected: Vec<_> = created[5..10].iter().map(|d| d.id).collect();
        assert_eq!(ids, expected);

        let default_per = service.list(Some("1"), None).await.unwrap();
        assert_eq!(default_per.items.len(), 12);
        assert_eq!(default_per.pagination, Some(Pagination { page: 1, per: 20 }));
    }

    #[tokio::test]
    async fn list_reports_store_errors() {
        let (store, service) = service(ResourceKind::Flow);
        store.set_unavailable(true);
        let err = service.list(None, None).await.unwrap_err();
        assert!(matches!(err, ResourceError::Store { .. }));
    }

    #[tokio::test]
    async fn list_by_values_uses_membership() {
        let (_, service) = service(ResourceKind::Task);
        let created = seed_tasks(&service, 4).await;

        let params = pairs(&[
            ("_id", &created[0].id.to_string()),
            ("_id", &created[3].id.to_string()),
            ("ignored", "x"),
        ]);
        let found = service.list_by_values("_id", &params).await.unwrap();
        let ids: Vec<_> = found.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![created[0].id, created[3].id]);
    }

    #[tokio::test]
    async fn list_by_values_without_param_never_queries() {
        let (store, service) = service(ResourceKind::Task);
        let err = service
            .list_by_values("_flow", &pairs(&[("other", "1")]))
            .await
            .unwrap_err();
        match err {
            ResourceError::Validation(message) => {
                assert_eq!(message, "Missing query param(s) specified by the ref: _flow")
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(store.call_count(), 0);
    }

    #[tokio::test]
    async fn list_by_refs_builds_conjunctive_query_with_null_literal() {
        let (_, service) = service(ResourceKind::Task);
        service
            .create(json!({"name": "a", "_flow": "f1", "_user": null}))
            .await
            .unwrap();
        service
            .create(json!({"name": "b", "_flow": "f1", "_user": "u1"}))
            .await
            .unwrap();
        service
            .create(json!({"name": "c", "_flow": "f2"}))
            .await
            .unwrap();

        let found = service
            .list_by_refs("_flow", "f1", Some("_user/null"))
            .await
            .unwrap();
        let names: Vec<_> = found.iter().filter_map(|d| d.get_str("name")).collect();
        assert_eq!(names, vec!["a"]);

        let all_f1 = service.list_by_refs("_flow", "f1", None).await.unwrap();
        assert_eq!(all_f1.len(), 2);

        let unassigned = service.list_by_refs("_user", "null", Some("")).await.unwrap();
        let names: Vec<_> = unassigned.iter().filter_map(|d| d.get_str("name")).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn list_by_refs_coerces_declared_types() {
        let (_, service) = service(ResourceKind::Task);
        seed_tasks(&service, 4).await;
        let done = service
            .list_by_refs("complete", "true", None)
            .await
            .unwrap();
        assert_eq!(done.len(), 2);
    }

    #[tokio::test]
    async fn list_by_refs_with_odd_segments_never_queries() {
        let (store, service) = service(ResourceKind::Note);
        for rest in ["_user", "a/b/c", "a/b/"] {
            let err = service
                .list_by_refs("_task", "t1", Some(rest))
                .await
                .unwrap_err();
            assert!(
                matches!(&err, ResourceError::Validation(m) if m == "Invalid parameter length"),
                "{rest}: {err:?}"
            );
        }
        assert_eq!(store.call_count(), 0);
    }

    #[tokio::test]
    async fn list_by_refs_store_error_names_the_ref() {
        let (store, service) = service(ResourceKind::Note);
        store.set_unavailable(true);
        let err = service.list_by_refs("_task", "t9", None).await.unwrap_err();
        assert_eq!(err.to_string(), "Error retrieving notes by _task: t9");
    }

    #[tokio::test]
    async fn search_filters_on_every_non_reserved_param() {
        let (_, service) = service(ResourceKind::Task);
        seed_tasks(&service, 6).await;

        let listing = service
            .search(&pairs(&[("complete", "true"), ("name", "task-2")]))
            .await
            .unwrap();
        assert_eq!(listing.items.len(), 1);
        assert!(listing.pagination.is_none());

        let repeated = service
            .search(&pairs(&[("name", "task-1"), ("name", "task-4")]))
            .await
            .unwrap();
        assert_eq!(repeated.items.len(), 2);
    }

    #[tokio::test]
    async fn search_paginates_when_per_or_page_present() {
        let (_, service) = service(ResourceKind::Task);
        seed_tasks(&service, 10).await;

        let listing = service
            .search(&pairs(&[("complete", "true"), ("per", "2")]))
            .await
            .unwrap();
        assert_eq!(listing.items.len(), 2);
        assert_eq!(listing.pagination, Some(Pagination { page: 1, per: 2 }));

        let second = service
            .search(&pairs(&[("complete", "true"), ("per", "2"), ("page", "3")]))
            .await
            .unwrap();
        assert_eq!(second.items.len(), 1);
        assert_eq!(second.items[0].get_str("name"), Some("task-8"));
    }

    #[tokio::test]
    async fn search_rejects_malformed_field_names() {
        let (store, service) = service(ResourceKind::Task);
        let err = service
            .search(&pairs(&[("name.first", "x")]))
            .await
            .unwrap_err();
        assert!(matches!(err, ResourceError::Validation(_)));
        assert_eq!(store.call_count(), 0);
    }

    #[tokio::test]
    async fn get_by_id_distinguishes_absence_from_store_errors() {
        let (store, service) = service(ResourceKind::Flow);
        let created = service.create(json!({"name": "Main"})).await.unwrap();

        let found = service.get_by_id(&created.id.to_string()).await.unwrap();
        assert_eq!(found, created);

        let absent = service
            .get_by_id(&Uuid::new_v4().to_string())
            .await
            .unwrap_err();
        assert!(matches!(&absent, ResourceError::NotFound(m) if m == "Flow not found."));

        let malformed = service.get_by_id("not-an-id").await.unwrap_err();
        assert!(matches!(malformed, ResourceError::NotFound(_)));

        store.set_unavailable(true);
        let offline = service.get_by_id(&created.id.to_string()).await.unwrap_err();
        assert!(matches!(offline, ResourceError::Store { .. }));
    }

    #[tokio::test]
    async fn create_round_trips_through_get_by_id() {
        let (_, service) = service(ResourceKind::Note);
        let body = json!({"name": "looks good", "_task": "t1", "extra": {"nested": [1, 2]}});
        let created = service.create(body.clone()).await.unwrap();

        let loaded = service.get_by_id(&created.id.to_string()).await.unwrap();
        assert_eq!(Value::Object(loaded.fields.clone()), body);
        assert_eq!(loaded.created, created.created);
    }

    #[tokio::test]
    async fn create_rejects_non_object_bodies() {
        let (_, service) = service(ResourceKind::Note);
        let err = service.create(json!(["not", "an", "object"])).await.unwrap_err();
        assert!(matches!(&err, ResourceError::Validation(m) if m == "Invalid note payload"));
    }

    #[tokio::test]
    async fn update_missing_record_does_not_create_one() {
        let (store, service) = service(ResourceKind::Flow);
        let err = service
            .update(&Uuid::new_v4().to_string(), json!({"name": "ghost"}))
            .await
            .unwrap_err();
        assert!(matches!(&err, ResourceError::NotFound(m) if m == "Could not find flow."));

        let listing = service.list(None, None).await.unwrap();
        assert!(listing.items.is_empty());
        assert!(store.call_count() >= 1);
    }

    #[tokio::test]
    async fn update_touches_only_whitelisted_fields() {
        let (_, service) = service(ResourceKind::Flow);
        let created = service
            .create(json!({"name": "old", "description": "keep?", "_user": "u1"}))
            .await
            .unwrap();

        let updated = service
            .update(
                &created.id.to_string(),
                json!({"name": "new", "_user": "u2", "_id": Uuid::new_v4().to_string()}),
            )
            .await
            .unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.get_str("name"), Some("new"));
        assert!(updated.get("description").is_none());
        assert_eq!(updated.get_str("_user"), Some("u1"));
        assert!(updated.updated > created.updated);
        assert_eq!(updated.created, created.created);

        let reloaded = service.get_by_id(&created.id.to_string()).await.unwrap();
        assert_eq!(reloaded, updated);
    }

    #[tokio::test]
    async fn update_uses_task_whitelist() {
        let (_, service) = service(ResourceKind::Task);
        let created = service
            .create(json!({"name": "t", "status": "open", "complete": false, "_flow": "f1"}))
            .await
            .unwrap();
        let updated = service
            .update(
                &created.id.to_string(),
                json!({"name": "t", "status": "approved", "complete": true, "_flow": "f2"}),
            )
            .await
            .unwrap();
        assert_eq!(updated.get_str("status"), Some("approved"));
        assert_eq!(updated.get_bool("complete"), Some(true));
        assert_eq!(updated.get_str("_flow"), Some("f1"));
    }

    #[tokio::test]
    async fn delete_then_get_is_not_found() {
        let (_, service) = service(ResourceKind::Task);
        let created = service.create(json!({"name": "short-lived"})).await.unwrap();
        let id = created.id.to_string();

        service.delete(&id).await.unwrap();
        assert!(matches!(
            service.get_by_id(&id).await.unwrap_err(),
            ResourceError::NotFound(_)
        ));
        service.delete(&id).await.unwrap();
        service.delete("garbage").await.unwrap();
    }

    #[tokio::test]
    async fn delete_reports_store_errors() {
        let (store, service) = service(ResourceKind::Task);
        store.set_unavailable(true);
        let err = service.delete(&Uuid::new_v4().to_string()).await.unwrap_err();
        assert!(matches!(err, ResourceError::Store { .. }));
    }

    #[test]
    fn schema_and_default_come_from_field_set() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
        let service = ResourceService::new(store, ResourceKind::Task);
        let schema = service.get_schema();
        assert_eq!(schema["status"]["mutable"], json!(true));
        assert_eq!(schema["_flow"]["type"], json!("Ref<Flow>"));

        let default = service.get_default();
        assert_eq!(default["name"], json!(""));
        assert_eq!(default["status"], json!("open"));
        assert!(default["_flow"].is_null());
    }
}
