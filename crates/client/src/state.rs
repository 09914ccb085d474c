//! Per-resource client cache and the pure reducer that evolves it.
//!
//! Records live once in `by_id`; lists hold ordered ids keyed by the
//! `(ref_key, ref_id)` pair they were fetched with. Every entry moves through
//! not-fetched → fetching → fetched | errored, and fetched → invalidated →
//! fetching. Nothing expires on its own.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use db::models::document::Document;
use serde_json::{Map, Value};
use uuid::Uuid;

/// Key of a cached list. Lists fetched without a reference use
/// [`ListKey::all`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListKey {
    pub ref_key: String,
    pub ref_id: String,
}

impl ListKey {
    pub fn new(ref_key: impl Into<String>, ref_id: impl Into<String>) -> Self {
        Self {
            ref_key: ref_key.into(),
            ref_id: ref_id.into(),
        }
    }

    pub fn all() -> Self {
        Self::new("all", "all")
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListState {
    pub items: Vec<Uuid>,
    pub is_fetching: bool,
    pub did_invalidate: bool,
    pub error: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectedState {
    pub id: Option<Uuid>,
    pub is_fetching: bool,
    pub did_invalidate: bool,
    pub error: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefaultItem {
    pub obj: Map<String, Value>,
    pub is_fetching: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SliceState {
    pub by_id: HashMap<Uuid, Document>,
    pub lists: HashMap<ListKey, ListState>,
    pub selected: SelectedState,
    pub default_item: DefaultItem,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    RequestSingle { id: Uuid },
    ReceiveSingle { document: Document, received_at: DateTime<Utc> },
    SingleFailed { id: Uuid, error: String },
    InvalidateSelected,
    SetSelected { id: Uuid },
    RequestList { key: ListKey },
    ReceiveList { key: ListKey, documents: Vec<Document>, received_at: DateTime<Utc> },
    ListFailed { key: ListKey, error: String },
    InvalidateList { key: ListKey },
    RequestDefault,
    ReceiveDefault { obj: Map<String, Value> },
    DefaultFailed { error: String },
    ReceiveCreated { document: Document, received_at: DateTime<Utc> },
    ReceiveUpdated { document: Document, received_at: DateTime<Utc> },
    ReceiveDeleted { id: Uuid },
}

fn fetched(id: Uuid, received_at: DateTime<Utc>) -> SelectedState {
    SelectedState {
        id: Some(id),
        is_fetching: false,
        did_invalidate: false,
        error: None,
        last_updated: Some(received_at),
    }
}

/// Returns the state after `action`. `state` is left untouched.
pub fn reduce(state: &SliceState, action: &Action) -> SliceState {
    let mut next = state.clone();
    match action {
        Action::RequestSingle { id } => {
            next.selected = SelectedState {
                id: Some(*id),
                is_fetching: true,
                ..SelectedState::default()
            };
        }
        Action::ReceiveSingle {
            document,
            received_at,
        }
        | Action::ReceiveCreated {
            document,
            received_at,
        }
        | Action::ReceiveUpdated {
            document,
            received_at,
        } => {
            next.by_id.insert(document.id, document.clone());
            next.selected = fetched(document.id, *received_at);
        }
        // Ignored unless `id` is still the selection.
        Action::SingleFailed { id, error } if state.selected.id == Some(*id) => {
            next.selected = SelectedState {
                id: Some(*id),
                error: Some(error.clone()),
                ..SelectedState::default()
            };
        }
        Action::SingleFailed { .. } => {}
        Action::InvalidateSelected => {
            next.selected.did_invalidate = true;
        }
        Action::SetSelected { id } => {
            next.selected = SelectedState {
                id: Some(*id),
                last_updated: state.selected.last_updated,
                ..SelectedState::default()
            };
        }
        Action::RequestList { key } => {
            let list = next.lists.entry(key.clone()).or_default();
            list.is_fetching = true;
            list.error = None;
        }
        Action::ReceiveList {
            key,
            documents,
            received_at,
        } => {
            for document in documents {
                next.by_id.insert(document.id, document.clone());
            }
            next.lists.insert(
                key.clone(),
                ListState {
                    items: documents.iter().map(|document| document.id).collect(),
                    is_fetching: false,
                    did_invalidate: false,
                    error: None,
                    last_updated: Some(*received_at),
                },
            );
        }
        Action::ListFailed { key, error } => {
            let list = next.lists.entry(key.clone()).or_default();
            list.is_fetching = false;
            list.error = Some(error.clone());
        }
        Action::InvalidateList { key } => {
            next.lists.entry(key.clone()).or_default().did_invalidate = true;
        }
        Action::RequestDefault => {
            next.default_item.is_fetching = true;
            next.default_item.error = None;
        }
        Action::ReceiveDefault { obj } => {
            next.default_item = DefaultItem {
                obj: obj.clone(),
                is_fetching: false,
                error: None,
            };
        }
        Action::DefaultFailed { error } => {
            next.default_item.is_fetching = false;
            next.default_item.error = Some(error.clone());
        }
        Action::ReceiveDeleted { id } => {
            next.by_id.remove(id);
            for list in next.lists.values_mut() {
                list.items.retain(|item| item != id);
            }
            if next.selected.id == Some(*id) {
                next.selected = SelectedState::default();
            }
        }
    }
    next
}

impl SliceState {
    /// The selected record, unless it was never fetched.
    pub fn selected_item(&self) -> Option<&Document> {
        self.selected.id.and_then(|id| self.by_id.get(&id))
    }

    /// Records of a cached list in list order. `None` until the list has
    /// been received at least once.
    pub fn get_list(&self, ref_key: &str, ref_id: &str) -> Option<Vec<&Document>> {
        let list = self.lists.get(&ListKey::new(ref_key, ref_id))?;
        list.last_updated?;
        Some(
            list.items
                .iter()
                .filter_map(|id| self.by_id.get(id))
                .collect(),
        )
    }

    pub fn list_state(&self, ref_key: &str, ref_id: &str) -> Option<&ListState> {
        self.lists.get(&ListKey::new(ref_key, ref_id))
    }

    pub fn should_fetch_single(&self, id: Uuid) -> bool {
        if self.selected.is_fetching && self.selected.id == Some(id) {
            return false;
        }
        if self.selected.id == Some(id) && self.selected.did_invalidate {
            return true;
        }
        !self.by_id.contains_key(&id)
    }

    pub fn should_fetch_list(&self, key: &ListKey) -> bool {
        match self.lists.get(key) {
            None => true,
            Some(list) if list.is_fetching => false,
            Some(list) => list.did_invalidate || list.last_updated.is_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn doc(name: &str) -> Document {
        let fields = json!({ "name": name }).as_object().cloned().unwrap();
        Document::new(Uuid::new_v4(), fields, Utc::now())
    }

    #[test]
    fn reduce_never_mutates_its_input() {
        let before = SliceState::default();
        let document = doc("a");
        let after = reduce(
            &before,
            &Action::ReceiveSingle {
                document: document.clone(),
                received_at: Utc::now(),
            },
        );
        assert_eq!(before, SliceState::default());
        assert_eq!(after.selected_item(), Some(&document));
    }

    #[test]
    fn single_lifecycle_tracks_selection() {
        let document = doc("a");
        let state = reduce(&SliceState::default(), &Action::RequestSingle { id: document.id });
        assert!(state.selected.is_fetching);
        assert!(!state.should_fetch_single(document.id));

        let state = reduce(
            &state,
            &Action::ReceiveSingle {
                document: document.clone(),
                received_at: Utc::now(),
            },
        );
        assert!(!state.selected.is_fetching);
        assert!(!state.should_fetch_single(document.id));

        let state = reduce(&state, &Action::InvalidateSelected);
        assert!(state.should_fetch_single(document.id));
    }

    #[test]
    fn failed_single_records_error() {
        let id = Uuid::new_v4();
        let state = reduce(&SliceState::default(), &Action::RequestSingle { id });
        let state = reduce(
            &state,
            &Action::SingleFailed {
                id,
                error: "Task not found.".into(),
            },
        );
        assert_eq!(state.selected.error.as_deref(), Some("Task not found."));
        assert!(state.selected_item().is_none());
        assert!(state.should_fetch_single(id));
    }

    #[test]
    fn stale_single_failure_keeps_newer_selection() {
        let missing = Uuid::new_v4();
        let created = doc("b");
        let state = reduce(&SliceState::default(), &Action::RequestSingle { id: missing });
        let state = reduce(
            &state,
            &Action::ReceiveCreated {
                document: created.clone(),
                received_at: Utc::now(),
            },
        );
        let state = reduce(
            &state,
            &Action::SingleFailed {
                id: missing,
                error: "Task not found.".into(),
            },
        );
        assert_eq!(state.selected_item(), Some(&created));
        assert!(state.selected.error.is_none());
    }

    #[test]
    fn list_lifecycle_and_ordering() {
        let key = ListKey::new("_flow", "f1");
        let (a, b) = (doc("a"), doc("b"));
        let state = SliceState::default();
        assert!(state.should_fetch_list(&key));
        assert!(state.get_list("_flow", "f1").is_none());

        let state = reduce(&state, &Action::RequestList { key: key.clone() });
        assert!(!state.should_fetch_list(&key));
        assert!(state.get_list("_flow", "f1").is_none());

        let state = reduce(
            &state,
            &Action::ReceiveList {
                key: key.clone(),
                documents: vec![b.clone(), a.clone()],
                received_at: Utc::now(),
            },
        );
        let names: Vec<_> = state
            .get_list("_flow", "f1")
            .unwrap()
            .iter()
            .filter_map(|d| d.get_str("name"))
            .collect();
        assert_eq!(names, vec!["b", "a"]);
        assert!(!state.should_fetch_list(&key));

        let state = reduce(&state, &Action::InvalidateList { key: key.clone() });
        assert!(state.should_fetch_list(&key));
        assert_eq!(state.get_list("_flow", "f1").unwrap().len(), 2);
    }

    #[test]
    fn failed_list_can_be_fetched_again() {
        let key = ListKey::all();
        let state = reduce(&SliceState::default(), &Action::RequestList { key: key.clone() });
        let state = reduce(
            &state,
            &Action::ListFailed {
                key: key.clone(),
                error: "offline".into(),
            },
        );
        assert_eq!(state.lists[&key].error.as_deref(), Some("offline"));
        assert!(state.should_fetch_list(&key));
    }

    #[test]
    fn records_are_deduplicated_across_lists() {
        let shared = doc("shared");
        let state = reduce(
            &SliceState::default(),
            &Action::ReceiveList {
                key: ListKey::new("_task", "t1"),
                documents: vec![shared.clone()],
                received_at: Utc::now(),
            },
        );
        let mut renamed = shared.clone();
        renamed.set("name", json!("renamed"));
        let state = reduce(
            &state,
            &Action::ReceiveList {
                key: ListKey::all(),
                documents: vec![renamed],
                received_at: Utc::now(),
            },
        );
        assert_eq!(state.by_id.len(), 1);
        assert_eq!(
            state.get_list("_task", "t1").unwrap()[0].get_str("name"),
            Some("renamed")
        );
    }

    #[test]
    fn delete_drops_record_from_lists_and_selection() {
        let (a, b) = (doc("a"), doc("b"));
        let key = ListKey::all();
        let state = reduce(
            &SliceState::default(),
            &Action::ReceiveList {
                key: key.clone(),
                documents: vec![a.clone(), b.clone()],
                received_at: Utc::now(),
            },
        );
        let state = reduce(&state, &Action::SetSelected { id: a.id });
        assert_eq!(state.selected_item(), Some(&a));

        let state = reduce(&state, &Action::ReceiveDeleted { id: a.id });
        assert!(state.selected_item().is_none());
        assert_eq!(state.lists[&key].items, vec![b.id]);
        assert!(!state.by_id.contains_key(&a.id));
    }

    #[test]
    fn default_item_lifecycle() {
        let state = reduce(&SliceState::default(), &Action::RequestDefault);
        assert!(state.default_item.is_fetching);
        let obj = json!({"name": "", "complete": false}).as_object().cloned().unwrap();
        let state = reduce(&state, &Action::ReceiveDefault { obj: obj.clone() });
        assert_eq!(state.default_item.obj, obj);
        assert!(!state.default_item.is_fetching);

        let state = reduce(&state, &Action::DefaultFailed { error: "boom".into() });
        assert_eq!(state.default_item.obj, obj);
        assert_eq!(state.default_item.error.as_deref(), Some("boom"));
    }
}
