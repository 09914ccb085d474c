//! View controllers. Each view owns its form snapshot and modal flags, reads
//! everything else from the [`AppStore`](crate::store::AppStore) it was given,
//! and reports navigation and alerts as [`UiEffect`] values.

pub mod single_task;
pub mod task_editor;
pub mod task_form;

use db::models::document::Document;
use serde_json::Value;
use uuid::Uuid;

pub const SUBMIT_FAILED_ALERT: &str = "ERROR - Check logs";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub roles: Vec<String>,
}

impl SessionUser {
    pub fn from_document(user: &Document) -> Self {
        let text = |field: &str| user.get_str(field).unwrap_or_default().to_string();
        Self {
            id: user.id,
            first_name: text("firstName"),
            last_name: text("lastName"),
            roles: user
                .get("roles")
                .and_then(Value::as_array)
                .map(|roles| {
                    roles
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

/// Who is logged in and which flow they are working in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub user: Option<SessionUser>,
    pub selected_flow: Option<Uuid>,
}

impl Session {
    /// Reviewers are users holding at least one role.
    pub fn can_review(&self) -> bool {
        self.user.as_ref().is_some_and(|user| !user.roles.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEffect {
    None,
    Navigate(String),
    Alert(String),
}

impl UiEffect {
    pub fn show_task(id: Uuid) -> Self {
        UiEffect::Navigate(format!("/tasks/{id}"))
    }

    pub fn submit_failed() -> Self {
        UiEffect::Alert(SUBMIT_FAILED_ALERT.to_string())
    }
}

/// Render state of one region of a view.
#[derive(Debug, Clone, PartialEq)]
pub enum Section<T> {
    Loading,
    Empty,
    Ready(T),
}
