//! `/tasks/{id}`: one task, its review controls and its notes.

use db::models::{document::Document, resource::ResourceKind, task::TaskStatus};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{
    Section, Session, UiEffect,
    task_form::{FormDescriptor, FormType, NoteForm},
};
use crate::{
    form::{FieldPath, FormError, FormSchemas, FormState},
    store::AppStore,
};

const NOTE_REF: &str = "_task";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckboxColor {
    Green,
    Red,
    Blue,
}

impl CheckboxColor {
    /// Colour for a task status. Unknown statuses get no checkbox.
    pub fn for_status(status: Option<TaskStatus>) -> Option<Self> {
        match status? {
            TaskStatus::Approved => Some(CheckboxColor::Green),
            TaskStatus::Rejected => Some(CheckboxColor::Red),
            TaskStatus::Open => Some(CheckboxColor::Blue),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskCheckbox {
    pub label: String,
    pub checked: bool,
    pub color: CheckboxColor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskPanel {
    pub checkbox: Option<TaskCheckbox>,
    pub description: String,
    pub edit_link: String,
    pub can_review: bool,
    /// Rendered dimmed while a refetch is in flight.
    pub faded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteItem {
    pub id: Uuid,
    pub author: String,
    pub created: String,
    pub text: String,
}

impl NoteItem {
    fn from_document(note: &Document) -> Self {
        let text = |field: &str| note.get_str(field).unwrap_or_default();
        Self {
            id: note.id,
            author: format!("{} {}", text("_userFirstName"), text("_userLastName")),
            created: note.created.format("%m/%d/%Y @ %I:%M %p").to_string(),
            text: text("name").to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteList {
    pub notes: Vec<NoteItem>,
    pub faded: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SingleTaskModel {
    pub task: Section<TaskPanel>,
    pub notes: Section<NoteList>,
    pub note_form: FormDescriptor,
    pub approve_modal_open: bool,
    pub reject_modal_open: bool,
}

pub struct SingleTaskView {
    store: AppStore,
    session: Session,
    task_id: Uuid,
    form: FormState,
    schemas: FormSchemas,
    approve_modal_open: bool,
    reject_modal_open: bool,
}

impl SingleTaskView {
    pub fn new(store: AppStore, session: Session, task_id: Uuid) -> Self {
        Self {
            store,
            session,
            task_id,
            form: FormState::new(),
            schemas: FormSchemas::new()
                .with_slot("task", ResourceKind::Task)
                .with_slot("note", ResourceKind::Note),
            approve_modal_open: false,
            reject_modal_open: false,
        }
    }

    pub fn url(&self) -> String {
        format!("/tasks/{}", self.task_id)
    }

    /// Loads the task, both default objects and the task's notes, then seeds
    /// the form from copies of the defaults. Failures are kept in the store
    /// and surface through [`SingleTaskView::model`].
    pub async fn mount(&mut self) {
        if let Err(error) = self.store.tasks.fetch_single_if_needed(self.task_id).await {
            warn!(task_id = %self.task_id, %error, "could not load task");
        }
        if let Err(error) = self.store.tasks.fetch_default().await {
            warn!(%error, "could not load default task");
        }
        if let Err(error) = self.store.notes.fetch_default().await {
            warn!(%error, "could not load default note");
        }
        self.refresh().await;
        self.form = self
            .form
            .with_slot("task", self.store.tasks.snapshot().default_item.obj)
            .with_slot("note", self.default_note());
    }

    /// Refetches the note list if it was invalidated.
    pub async fn refresh(&self) {
        let task_id = self.task_id.to_string();
        if let Err(error) = self.store.notes.fetch_list_if_needed(NOTE_REF, &task_id).await {
            warn!(%task_id, %error, "could not load notes");
        }
    }

    fn default_note(&self) -> Map<String, Value> {
        let obj = self.store.notes.snapshot().default_item.obj;
        if obj.is_empty() {
            json!({ "name": "" }).as_object().cloned().unwrap_or_default()
        } else {
            obj
        }
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn model(&self) -> SingleTaskModel {
        SingleTaskModel {
            task: self.task_section(),
            notes: self.note_section(),
            note_form: NoteForm::new(FormType::Create, &self.url()),
            approve_modal_open: self.approve_modal_open,
            reject_modal_open: self.reject_modal_open,
        }
    }

    fn task_section(&self) -> Section<TaskPanel> {
        let tasks = self.store.tasks.snapshot();
        let is_fetching = tasks.selected.is_fetching;
        let task = tasks
            .selected_item()
            .filter(|task| task.id == self.task_id && !tasks.selected.did_invalidate);
        let Some(task) = task else {
            return if is_fetching {
                Section::Loading
            } else {
                Section::Empty
            };
        };

        let checkbox = CheckboxColor::for_status(TaskStatus::of(task)).map(|color| TaskCheckbox {
            label: task.get_str("name").unwrap_or_default().to_string(),
            checked: task.get_bool("complete").unwrap_or(false),
            color,
        });
        Section::Ready(TaskPanel {
            checkbox,
            description: task.get_str("description").unwrap_or_default().to_string(),
            edit_link: format!("{}/update", self.url()),
            can_review: self.session.can_review(),
            faded: is_fetching,
        })
    }

    fn note_section(&self) -> Section<NoteList> {
        let notes = self.store.notes.snapshot();
        let task_id = self.task_id.to_string();
        let list = notes.list_state(NOTE_REF, &task_id);
        let is_fetching = list.is_none_or(|list| list.is_fetching);
        match notes.get_list(NOTE_REF, &task_id) {
            None if is_fetching => Section::Loading,
            None => Section::Empty,
            Some(items) if items.is_empty() => Section::Empty,
            Some(items) => Section::Ready(NoteList {
                notes: items.into_iter().map(NoteItem::from_document).collect(),
                faded: is_fetching,
            }),
        }
    }

    pub fn toggle_approve_modal(&mut self) {
        self.approve_modal_open = !self.approve_modal_open;
    }

    pub fn toggle_reject_modal(&mut self) {
        self.reject_modal_open = !self.reject_modal_open;
    }

    pub async fn confirm_approve(&mut self) -> UiEffect {
        self.approve_modal_open = false;
        self.review(TaskStatus::Approved).await
    }

    pub async fn confirm_reject(&mut self) -> UiEffect {
        self.reject_modal_open = false;
        self.review(TaskStatus::Rejected).await
    }

    /// Sends a copy of this view's cached task with `status` set. The cached record
    /// only changes once the server accepts the update.
    async fn review(&self, status: TaskStatus) -> UiEffect {
        let Some(task) = self.store.tasks.snapshot().by_id.remove(&self.task_id) else {
            warn!(task_id = %self.task_id, "task not loaded, nothing to review");
            return UiEffect::None;
        };
        let mut body = task.fields;
        body.insert("status".to_string(), json!(status.to_string()));

        match self.store.tasks.send_update(self.task_id, Value::Object(body)).await {
            Ok(response) if response.is_success() => match response.into_data() {
                Some(updated) => UiEffect::show_task(updated.item.id),
                None => UiEffect::None,
            },
            Ok(response) => {
                warn!(task_id = %self.task_id, message = ?response.message(), "review rejected");
                UiEffect::None
            }
            Err(error) => {
                warn!(task_id = %self.task_id, %error, "review failed");
                UiEffect::None
            }
        }
    }

    pub fn handle_form_change(&mut self, path: &str, value: Value) -> Result<(), FormError> {
        let path = FieldPath::parse(path)?;
        self.form = self.form.with_field(&path, value, &self.schemas)?;
        Ok(())
    }

    /// Creates a note for this task from the form, stamped with the author
    /// and the selected flow.
    pub async fn handle_form_submit(&mut self) -> UiEffect {
        let mut note = self.form.slot("note").cloned().unwrap_or_default();
        let user = self.session.user.as_ref();
        note.insert(NOTE_REF.to_string(), json!(self.task_id.to_string()));
        note.insert("_user".to_string(), json!(user.map(|user| user.id.to_string())));
        note.insert("_userFirstName".to_string(), json!(user.map(|user| &user.first_name)));
        note.insert("_userLastName".to_string(), json!(user.map(|user| &user.last_name)));
        note.insert(
            "_flow".to_string(),
            json!(self.session.selected_flow.map(|flow| flow.to_string())),
        );

        match self.store.notes.send_create(Value::Object(note)).await {
            Ok(response) if response.is_success() => {
                debug!(task_id = %self.task_id, "note created");
                self.store
                    .notes
                    .invalidate_list(NOTE_REF, &self.task_id.to_string());
                self.form = self.form.with_slot("note", self.default_note());
                UiEffect::None
            }
            Ok(response) => {
                warn!(task_id = %self.task_id, message = ?response.message(), "note rejected");
                UiEffect::submit_failed()
            }
            Err(error) => {
                warn!(task_id = %self.task_id, %error, "note create failed");
                UiEffect::submit_failed()
            }
        }
    }
}
