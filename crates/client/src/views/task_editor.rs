//! `/tasks/new` and `/tasks/{id}/update`.

use db::models::resource::ResourceKind;
use serde_json::{Map, Value, json};
use tracing::warn;
use uuid::Uuid;

use super::{
    Session, UiEffect,
    task_form::{Cancel, FormDescriptor, FormType, TaskForm},
};
use crate::{
    api::{ClientError, ItemResponse},
    form::{FieldPath, FormError, FormSchemas, FormState},
    slice::ResourceSlice,
    state::ListKey,
    store::AppStore,
};

const SLOT: &str = "task";

fn task_schemas() -> FormSchemas {
    FormSchemas::new().with_slot(SLOT, ResourceKind::Task)
}

fn change(
    form: &FormState,
    schemas: &FormSchemas,
    path: &str,
    value: Value,
) -> Result<FormState, FormError> {
    form.with_field(&FieldPath::parse(path)?, value, schemas)
}

/// Navigates to the saved task, or alerts when the save did not succeed.
fn outcome(
    result: Result<ItemResponse, ClientError>,
    on_saved: impl FnOnce(Uuid),
) -> UiEffect {
    match result {
        Ok(response) if response.is_success() => match response.into_data() {
            Some(saved) => {
                on_saved(saved.item.id);
                UiEffect::show_task(saved.item.id)
            }
            None => UiEffect::submit_failed(),
        },
        Ok(response) => {
            warn!(message = ?response.message(), "task save rejected");
            UiEffect::submit_failed()
        }
        Err(error) => {
            warn!(%error, "task save failed");
            UiEffect::submit_failed()
        }
    }
}

pub struct CreateTaskView {
    store: AppStore,
    session: Session,
    form: FormState,
    schemas: FormSchemas,
}

impl CreateTaskView {
    pub fn new(store: AppStore, session: Session) -> Self {
        Self {
            store,
            session,
            form: FormState::new(),
            schemas: task_schemas(),
        }
    }

    pub fn descriptor(&self) -> FormDescriptor {
        TaskForm::new(FormType::Create).with_title("Create New Task")
    }

    /// Seeds the form with a copy of the default task.
    pub async fn mount(&mut self) {
        let obj = match self.store.tasks.fetch_default().await {
            Ok(obj) => obj,
            Err(error) => {
                warn!(%error, "could not load default task");
                Map::new()
            }
        };
        self.form = self.form.with_slot(SLOT, obj);
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn handle_form_change(&mut self, path: &str, value: Value) -> Result<(), FormError> {
        self.form = change(&self.form, &self.schemas, path, value)?;
        Ok(())
    }

    /// Creates the task inside the selected flow. The flow's task list is
    /// invalidated so it refetches on next view.
    pub async fn handle_form_submit(&mut self) -> UiEffect {
        let mut task = self.form.slot(SLOT).cloned().unwrap_or_default();
        let flow = self.session.selected_flow;
        if let Some(flow) = flow {
            task.insert("_flow".to_string(), json!(flow.to_string()));
        }
        if let Some(user) = &self.session.user {
            task.insert("_user".to_string(), json!(user.id.to_string()));
        }

        let tasks: &ResourceSlice = &self.store.tasks;
        let result = tasks.send_create(Value::Object(task)).await;
        outcome(result, |_| match flow {
            Some(flow) => tasks.invalidate_list("_flow", &flow.to_string()),
            None => {
                let all = ListKey::all();
                tasks.invalidate_list(&all.ref_key, &all.ref_id)
            }
        })
    }
}

pub struct UpdateTaskView {
    store: AppStore,
    task_id: Uuid,
    form: FormState,
    schemas: FormSchemas,
}

impl UpdateTaskView {
    pub fn new(store: AppStore, task_id: Uuid) -> Self {
        Self {
            store,
            task_id,
            form: FormState::new(),
            schemas: task_schemas(),
        }
    }

    pub fn descriptor(&self) -> FormDescriptor {
        TaskForm::new(FormType::Update)
            .with_title("Update Task")
            .with_cancel(Cancel::Link(format!("/tasks/{}", self.task_id)))
    }

    /// Seeds the form with a copy of the cached task; the cached record is
    /// never edited in place. The form stays empty if the task can't be loaded.
    pub async fn mount(&mut self) {
        if let Err(error) = self.store.tasks.fetch_single_if_needed(self.task_id).await {
            warn!(task_id = %self.task_id, %error, "could not load task");
        }
        let fields = self
            .store
            .tasks
            .snapshot()
            .by_id
            .remove(&self.task_id)
            .map(|task| task.fields);
        if let Some(fields) = fields {
            self.form = self.form.with_slot(SLOT, fields);
        }
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn handle_form_change(&mut self, path: &str, value: Value) -> Result<(), FormError> {
        self.form = change(&self.form, &self.schemas, path, value)?;
        Ok(())
    }

    /// Sends the edited copy. Nothing is sent unless `mount` loaded the task,
    /// since an empty body would clear every editable field.
    pub async fn handle_form_submit(&mut self) -> UiEffect {
        let Some(task) = self.form.slot(SLOT).cloned() else {
            warn!(task_id = %self.task_id, "task was never loaded, not saving");
            return UiEffect::submit_failed();
        };
        let tasks: &ResourceSlice = &self.store.tasks;
        let result = tasks.send_update(self.task_id, Value::Object(task)).await;
        outcome(result, |_| tasks.invalidate_selected())
    }
}
