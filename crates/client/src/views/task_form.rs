//! Declarative form descriptors for tasks, notes and flows.

use strum_macros::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum FormType {
    Create,
    Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Text,
    TextArea,
    Checkbox,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormInput {
    pub label: &'static str,
    /// Form path the input reads and writes, e.g. `task.name`.
    pub name: &'static str,
    pub kind: InputKind,
    pub required: bool,
}

impl FormInput {
    const fn new(label: &'static str, name: &'static str, kind: InputKind, required: bool) -> Self {
        Self {
            label,
            name,
            kind,
            required,
        }
    }
}

/// Cancel either runs a caller-supplied action or follows a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cancel {
    Action,
    Link(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormDescriptor {
    pub form_type: FormType,
    pub title: Option<String>,
    pub cancel: Cancel,
    pub button_text: String,
    pub inputs: Vec<FormInput>,
}

impl FormDescriptor {
    fn new(form_type: FormType, noun: &str, cancel_link: &str, inputs: Vec<FormInput>) -> Self {
        let verb = match form_type {
            FormType::Create => "Create",
            FormType::Update => "Update",
        };
        Self {
            form_type,
            title: None,
            cancel: Cancel::Link(cancel_link.to_string()),
            button_text: format!("{verb} {noun}"),
            inputs,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into()).filter(|title: &String| !title.is_empty());
        self
    }

    pub fn with_cancel(mut self, cancel: Cancel) -> Self {
        self.cancel = cancel;
        self
    }

    /// Header text; no header is rendered without a title.
    pub fn header(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn input(&self, name: &str) -> Option<&FormInput> {
        self.inputs.iter().find(|input| input.name == name)
    }
}

pub struct TaskForm;

impl TaskForm {
    pub const CANCEL_LINK: &'static str = "/tasks";

    pub fn new(form_type: FormType) -> FormDescriptor {
        FormDescriptor::new(
            form_type,
            "Task",
            Self::CANCEL_LINK,
            vec![
                FormInput::new("Name", "task.name", InputKind::Text, true),
                FormInput::new("Description", "task.description", InputKind::TextArea, false),
                FormInput::new("Completed?", "task.complete", InputKind::Checkbox, false),
            ],
        )
    }
}

pub struct NoteForm;

impl NoteForm {
    pub fn new(form_type: FormType, cancel_link: &str) -> FormDescriptor {
        FormDescriptor::new(
            form_type,
            "Note",
            cancel_link,
            vec![FormInput::new("Note", "note.name", InputKind::TextArea, true)],
        )
    }
}

pub struct FlowForm;

impl FlowForm {
    pub const CANCEL_LINK: &'static str = "/flows";

    pub fn new(form_type: FormType) -> FormDescriptor {
        FormDescriptor::new(
            form_type,
            "Flow",
            Self::CANCEL_LINK,
            vec![
                FormInput::new("Name", "flow.name", InputKind::Text, true),
                FormInput::new("Description", "flow.description", InputKind::TextArea, false),
            ],
        )
    }
}
