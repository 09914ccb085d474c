use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use ts_rs::TS;

use super::{flow, note, schema::FieldSet, task, user};

/// Every entity type the service exposes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    TS,
    EnumString,
    Display,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ResourceKind {
    Flow,
    Task,
    Note,
    User,
}

/// Static description of one resource: its names and its field set.
#[derive(Debug, Clone)]
pub struct ResourceDef {
    pub kind: ResourceKind,
    pub singular: &'static str,
    pub plural: &'static str,
    pub display: &'static str,
    pub fields: FieldSet,
}

static FLOW: LazyLock<ResourceDef> = LazyLock::new(|| ResourceDef {
    kind: ResourceKind::Flow,
    singular: "flow",
    plural: "flows",
    display: "Flow",
    fields: flow::fields(),
});

static TASK: LazyLock<ResourceDef> = LazyLock::new(|| ResourceDef {
    kind: ResourceKind::Task,
    singular: "task",
    plural: "tasks",
    display: "Task",
    fields: task::fields(),
});

static NOTE: LazyLock<ResourceDef> = LazyLock::new(|| ResourceDef {
    kind: ResourceKind::Note,
    singular: "note",
    plural: "notes",
    display: "Note",
    fields: note::fields(),
});

static USER: LazyLock<ResourceDef> = LazyLock::new(|| ResourceDef {
    kind: ResourceKind::User,
    singular: "user",
    plural: "users",
    display: "User",
    fields: user::fields(),
});

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Flow,
        ResourceKind::Task,
        ResourceKind::Note,
        ResourceKind::User,
    ];

    pub fn def(self) -> &'static ResourceDef {
        match self {
            ResourceKind::Flow => &FLOW,
            ResourceKind::Task => &TASK,
            ResourceKind::Note => &NOTE,
            ResourceKind::User => &USER,
        }
    }

    pub fn fields(self) -> &'static FieldSet {
        &self.def().fields
    }

    /// Collection (and URL segment) name.
    pub fn plural(self) -> &'static str {
        self.def().plural
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ResourceKind::Flow => "Flow",
            ResourceKind::Task => "Task",
            ResourceKind::Note => "Note",
            ResourceKind::User => "User",
        }
    }
}
