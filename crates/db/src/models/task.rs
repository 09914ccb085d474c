use serde::{Deserialize, Serialize};
use serde_json::json;
use strum_macros::{Display, EnumString};
use ts_rs::TS;

use super::{
    document::Document,
    resource::ResourceKind,
    schema::{FieldSet, FieldSpec},
};

/// Review state of a task. Stored as a plain string field so the
/// controller stays schema-driven.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Open,
    Approved,
    Rejected,
}

impl TaskStatus {
    /// Status of a stored task; `None` when missing or unrecognised.
    pub fn of(task: &Document) -> Option<Self> {
        task.get_str("status").and_then(|status| status.parse().ok())
    }
}

pub fn fields() -> FieldSet {
    FieldSet::new(vec![
        FieldSpec::string("name").mutable().required(),
        FieldSpec::text("description").mutable(),
        FieldSpec::boolean("complete").mutable(),
        FieldSpec::string("status")
            .mutable()
            .with_default(json!(TaskStatus::Open.to_string())),
        FieldSpec::reference("_flow", ResourceKind::Flow),
        FieldSpec::reference("_user", ResourceKind::User),
    ])
}
